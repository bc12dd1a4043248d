//! Module for parsing and representing hub routing instances.
//!
//! The text format has a header of `KEY value` lines followed by sections
//! introduced by a line containing `---` and the section name:
//!
//! ```text
//! NODES 4            // also NODOS
//! HUBS 1
//! PACKAGES 3         // also PAQUETES
//! CAPACITY 2         // also CAPACIDAD_CAMION
//! DEPOT 0            // also DEPOSITO_ID
//! --- NODES ---
//! 0 0 0
//! ...
//! --- HUBS ---
//! 2 10.0             // node activation_cost
//! --- PACKAGES ---
//! 0 0 3              // id origin destination
//! --- EDGES ---      // also ARISTAS
//! 0 1 4.0            // u v weight, undirected
//! ```
//!
//! Anything after `//` is a comment. Malformed lines inside a section are
//! skipped with a warning.

use crate::error::InstanceError;
use crate::problem::Problem;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A node with its drawing coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

/// A hub and the cost of activating it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hub {
    pub node: usize,
    pub activation_cost: f64,
}

/// A package travelling from `origin` to `destination`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: usize,
    pub origin: usize,
    pub destination: usize,
}

/// A loaded instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub node_count: usize,
    pub capacity: u32,
    pub depot: usize,
    pub nodes: Vec<Node>,
    pub hubs: Vec<Hub>,
    pub packages: Vec<Package>,
    /// Symmetric weighted adjacency matrix, zero meaning "no edge"
    pub adjacency: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Nodes,
    Hubs,
    Packages,
    Edges,
    Unknown,
}

impl Section {
    fn from_header(line: &str) -> Option<Section> {
        if !line.contains("---") {
            return None;
        }
        let upper = line.to_uppercase();
        let section = if upper.contains("NODOS") || upper.contains("NODES") {
            Section::Nodes
        } else if upper.contains("HUBS") {
            Section::Hubs
        } else if upper.contains("PAQUETES") || upper.contains("PACKAGES") {
            Section::Packages
        } else if upper.contains("ARISTAS") || upper.contains("EDGES") {
            Section::Edges
        } else {
            Section::Unknown
        };
        Some(section)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => line[..pos].trim(),
        None => line.trim(),
    }
}

fn parse_header<T: std::str::FromStr>(key: &'static str, value: Option<&str>, line: usize) -> Result<T, InstanceError> {
    let value = value.unwrap_or("");
    value.parse().map_err(|_| InstanceError::InvalidHeader {
        key,
        value: value.to_string(),
        line,
    })
}

/// Header counts; sections stop reading once their count is reached
#[derive(Debug, Default)]
struct Header {
    nodes: Option<usize>,
    hubs: Option<usize>,
    packages: Option<usize>,
    capacity: Option<u32>,
    depot: Option<usize>,
}

impl Instance {
    /// Parse an instance file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InstanceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| InstanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(&name, &text)
    }

    /// Parse an instance from its text
    pub fn parse(name: &str, text: &str) -> Result<Self, InstanceError> {
        let mut header = Header::default();
        let mut section = Section::Header;
        let mut nodes = Vec::new();
        let mut hubs = Vec::new();
        let mut packages = Vec::new();
        let mut edges: Vec<(usize, usize, f64, usize)> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            if let Some(next) = Section::from_header(raw) {
                section = next;
                continue;
            }
            let line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();

            match section {
                Section::Header => {
                    let value = parts.get(1).copied();
                    match parts[0] {
                        "NODOS" | "NODES" => header.nodes = Some(parse_header("NODES", value, line_no)?),
                        "HUBS" => header.hubs = Some(parse_header("HUBS", value, line_no)?),
                        "PAQUETES" | "PACKAGES" => header.packages = Some(parse_header("PACKAGES", value, line_no)?),
                        "CAPACIDAD_CAMION" | "CAPACITY" => {
                            header.capacity = Some(parse_header("CAPACITY", value, line_no)?)
                        }
                        "DEPOSITO_ID" | "DEPOT" => header.depot = Some(parse_header("DEPOT", value, line_no)?),
                        other => log::warn!("line {}: unknown header key {:?}", line_no, other),
                    }
                }
                Section::Nodes => {
                    if header.nodes.is_some_and(|limit| nodes.len() >= limit) {
                        continue;
                    }
                    match parse_node(&parts) {
                        Some(node) => nodes.push(node),
                        None => log::warn!("line {}: skipping malformed node {:?}", line_no, line),
                    }
                }
                Section::Hubs => {
                    if header.hubs.is_some_and(|limit| hubs.len() >= limit) {
                        continue;
                    }
                    match parse_hub(&parts) {
                        Some(hub) => hubs.push(hub),
                        None => log::warn!("line {}: skipping malformed hub {:?}", line_no, line),
                    }
                }
                Section::Packages => {
                    if header.packages.is_some_and(|limit| packages.len() >= limit) {
                        continue;
                    }
                    match parse_package(&parts) {
                        Some(package) => packages.push(package),
                        None => log::warn!("line {}: skipping malformed package {:?}", line_no, line),
                    }
                }
                Section::Edges => match parse_edge(&parts) {
                    Some((u, v, weight)) => edges.push((u, v, weight, line_no)),
                    None => log::warn!("line {}: skipping malformed edge {:?}", line_no, line),
                },
                Section::Unknown => {}
            }
        }

        let node_count = header.nodes.ok_or(InstanceError::MissingHeader("NODES"))?;
        let capacity = header.capacity.ok_or(InstanceError::MissingHeader("CAPACITY"))?;

        let mut adjacency = vec![vec![0.0; node_count]; node_count];
        for (u, v, weight, line_no) in edges {
            if u >= node_count || v >= node_count {
                log::warn!("line {}: edge {}-{} references a node out of range", line_no, u, v);
                continue;
            }
            if weight == 0.0 && u != v {
                log::warn!("line {}: zero-weight edge {}-{} is read as no edge", line_no, u, v);
            }
            adjacency[u][v] = weight;
            adjacency[v][u] = weight;
        }

        Ok(Instance {
            name: name.to_string(),
            node_count,
            capacity,
            depot: header.depot.unwrap_or(0),
            nodes,
            hubs,
            packages,
            adjacency,
        })
    }

    /// Generate a connected random instance.
    ///
    /// Node `i > 0` is linked to a random earlier node, then extra edges are
    /// added; weights are the Euclidean distances between the random
    /// coordinates. Packages leave the depot for random non-depot nodes.
    pub fn random(nodes: usize, hubs: usize, packages: usize, capacity: u32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = nodes.max(2);

        let coords: Vec<Node> = (0..n)
            .map(|id| Node {
                id,
                x: rng.gen_range(0..100u32) as f64,
                y: rng.gen_range(0..100u32) as f64,
            })
            .collect();
        let weight = |a: usize, b: usize| {
            let d = ((coords[a].x - coords[b].x).powi(2) + (coords[a].y - coords[b].y).powi(2)).sqrt();
            ((d * 100.0).round() / 100.0).max(1.0)
        };

        let mut adjacency = vec![vec![0.0; n]; n];
        for i in 1..n {
            let j = rng.gen_range(0..i);
            adjacency[i][j] = weight(i, j);
            adjacency[j][i] = adjacency[i][j];
        }
        for i in 0..n {
            for j in (i + 1)..n {
                if adjacency[i][j] == 0.0 && rng.gen_bool(0.3) {
                    adjacency[i][j] = weight(i, j);
                    adjacency[j][i] = adjacency[i][j];
                }
            }
        }

        let mut candidates: Vec<usize> = (1..n).collect();
        candidates.shuffle(&mut rng);
        let hubs = candidates
            .into_iter()
            .take(hubs)
            .map(|node| Hub { node, activation_cost: rng.gen_range(5..50u32) as f64 })
            .collect();

        let packages = (0..packages)
            .map(|id| Package { id, origin: 0, destination: rng.gen_range(1..n) })
            .collect();

        Instance {
            name: format!("random-n{}-s{}", n, seed),
            node_count: n,
            capacity,
            depot: 0,
            nodes: coords,
            hubs,
            packages,
            adjacency,
        }
    }

    /// Packages per destination node
    pub fn demand(&self) -> BTreeMap<usize, u32> {
        let mut demand = BTreeMap::new();
        for package in &self.packages {
            if package.destination >= self.node_count {
                log::warn!("package {} has destination {} out of range", package.id, package.destination);
                continue;
            }
            *demand.entry(package.destination).or_insert(0) += 1;
        }
        demand
    }

    pub fn hub_nodes(&self) -> Vec<usize> {
        self.hubs.iter().map(|h| h.node).collect()
    }

    /// Build the solver input
    pub fn problem(&self) -> Problem {
        Problem::new(self.adjacency.clone(), self.depot, self.hub_nodes(), self.demand(), self.capacity)
    }

    pub fn edge_count(&self) -> usize {
        (0..self.node_count)
            .map(|i| ((i + 1)..self.node_count).filter(|&j| self.adjacency[i][j] > 0.0).count())
            .sum()
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let weights: Vec<f64> = (0..self.node_count)
            .flat_map(|i| ((i + 1)..self.node_count).map(move |j| (i, j)))
            .map(|(i, j)| self.adjacency[i][j])
            .filter(|&w| w > 0.0)
            .collect();
        let avg_edge_weight = if weights.is_empty() {
            0.0
        } else {
            weights.iter().sum::<f64>() / weights.len() as f64
        };
        let max_edge_weight = weights.iter().cloned().fold(0.0, f64::max);

        let demand = self.demand();
        let total_demand: u32 = demand.values().sum();

        InstanceStatistics {
            name: self.name.clone(),
            nodes: self.node_count,
            edges: weights.len(),
            depot: self.depot,
            hubs: self.hub_nodes(),
            hub_activation_cost: self.hubs.iter().map(|h| h.activation_cost).sum(),
            packages: self.packages.len(),
            destinations: demand.len(),
            total_demand,
            capacity: self.capacity,
            min_trips: total_demand.div_ceil(self.capacity.max(1)),
            avg_edge_weight,
            max_edge_weight,
        }
    }
}

fn parse_node(parts: &[&str]) -> Option<Node> {
    match parts {
        [id, x, y, ..] => Some(Node { id: id.parse().ok()?, x: x.parse().ok()?, y: y.parse().ok()? }),
        _ => None,
    }
}

fn parse_hub(parts: &[&str]) -> Option<Hub> {
    match parts {
        [node, cost, ..] => Some(Hub { node: node.parse().ok()?, activation_cost: cost.parse().ok()? }),
        _ => None,
    }
}

fn parse_package(parts: &[&str]) -> Option<Package> {
    match parts {
        [id, origin, destination, ..] => Some(Package {
            id: id.parse().ok()?,
            origin: origin.parse().ok()?,
            destination: destination.parse().ok()?,
        }),
        _ => None,
    }
}

fn parse_edge(parts: &[&str]) -> Option<(usize, usize, f64)> {
    match parts {
        [u, v, weight, ..] => Some((u.parse().ok()?, v.parse().ok()?, weight.parse().ok()?)),
        _ => None,
    }
}

/// Summary of a loaded instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub nodes: usize,
    pub edges: usize,
    pub depot: usize,
    pub hubs: Vec<usize>,
    pub hub_activation_cost: f64,
    pub packages: usize,
    pub destinations: usize,
    pub total_demand: u32,
    pub capacity: u32,
    /// Trips needed if every trip left full
    pub min_trips: u32,
    pub avg_edge_weight: f64,
    pub max_edge_weight: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {} ({} edges)", self.nodes, self.edges)?;
        writeln!(f, "  Depot: {}", self.depot)?;
        writeln!(f, "  Hubs: {:?} (activation cost {:.2})", self.hubs, self.hub_activation_cost)?;
        writeln!(f, "  Packages: {} to {} destinations", self.packages, self.destinations)?;
        writeln!(f, "  Capacity: {} (at least {} trips)", self.capacity, self.min_trips)?;
        writeln!(f, "  Avg edge weight: {:.2}", self.avg_edge_weight)?;
        writeln!(f, "  Max edge weight: {:.2}", self.max_edge_weight)
    }
}
