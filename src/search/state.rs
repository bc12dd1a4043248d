//! Shared search state.
//!
//! One `SearchState` lives for a whole search and is shared by reference with
//! every call, sequential or parallel. The incumbent sits behind a mutex and
//! is only replaced by a strictly shorter route; an atomic copy of its
//! distance serves the hot pruning reads.

use crate::solution::{Solution, Termination};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Caller-held handle that aborts a running search from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

const RUNNING: u8 = 0;
const PLATEAU: u8 = 1;
const CANCELLED: u8 = 2;
const DEADLINE: u8 = 3;

#[derive(Debug)]
struct Incumbent {
    solution: Solution,
    history: Vec<f64>,
}

#[derive(Debug)]
pub struct SearchState {
    incumbent: Mutex<Incumbent>,
    best_distance: AtomicU64,
    calls: AtomicU64,
    calls_since_improvement: AtomicU64,
    stop: AtomicU8,
    plateau: Option<u64>,
    report_interval: u64,
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl SearchState {
    /// `plateau: None` disables the early stop.
    pub fn new(
        seed: Solution,
        plateau: Option<u64>,
        report_interval: u64,
        cancel: CancelToken,
        deadline: Option<Instant>,
    ) -> Self {
        let best = seed.distance;
        let history = if best.is_finite() { vec![best] } else { Vec::new() };
        SearchState {
            incumbent: Mutex::new(Incumbent { solution: seed, history }),
            best_distance: AtomicU64::new(best.to_bits()),
            calls: AtomicU64::new(0),
            calls_since_improvement: AtomicU64::new(0),
            stop: AtomicU8::new(RUNNING),
            plateau,
            report_interval,
            cancel,
            deadline,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Incumbent> {
        self.incumbent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[inline]
    pub fn best_distance(&self) -> f64 {
        f64::from_bits(self.best_distance.load(Ordering::Acquire))
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Record the first stop reason; later ones are ignored.
    ///
    /// Returns `true` only for the call that actually stopped the search.
    pub fn stop(&self, reason: Termination) -> bool {
        let code = match reason {
            Termination::Plateau => PLATEAU,
            Termination::Cancelled => CANCELLED,
            Termination::DeadlineReached => DEADLINE,
            Termination::Exhausted | Termination::Constructed => return false,
        };
        self.stop
            .compare_exchange(RUNNING, code, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Check the stop signal, the cancel token and the deadline.
    pub fn is_stopped(&self) -> bool {
        if self.stop.load(Ordering::Acquire) != RUNNING {
            return true;
        }
        if self.cancel.is_cancelled() {
            self.stop(Termination::Cancelled);
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.stop(Termination::DeadlineReached);
                return true;
            }
        }
        false
    }

    /// Count one call. Returns `false` once the plateau threshold is reached.
    pub fn tick(&self, node: usize, remaining: u32) -> bool {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        let since = self.calls_since_improvement.fetch_add(1, Ordering::Relaxed) + 1;

        if self.report_interval > 0 && calls % self.report_interval == 0 {
            log::debug!(
                "calls={} since_improvement={} best={:.2} remaining={} node={}",
                calls,
                since,
                self.best_distance(),
                remaining,
                node
            );
        }

        match self.plateau {
            Some(limit) if since >= limit => {
                if self.stop(Termination::Plateau) {
                    log::warn!("no improvement in {} calls, stopping early at best={:.2}", since, self.best_distance());
                }
                false
            }
            _ => true,
        }
    }

    /// Replace the incumbent if `candidate` is strictly shorter.
    pub fn offer(&self, candidate: Solution) -> bool {
        let mut incumbent = self.lock();
        if candidate.distance >= incumbent.solution.distance {
            return false;
        }
        let distance = candidate.distance;
        incumbent.solution = candidate;
        incumbent.history.push(distance);
        self.best_distance.store(distance.to_bits(), Ordering::Release);
        self.calls_since_improvement.store(0, Ordering::Relaxed);
        log::debug!("new best distance {:.2} after {} calls", distance, self.calls());
        true
    }

    pub fn termination(&self) -> Termination {
        match self.stop.load(Ordering::Acquire) {
            PLATEAU => Termination::Plateau,
            CANCELLED => Termination::Cancelled,
            DEADLINE => Termination::DeadlineReached,
            _ => Termination::Exhausted,
        }
    }

    /// Consume the state into the best solution found.
    pub fn into_solution(self) -> Solution {
        let termination = self.termination();
        let calls = self.calls();
        let incumbent = self
            .incumbent
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut solution = incumbent.solution;
        solution.termination = termination;
        solution.calls = calls;
        solution.history = incumbent.history;
        solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_distance(distance: f64) -> Solution {
        Solution { distance, ..Solution::new() }
    }

    #[test]
    fn test_offer_only_accepts_strict_improvements() {
        let state = SearchState::new(with_distance(10.0), None, 0, CancelToken::new(), None);

        assert!(!state.offer(with_distance(10.0)));
        assert!(state.offer(with_distance(7.5)));
        assert!(!state.offer(with_distance(8.0)));
        assert_eq!(state.best_distance(), 7.5);

        let solution = state.into_solution();
        assert_eq!(solution.distance, 7.5);
        assert_eq!(solution.history, vec![10.0, 7.5]);
        assert_eq!(solution.termination, Termination::Exhausted);
    }

    #[test]
    fn test_plateau_stops_after_threshold() {
        let state = SearchState::new(Solution::new(), Some(3), 0, CancelToken::new(), None);
        assert!(state.tick(0, 1));
        assert!(state.tick(0, 1));
        assert!(!state.tick(0, 1));
        assert!(state.is_stopped());
        assert_eq!(state.termination(), Termination::Plateau);
    }

    #[test]
    fn test_only_first_stop_reports_success() {
        let state = SearchState::new(Solution::new(), Some(1), 0, CancelToken::new(), None);
        assert!(!state.stop(Termination::Exhausted));
        assert!(!state.tick(0, 1));
        // plateau already recorded by the first tick
        assert!(!state.stop(Termination::Plateau));
        assert!(!state.tick(0, 1));
        assert_eq!(state.termination(), Termination::Plateau);
    }

    #[test]
    fn test_improvement_resets_plateau_counter() {
        let state = SearchState::new(Solution::new(), Some(2), 0, CancelToken::new(), None);
        assert!(state.tick(0, 1));
        state.offer(with_distance(3.0));
        assert!(state.tick(0, 1));
        assert!(!state.tick(0, 1));
    }

    #[test]
    fn test_cancel_token_and_first_reason_wins() {
        let cancel = CancelToken::new();
        let state = SearchState::new(Solution::new(), None, 0, cancel.clone(), None);
        assert!(!state.is_stopped());

        cancel.cancel();
        assert!(state.is_stopped());
        assert!(!state.stop(Termination::Plateau));
        assert_eq!(state.termination(), Termination::Cancelled);
    }

    #[test]
    fn test_past_deadline_stops() {
        let state = SearchState::new(Solution::new(), None, 0, CancelToken::new(), Some(Instant::now()));
        assert!(state.is_stopped());
        assert_eq!(state.termination(), Termination::DeadlineReached);
    }
}
