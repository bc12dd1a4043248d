//! Vehicle loading arithmetic.

/// Load as much as fits from a source.
///
/// Returns `(new_occupied, remaining_at_source)`. A full vehicle leaves both
/// quantities unchanged.
#[inline]
pub fn load_from_source(occupied: u32, available: u32, capacity: u32) -> (u32, u32) {
    let space = capacity.saturating_sub(occupied);
    if space == 0 {
        return (occupied, available);
    }
    if available >= space {
        (capacity, available - space)
    } else {
        (occupied + available, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_load_leaves_rest_at_source() {
        assert_eq!(load_from_source(2, 10, 5), (5, 7));
    }

    #[test]
    fn test_source_emptied_when_it_fits() {
        assert_eq!(load_from_source(1, 3, 5), (4, 0));
        assert_eq!(load_from_source(0, 0, 5), (0, 0));
    }

    #[test]
    fn test_full_vehicle_is_unchanged() {
        assert_eq!(load_from_source(5, 8, 5), (5, 8));
    }

    #[test]
    fn test_conservation_over_small_grid() {
        for capacity in 1..6u32 {
            for occupied in 0..=capacity {
                for available in 0..12u32 {
                    let (new_occupied, remaining) = load_from_source(occupied, available, capacity);
                    assert!(new_occupied <= capacity);
                    assert_eq!(remaining + (new_occupied - occupied), available);
                }
            }
        }
    }
}
