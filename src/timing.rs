// src/timing.rs
//
// Green-light timing derivation. Pure arithmetic on vehicle counts, no IO:
// seconds = clamp(base + per_vehicle * count, min, max). Every committed
// snapshot re-derives from scratch, so these functions must never panic.

use crate::types::{ApproachResult, TimingConfig, APPROACH_COUNT};

/// Seconds of green for one approach given its vehicle count.
///
/// Monotone in `count` and saturating: absurd counts pin to `max_seconds`
/// instead of overflowing.
pub fn derive_green_seconds(count: usize, timing: &TimingConfig) -> u32 {
    let raw = (timing.per_vehicle_seconds as u64)
        .saturating_mul(count as u64)
        .saturating_add(timing.base_seconds as u64);

    raw.min(timing.max_seconds as u64).max(timing.min_seconds as u64) as u32
}

/// Per-approach timings for a full intersection, in approach order.
pub fn derive_all_green_seconds(
    approaches: &[ApproachResult; APPROACH_COUNT],
    timing: &TimingConfig,
) -> [u32; APPROACH_COUNT] {
    std::array::from_fn(|i| derive_green_seconds(approaches[i].count, timing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approach(count: usize) -> ApproachResult {
        ApproachResult {
            count,
            vehicles: Vec::new(),
        }
    }

    #[test]
    fn test_empty_approach_gets_minimum_green() {
        let timing = TimingConfig::default();
        assert_eq!(derive_green_seconds(0, &timing), 15);
    }

    #[test]
    fn test_linear_region() {
        let timing = TimingConfig::default();
        assert_eq!(derive_green_seconds(1, &timing), 20);
        assert_eq!(derive_green_seconds(5, &timing), 40);
        assert_eq!(derive_green_seconds(8, &timing), 55);
    }

    #[test]
    fn test_saturates_at_maximum() {
        let timing = TimingConfig::default();
        assert_eq!(derive_green_seconds(9, &timing), 60);
        assert_eq!(derive_green_seconds(100, &timing), 60);
        assert_eq!(derive_green_seconds(usize::MAX, &timing), 60);
    }

    #[test]
    fn test_monotone_in_count() {
        let timing = TimingConfig::default();
        let mut prev = 0;
        for count in 0..20 {
            let secs = derive_green_seconds(count, &timing);
            assert!(secs >= prev, "derivation went down at count {}", count);
            prev = secs;
        }
    }

    #[test]
    fn test_full_intersection() {
        let timing = TimingConfig::default();
        let approaches = [approach(9), approach(6), approach(3), approach(5)];
        assert_eq!(
            derive_all_green_seconds(&approaches, &timing),
            [60, 45, 30, 40]
        );
    }
}
