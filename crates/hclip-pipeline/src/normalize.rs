//! Duration normalization.
//!
//! The model only approximates the requested length, so its window is
//! re-centred to exactly `target` seconds before cutting.

use tracing::warn;

use hclip_models::HighlightCandidate;

/// Re-centre `candidate` on its midpoint with length exactly `target`.
///
/// The window never starts before zero. Summary and reason are kept. A
/// candidate whose end is exactly `start + target` (as computed below) is
/// returned as-is, so normalizing twice changes nothing.
pub fn normalize(candidate: &HighlightCandidate, target: f64) -> HighlightCandidate {
    if candidate.start_time >= 0.0 && candidate.end_time == candidate.start_time + target {
        return candidate.clone();
    }

    let center = (candidate.start_time + candidate.end_time) / 2.0;
    let half = target / 2.0;
    let start_time = (center - half).max(0.0);

    HighlightCandidate {
        start_time,
        end_time: start_time + target,
        ..candidate.clone()
    }
}

/// [`normalize`], then keep the window inside `[0, source_duration]`.
///
/// A window running past the end is shifted left to finish at the end of
/// the source. Sources shorter than `target` get `[0, target]`; the cut then
/// stops at end of media.
pub fn normalize_within(
    candidate: &HighlightCandidate,
    target: f64,
    source_duration: f64,
) -> HighlightCandidate {
    let normalized = normalize(candidate, target);

    if !source_duration.is_finite() || source_duration <= 0.0 {
        return normalized;
    }
    if normalized.end_time <= source_duration {
        return normalized;
    }

    if source_duration >= target {
        let start_time = source_duration - target;
        return HighlightCandidate {
            start_time,
            end_time: start_time + target,
            ..normalized
        };
    }

    warn!(
        source_duration = source_duration,
        target = target,
        "Source is shorter than the target duration, clip will end at end of media"
    );
    HighlightCandidate {
        start_time: 0.0,
        end_time: target,
        ..normalized
    }
}

/// Applies the configured normalization policy.
#[derive(Debug, Clone, Copy)]
pub struct DurationNormalizer {
    clamp_to_source: bool,
}

impl DurationNormalizer {
    pub fn new(clamp_to_source: bool) -> Self {
        Self { clamp_to_source }
    }

    pub fn clamps_to_source(&self) -> bool {
        self.clamp_to_source
    }

    /// Normalize, bounded by `source_duration` when clamping is on and the
    /// duration is known.
    pub fn apply(
        &self,
        candidate: &HighlightCandidate,
        target: f64,
        source_duration: Option<f64>,
    ) -> HighlightCandidate {
        match source_duration {
            Some(duration) if self.clamp_to_source => normalize_within(candidate, target, duration),
            _ => normalize(candidate, target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn candidate(start: f64, end: f64) -> HighlightCandidate {
        HighlightCandidate::new(start, end, "summary", "reason")
    }

    #[test]
    fn test_recentres_long_window() {
        let out = normalize(&candidate(50.0, 100.0), 30.0);
        assert_eq!(out.start_time, 60.0);
        assert_eq!(out.end_time, 90.0);
        assert_eq!(out.summary, "summary");
        assert_eq!(out.reason, "reason");
    }

    #[test]
    fn test_clamps_start_at_zero() {
        let out = normalize(&candidate(5.0, 20.0), 30.0);
        assert_eq!(out.start_time, 0.0);
        assert_eq!(out.end_time, 30.0);
    }

    #[test]
    fn test_exact_length_for_assorted_inputs() {
        let inputs = [(0.0, 1.0), (12.3, 47.9), (100.0, 100.5), (3.0, 600.0), (0.0, 30.0)];
        for target in [10.0, 15.0, 30.0, 45.0, 60.0] {
            for (s, e) in inputs {
                let out = normalize(&candidate(s, e), target);
                assert!(out.start_time >= 0.0);
                assert!(
                    (out.end_time - out.start_time - target).abs() < 1e-9,
                    "{s}..{e} @ {target} gave {}..{}",
                    out.start_time,
                    out.end_time
                );
            }
        }
    }

    #[test]
    fn test_idempotent() {
        for (s, e) in [(50.0, 100.0), (5.0, 20.0), (0.0, 30.0), (7.25, 9.5)] {
            let once = normalize(&candidate(s, e), 30.0);
            let twice = normalize(&once, 30.0);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_idempotent_for_fractional_inputs() {
        let once = normalize(
            &candidate(950.7552657973922, 1681.4413209628885),
            266.98392176529586,
        );
        assert_eq!(normalize(&once, 266.98392176529586), once);

        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..50_000 {
            let start = rng.random_range(0.0..5000.0);
            let end = start + rng.random_range(0.001..2000.0);
            let target = rng.random_range(0.5..600.0);

            let once = normalize(&candidate(start, end), target);
            let twice = normalize(&once, target);
            assert_eq!(once, twice, "{start}..{end} @ {target}");
        }
    }

    #[test]
    fn test_within_shifts_left_at_source_end() {
        let out = normalize_within(&candidate(280.0, 300.0), 30.0, 290.0);
        assert_eq!(out.start_time, 260.0);
        assert_eq!(out.end_time, 290.0);
    }

    #[test]
    fn test_within_leaves_inner_window() {
        let out = normalize_within(&candidate(50.0, 100.0), 30.0, 300.0);
        assert_eq!((out.start_time, out.end_time), (60.0, 90.0));
    }

    #[test]
    fn test_within_short_source() {
        let out = normalize_within(&candidate(10.0, 40.0), 30.0, 20.0);
        assert_eq!((out.start_time, out.end_time), (0.0, 30.0));
    }

    #[test]
    fn test_normalizer_policy() {
        let c = candidate(280.0, 300.0);

        let clamped = DurationNormalizer::new(true).apply(&c, 30.0, Some(290.0));
        assert_eq!(clamped.end_time, 290.0);

        let unclamped = DurationNormalizer::new(false).apply(&c, 30.0, Some(290.0));
        assert_eq!(unclamped.end_time, 305.0);

        let unknown = DurationNormalizer::new(true).apply(&c, 30.0, None);
        assert_eq!(unknown.end_time, 305.0);
    }
}
