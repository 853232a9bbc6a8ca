//! Inspection verdict classification.
//!
//! A pure, total mapping from the set of detected domain labels to the
//! inspection outcome. The rule mirrors the production line's decision
//! table:
//!
//! 1. Any defect label (`crooked_bracket`, `washer_friction`) is NOT OK,
//!    regardless of what else was seen.
//! 2. Exactly `{straight_bracket, no_washer_friction}` is OK.
//! 3. Everything else is UNKNOWN.
//!
//! Rule 2 is exact-set equality, not a subset test: a frame where only
//! `straight_bracket` was detected stays UNKNOWN even though the part may
//! well be fine. The strictness is intentional and pinned by tests.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::detect::{DetectionResult, DomainLabel};

/// Inspection outcome for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Ok,
    NotOk,
    Unknown,
}

impl Verdict {
    /// Status string as recorded by the line (matches the stored
    /// `ok` / `not ok` vocabulary).
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Ok => "ok",
            Verdict::NotOk => "not ok",
            Verdict::Unknown => "unknown",
        }
    }

    /// Presentational marker for display surfaces: alert, success, warning.
    pub fn marker(&self) -> &'static str {
        match self {
            Verdict::Ok => "✅",
            Verdict::NotOk => "🚨",
            Verdict::Unknown => "⚠️",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            Verdict::Ok => log::Level::Info,
            Verdict::NotOk => log::Level::Error,
            Verdict::Unknown => log::Level::Warn,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a set of detected domain labels.
pub fn verdict(labels: &BTreeSet<DomainLabel>) -> Verdict {
    if labels.contains(&DomainLabel::CrookedBracket)
        || labels.contains(&DomainLabel::WasherFriction)
    {
        return Verdict::NotOk;
    }

    let good: BTreeSet<DomainLabel> =
        [DomainLabel::StraightBracket, DomainLabel::NoWasherFriction]
            .into_iter()
            .collect();
    if *labels == good {
        return Verdict::Ok;
    }

    Verdict::Unknown
}

/// Classify a detection result. Non-domain labels are ignored here; they are
/// still reported in the result itself.
pub fn verdict_for(result: &DetectionResult) -> Verdict {
    verdict(&result.label_set())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(labels: &[DomainLabel]) -> BTreeSet<DomainLabel> {
        labels.iter().copied().collect()
    }

    #[test]
    fn defect_labels_are_not_ok() {
        assert_eq!(verdict(&set(&[DomainLabel::CrookedBracket])), Verdict::NotOk);
        assert_eq!(verdict(&set(&[DomainLabel::WasherFriction])), Verdict::NotOk);
    }

    #[test]
    fn exact_good_pair_is_ok() {
        assert_eq!(
            verdict(&set(&[
                DomainLabel::StraightBracket,
                DomainLabel::NoWasherFriction
            ])),
            Verdict::Ok
        );
    }

    #[test]
    fn partial_detection_is_unknown_not_ok() {
        assert_eq!(
            verdict(&set(&[DomainLabel::StraightBracket])),
            Verdict::Unknown
        );
        assert_eq!(
            verdict(&set(&[DomainLabel::NoWasherFriction])),
            Verdict::Unknown
        );
    }

    #[test]
    fn empty_set_is_unknown() {
        assert_eq!(verdict(&BTreeSet::new()), Verdict::Unknown);
    }

    #[test]
    fn defect_wins_over_good_pair() {
        assert_eq!(
            verdict(&set(&[
                DomainLabel::CrookedBracket,
                DomainLabel::StraightBracket,
                DomainLabel::NoWasherFriction
            ])),
            Verdict::NotOk
        );
    }

    #[test]
    fn verdict_is_deterministic() {
        let labels = set(&[DomainLabel::StraightBracket, DomainLabel::NoWasherFriction]);
        let first = verdict(&labels);
        for _ in 0..10 {
            assert_eq!(verdict(&labels), first);
        }
    }
}
