//! Threshold tables for the validity checks.
//!
//! Every cutoff the analyzer applies lives here as plain data with serde
//! derives, so the whole policy can be tuned from `adaptest.toml` and tested
//! against boundary values without code changes.

use serde::{Deserialize, Serialize};

use crate::model::DifficultyLabel;

/// Accuracy band for person-fit analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    High,
    Medium,
    Low,
}

/// What the expectation table predicts for one (band, difficulty) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// The test-taker is expected to answer correctly.
    Correct,
    /// The test-taker is expected to answer incorrectly.
    Incorrect,
    /// No prediction; the response never counts as unexpected.
    Either,
}

/// Expected outcomes for one score band across the three difficulty labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BandExpectations {
    pub easy: Expectation,
    pub medium: Expectation,
    pub hard: Expectation,
}

impl BandExpectations {
    fn for_label(&self, label: DifficultyLabel) -> Expectation {
        match label {
            DifficultyLabel::Easy => self.easy,
            DifficultyLabel::Medium => self.medium,
            DifficultyLabel::Hard => self.hard,
        }
    }
}

/// The person-fit expectation table: which responses count as unexpected
/// for each score band. This is a tunable policy, not a law; the default
/// encodes the common-sense reading (a low scorer getting hard items right
/// while missing easy ones is aberrant, a high scorer missing hard items
/// is not).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectationTable {
    pub high: BandExpectations,
    pub medium: BandExpectations,
    pub low: BandExpectations,
}

impl Default for ExpectationTable {
    fn default() -> Self {
        Self {
            high: BandExpectations {
                easy: Expectation::Correct,
                medium: Expectation::Correct,
                hard: Expectation::Either,
            },
            medium: BandExpectations {
                easy: Expectation::Correct,
                medium: Expectation::Either,
                hard: Expectation::Incorrect,
            },
            low: BandExpectations {
                easy: Expectation::Correct,
                medium: Expectation::Incorrect,
                hard: Expectation::Incorrect,
            },
        }
    }
}

impl ExpectationTable {
    /// Look up the expected outcome for a band/difficulty cell.
    pub fn expectation(&self, band: ScoreBand, label: DifficultyLabel) -> Expectation {
        match band {
            ScoreBand::High => self.high.for_label(label),
            ScoreBand::Medium => self.medium.for_label(label),
            ScoreBand::Low => self.low.for_label(label),
        }
    }
}

/// Person-fit cutoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonFitThresholds {
    /// Accuracy at or above this is the high band.
    pub high_band_min: f64,
    /// Accuracy below this is the low band.
    pub low_band_max: f64,
    /// Flag when the unexpected-response ratio reaches this value.
    pub fit_ratio: f64,
    /// Relaxed ratio for short sessions (higher variance).
    pub fit_ratio_short: f64,
    /// Expectation table for unexpected-response classification.
    pub expectations: ExpectationTable,
}

impl Default for PersonFitThresholds {
    fn default() -> Self {
        Self {
            high_band_min: 0.70,
            low_band_max: 0.40,
            fit_ratio: 0.25,
            fit_ratio_short: 0.40,
            expectations: ExpectationTable::default(),
        }
    }
}

/// Response-time plausibility cutoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingThresholds {
    /// A response under this many seconds counts as rapid.
    pub rapid_secs: f64,
    /// Flag once this many rapid responses occur.
    pub rapid_count: usize,
    /// A correct hard-item response under this many seconds is suspicious.
    pub fast_hard_secs: f64,
    /// Flag once this many suspiciously fast hard responses occur.
    pub fast_hard_count: usize,
    /// Any single response over this many seconds is an extended pause.
    pub pause_secs: f64,
    /// Total session time under this is implausibly fast.
    pub total_min_secs: f64,
    /// Total session time over this is excessive.
    pub total_max_secs: f64,
}

impl Default for TimingThresholds {
    fn default() -> Self {
        Self {
            rapid_secs: 3.0,
            rapid_count: 3,
            fast_hard_secs: 10.0,
            fast_hard_count: 2,
            pause_secs: 300.0,
            total_min_secs: 300.0,
            total_max_secs: 7200.0,
        }
    }
}

/// Guttman-error-rate cutoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuttmanThresholds {
    /// High-severity rate.
    pub high: f64,
    /// Medium-severity rate.
    pub medium: f64,
    /// High-severity rate for short sessions.
    pub high_short: f64,
    /// Medium-severity rate for short sessions.
    pub medium_short: f64,
}

impl Default for GuttmanThresholds {
    fn default() -> Self {
        Self {
            high: 0.30,
            medium: 0.20,
            high_short: 0.45,
            medium_short: 0.30,
        }
    }
}

/// Complete threshold configuration for the validity analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityThresholds {
    /// Sessions with fewer responses than this use the short-session cutoffs.
    #[serde(default = "default_short_session_len")]
    pub short_session_len: usize,
    #[serde(default)]
    pub person_fit: PersonFitThresholds,
    #[serde(default)]
    pub timing: TimingThresholds,
    #[serde(default)]
    pub guttman: GuttmanThresholds,
}

fn default_short_session_len() -> usize {
    5
}

impl Default for ValidityThresholds {
    fn default() -> Self {
        Self {
            short_session_len: default_short_session_len(),
            person_fit: PersonFitThresholds::default(),
            timing: TimingThresholds::default(),
            guttman: GuttmanThresholds::default(),
        }
    }
}

impl ValidityThresholds {
    /// Whether a session of the given length uses the short-session cutoffs.
    pub fn is_short(&self, responses: usize) -> bool {
        responses < self.short_session_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_expectation_table_policy() {
        let table = ExpectationTable::default();
        assert_eq!(
            table.expectation(ScoreBand::Low, DifficultyLabel::Hard),
            Expectation::Incorrect
        );
        assert_eq!(
            table.expectation(ScoreBand::Low, DifficultyLabel::Easy),
            Expectation::Correct
        );
        assert_eq!(
            table.expectation(ScoreBand::High, DifficultyLabel::Hard),
            Expectation::Either
        );
    }

    #[test]
    fn short_session_boundary() {
        let t = ValidityThresholds::default();
        assert!(t.is_short(4));
        assert!(!t.is_short(5));
    }

    #[test]
    fn thresholds_load_from_partial_toml() {
        // Only overridden values need to appear in the config file.
        let toml = r#"
            short_session_len = 3

            [guttman]
            high = 0.5
            medium = 0.25
            high_short = 0.6
            medium_short = 0.4
        "#;
        let t: ValidityThresholds = toml::from_str(toml).unwrap();
        assert_eq!(t.short_session_len, 3);
        assert_eq!(t.guttman.high, 0.5);
        // Untouched sections keep their defaults.
        assert_eq!(t.timing.rapid_secs, 3.0);
        assert_eq!(t.person_fit.fit_ratio, 0.25);
    }
}
