//! Response-pattern validity analysis.
//!
//! Three independent statistical checks over one session's ordered response
//! list: person-fit, response-time plausibility, and Guttman-error rate.
//! Each check degrades gracefully on missing data (returning no flags)
//! rather than failing the whole analysis; a partial assessment is more
//! useful than none.

use crate::assessment::{FlagKind, FlagSeverity, ValidityFlag};
use crate::model::DifficultyLabel;
use crate::thresholds::{Expectation, ScoreBand, ValidityThresholds};

/// One response joined with the item facts the analyzer needs.
///
/// The serving layer builds these from `ResponseRecord`s and the item
/// catalog, so the analyzer itself stays a pure function.
#[derive(Debug, Clone)]
pub struct ScoredResponse {
    /// Item that was answered.
    pub item_id: String,
    /// The item's coarse difficulty label.
    pub difficulty: DifficultyLabel,
    /// Empirical proportion-correct (or the label's nominal fallback).
    pub p_value: f64,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Response time, when the client reported one.
    pub time_secs: Option<f64>,
}

/// Run all three checks over a session's ordered responses.
///
/// Returns flags in check order: person-fit, timing, Guttman. Zero
/// responses yields no flags (the session defaults to valid).
pub fn analyze_session(
    responses: &[ScoredResponse],
    thresholds: &ValidityThresholds,
) -> Vec<ValidityFlag> {
    if responses.is_empty() {
        return Vec::new();
    }

    let mut flags = Vec::new();
    flags.extend(check_person_fit(responses, thresholds));
    flags.extend(check_response_times(responses, thresholds));
    flags.extend(check_guttman_errors(responses, thresholds));
    flags
}

/// Classify overall accuracy into a score band.
pub fn score_band(accuracy: f64, thresholds: &ValidityThresholds) -> ScoreBand {
    if accuracy >= thresholds.person_fit.high_band_min {
        ScoreBand::High
    } else if accuracy >= thresholds.person_fit.low_band_max {
        ScoreBand::Medium
    } else {
        ScoreBand::Low
    }
}

/// Person-fit: how often does a response contradict what the expectation
/// table predicts for this test-taker's score band?
pub fn check_person_fit(
    responses: &[ScoredResponse],
    thresholds: &ValidityThresholds,
) -> Vec<ValidityFlag> {
    if responses.is_empty() {
        return Vec::new();
    }

    let pf = &thresholds.person_fit;
    let correct = responses.iter().filter(|r| r.correct).count();
    let accuracy = correct as f64 / responses.len() as f64;
    let band = score_band(accuracy, thresholds);

    let unexpected = responses
        .iter()
        .filter(|r| {
            match pf.expectations.expectation(band, r.difficulty) {
                Expectation::Correct => !r.correct,
                Expectation::Incorrect => r.correct,
                Expectation::Either => false,
            }
        })
        .count();

    let fit_ratio = unexpected as f64 / responses.len() as f64;
    let cutoff = if thresholds.is_short(responses.len()) {
        pf.fit_ratio_short
    } else {
        pf.fit_ratio
    };

    if fit_ratio >= cutoff {
        vec![ValidityFlag::new(
            FlagKind::AberrantResponsePattern,
            FlagSeverity::High,
            format!(
                "{unexpected}/{} responses unexpected for {band:?} band (fit_ratio {fit_ratio:.2}, cutoff {cutoff:.2})",
                responses.len()
            ),
        )]
    } else {
        Vec::new()
    }
}

/// Response-time plausibility over the per-response time sequence.
///
/// Skipped entirely when any response lacks timing data; the counts and the
/// total-time bounds are only meaningful over a complete time sequence.
pub fn check_response_times(
    responses: &[ScoredResponse],
    thresholds: &ValidityThresholds,
) -> Vec<ValidityFlag> {
    let t = &thresholds.timing;
    if responses.is_empty() || responses.iter().any(|r| r.time_secs.is_none()) {
        return Vec::new();
    }
    let timed: Vec<(&ScoredResponse, f64)> = responses
        .iter()
        .filter_map(|r| r.time_secs.map(|secs| (r, secs)))
        .collect();

    let mut flags = Vec::new();

    let rapid = timed.iter().filter(|(_, secs)| *secs < t.rapid_secs).count();
    if rapid >= t.rapid_count {
        flags.push(ValidityFlag::new(
            FlagKind::MultipleRapidResponses,
            FlagSeverity::High,
            format!("{rapid} responses under {:.0}s", t.rapid_secs),
        ));
    }

    let fast_hard = timed
        .iter()
        .filter(|(r, secs)| {
            r.correct && r.difficulty == DifficultyLabel::Hard && *secs < t.fast_hard_secs
        })
        .count();
    if fast_hard >= t.fast_hard_count {
        flags.push(ValidityFlag::new(
            FlagKind::SuspiciouslyFastOnHard,
            FlagSeverity::High,
            format!(
                "{fast_hard} correct hard items under {:.0}s",
                t.fast_hard_secs
            ),
        ));
    }

    let pauses = timed.iter().filter(|(_, secs)| *secs > t.pause_secs).count();
    if pauses > 0 {
        flags.push(ValidityFlag::new(
            FlagKind::ExtendedPauses,
            FlagSeverity::Medium,
            format!("{pauses} response(s) over {:.0}s", t.pause_secs),
        ));
    }

    let total: f64 = timed.iter().map(|(_, secs)| secs).sum();
    if total < t.total_min_secs {
        flags.push(ValidityFlag::new(
            FlagKind::TotalTimeTooFast,
            FlagSeverity::High,
            format!("total time {total:.0}s under {:.0}s", t.total_min_secs),
        ));
    } else if total > t.total_max_secs {
        flags.push(ValidityFlag::new(
            FlagKind::TotalTimeExcessive,
            FlagSeverity::Medium,
            format!("total time {total:.0}s over {:.0}s", t.total_max_secs),
        ));
    }

    flags
}

/// Count of Guttman errors and the normalized rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuttmanSummary {
    pub errors: usize,
    pub error_rate: f64,
}

/// Count (harder correct, easier incorrect) pairs with items ordered by
/// empirical difficulty, easiest first.
pub fn guttman_summary(responses: &[ScoredResponse]) -> GuttmanSummary {
    // Easiest first: highest proportion-correct leads. Ties break by item id
    // so the count is deterministic.
    let mut ordered: Vec<&ScoredResponse> = responses.iter().collect();
    ordered.sort_by(|x, y| {
        y.p_value
            .partial_cmp(&x.p_value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.item_id.cmp(&y.item_id))
    });

    let mut errors = 0usize;
    for (easier_idx, easier) in ordered.iter().enumerate() {
        if easier.correct {
            continue;
        }
        for harder in &ordered[easier_idx + 1..] {
            if harder.correct {
                errors += 1;
            }
        }
    }

    let correct = responses.iter().filter(|r| r.correct).count();
    let incorrect = responses.len() - correct;
    let error_rate = if correct == 0 || incorrect == 0 {
        0.0
    } else {
        errors as f64 / (correct * incorrect) as f64
    };

    GuttmanSummary { errors, error_rate }
}

/// Guttman-error detection: flags response patterns that violate the
/// difficulty ordering too often.
pub fn check_guttman_errors(
    responses: &[ScoredResponse],
    thresholds: &ValidityThresholds,
) -> Vec<ValidityFlag> {
    if responses.is_empty() {
        return Vec::new();
    }

    let g = &thresholds.guttman;
    let summary = guttman_summary(responses);
    let (high, medium) = if thresholds.is_short(responses.len()) {
        (g.high_short, g.medium_short)
    } else {
        (g.high, g.medium)
    };

    let details = format!(
        "{} Guttman error(s), rate {:.2}",
        summary.errors, summary.error_rate
    );

    if summary.error_rate > high {
        vec![ValidityFlag::new(
            FlagKind::HighErrorsAberrant,
            FlagSeverity::High,
            details,
        )]
    } else if summary.error_rate > medium {
        vec![ValidityFlag::new(
            FlagKind::ElevatedErrors,
            FlagSeverity::Medium,
            details,
        )]
    } else {
        Vec::new()
    }
}
