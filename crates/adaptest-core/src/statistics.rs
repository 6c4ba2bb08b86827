//! Aggregate validity statistics for the admin dashboard.
//!
//! Read-only aggregation over persisted assessments: status counts, flag-type
//! breakdown, and a trend comparison between two adjacent time windows.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::{ValidityAssessment, ValidityStatus};

/// Filters for `report_validity`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilters {
    /// Only include assessments computed at or after this instant.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Only include assessments computed before this instant.
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    /// Only include assessments with this status.
    #[serde(default)]
    pub status: Option<ValidityStatus>,
}

impl ReportFilters {
    fn matches(&self, assessment: &ValidityAssessment) -> bool {
        if let Some(since) = self.since {
            if assessment.assessed_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if assessment.assessed_at >= until {
                return false;
            }
        }
        if let Some(status) = self.status {
            if assessment.status != status {
                return false;
            }
        }
        true
    }
}

/// Counts for one time window in the trend comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowStats {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Assessments computed in the window.
    pub total: usize,
    /// Suspect or invalid assessments in the window.
    pub flagged: usize,
    /// `flagged / total`, 0 for an empty window.
    pub flagged_rate: f64,
}

/// Flagged-rate movement between two adjacent windows of equal length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendComparison {
    pub current: WindowStats,
    pub previous: WindowStats,
    /// `current.flagged_rate - previous.flagged_rate`.
    pub flagged_rate_delta: f64,
}

/// Aggregate statistics over a set of assessments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidityReport {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Filters that produced it.
    pub filters: ReportFilters,
    /// Assessments matching the filters.
    pub total: usize,
    /// Count per status, keyed by wire name for stable ordering.
    pub status_counts: BTreeMap<String, usize>,
    /// Count per flag type across all matching assessments.
    pub flag_counts: BTreeMap<String, usize>,
    /// Mean severity score.
    pub avg_severity: f64,
    /// Mean confidence.
    pub avg_confidence: f64,
    /// Assessments carrying an admin override.
    pub override_count: usize,
    /// Two-window trend, when a reference instant was supplied.
    #[serde(default)]
    pub trend: Option<TrendComparison>,
}

impl ValidityReport {
    /// Save the report as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }
}

/// Compute a validity report over the given assessments.
///
/// `trend_now` anchors the two-window trend comparison (current window is
/// `[trend_now - window, trend_now)`, previous the adjacent one before it);
/// pass `None` to skip the trend.
pub fn compute_validity_report(
    assessments: &[ValidityAssessment],
    filters: &ReportFilters,
    trend_now: Option<DateTime<Utc>>,
    trend_window: Duration,
) -> ValidityReport {
    let matching: Vec<&ValidityAssessment> = assessments
        .iter()
        .filter(|a| filters.matches(a))
        .collect();

    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut flag_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut severity_sum = 0u64;
    let mut confidence_sum = 0.0f64;
    let mut override_count = 0usize;

    for a in &matching {
        *status_counts.entry(a.status.to_string()).or_insert(0) += 1;
        for flag in &a.flags {
            *flag_counts.entry(flag.kind.to_string()).or_insert(0) += 1;
        }
        severity_sum += a.severity_score as u64;
        confidence_sum += a.confidence;
        if a.override_record.is_some() {
            override_count += 1;
        }
    }

    let total = matching.len();
    let (avg_severity, avg_confidence) = if total > 0 {
        (
            severity_sum as f64 / total as f64,
            confidence_sum / total as f64,
        )
    } else {
        (0.0, 0.0)
    };

    let trend = trend_now.map(|now| {
        let current = window_stats(&matching, now - trend_window, now);
        let previous = window_stats(&matching, now - trend_window * 2, now - trend_window);
        let flagged_rate_delta = current.flagged_rate - previous.flagged_rate;
        TrendComparison {
            current,
            previous,
            flagged_rate_delta,
        }
    });

    ValidityReport {
        generated_at: Utc::now(),
        filters: filters.clone(),
        total,
        status_counts,
        flag_counts,
        avg_severity,
        avg_confidence,
        override_count,
        trend,
    }
}

fn window_stats(
    assessments: &[&ValidityAssessment],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> WindowStats {
    let in_window: Vec<_> = assessments
        .iter()
        .filter(|a| a.assessed_at >= from && a.assessed_at < to)
        .collect();
    let total = in_window.len();
    let flagged = in_window
        .iter()
        .filter(|a| matches!(a.status, ValidityStatus::Suspect | ValidityStatus::Invalid))
        .count();
    let flagged_rate = if total > 0 {
        flagged as f64 / total as f64
    } else {
        0.0
    };

    WindowStats {
        from,
        to,
        total,
        flagged,
        flagged_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{FlagKind, FlagSeverity, ValidityFlag};
    use uuid::Uuid;

    fn assessment(flags: Vec<ValidityFlag>, age_days: i64) -> ValidityAssessment {
        let mut a = ValidityAssessment::from_flags(Uuid::new_v4(), flags);
        a.assessed_at = Utc::now() - Duration::days(age_days);
        a
    }

    fn high_flag() -> ValidityFlag {
        ValidityFlag::new(
            FlagKind::MultipleRapidResponses,
            FlagSeverity::High,
            "test",
        )
    }

    #[test]
    fn status_and_flag_breakdown() {
        let assessments = vec![
            assessment(vec![], 1),
            assessment(vec![high_flag()], 1),
            assessment(vec![high_flag(), high_flag()], 1),
        ];
        let report = compute_validity_report(
            &assessments,
            &ReportFilters::default(),
            None,
            Duration::days(7),
        );
        assert_eq!(report.total, 3);
        assert_eq!(report.status_counts.get("valid"), Some(&1));
        assert_eq!(report.status_counts.get("suspect"), Some(&1));
        assert_eq!(report.status_counts.get("invalid"), Some(&1));
        assert_eq!(report.flag_counts.get("multiple_rapid_responses"), Some(&3));
        assert!(report.trend.is_none());
    }

    #[test]
    fn filters_by_status_and_time() {
        let assessments = vec![
            assessment(vec![], 1),
            assessment(vec![high_flag()], 1),
            assessment(vec![], 30),
        ];
        let filters = ReportFilters {
            since: Some(Utc::now() - Duration::days(7)),
            until: None,
            status: Some(ValidityStatus::Valid),
        };
        let report =
            compute_validity_report(&assessments, &filters, None, Duration::days(7));
        assert_eq!(report.total, 1);
    }

    #[test]
    fn trend_compares_adjacent_windows() {
        // Previous window clean, current window fully flagged.
        let assessments = vec![
            assessment(vec![], 10),
            assessment(vec![], 9),
            assessment(vec![high_flag()], 2),
            assessment(vec![high_flag()], 1),
        ];
        let report = compute_validity_report(
            &assessments,
            &ReportFilters::default(),
            Some(Utc::now()),
            Duration::days(7),
        );
        let trend = report.trend.unwrap();
        assert_eq!(trend.current.total, 2);
        assert_eq!(trend.current.flagged, 2);
        assert_eq!(trend.previous.total, 2);
        assert_eq!(trend.previous.flagged, 0);
        assert!((trend.flagged_rate_delta - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_input_produces_zeroed_report() {
        let report = compute_validity_report(
            &[],
            &ReportFilters::default(),
            None,
            Duration::days(7),
        );
        assert_eq!(report.total, 0);
        assert_eq!(report.avg_severity, 0.0);
        assert_eq!(report.avg_confidence, 0.0);
    }

    #[test]
    fn json_roundtrip() {
        let assessments = vec![assessment(vec![high_flag()], 1)];
        let report = compute_validity_report(
            &assessments,
            &ReportFilters::default(),
            None,
            Duration::days(7),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.save_json(&path).unwrap();
        let loaded = ValidityReport::load_json(&path).unwrap();
        assert_eq!(loaded.total, 1);
        assert_eq!(
            loaded.flag_counts.get("multiple_rapid_responses"),
            Some(&1)
        );
    }
}
