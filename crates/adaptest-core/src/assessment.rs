//! Validity assessment types and flag aggregation.
//!
//! Combines the analyzer's flags into one severity score, status, and
//! confidence value, and carries the admin-override record. Assessments are
//! created once per completed session and recomputed only on an explicit
//! forced re-run; overrides preserve the prior computed status for audit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Minimum length for an admin override reason.
pub const MIN_OVERRIDE_REASON_LEN: usize = 10;

/// Severity contribution of a high-severity flag.
const HIGH_FLAG_WEIGHT: u32 = 2;
/// Severity contribution of a medium-severity Guttman flag. Medium timing
/// flags are informational only and contribute nothing.
const MEDIUM_GUTTMAN_WEIGHT: u32 = 1;
/// Severity at or above which a session is invalid.
const INVALID_SEVERITY: u32 = 4;
/// Severity at or above which a session is suspect.
const SUSPECT_SEVERITY: u32 = 2;
/// Confidence lost per severity point.
const CONFIDENCE_STEP: f64 = 0.15;

/// Overall validity verdict for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    Valid,
    Suspect,
    Invalid,
    /// Abandoned sessions: no verdict is possible.
    Incomplete,
}

impl fmt::Display for ValidityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidityStatus::Valid => "valid",
            ValidityStatus::Suspect => "suspect",
            ValidityStatus::Invalid => "invalid",
            ValidityStatus::Incomplete => "incomplete",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ValidityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "valid" => Ok(ValidityStatus::Valid),
            "suspect" => Ok(ValidityStatus::Suspect),
            "invalid" => Ok(ValidityStatus::Invalid),
            "incomplete" => Ok(ValidityStatus::Incomplete),
            other => Err(format!("unknown validity status: {other}")),
        }
    }
}

/// Severity of a single flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSeverity {
    High,
    Medium,
}

/// Which sub-check produced a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    PersonFit,
    Timing,
    Guttman,
}

/// The specific anomaly a flag reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    AberrantResponsePattern,
    MultipleRapidResponses,
    SuspiciouslyFastOnHard,
    ExtendedPauses,
    TotalTimeTooFast,
    TotalTimeExcessive,
    HighErrorsAberrant,
    ElevatedErrors,
}

impl FlagKind {
    /// The sub-check this flag kind belongs to.
    pub fn check(&self) -> CheckKind {
        match self {
            FlagKind::AberrantResponsePattern => CheckKind::PersonFit,
            FlagKind::MultipleRapidResponses
            | FlagKind::SuspiciouslyFastOnHard
            | FlagKind::ExtendedPauses
            | FlagKind::TotalTimeTooFast
            | FlagKind::TotalTimeExcessive => CheckKind::Timing,
            FlagKind::HighErrorsAberrant | FlagKind::ElevatedErrors => CheckKind::Guttman,
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlagKind::AberrantResponsePattern => "aberrant_response_pattern",
            FlagKind::MultipleRapidResponses => "multiple_rapid_responses",
            FlagKind::SuspiciouslyFastOnHard => "suspiciously_fast_on_hard",
            FlagKind::ExtendedPauses => "extended_pauses",
            FlagKind::TotalTimeTooFast => "total_time_too_fast",
            FlagKind::TotalTimeExcessive => "total_time_excessive",
            FlagKind::HighErrorsAberrant => "high_errors_aberrant",
            FlagKind::ElevatedErrors => "elevated_errors",
        };
        write!(f, "{s}")
    }
}

/// One anomaly detected in a session's response pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityFlag {
    pub kind: FlagKind,
    pub severity: FlagSeverity,
    /// Free-form detail for the admin surface (counts, ratios, item ids).
    pub details: String,
}

impl ValidityFlag {
    pub fn new(kind: FlagKind, severity: FlagSeverity, details: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            details: details.into(),
        }
    }

    /// Severity-score contribution of this flag.
    fn weight(&self) -> u32 {
        match (self.kind.check(), self.severity) {
            (_, FlagSeverity::High) => HIGH_FLAG_WEIGHT,
            (CheckKind::Guttman, FlagSeverity::Medium) => MEDIUM_GUTTMAN_WEIGHT,
            _ => 0,
        }
    }
}

/// Record of an admin override, preserving the computed status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    /// Admin who performed the override.
    pub admin_id: String,
    /// Human-entered justification, at least `MIN_OVERRIDE_REASON_LEN` chars.
    pub reason: String,
    /// When the override happened.
    pub overridden_at: DateTime<Utc>,
    /// The computed status the override replaced.
    pub prior_status: ValidityStatus,
}

/// The persisted validity verdict for one completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityAssessment {
    /// Unique assessment identifier.
    pub id: Uuid,
    /// The session this assessment belongs to. One assessment per session.
    pub session_id: Uuid,
    /// Current status (post-override if one exists).
    pub status: ValidityStatus,
    /// Aggregated severity score.
    pub severity_score: u32,
    /// Confidence in the verdict, in [0, 1].
    pub confidence: f64,
    /// Ordered flags, in check order.
    pub flags: Vec<ValidityFlag>,
    /// Admin override, if one was applied.
    #[serde(default)]
    pub override_record: Option<OverrideRecord>,
    /// When the assessment was computed.
    pub assessed_at: DateTime<Utc>,
}

impl ValidityAssessment {
    /// Aggregate analyzer flags into an assessment for a completed session.
    pub fn from_flags(session_id: Uuid, flags: Vec<ValidityFlag>) -> Self {
        let severity_score: u32 = flags.iter().map(ValidityFlag::weight).sum();
        let status = if severity_score >= INVALID_SEVERITY {
            ValidityStatus::Invalid
        } else if severity_score >= SUSPECT_SEVERITY {
            ValidityStatus::Suspect
        } else {
            ValidityStatus::Valid
        };

        Self {
            id: Uuid::new_v4(),
            session_id,
            status,
            severity_score,
            confidence: confidence_for(severity_score),
            flags,
            override_record: None,
            assessed_at: Utc::now(),
        }
    }

    /// Assessment for an abandoned session: no flags, no verdict.
    pub fn incomplete(session_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            status: ValidityStatus::Incomplete,
            severity_score: 0,
            confidence: confidence_for(0),
            flags: Vec::new(),
            override_record: None,
            assessed_at: Utc::now(),
        }
    }

    /// Apply an admin override, replacing the status while preserving the
    /// computed one. Rejects reasons under the minimum length before any
    /// mutation.
    pub fn apply_override(
        &mut self,
        new_status: ValidityStatus,
        admin_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), EngineError> {
        let reason = reason.into();
        if reason.chars().count() < MIN_OVERRIDE_REASON_LEN {
            return Err(EngineError::InvalidOverrideReason {
                length: reason.chars().count(),
                minimum: MIN_OVERRIDE_REASON_LEN,
            });
        }

        self.override_record = Some(OverrideRecord {
            admin_id: admin_id.into(),
            reason,
            overridden_at: Utc::now(),
            prior_status: self.status,
        });
        self.status = new_status;
        Ok(())
    }
}

fn confidence_for(severity_score: u32) -> f64 {
    (1.0 - severity_score as f64 * CONFIDENCE_STEP).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(kind: FlagKind, severity: FlagSeverity) -> ValidityFlag {
        ValidityFlag::new(kind, severity, "test")
    }

    #[test]
    fn severity_exactly_four_is_invalid() {
        let a = ValidityAssessment::from_flags(
            Uuid::new_v4(),
            vec![
                flag(FlagKind::AberrantResponsePattern, FlagSeverity::High),
                flag(FlagKind::MultipleRapidResponses, FlagSeverity::High),
            ],
        );
        assert_eq!(a.severity_score, 4);
        assert_eq!(a.status, ValidityStatus::Invalid);
        assert!((a.confidence - 0.4).abs() < 1e-12);
    }

    #[test]
    fn severity_exactly_two_is_suspect() {
        let a = ValidityAssessment::from_flags(
            Uuid::new_v4(),
            vec![flag(FlagKind::TotalTimeTooFast, FlagSeverity::High)],
        );
        assert_eq!(a.severity_score, 2);
        assert_eq!(a.status, ValidityStatus::Suspect);
        assert!((a.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn severity_below_two_is_valid() {
        let a = ValidityAssessment::from_flags(
            Uuid::new_v4(),
            vec![flag(FlagKind::ElevatedErrors, FlagSeverity::Medium)],
        );
        assert_eq!(a.severity_score, 1);
        assert_eq!(a.status, ValidityStatus::Valid);
    }

    #[test]
    fn medium_timing_flags_are_informational() {
        let a = ValidityAssessment::from_flags(
            Uuid::new_v4(),
            vec![
                flag(FlagKind::ExtendedPauses, FlagSeverity::Medium),
                flag(FlagKind::TotalTimeExcessive, FlagSeverity::Medium),
            ],
        );
        assert_eq!(a.severity_score, 0);
        assert_eq!(a.status, ValidityStatus::Valid);
        assert_eq!(a.flags.len(), 2, "flags still appear for the admin surface");
    }

    #[test]
    fn confidence_floors_at_zero() {
        let flags = vec![
            flag(FlagKind::AberrantResponsePattern, FlagSeverity::High),
            flag(FlagKind::MultipleRapidResponses, FlagSeverity::High),
            flag(FlagKind::SuspiciouslyFastOnHard, FlagSeverity::High),
            flag(FlagKind::TotalTimeTooFast, FlagSeverity::High),
        ];
        let a = ValidityAssessment::from_flags(Uuid::new_v4(), flags);
        assert_eq!(a.severity_score, 8);
        assert_eq!(a.confidence, 0.0);
    }

    #[test]
    fn incomplete_assessment_has_no_flags() {
        let a = ValidityAssessment::incomplete(Uuid::new_v4());
        assert_eq!(a.status, ValidityStatus::Incomplete);
        assert_eq!(a.severity_score, 0);
        assert!(a.flags.is_empty());
        assert_eq!(a.confidence, 1.0);
    }

    #[test]
    fn override_preserves_prior_status() {
        let mut a = ValidityAssessment::from_flags(
            Uuid::new_v4(),
            vec![
                flag(FlagKind::AberrantResponsePattern, FlagSeverity::High),
                flag(FlagKind::HighErrorsAberrant, FlagSeverity::High),
            ],
        );
        assert_eq!(a.status, ValidityStatus::Invalid);

        a.apply_override(ValidityStatus::Valid, "admin-1", "reviewed manually, test-taker confirmed")
            .unwrap();
        assert_eq!(a.status, ValidityStatus::Valid);
        let record = a.override_record.as_ref().unwrap();
        assert_eq!(record.prior_status, ValidityStatus::Invalid);
        assert_eq!(record.admin_id, "admin-1");
    }

    #[test]
    fn override_rejects_short_reason_without_mutation() {
        let mut a = ValidityAssessment::from_flags(Uuid::new_v4(), Vec::new());
        let err = a
            .apply_override(ValidityStatus::Invalid, "admin-1", "too short")
            .unwrap_err();
        match err {
            EngineError::InvalidOverrideReason { length, minimum } => {
                assert_eq!(length, 9);
                assert_eq!(minimum, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(a.status, ValidityStatus::Valid);
        assert!(a.override_record.is_none());
    }

    #[test]
    fn flag_kind_display_matches_wire_names() {
        assert_eq!(
            FlagKind::AberrantResponsePattern.to_string(),
            "aberrant_response_pattern"
        );
        assert_eq!(FlagKind::ElevatedErrors.to_string(), "elevated_errors");
    }
}
