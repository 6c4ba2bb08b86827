//! Engine error taxonomy.
//!
//! These error types represent the hard failures the serving layer surfaces
//! to callers. Defined in `adaptest-core` so the session layer can match on
//! variants and map them to distinct user-facing conditions without string
//! matching. Numeric edge cases inside the estimator are handled by clamping
//! and never appear here.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the adaptive engine and assessment operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The eligible item pool is empty or exhausted for this user.
    #[error("no eligible items remain for user {user_id}")]
    NoEligibleItems { user_id: String },

    /// The user already has an in-progress session.
    #[error("user {user_id} already has an active session {session_id}")]
    SessionAlreadyActive { user_id: String, session_id: Uuid },

    /// Minimum interval between completed sessions has not elapsed.
    #[error("user {user_id} must wait {remaining_secs}s before the next session")]
    CadenceNotElapsed { user_id: String, remaining_secs: i64 },

    /// The session does not exist.
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    /// A response was submitted to a session in a terminal state.
    #[error("session {0} is no longer accepting responses")]
    SessionClosed(Uuid),

    /// A submission named an item that is not in the catalog.
    #[error("item {item_id} is not in the item catalog")]
    UnknownItem { item_id: String },

    /// Validity assessment requested for a session that is still running.
    #[error("session {0} is not eligible for assessment: not completed")]
    SessionNotEligibleForAssessment(Uuid),

    /// No assessment exists to override.
    #[error("session {0} has no validity assessment to override")]
    AssessmentNotFound(Uuid),

    /// Override reason failed the minimum-length boundary check.
    #[error("override reason too short: {length} chars, minimum {minimum}")]
    InvalidOverrideReason { length: usize, minimum: usize },

    /// Storage layer failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Returns `true` for conditions that reflect caller input rather than
    /// system state, and should be reported without retry.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidOverrideReason { .. }
                | EngineError::SessionNotEligibleForAssessment(_)
                | EngineError::SessionClosed(_)
                | EngineError::UnknownItem { .. }
        )
    }

    /// Convenience constructor for storage failures.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        EngineError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_classification() {
        let e = EngineError::InvalidOverrideReason {
            length: 3,
            minimum: 10,
        };
        assert!(e.is_rejection());

        let e = EngineError::NoEligibleItems {
            user_id: "u1".into(),
        };
        assert!(!e.is_rejection());
    }

    #[test]
    fn error_messages_name_the_condition() {
        let e = EngineError::CadenceNotElapsed {
            user_id: "u1".into(),
            remaining_secs: 120,
        };
        assert!(e.to_string().contains("120s"));
    }
}
