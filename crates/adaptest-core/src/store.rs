//! Storage trait for the serving layer.
//!
//! The engines hold no state between calls; everything flows through an
//! implementation of this trait. Implementations live in `adaptest-store`
//! (SQLite for real deployments, in-memory for tests and simulation).
//!
//! Uniqueness guarantees implementations must back:
//! - one in-progress session per user,
//! - one response per (session, sequence),
//! - one assessment per session (`insert_assessment_if_absent` is the
//!   idempotence guard for racing completion triggers).

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::assessment::ValidityAssessment;
use crate::error::EngineError;
use crate::model::{Item, QualityFlag, ResponseRecord, TestSession};

/// Persistent state consumed and produced by the engines.
#[async_trait]
pub trait Store: Send + Sync {
    // --- item catalog -----------------------------------------------------

    /// Snapshot of the full item catalog, including flagged items.
    async fn list_items(&self) -> Result<Vec<Item>, EngineError>;

    /// Ids of every item the user has been served in any session, for
    /// cross-session non-repetition.
    async fn items_seen_by_user(&self, user_id: &str) -> Result<HashSet<String>, EngineError>;

    /// Record one administration of an item: bump the response count, fold
    /// the outcome into the empirical p-value, and apply the automatic
    /// negative-discrimination review rule.
    async fn record_item_administration(
        &self,
        item_id: &str,
        correct: bool,
    ) -> Result<(), EngineError>;

    /// Admin mutation of an item's quality flag.
    async fn set_item_quality(
        &self,
        item_id: &str,
        quality: QualityFlag,
    ) -> Result<(), EngineError>;

    // --- sessions ---------------------------------------------------------

    /// The user's in-progress session, if any.
    async fn active_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<TestSession>, EngineError>;

    /// Completion time of the user's most recently completed session.
    async fn last_completed_at(
        &self,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, EngineError>;

    /// Insert a fresh session. Fails if the user already has one in
    /// progress.
    async fn insert_session(&self, session: &TestSession) -> Result<(), EngineError>;

    async fn get_session(&self, id: Uuid) -> Result<TestSession, EngineError>;

    /// Persist updated session fields (status, theta, se, completion time).
    async fn update_session(&self, session: &TestSession) -> Result<(), EngineError>;

    // --- responses --------------------------------------------------------

    /// Append a response. The (session, sequence) pair is unique; a
    /// duplicate append is a storage error, which serializes racing
    /// submissions.
    async fn append_response(&self, response: &ResponseRecord) -> Result<(), EngineError>;

    /// All responses for a session, ordered by sequence position.
    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<ResponseRecord>, EngineError>;

    // --- assessments ------------------------------------------------------

    /// Insert an assessment unless one already exists for the session, and
    /// return the stored record either way. The existing record always
    /// wins, making repeated completion triggers a no-op.
    async fn insert_assessment_if_absent(
        &self,
        assessment: &ValidityAssessment,
    ) -> Result<ValidityAssessment, EngineError>;

    async fn get_assessment(
        &self,
        session_id: Uuid,
    ) -> Result<Option<ValidityAssessment>, EngineError>;

    /// Replace the stored assessment (forced re-run or admin override).
    async fn replace_assessment(
        &self,
        assessment: &ValidityAssessment,
    ) -> Result<(), EngineError>;

    /// Every stored assessment, for reporting.
    async fn list_assessments(&self) -> Result<Vec<ValidityAssessment>, EngineError>;
}
