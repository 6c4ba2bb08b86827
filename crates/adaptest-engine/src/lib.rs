//! adaptest-engine — session orchestration over a `Store`.
//!
//! `TestingService` drives adaptive sessions (start, submit, stop), runs the
//! validity assessment when a session reaches a terminal state, and exposes
//! the admin operations (forced re-assessment, override, reporting). The
//! engines themselves are pure functions in `adaptest-core`; this crate owns
//! the read-estimate-select-write cycle and its serialization.

pub mod config;
pub mod simulate;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use adaptest_core::assessment::{ValidityAssessment, ValidityStatus};
use adaptest_core::error::EngineError;
pub use adaptest_core::irt::{estimate_ability, AbilityEstimate};
use adaptest_core::model::{
    Item, ResponseRecord, SessionStatus, TestMode, TestSession,
};
use adaptest_core::selector::{eligible_items, select_next, should_stop, StopReason};
use adaptest_core::statistics::{compute_validity_report, ReportFilters, ValidityReport};
use adaptest_core::store::Store;
use adaptest_core::validity::{analyze_session, ScoredResponse};

pub use config::EngineConfig;

/// Result of starting an adaptive session: the session plus its first item.
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub session: TestSession,
    pub item: Item,
    pub theta: f64,
    pub se: f64,
}

/// One answer submitted to an in-progress session.
#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    /// The item being answered (echoed back by the client).
    pub item_id: String,
    /// The selected answer.
    pub answer: String,
    /// Whether the answer was correct; grading is owned by the delivery
    /// layer, which holds the answer keys.
    pub correct: bool,
    /// Client-reported response time, if available.
    pub response_time_secs: Option<f64>,
}

/// What happened after a submission: another item, or the session ended.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Serve this item next.
    Next { item: Item, theta: f64, se: f64 },
    /// The session completed; the assessment has already been computed.
    Completed {
        session: TestSession,
        stop_reason: StopReason,
        assessment: ValidityAssessment,
    },
}

/// The serving layer: all operations a request handler invokes.
pub struct TestingService<S: Store> {
    store: Arc<S>,
    config: EngineConfig,
    /// Per-session locks serializing concurrent submissions. Different
    /// sessions never contend.
    session_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl<S: Store> TestingService<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn session_lock(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        Arc::clone(locks.entry(session_id).or_default())
    }

    async fn drop_session_lock(&self, session_id: Uuid) {
        self.session_locks.lock().await.remove(&session_id);
    }

    /// Start an adaptive session for a user and select the first item.
    ///
    /// Fails distinctly on an already-active session, an unelapsed cadence
    /// interval, and an empty eligible pool.
    pub async fn start_session(&self, user_id: &str) -> Result<SessionStart, EngineError> {
        if let Some(active) = self.store.active_session_for_user(user_id).await? {
            return Err(EngineError::SessionAlreadyActive {
                user_id: user_id.to_string(),
                session_id: active.id,
            });
        }

        if self.config.session_cadence_secs > 0 {
            if let Some(last) = self.store.last_completed_at(user_id).await? {
                let elapsed = (Utc::now() - last).num_seconds();
                let remaining = self.config.session_cadence_secs - elapsed;
                if remaining > 0 {
                    return Err(EngineError::CadenceNotElapsed {
                        user_id: user_id.to_string(),
                        remaining_secs: remaining,
                    });
                }
            }
        }

        let pool = self.store.list_items().await?;
        let seen = self.store.items_seen_by_user(user_id).await?;
        let cold = estimate_ability(&[], &self.config.estimator);

        // Selection before the session write: an empty pool must not leave
        // an orphaned session behind.
        let answered = std::collections::HashSet::new();
        let first = select_next(cold.theta, &pool, &answered, &seen, user_id)?.clone();

        let mut session = TestSession::new(user_id, TestMode::Adaptive);
        session.theta = Some(cold.theta);
        session.se = Some(cold.se);
        self.store.insert_session(&session).await?;

        tracing::info!(
            session_id = %session.id,
            user_id,
            first_item = %first.id,
            "adaptive session started"
        );

        Ok(SessionStart {
            theta: cold.theta,
            se: cold.se,
            session,
            item: first,
        })
    }

    /// Record one answer, re-estimate ability, and either select the next
    /// item or complete the session.
    ///
    /// Submissions for the same session are serialized by a per-session
    /// lock, so two racing calls cannot both select from a stale estimate.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        submission: AnswerSubmission,
    ) -> Result<SubmitOutcome, EngineError> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.store.get_session(session_id).await?;
        if session.status.is_terminal() {
            return Err(EngineError::SessionClosed(session_id));
        }

        // Resolve the item before writing anything: a submission naming an
        // unknown item must not leave a response record behind.
        let pool = self.store.list_items().await?;
        let catalog: HashMap<&str, &Item> = pool.iter().map(|i| (i.id.as_str(), i)).collect();
        if !catalog.contains_key(submission.item_id.as_str()) {
            return Err(EngineError::UnknownItem {
                item_id: submission.item_id,
            });
        }

        let responses = self.store.list_responses(session_id).await?;
        let record = ResponseRecord {
            session_id,
            item_id: submission.item_id.clone(),
            answer: submission.answer,
            correct: submission.correct,
            response_time_secs: submission.response_time_secs,
            sequence: responses.len() as u32,
        };
        self.store.append_response(&record).await?;
        self.store
            .record_item_administration(&submission.item_id, submission.correct)
            .await?;

        // Re-read the ordered history and re-estimate. Sequence position is
        // authoritative; the store returns responses in that order.
        let responses = self.store.list_responses(session_id).await?;

        let history: Vec<_> = responses
            .iter()
            .filter_map(|r| catalog.get(r.item_id.as_str()).map(|i| (i.params, r.correct)))
            .collect();
        let estimate = estimate_ability(&history, &self.config.estimator);

        let estimate = if estimate.stable {
            estimate
        } else {
            // Non-fatal: keep the last persisted estimate and move on.
            tracing::warn!(
                session_id = %session_id,
                theta = estimate.theta,
                "ability estimation did not converge, keeping previous estimate"
            );
            AbilityEstimate {
                theta: session.theta.unwrap_or(estimate.theta),
                se: session.se.unwrap_or(estimate.se),
                stable: false,
            }
        };

        session.theta = Some(estimate.theta);
        session.se = Some(estimate.se);

        let answered: std::collections::HashSet<String> =
            responses.iter().map(|r| r.item_id.clone()).collect();
        let seen = self.store.items_seen_by_user(&session.user_id).await?;
        let eligible = eligible_items(&pool, &answered, &seen);

        if let Some(reason) = should_stop(
            estimate.se,
            responses.len() as u32,
            eligible.len(),
            &self.config.selector,
        ) {
            session.status = SessionStatus::Completed;
            session.completed_at = Some(Utc::now());
            self.store.update_session(&session).await?;
            self.drop_session_lock(session_id).await;

            tracing::info!(
                session_id = %session_id,
                theta = estimate.theta,
                se = estimate.se,
                ?reason,
                "adaptive session completed"
            );

            let assessment = self.assess_validity(session_id, false).await?;
            return Ok(SubmitOutcome::Completed {
                session,
                stop_reason: reason,
                assessment,
            });
        }

        self.store.update_session(&session).await?;
        let next = select_next(estimate.theta, &pool, &answered, &seen, &session.user_id)?;

        Ok(SubmitOutcome::Next {
            item: next.clone(),
            theta: estimate.theta,
            se: estimate.se,
        })
    }

    /// Mark an in-progress session abandoned and record an incomplete
    /// assessment.
    pub async fn abandon_session(&self, session_id: Uuid) -> Result<TestSession, EngineError> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut session = self.store.get_session(session_id).await?;
        if session.status.is_terminal() {
            return Err(EngineError::SessionClosed(session_id));
        }
        session.status = SessionStatus::Abandoned;
        session.completed_at = Some(Utc::now());
        self.store.update_session(&session).await?;
        self.drop_session_lock(session_id).await;

        self.store
            .insert_assessment_if_absent(&ValidityAssessment::incomplete(session_id))
            .await?;
        Ok(session)
    }

    /// Compute (or fetch) the validity assessment for a terminal session.
    ///
    /// Without `force` this is idempotent: the stored assessment is returned
    /// unchanged, and racing completion triggers collapse onto one record
    /// via the store's insert-if-absent. With `force` the flags and score
    /// are recomputed; an existing admin override is carried forward and
    /// still wins.
    pub async fn assess_validity(
        &self,
        session_id: Uuid,
        force: bool,
    ) -> Result<ValidityAssessment, EngineError> {
        let session = self.store.get_session(session_id).await?;

        match session.status {
            SessionStatus::InProgress => {
                return Err(EngineError::SessionNotEligibleForAssessment(session_id));
            }
            SessionStatus::Abandoned => {
                let assessment = ValidityAssessment::incomplete(session_id);
                return self.store.insert_assessment_if_absent(&assessment).await;
            }
            SessionStatus::Completed => {}
        }

        if !force {
            if let Some(existing) = self.store.get_assessment(session_id).await? {
                return Ok(existing);
            }
        }

        let scored = self.scored_responses(session_id).await?;
        let flags = analyze_session(&scored, &self.config.thresholds);
        let mut assessment = ValidityAssessment::from_flags(session_id, flags);

        tracing::info!(
            session_id = %session_id,
            status = %assessment.status,
            severity = assessment.severity_score,
            flags = assessment.flags.len(),
            "validity assessment computed"
        );

        if force {
            // Carry an existing override forward; a forced recompute
            // refreshes the statistics but never erases review history.
            if let Some(previous) = self.store.get_assessment(session_id).await? {
                if let Some(record) = previous.override_record {
                    assessment.status = previous.status;
                    assessment.override_record = Some(record);
                }
            }
            self.store.replace_assessment(&assessment).await?;
            Ok(assessment)
        } else {
            self.store.insert_assessment_if_absent(&assessment).await
        }
    }

    /// Admin override of a computed assessment. The reason must be at least
    /// ten characters; the computed status is preserved in the override
    /// record.
    pub async fn override_validity(
        &self,
        session_id: Uuid,
        new_status: ValidityStatus,
        admin_id: &str,
        reason: &str,
    ) -> Result<ValidityAssessment, EngineError> {
        let mut assessment = self
            .store
            .get_assessment(session_id)
            .await?
            .ok_or(EngineError::AssessmentNotFound(session_id))?;

        assessment.apply_override(new_status, admin_id, reason)?;
        self.store.replace_assessment(&assessment).await?;

        tracing::info!(
            session_id = %session_id,
            admin_id,
            new_status = %new_status,
            "validity status overridden"
        );
        Ok(assessment)
    }

    /// Aggregate statistics over stored assessments for the admin surface.
    pub async fn report_validity(
        &self,
        filters: &ReportFilters,
    ) -> Result<ValidityReport, EngineError> {
        let assessments = self.store.list_assessments().await?;
        Ok(compute_validity_report(
            &assessments,
            filters,
            Some(Utc::now()),
            Duration::days(self.config.trend_window_days),
        ))
    }

    /// Join a session's responses with item facts for the analyzer.
    async fn scored_responses(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<ScoredResponse>, EngineError> {
        let responses = self.store.list_responses(session_id).await?;
        let pool = self.store.list_items().await?;
        let catalog: HashMap<&str, &Item> = pool.iter().map(|i| (i.id.as_str(), i)).collect();

        Ok(responses
            .iter()
            .filter_map(|r| {
                let Some(item) = catalog.get(r.item_id.as_str()) else {
                    tracing::warn!(
                        item_id = %r.item_id,
                        "response references unknown item, skipping in analysis"
                    );
                    return None;
                };
                Some(ScoredResponse {
                    item_id: r.item_id.clone(),
                    difficulty: item.difficulty,
                    p_value: item.effective_p_value(),
                    correct: r.correct,
                    time_secs: r.response_time_secs,
                })
            })
            .collect())
    }
}
