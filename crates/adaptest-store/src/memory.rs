//! In-memory store for tests and simulation.
//!
//! Mirrors the SQLite store's uniqueness rules so engine tests exercise the
//! same failure paths without a database on disk.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use adaptest_core::assessment::ValidityAssessment;
use adaptest_core::error::EngineError;
use adaptest_core::model::{Item, QualityFlag, ResponseRecord, SessionStatus, TestSession};
use adaptest_core::store::Store;

#[derive(Default)]
struct Inner {
    items: HashMap<String, Item>,
    sessions: HashMap<Uuid, TestSession>,
    responses: HashMap<Uuid, Vec<ResponseRecord>>,
    assessments: HashMap<Uuid, ValidityAssessment>,
}

/// A `Store` kept entirely in memory.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create a store seeded with an item catalog.
    pub fn new(items: Vec<Item>) -> Self {
        let items = items.into_iter().map(|i| (i.id.clone(), i)).collect();
        Self {
            inner: RwLock::new(Inner {
                items,
                ..Inner::default()
            }),
        }
    }

    /// An empty store (no items); useful for failure-path tests.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_items(&self) -> Result<Vec<Item>, EngineError> {
        let inner = self.inner.read().await;
        let mut items: Vec<Item> = inner.items.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn items_seen_by_user(&self, user_id: &str) -> Result<HashSet<String>, EngineError> {
        let inner = self.inner.read().await;
        let mut seen = HashSet::new();
        for session in inner.sessions.values() {
            if session.user_id != user_id {
                continue;
            }
            if let Some(responses) = inner.responses.get(&session.id) {
                seen.extend(responses.iter().map(|r| r.item_id.clone()));
            }
        }
        Ok(seen)
    }

    async fn record_item_administration(
        &self,
        item_id: &str,
        correct: bool,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.write().await;
        let item = inner
            .items
            .get_mut(item_id)
            .ok_or_else(|| EngineError::storage(format!("unknown item: {item_id}")))?;

        let n = item.response_count as f64;
        let prior = item.effective_p_value();
        let outcome = if correct { 1.0 } else { 0.0 };
        item.p_value = Some((prior * n + outcome) / (n + 1.0));
        item.response_count += 1;

        if item.needs_auto_review() {
            tracing::warn!(item_id = %item.id, "moving item to under_review");
            item.quality = QualityFlag::UnderReview;
        }
        Ok(())
    }

    async fn set_item_quality(
        &self,
        item_id: &str,
        quality: QualityFlag,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.write().await;
        let item = inner
            .items
            .get_mut(item_id)
            .ok_or_else(|| EngineError::storage(format!("unknown item: {item_id}")))?;
        item.quality = quality;
        Ok(())
    }

    async fn active_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<TestSession>, EngineError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.status == SessionStatus::InProgress)
            .cloned())
    }

    async fn last_completed_at(
        &self,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.status == SessionStatus::Completed)
            .filter_map(|s| s.completed_at)
            .max())
    }

    async fn insert_session(&self, session: &TestSession) -> Result<(), EngineError> {
        let mut inner = self.inner.write().await;
        let active = inner
            .sessions
            .values()
            .find(|s| s.user_id == session.user_id && s.status == SessionStatus::InProgress);
        if let Some(active) = active {
            return Err(EngineError::SessionAlreadyActive {
                user_id: session.user_id.clone(),
                session_id: active.id,
            });
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<TestSession, EngineError> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(&id)
            .cloned()
            .ok_or(EngineError::SessionNotFound(id))
    }

    async fn update_session(&self, session: &TestSession) -> Result<(), EngineError> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&session.id) {
            return Err(EngineError::SessionNotFound(session.id));
        }
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn append_response(&self, response: &ResponseRecord) -> Result<(), EngineError> {
        let mut inner = self.inner.write().await;
        let responses = inner.responses.entry(response.session_id).or_default();
        if responses.iter().any(|r| r.sequence == response.sequence) {
            return Err(EngineError::storage(format!(
                "duplicate sequence {} for session {}",
                response.sequence, response.session_id
            )));
        }
        responses.push(response.clone());
        responses.sort_by_key(|r| r.sequence);
        Ok(())
    }

    async fn list_responses(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<ResponseRecord>, EngineError> {
        let inner = self.inner.read().await;
        Ok(inner.responses.get(&session_id).cloned().unwrap_or_default())
    }

    async fn insert_assessment_if_absent(
        &self,
        assessment: &ValidityAssessment,
    ) -> Result<ValidityAssessment, EngineError> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .assessments
            .entry(assessment.session_id)
            .or_insert_with(|| assessment.clone())
            .clone())
    }

    async fn get_assessment(
        &self,
        session_id: Uuid,
    ) -> Result<Option<ValidityAssessment>, EngineError> {
        let inner = self.inner.read().await;
        Ok(inner.assessments.get(&session_id).cloned())
    }

    async fn replace_assessment(
        &self,
        assessment: &ValidityAssessment,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.write().await;
        inner
            .assessments
            .insert(assessment.session_id, assessment.clone());
        Ok(())
    }

    async fn list_assessments(&self) -> Result<Vec<ValidityAssessment>, EngineError> {
        let inner = self.inner.read().await;
        let mut all: Vec<ValidityAssessment> = inner.assessments.values().cloned().collect();
        all.sort_by_key(|a| a.assessed_at);
        Ok(all)
    }
}
