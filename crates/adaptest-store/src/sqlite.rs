//! SQLite-backed store.
//!
//! Schema constraints back the engine's guarantees: a partial unique index
//! enforces one in-progress session per user, the (session, sequence)
//! primary key serializes racing submissions, and `INSERT OR IGNORE` on the
//! assessments table makes assessment creation idempotent. Assessments are
//! stored as JSON payloads; their shape is owned by `adaptest-core`.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use adaptest_core::assessment::ValidityAssessment;
use adaptest_core::error::EngineError;
use adaptest_core::model::{
    Category, DifficultyLabel, IrtParams, Item, QualityFlag, ResponseRecord, SessionStatus,
    TestMode, TestSession,
};
use adaptest_core::store::Store;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS items (
    id             TEXT PRIMARY KEY,
    text           TEXT NOT NULL,
    category       TEXT NOT NULL,
    difficulty     TEXT NOT NULL,
    a              REAL NOT NULL,
    b              REAL NOT NULL,
    c              REAL NOT NULL,
    p_value        REAL,
    response_count INTEGER NOT NULL DEFAULT 0,
    quality        TEXT NOT NULL DEFAULT 'normal'
);

CREATE TABLE IF NOT EXISTS sessions (
    id           TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    status       TEXT NOT NULL,
    mode         TEXT NOT NULL,
    started_at   TEXT NOT NULL,
    completed_at TEXT,
    theta        REAL,
    se           REAL
);

CREATE UNIQUE INDEX IF NOT EXISTS one_active_session_per_user
    ON sessions (user_id) WHERE status = 'in_progress';

CREATE TABLE IF NOT EXISTS responses (
    session_id         TEXT NOT NULL,
    item_id            TEXT NOT NULL,
    answer             TEXT NOT NULL,
    correct            INTEGER NOT NULL,
    response_time_secs REAL,
    sequence           INTEGER NOT NULL,
    PRIMARY KEY (session_id, sequence)
);

CREATE TABLE IF NOT EXISTS assessments (
    session_id TEXT PRIMARY KEY,
    payload    TEXT NOT NULL,
    assessed_at TEXT NOT NULL
);
";

/// A `Store` backed by a SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// An in-memory database, for tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Load (or refresh) the item catalog from a calibrated pool.
    pub fn seed_items(&self, items: &[Item]) -> Result<(), EngineError> {
        let conn = self.lock()?;
        for item in items {
            conn.execute(
                "INSERT OR REPLACE INTO items
                 (id, text, category, difficulty, a, b, c, p_value, response_count, quality)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    item.id,
                    item.text,
                    item.category.to_string(),
                    item.difficulty.to_string(),
                    item.params.a,
                    item.params.b,
                    item.params.c,
                    item.p_value,
                    item.response_count,
                    item.quality.to_string(),
                ],
            )
            .map_err(EngineError::storage)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, EngineError> {
        self.conn
            .lock()
            .map_err(|_| EngineError::storage("connection lock poisoned"))
    }
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::InProgress => "in_progress",
        SessionStatus::Completed => "completed",
        SessionStatus::Abandoned => "abandoned",
    }
}

fn parse_status(s: &str) -> Result<SessionStatus, EngineError> {
    match s {
        "in_progress" => Ok(SessionStatus::InProgress),
        "completed" => Ok(SessionStatus::Completed),
        "abandoned" => Ok(SessionStatus::Abandoned),
        other => Err(EngineError::storage(format!("bad session status: {other}"))),
    }
}

fn mode_str(mode: TestMode) -> &'static str {
    match mode {
        TestMode::FixedForm => "fixed_form",
        TestMode::Adaptive => "adaptive",
    }
}

fn parse_mode(s: &str) -> Result<TestMode, EngineError> {
    match s {
        "fixed_form" => Ok(TestMode::FixedForm),
        "adaptive" => Ok(TestMode::Adaptive),
        other => Err(EngineError::storage(format!("bad test mode: {other}"))),
    }
}

fn parse_quality(s: &str) -> Result<QualityFlag, EngineError> {
    match s {
        "normal" => Ok(QualityFlag::Normal),
        "under_review" => Ok(QualityFlag::UnderReview),
        "deactivated" => Ok(QualityFlag::Deactivated),
        other => Err(EngineError::storage(format!("bad quality flag: {other}"))),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, EngineError> {
    Uuid::parse_str(s).map_err(EngineError::storage)
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Item, String, String, String)> {
    let item = Item {
        id: row.get(0)?,
        text: row.get(1)?,
        // Placeholder values; the string columns are converted by the caller
        // since FromStr errors are not rusqlite errors.
        category: Category::Logic,
        difficulty: DifficultyLabel::Medium,
        params: IrtParams {
            a: row.get(4)?,
            b: row.get(5)?,
            c: row.get(6)?,
        },
        p_value: row.get(7)?,
        response_count: row.get(8)?,
        quality: QualityFlag::Normal,
    };
    Ok((item, row.get(2)?, row.get(3)?, row.get(9)?))
}

fn finish_item(
    (mut item, category, difficulty, quality): (Item, String, String, String),
) -> Result<Item, EngineError> {
    item.category = Category::from_str(&category).map_err(EngineError::storage)?;
    item.difficulty = DifficultyLabel::from_str(&difficulty).map_err(EngineError::storage)?;
    item.quality = parse_quality(&quality)?;
    Ok(item)
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, DateTime<Utc>, Option<DateTime<Utc>>, Option<f64>, Option<f64>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn finish_session(
    (id, user_id, status, mode, started_at, completed_at, theta, se): (
        String,
        String,
        String,
        String,
        DateTime<Utc>,
        Option<DateTime<Utc>>,
        Option<f64>,
        Option<f64>,
    ),
) -> Result<TestSession, EngineError> {
    Ok(TestSession {
        id: parse_uuid(&id)?,
        user_id,
        status: parse_status(&status)?,
        mode: parse_mode(&mode)?,
        started_at,
        completed_at,
        theta,
        se,
    })
}

const SESSION_COLS: &str = "id, user_id, status, mode, started_at, completed_at, theta, se";

#[async_trait]
impl Store for SqliteStore {
    async fn list_items(&self) -> Result<Vec<Item>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, text, category, difficulty, a, b, c, p_value, response_count, quality
                 FROM items ORDER BY id",
            )
            .map_err(EngineError::storage)?;
        let rows = stmt
            .query_map([], row_to_item)
            .map_err(EngineError::storage)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(finish_item(row.map_err(EngineError::storage)?)?);
        }
        Ok(items)
    }

    async fn items_seen_by_user(&self, user_id: &str) -> Result<HashSet<String>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT r.item_id FROM responses r
                 JOIN sessions s ON s.id = r.session_id
                 WHERE s.user_id = ?1",
            )
            .map_err(EngineError::storage)?;
        let rows = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))
            .map_err(EngineError::storage)?;

        let mut seen = HashSet::new();
        for row in rows {
            seen.insert(row.map_err(EngineError::storage)?);
        }
        Ok(seen)
    }

    async fn record_item_administration(
        &self,
        item_id: &str,
        correct: bool,
    ) -> Result<(), EngineError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, text, category, difficulty, a, b, c, p_value, response_count, quality
                 FROM items WHERE id = ?1",
                params![item_id],
                row_to_item,
            )
            .optional()
            .map_err(EngineError::storage)?
            .ok_or_else(|| EngineError::storage(format!("unknown item: {item_id}")))?;
        let item = finish_item(row)?;

        let n = item.response_count as f64;
        let prior = item.effective_p_value();
        let outcome = if correct { 1.0 } else { 0.0 };
        let new_p = (prior * n + outcome) / (n + 1.0);
        let new_count = item.response_count + 1;

        let new_quality = {
            let mut updated = item.clone();
            updated.response_count = new_count;
            if updated.needs_auto_review() {
                tracing::warn!(item_id = %item.id, "moving item to under_review");
                QualityFlag::UnderReview
            } else {
                updated.quality
            }
        };

        conn.execute(
            "UPDATE items SET p_value = ?2, response_count = ?3, quality = ?4 WHERE id = ?1",
            params![item_id, new_p, new_count, new_quality.to_string()],
        )
        .map_err(EngineError::storage)?;
        Ok(())
    }

    async fn set_item_quality(
        &self,
        item_id: &str,
        quality: QualityFlag,
    ) -> Result<(), EngineError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE items SET quality = ?2 WHERE id = ?1",
                params![item_id, quality.to_string()],
            )
            .map_err(EngineError::storage)?;
        if changed == 0 {
            return Err(EngineError::storage(format!("unknown item: {item_id}")));
        }
        Ok(())
    }

    async fn active_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<TestSession>, EngineError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLS} FROM sessions
                     WHERE user_id = ?1 AND status = 'in_progress'"
                ),
                params![user_id],
                row_to_session,
            )
            .optional()
            .map_err(EngineError::storage)?;
        row.map(finish_session).transpose()
    }

    async fn last_completed_at(
        &self,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT completed_at FROM sessions
             WHERE user_id = ?1 AND status = 'completed' AND completed_at IS NOT NULL
             ORDER BY completed_at DESC LIMIT 1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(EngineError::storage)
    }

    async fn insert_session(&self, session: &TestSession) -> Result<(), EngineError> {
        // Check first for a typed error; the partial unique index is the
        // backstop against races.
        if let Some(active) = self.active_session_for_user(&session.user_id).await? {
            return Err(EngineError::SessionAlreadyActive {
                user_id: session.user_id.clone(),
                session_id: active.id,
            });
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sessions (id, user_id, status, mode, started_at, completed_at, theta, se)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id.to_string(),
                session.user_id,
                status_str(session.status),
                mode_str(session.mode),
                session.started_at,
                session.completed_at,
                session.theta,
                session.se,
            ],
        )
        .map_err(EngineError::storage)?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<TestSession, EngineError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {SESSION_COLS} FROM sessions WHERE id = ?1"),
                params![id.to_string()],
                row_to_session,
            )
            .optional()
            .map_err(EngineError::storage)?;
        row.map(finish_session)
            .transpose()?
            .ok_or(EngineError::SessionNotFound(id))
    }

    async fn update_session(&self, session: &TestSession) -> Result<(), EngineError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE sessions
                 SET status = ?2, completed_at = ?3, theta = ?4, se = ?5
                 WHERE id = ?1",
                params![
                    session.id.to_string(),
                    status_str(session.status),
                    session.completed_at,
                    session.theta,
                    session.se,
                ],
            )
            .map_err(EngineError::storage)?;
        if changed == 0 {
            return Err(EngineError::SessionNotFound(session.id));
        }
        Ok(())
    }

    async fn append_response(&self, response: &ResponseRecord) -> Result<(), EngineError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO responses
             (session_id, item_id, answer, correct, response_time_secs, sequence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                response.session_id.to_string(),
                response.item_id,
                response.answer,
                response.correct,
                response.response_time_secs,
                response.sequence,
            ],
        )
        .map_err(EngineError::storage)?;
        Ok(())
    }

    async fn list_responses(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<ResponseRecord>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT item_id, answer, correct, response_time_secs, sequence
                 FROM responses WHERE session_id = ?1 ORDER BY sequence",
            )
            .map_err(EngineError::storage)?;
        let rows = stmt
            .query_map(params![session_id.to_string()], |row| {
                Ok(ResponseRecord {
                    session_id,
                    item_id: row.get(0)?,
                    answer: row.get(1)?,
                    correct: row.get(2)?,
                    response_time_secs: row.get(3)?,
                    sequence: row.get(4)?,
                })
            })
            .map_err(EngineError::storage)?;

        let mut responses = Vec::new();
        for row in rows {
            responses.push(row.map_err(EngineError::storage)?);
        }
        Ok(responses)
    }

    async fn insert_assessment_if_absent(
        &self,
        assessment: &ValidityAssessment,
    ) -> Result<ValidityAssessment, EngineError> {
        let payload = serde_json::to_string(assessment).map_err(EngineError::storage)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO assessments (session_id, payload, assessed_at)
             VALUES (?1, ?2, ?3)",
            params![
                assessment.session_id.to_string(),
                payload,
                assessment.assessed_at,
            ],
        )
        .map_err(EngineError::storage)?;

        // Return whatever is stored, whether ours or a racing writer's.
        let stored: String = conn
            .query_row(
                "SELECT payload FROM assessments WHERE session_id = ?1",
                params![assessment.session_id.to_string()],
                |row| row.get(0),
            )
            .map_err(EngineError::storage)?;
        serde_json::from_str(&stored).map_err(EngineError::storage)
    }

    async fn get_assessment(
        &self,
        session_id: Uuid,
    ) -> Result<Option<ValidityAssessment>, EngineError> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM assessments WHERE session_id = ?1",
                params![session_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(EngineError::storage)?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(EngineError::storage))
            .transpose()
    }

    async fn replace_assessment(
        &self,
        assessment: &ValidityAssessment,
    ) -> Result<(), EngineError> {
        let payload = serde_json::to_string(assessment).map_err(EngineError::storage)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO assessments (session_id, payload, assessed_at)
             VALUES (?1, ?2, ?3)",
            params![
                assessment.session_id.to_string(),
                payload,
                assessment.assessed_at,
            ],
        )
        .map_err(EngineError::storage)?;
        Ok(())
    }

    async fn list_assessments(&self) -> Result<Vec<ValidityAssessment>, EngineError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT payload FROM assessments ORDER BY assessed_at")
            .map_err(EngineError::storage)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(EngineError::storage)?;

        let mut assessments = Vec::new();
        for row in rows {
            let payload = row.map_err(EngineError::storage)?;
            assessments.push(serde_json::from_str(&payload).map_err(EngineError::storage)?);
        }
        Ok(assessments)
    }
}
