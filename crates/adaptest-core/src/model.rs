//! Core data model types for adaptest.
//!
//! These are the fundamental types the entire adaptest system uses to
//! represent calibrated items, test sessions, and recorded responses.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Item category within the cognitive battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Pattern,
    Logic,
    Math,
    Verbal,
    Spatial,
    Memory,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Pattern => "pattern",
            Category::Logic => "logic",
            Category::Math => "math",
            Category::Verbal => "verbal",
            Category::Spatial => "spatial",
            Category::Memory => "memory",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pattern" => Ok(Category::Pattern),
            "logic" => Ok(Category::Logic),
            "math" => Ok(Category::Math),
            "verbal" => Ok(Category::Verbal),
            "spatial" => Ok(Category::Spatial),
            "memory" => Ok(Category::Memory),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Coarse difficulty label assigned at authoring time.
///
/// The IRT `b` parameter is the real difficulty; the label is used by the
/// validity checks, which reason about difficulty in human terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLabel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLabel {
    /// Nominal proportion-correct for this label, used as a difficulty proxy
    /// when an item has no empirical p-value yet.
    pub fn nominal_p_value(&self) -> f64 {
        match self {
            DifficultyLabel::Easy => 0.75,
            DifficultyLabel::Medium => 0.50,
            DifficultyLabel::Hard => 0.25,
        }
    }
}

impl fmt::Display for DifficultyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DifficultyLabel::Easy => "easy",
            DifficultyLabel::Medium => "medium",
            DifficultyLabel::Hard => "hard",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DifficultyLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(DifficultyLabel::Easy),
            "medium" => Ok(DifficultyLabel::Medium),
            "hard" => Ok(DifficultyLabel::Hard),
            other => Err(format!("unknown difficulty label: {other}")),
        }
    }
}

/// Three-parameter-logistic item parameters from offline calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrtParams {
    /// Discrimination. Calibration can produce negative values for broken
    /// items; the pool accessor quarantines those.
    pub a: f64,
    /// Difficulty, on the same scale as theta.
    pub b: f64,
    /// Pseudo-guessing floor, in [0, 1).
    pub c: f64,
}

/// Quality state of a calibrated item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    Normal,
    UnderReview,
    Deactivated,
}

impl fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityFlag::Normal => "normal",
            QualityFlag::UnderReview => "under_review",
            QualityFlag::Deactivated => "deactivated",
        };
        write!(f, "{s}")
    }
}

/// Minimum response count before the negative-discrimination rule applies.
pub const AUTO_REVIEW_MIN_RESPONSES: u32 = 50;

/// A calibrated question from the item bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique item identifier.
    pub id: String,
    /// Question text shown to the test-taker.
    pub text: String,
    /// Category within the battery.
    pub category: Category,
    /// Coarse difficulty label.
    pub difficulty: DifficultyLabel,
    /// Calibrated 3PL parameters.
    pub params: IrtParams,
    /// Empirical proportion-correct across all administrations, if known.
    #[serde(default)]
    pub p_value: Option<f64>,
    /// Number of recorded administrations.
    #[serde(default)]
    pub response_count: u32,
    /// Quality state; anything other than `Normal` excludes the item
    /// from selection.
    #[serde(default = "default_quality")]
    pub quality: QualityFlag,
}

fn default_quality() -> QualityFlag {
    QualityFlag::Normal
}

impl Item {
    /// Whether this item may be served at all, regardless of session history.
    pub fn is_servable(&self) -> bool {
        self.quality == QualityFlag::Normal
    }

    /// Empirical proportion-correct, falling back to the label's nominal
    /// value when the item has no history.
    pub fn effective_p_value(&self) -> f64 {
        self.p_value.unwrap_or_else(|| self.difficulty.nominal_p_value())
    }

    /// Whether the automatic quality rule should move this item to
    /// `UnderReview`: negative discrimination once enough responses exist.
    pub fn needs_auto_review(&self) -> bool {
        self.quality == QualityFlag::Normal
            && self.params.a < 0.0
            && self.response_count >= AUTO_REVIEW_MIN_RESPONSES
    }
}

/// Lifecycle state of a test session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    /// Terminal states admit no further responses.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}

/// How items are delivered within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    FixedForm,
    Adaptive,
}

/// A single test-taking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSession {
    /// Unique session identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Delivery mode.
    pub mode: TestMode,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session reached a terminal state.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Running ability estimate (adaptive mode).
    #[serde(default)]
    pub theta: Option<f64>,
    /// Standard error of the running estimate (adaptive mode).
    #[serde(default)]
    pub se: Option<f64>,
}

impl TestSession {
    /// Create a fresh in-progress session for a user.
    pub fn new(user_id: impl Into<String>, mode: TestMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            status: SessionStatus::InProgress,
            mode,
            started_at: Utc::now(),
            completed_at: None,
            theta: None,
            se: None,
        }
    }
}

/// One recorded answer within a session. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Owning session.
    pub session_id: Uuid,
    /// Item that was answered.
    pub item_id: String,
    /// The answer the test-taker selected.
    pub answer: String,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Wall-clock time spent on the item, when the client reported it.
    #[serde(default)]
    pub response_time_secs: Option<f64>,
    /// Position within the session, starting at 0. Authoritative ordering.
    pub sequence: u32,
}
