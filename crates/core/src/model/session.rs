use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{
    QuestionRecordId, QuestionTypeId, SessionId, SessionItemId, TemplateId, TemplateItemId,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRowError {
    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("invalid session mode: {0}")]
    InvalidMode(String),

    #[error("invalid status value: {0}")]
    InvalidStatus(String),

    #[error("question index must be 1-based")]
    ZeroQuestionIndex,
}

//
// ─── ENUMS ─────────────────────────────────────────────────────────────────────
//

/// Practice mode allows pausing; mock mode simulates exam conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Practice,
    Mock,
}

impl Mode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Practice => "practice",
            Mode::Mock => "mock",
        }
    }

    /// Parses the persisted string form.
    ///
    /// # Errors
    ///
    /// Returns `SessionRowError::InvalidMode` for unknown values.
    pub fn parse(value: &str) -> Result<Self, SessionRowError> {
        match value {
            "practice" => Ok(Mode::Practice),
            "mock" => Ok(Mode::Mock),
            other => Err(SessionRowError::InvalidMode(other.to_owned())),
        }
    }
}

/// Lifecycle of a durable session row. Drafts are `Running` until the save
/// flow finalizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Ended,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Ended => "ended",
        }
    }

    /// Parses the persisted string form.
    ///
    /// # Errors
    ///
    /// Returns `SessionRowError::InvalidStatus` for unknown values.
    pub fn parse(value: &str) -> Result<Self, SessionRowError> {
        match value {
            "running" => Ok(SessionStatus::Running),
            "ended" => Ok(SessionStatus::Ended),
            other => Err(SessionRowError::InvalidStatus(other.to_owned())),
        }
    }
}

/// Outcome recorded for a single question during review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Unanswered,
    Correct,
    Wrong,
    Skip,
}

impl QuestionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionStatus::Unanswered => "unanswered",
            QuestionStatus::Correct => "correct",
            QuestionStatus::Wrong => "wrong",
            QuestionStatus::Skip => "skip",
        }
    }

    /// Parses the persisted string form.
    ///
    /// # Errors
    ///
    /// Returns `SessionRowError::InvalidStatus` for unknown values.
    pub fn parse(value: &str) -> Result<Self, SessionRowError> {
        match value {
            "unanswered" => Ok(QuestionStatus::Unanswered),
            "correct" => Ok(QuestionStatus::Correct),
            "wrong" => Ok(QuestionStatus::Wrong),
            "skip" => Ok(QuestionStatus::Skip),
            other => Err(SessionRowError::InvalidStatus(other.to_owned())),
        }
    }
}

//
// ─── ITEM SNAPSHOT ─────────────────────────────────────────────────────────────
//

/// Ordered item list frozen onto the session row at save time, so review
/// reconstruction survives later template edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItemSnapshot {
    pub template_item_id: TemplateItemId,
    pub question_type_id: QuestionTypeId,
    pub question_count: u32,
    pub planned_minutes: u32,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// A durable practice/mock run. Owns `SessionItem`s and `QuestionRecord`s.
///
/// Immutable once ended except for name/status patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    name: Option<String>,
    mode: Mode,
    template_id: TemplateId,
    custom_order: Vec<TemplateItemId>,
    item_snapshot: Vec<SessionItemSnapshot>,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    total_time_ms: u64,
    paused_count: u32,
}

impl Session {
    /// Creates a session row.
    ///
    /// # Errors
    ///
    /// Returns `SessionRowError::InvalidTimeRange` if `ended_at` precedes
    /// `started_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: SessionId,
        name: Option<String>,
        mode: Mode,
        template_id: TemplateId,
        custom_order: Vec<TemplateItemId>,
        item_snapshot: Vec<SessionItemSnapshot>,
        status: SessionStatus,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        total_time_ms: u64,
        paused_count: u32,
    ) -> Result<Self, SessionRowError> {
        if let Some(ended) = ended_at {
            if ended < started_at {
                return Err(SessionRowError::InvalidTimeRange);
            }
        }

        Ok(Self {
            id,
            name: name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()),
            mode,
            template_id,
            custom_order,
            item_snapshot,
            status,
            started_at,
            ended_at,
            total_time_ms,
            paused_count,
        })
    }

    /// Rehydrate a session row from persisted storage.
    ///
    /// # Errors
    ///
    /// Same validation as [`Session::new`].
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        name: Option<String>,
        mode: Mode,
        template_id: TemplateId,
        custom_order: Vec<TemplateItemId>,
        item_snapshot: Vec<SessionItemSnapshot>,
        status: SessionStatus,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        total_time_ms: u64,
        paused_count: u32,
    ) -> Result<Self, SessionRowError> {
        Self::new(
            id,
            name,
            mode,
            template_id,
            custom_order,
            item_snapshot,
            status,
            started_at,
            ended_at,
            total_time_ms,
            paused_count,
        )
    }

    /// Rename the session (empty names clear the field).
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());
    }

    /// Transition the row to `Ended`, stamping the end time and final totals.
    ///
    /// # Errors
    ///
    /// Returns `SessionRowError::InvalidTimeRange` if `ended_at` precedes the
    /// stored `started_at`.
    pub fn end(
        &mut self,
        ended_at: DateTime<Utc>,
        total_time_ms: u64,
        paused_count: u32,
    ) -> Result<(), SessionRowError> {
        if ended_at < self.started_at {
            return Err(SessionRowError::InvalidTimeRange);
        }
        self.status = SessionStatus::Ended;
        self.ended_at = Some(ended_at);
        self.total_time_ms = total_time_ms;
        self.paused_count = paused_count;
        Ok(())
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        self.template_id
    }

    #[must_use]
    pub fn custom_order(&self) -> &[TemplateItemId] {
        &self.custom_order
    }

    #[must_use]
    pub fn item_snapshot(&self) -> &[SessionItemSnapshot] {
        &self.item_snapshot
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn total_time_ms(&self) -> u64 {
        self.total_time_ms
    }

    #[must_use]
    pub fn paused_count(&self) -> u32 {
        self.paused_count
    }
}

//
// ─── SESSION ITEM ──────────────────────────────────────────────────────────────
//

/// Per-section aggregate of a run: actual time summed from the question
/// records that fall inside the section's number range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionItem {
    pub id: SessionItemId,
    pub session_id: SessionId,
    pub template_item_id: TemplateItemId,
    pub actual_time_ms: u64,
    pub planned_ms: u64,
    pub question_count: u32,
    pub overtime_count: u32,
    pub order_index: u32,
}

impl SessionItem {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        id: SessionItemId,
        session_id: SessionId,
        template_item_id: TemplateItemId,
        actual_time_ms: u64,
        planned_ms: u64,
        question_count: u32,
        overtime_count: u32,
        order_index: u32,
    ) -> Self {
        Self {
            id,
            session_id,
            template_item_id,
            actual_time_ms,
            planned_ms,
            question_count,
            overtime_count,
            order_index,
        }
    }
}

//
// ─── QUESTION RECORD ───────────────────────────────────────────────────────────
//

/// One row per question number in the session's grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub id: QuestionRecordId,
    pub session_id: SessionId,
    pub session_item_id: SessionItemId,
    /// 1-based, global across the whole session sequence.
    pub question_index: u32,
    pub actual_time_ms: u64,
    pub planned_ms: u64,
    pub status: QuestionStatus,
}

impl QuestionRecord {
    /// Creates a record.
    ///
    /// # Errors
    ///
    /// Returns `SessionRowError::ZeroQuestionIndex` if `question_index` is 0.
    pub fn new(
        id: QuestionRecordId,
        session_id: SessionId,
        session_item_id: SessionItemId,
        question_index: u32,
        actual_time_ms: u64,
        planned_ms: u64,
        status: QuestionStatus,
    ) -> Result<Self, SessionRowError> {
        if question_index == 0 {
            return Err(SessionRowError::ZeroQuestionIndex);
        }
        Ok(Self {
            id,
            session_id,
            session_item_id,
            question_index,
            actual_time_ms,
            planned_ms,
            status,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn session_rejects_end_before_start() {
        let err = Session::new(
            SessionId::random(),
            None,
            Mode::Practice,
            TemplateId::random(),
            Vec::new(),
            Vec::new(),
            SessionStatus::Ended,
            fixed_now(),
            Some(fixed_now() - chrono::Duration::seconds(1)),
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err, SessionRowError::InvalidTimeRange);
    }

    #[test]
    fn session_normalizes_blank_names() {
        let mut session = Session::new(
            SessionId::random(),
            Some("  ".into()),
            Mode::Mock,
            TemplateId::random(),
            Vec::new(),
            Vec::new(),
            SessionStatus::Running,
            fixed_now(),
            None,
            0,
            0,
        )
        .unwrap();
        assert_eq!(session.name(), None);

        session.set_name(Some(" evening run ".into()));
        assert_eq!(session.name(), Some("evening run"));
    }

    #[test]
    fn ending_stamps_status_and_totals() {
        let mut session = Session::new(
            SessionId::random(),
            None,
            Mode::Practice,
            TemplateId::random(),
            Vec::new(),
            Vec::new(),
            SessionStatus::Running,
            fixed_now(),
            None,
            0,
            0,
        )
        .unwrap();

        let ended = fixed_now() + chrono::Duration::minutes(90);
        session.end(ended, 5_400_000, 2).unwrap();

        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(session.ended_at(), Some(ended));
        assert_eq!(session.total_time_ms(), 5_400_000);
        assert_eq!(session.paused_count(), 2);
    }

    #[test]
    fn question_record_index_is_one_based() {
        let err = QuestionRecord::new(
            QuestionRecordId::random(),
            SessionId::random(),
            SessionItemId::random(),
            0,
            0,
            0,
            QuestionStatus::Unanswered,
        )
        .unwrap_err();
        assert_eq!(err, SessionRowError::ZeroQuestionIndex);
    }

    #[test]
    fn enums_roundtrip_their_string_forms() {
        for mode in [Mode::Practice, Mode::Mock] {
            assert_eq!(Mode::parse(mode.as_str()).unwrap(), mode);
        }
        for status in [SessionStatus::Running, SessionStatus::Ended] {
            assert_eq!(SessionStatus::parse(status.as_str()).unwrap(), status);
        }
        for status in [
            QuestionStatus::Unanswered,
            QuestionStatus::Correct,
            QuestionStatus::Wrong,
            QuestionStatus::Skip,
        ] {
            assert_eq!(QuestionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(Mode::parse("exam").is_err());
        assert!(QuestionStatus::parse("flagged").is_err());
    }
}
