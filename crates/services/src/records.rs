use std::collections::BTreeMap;
use std::sync::Arc;

use pacer_core::model::{
    Mode, QuestionRecord, QuestionRecordId, QuestionStatus, Session, SessionId, SessionItem,
    SessionStatus,
};
use pacer_core::sequence::{QuestionSequence, QuestionSlot};
use storage::repository::{QuestionTypeRepository, SessionRepository, TemplateRepository};

use crate::error::RecordsError;
use crate::grid::{StatusCounts, sequence_items, snapshot_items};

//
// ─── LIST VIEW ─────────────────────────────────────────────────────────────────
//

/// One row of the records list: a finished session with aggregated
/// outcome counts.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
    pub id: SessionId,
    pub name: Option<String>,
    pub mode: Mode,
    pub template_name: Option<String>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total_time_ms: u64,
    pub total_questions: usize,
    pub counts: StatusCounts,
    pub accuracy_rate: f64,
    pub completion_rate: f64,
}

/// Aggregate over all listed records.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RecordsOverview {
    pub total_sessions: usize,
    pub total_time_ms: u64,
    pub avg_accuracy: f64,
    pub avg_completion: f64,
}

//
// ─── DETAIL VIEW ───────────────────────────────────────────────────────────────
//

/// A persisted session reconstructed for review/editing.
///
/// The grid comes from the session's item snapshot when present; sessions
/// saved before snapshots existed fall back to the current template
/// definition (which can have drifted since the run).
#[derive(Debug, Clone)]
pub struct RecordDetail {
    pub session: Session,
    pub items: Vec<SessionItem>,
    pub records: Vec<QuestionRecord>,
    pub slots: Vec<QuestionSlot>,
    statuses: BTreeMap<u32, QuestionStatus>,
}

impl RecordDetail {
    #[must_use]
    pub fn statuses(&self) -> &BTreeMap<u32, QuestionStatus> {
        &self.statuses
    }

    #[must_use]
    pub fn status_of(&self, number: u32) -> QuestionStatus {
        self.statuses
            .get(&number)
            .copied()
            .unwrap_or(QuestionStatus::Unanswered)
    }

    /// Set one question's status. Unknown numbers are ignored.
    pub fn set_status(&mut self, number: u32, status: QuestionStatus) {
        if let Some(slot) = self.statuses.get_mut(&number) {
            *slot = status;
        }
    }

    /// Mark every question of one section (grid `type_index`) at once.
    pub fn mark_batch(&mut self, type_index: usize, status: QuestionStatus) {
        let numbers: Vec<u32> = self
            .slots
            .iter()
            .filter(|slot| slot.type_index == type_index)
            .map(|slot| slot.number)
            .collect();
        for number in numbers {
            self.set_status(number, status);
        }
    }

    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        StatusCounts::from_slots(&self.slots, &self.statuses)
    }

    #[must_use]
    pub fn accuracy_rate(&self) -> f64 {
        self.counts().accuracy_rate()
    }

    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        self.counts().completion_rate()
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Read and edit persisted session records.
pub struct RecordsService {
    sessions: Arc<dyn SessionRepository>,
    templates: Arc<dyn TemplateRepository>,
    question_types: Arc<dyn QuestionTypeRepository>,
}

impl RecordsService {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        templates: Arc<dyn TemplateRepository>,
        question_types: Arc<dyn QuestionTypeRepository>,
    ) -> Self {
        Self {
            sessions,
            templates,
            question_types,
        }
    }

    /// All ended sessions, newest first, with aggregated counts, plus an
    /// overall summary.
    ///
    /// # Errors
    ///
    /// Returns `RecordsError::Storage` when rows cannot be read.
    pub async fn list(&self) -> Result<(Vec<RecordSummary>, RecordsOverview), RecordsError> {
        let sessions = self
            .sessions
            .list_sessions_by_status(SessionStatus::Ended)
            .await?;
        let templates = self.templates.list_templates().await?;

        let mut rows = Vec::with_capacity(sessions.len());
        for session in sessions {
            let records = self.sessions.get_question_records(session.id()).await?;
            let counts = StatusCounts::from_statuses(records.iter().map(|r| r.status));
            let template_name = templates
                .iter()
                .find(|t| t.id() == session.template_id())
                .map(|t| t.name().to_owned());
            rows.push(RecordSummary {
                id: session.id(),
                name: session.name().map(str::to_owned),
                mode: session.mode(),
                template_name,
                ended_at: session.ended_at(),
                total_time_ms: session.total_time_ms(),
                total_questions: records.len(),
                counts,
                accuracy_rate: counts.accuracy_rate(),
                completion_rate: counts.completion_rate(),
            });
        }

        rows.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));

        let overview = if rows.is_empty() {
            RecordsOverview::default()
        } else {
            #[allow(clippy::cast_precision_loss)]
            let count = rows.len() as f64;
            RecordsOverview {
                total_sessions: rows.len(),
                total_time_ms: rows.iter().map(|r| r.total_time_ms).sum(),
                avg_accuracy: rows.iter().map(|r| r.accuracy_rate).sum::<f64>() / count,
                avg_completion: rows.iter().map(|r| r.completion_rate).sum::<f64>() / count,
            }
        };

        Ok((rows, overview))
    }

    /// Load one session with its grid rebuilt and persisted statuses
    /// overlaid on an all-unanswered base. `None` when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns `RecordsError::Storage` when rows cannot be read.
    pub async fn detail(&self, id: SessionId) -> Result<Option<RecordDetail>, RecordsError> {
        let Some(session) = self.sessions.get_session(id).await? else {
            return Ok(None);
        };
        let items = self.sessions.get_session_items(id).await?;
        let records = self.sessions.get_question_records(id).await?;
        let types = self.question_types.list_question_types().await?;

        let base_items = if session.item_snapshot().is_empty() {
            let template_items = self
                .templates
                .get_template_items(session.template_id())
                .await?;
            sequence_items(&template_items, &types)
        } else {
            snapshot_items(session.item_snapshot(), &types)
        };
        let order: Vec<_> = base_items.iter().map(|item| item.id).collect();
        let seq = QuestionSequence::build(base_items, order);

        // default every slot to unanswered, then overlay what was saved;
        // records and slots can be misaligned if the grid changed
        let mut statuses: BTreeMap<u32, QuestionStatus> = seq
            .slots()
            .iter()
            .map(|slot| (slot.number, QuestionStatus::Unanswered))
            .collect();
        for record in &records {
            if let Some(slot) = statuses.get_mut(&record.question_index) {
                *slot = record.status;
            }
        }

        Ok(Some(RecordDetail {
            session,
            items,
            records,
            slots: seq.slots().to_vec(),
            statuses,
        }))
    }

    /// Persist edited statuses. Existing records keep their identity and
    /// times; grid slots without a record get zero-filled ones, so the
    /// save is idempotent per question number.
    ///
    /// # Errors
    ///
    /// Returns `RecordsError` when rows cannot be written or validated.
    pub async fn save_statuses(&self, detail: &RecordDetail) -> Result<(), RecordsError> {
        let by_index: BTreeMap<u32, &QuestionRecord> = detail
            .records
            .iter()
            .map(|record| (record.question_index, record))
            .collect();
        let item_by_template: BTreeMap<_, _> = detail
            .items
            .iter()
            .map(|item| (item.template_item_id, item.id))
            .collect();

        let mut updated = Vec::with_capacity(detail.slots.len());
        for slot in &detail.slots {
            let status = detail.status_of(slot.number);
            match by_index.get(&slot.number) {
                Some(existing) => {
                    let mut record = (*existing).clone();
                    record.status = status;
                    updated.push(record);
                }
                None => {
                    let session_item_id = item_by_template
                        .get(&slot.template_item_id)
                        .copied()
                        .unwrap_or_else(pacer_core::model::SessionItemId::random);
                    updated.push(QuestionRecord::new(
                        QuestionRecordId::random(),
                        detail.session.id(),
                        session_item_id,
                        slot.number,
                        0,
                        0,
                        status,
                    )?);
                }
            }
        }

        self.sessions.append_question_records(&updated).await?;
        tracing::debug!(session = %detail.session.id(), records = updated.len(), "statuses saved");
        Ok(())
    }

    /// Rename a session row.
    ///
    /// # Errors
    ///
    /// Returns `RecordsError::Storage` (NotFound included) on failure.
    pub async fn rename(&self, id: SessionId, name: Option<String>) -> Result<(), RecordsError> {
        let Some(mut session) = self.sessions.get_session(id).await? else {
            return Err(RecordsError::Storage(
                storage::repository::StorageError::NotFound,
            ));
        };
        session.set_name(name);
        self.sessions.update_session(&session).await?;
        Ok(())
    }

    /// Delete a session and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns `RecordsError::Storage` on failure.
    pub async fn delete(&self, id: SessionId) -> Result<(), RecordsError> {
        self.sessions.delete_session(id).await?;
        tracing::info!(session = %id, "session deleted");
        Ok(())
    }
}
