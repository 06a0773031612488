use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use pacer_core::model::{
    DailyStat, Mode, QuestionRecord, QuestionRecordId, QuestionStatus, Session, SessionId,
    SessionItem, SessionItemId, SessionItemSnapshot, SessionRowError, SessionStatus, TemplateId,
    TemplateItemId,
};
use pacer_core::sequence::QuestionSequence;
use pacer_core::time::Clock;
use storage::repository::{SessionRepository, StatsRepository};

use crate::error::CommitError;
use crate::grid::StatusCounts;
use crate::runtime_handle::{SharedRuntime, lock_runtime};

//
// ─── PURE ROW BUILDER ──────────────────────────────────────────────────────────
//

/// Everything the reducer needs from the runtime to build a durable
/// session triple.
#[derive(Debug, Clone)]
pub struct CommitInput<'a> {
    pub session_id: SessionId,
    pub name: Option<String>,
    pub mode: Mode,
    pub template_id: TemplateId,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub total_time_ms: u64,
    pub paused_count: u32,
    pub question_times: &'a BTreeMap<u32, u64>,
    pub statuses: &'a BTreeMap<u32, QuestionStatus>,
    pub now: DateTime<Utc>,
}

/// Reduce runtime state to the durable `Session` + `SessionItem[]` +
/// `QuestionRecord[]` triple.
///
/// One item per working-order entry, with its actual time summed from the
/// question times inside its number range; one record per grid slot, with
/// the item's planned time divided evenly across its questions.
///
/// # Errors
///
/// Returns `SessionRowError` if the rows fail domain validation.
pub fn build_session_rows(
    seq: &QuestionSequence,
    input: &CommitInput<'_>,
) -> Result<(Session, Vec<SessionItem>, Vec<QuestionRecord>), SessionRowError> {
    let started_at = input.started_at.unwrap_or_else(|| {
        // derivation fallback when the start instant was never captured
        input.now - Duration::milliseconds(i64::try_from(input.total_time_ms).unwrap_or(i64::MAX))
    });
    let ended_at = (input.status == SessionStatus::Ended).then_some(input.now);

    let ordered = seq.ordered_items();
    let custom_order: Vec<TemplateItemId> = ordered.iter().map(|item| item.id).collect();
    let item_snapshot: Vec<SessionItemSnapshot> = ordered
        .iter()
        .map(|item| SessionItemSnapshot {
            template_item_id: item.id,
            question_type_id: item.question_type_id,
            question_count: item.question_count,
            planned_minutes: item.planned_minutes,
        })
        .collect();

    let mut items = Vec::with_capacity(ordered.len());
    let mut item_ids: HashMap<TemplateItemId, SessionItemId> = HashMap::new();
    let mut planned_per_question: HashMap<TemplateItemId, u64> = HashMap::new();
    for (order_index, item) in ordered.iter().enumerate() {
        let id = SessionItemId::random();
        item_ids.insert(item.id, id);
        planned_per_question.insert(item.id, item.planned_ms_per_question());
        items.push(SessionItem::new(
            id,
            input.session_id,
            item.id,
            seq.section_time(item.id, input.question_times),
            item.planned_ms(),
            item.question_count,
            0,
            u32::try_from(order_index).unwrap_or(u32::MAX),
        ));
    }

    let mut records = Vec::with_capacity(seq.total_questions());
    for slot in seq.slots() {
        let session_item_id = item_ids
            .get(&slot.template_item_id)
            .copied()
            .unwrap_or_else(SessionItemId::random);
        records.push(QuestionRecord::new(
            QuestionRecordId::random(),
            input.session_id,
            session_item_id,
            slot.number,
            input
                .question_times
                .get(&slot.number)
                .copied()
                .unwrap_or(0),
            planned_per_question
                .get(&slot.template_item_id)
                .copied()
                .unwrap_or(0),
            input
                .statuses
                .get(&slot.number)
                .copied()
                .unwrap_or(QuestionStatus::Unanswered),
        )?);
    }

    let session = Session::new(
        input.session_id,
        input.name.clone(),
        input.mode,
        input.template_id,
        custom_order,
        item_snapshot,
        input.status,
        started_at,
        ended_at,
        input.total_time_ms,
        input.paused_count,
    )?;

    Ok((session, items, records))
}

//
// ─── COMMIT SERVICE ────────────────────────────────────────────────────────────
//

/// Two-phase commit of runtime state to durable storage.
///
/// `ensure_draft` lazily creates a stable session row the first time the
/// user reaches review before saving; `save_ended` finalizes (or directly
/// saves) by overwriting the same row, so repeated practice → review →
/// save round trips never duplicate sessions.
pub struct SessionCommitService {
    runtime: SharedRuntime,
    sessions: Arc<dyn SessionRepository>,
    stats: Arc<dyn StatsRepository>,
    clock: Clock,
}

impl SessionCommitService {
    #[must_use]
    pub fn new(
        runtime: SharedRuntime,
        sessions: Arc<dyn SessionRepository>,
        stats: Arc<dyn StatsRepository>,
        clock: Clock,
    ) -> Self {
        Self {
            runtime,
            sessions,
            stats,
            clock,
        }
    }

    /// Create the durable session row once, reusing the active id on
    /// later calls ("ensure saved" semantics).
    ///
    /// # Errors
    ///
    /// Returns `CommitError` for validation or storage failures.
    pub async fn ensure_draft(&self, seq: &QuestionSequence) -> Result<SessionId, CommitError> {
        if let Some(id) = lock_runtime(&self.runtime).active_session_id() {
            return Ok(id);
        }
        self.commit(seq, None, &BTreeMap::new(), SessionStatus::Running)
            .await
    }

    /// Persist the run as an ended session. Overwrites the draft row when
    /// one exists; otherwise creates the session fresh.
    ///
    /// # Errors
    ///
    /// Returns `CommitError` for validation or storage failures.
    pub async fn save_ended(
        &self,
        seq: &QuestionSequence,
        name: Option<String>,
        statuses: &BTreeMap<u32, QuestionStatus>,
    ) -> Result<SessionId, CommitError> {
        self.commit(seq, name, statuses, SessionStatus::Ended).await
    }

    async fn commit(
        &self,
        seq: &QuestionSequence,
        name: Option<String>,
        statuses: &BTreeMap<u32, QuestionStatus>,
        status: SessionStatus,
    ) -> Result<SessionId, CommitError> {
        // gather the runtime fields first; durable writes happen strictly
        // after the in-memory computation so a failed save changes nothing
        let (session_id, mode, template_id, started_at, total_time_ms, paused_count, times) = {
            let runtime = lock_runtime(&self.runtime);
            (
                runtime.active_session_id().unwrap_or_else(SessionId::random),
                runtime.mode(),
                runtime.template_id(),
                runtime.started_at(),
                runtime.timers().total_ms,
                runtime.paused_count(),
                runtime.question_times().clone(),
            )
        };
        let template_id = template_id.ok_or(CommitError::NoTemplate)?;
        if seq.ordered_items().is_empty() {
            return Err(CommitError::EmptyRun);
        }

        let input = CommitInput {
            session_id,
            name,
            mode,
            template_id,
            status,
            started_at,
            total_time_ms,
            paused_count,
            question_times: &times,
            statuses,
            now: self.clock.now(),
        };
        let (session, items, records) = build_session_rows(seq, &input)?;

        let existing = self.sessions.get_session(session_id).await?;
        let was_ended = existing
            .as_ref()
            .is_some_and(|row| row.status() == SessionStatus::Ended);

        if existing.is_some() {
            self.sessions
                .overwrite_session(&session, &items, &records)
                .await?;
        } else {
            self.sessions.create_session(&session, &items).await?;
            self.sessions.append_question_records(&records).await?;
        }

        if status == SessionStatus::Ended && !was_ended {
            let counts = StatusCounts::from_slots(seq.slots(), statuses);
            let stat = DailyStat::new(
                self.clock.now().date_naive(),
                1,
                total_time_ms,
                counts.completion_rate(),
            );
            self.stats.accumulate_daily_stat(&stat).await?;
        }

        lock_runtime(&self.runtime).set_active_session_id(Some(session_id));
        tracing::info!(session = %session_id, status = status.as_str(), "session committed");
        Ok(session_id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
