use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::{Mode, SessionId, TemplateId, TemplateItemId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Rejected transitions. Operations that would silently corrupt an active
/// run in the original design return these instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("operation not allowed while the session is running")]
    SessionRunning,

    #[error("session is not running")]
    NotRunning,

    #[error("session is already running")]
    AlreadyRunning,

    #[error("session is already paused")]
    AlreadyPaused,

    #[error("session is not paused")]
    NotPaused,

    #[error("session has ended; reset before starting again")]
    AlreadyEnded,

    #[error("no template selected")]
    NoTemplate,
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Session lifecycle. Pause is a flag on `Running` rather than its own
/// phase: timers, order and position all survive a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "phase")]
pub enum SessionPhase {
    Idle,
    Ready,
    Running { paused: bool },
    Ended,
}

impl SessionPhase {
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, SessionPhase::Running { .. })
    }

    #[must_use]
    pub fn is_paused(self) -> bool {
        matches!(self, SessionPhase::Running { paused: true })
    }
}

//
// ─── TIMERS ────────────────────────────────────────────────────────────────────
//

/// Elapsed time at the three granularities a run is tracked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimers {
    pub total_ms: u64,
    pub section_ms: u64,
    pub question_ms: u64,
}

//
// ─── RUNTIME ───────────────────────────────────────────────────────────────────
//

/// In-memory state machine for one practice/mock run.
///
/// All mutation goes through the named operations below; nothing else may
/// touch the fields, which keeps the timer/position invariants in one
/// place. Guarded operations return `SessionStateError` instead of
/// applying while a run is active. The bookkeeping operations (`tick`,
/// `record_question_time`, `skip`, navigation) keep the permissive no-op
/// contracts of the original engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRuntime {
    mode: Mode,
    phase: SessionPhase,
    template_id: Option<TemplateId>,
    order: Vec<TemplateItemId>,
    current_index: usize,
    timers: SessionTimers,
    started_at: Option<DateTime<Utc>>,
    skipped_questions: BTreeSet<u32>,
    question_times: BTreeMap<u32, u64>,
    current_question: Option<u32>,
    paused_count: u32,
    end_dialog_shown: bool,
    active_session_id: Option<SessionId>,
}

impl Default for SessionRuntime {
    fn default() -> Self {
        Self::new(Mode::Practice)
    }
}

impl SessionRuntime {
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            phase: SessionPhase::Idle,
            template_id: None,
            order: Vec::new(),
            current_index: 0,
            timers: SessionTimers::default(),
            started_at: None,
            skipped_questions: BTreeSet::new(),
            question_times: BTreeMap::new(),
            current_question: None,
            paused_count: 0,
            end_dialog_shown: false,
            active_session_id: None,
        }
    }

    //
    // ─── GUARDED TRANSITIONS ───────────────────────────────────────────────
    //

    /// Switch between practice and mock.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::SessionRunning` while a run is active.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), SessionStateError> {
        if self.phase.is_running() {
            return Err(SessionStateError::SessionRunning);
        }
        self.mode = mode;
        Ok(())
    }

    /// Select a template, moving to `Ready` and clearing per-run state.
    ///
    /// Section and question timers, question times, skips and the current
    /// question all reset; `total_ms` survives until `reset`.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::SessionRunning` while a run is active.
    pub fn set_template(&mut self, template_id: TemplateId) -> Result<(), SessionStateError> {
        if self.phase.is_running() {
            return Err(SessionStateError::SessionRunning);
        }
        self.template_id = Some(template_id);
        self.phase = SessionPhase::Ready;
        self.order.clear();
        self.current_index = 0;
        self.timers.section_ms = 0;
        self.timers.question_ms = 0;
        self.question_times.clear();
        self.skipped_questions.clear();
        self.current_question = None;
        Ok(())
    }

    /// Replace the working order, resetting position and per-question state.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::SessionRunning` while a run is active.
    pub fn set_order(&mut self, order: Vec<TemplateItemId>) -> Result<(), SessionStateError> {
        if self.phase.is_running() {
            return Err(SessionStateError::SessionRunning);
        }
        self.order = order;
        self.current_index = 0;
        self.skipped_questions.clear();
        self.timers.section_ms = 0;
        self.timers.question_ms = 0;
        self.question_times.clear();
        self.current_question = None;
        Ok(())
    }

    /// Begin the run.
    ///
    /// # Errors
    ///
    /// Returns `NoTemplate` from `Idle`, `AlreadyEnded` from `Ended`
    /// (callers restart via `reset`), and `AlreadyRunning` mid-run.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionStateError> {
        match self.phase {
            SessionPhase::Idle => Err(SessionStateError::NoTemplate),
            SessionPhase::Ended => Err(SessionStateError::AlreadyEnded),
            SessionPhase::Running { .. } => Err(SessionStateError::AlreadyRunning),
            SessionPhase::Ready => {
                self.phase = SessionPhase::Running { paused: false };
                self.started_at = Some(now);
                Ok(())
            }
        }
    }

    /// Pause the run. Timers freeze; everything else is untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` outside a run, `AlreadyPaused` when paused.
    pub fn pause(&mut self) -> Result<(), SessionStateError> {
        match self.phase {
            SessionPhase::Running { paused: false } => {
                self.phase = SessionPhase::Running { paused: true };
                self.paused_count = self.paused_count.saturating_add(1);
                Ok(())
            }
            SessionPhase::Running { paused: true } => Err(SessionStateError::AlreadyPaused),
            _ => Err(SessionStateError::NotRunning),
        }
    }

    /// Resume a paused run.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` outside a run, `NotPaused` when not paused.
    pub fn resume(&mut self) -> Result<(), SessionStateError> {
        match self.phase {
            SessionPhase::Running { paused: true } => {
                self.phase = SessionPhase::Running { paused: false };
                Ok(())
            }
            SessionPhase::Running { paused: false } => Err(SessionStateError::NotPaused),
            _ => Err(SessionStateError::NotRunning),
        }
    }

    /// End the run. The caller is responsible for recording the in-flight
    /// question's time first.
    ///
    /// # Errors
    ///
    /// Returns `NotRunning` unless the session is running.
    pub fn end(&mut self) -> Result<(), SessionStateError> {
        if !self.phase.is_running() {
            return Err(SessionStateError::NotRunning);
        }
        self.phase = SessionPhase::Ended;
        Ok(())
    }

    //
    // ─── TIME ACCUMULATION ─────────────────────────────────────────────────
    //

    /// Feed an elapsed delta. The only place elapsed time grows: all three
    /// timers advance together. Ignored unless running and not paused.
    pub fn tick(&mut self, delta_ms: u64) {
        if !matches!(self.phase, SessionPhase::Running { paused: false }) {
            return;
        }
        self.timers.total_ms = self.timers.total_ms.saturating_add(delta_ms);
        self.timers.section_ms = self.timers.section_ms.saturating_add(delta_ms);
        self.timers.question_ms = self.timers.question_ms.saturating_add(delta_ms);
    }

    /// Attribute `delta_ms` to a question number (accumulating, never
    /// overwriting). Navigation calls this for the question being left
    /// *before* moving the pointer. No-op for zero inputs.
    pub fn record_question_time(&mut self, question_number: u32, delta_ms: u64) {
        if question_number == 0 || delta_ms == 0 {
            return;
        }
        let slot = self.question_times.entry(question_number).or_insert(0);
        *slot = slot.saturating_add(delta_ms);
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────
    //

    /// Move the externally-visible question pointer. Does not touch timers.
    pub fn set_current_question(&mut self, question_number: Option<u32>) {
        self.current_question = question_number;
    }

    /// Jump to an explicit position in the working order. The question
    /// timer always restarts; the section timer restarts only when the
    /// target is a different item (a same-section question move keeps it).
    pub fn jump_to(&mut self, index: usize) {
        let target = index.min(self.order.len().saturating_sub(1));
        if target != self.current_index {
            self.timers.section_ms = 0;
        }
        self.current_index = target;
        self.timers.question_ms = 0;
    }

    /// Advance one item (whole-section granularity; both timers restart).
    pub fn next(&mut self) {
        self.current_index = (self.current_index + 1).min(self.order.len().saturating_sub(1));
        self.timers.section_ms = 0;
        self.timers.question_ms = 0;
    }

    /// Step back one item (whole-section granularity; both timers restart).
    pub fn back(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
        self.timers.section_ms = 0;
        self.timers.question_ms = 0;
    }

    /// Mark a question as skipped. Set semantics; repeated calls keep a
    /// single entry.
    pub fn skip(&mut self, question_number: u32) {
        if question_number == 0 {
            return;
        }
        self.skipped_questions.insert(question_number);
    }

    //
    // ─── LIFECYCLE / BOOKKEEPING ───────────────────────────────────────────
    //

    /// Return to `Idle`, preserving only the mode.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }

    pub fn mark_end_dialog_shown(&mut self) {
        self.end_dialog_shown = true;
    }

    pub fn set_active_session_id(&mut self, id: Option<SessionId>) {
        self.active_session_id = id;
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase.is_running()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.phase.is_paused()
    }

    #[must_use]
    pub fn template_id(&self) -> Option<TemplateId> {
        self.template_id
    }

    #[must_use]
    pub fn order(&self) -> &[TemplateItemId] {
        &self.order
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn timers(&self) -> SessionTimers {
        self.timers
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn skipped_questions(&self) -> &BTreeSet<u32> {
        &self.skipped_questions
    }

    #[must_use]
    pub fn question_times(&self) -> &BTreeMap<u32, u64> {
        &self.question_times
    }

    /// Accumulated time for one question number (0 when never visited).
    #[must_use]
    pub fn question_time(&self, question_number: u32) -> u64 {
        self.question_times
            .get(&question_number)
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<u32> {
        self.current_question
    }

    #[must_use]
    pub fn paused_count(&self) -> u32 {
        self.paused_count
    }

    #[must_use]
    pub fn end_dialog_shown(&self) -> bool {
        self.end_dialog_shown
    }

    #[must_use]
    pub fn active_session_id(&self) -> Option<SessionId> {
        self.active_session_id
    }

    //
    // ─── SNAPSHOT ──────────────────────────────────────────────────────────
    //

    /// Serializable copy of the runtime for crash/reload recovery.
    #[must_use]
    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            mode: self.mode,
            phase: self.phase,
            template_id: self.template_id,
            order: self.order.clone(),
            current_index: self.current_index,
            timers: self.timers,
            started_at: self.started_at,
            skipped_questions: self.skipped_questions.clone(),
            question_times: self.question_times.clone(),
            current_question: self.current_question,
            paused_count: self.paused_count,
            end_dialog_shown: self.end_dialog_shown,
            active_session_id: self.active_session_id,
        }
    }

    /// Rebuild a runtime from a persisted snapshot. A snapshot taken while
    /// running comes back paused: after a reload the user must explicitly
    /// resume before time accumulates again.
    #[must_use]
    pub fn from_snapshot(snapshot: RuntimeSnapshot) -> Self {
        let phase = match snapshot.phase {
            SessionPhase::Running { .. } => SessionPhase::Running { paused: true },
            other => other,
        };
        Self {
            mode: snapshot.mode,
            phase,
            template_id: snapshot.template_id,
            order: snapshot.order,
            current_index: snapshot.current_index,
            timers: snapshot.timers,
            started_at: snapshot.started_at,
            skipped_questions: snapshot.skipped_questions,
            question_times: snapshot.question_times,
            current_question: snapshot.current_question,
            paused_count: snapshot.paused_count,
            end_dialog_shown: snapshot.end_dialog_shown,
            active_session_id: snapshot.active_session_id,
        }
    }
}

/// Persisted form of [`SessionRuntime`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    pub mode: Mode,
    pub phase: SessionPhase,
    pub template_id: Option<TemplateId>,
    pub order: Vec<TemplateItemId>,
    pub current_index: usize,
    pub timers: SessionTimers,
    pub started_at: Option<DateTime<Utc>>,
    pub skipped_questions: BTreeSet<u32>,
    pub question_times: BTreeMap<u32, u64>,
    pub current_question: Option<u32>,
    pub paused_count: u32,
    pub end_dialog_shown: bool,
    pub active_session_id: Option<SessionId>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn ready_runtime() -> SessionRuntime {
        let mut runtime = SessionRuntime::new(Mode::Practice);
        runtime.set_template(TemplateId::random()).unwrap();
        runtime
            .set_order(vec![TemplateItemId::random(), TemplateItemId::random()])
            .unwrap();
        runtime
    }

    fn running_runtime() -> SessionRuntime {
        let mut runtime = ready_runtime();
        runtime.start(fixed_now()).unwrap();
        runtime
    }

    #[test]
    fn starts_only_from_ready() {
        let mut runtime = SessionRuntime::new(Mode::Practice);
        assert_eq!(
            runtime.start(fixed_now()).unwrap_err(),
            SessionStateError::NoTemplate
        );

        runtime.set_template(TemplateId::random()).unwrap();
        runtime.start(fixed_now()).unwrap();
        assert!(runtime.is_running());
        assert_eq!(runtime.started_at(), Some(fixed_now()));

        assert_eq!(
            runtime.start(fixed_now()).unwrap_err(),
            SessionStateError::AlreadyRunning
        );

        runtime.end().unwrap();
        assert_eq!(
            runtime.start(fixed_now()).unwrap_err(),
            SessionStateError::AlreadyEnded
        );
    }

    #[test]
    fn order_mutations_are_rejected_while_running() {
        let mut runtime = running_runtime();
        let err = runtime.set_order(vec![TemplateItemId::random()]).unwrap_err();
        assert_eq!(err, SessionStateError::SessionRunning);
        assert_eq!(
            runtime.set_template(TemplateId::random()).unwrap_err(),
            SessionStateError::SessionRunning
        );
        assert_eq!(
            runtime.set_mode(Mode::Mock).unwrap_err(),
            SessionStateError::SessionRunning
        );
    }

    #[test]
    fn tick_advances_all_three_timers_together() {
        let mut runtime = running_runtime();
        runtime.tick(1000);
        runtime.tick(1000);
        runtime.tick(1000);
        runtime.pause().unwrap();
        runtime.tick(1000); // frozen
        runtime.resume().unwrap();
        runtime.tick(500);

        let timers = runtime.timers();
        assert_eq!(timers.total_ms, 3500);
        assert_eq!(timers.section_ms, 3500);
        assert_eq!(timers.question_ms, 3500);
        assert_eq!(runtime.paused_count(), 1);
    }

    #[test]
    fn tick_is_ignored_before_start() {
        let mut runtime = ready_runtime();
        runtime.tick(1000);
        assert_eq!(runtime.timers(), SessionTimers::default());
    }

    #[test]
    fn pause_and_resume_are_guarded() {
        let mut runtime = ready_runtime();
        assert_eq!(runtime.pause().unwrap_err(), SessionStateError::NotRunning);

        runtime.start(fixed_now()).unwrap();
        assert_eq!(runtime.resume().unwrap_err(), SessionStateError::NotPaused);
        runtime.pause().unwrap();
        assert_eq!(runtime.pause().unwrap_err(), SessionStateError::AlreadyPaused);
        runtime.resume().unwrap();
        assert!(!runtime.is_paused());
    }

    #[test]
    fn question_time_accumulates_instead_of_overwriting() {
        let mut runtime = running_runtime();
        runtime.record_question_time(3, 700);
        runtime.record_question_time(3, 300);
        assert_eq!(runtime.question_time(3), 1000);

        // zero inputs are no-ops
        runtime.record_question_time(0, 500);
        runtime.record_question_time(4, 0);
        assert_eq!(runtime.question_time(0), 0);
        assert_eq!(runtime.question_time(4), 0);
    }

    #[test]
    fn same_index_jump_keeps_section_timer() {
        let mut runtime = running_runtime();
        runtime.tick(2000);

        runtime.jump_to(0);
        assert_eq!(runtime.timers().section_ms, 2000);
        assert_eq!(runtime.timers().question_ms, 0);

        runtime.tick(500);
        runtime.jump_to(1);
        assert_eq!(runtime.timers().section_ms, 0);
        assert_eq!(runtime.timers().question_ms, 0);
        assert_eq!(runtime.current_index(), 1);
    }

    #[test]
    fn next_and_back_clamp_to_order_bounds() {
        let mut runtime = running_runtime();
        runtime.back();
        assert_eq!(runtime.current_index(), 0);
        runtime.next();
        runtime.next();
        runtime.next();
        assert_eq!(runtime.current_index(), 1);
    }

    #[test]
    fn skip_has_set_semantics() {
        let mut runtime = running_runtime();
        runtime.skip(7);
        runtime.skip(7);
        runtime.skip(7);
        assert_eq!(runtime.skipped_questions().len(), 1);
        assert!(runtime.skipped_questions().contains(&7));

        runtime.skip(0);
        assert_eq!(runtime.skipped_questions().len(), 1);
    }

    #[test]
    fn set_template_clears_run_state_but_not_total() {
        let mut runtime = running_runtime();
        runtime.tick(4000);
        runtime.record_question_time(1, 4000);
        runtime.skip(2);
        runtime.end().unwrap();

        runtime.set_template(TemplateId::random()).unwrap();
        assert_eq!(runtime.phase(), SessionPhase::Ready);
        assert_eq!(runtime.timers().total_ms, 4000);
        assert_eq!(runtime.timers().section_ms, 0);
        assert_eq!(runtime.timers().question_ms, 0);
        assert!(runtime.question_times().is_empty());
        assert!(runtime.skipped_questions().is_empty());
        assert_eq!(runtime.current_question(), None);
        assert!(runtime.order().is_empty());
    }

    #[test]
    fn reset_preserves_only_mode() {
        let mut runtime = running_runtime();
        runtime.set_active_session_id(Some(SessionId::random()));
        runtime.mark_end_dialog_shown();
        runtime.tick(9000);

        runtime.reset();
        assert_eq!(runtime.mode(), Mode::Practice);
        assert_eq!(runtime.phase(), SessionPhase::Idle);
        assert_eq!(runtime.timers(), SessionTimers::default());
        assert_eq!(runtime.active_session_id(), None);
        assert!(!runtime.end_dialog_shown());
        assert_eq!(runtime.started_at(), None);
    }

    #[test]
    fn end_requires_a_running_session() {
        let mut runtime = ready_runtime();
        assert_eq!(runtime.end().unwrap_err(), SessionStateError::NotRunning);
        runtime.start(fixed_now()).unwrap();
        runtime.pause().unwrap();
        runtime.end().unwrap();
        assert_eq!(runtime.phase(), SessionPhase::Ended);
    }

    #[test]
    fn snapshot_roundtrip_forces_pause_on_running() {
        let mut runtime = running_runtime();
        runtime.tick(1234);
        runtime.record_question_time(1, 1234);
        runtime.set_current_question(Some(2));
        runtime.skip(1);

        let snapshot = runtime.snapshot();
        let restored = SessionRuntime::from_snapshot(snapshot.clone());

        assert!(restored.is_running());
        assert!(restored.is_paused());
        assert_eq!(restored.timers(), runtime.timers());
        assert_eq!(restored.question_times(), runtime.question_times());
        assert_eq!(restored.current_question(), Some(2));
        assert_eq!(restored.skipped_questions(), runtime.skipped_questions());

        // non-running phases restore verbatim
        let mut idle = SessionRuntime::new(Mode::Mock);
        idle.set_template(TemplateId::random()).unwrap();
        let restored = SessionRuntime::from_snapshot(idle.snapshot());
        assert_eq!(restored.phase(), SessionPhase::Ready);
    }

    #[test]
    fn snapshot_serializes_to_json_and_back() {
        let mut runtime = running_runtime();
        runtime.tick(250);
        runtime.record_question_time(1, 250);

        let json = serde_json::to_string(&runtime.snapshot()).unwrap();
        let parsed: RuntimeSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, runtime.snapshot());
    }
}
