use std::sync::Arc;

use pacer_core::model::{Mode, SessionId, TemplateItemId};
use pacer_core::runtime::{SessionPhase, SessionRuntime, SessionTimers};
use pacer_core::sequence::QuestionSequence;
use pacer_core::time::{Clock, format_date_time};
use storage::repository::{QuestionTypeRepository, SnapshotRepository, TemplateRepository};

use crate::commit::SessionCommitService;
use crate::error::PracticeError;
use crate::grid::sequence_items;
use crate::runtime_handle::{SharedRuntime, lock_runtime};
use crate::timer::{TimerDriver, TimerGuard};

/// Derived, read-only picture of the practice screen's state.
///
/// The section and question timers here are *display* values: recorded
/// per-question time for the relevant range plus the in-flight question
/// timer, not the raw state-machine counters.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeView {
    pub mode: Mode,
    pub phase: SessionPhase,
    pub is_paused: bool,
    pub can_pause: bool,
    pub is_locked: bool,
    pub can_navigate: bool,
    pub has_items: bool,
    pub total_questions: usize,
    pub current_question: Option<u32>,
    pub active_index: usize,
    pub timers: SessionTimers,
    pub planned_ms: u64,
    pub actual_ms: u64,
    pub progress: f64,
    pub is_overtime: bool,
    pub can_go_prev: bool,
    pub can_go_next: bool,
    pub skipped_items: Vec<TemplateItemId>,
}

/// Orchestrates the practice flow: template/order normalization, question
/// navigation over the traversal sequence, and the start/pause/end
/// lifecycle. All navigation attributes the in-flight question's time
/// *before* moving the pointer.
pub struct PracticeService {
    runtime: SharedRuntime,
    templates: Arc<dyn TemplateRepository>,
    question_types: Arc<dyn QuestionTypeRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    timer: Arc<TimerDriver>,
    commit: Arc<SessionCommitService>,
    clock: Clock,
}

impl PracticeService {
    #[must_use]
    pub fn new(
        runtime: SharedRuntime,
        templates: Arc<dyn TemplateRepository>,
        question_types: Arc<dyn QuestionTypeRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        timer: Arc<TimerDriver>,
        commit: Arc<SessionCommitService>,
        clock: Clock,
    ) -> Self {
        Self {
            runtime,
            templates,
            question_types,
            snapshots,
            timer,
            commit,
            clock,
        }
    }

    /// Register a screen as a timer consumer for as long as the guard
    /// lives.
    #[must_use]
    pub fn acquire_timer(&self) -> TimerGuard {
        self.timer.acquire()
    }

    //
    // ─── DERIVED STATE ─────────────────────────────────────────────────────
    //

    /// Bring the runtime in line with the stored templates and return the
    /// current question sequence.
    ///
    /// Outside a run this selects a fallback template when the current one
    /// is gone, normalizes the working order against the template's items
    /// (invalid ids dropped, missing ids appended in template order), and
    /// resynchronizes the current question and item position. While
    /// running it only reads; an active run's order is never touched.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` when template data cannot be read.
    pub async fn refresh(&self) -> Result<QuestionSequence, PracticeError> {
        let templates = self.templates.list_templates().await?;

        let selected = lock_runtime(&self.runtime).template_id();
        let valid = selected.filter(|id| templates.iter().any(|t| t.id() == *id));
        let active = match valid {
            Some(id) => Some(id),
            None => {
                let fallback = templates
                    .iter()
                    .find(|t| t.is_default())
                    .or_else(|| templates.first())
                    .map(pacer_core::model::Template::id);
                if let Some(id) = fallback {
                    // ignored while running: an active run keeps its template
                    let _ = lock_runtime(&self.runtime).set_template(id);
                }
                fallback
            }
        };

        let Some(template_id) = active else {
            return Ok(QuestionSequence::build(Vec::new(), Vec::new()));
        };

        let items = self.templates.get_template_items(template_id).await?;
        let types = self.question_types.list_question_types().await?;
        let base_items = sequence_items(&items, &types);

        {
            let mut runtime = lock_runtime(&self.runtime);
            if !runtime.is_running() && !items.is_empty() {
                let valid_ids: Vec<TemplateItemId> =
                    items.iter().map(pacer_core::model::TemplateItem::id).collect();
                let filtered: Vec<TemplateItemId> = runtime
                    .order()
                    .iter()
                    .copied()
                    .filter(|id| valid_ids.contains(id))
                    .collect();
                let missing: Vec<TemplateItemId> = valid_ids
                    .iter()
                    .copied()
                    .filter(|id| !filtered.contains(id))
                    .collect();
                let normalized: Vec<TemplateItemId> =
                    filtered.into_iter().chain(missing).collect();
                if !normalized.is_empty() && normalized != runtime.order() {
                    let _ = runtime.set_order(normalized);
                }
            }
        }

        let order = lock_runtime(&self.runtime).order().to_vec();
        let seq = QuestionSequence::build(base_items, order);

        {
            let mut runtime = lock_runtime(&self.runtime);
            if seq.has_items() {
                let resolved = seq.resolve_current(runtime.current_question());
                if resolved != runtime.current_question() {
                    runtime.set_current_question(resolved);
                }
                if let Some(number) = resolved {
                    if let Some(index) = seq.target_index_for(number) {
                        if index != runtime.current_index() {
                            runtime.jump_to(index);
                        }
                    }
                }
            } else if !runtime.is_running() && runtime.current_question().is_some() {
                runtime.set_current_question(None);
            }
        }

        Ok(seq)
    }

    /// Compute the display view for the practice screen.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` when template data cannot be read.
    pub async fn view(&self) -> Result<PracticeView, PracticeError> {
        let seq = self.refresh().await?;
        let runtime = lock_runtime(&self.runtime);

        let ordered = seq.ordered_items();
        let active_index = runtime.current_index().min(ordered.len().saturating_sub(1));
        let current_item = ordered.get(active_index).copied();
        let current_question = seq.resolve_current(runtime.current_question());
        let raw = runtime.timers();

        let question_elapsed = current_question
            .map(|number| runtime.question_time(number) + raw.question_ms)
            .unwrap_or(0);
        let section_elapsed = current_item
            .map(|item| {
                let mut total = seq.section_time(item.id, runtime.question_times());
                let in_section = current_question
                    .and_then(|number| seq.range_of(item.id).map(|range| range.contains(number)))
                    .unwrap_or(false);
                if in_section {
                    total += raw.question_ms;
                }
                total
            })
            .unwrap_or(0);

        let planned_ms = current_item.map_or(0, |item| item.planned_ms());
        let actual_ms = section_elapsed;
        #[allow(clippy::cast_precision_loss)]
        let progress = if planned_ms > 0 {
            (actual_ms as f64 / planned_ms as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let is_running = runtime.is_running();
        Ok(PracticeView {
            mode: runtime.mode(),
            phase: runtime.phase(),
            is_paused: runtime.is_paused(),
            can_pause: runtime.mode() == Mode::Practice && is_running,
            is_locked: is_running,
            can_navigate: is_running,
            has_items: seq.has_items(),
            total_questions: seq.total_questions(),
            current_question,
            active_index,
            timers: SessionTimers {
                total_ms: raw.total_ms,
                section_ms: section_elapsed,
                question_ms: question_elapsed,
            },
            planned_ms,
            actual_ms,
            progress,
            is_overtime: planned_ms > 0 && actual_ms > planned_ms,
            can_go_prev: current_question.is_some_and(|n| seq.can_go_prev(n)),
            can_go_next: current_question.is_some_and(|n| seq.can_go_next(n)),
            skipped_items: seq.skipped_item_ids(runtime.skipped_questions().iter()),
        })
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────
    //

    /// Start the run, or reset an ended one back to idle (restart is a
    /// two-step: reset, then start).
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::NoTemplate` when no template can be
    /// selected, and state errors for other rejected transitions.
    pub async fn start(&self) -> Result<(), PracticeError> {
        let seq = self.refresh().await?;
        {
            let mut runtime = lock_runtime(&self.runtime);
            if runtime.phase() == SessionPhase::Ended {
                runtime.reset();
            } else {
                if !seq.has_items() {
                    return Err(PracticeError::NoTemplate);
                }
                runtime.start(self.clock.now())?;
            }
        }
        self.timer.sync();
        self.persist_snapshot().await;
        Ok(())
    }

    /// Pause the clock. Only practice mode may pause; a mock run
    /// simulates exam conditions.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::PauseUnavailable` in mock mode, and state
    /// errors when the run is not pausable.
    pub async fn pause(&self) -> Result<(), PracticeError> {
        {
            let mut runtime = lock_runtime(&self.runtime);
            if runtime.mode() != Mode::Practice {
                return Err(PracticeError::PauseUnavailable);
            }
            runtime.pause()?;
        }
        self.timer.sync();
        self.persist_snapshot().await;
        Ok(())
    }

    /// Resume a paused run.
    ///
    /// # Errors
    ///
    /// Returns state errors when the run is not paused.
    pub async fn resume(&self) -> Result<(), PracticeError> {
        lock_runtime(&self.runtime).resume()?;
        self.timer.sync();
        self.persist_snapshot().await;
        Ok(())
    }

    /// End the run, attributing the in-flight question's time first.
    ///
    /// # Errors
    ///
    /// Returns state errors when no run is active.
    pub async fn end(&self) -> Result<(), PracticeError> {
        let seq = self.refresh().await?;
        {
            let mut runtime = lock_runtime(&self.runtime);
            let current = seq.resolve_current(runtime.current_question()).unwrap_or(0);
            record_in_flight(&mut runtime, current);
            runtime.end()?;
        }
        self.timer.sync();
        self.persist_snapshot().await;
        Ok(())
    }

    /// Discard the current run and return to idle (restore banner's
    /// "start over", and the reset step of a restart).
    pub async fn reset(&self) {
        lock_runtime(&self.runtime).reset();
        self.timer.sync();
        self.persist_snapshot().await;
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────
    //

    /// Move to the next question in traversal order.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` when template data cannot be read.
    pub async fn next_question(&self) -> Result<(), PracticeError> {
        let seq = self.refresh().await?;
        {
            let mut runtime = lock_runtime(&self.runtime);
            if !seq.has_items() {
                return Ok(());
            }
            let current = seq.resolve_current(runtime.current_question()).unwrap_or(0);
            let Some(next) = seq.next_after(current) else {
                return Ok(());
            };
            move_to(&mut runtime, &seq, current, next);
        }
        self.persist_snapshot().await;
        Ok(())
    }

    /// Move to the previous question in traversal order.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` when template data cannot be read.
    pub async fn prev_question(&self) -> Result<(), PracticeError> {
        let seq = self.refresh().await?;
        {
            let mut runtime = lock_runtime(&self.runtime);
            if !seq.has_items() {
                return Ok(());
            }
            let current = seq.resolve_current(runtime.current_question()).unwrap_or(0);
            let Some(prev) = seq.prev_before(current) else {
                return Ok(());
            };
            move_to(&mut runtime, &seq, current, prev);
        }
        self.persist_snapshot().await;
        Ok(())
    }

    /// Jump directly to a question number from the answer sheet.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` when template data cannot be read.
    pub async fn select_question(&self, number: u32) -> Result<(), PracticeError> {
        let seq = self.refresh().await?;
        {
            let mut runtime = lock_runtime(&self.runtime);
            if !seq.has_items() || seq.sequence_position(number).is_none() {
                return Ok(());
            }
            let current = seq.resolve_current(runtime.current_question()).unwrap_or(0);
            if number == current {
                return Ok(());
            }
            move_to(&mut runtime, &seq, current, number);
        }
        self.persist_snapshot().await;
        Ok(())
    }

    /// Mark the current question skipped and advance.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` when template data cannot be read.
    pub async fn skip_current(&self) -> Result<(), PracticeError> {
        let seq = self.refresh().await?;
        {
            let mut runtime = lock_runtime(&self.runtime);
            if !seq.has_items() {
                return Ok(());
            }
            let current = seq.resolve_current(runtime.current_question()).unwrap_or(0);
            record_in_flight(&mut runtime, current);
            runtime.skip(current);
            if let Some(next) = seq.next_after(current) {
                runtime.set_current_question(Some(next));
                if let Some(index) = seq.target_index_for(next) {
                    runtime.jump_to(index);
                }
            } else if let Some(index) = seq.target_index_for(current) {
                // skipped the last question: restart its timer so the
                // recorded time is not attributed twice
                runtime.jump_to(index);
            }
        }
        self.persist_snapshot().await;
        Ok(())
    }

    /// Jump to the first question of the item at `index` in the working
    /// order.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` when template data cannot be read.
    pub async fn jump_item(&self, index: usize) -> Result<(), PracticeError> {
        let seq = self.refresh().await?;
        {
            let mut runtime = lock_runtime(&self.runtime);
            if index == runtime.current_index() {
                return Ok(());
            }
            let current = seq.resolve_current(runtime.current_question()).unwrap_or(0);
            record_in_flight(&mut runtime, current);
            let target = runtime
                .order()
                .get(index)
                .copied()
                .and_then(|id| seq.range_of(id))
                .map(|range| range.start);
            if let Some(start) = target {
                runtime.set_current_question(Some(start));
            }
            runtime.jump_to(index);
        }
        self.persist_snapshot().await;
        Ok(())
    }

    //
    // ─── SAVE ──────────────────────────────────────────────────────────────
    //

    /// Persist the ended run as a durable session (statuses stay
    /// unanswered; the review flow fills them in later).
    ///
    /// # Errors
    ///
    /// Returns `CommitError` wrapped storage/state failures.
    pub async fn save(&self, name: Option<String>) -> Result<SessionId, crate::error::CommitError> {
        let seq = self.refresh().await.map_err(|err| match err {
            PracticeError::Storage(inner) => crate::error::CommitError::Storage(inner),
            _ => crate::error::CommitError::NoTemplate,
        })?;
        let id = self
            .commit
            .save_ended(&seq, name, &std::collections::BTreeMap::new())
            .await?;
        lock_runtime(&self.runtime).mark_end_dialog_shown();
        self.persist_snapshot().await;
        Ok(id)
    }

    /// `"<template name> - YYYY/MM/DD HH:mm"`, used when the save dialog
    /// is left blank.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` when the template cannot be read.
    pub async fn default_session_name(&self) -> Result<String, PracticeError> {
        let template_id = lock_runtime(&self.runtime).template_id();
        let name = match template_id {
            Some(id) => self
                .templates
                .get_template(id)
                .await?
                .map(|t| t.name().to_owned()),
            None => None,
        };
        let stamp = format_date_time(self.clock.now());
        Ok(format!("{} - {stamp}", name.as_deref().unwrap_or("练习")))
    }

    async fn persist_snapshot(&self) {
        let snapshot = lock_runtime(&self.runtime).snapshot();
        if let Err(error) = self.snapshots.save_snapshot(&snapshot).await {
            tracing::warn!(%error, "failed to persist runtime snapshot");
        }
    }
}

/// Attribute the in-flight question timer to the question being left.
fn record_in_flight(runtime: &mut SessionRuntime, current: u32) {
    if !runtime.is_running() {
        return;
    }
    let elapsed = runtime.timers().question_ms;
    if current == 0 || elapsed == 0 {
        return;
    }
    runtime.record_question_time(current, elapsed);
}

fn move_to(runtime: &mut SessionRuntime, seq: &QuestionSequence, current: u32, target: u32) {
    record_in_flight(runtime, current);
    runtime.set_current_question(Some(target));
    if let Some(index) = seq.target_index_for(target) {
        runtime.jump_to(index);
    }
}
