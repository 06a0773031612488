use std::collections::BTreeMap;
use std::sync::Arc;

use pacer_core::model::{QuestionStatus, SessionId, TemplateItem};
use pacer_core::sequence::QuestionSequence;
use storage::repository::{QuestionTypeRepository, TemplateRepository};

use crate::commit::SessionCommitService;
use crate::error::ReviewError;
use crate::grid::{StatusCounts, sequence_items};
use crate::runtime_handle::{SharedRuntime, lock_runtime};

/// In-memory status sheet over the just-finished run's question grid.
///
/// Pure data: built from a sequence, edited by the UI, handed to the
/// commit service on save.
#[derive(Debug, Clone)]
pub struct ReviewSheet {
    statuses: BTreeMap<u32, QuestionStatus>,
    active_status: QuestionStatus,
    total_questions: usize,
}

impl ReviewSheet {
    #[must_use]
    pub fn new(seq: &QuestionSequence) -> Self {
        let statuses = seq
            .slots()
            .iter()
            .map(|slot| (slot.number, QuestionStatus::Unanswered))
            .collect();
        Self {
            statuses,
            active_status: QuestionStatus::Correct,
            total_questions: seq.total_questions(),
        }
    }

    #[must_use]
    pub fn statuses(&self) -> &BTreeMap<u32, QuestionStatus> {
        &self.statuses
    }

    #[must_use]
    pub fn active_status(&self) -> QuestionStatus {
        self.active_status
    }

    pub fn set_active_status(&mut self, status: QuestionStatus) {
        self.active_status = status;
    }

    /// Set one question's status. Unknown numbers are ignored.
    pub fn set_status(&mut self, number: u32, status: QuestionStatus) {
        if let Some(slot) = self.statuses.get_mut(&number) {
            *slot = status;
        }
    }

    /// Apply the currently selected status to a question (tap-to-mark).
    pub fn apply_active(&mut self, number: u32) {
        self.set_status(number, self.active_status);
    }

    pub fn mark_all_correct(&mut self) {
        for status in self.statuses.values_mut() {
            *status = QuestionStatus::Correct;
        }
    }

    pub fn clear_all(&mut self) {
        for status in self.statuses.values_mut() {
            *status = QuestionStatus::Unanswered;
        }
    }

    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        StatusCounts::from_statuses(self.statuses.values().copied())
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.total_questions
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

/// Post-run review: build a status sheet over the runtime session's grid
/// and commit it together with the recorded times.
pub struct ReviewService {
    runtime: SharedRuntime,
    templates: Arc<dyn TemplateRepository>,
    question_types: Arc<dyn QuestionTypeRepository>,
    commit: Arc<SessionCommitService>,
}

impl ReviewService {
    #[must_use]
    pub fn new(
        runtime: SharedRuntime,
        templates: Arc<dyn TemplateRepository>,
        question_types: Arc<dyn QuestionTypeRepository>,
        commit: Arc<SessionCommitService>,
    ) -> Self {
        Self {
            runtime,
            templates,
            question_types,
            commit,
        }
    }

    /// Build the review grid for the current runtime session, defaulting
    /// the working order to template order when none was chosen.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Storage` when template data cannot be read.
    pub async fn begin(&self) -> Result<(QuestionSequence, ReviewSheet), ReviewError> {
        let template_id = lock_runtime(&self.runtime).template_id();
        let Some(template_id) = template_id else {
            let seq = QuestionSequence::build(Vec::new(), Vec::new());
            let sheet = ReviewSheet::new(&seq);
            return Ok((seq, sheet));
        };

        let items = self.templates.get_template_items(template_id).await?;
        let types = self.question_types.list_question_types().await?;
        let base_items = sequence_items(&items, &types);

        {
            let mut runtime = lock_runtime(&self.runtime);
            if runtime.order().is_empty() && !items.is_empty() && !runtime.is_running() {
                let order = items.iter().map(TemplateItem::id).collect();
                runtime.set_order(order)?;
            }
        }

        let order = lock_runtime(&self.runtime).order().to_vec();
        let seq = QuestionSequence::build(base_items, order);
        let sheet = ReviewSheet::new(&seq);
        Ok((seq, sheet))
    }

    /// Lazily create the durable draft row for this run (navigating to a
    /// per-session review page before saving needs a stable id).
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Commit` for validation or storage failures.
    pub async fn ensure_session_saved(
        &self,
        seq: &QuestionSequence,
    ) -> Result<SessionId, ReviewError> {
        Ok(self.commit.ensure_draft(seq).await?)
    }

    /// Persist the review: recorded times plus the sheet's statuses.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Commit` for validation or storage failures.
    pub async fn save(
        &self,
        seq: &QuestionSequence,
        sheet: &ReviewSheet,
        name: Option<String>,
    ) -> Result<SessionId, ReviewError> {
        let id = self
            .commit
            .save_ended(seq, name, sheet.statuses())
            .await?;
        Ok(id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
