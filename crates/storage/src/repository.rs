use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use pacer_core::model::{
    AppSettings, DailyStat, QuestionRecord, QuestionRecordId, QuestionType, QuestionTypeId,
    Session, SessionId, SessionItem, SessionItemId, SessionStatus, Template, TemplateId,
    TemplateItem, TemplateItemId,
};
use pacer_core::runtime::RuntimeSnapshot;

use crate::backup::BackupData;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository contract for question types.
#[async_trait]
pub trait QuestionTypeRepository: Send + Sync {
    /// List every question type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_question_types(&self) -> Result<Vec<QuestionType>, StorageError>;

    /// Fetch one question type, `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_question_type(
        &self,
        id: QuestionTypeId,
    ) -> Result<Option<QuestionType>, StorageError>;

    /// Insert or replace a question type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_question_type(&self, question_type: &QuestionType)
        -> Result<(), StorageError>;

    /// Remove a question type.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_question_type(&self, id: QuestionTypeId) -> Result<(), StorageError>;
}

/// Repository contract for templates and their items.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// List every template row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_templates(&self) -> Result<Vec<Template>, StorageError>;

    /// Fetch one template row, `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StorageError>;

    /// Items belonging to a template, sorted by `order_index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_template_items(
        &self,
        template_id: TemplateId,
    ) -> Result<Vec<TemplateItem>, StorageError>;

    /// Insert or replace a template and its full item set. Existing items
    /// for the template are removed first so no orphans survive; the whole
    /// operation is one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be stored.
    async fn upsert_template(
        &self,
        template: &Template,
        items: &[TemplateItem],
    ) -> Result<(), StorageError>;

    /// Remove a template and cascade its items.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_template(&self, id: TemplateId) -> Result<(), StorageError>;
}

/// Repository contract for sessions, their items and question records.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session with its items, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be stored.
    async fn create_session(
        &self,
        session: &Session,
        items: &[SessionItem],
    ) -> Result<(), StorageError>;

    /// Replace an existing session row (name/status patches).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn update_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Upsert question records (idempotent by record id).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be stored.
    async fn append_question_records(
        &self,
        records: &[QuestionRecord],
    ) -> Result<(), StorageError>;

    /// Overwrite a session and everything it owns: old items and records
    /// scoped to the session id are deleted, then the new triple is
    /// written, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be stored.
    async fn overwrite_session(
        &self,
        session: &Session,
        items: &[SessionItem],
        records: &[QuestionRecord],
    ) -> Result<(), StorageError>;

    /// List every session row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError>;

    /// List sessions with the given status (secondary index).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_sessions_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Session>, StorageError>;

    /// Fetch one session row, `None` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError>;

    /// Items belonging to a session, sorted by `order_index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_session_items(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionItem>, StorageError>;

    /// Question records belonging to a session, sorted by question index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_question_records(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<QuestionRecord>, StorageError>;

    /// Remove a session and cascade its items and records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError>;
}

/// Repository contract for the per-day aggregates.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// List every daily stat row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_daily_stats(&self) -> Result<Vec<DailyStat>, StorageError>;

    /// Merge an entry into the row for its date (accumulate, not replace)
    /// and return the stored result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn accumulate_daily_stat(&self, entry: &DailyStat) -> Result<DailyStat, StorageError>;
}

/// Repository contract for the singleton settings row.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Fetch the settings row, `None` when never written.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_settings(&self) -> Result<Option<AppSettings>, StorageError>;

    /// Insert or replace the settings row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn put_settings(&self, settings: &AppSettings) -> Result<(), StorageError>;
}

/// Repository contract for the out-of-band runtime snapshot used to restore
/// an interrupted run after a reload.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Load the stored snapshot, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn load_snapshot(&self) -> Result<Option<RuntimeSnapshot>, StorageError>;

    /// Replace the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_snapshot(&self, snapshot: &RuntimeSnapshot) -> Result<(), StorageError>;

    /// Drop the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn clear_snapshot(&self) -> Result<(), StorageError>;
}

/// Whole-store export/import used by the backup flow.
#[async_trait]
pub trait BackupRepository: Send + Sync {
    /// Read every collection into a backup data set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn export_all(&self) -> Result<BackupData, StorageError>;

    /// Full destructive overwrite: every collection is cleared and
    /// repopulated from the payload inside one multi-collection
    /// transaction, so related collections stay consistent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any row fails to convert or store; in that
    /// case nothing is committed.
    async fn import_all(&self, data: &BackupData) -> Result<(), StorageError>;
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub question_types: Arc<dyn QuestionTypeRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub stats: Arc<dyn StatsRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub backup: Arc<dyn BackupRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            question_types: Arc::new(repo.clone()),
            templates: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            stats: Arc::new(repo.clone()),
            settings: Arc::new(repo.clone()),
            snapshots: Arc::new(repo.clone()),
            backup: Arc::new(repo),
        }
    }
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

#[derive(Default)]
struct InMemoryState {
    question_types: HashMap<QuestionTypeId, QuestionType>,
    templates: HashMap<TemplateId, Template>,
    template_items: HashMap<TemplateItemId, TemplateItem>,
    sessions: HashMap<SessionId, Session>,
    session_items: HashMap<SessionItemId, SessionItem>,
    question_records: HashMap<QuestionRecordId, QuestionRecord>,
    stats_daily: HashMap<chrono::NaiveDate, DailyStat>,
    settings: Option<AppSettings>,
    snapshot: Option<RuntimeSnapshot>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// A single mutex guards the whole store, which mirrors the transactional
/// contract: each repository call observes and applies a consistent state.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuestionTypeRepository for InMemoryRepository {
    async fn list_question_types(&self) -> Result<Vec<QuestionType>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state.question_types.values().cloned().collect();
        rows.sort_by_key(|row| (row.created_at(), row.id()));
        Ok(rows)
    }

    async fn get_question_type(
        &self,
        id: QuestionTypeId,
    ) -> Result<Option<QuestionType>, StorageError> {
        Ok(self.lock()?.question_types.get(&id).cloned())
    }

    async fn upsert_question_type(
        &self,
        question_type: &QuestionType,
    ) -> Result<(), StorageError> {
        self.lock()?
            .question_types
            .insert(question_type.id(), question_type.clone());
        Ok(())
    }

    async fn delete_question_type(&self, id: QuestionTypeId) -> Result<(), StorageError> {
        self.lock()?.question_types.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for InMemoryRepository {
    async fn list_templates(&self) -> Result<Vec<Template>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state.templates.values().cloned().collect();
        rows.sort_by_key(|row| (row.created_at(), row.id()));
        Ok(rows)
    }

    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StorageError> {
        Ok(self.lock()?.templates.get(&id).cloned())
    }

    async fn get_template_items(
        &self,
        template_id: TemplateId,
    ) -> Result<Vec<TemplateItem>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state
            .template_items
            .values()
            .filter(|item| item.template_id() == template_id)
            .cloned()
            .collect();
        rows.sort_by_key(TemplateItem::order_index);
        Ok(rows)
    }

    async fn upsert_template(
        &self,
        template: &Template,
        items: &[TemplateItem],
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.templates.insert(template.id(), template.clone());
        state
            .template_items
            .retain(|_, item| item.template_id() != template.id());
        for item in items {
            state.template_items.insert(item.id(), item.clone());
        }
        Ok(())
    }

    async fn delete_template(&self, id: TemplateId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.templates.remove(&id);
        state
            .template_items
            .retain(|_, item| item.template_id() != id);
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(
        &self,
        session: &Session,
        items: &[SessionItem],
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.sessions.insert(session.id(), session.clone());
        for item in items {
            state.session_items.insert(item.id, item.clone());
        }
        Ok(())
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.sessions.contains_key(&session.id()) {
            return Err(StorageError::NotFound);
        }
        state.sessions.insert(session.id(), session.clone());
        Ok(())
    }

    async fn append_question_records(
        &self,
        records: &[QuestionRecord],
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        for record in records {
            state.question_records.insert(record.id, record.clone());
        }
        Ok(())
    }

    async fn overwrite_session(
        &self,
        session: &Session,
        items: &[SessionItem],
        records: &[QuestionRecord],
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .session_items
            .retain(|_, item| item.session_id != session.id());
        state
            .question_records
            .retain(|_, record| record.session_id != session.id());
        state.sessions.insert(session.id(), session.clone());
        for item in items {
            state.session_items.insert(item.id, item.clone());
        }
        for record in records {
            state.question_records.insert(record.id, record.clone());
        }
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state.sessions.values().cloned().collect();
        rows.sort_by_key(|row| (row.started_at(), row.id()));
        Ok(rows)
    }

    async fn list_sessions_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Session>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state
            .sessions
            .values()
            .filter(|session| session.status() == status)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.started_at(), row.id()));
        Ok(rows)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn get_session_items(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionItem>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state
            .session_items
            .values()
            .filter(|item| item.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|item| item.order_index);
        Ok(rows)
    }

    async fn get_question_records(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<QuestionRecord>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state
            .question_records
            .values()
            .filter(|record| record.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by_key(|record| record.question_index);
        Ok(rows)
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.sessions.remove(&id);
        state.session_items.retain(|_, item| item.session_id != id);
        state
            .question_records
            .retain(|_, record| record.session_id != id);
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for InMemoryRepository {
    async fn list_daily_stats(&self) -> Result<Vec<DailyStat>, StorageError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state.stats_daily.values().cloned().collect();
        rows.sort_by_key(DailyStat::date);
        Ok(rows)
    }

    async fn accumulate_daily_stat(&self, entry: &DailyStat) -> Result<DailyStat, StorageError> {
        let mut state = self.lock()?;
        let stored = state
            .stats_daily
            .entry(entry.date())
            .and_modify(|existing| existing.accumulate(entry))
            .or_insert_with(|| entry.clone());
        Ok(stored.clone())
    }
}

#[async_trait]
impl SettingsRepository for InMemoryRepository {
    async fn get_settings(&self) -> Result<Option<AppSettings>, StorageError> {
        Ok(self.lock()?.settings.clone())
    }

    async fn put_settings(&self, settings: &AppSettings) -> Result<(), StorageError> {
        self.lock()?.settings = Some(settings.clone());
        Ok(())
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn load_snapshot(&self) -> Result<Option<RuntimeSnapshot>, StorageError> {
        Ok(self.lock()?.snapshot.clone())
    }

    async fn save_snapshot(&self, snapshot: &RuntimeSnapshot) -> Result<(), StorageError> {
        self.lock()?.snapshot = Some(snapshot.clone());
        Ok(())
    }

    async fn clear_snapshot(&self) -> Result<(), StorageError> {
        self.lock()?.snapshot = None;
        Ok(())
    }
}

#[async_trait]
impl BackupRepository for InMemoryRepository {
    async fn export_all(&self) -> Result<BackupData, StorageError> {
        let question_types = self.list_question_types().await?;
        let templates = self.list_templates().await?;
        let sessions = self.list_sessions().await?;
        let stats = self.list_daily_stats().await?;
        let settings = self.get_settings().await?;
        let state = self.lock()?;
        let template_items: Vec<_> = state.template_items.values().cloned().collect();
        let session_items: Vec<_> = state.session_items.values().cloned().collect();
        let question_records: Vec<_> = state.question_records.values().cloned().collect();
        drop(state);
        Ok(BackupData::from_rows(
            &question_types,
            &templates,
            &template_items,
            &sessions,
            &session_items,
            &question_records,
            &stats,
            settings.as_ref(),
        ))
    }

    async fn import_all(&self, data: &BackupData) -> Result<(), StorageError> {
        // convert everything up front so a bad row leaves the store intact
        let converted = data.to_domain()?;
        let mut state = self.lock()?;
        *state = InMemoryState::default();
        for row in converted.question_types {
            state.question_types.insert(row.id(), row);
        }
        for row in converted.templates {
            state.templates.insert(row.id(), row);
        }
        for row in converted.template_items {
            state.template_items.insert(row.id(), row);
        }
        for row in converted.sessions {
            state.sessions.insert(row.id(), row);
        }
        for row in converted.session_items {
            state.session_items.insert(row.id, row);
        }
        for row in converted.question_records {
            state.question_records.insert(row.id, row);
        }
        for row in converted.stats_daily {
            state.stats_daily.insert(row.date(), row);
        }
        state.settings = converted.settings;
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
