use std::sync::Arc;

use pacer_core::runtime::SessionRuntime;
use pacer_core::time::Clock;
use storage::repository::Storage;

use crate::backup::BackupService;
use crate::commit::SessionCommitService;
use crate::error::AppServicesError;
use crate::practice::PracticeService;
use crate::records::RecordsService;
use crate::review::ReviewService;
use crate::runtime_handle::{SharedRuntime, lock_runtime, new_shared_runtime};
use crate::settings::AppSettingsService;
use crate::stats::StatsService;
use crate::templates::TemplateService;
use crate::timer::TimerDriver;

/// Owns the session runtime and assembles the services around it.
///
/// The single application-level context object: constructed once at
/// startup, handed by reference to whatever needs it. On construction it
/// seeds default data into an empty store and restores the persisted
/// runtime snapshot (an interrupted run comes back paused, waiting for an
/// explicit resume).
#[derive(Clone)]
pub struct AppServices {
    runtime: SharedRuntime,
    storage: Storage,
    clock: Clock,
    timer: Arc<TimerDriver>,
    practice: Arc<PracticeService>,
    commit: Arc<SessionCommitService>,
    review: Arc<ReviewService>,
    records: Arc<RecordsService>,
    stats: Arc<StatsService>,
    templates: Arc<TemplateService>,
    settings: Arc<AppSettingsService>,
    backup: Arc<BackupService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or default
    /// seeding fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::with_storage(storage, clock).await
    }

    /// Build services over an in-memory store (tests, previews).
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if default seeding fails.
    pub async fn in_memory(clock: Clock) -> Result<Self, AppServicesError> {
        Self::with_storage(Storage::in_memory(), clock).await
    }

    /// Build services over an existing storage aggregate.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if default seeding or snapshot loading
    /// fails.
    pub async fn with_storage(storage: Storage, clock: Clock) -> Result<Self, AppServicesError> {
        let templates = Arc::new(TemplateService::new(
            Arc::clone(&storage.question_types),
            Arc::clone(&storage.templates),
            clock,
        ));
        templates.bootstrap_defaults().await?;

        let restored = storage
            .snapshots
            .load_snapshot()
            .await?
            .map(SessionRuntime::from_snapshot)
            .unwrap_or_default();
        if restored.is_running() {
            tracing::info!("restored an interrupted run; resuming paused");
        }
        let runtime = new_shared_runtime(restored);

        let timer = TimerDriver::new(Arc::clone(&runtime), Arc::clone(&storage.snapshots));
        let commit = Arc::new(SessionCommitService::new(
            Arc::clone(&runtime),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.stats),
            clock,
        ));
        let practice = Arc::new(PracticeService::new(
            Arc::clone(&runtime),
            Arc::clone(&storage.templates),
            Arc::clone(&storage.question_types),
            Arc::clone(&storage.snapshots),
            Arc::clone(&timer),
            Arc::clone(&commit),
            clock,
        ));
        let review = Arc::new(ReviewService::new(
            Arc::clone(&runtime),
            Arc::clone(&storage.templates),
            Arc::clone(&storage.question_types),
            Arc::clone(&commit),
        ));
        let records = Arc::new(RecordsService::new(
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.templates),
            Arc::clone(&storage.question_types),
        ));
        let stats = Arc::new(StatsService::new(
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.stats),
            clock,
        ));
        let settings = Arc::new(AppSettingsService::new(Arc::clone(&storage.settings)));
        let backup = Arc::new(BackupService::new(Arc::clone(&storage.backup), clock));

        Ok(Self {
            runtime,
            storage,
            clock,
            timer,
            practice,
            commit,
            review,
            records,
            stats,
            templates,
            settings,
            backup,
        })
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn runtime(&self) -> SharedRuntime {
        Arc::clone(&self.runtime)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn timer(&self) -> Arc<TimerDriver> {
        Arc::clone(&self.timer)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeService> {
        Arc::clone(&self.practice)
    }

    #[must_use]
    pub fn commit(&self) -> Arc<SessionCommitService> {
        Arc::clone(&self.commit)
    }

    #[must_use]
    pub fn review(&self) -> Arc<ReviewService> {
        Arc::clone(&self.review)
    }

    #[must_use]
    pub fn records(&self) -> Arc<RecordsService> {
        Arc::clone(&self.records)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn templates(&self) -> Arc<TemplateService> {
        Arc::clone(&self.templates)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<AppSettingsService> {
        Arc::clone(&self.settings)
    }

    #[must_use]
    pub fn backup(&self) -> Arc<BackupService> {
        Arc::clone(&self.backup)
    }

    /// Throw away the in-memory session and its persisted snapshot
    /// (tests, and the restore banner's "start over").
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` when the snapshot cannot be
    /// cleared.
    pub async fn reset_runtime(&self) -> Result<(), AppServicesError> {
        lock_runtime(&self.runtime).reset();
        self.timer.sync();
        self.storage.snapshots.clear_snapshot().await?;
        Ok(())
    }
}
