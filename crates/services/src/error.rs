//! Shared error types for the services crate.

use thiserror::Error;

use pacer_core::model::{AppSettingsError, QuestionTypeError, SessionRowError, TemplateError};
use pacer_core::runtime::SessionStateError;
use storage::backup::BackupFormatError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `PracticeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("no template available to practice with")]
    NoTemplate,

    #[error("pause is only available in practice mode")]
    PauseUnavailable,

    #[error(transparent)]
    State(#[from] SessionStateError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SessionCommitService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CommitError {
    #[error("no template selected")]
    NoTemplate,

    #[error("the run has no questions to save")]
    EmptyRun,

    #[error(transparent)]
    SessionRow(#[from] SessionRowError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewError {
    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    State(#[from] SessionStateError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RecordsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordsError {
    #[error(transparent)]
    SessionRow(#[from] SessionRowError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StatsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TemplateService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TemplateServiceError {
    #[error("template not found")]
    TemplateNotFound,

    #[error("question type not found")]
    QuestionTypeNotFound,

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    QuestionType(#[from] QuestionTypeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AppSettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error(transparent)]
    Settings(#[from] AppSettingsError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `BackupService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackupError {
    #[error(transparent)]
    Format(#[from] BackupFormatError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Template(#[from] TemplateServiceError),
}
