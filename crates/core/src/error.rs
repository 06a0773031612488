use thiserror::Error;

use crate::model::{AppSettingsError, QuestionTypeError, SessionRowError, TemplateError};
use crate::runtime::SessionStateError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    QuestionType(#[from] QuestionTypeError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    SessionRow(#[from] SessionRowError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error(transparent)]
    AppSettings(#[from] AppSettingsError),
}
