use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::QuestionTypeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionTypeError {
    #[error("question type name cannot be empty")]
    EmptyName,
}

/// A category of exam question (e.g. logic, reading comprehension).
///
/// Template items reference question types; the type carries display
/// metadata only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionType {
    id: QuestionTypeId,
    name: String,
    short_name: Option<String>,
    color: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuestionType {
    /// Creates a new question type.
    ///
    /// # Errors
    ///
    /// Returns `QuestionTypeError::EmptyName` if the name is empty or
    /// whitespace-only.
    pub fn new(
        id: QuestionTypeId,
        name: impl Into<String>,
        short_name: Option<String>,
        color: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuestionTypeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(QuestionTypeError::EmptyName);
        }

        Ok(Self {
            id,
            name: name.trim().to_owned(),
            short_name: normalize_optional(short_name),
            color: normalize_optional(color),
            created_at,
            updated_at: created_at,
        })
    }

    /// Rehydrate a question type from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `QuestionTypeError::EmptyName` if the stored name is empty.
    pub fn from_persisted(
        id: QuestionTypeId,
        name: String,
        short_name: Option<String>,
        color: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, QuestionTypeError> {
        if name.trim().is_empty() {
            return Err(QuestionTypeError::EmptyName);
        }
        Ok(Self {
            id,
            name,
            short_name,
            color,
            created_at,
            updated_at,
        })
    }

    /// Replace the display fields, stamping `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionTypeError::EmptyName` if the new name is empty.
    pub fn update(
        &mut self,
        name: impl Into<String>,
        short_name: Option<String>,
        color: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), QuestionTypeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(QuestionTypeError::EmptyName);
        }
        self.name = name.trim().to_owned();
        self.short_name = normalize_optional(short_name);
        self.color = normalize_optional(color);
        self.updated_at = now;
        Ok(())
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> QuestionTypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
