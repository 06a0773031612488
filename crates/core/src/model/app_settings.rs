use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::ids::QuestionTypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Azure,
    Citrus,
    Slate,
    Rose,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppSettingsError {
    #[error("exam total time must be positive")]
    InvalidExamTotalTime,

    #[error("exam type ratio values must be finite and non-negative")]
    InvalidTypeRatio,
}

/// Application-wide settings, persisted as the singleton `"app"` row.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    theme_mode: ThemeMode,
    color_scheme: ColorScheme,
    exam_total_minutes: Option<u32>,
    exam_type_ratio: Option<BTreeMap<QuestionTypeId, f64>>,
}

#[derive(Debug, Clone, Default)]
pub struct AppSettingsDraft {
    pub theme_mode: ThemeMode,
    pub color_scheme: ColorScheme,
    pub exam_total_minutes: Option<u32>,
    pub exam_type_ratio: Option<BTreeMap<QuestionTypeId, f64>>,
}

impl AppSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft into persisted settings.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsError` if the exam total time is zero or a ratio
    /// value is negative/non-finite.
    pub fn validate(self) -> Result<AppSettings, AppSettingsError> {
        if let Some(total) = self.exam_total_minutes {
            if total == 0 {
                return Err(AppSettingsError::InvalidExamTotalTime);
            }
        }
        if let Some(ratio) = self.exam_type_ratio.as_ref() {
            if ratio.values().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(AppSettingsError::InvalidTypeRatio);
            }
        }

        Ok(AppSettings {
            theme_mode: self.theme_mode,
            color_scheme: self.color_scheme,
            exam_total_minutes: self.exam_total_minutes,
            exam_type_ratio: self.exam_type_ratio.filter(|r| !r.is_empty()),
        })
    }
}

impl AppSettings {
    /// Rehydrate settings from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsError` if stored values fail validation.
    pub fn from_persisted(
        theme_mode: ThemeMode,
        color_scheme: ColorScheme,
        exam_total_minutes: Option<u32>,
        exam_type_ratio: Option<BTreeMap<QuestionTypeId, f64>>,
    ) -> Result<Self, AppSettingsError> {
        AppSettingsDraft {
            theme_mode,
            color_scheme,
            exam_total_minutes,
            exam_type_ratio,
        }
        .validate()
    }

    #[must_use]
    pub fn theme_mode(&self) -> ThemeMode {
        self.theme_mode
    }

    #[must_use]
    pub fn color_scheme(&self) -> ColorScheme {
        self.color_scheme
    }

    #[must_use]
    pub fn exam_total_minutes(&self) -> Option<u32> {
        self.exam_total_minutes
    }

    #[must_use]
    pub fn exam_type_ratio(&self) -> Option<&BTreeMap<QuestionTypeId, f64>> {
        self.exam_type_ratio.as_ref()
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme_mode: ThemeMode::System,
            color_scheme: ColorScheme::Azure,
            exam_total_minutes: None,
            exam_type_ratio: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_rejects_zero_total_time() {
        let draft = AppSettingsDraft {
            exam_total_minutes: Some(0),
            ..AppSettingsDraft::new()
        };
        assert!(matches!(
            draft.validate(),
            Err(AppSettingsError::InvalidExamTotalTime)
        ));
    }

    #[test]
    fn draft_rejects_negative_ratio() {
        let mut ratio = BTreeMap::new();
        ratio.insert(QuestionTypeId::random(), -0.2);
        let draft = AppSettingsDraft {
            exam_type_ratio: Some(ratio),
            ..AppSettingsDraft::new()
        };
        assert!(matches!(
            draft.validate(),
            Err(AppSettingsError::InvalidTypeRatio)
        ));
    }

    #[test]
    fn draft_drops_empty_ratio_map() {
        let draft = AppSettingsDraft {
            exam_type_ratio: Some(BTreeMap::new()),
            ..AppSettingsDraft::new()
        };
        let settings = draft.validate().unwrap();
        assert_eq!(settings.exam_type_ratio(), None);
    }

    #[test]
    fn defaults_are_system_azure() {
        let settings = AppSettings::default();
        assert_eq!(settings.theme_mode(), ThemeMode::System);
        assert_eq!(settings.color_scheme(), ColorScheme::Azure);
    }
}
