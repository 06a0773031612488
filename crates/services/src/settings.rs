use std::sync::Arc;

use pacer_core::model::{AppSettings, AppSettingsDraft};
use storage::repository::SettingsRepository;

use crate::error::SettingsServiceError;

/// Reads and writes the singleton application settings row.
pub struct AppSettingsService {
    settings: Arc<dyn SettingsRepository>,
}

impl AppSettingsService {
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    /// Stored settings, or defaults when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError::Storage` when the row cannot be read.
    pub async fn get(&self) -> Result<AppSettings, SettingsServiceError> {
        Ok(self.settings.get_settings().await?.unwrap_or_default())
    }

    /// Validate and persist a settings draft, returning the stored value.
    ///
    /// # Errors
    ///
    /// Returns validation errors before anything is written, and
    /// `SettingsServiceError::Storage` when the write fails.
    pub async fn update(&self, draft: AppSettingsDraft) -> Result<AppSettings, SettingsServiceError> {
        let settings = draft.validate()?;
        self.settings.put_settings(&settings).await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_core::model::ThemeMode;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn get_falls_back_to_defaults() {
        let service = AppSettingsService::new(Arc::new(InMemoryRepository::new()));
        let settings = service.get().await.unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[tokio::test]
    async fn update_persists_validated_draft() {
        let service = AppSettingsService::new(Arc::new(InMemoryRepository::new()));
        let draft = AppSettingsDraft {
            theme_mode: ThemeMode::Dark,
            exam_total_minutes: Some(120),
            ..AppSettingsDraft::new()
        };
        service.update(draft).await.unwrap();

        let stored = service.get().await.unwrap();
        assert_eq!(stored.theme_mode(), ThemeMode::Dark);
        assert_eq!(stored.exam_total_minutes(), Some(120));
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_without_write() {
        let service = AppSettingsService::new(Arc::new(InMemoryRepository::new()));
        let draft = AppSettingsDraft {
            exam_total_minutes: Some(0),
            ..AppSettingsDraft::new()
        };
        assert!(service.update(draft).await.is_err());
        assert_eq!(service.get().await.unwrap(), AppSettings::default());
    }
}
