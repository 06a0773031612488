use std::collections::BTreeMap;

use pacer_core::model::{AppSettings, ColorScheme, QuestionTypeId, ThemeMode};
use pacer_core::runtime::RuntimeSnapshot;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser, u32_from_i64};
use crate::repository::{SettingsRepository, SnapshotRepository, StorageError};

pub(super) fn theme_mode_to_str(mode: ThemeMode) -> &'static str {
    match mode {
        ThemeMode::Light => "light",
        ThemeMode::Dark => "dark",
        ThemeMode::System => "system",
    }
}

pub(super) fn theme_mode_from_str(raw: &str) -> Result<ThemeMode, StorageError> {
    match raw {
        "light" => Ok(ThemeMode::Light),
        "dark" => Ok(ThemeMode::Dark),
        "system" => Ok(ThemeMode::System),
        other => Err(StorageError::Serialization(format!(
            "invalid theme_mode: {other}"
        ))),
    }
}

pub(super) fn color_scheme_to_str(scheme: ColorScheme) -> &'static str {
    match scheme {
        ColorScheme::Azure => "azure",
        ColorScheme::Citrus => "citrus",
        ColorScheme::Slate => "slate",
        ColorScheme::Rose => "rose",
    }
}

pub(super) fn color_scheme_from_str(raw: &str) -> Result<ColorScheme, StorageError> {
    match raw {
        "azure" => Ok(ColorScheme::Azure),
        "citrus" => Ok(ColorScheme::Citrus),
        "slate" => Ok(ColorScheme::Slate),
        "rose" => Ok(ColorScheme::Rose),
        other => Err(StorageError::Serialization(format!(
            "invalid color_scheme: {other}"
        ))),
    }
}

#[async_trait::async_trait]
impl SettingsRepository for SqliteRepository {
    async fn get_settings(&self) -> Result<Option<AppSettings>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT theme_mode, color_scheme, exam_total_minutes, exam_type_ratio
                FROM settings
                WHERE id = 'app'
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let theme_mode: String = row.try_get("theme_mode").map_err(ser)?;
        let color_scheme: String = row.try_get("color_scheme").map_err(ser)?;
        let exam_total_minutes: Option<i64> = row.try_get("exam_total_minutes").map_err(ser)?;
        let exam_type_ratio: Option<String> = row.try_get("exam_type_ratio").map_err(ser)?;

        let exam_total_minutes = exam_total_minutes
            .map(|v| u32_from_i64("exam_total_minutes", v))
            .transpose()?;
        let exam_type_ratio: Option<BTreeMap<QuestionTypeId, f64>> = exam_type_ratio
            .map(|raw| serde_json::from_str(&raw).map_err(ser))
            .transpose()?;

        AppSettings::from_persisted(
            theme_mode_from_str(&theme_mode)?,
            color_scheme_from_str(&color_scheme)?,
            exam_total_minutes,
            exam_type_ratio,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn put_settings(&self, settings: &AppSettings) -> Result<(), StorageError> {
        let ratio = settings
            .exam_type_ratio()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO settings (id, theme_mode, color_scheme, exam_total_minutes, exam_type_ratio)
                VALUES ('app', ?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    theme_mode = excluded.theme_mode,
                    color_scheme = excluded.color_scheme,
                    exam_total_minutes = excluded.exam_total_minutes,
                    exam_type_ratio = excluded.exam_type_ratio
            ",
        )
        .bind(theme_mode_to_str(settings.theme_mode()))
        .bind(color_scheme_to_str(settings.color_scheme()))
        .bind(settings.exam_total_minutes().map(i64::from))
        .bind(ratio)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SnapshotRepository for SqliteRepository {
    async fn load_snapshot(&self) -> Result<Option<RuntimeSnapshot>, StorageError> {
        let row = sqlx::query("SELECT payload FROM runtime_snapshot WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload").map_err(ser)?;
        serde_json::from_str(&payload).map(Some).map_err(ser)
    }

    async fn save_snapshot(&self, snapshot: &RuntimeSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string(snapshot).map_err(ser)?;
        sqlx::query(
            r"
                INSERT INTO runtime_snapshot (id, payload)
                VALUES (1, ?1)
                ON CONFLICT(id) DO UPDATE SET payload = excluded.payload
            ",
        )
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear_snapshot(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM runtime_snapshot WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
