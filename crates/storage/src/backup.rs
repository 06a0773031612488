use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use pacer_core::model::{
    AppSettings, ColorScheme, DailyStat, Mode, QuestionRecord, QuestionRecordId, QuestionStatus,
    QuestionType, QuestionTypeId, Session, SessionId, SessionItem, SessionItemId,
    SessionItemSnapshot, SessionStatus, Template, TemplateId, TemplateItem, TemplateItemId,
    ThemeMode,
};

use crate::repository::StorageError;

/// The only payload version this build reads and writes.
pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackupFormatError {
    #[error("unsupported backup version: {0}")]
    UnsupportedVersion(u32),

    #[error("malformed backup payload: {0}")]
    Malformed(String),
}

//
// ─── ROW DTOS ──────────────────────────────────────────────────────────────────
//

// Field names follow the export contract (camelCase), not Rust convention;
// payloads must byte-for-byte interoperate with previously exported files.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTypeRow {
    pub id: QuestionTypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRow {
    pub id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub total_questions: u32,
    pub total_planned_time: u32,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateItemRow {
    pub id: TemplateItemId,
    pub template_id: TemplateId,
    pub question_type_id: QuestionTypeId,
    pub question_count: u32,
    /// minutes
    pub planned_time: u32,
    pub order_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub mode: Mode,
    pub template_id: TemplateId,
    pub custom_order: Vec<TemplateItemId>,
    /// Absent in payloads exported before the snapshot field existed.
    #[serde(default)]
    pub item_snapshot: Vec<SessionItemSnapshot>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub total_time_ms: u64,
    pub paused_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItemRow {
    pub id: SessionItemId,
    pub session_id: SessionId,
    pub template_item_id: TemplateItemId,
    pub actual_time_ms: u64,
    /// milliseconds
    pub planned_time: u64,
    pub question_count: u32,
    pub overtime_count: u32,
    pub order_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecordRow {
    pub id: QuestionRecordId,
    pub session_id: SessionId,
    pub session_item_id: SessionItemId,
    pub question_index: u32,
    pub actual_time_ms: u64,
    /// milliseconds
    pub planned_time: u64,
    pub status: QuestionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatRow {
    pub date: NaiveDate,
    pub total_sessions: u32,
    pub total_time_ms: u64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRow {
    pub id: String,
    pub theme_mode: ThemeMode,
    pub color_scheme: ColorScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_total_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_type_ratio: Option<BTreeMap<QuestionTypeId, f64>>,
}

//
// ─── PAYLOAD ───────────────────────────────────────────────────────────────────
//

/// All eight collections of the store. Every key must be present (as an
/// array) for a payload to deserialize, which is exactly the shape check
/// the import flow needs before touching the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupData {
    pub question_types: Vec<QuestionTypeRow>,
    pub templates: Vec<TemplateRow>,
    pub template_items: Vec<TemplateItemRow>,
    pub sessions: Vec<SessionRow>,
    pub session_items: Vec<SessionItemRow>,
    pub question_records: Vec<QuestionRecordRow>,
    pub stats_daily: Vec<DailyStatRow>,
    pub settings: Vec<SettingsRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPayload {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub data: BackupData,
}

impl BackupPayload {
    #[must_use]
    pub fn new(exported_at: DateTime<Utc>, data: BackupData) -> Self {
        Self {
            version: BACKUP_VERSION,
            exported_at,
            data,
        }
    }

    /// Parse and shape-check a payload. Nothing is written anywhere; a
    /// malformed file is rejected here, before any import begins.
    ///
    /// # Errors
    ///
    /// Returns `BackupFormatError::Malformed` if the JSON does not match
    /// the contract (including any missing collection key) and
    /// `BackupFormatError::UnsupportedVersion` for foreign versions.
    pub fn parse(json: &str) -> Result<Self, BackupFormatError> {
        let payload: Self =
            serde_json::from_str(json).map_err(|e| BackupFormatError::Malformed(e.to_string()))?;
        if payload.version != BACKUP_VERSION {
            return Err(BackupFormatError::UnsupportedVersion(payload.version));
        }
        Ok(payload)
    }

    /// Serialize for export.
    ///
    /// # Errors
    ///
    /// Returns `BackupFormatError::Malformed` if serialization fails.
    pub fn to_json(&self) -> Result<String, BackupFormatError> {
        serde_json::to_string_pretty(self).map_err(|e| BackupFormatError::Malformed(e.to_string()))
    }
}

//
// ─── DOMAIN CONVERSIONS ────────────────────────────────────────────────────────
//

/// Validated domain rows produced from a payload before any write happens.
pub struct DomainData {
    pub question_types: Vec<QuestionType>,
    pub templates: Vec<Template>,
    pub template_items: Vec<TemplateItem>,
    pub sessions: Vec<Session>,
    pub session_items: Vec<SessionItem>,
    pub question_records: Vec<QuestionRecord>,
    pub stats_daily: Vec<DailyStat>,
    pub settings: Option<AppSettings>,
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

impl BackupData {
    /// Project domain rows into the wire shape.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_rows(
        question_types: &[QuestionType],
        templates: &[Template],
        template_items: &[TemplateItem],
        sessions: &[Session],
        session_items: &[SessionItem],
        question_records: &[QuestionRecord],
        stats_daily: &[DailyStat],
        settings: Option<&AppSettings>,
    ) -> Self {
        Self {
            question_types: question_types.iter().map(question_type_row).collect(),
            templates: templates.iter().map(template_row).collect(),
            template_items: template_items.iter().map(template_item_row).collect(),
            sessions: sessions.iter().map(session_row).collect(),
            session_items: session_items.iter().map(session_item_row).collect(),
            question_records: question_records.iter().map(question_record_row).collect(),
            stats_daily: stats_daily.iter().map(daily_stat_row).collect(),
            settings: settings.map(settings_row).into_iter().collect(),
        }
    }

    /// Validate every row back into domain types.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for any row that fails domain
    /// validation, so callers can reject the whole payload atomically.
    pub fn to_domain(&self) -> Result<DomainData, StorageError> {
        let question_types = self
            .question_types
            .iter()
            .map(|row| {
                QuestionType::from_persisted(
                    row.id,
                    row.name.clone(),
                    row.short_name.clone(),
                    row.color.clone(),
                    row.created_at,
                    row.updated_at,
                )
                .map_err(ser)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let templates = self
            .templates
            .iter()
            .map(|row| {
                Template::from_persisted(
                    row.id,
                    row.name.clone(),
                    row.description.clone(),
                    row.is_default,
                    row.total_questions,
                    row.total_planned_time,
                    row.created_at,
                    row.updated_at,
                )
                .map_err(ser)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let template_items = self
            .template_items
            .iter()
            .map(|row| {
                TemplateItem::new(
                    row.id,
                    row.template_id,
                    row.question_type_id,
                    row.question_count,
                    row.planned_time,
                    row.order_index,
                )
            })
            .collect();

        let sessions = self
            .sessions
            .iter()
            .map(|row| {
                Session::from_persisted(
                    row.id,
                    row.name.clone(),
                    row.mode,
                    row.template_id,
                    row.custom_order.clone(),
                    row.item_snapshot.clone(),
                    row.status,
                    row.started_at,
                    row.ended_at,
                    row.total_time_ms,
                    row.paused_count,
                )
                .map_err(ser)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let session_items = self
            .session_items
            .iter()
            .map(|row| {
                SessionItem::new(
                    row.id,
                    row.session_id,
                    row.template_item_id,
                    row.actual_time_ms,
                    row.planned_time,
                    row.question_count,
                    row.overtime_count,
                    row.order_index,
                )
            })
            .collect();

        let question_records = self
            .question_records
            .iter()
            .map(|row| {
                QuestionRecord::new(
                    row.id,
                    row.session_id,
                    row.session_item_id,
                    row.question_index,
                    row.actual_time_ms,
                    row.planned_time,
                    row.status,
                )
                .map_err(ser)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let stats_daily = self
            .stats_daily
            .iter()
            .map(|row| {
                DailyStat::new(
                    row.date,
                    row.total_sessions,
                    row.total_time_ms,
                    row.completion_rate,
                )
            })
            .collect();

        let settings = self
            .settings
            .iter()
            .find(|row| row.id == "app")
            .map(|row| {
                AppSettings::from_persisted(
                    row.theme_mode,
                    row.color_scheme,
                    row.exam_total_time,
                    row.exam_type_ratio.clone(),
                )
                .map_err(ser)
            })
            .transpose()?;

        Ok(DomainData {
            question_types,
            templates,
            template_items,
            sessions,
            session_items,
            question_records,
            stats_daily,
            settings,
        })
    }
}

fn question_type_row(qt: &QuestionType) -> QuestionTypeRow {
    QuestionTypeRow {
        id: qt.id(),
        name: qt.name().to_owned(),
        short_name: qt.short_name().map(str::to_owned),
        color: qt.color().map(str::to_owned),
        created_at: qt.created_at(),
        updated_at: qt.updated_at(),
    }
}

fn template_row(template: &Template) -> TemplateRow {
    TemplateRow {
        id: template.id(),
        name: template.name().to_owned(),
        description: template.description().map(str::to_owned),
        total_questions: template.total_questions(),
        total_planned_time: template.total_planned_minutes(),
        is_default: template.is_default(),
        created_at: template.created_at(),
        updated_at: template.updated_at(),
    }
}

fn template_item_row(item: &TemplateItem) -> TemplateItemRow {
    TemplateItemRow {
        id: item.id(),
        template_id: item.template_id(),
        question_type_id: item.question_type_id(),
        question_count: item.question_count(),
        planned_time: item.planned_minutes(),
        order_index: item.order_index(),
    }
}

fn session_row(session: &Session) -> SessionRow {
    SessionRow {
        id: session.id(),
        name: session.name().map(str::to_owned),
        mode: session.mode(),
        template_id: session.template_id(),
        custom_order: session.custom_order().to_vec(),
        item_snapshot: session.item_snapshot().to_vec(),
        status: session.status(),
        started_at: session.started_at(),
        ended_at: session.ended_at(),
        total_time_ms: session.total_time_ms(),
        paused_count: session.paused_count(),
    }
}

fn session_item_row(item: &SessionItem) -> SessionItemRow {
    SessionItemRow {
        id: item.id,
        session_id: item.session_id,
        template_item_id: item.template_item_id,
        actual_time_ms: item.actual_time_ms,
        planned_time: item.planned_ms,
        question_count: item.question_count,
        overtime_count: item.overtime_count,
        order_index: item.order_index,
    }
}

fn question_record_row(record: &QuestionRecord) -> QuestionRecordRow {
    QuestionRecordRow {
        id: record.id,
        session_id: record.session_id,
        session_item_id: record.session_item_id,
        question_index: record.question_index,
        actual_time_ms: record.actual_time_ms,
        planned_time: record.planned_ms,
        status: record.status,
    }
}

fn daily_stat_row(stat: &DailyStat) -> DailyStatRow {
    DailyStatRow {
        date: stat.date(),
        total_sessions: stat.total_sessions(),
        total_time_ms: stat.total_time_ms(),
        completion_rate: stat.completion_rate(),
    }
}

fn settings_row(settings: &AppSettings) -> SettingsRow {
    SettingsRow {
        id: "app".to_owned(),
        theme_mode: settings.theme_mode(),
        color_scheme: settings.color_scheme(),
        exam_total_time: settings.exam_total_minutes(),
        exam_type_ratio: settings.exam_type_ratio().cloned(),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_core::time::fixed_now;

    fn empty_data() -> BackupData {
        BackupData {
            question_types: Vec::new(),
            templates: Vec::new(),
            template_items: Vec::new(),
            sessions: Vec::new(),
            session_items: Vec::new(),
            question_records: Vec::new(),
            stats_daily: Vec::new(),
            settings: Vec::new(),
        }
    }

    #[test]
    fn payload_roundtrips_through_json() {
        let mut data = empty_data();
        data.question_types.push(QuestionTypeRow {
            id: QuestionTypeId::random(),
            name: "Logic".into(),
            short_name: Some("Lgc".into()),
            color: None,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        });
        let payload = BackupPayload::new(fixed_now(), data);

        let json = payload.to_json().unwrap();
        let parsed = BackupPayload::parse(&json).unwrap();
        assert_eq!(parsed.version, BACKUP_VERSION);
        assert_eq!(parsed.data.question_types.len(), 1);
        assert_eq!(parsed.data.question_types[0].name, "Logic");
    }

    #[test]
    fn payload_uses_camel_case_field_names() {
        let payload = BackupPayload::new(fixed_now(), empty_data());
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"exportedAt\""));
        assert!(json.contains("\"question_types\""));
        assert!(json.contains("\"stats_daily\""));
    }

    #[test]
    fn missing_collection_key_is_rejected() {
        let payload = BackupPayload::new(fixed_now(), empty_data());
        let json = payload.to_json().unwrap();
        let without_stats = json.replace("\"stats_daily\": [],", "");
        assert!(without_stats.len() < json.len());

        let err = BackupPayload::parse(&without_stats).unwrap_err();
        assert!(matches!(err, BackupFormatError::Malformed(_)));
    }

    #[test]
    fn foreign_version_is_rejected() {
        let payload = BackupPayload::new(fixed_now(), empty_data());
        let json = payload.to_json().unwrap().replace(
            &format!("\"version\": {BACKUP_VERSION}"),
            "\"version\": 2",
        );

        let err = BackupPayload::parse(&json).unwrap_err();
        assert!(matches!(err, BackupFormatError::UnsupportedVersion(2)));
    }

    #[test]
    fn session_row_without_snapshot_field_still_parses() {
        let session_json = format!(
            r#"{{
                "id": "{}",
                "mode": "practice",
                "templateId": "{}",
                "customOrder": [],
                "status": "ended",
                "startedAt": "2023-11-14T22:13:20Z",
                "endedAt": "2023-11-14T23:13:20Z",
                "totalTimeMs": 3600000,
                "pausedCount": 0
            }}"#,
            SessionId::random(),
            TemplateId::random(),
        );
        let row: SessionRow = serde_json::from_str(&session_json).unwrap();
        assert!(row.item_snapshot.is_empty());
        assert!(row.name.is_none());
    }

    #[test]
    fn invalid_rows_fail_domain_conversion() {
        let mut data = empty_data();
        data.question_records.push(QuestionRecordRow {
            id: QuestionRecordId::random(),
            session_id: SessionId::random(),
            session_item_id: SessionItemId::random(),
            question_index: 0, // must be 1-based
            actual_time_ms: 0,
            planned_time: 0,
            status: QuestionStatus::Unanswered,
        });
        assert!(data.to_domain().is_err());
    }
}
