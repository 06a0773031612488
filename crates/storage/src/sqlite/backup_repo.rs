use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, ser};
use super::settings_repo::{color_scheme_to_str, theme_mode_to_str};
use super::question_type_repo::map_question_type_row;
use super::session_repo::{
    insert_items, insert_records, insert_session, map_question_record_row, map_session_item_row,
};
use super::template_repo::{map_template_item_row, map_template_row};
use crate::backup::BackupData;
use crate::repository::{BackupRepository, StorageError};

const ALL_TABLES: [&str; 8] = [
    "question_types",
    "templates",
    "template_items",
    "sessions",
    "session_items",
    "question_records",
    "stats_daily",
    "settings",
];

#[async_trait::async_trait]
impl BackupRepository for SqliteRepository {
    async fn export_all(&self) -> Result<BackupData, StorageError> {
        use crate::repository::{
            QuestionTypeRepository, SessionRepository, SettingsRepository, StatsRepository,
            TemplateRepository,
        };

        let question_types = self.list_question_types().await?;
        let templates = self.list_templates().await?;
        let sessions = self.list_sessions().await?;
        let stats = self.list_daily_stats().await?;
        let settings = self.get_settings().await?;

        let item_rows = sqlx::query(
            r"
                SELECT id, template_id, question_type_id, question_count,
                       planned_minutes, order_index
                FROM template_items
                ORDER BY template_id ASC, order_index ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        let template_items = item_rows
            .iter()
            .map(map_template_item_row)
            .collect::<Result<Vec<_>, _>>()?;

        let session_item_rows = sqlx::query(
            r"
                SELECT id, session_id, template_item_id, actual_time_ms,
                       planned_ms, question_count, overtime_count, order_index
                FROM session_items
                ORDER BY session_id ASC, order_index ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        let session_items = session_item_rows
            .iter()
            .map(map_session_item_row)
            .collect::<Result<Vec<_>, _>>()?;

        let record_rows = sqlx::query(
            r"
                SELECT id, session_id, session_item_id, question_index,
                       actual_time_ms, planned_ms, status
                FROM question_records
                ORDER BY session_id ASC, question_index ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        let question_records = record_rows
            .iter()
            .map(map_question_record_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            sessions = sessions.len(),
            records = question_records.len(),
            "exported backup data"
        );

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
        // validate the whole payload into domain rows before clearing anything
        let converted = data.to_domain()?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        for table in ALL_TABLES {
            let sql = format!("DELETE FROM {table}");
            sqlx::query(&sql).execute(&mut *tx).await.map_err(conn)?;
        }

        for qt in &converted.question_types {
            sqlx::query(
                r"
                    INSERT INTO question_types (id, name, short_name, color, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(qt.id().value().to_string())
            .bind(qt.name())
            .bind(qt.short_name())
            .bind(qt.color())
            .bind(qt.created_at())
            .bind(qt.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        for template in &converted.templates {
            sqlx::query(
                r"
                    INSERT INTO templates (
                        id, name, description, is_default, total_questions,
                        total_planned_minutes, created_at, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
            )
            .bind(template.id().value().to_string())
            .bind(template.name())
            .bind(template.description())
            .bind(template.is_default())
            .bind(i64::from(template.total_questions()))
            .bind(i64::from(template.total_planned_minutes()))
            .bind(template.created_at())
            .bind(template.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        for item in &converted.template_items {
            sqlx::query(
                r"
                    INSERT INTO template_items (
                        id, template_id, question_type_id, question_count,
                        planned_minutes, order_index
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )
            .bind(item.id().value().to_string())
            .bind(item.template_id().value().to_string())
            .bind(item.question_type_id().value().to_string())
            .bind(i64::from(item.question_count()))
            .bind(i64::from(item.planned_minutes()))
            .bind(i64::from(item.order_index()))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        for session in &converted.sessions {
            insert_session(&mut tx, session).await?;
        }
        insert_items(&mut tx, &converted.session_items).await?;
        insert_records(&mut tx, &converted.question_records).await?;

        for stat in &converted.stats_daily {
            sqlx::query(
                r"
                    INSERT INTO stats_daily (date, total_sessions, total_time_ms, completion_rate)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(stat.date())
            .bind(i64::from(stat.total_sessions()))
            .bind(i64_from_u64("total_time_ms", stat.total_time_ms())?)
            .bind(stat.completion_rate())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        if let Some(settings) = &converted.settings {
            let ratio = settings
                .exam_type_ratio()
                .map(serde_json::to_string)
                .transpose()
                .map_err(ser)?;
            sqlx::query(
                r"
                    INSERT INTO settings (id, theme_mode, color_scheme, exam_total_minutes, exam_type_ratio)
                    VALUES ('app', ?1, ?2, ?3, ?4)
                ",
            )
            .bind(theme_mode_to_str(settings.theme_mode()))
            .bind(color_scheme_to_str(settings.color_scheme()))
            .bind(settings.exam_total_minutes().map(i64::from))
            .bind(ratio)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        tracing::info!(sessions = converted.sessions.len(), "imported backup data");
        Ok(())
    }
}
