use pacer_core::model::{QuestionTypeId, Template, TemplateId, TemplateItem, TemplateItemId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser, u32_from_i64, uuid_from_str};
use crate::repository::{StorageError, TemplateRepository};

pub(super) fn map_template_row(row: &sqlx::sqlite::SqliteRow) -> Result<Template, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    Template::from_persisted(
        TemplateId::new(uuid_from_str("id", &id)?),
        row.try_get("name").map_err(ser)?,
        row.try_get("description").map_err(ser)?,
        row.try_get("is_default").map_err(ser)?,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        u32_from_i64(
            "total_planned_minutes",
            row.try_get::<i64, _>("total_planned_minutes").map_err(ser)?,
        )?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(super) fn map_template_item_row(row: &sqlx::sqlite::SqliteRow) -> Result<TemplateItem, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let template_id: String = row.try_get("template_id").map_err(ser)?;
    let question_type_id: String = row.try_get("question_type_id").map_err(ser)?;
    Ok(TemplateItem::new(
        TemplateItemId::new(uuid_from_str("id", &id)?),
        TemplateId::new(uuid_from_str("template_id", &template_id)?),
        QuestionTypeId::new(uuid_from_str("question_type_id", &question_type_id)?),
        u32_from_i64(
            "question_count",
            row.try_get::<i64, _>("question_count").map_err(ser)?,
        )?,
        u32_from_i64(
            "planned_minutes",
            row.try_get::<i64, _>("planned_minutes").map_err(ser)?,
        )?,
        u32_from_i64(
            "order_index",
            row.try_get::<i64, _>("order_index").map_err(ser)?,
        )?,
    ))
}

#[async_trait::async_trait]
impl TemplateRepository for SqliteRepository {
    async fn list_templates(&self) -> Result<Vec<Template>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, name, description, is_default, total_questions,
                       total_planned_minutes, created_at, updated_at
                FROM templates
                ORDER BY created_at ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_template_row).collect()
    }

    async fn get_template(&self, id: TemplateId) -> Result<Option<Template>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, name, description, is_default, total_questions,
                       total_planned_minutes, created_at, updated_at
                FROM templates
                WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_template_row).transpose()
    }

    async fn get_template_items(
        &self,
        template_id: TemplateId,
    ) -> Result<Vec<TemplateItem>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, template_id, question_type_id, question_count,
                       planned_minutes, order_index
                FROM template_items
                WHERE template_id = ?1
                ORDER BY order_index ASC
            ",
        )
        .bind(template_id.value().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_template_item_row).collect()
    }

    async fn upsert_template(
        &self,
        template: &Template,
        items: &[TemplateItem],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO templates (
                    id, name, description, is_default, total_questions,
                    total_planned_minutes, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    description = excluded.description,
                    is_default = excluded.is_default,
                    total_questions = excluded.total_questions,
                    total_planned_minutes = excluded.total_planned_minutes,
                    updated_at = excluded.updated_at
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

        // replace the item set wholesale so no orphans survive a shrink
        sqlx::query("DELETE FROM template_items WHERE template_id = ?1")
            .bind(template.id().value().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for item in items {
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

        tx.commit().await.map_err(conn)
    }

    async fn delete_template(&self, id: TemplateId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM templates WHERE id = ?1")
            .bind(id.value().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM template_items WHERE template_id = ?1")
            .bind(id.value().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)
    }
}
