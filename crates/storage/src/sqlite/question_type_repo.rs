use pacer_core::model::{QuestionType, QuestionTypeId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser, uuid_from_str};
use crate::repository::{QuestionTypeRepository, StorageError};

pub(super) fn map_question_type_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionType, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    QuestionType::from_persisted(
        QuestionTypeId::new(uuid_from_str("id", &id)?),
        row.try_get("name").map_err(ser)?,
        row.try_get("short_name").map_err(ser)?,
        row.try_get("color").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl QuestionTypeRepository for SqliteRepository {
    async fn list_question_types(&self) -> Result<Vec<QuestionType>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, name, short_name, color, created_at, updated_at
                FROM question_types
                ORDER BY created_at ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_type_row).collect()
    }

    async fn get_question_type(
        &self,
        id: QuestionTypeId,
    ) -> Result<Option<QuestionType>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, name, short_name, color, created_at, updated_at
                FROM question_types
                WHERE id = ?1
            ",
        )
        .bind(id.value().to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_question_type_row).transpose()
    }

    async fn upsert_question_type(
        &self,
        question_type: &QuestionType,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO question_types (id, name, short_name, color, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    short_name = excluded.short_name,
                    color = excluded.color,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(question_type.id().value().to_string())
        .bind(question_type.name())
        .bind(question_type.short_name())
        .bind(question_type.color())
        .bind(question_type.created_at())
        .bind(question_type.updated_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn delete_question_type(&self, id: QuestionTypeId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM question_types WHERE id = ?1")
            .bind(id.value().to_string())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
