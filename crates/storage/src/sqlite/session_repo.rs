use pacer_core::model::{
    Mode, QuestionRecord, QuestionRecordId, QuestionStatus, Session, SessionId, SessionItem,
    SessionItemId, SessionItemSnapshot, SessionStatus, TemplateId, TemplateItemId,
};
use sqlx::{Row, Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, ser, u32_from_i64, u64_from_i64, uuid_from_str};
use crate::repository::{SessionRepository, StorageError};

const SESSION_COLUMNS: &str = r"
    id, name, mode, template_id, custom_order, item_snapshot, status,
    started_at, ended_at, total_time_ms, paused_count
";

pub(super) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let mode: String = row.try_get("mode").map_err(ser)?;
    let template_id: String = row.try_get("template_id").map_err(ser)?;
    let custom_order: String = row.try_get("custom_order").map_err(ser)?;
    let item_snapshot: String = row.try_get("item_snapshot").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;

    let custom_order: Vec<TemplateItemId> = serde_json::from_str(&custom_order).map_err(ser)?;
    let item_snapshot: Vec<SessionItemSnapshot> =
        serde_json::from_str(&item_snapshot).map_err(ser)?;

    Session::from_persisted(
        SessionId::new(uuid_from_str("id", &id)?),
        row.try_get("name").map_err(ser)?,
        Mode::parse(&mode).map_err(ser)?,
        TemplateId::new(uuid_from_str("template_id", &template_id)?),
        custom_order,
        item_snapshot,
        SessionStatus::parse(&status).map_err(ser)?,
        row.try_get("started_at").map_err(ser)?,
        row.try_get("ended_at").map_err(ser)?,
        u64_from_i64(
            "total_time_ms",
            row.try_get::<i64, _>("total_time_ms").map_err(ser)?,
        )?,
        u32_from_i64(
            "paused_count",
            row.try_get::<i64, _>("paused_count").map_err(ser)?,
        )?,
    )
    .map_err(ser)
}

pub(super) fn map_session_item_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionItem, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let session_id: String = row.try_get("session_id").map_err(ser)?;
    let template_item_id: String = row.try_get("template_item_id").map_err(ser)?;
    Ok(SessionItem::new(
        SessionItemId::new(uuid_from_str("id", &id)?),
        SessionId::new(uuid_from_str("session_id", &session_id)?),
        TemplateItemId::new(uuid_from_str("template_item_id", &template_item_id)?),
        u64_from_i64(
            "actual_time_ms",
            row.try_get::<i64, _>("actual_time_ms").map_err(ser)?,
        )?,
        u64_from_i64("planned_ms", row.try_get::<i64, _>("planned_ms").map_err(ser)?)?,
        u32_from_i64(
            "question_count",
            row.try_get::<i64, _>("question_count").map_err(ser)?,
        )?,
        u32_from_i64(
            "overtime_count",
            row.try_get::<i64, _>("overtime_count").map_err(ser)?,
        )?,
        u32_from_i64(
            "order_index",
            row.try_get::<i64, _>("order_index").map_err(ser)?,
        )?,
    ))
}

pub(super) fn map_question_record_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionRecord, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let session_id: String = row.try_get("session_id").map_err(ser)?;
    let session_item_id: String = row.try_get("session_item_id").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;
    QuestionRecord::new(
        QuestionRecordId::new(uuid_from_str("id", &id)?),
        SessionId::new(uuid_from_str("session_id", &session_id)?),
        SessionItemId::new(uuid_from_str("session_item_id", &session_item_id)?),
        u32_from_i64(
            "question_index",
            row.try_get::<i64, _>("question_index").map_err(ser)?,
        )?,
        u64_from_i64(
            "actual_time_ms",
            row.try_get::<i64, _>("actual_time_ms").map_err(ser)?,
        )?,
        u64_from_i64("planned_ms", row.try_get::<i64, _>("planned_ms").map_err(ser)?)?,
        QuestionStatus::parse(&status).map_err(ser)?,
    )
    .map_err(ser)
}

pub(super) async fn insert_session(
    tx: &mut Transaction<'_, Sqlite>,
    session: &Session,
) -> Result<(), StorageError> {
    let custom_order = serde_json::to_string(session.custom_order()).map_err(ser)?;
    let item_snapshot = serde_json::to_string(session.item_snapshot()).map_err(ser)?;

    sqlx::query(
        r"
            INSERT INTO sessions (
                id, name, mode, template_id, custom_order, item_snapshot,
                status, started_at, ended_at, total_time_ms, paused_count
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                mode = excluded.mode,
                template_id = excluded.template_id,
                custom_order = excluded.custom_order,
                item_snapshot = excluded.item_snapshot,
                status = excluded.status,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at,
                total_time_ms = excluded.total_time_ms,
                paused_count = excluded.paused_count
        ",
    )
    .bind(session.id().value().to_string())
    .bind(session.name())
    .bind(session.mode().as_str())
    .bind(session.template_id().value().to_string())
    .bind(custom_order)
    .bind(item_snapshot)
    .bind(session.status().as_str())
    .bind(session.started_at())
    .bind(session.ended_at())
    .bind(i64_from_u64("total_time_ms", session.total_time_ms())?)
    .bind(i64::from(session.paused_count()))
    .execute(&mut **tx)
    .await
    .map_err(conn)?;
    Ok(())
}

pub(super) async fn insert_items(
    tx: &mut Transaction<'_, Sqlite>,
    items: &[SessionItem],
) -> Result<(), StorageError> {
    for item in items {
        sqlx::query(
            r"
                INSERT INTO session_items (
                    id, session_id, template_item_id, actual_time_ms,
                    planned_ms, question_count, overtime_count, order_index
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(id) DO UPDATE SET
                    actual_time_ms = excluded.actual_time_ms,
                    planned_ms = excluded.planned_ms,
                    question_count = excluded.question_count,
                    overtime_count = excluded.overtime_count,
                    order_index = excluded.order_index
            ",
        )
        .bind(item.id.value().to_string())
        .bind(item.session_id.value().to_string())
        .bind(item.template_item_id.value().to_string())
        .bind(i64_from_u64("actual_time_ms", item.actual_time_ms)?)
        .bind(i64_from_u64("planned_ms", item.planned_ms)?)
        .bind(i64::from(item.question_count))
        .bind(i64::from(item.overtime_count))
        .bind(i64::from(item.order_index))
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    }
    Ok(())
}

pub(super) async fn insert_records(
    tx: &mut Transaction<'_, Sqlite>,
    records: &[QuestionRecord],
) -> Result<(), StorageError> {
    for record in records {
        sqlx::query(
            r"
                INSERT INTO question_records (
                    id, session_id, session_item_id, question_index,
                    actual_time_ms, planned_ms, status
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    session_item_id = excluded.session_item_id,
                    question_index = excluded.question_index,
                    actual_time_ms = excluded.actual_time_ms,
                    planned_ms = excluded.planned_ms,
                    status = excluded.status
            ",
        )
        .bind(record.id.value().to_string())
        .bind(record.session_id.value().to_string())
        .bind(record.session_item_id.value().to_string())
        .bind(i64::from(record.question_index))
        .bind(i64_from_u64("actual_time_ms", record.actual_time_ms)?)
        .bind(i64_from_u64("planned_ms", record.planned_ms)?)
        .bind(record.status.as_str())
        .execute(&mut **tx)
        .await
        .map_err(conn)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(
        &self,
        session: &Session,
        items: &[SessionItem],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        insert_session(&mut tx, session).await?;
        insert_items(&mut tx, items).await?;
        tx.commit().await.map_err(conn)
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let existing = sqlx::query("SELECT 1 FROM sessions WHERE id = ?1")
            .bind(session.id().value().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if existing.is_none() {
            return Err(StorageError::NotFound);
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;
        insert_session(&mut tx, session).await?;
        tx.commit().await.map_err(conn)
    }

    async fn append_question_records(
        &self,
        records: &[QuestionRecord],
    ) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(conn)?;
        insert_records(&mut tx, records).await?;
        tx.commit().await.map_err(conn)
    }

    async fn overwrite_session(
        &self,
        session: &Session,
        items: &[SessionItem],
        records: &[QuestionRecord],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM session_items WHERE session_id = ?1")
            .bind(session.id().value().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM question_records WHERE session_id = ?1")
            .bind(session.id().value().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        insert_session(&mut tx, session).await?;
        insert_items(&mut tx, items).await?;
        insert_records(&mut tx, records).await?;

        tx.commit().await.map_err(conn)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY started_at ASC, id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await.map_err(conn)?;
        rows.iter().map(map_session_row).collect()
    }

    async fn list_sessions_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = ?1 ORDER BY started_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter().map(map_session_row).collect()
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.value().to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.as_ref().map(map_session_row).transpose()
    }

    async fn get_session_items(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<SessionItem>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, session_id, template_item_id, actual_time_ms,
                       planned_ms, question_count, overtime_count, order_index
                FROM session_items
                WHERE session_id = ?1
                ORDER BY order_index ASC
            ",
        )
        .bind(session_id.value().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_item_row).collect()
    }

    async fn get_question_records(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<QuestionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, session_id, session_item_id, question_index,
                       actual_time_ms, planned_ms, status
                FROM question_records
                WHERE session_id = ?1
                ORDER BY question_index ASC
            ",
        )
        .bind(session_id.value().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_record_row).collect()
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id.value().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM session_items WHERE session_id = ?1")
            .bind(id.value().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM question_records WHERE session_id = ?1")
            .bind(id.value().to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)
    }
}
