use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the eight persisted collections plus the runtime snapshot slot
/// and their secondary indexes. No cross-table foreign keys: rows may
/// reference collections imported in any order, and sessions legitimately
/// outlive the template they were run against.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_types (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    short_name TEXT,
                    color TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS templates (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    description TEXT,
                    is_default INTEGER NOT NULL,
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    total_planned_minutes INTEGER NOT NULL CHECK (total_planned_minutes >= 0),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS template_items (
                    id TEXT PRIMARY KEY,
                    template_id TEXT NOT NULL,
                    question_type_id TEXT NOT NULL,
                    question_count INTEGER NOT NULL CHECK (question_count >= 0),
                    planned_minutes INTEGER NOT NULL CHECK (planned_minutes >= 0),
                    order_index INTEGER NOT NULL CHECK (order_index >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    name TEXT,
                    mode TEXT NOT NULL,
                    template_id TEXT NOT NULL,
                    custom_order TEXT NOT NULL,
                    item_snapshot TEXT NOT NULL DEFAULT '[]',
                    status TEXT NOT NULL,
                    started_at TEXT NOT NULL,
                    ended_at TEXT,
                    total_time_ms INTEGER NOT NULL CHECK (total_time_ms >= 0),
                    paused_count INTEGER NOT NULL CHECK (paused_count >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_items (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    template_item_id TEXT NOT NULL,
                    actual_time_ms INTEGER NOT NULL CHECK (actual_time_ms >= 0),
                    planned_ms INTEGER NOT NULL CHECK (planned_ms >= 0),
                    question_count INTEGER NOT NULL CHECK (question_count >= 0),
                    overtime_count INTEGER NOT NULL CHECK (overtime_count >= 0),
                    order_index INTEGER NOT NULL CHECK (order_index >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_records (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    session_item_id TEXT NOT NULL,
                    question_index INTEGER NOT NULL CHECK (question_index >= 1),
                    actual_time_ms INTEGER NOT NULL CHECK (actual_time_ms >= 0),
                    planned_ms INTEGER NOT NULL CHECK (planned_ms >= 0),
                    status TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS stats_daily (
                    date TEXT PRIMARY KEY,
                    total_sessions INTEGER NOT NULL CHECK (total_sessions >= 0),
                    total_time_ms INTEGER NOT NULL CHECK (total_time_ms >= 0),
                    completion_rate REAL NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS settings (
                    id TEXT PRIMARY KEY,
                    theme_mode TEXT NOT NULL,
                    color_scheme TEXT NOT NULL,
                    exam_total_minutes INTEGER,
                    exam_type_ratio TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS runtime_snapshot (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    payload TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_template_items_template
                    ON template_items (template_id, order_index);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_status
                    ON sessions (status);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_session_items_session
                    ON session_items (session_id, order_index);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_question_records_session
                    ON question_records (session_id, question_index);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_question_records_session_item
                    ON question_records (session_item_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
