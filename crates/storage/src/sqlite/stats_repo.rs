use chrono::NaiveDate;
use pacer_core::model::DailyStat;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, ser, u32_from_i64, u64_from_i64};
use crate::repository::{StatsRepository, StorageError};

fn map_daily_stat_row(row: &sqlx::sqlite::SqliteRow) -> Result<DailyStat, StorageError> {
    let date: NaiveDate = row.try_get("date").map_err(ser)?;
    Ok(DailyStat::new(
        date,
        u32_from_i64(
            "total_sessions",
            row.try_get::<i64, _>("total_sessions").map_err(ser)?,
        )?,
        u64_from_i64(
            "total_time_ms",
            row.try_get::<i64, _>("total_time_ms").map_err(ser)?,
        )?,
        row.try_get("completion_rate").map_err(ser)?,
    ))
}

#[async_trait::async_trait]
impl StatsRepository for SqliteRepository {
    async fn list_daily_stats(&self) -> Result<Vec<DailyStat>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT date, total_sessions, total_time_ms, completion_rate
                FROM stats_daily
                ORDER BY date ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_daily_stat_row).collect()
    }

    async fn accumulate_daily_stat(&self, entry: &DailyStat) -> Result<DailyStat, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let existing = sqlx::query(
            r"
                SELECT date, total_sessions, total_time_ms, completion_rate
                FROM stats_daily
                WHERE date = ?1
            ",
        )
        .bind(entry.date())
        .fetch_optional(&mut *tx)
        .await
        .map_err(conn)?;

        let next = match existing {
            Some(row) => {
                let mut stored = map_daily_stat_row(&row)?;
                stored.accumulate(entry);
                stored
            }
            None => entry.clone(),
        };

        sqlx::query(
            r"
                INSERT INTO stats_daily (date, total_sessions, total_time_ms, completion_rate)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(date) DO UPDATE SET
                    total_sessions = excluded.total_sessions,
                    total_time_ms = excluded.total_time_ms,
                    completion_rate = excluded.completion_rate
            ",
        )
        .bind(next.date())
        .bind(i64::from(next.total_sessions()))
        .bind(i64_from_u64("total_time_ms", next.total_time_ms())?)
        .bind(next.completion_rate())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(next)
    }
}
