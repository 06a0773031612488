use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;

use pacer_core::model::{DailyStat, SessionStatus};
use pacer_core::time::Clock;
use storage::repository::{SessionRepository, StatsRepository};

use crate::error::StatsError;
use crate::grid::StatusCounts;

/// One day of the dashboard trend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub accuracy_rate: f64,
    pub completion_rate: f64,
    pub total_questions: u32,
    pub total_time_ms: u64,
}

/// Aggregates for a single day (today/yesterday cards).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DayOverview {
    pub total_questions: u32,
    pub total_time_ms: u64,
    pub accuracy_rate: f64,
    pub completion_rate: f64,
}

/// Everything the dashboard shows: recent trend, today vs. yesterday and
/// the outcome distribution over the trend window.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub trend: Vec<TrendPoint>,
    pub today: DayOverview,
    pub yesterday: DayOverview,
    pub distribution: StatusCounts,
}

#[derive(Default)]
struct DayBucket {
    counts: StatusCounts,
    total_questions: u32,
    total_time_ms: u64,
}

/// Simple aggregation over ended sessions plus the accumulated
/// `stats_daily` rows.
pub struct StatsService {
    sessions: Arc<dyn SessionRepository>,
    stats: Arc<dyn StatsRepository>,
    clock: Clock,
}

impl StatsService {
    #[must_use]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        stats: Arc<dyn StatsRepository>,
        clock: Clock,
    ) -> Self {
        Self {
            sessions,
            stats,
            clock,
        }
    }

    /// The accumulated per-day rows.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` when rows cannot be read.
    pub async fn daily(&self) -> Result<Vec<DailyStat>, StatsError> {
        Ok(self.stats.list_daily_stats().await?)
    }

    /// Derive the dashboard aggregates for the trailing `days` window
    /// (ending today).
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` when rows cannot be read.
    pub async fn dashboard(&self, days: u32) -> Result<DashboardStats, StatsError> {
        let sessions = self
            .sessions
            .list_sessions_by_status(SessionStatus::Ended)
            .await?;

        let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
        for session in &sessions {
            let Some(ended_at) = session.ended_at() else {
                continue;
            };
            let records = self.sessions.get_question_records(session.id()).await?;
            let counts = StatusCounts::from_statuses(records.iter().map(|r| r.status));

            let bucket = buckets.entry(ended_at.date_naive()).or_default();
            bucket.counts.merge(&counts);
            bucket.total_questions += u32::try_from(records.len()).unwrap_or(u32::MAX);
            bucket.total_time_ms += session.total_time_ms();
        }

        let today = self.clock.now().date_naive();
        let mut trend = Vec::with_capacity(days as usize);
        let mut distribution = StatusCounts::default();
        for offset in (0..days).rev() {
            let date = today - Duration::days(i64::from(offset));
            let point = match buckets.get(&date) {
                Some(bucket) => {
                    distribution.merge(&bucket.counts);
                    TrendPoint {
                        date,
                        accuracy_rate: bucket.counts.accuracy_rate(),
                        completion_rate: completion_of(bucket),
                        total_questions: bucket.total_questions,
                        total_time_ms: bucket.total_time_ms,
                    }
                }
                None => TrendPoint {
                    date,
                    accuracy_rate: 0.0,
                    completion_rate: 0.0,
                    total_questions: 0,
                    total_time_ms: 0,
                },
            };
            trend.push(point);
        }

        let today_overview = buckets.get(&today).map(overview_of).unwrap_or_default();
        let yesterday_overview = buckets
            .get(&(today - Duration::days(1)))
            .map(overview_of)
            .unwrap_or_default();

        Ok(DashboardStats {
            trend,
            today: today_overview,
            yesterday: yesterday_overview,
            distribution,
        })
    }
}

fn completion_of(bucket: &DayBucket) -> f64 {
    if bucket.total_questions == 0 {
        return 0.0;
    }
    f64::from(bucket.counts.answered()) / f64::from(bucket.total_questions)
}

fn overview_of(bucket: &DayBucket) -> DayOverview {
    DayOverview {
        total_questions: bucket.total_questions,
        total_time_ms: bucket.total_time_ms,
        accuracy_rate: bucket.counts.accuracy_rate(),
        completion_rate: completion_of(bucket),
    }
}
