use chrono::NaiveDate;

/// Per-day aggregate keyed by local date. Rows accumulate: counts and time
/// add up across contributing sessions, while `completion_rate` keeps the
/// most recent value.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyStat {
    date: NaiveDate,
    total_sessions: u32,
    total_time_ms: u64,
    completion_rate: f64,
}

impl DailyStat {
    #[must_use]
    pub fn new(
        date: NaiveDate,
        total_sessions: u32,
        total_time_ms: u64,
        completion_rate: f64,
    ) -> Self {
        Self {
            date,
            total_sessions,
            total_time_ms,
            completion_rate,
        }
    }

    /// Merge another entry for the same date into this one.
    pub fn accumulate(&mut self, entry: &DailyStat) {
        self.total_sessions = self.total_sessions.saturating_add(entry.total_sessions);
        self.total_time_ms = self.total_time_ms.saturating_add(entry.total_time_ms);
        self.completion_rate = entry.completion_rate;
    }

    // Accessors
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn total_sessions(&self) -> u32 {
        self.total_sessions
    }

    #[must_use]
    pub fn total_time_ms(&self) -> u64 {
        self.total_time_ms
    }

    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        self.completion_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn accumulate_adds_counts_and_keeps_latest_rate() {
        let mut stat = DailyStat::new(date(1), 1, 1_800_000, 0.5);
        stat.accumulate(&DailyStat::new(date(1), 1, 600_000, 0.8));

        assert_eq!(stat.total_sessions(), 2);
        assert_eq!(stat.total_time_ms(), 2_400_000);
        assert!((stat.completion_rate() - 0.8).abs() < f64::EPSILON);
    }
}
