use chrono::{DateTime, Duration, Utc};
use std::time::Instant;

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns true if this clock represents real time.
    #[must_use]
    pub fn is_default(&self) -> bool {
        matches!(self, Clock::Default)
    }

    /// Returns true if this clock is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

//
// ─── DELTA TIMER ───────────────────────────────────────────────────────────────
//

/// Monotonic elapsed-delta producer behind the shared tick driver.
///
/// Tracks the instant of the previous emission so each cadence firing can
/// report the *measured* elapsed time instead of the nominal interval, which
/// keeps accumulated session time immune to scheduler jitter. While disarmed
/// no reference instant is held, so a later `arm` can never apply a stale
/// delta from before a pause.
#[derive(Debug, Clone, Default)]
pub struct DeltaTimer {
    last: Option<Instant>,
}

impl DeltaTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start measuring from `now`. Replaces any previous reference instant.
    pub fn arm(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Drop the reference instant; subsequent `tick` calls return zero until
    /// `arm` is called again.
    pub fn disarm(&mut self) {
        self.last = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.last.is_some()
    }

    /// Returns elapsed milliseconds since the last emission and re-arms at
    /// `now`. Returns 0 when disarmed or when the clock did not advance.
    #[must_use]
    pub fn tick(&mut self, now: Instant) -> u64 {
        let Some(last) = self.last else {
            return 0;
        };
        self.last = Some(now);
        // saturating: a non-monotonic host clock must never produce a
        // negative delta.
        let elapsed = now.saturating_duration_since(last);
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

//
// ─── DURATION FORMATTING ──────────────────────────────────────────────────────
//

/// Formats milliseconds as `MM:SS`, switching to `HH:MM:SS` at one hour.
#[must_use]
pub fn format_duration(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Formats milliseconds as the compact `M:SS` form used in per-question views.
#[must_use]
pub fn format_minutes_seconds(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes}:{seconds:02}")
}

/// Formats a timestamp as `YYYY/MM/DD HH:mm` (default session names).
#[must_use]
pub fn format_date_time(at: DateTime<Utc>) -> String {
    at.format("%Y/%m/%d %H:%M").to_string()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn delta_timer_reports_elapsed_between_ticks() {
        let mut timer = DeltaTimer::new();
        let start = Instant::now();
        timer.arm(start);

        let delta = timer.tick(start + StdDuration::from_millis(200));
        assert_eq!(delta, 200);

        let delta = timer.tick(start + StdDuration::from_millis(450));
        assert_eq!(delta, 250);
    }

    #[test]
    fn delta_timer_is_zero_when_disarmed() {
        let mut timer = DeltaTimer::new();
        assert_eq!(timer.tick(Instant::now()), 0);

        timer.arm(Instant::now());
        timer.disarm();
        assert!(!timer.is_armed());
        assert_eq!(timer.tick(Instant::now()), 0);
    }

    #[test]
    fn delta_timer_clamps_regressed_clock_to_zero() {
        let mut timer = DeltaTimer::new();
        let start = Instant::now();
        timer.arm(start + StdDuration::from_millis(100));
        assert_eq!(timer.tick(start), 0);
    }

    #[test]
    fn rearming_resets_the_reference_instant() {
        let mut timer = DeltaTimer::new();
        let start = Instant::now();
        timer.arm(start);
        timer.arm(start + StdDuration::from_millis(500));
        assert_eq!(timer.tick(start + StdDuration::from_millis(700)), 200);
    }

    #[test]
    fn formats_sub_hour_durations() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(59_999), "00:59");
        assert_eq!(format_duration(95_000), "01:35");
        assert_eq!(format_duration(3_599_000), "59:59");
    }

    #[test]
    fn formats_hour_durations_with_hours_field() {
        assert_eq!(format_duration(3_600_000), "01:00:00");
        assert_eq!(format_duration(4_515_000), "01:15:15");
    }

    #[test]
    fn formats_compact_minutes_seconds() {
        assert_eq!(format_minutes_seconds(5_000), "0:05");
        assert_eq!(format_minutes_seconds(65_000), "1:05");
        assert_eq!(format_minutes_seconds(600_000), "10:00");
    }

    #[test]
    fn formats_date_time() {
        assert_eq!(format_date_time(fixed_now()), "2023/11/14 22:13");
    }
}
