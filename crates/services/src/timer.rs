use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pacer_core::time::DeltaTimer;
use storage::repository::SnapshotRepository;
use tokio::task::JoinHandle;

use crate::runtime_handle::{SharedRuntime, lock_runtime};

/// Cadence of the shared tick task. Coarse enough to keep consumers cheap,
/// fine enough for sub-second displays.
pub const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// The tick task flushes the runtime snapshot every Nth firing (~1 s), so
/// a crash mid-run loses at most a second of accumulated time.
const SNAPSHOT_EVERY_TICKS: u32 = 5;

/// Drives the session clock.
///
/// Exactly one interval task exists per driver no matter how many
/// consumers hold a [`TimerGuard`], so elapsed time is never counted
/// twice. Each firing feeds the *measured* delta since the previous
/// firing into the runtime; stopping takes effect at the next firing.
pub struct TimerDriver {
    runtime: SharedRuntime,
    snapshots: Arc<dyn SnapshotRepository>,
    consumers: AtomicUsize,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TimerDriver {
    #[must_use]
    pub fn new(runtime: SharedRuntime, snapshots: Arc<dyn SnapshotRepository>) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            snapshots,
            consumers: AtomicUsize::new(0),
            task: Mutex::new(None),
        })
    }

    /// Register a consumer. The driver runs while at least one guard is
    /// alive and the runtime is running unpaused.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> TimerGuard {
        self.consumers.fetch_add(1, Ordering::SeqCst);
        self.sync();
        TimerGuard {
            driver: Arc::clone(self),
        }
    }

    /// Re-evaluate whether the tick task should run. Call after every
    /// operation that can change `(phase, paused)`.
    pub fn sync(self: &Arc<Self>) {
        let should_run = self.consumers.load(Ordering::SeqCst) > 0 && {
            let runtime = lock_runtime(&self.runtime);
            runtime.is_running() && !runtime.is_paused()
        };

        let mut task = self.task.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let active = task.as_ref().is_some_and(|handle| !handle.is_finished());

        if should_run && !active {
            *task = Some(self.spawn_tick_task());
            tracing::debug!("session timer started");
        } else if !should_run && active {
            if let Some(handle) = task.take() {
                handle.abort();
            }
            tracing::debug!("session timer stopped");
        }
    }

    /// True while the tick task is live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let task = self.task.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        task.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.consumers.load(Ordering::SeqCst)
    }

    fn spawn_tick_task(self: &Arc<Self>) -> JoinHandle<()> {
        let runtime = Arc::clone(&self.runtime);
        let snapshots = Arc::clone(&self.snapshots);

        tokio::spawn(async move {
            let mut delta = DeltaTimer::new();
            delta.arm(Instant::now());
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            // the first interval tick completes immediately; skip it so the
            // first measured delta covers a real period
            interval.tick().await;
            let mut ticks: u32 = 0;

            loop {
                interval.tick().await;
                let elapsed = delta.tick(Instant::now());

                let (applied, snapshot) = {
                    let mut guard = lock_runtime(&runtime);
                    if !guard.is_running() || guard.is_paused() {
                        (false, None)
                    } else {
                        guard.tick(elapsed);
                        ticks += 1;
                        let snapshot = (ticks % SNAPSHOT_EVERY_TICKS == 0)
                            .then(|| guard.snapshot());
                        (true, snapshot)
                    }
                };

                if !applied {
                    break;
                }
                if let Some(snapshot) = snapshot {
                    if let Err(error) = snapshots.save_snapshot(&snapshot).await {
                        tracing::warn!(%error, "failed to flush runtime snapshot");
                    }
                }
            }
        })
    }
}

/// Consumer handle; dropping the last one stops the tick task.
pub struct TimerGuard {
    driver: Arc<TimerDriver>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.driver.consumers.fetch_sub(1, Ordering::SeqCst);
        self.driver.sync();
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use pacer_core::model::{Mode, TemplateId, TemplateItemId};
    use pacer_core::runtime::SessionRuntime;
    use pacer_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, SnapshotRepository};

    fn running_runtime() -> SharedRuntime {
        let mut runtime = SessionRuntime::new(Mode::Practice);
        runtime.set_template(TemplateId::random()).unwrap();
        runtime.set_order(vec![TemplateItemId::random()]).unwrap();
        runtime.start(fixed_now()).unwrap();
        Arc::new(Mutex::new(runtime))
    }

    #[tokio::test]
    async fn ticks_accumulate_while_running() {
        let runtime = running_runtime();
        let repo = InMemoryRepository::new();
        let driver = TimerDriver::new(Arc::clone(&runtime), Arc::new(repo));

        let guard = driver.acquire();
        assert!(driver.is_active());

        tokio::time::sleep(Duration::from_millis(650)).await;
        let total = lock_runtime(&runtime).timers().total_ms;
        assert!(total >= 400, "expected >=400ms accumulated, got {total}");

        drop(guard);
        assert!(!driver.is_active());
    }

    #[tokio::test]
    async fn driver_stays_idle_without_consumers_or_run() {
        let runtime = Arc::new(Mutex::new(SessionRuntime::new(Mode::Practice)));
        let repo = InMemoryRepository::new();
        let driver = TimerDriver::new(Arc::clone(&runtime), Arc::new(repo));

        // no consumers yet
        driver.sync();
        assert!(!driver.is_active());

        // consumer but idle runtime
        let guard = driver.acquire();
        assert!(!driver.is_active());
        drop(guard);
    }

    #[tokio::test]
    async fn pause_stops_the_task_and_resume_restarts_it() {
        let runtime = running_runtime();
        let repo = InMemoryRepository::new();
        let driver = TimerDriver::new(Arc::clone(&runtime), Arc::new(repo));
        let _guard = driver.acquire();

        lock_runtime(&runtime).pause().unwrap();
        driver.sync();
        assert!(!driver.is_active());
        let frozen = lock_runtime(&runtime).timers().total_ms;

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(lock_runtime(&runtime).timers().total_ms, frozen);

        lock_runtime(&runtime).resume().unwrap();
        driver.sync();
        assert!(driver.is_active());
    }

    #[tokio::test]
    async fn multiple_consumers_share_one_task() {
        let runtime = running_runtime();
        let repo = InMemoryRepository::new();
        let driver = TimerDriver::new(Arc::clone(&runtime), Arc::new(repo));

        let a = driver.acquire();
        let b = driver.acquire();
        assert_eq!(driver.consumer_count(), 2);
        assert!(driver.is_active());

        drop(a);
        assert!(driver.is_active());
        drop(b);
        assert!(!driver.is_active());
    }

    #[tokio::test]
    async fn tick_task_flushes_snapshots() {
        let runtime = running_runtime();
        let repo = InMemoryRepository::new();
        let driver = TimerDriver::new(Arc::clone(&runtime), Arc::new(repo.clone()));
        let _guard = driver.acquire();

        tokio::time::sleep(Duration::from_millis(1400)).await;
        let snapshot = repo.load_snapshot().await.unwrap();
        assert!(snapshot.is_some(), "expected a flushed runtime snapshot");
        assert!(snapshot.unwrap().timers.total_ms > 0);
    }
}
