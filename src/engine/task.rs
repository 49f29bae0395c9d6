//! Cancellable fixed-period task.
//!
//! Each `PeriodicTask` owns exactly one spawned tokio task. Stopping it
//! (explicitly or on drop) flips the shared guard and aborts the task, so
//! a cycle that is mid-flight observes the guard before touching shared
//! state and nothing fires afterwards.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// When the first run happens relative to `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTick {
    /// Run once right away, then every period.
    Immediate,
    /// Wait a full period before the first run.
    AfterPeriod,
}

/// Liveness flag handed to every run of a periodic job.
#[derive(Debug, Clone)]
pub struct TaskGuard(Arc<AtomicBool>);

impl TaskGuard {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// A guard that is never cancelled, for one-off manual runs.
    pub fn detached() -> Self {
        Self::new()
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running periodic job.
pub struct PeriodicTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
    guard: TaskGuard,
}

impl PeriodicTask {
    /// Spawn `job` every `period`. Runs never overlap: the next tick is
    /// only awaited after the previous run has completed, and ticks missed
    /// while a run was in progress are delayed rather than bunched.
    pub fn start<F>(name: &'static str, period: Duration, first: FirstTick, mut job: F) -> Self
    where
        F: FnMut(TaskGuard) -> BoxFuture<'static, ()> + Send + 'static,
    {
        let guard = TaskGuard::new();
        let task_guard = guard.clone();

        let start = match first {
            FirstTick::Immediate => Instant::now(),
            FirstTick::AfterPeriod => Instant::now() + period,
        };

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !task_guard.is_active() {
                    break;
                }
                debug!(task = name, "Periodic task tick");
                job(task_guard.clone()).await;
            }
        });

        info!(task = name, period_secs = period.as_secs(), ?first, "Periodic task started");

        Self {
            name,
            handle: Some(handle),
            guard,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_active() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the task. Idempotent.
    pub fn stop(&mut self) {
        self.guard.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!(task = self.name, "Periodic task stopped");
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    const PERIOD: Duration = Duration::from_secs(45);

    fn counting(counter: Arc<AtomicUsize>) -> impl FnMut(TaskGuard) -> BoxFuture<'static, ()> {
        move |_guard| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_first_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let _task = PeriodicTask::start("t", PERIOD, FirstTick::Immediate, counting(count.clone()));

        sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(PERIOD).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        sleep(PERIOD * 2).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_period_first_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let _task = PeriodicTask::start("t", PERIOD, FirstTick::AfterPeriod, counting(count.clone()));

        sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(PERIOD).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_runs() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut task = PeriodicTask::start("t", PERIOD, FirstTick::Immediate, counting(count.clone()));

        sleep(Duration::from_millis(10)).await;
        assert!(task.is_running());
        task.stop();
        task.stop();
        assert!(!task.is_running());

        sleep(PERIOD * 5).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _task = PeriodicTask::start("t", PERIOD, FirstTick::AfterPeriod, counting(count.clone()));
        }
        sleep(PERIOD * 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_run_sees_cancellation() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut task = PeriodicTask::start("t", PERIOD, FirstTick::Immediate, move |guard: TaskGuard| {
            let c = c.clone();
            async move {
                sleep(Duration::from_secs(1)).await;
                if guard.is_active() {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            }
            .boxed()
        });

        sleep(Duration::from_millis(500)).await;
        task.stop();
        sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detached_guard_is_active() {
        assert!(TaskGuard::detached().is_active());
    }
}
