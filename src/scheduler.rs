use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use jiff::{SignedDuration, Timestamp};
use rand::Rng;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::sync::{SyncOrchestrator, SyncSummary, SyncTrigger};

/// Triggers sync passes periodically or on demand. At most one pass runs at a
/// time; a trigger that arrives while a pass is running is dropped.
pub struct Scheduler {
    orchestrator: Arc<SyncOrchestrator>,
    interval: Duration,
    flex: Duration,
    in_progress: Arc<AtomicBool>,
    next_due: Mutex<Timestamp>,
    last_summary: Mutex<Option<SyncSummary>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SchedulerStatus {
    pub in_progress: bool,
    pub next_due: Timestamp,
    pub interval_secs: u64,
    pub flex_secs: u64,
    pub last_summary: Option<SyncSummary>,
}

/// Holds the in-progress flag; releasing it on drop covers panics too.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, interval: Duration, flex: Duration) -> Self {
        let flex = flex.min(interval);
        Self {
            orchestrator,
            interval,
            flex,
            in_progress: Arc::new(AtomicBool::new(false)),
            next_due: Mutex::new(due_after(next_delay(interval, flex))),
            last_summary: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub async fn trigger_periodic(&self) -> Option<SyncSummary> {
        let due = due_after(next_delay(self.interval, self.flex));
        *self.next_due.lock().unwrap_or_else(PoisonError::into_inner) = due;
        tracing::debug!(next_due = %due, "periodic sync triggered");
        self.maybe_run_sync(SyncTrigger::Periodic).await
    }

    pub async fn trigger_immediate(&self) -> Option<SyncSummary> {
        self.maybe_run_sync(SyncTrigger::Immediate).await
    }

    /// Runs a pass unless one is already in progress, in which case this is a
    /// no-op returning `None`.
    pub async fn maybe_run_sync(&self, trigger: SyncTrigger) -> Option<SyncSummary> {
        let Some(guard) = RunGuard::acquire(&self.in_progress) else {
            tracing::debug!(trigger = ?trigger, "sync pass already in progress, skipping trigger");
            return None;
        };
        Some(self.run_guarded(guard, trigger).await)
    }

    /// Starts an immediate pass on a background task. Returns `false` when a
    /// pass is already running.
    pub fn spawn_immediate(self: &Arc<Self>) -> bool {
        let Some(guard) = RunGuard::acquire(&self.in_progress) else {
            tracing::debug!("sync pass already in progress, skipping immediate trigger");
            return false;
        };
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_guarded(guard, SyncTrigger::Immediate).await;
        });
        true
    }

    /// Sleeps until the next due time and triggers a periodic pass, forever.
    pub fn spawn_periodic(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                flex_secs = self.flex.as_secs(),
                "periodic sync scheduled"
            );
            loop {
                tokio::time::sleep(self.until_next_due()).await;
                self.trigger_periodic().await;
            }
        })
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            in_progress: self.is_running(),
            next_due: *self.next_due.lock().unwrap_or_else(PoisonError::into_inner),
            interval_secs: self.interval.as_secs(),
            flex_secs: self.flex.as_secs(),
            last_summary: self.last_summary.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }

    async fn run_guarded(&self, _guard: RunGuard, trigger: SyncTrigger) -> SyncSummary {
        let summary = self.orchestrator.run_sync(trigger).await;
        *self.last_summary.lock().unwrap_or_else(PoisonError::into_inner) = Some(summary.clone());
        summary
    }

    fn until_next_due(&self) -> Duration {
        let due = *self.next_due.lock().unwrap_or_else(PoisonError::into_inner);
        Duration::try_from(due.duration_since(Timestamp::now())).unwrap_or(Duration::ZERO)
    }
}

/// Delay until the next periodic pass, uniformly within `[interval - flex, interval]`.
pub fn next_delay(interval: Duration, flex: Duration) -> Duration {
    let flex = flex.min(interval);
    if flex.is_zero() {
        return interval;
    }
    let flex_ms = u64::try_from(flex.as_millis()).unwrap_or(u64::MAX);
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=flex_ms));
    interval.saturating_sub(jitter)
}

fn due_after(delay: Duration) -> Timestamp {
    let delay = SignedDuration::try_from(delay).unwrap_or(SignedDuration::MAX);
    Timestamp::now().checked_add(delay).unwrap_or(Timestamp::MAX)
}
