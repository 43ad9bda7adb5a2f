use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Counters from one completed poll cycle, logged at cycle end and exposed
/// to the administrative surface.
#[derive(Debug, Default, Clone)]
pub struct CycleSummary {
    pub locations_polled: usize,
    pub alerts_fetched: usize,
    pub alerts_new: usize,
    pub alerts_updated: usize,
    pub notifications_attempted: usize,
    pub notifications_delivered: usize,
    pub alerts_deactivated: u64,
    pub alerts_deleted: u64,
    pub tokens_deactivated: u64,
}

/// One full poll cycle. The scheduler only knows this seam, so tests can
/// drive it with a fake.
#[async_trait]
pub trait PollCycle: Send + Sync + 'static {
    async fn run_cycle(&self) -> Result<CycleSummary>;
}

/// Exposed through the operator-facing admin surface (HTTP layer lives
/// outside this service).
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub next_scheduled_run: Option<DateTime<Utc>>,
}

struct TimerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Drives poll cycles: one immediately on start, then on a fixed interval.
/// An explicit object rather than global state, so tests can run multiple
/// independent instances.
///
/// Overlap policy: skip-if-running. A tick (or `run_once`) that arrives
/// while a cycle is still in flight is skipped and logged, so a slow cycle
/// never causes duplicate concurrent writes to the alert store.
pub struct Scheduler<C: PollCycle> {
    cycle: Arc<C>,
    interval: Duration,
    cycle_running: Arc<AtomicBool>,
    next_run: Arc<Mutex<Option<DateTime<Utc>>>>,
    timer: Mutex<Option<TimerHandle>>,
}

impl<C: PollCycle> Scheduler<C> {
    pub fn new(cycle: Arc<C>, interval: Duration) -> Self {
        Self {
            cycle,
            interval,
            cycle_running: Arc::new(AtomicBool::new(false)),
            next_run: Arc::new(Mutex::new(None)),
            timer: Mutex::new(None),
        }
    }

    /// Idempotent: starting an already-running scheduler is a logged no-op.
    pub fn start(&self) {
        let mut timer = self.timer.lock().unwrap();
        if timer.is_some() {
            info!("Scheduler already running, start ignored");
            return;
        }

        let (shutdown, mut rx) = watch::channel(false);
        let cycle = self.cycle.clone();
        let running = self.cycle_running.clone();
        let next_run = self.next_run.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            if let Some(Err(e)) = run_guarded(cycle.as_ref(), &running).await {
                error!("Poll cycle failed: {:#}", e);
            }

            loop {
                *next_run.lock().unwrap() = Some(
                    Utc::now()
                        + chrono::Duration::from_std(interval)
                            .unwrap_or_else(|_| chrono::Duration::zero()),
                );

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Some(Err(e)) = run_guarded(cycle.as_ref(), &running).await {
                            // One bad cycle must not take the timer down.
                            error!("Poll cycle failed: {:#}", e);
                        }
                    }
                    _ = rx.changed() => break,
                }
            }

            next_run.lock().unwrap().take();
        });

        *timer = Some(TimerHandle { shutdown, task });
        info!(
            "Scheduler started, polling every {} seconds",
            self.interval.as_secs()
        );
    }

    /// Signals the timer loop to stop. An in-flight cycle is allowed to
    /// finish; only new cycles are prevented.
    #[allow(dead_code)] // admin surface
    pub fn stop(&self) {
        let handle = self.timer.lock().unwrap().take();
        match handle {
            Some(TimerHandle { shutdown, task: _ }) => {
                let _ = shutdown.send(true);
                self.next_run.lock().unwrap().take();
                info!("Scheduler stopped");
            }
            None => {
                info!("Scheduler not running, stop ignored");
            }
        }
    }

    /// Administrative trigger. Shares the exact same guarded cycle path as
    /// the timer; returns None when a cycle was already in flight.
    #[allow(dead_code)] // admin surface
    pub async fn run_once(&self) -> Result<Option<CycleSummary>> {
        match run_guarded(self.cycle.as_ref(), &self.cycle_running).await {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }

    #[allow(dead_code)] // admin surface
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.timer.lock().unwrap().is_some(),
            next_scheduled_run: *self.next_run.lock().unwrap(),
        }
    }

    /// Stops the timer and waits for its task to wind down.
    pub async fn shutdown(&self) {
        let handle = self.timer.lock().unwrap().take();
        if let Some(TimerHandle { shutdown, task }) = handle {
            let _ = shutdown.send(true);
            self.next_run.lock().unwrap().take();
            let _ = task.await;
            info!("Scheduler stopped");
        }
    }
}

/// Runs one cycle unless another is already in flight (skip-if-running).
async fn run_guarded<C: PollCycle>(
    cycle: &C,
    running: &AtomicBool,
) -> Option<Result<CycleSummary>> {
    if running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("Previous poll cycle still running, skipping this one");
        return None;
    }

    let result = cycle.run_cycle().await;
    running.store(false, Ordering::SeqCst);
    Some(result)
}
