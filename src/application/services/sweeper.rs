//! Periodic sweeps
//!
//! A [`Sweep`] is one pass over the store that moves reservations whose
//! time has run out. [`BackgroundSweeper`] runs a sweep on an interval
//! until shutdown. A failing pass is logged and the loop keeps going.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::DomainResult;
use crate::shared::ShutdownSignal;

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Candidates returned by the store
    pub scanned: usize,
    /// Transitions that committed
    pub applied: usize,
    /// Candidates someone else moved first
    pub skipped: usize,
    /// Candidates that still failed after retries
    pub failed: usize,
}

#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn sweep(&self) -> DomainResult<SweepReport>;
}

pub struct BackgroundSweeper<S: Sweep> {
    sweep: Arc<S>,
    interval: Duration,
    shutdown: ShutdownSignal,
    running: Arc<AtomicBool>,
}

impl<S: Sweep> BackgroundSweeper<S> {
    pub fn new(sweep: S, interval: Duration) -> Self {
        Self {
            sweep: Arc::new(sweep),
            interval,
            shutdown: ShutdownSignal::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop together with the rest of the process instead of via [`stop`](Self::stop).
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn sweep(&self) -> &Arc<S> {
        &self.sweep
    }

    /// Spawn the background loop. A second call while running is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!(sweep = self.sweep.name(), "Sweeper already running");
            return;
        }

        let sweep = self.sweep.clone();
        let shutdown = self.shutdown.clone();
        let running = self.running.clone();
        let period = self.interval;

        tokio::spawn(async move {
            info!(
                sweep = sweep.name(),
                interval_secs = period.as_secs_f64(),
                "Sweeper started"
            );

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match sweep.sweep().await {
                            Ok(report) if report.scanned > 0 => {
                                info!(
                                    sweep = sweep.name(),
                                    scanned = report.scanned,
                                    applied = report.applied,
                                    skipped = report.skipped,
                                    failed = report.failed,
                                    "Sweep finished"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(sweep = sweep.name(), error = %e, "Sweep failed");
                            }
                        }
                    }
                    _ = shutdown.wait() => {
                        info!(sweep = sweep.name(), "Sweeper shutting down");
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!(sweep = sweep.name(), "Sweeper stopped");
        });
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        passes: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Sweep for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn sweep(&self) -> DomainResult<SweepReport> {
            self.passes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DomainError::StoreUnavailable("down".into()));
            }
            Ok(SweepReport::default())
        }
    }

    async fn wait_for(passes: &AtomicUsize, at_least: usize) {
        for _ in 0..200 {
            if passes.load(Ordering::SeqCst) >= at_least {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("sweep did not run {} times", at_least);
    }

    #[tokio::test]
    async fn runs_until_stopped() {
        let passes = Arc::new(AtomicUsize::new(0));
        let sweeper = BackgroundSweeper::new(
            Counting { passes: passes.clone(), fail: false },
            Duration::from_millis(5),
        );

        sweeper.start();
        assert!(sweeper.is_running());
        wait_for(&passes, 3).await;

        sweeper.stop();
        for _ in 0..200 {
            if !sweeper.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!sweeper.is_running());
    }

    #[tokio::test]
    async fn keeps_running_after_failed_pass() {
        let passes = Arc::new(AtomicUsize::new(0));
        let sweeper = BackgroundSweeper::new(
            Counting { passes: passes.clone(), fail: true },
            Duration::from_millis(5),
        );

        sweeper.start();
        wait_for(&passes, 3).await;
        assert!(sweeper.is_running());
        sweeper.stop();
    }
}
