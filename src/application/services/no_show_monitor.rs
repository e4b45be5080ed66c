//! No-show detection
//!
//! A checked-in reservation whose charging has not started within the
//! grace period becomes NO_SHOW and releases the connector.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::sweeper::{BackgroundSweeper, Sweep, SweepReport};
use crate::application::booking::BookingService;
use crate::domain::DomainResult;
use crate::shared::{retry_transient, RetryConfig};

pub struct NoShowSweep {
    booking: Arc<BookingService>,
    retry: RetryConfig,
}

impl NoShowSweep {
    pub fn new(booking: Arc<BookingService>, retry: RetryConfig) -> Self {
        Self { booking, retry }
    }
}

#[async_trait]
impl Sweep for NoShowSweep {
    fn name(&self) -> &'static str {
        "no_show_monitor"
    }

    async fn sweep(&self) -> DomainResult<SweepReport> {
        let cutoff = self.booking.clock().now() - self.booking.policy().no_show_grace;
        let candidates = retry_transient(
            &self.retry,
            || self.booking.repositories().reservations().find_unstarted_check_ins(cutoff),
            "find_unstarted_check_ins",
        )
        .await?;

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };

        for reservation in candidates {
            let id = reservation.id;
            match retry_transient(&self.retry, || self.booking.mark_no_show(id), "mark_no_show").await {
                Ok(_) => {
                    report.applied += 1;
                    metrics::counter!("booking_no_show_total").increment(1);
                }
                Err(e) if e.is_invalid_transition() => {
                    debug!(reservation_id = %id, "Charging started or session closed before no-show");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(reservation_id = %id, error = %e, "Failed to mark no-show");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

pub type NoShowMonitor = BackgroundSweeper<NoShowSweep>;
