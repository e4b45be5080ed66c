//! Reservation expiry
//!
//! Moves PENDING reservations past their payment deadline to EXPIRED and
//! frees their slot. Safe to run from several places at once: every
//! transition is a compare-and-set, so a reservation expires exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use super::sweeper::{BackgroundSweeper, Sweep, SweepReport};
use crate::application::booking::BookingService;
use crate::domain::DomainResult;
use crate::shared::{retry_transient, RetryConfig};

pub struct ExpirySweep {
    booking: Arc<BookingService>,
    retry: RetryConfig,
}

impl ExpirySweep {
    pub fn new(booking: Arc<BookingService>, retry: RetryConfig) -> Self {
        Self { booking, retry }
    }
}

#[async_trait]
impl Sweep for ExpirySweep {
    fn name(&self) -> &'static str {
        "reservation_expiry"
    }

    async fn sweep(&self) -> DomainResult<SweepReport> {
        let now = self.booking.clock().now();
        let overdue = retry_transient(
            &self.retry,
            || self.booking.repositories().reservations().find_overdue_pending(now),
            "find_overdue_pending",
        )
        .await?;

        let mut report = SweepReport {
            scanned: overdue.len(),
            ..SweepReport::default()
        };

        for reservation in overdue {
            let id = reservation.id;
            match retry_transient(&self.retry, || self.booking.expire(id), "expire_reservation").await {
                Ok(_) => {
                    report.applied += 1;
                    metrics::counter!("booking_expired_total").increment(1);
                }
                Err(e) if e.is_invalid_transition() => {
                    // Paid or canceled between the scan and the write
                    debug!(reservation_id = %id, "Reservation moved before expiry");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(reservation_id = %id, error = %e, "Failed to expire reservation");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

pub type ExpiryScheduler = BackgroundSweeper<ExpirySweep>;
