//! Settlement Handler
//!
//! Entry point for payment gateway callbacks. The gateway delivers at least
//! once and in any order, so each callback is checked against what was
//! already applied before it may touch the reservation. The applied gateway
//! reference is persisted with the reservation, which makes that check
//! hold across restarts without any state in the handler.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::booking::BookingService;
use crate::domain::{
    DomainResult, PaymentNotification, PaymentOutcome, Reservation, ReservationStatus,
};
use crate::shared::{retry_transient, RetryConfig};

/// Result of handling one callback
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// The callback moved the reservation
    Applied(Reservation),
    /// Same gateway reference and outcome were already applied
    Duplicate(Reservation),
}

impl SettlementOutcome {
    pub fn reservation(&self) -> &Reservation {
        match self {
            SettlementOutcome::Applied(r) | SettlementOutcome::Duplicate(r) => r,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, SettlementOutcome::Duplicate(_))
    }
}

pub struct SettlementHandler {
    booking: Arc<BookingService>,
    retry: RetryConfig,
}

impl SettlementHandler {
    pub fn new(booking: Arc<BookingService>, retry: RetryConfig) -> Self {
        Self { booking, retry }
    }

    /// Apply one gateway callback.
    ///
    /// Late or conflicting callbacks come back as `InvalidTransition`; a
    /// successful payment that can no longer be honored additionally
    /// publishes `PaymentRejected` so the gateway side can refund it.
    pub async fn on_payment_outcome(
        &self,
        notification: PaymentNotification,
    ) -> DomainResult<SettlementOutcome> {
        let id = notification.reservation_id;

        let current = self.load(id).await?;
        if already_applied(&current, &notification) {
            return Ok(self.duplicate(current, &notification));
        }

        let result = match notification.outcome {
            PaymentOutcome::Succeeded => {
                retry_transient(
                    &self.retry,
                    || {
                        self.booking.confirm_payment(
                            id,
                            &notification.gateway_ref,
                            notification.amount,
                        )
                    },
                    "confirm_payment",
                )
                .await
            }
            PaymentOutcome::Failed | PaymentOutcome::Canceled => {
                retry_transient(
                    &self.retry,
                    || {
                        self.booking.decline_payment(
                            id,
                            &notification.gateway_ref,
                            notification.outcome,
                        )
                    },
                    "decline_payment",
                )
                .await
            }
        };

        match result {
            Ok(updated) => {
                metrics::counter!("booking_payment_callbacks_total", "result" => "applied").increment(1);
                info!(
                    reservation_id = %id,
                    gateway_ref = %notification.gateway_ref,
                    outcome = %notification.outcome,
                    status = %updated.status,
                    "Payment callback applied"
                );
                Ok(SettlementOutcome::Applied(updated))
            }
            Err(e) if e.is_invalid_transition() => {
                // A retried write may have committed before its error surfaced
                let latest = self.load(id).await?;
                if already_applied(&latest, &notification) {
                    return Ok(self.duplicate(latest, &notification));
                }

                metrics::counter!("booking_payment_callbacks_total", "result" => "rejected").increment(1);
                if notification.outcome == PaymentOutcome::Succeeded {
                    warn!(
                        reservation_id = %id,
                        gateway_ref = %notification.gateway_ref,
                        amount = notification.amount,
                        status = %latest.status,
                        "Payment arrived for a reservation that cannot take it, refund required"
                    );
                    self.booking.events().publish_payment_rejected(
                        &latest,
                        &notification.gateway_ref,
                        notification.amount,
                        self.booking.clock().now(),
                    );
                } else {
                    debug!(
                        reservation_id = %id,
                        outcome = %notification.outcome,
                        status = %latest.status,
                        "Ignoring late payment failure"
                    );
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn duplicate(
        &self,
        current: Reservation,
        notification: &PaymentNotification,
    ) -> SettlementOutcome {
        debug!(
            reservation_id = %current.id,
            gateway_ref = %notification.gateway_ref,
            "Duplicate payment callback"
        );
        metrics::counter!("booking_payment_callbacks_total", "result" => "duplicate").increment(1);
        SettlementOutcome::Duplicate(current)
    }

    async fn load(&self, id: Uuid) -> DomainResult<Reservation> {
        retry_transient(&self.retry, || self.booking.get_reservation(id), "load_reservation").await
    }
}

/// Whether `reservation` already carries the effect of `notification`.
fn already_applied(reservation: &Reservation, notification: &PaymentNotification) -> bool {
    if reservation.payment_ref.as_deref() != Some(notification.gateway_ref.as_str()) {
        return false;
    }
    match notification.outcome {
        PaymentOutcome::Succeeded => reservation.is_paid,
        PaymentOutcome::Failed | PaymentOutcome::Canceled => {
            reservation.status == ReservationStatus::Canceled && !reservation.is_paid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::booking::testing::{fixture, request, Fixture};
    use crate::application::events::Event;
    use crate::domain::DomainError;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: StdDuration::from_millis(1),
            backoff_multiplier: 2.0,
            max_delay: StdDuration::from_millis(2),
        }
    }

    fn handler(fx: &Fixture) -> SettlementHandler {
        SettlementHandler::new(fx.booking.clone(), fast_retry())
    }

    async fn pending(fx: &Fixture) -> Reservation {
        fx.booking
            .create_reservation(request("user-1", "VH-1", "CN-1", 120, 60))
            .await
            .unwrap()
            .reservation
    }

    fn notification(r: &Reservation, outcome: PaymentOutcome, gateway_ref: &str) -> PaymentNotification {
        PaymentNotification {
            reservation_id: r.id,
            outcome,
            amount: r.estimated_cost,
            gateway_ref: gateway_ref.into(),
        }
    }

    #[tokio::test]
    async fn success_confirms_once() {
        let fx = fixture();
        let handler = handler(&fx);
        let r = pending(&fx).await;

        let first = handler
            .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-1"))
            .await
            .unwrap();
        assert!(!first.is_duplicate());
        assert_eq!(first.reservation().status, ReservationStatus::Confirmed);

        let second = handler
            .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-1"))
            .await
            .unwrap();
        assert!(second.is_duplicate());

        let log = fx.booking.transition_log(r.id).await.unwrap();
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_is_recognized_by_a_fresh_handler() {
        let fx = fixture();
        let r = pending(&fx).await;
        handler(&fx)
            .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-1"))
            .await
            .unwrap();

        let restarted = handler(&fx);
        let outcome = restarted
            .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-1"))
            .await
            .unwrap();
        assert!(outcome.is_duplicate());
    }

    #[tokio::test]
    async fn callbacks_are_deduplicated_from_the_stored_payment_ref() {
        let fx = fixture();
        let handler = handler(&fx);

        for start_in in [120, 240, 360] {
            let r = fx
                .booking
                .create_reservation(request("user-1", "VH-1", "CN-1", start_in, 60))
                .await
                .unwrap()
                .reservation;
            for _ in 0..3 {
                handler
                    .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-1"))
                    .await
                    .unwrap();
            }
            assert_eq!(fx.booking.transition_log(r.id).await.unwrap().len(), 2);
        }

        let fresh = SettlementHandler::new(fx.booking.clone(), fast_retry());
        let history = fx.booking.list_user_reservations("user-1").await.unwrap();
        for r in history {
            let outcome = fresh
                .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-1"))
                .await
                .unwrap();
            assert!(outcome.is_duplicate());
        }
    }

    #[tokio::test]
    async fn concurrent_duplicates_apply_once() {
        let fx = fixture();
        let handler = Arc::new(handler(&fx));
        let r = pending(&fx).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let handler = handler.clone();
            let n = notification(&r, PaymentOutcome::Succeeded, "gw-1");
            handles.push(tokio::spawn(async move { handler.on_payment_outcome(n).await }));
        }

        let mut applied = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if !outcome.is_duplicate() {
                applied += 1;
            }
            assert_eq!(outcome.reservation().status, ReservationStatus::Confirmed);
        }
        assert_eq!(applied, 1);
        assert_eq!(fx.booking.transition_log(r.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failure_cancels_and_frees_slot() {
        let fx = fixture();
        let handler = handler(&fx);
        let r = pending(&fx).await;

        let outcome = handler
            .on_payment_outcome(notification(&r, PaymentOutcome::Canceled, "gw-1"))
            .await
            .unwrap();
        assert_eq!(outcome.reservation().status, ReservationStatus::Canceled);
        assert!(fx.booking.is_available("CN-1", &r.window));

        let again = handler
            .on_payment_outcome(notification(&r, PaymentOutcome::Canceled, "gw-1"))
            .await
            .unwrap();
        assert!(again.is_duplicate());
    }

    #[tokio::test]
    async fn late_success_after_expiry_is_rejected_for_refund() {
        let fx = fixture();
        let handler = handler(&fx);
        let r = pending(&fx).await;
        fx.clock.advance(Duration::minutes(16));
        fx.booking.expire(r.id).await.unwrap();

        let mut events = fx.events.subscribe();
        let err = handler
            .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-late"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_transition());

        let message = events.try_recv().unwrap();
        match message.event {
            Event::PaymentRejected(rejected) => {
                assert_eq!(rejected.gateway_ref, "gw-late");
                assert_eq!(rejected.status, ReservationStatus::Expired);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let stored = fx.booking.get_reservation(r.id).await.unwrap();
        assert_eq!(stored.status, ReservationStatus::Expired);
        assert!(!stored.is_paid);
    }

    #[tokio::test]
    async fn failure_after_confirmation_is_refused() {
        let fx = fixture();
        let handler = handler(&fx);
        let r = pending(&fx).await;
        handler
            .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-1"))
            .await
            .unwrap();

        let err = handler
            .on_payment_outcome(notification(&r, PaymentOutcome::Failed, "gw-2"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_transition());
        assert!(fx.booking.get_reservation(r.id).await.unwrap().is_paid);
    }

    #[tokio::test]
    async fn payment_racing_expiry_has_one_winner() {
        for _ in 0..10 {
            let fx = fixture();
            let handler = Arc::new(handler(&fx));
            let r = pending(&fx).await;
            fx.clock.advance(Duration::minutes(15));

            let pay = {
                let handler = handler.clone();
                let n = notification(&r, PaymentOutcome::Succeeded, "gw-1");
                tokio::spawn(async move { handler.on_payment_outcome(n).await })
            };
            let expire = {
                let booking = fx.booking.clone();
                let id = r.id;
                tokio::spawn(async move { booking.expire(id).await })
            };

            let paid = pay.await.unwrap();
            let expired = expire.await.unwrap();
            assert!(paid.is_ok() != expired.is_ok());

            let stored = fx.booking.get_reservation(r.id).await.unwrap();
            if paid.is_ok() {
                assert_eq!(stored.status, ReservationStatus::Confirmed);
                assert!(stored.is_paid);
            } else {
                assert_eq!(stored.status, ReservationStatus::Expired);
                assert!(!stored.is_paid);
            }
            assert_eq!(fx.booking.transition_log(r.id).await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn transient_store_failures_are_retried() {
        let fx = fixture();
        let handler = handler(&fx);
        let r = pending(&fx).await;

        fx.repos.reservation_store().fail_next(2);
        let outcome = handler
            .on_payment_outcome(notification(&r, PaymentOutcome::Succeeded, "gw-1"))
            .await
            .unwrap();
        assert_eq!(outcome.reservation().status, ReservationStatus::Confirmed);
    }

    #[tokio::test]
    async fn unknown_reservation_is_not_found() {
        let fx = fixture();
        let handler = handler(&fx);
        let err = handler
            .on_payment_outcome(PaymentNotification {
                reservation_id: Uuid::new_v4(),
                outcome: PaymentOutcome::Succeeded,
                amount: 1,
                gateway_ref: "gw-1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
