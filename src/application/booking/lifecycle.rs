//! Reservation lifecycle operations
//!
//! Every status change goes through [`BookingService::transition`]: reload
//! under the connector lock, run the operation's guards against that fresh
//! copy, apply the state machine, then compare-and-set in the store. The
//! event bus only ever sees writes that committed. The index is re-synced
//! from the reloaded copy first, so a write that committed but reported an
//! error still releases or keeps its slot on the next attempt.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::service::BookingService;
use crate::domain::reservation::{credential, state_machine, Transition};
use crate::domain::{
    DomainError, DomainResult, PaymentOutcome, Reservation, ReservationEvent, ReservationStatus,
};

impl BookingService {
    /// Guarded transition of one reservation.
    ///
    /// `plan` sees the reservation as currently stored and the current time,
    /// and either describes the transition or rejects it.
    pub(crate) async fn transition<F>(&self, id: Uuid, plan: F) -> DomainResult<Reservation>
    where
        F: FnOnce(&Reservation, DateTime<Utc>) -> DomainResult<Transition>,
    {
        let connector_id = self.get_reservation(id).await?.connector_id;
        let lock = self.connector_lock(&connector_id);

        let (updated, previous, note) = {
            let _guard = lock.lock().await;

            let current = self.get_reservation(id).await?;
            self.index.apply(&current);

            let now = self.clock.now();
            let transition = plan(&current, now)?;
            let (updated, record) = state_machine::apply(&current, &transition)?;

            self.repos
                .reservations()
                .compare_and_set(&updated, current.status, Some(&record))
                .await?;
            self.index.apply(&updated);

            (updated, current.status, record.note)
        };

        metrics::counter!(
            "booking_transitions_total",
            "to" => updated.status.as_str()
        )
        .increment(1);
        info!(
            reservation_id = %updated.id,
            connector_id = %updated.connector_id,
            from = %previous,
            to = %updated.status,
            "Reservation status changed"
        );

        self.events.publish_status_change(&updated, previous, note);

        Ok(updated)
    }

    /// Cancel on behalf of the reservation's owner.
    ///
    /// PENDING can always be canceled. CONFIRMED only until the
    /// cancellation cutoff before the window starts.
    pub async fn cancel_reservation(
        &self,
        id: Uuid,
        requesting_user_id: &str,
    ) -> DomainResult<Reservation> {
        let cutoff = self.policy.cancellation_cutoff;

        self.transition(id, |current, now| {
            if current.user_id != requesting_user_id {
                return Err(DomainError::Forbidden(format!(
                    "reservation {} belongs to another user",
                    current.id
                )));
            }

            if current.status == ReservationStatus::Confirmed
                && current.window.start() - now <= cutoff
            {
                return Err(DomainError::CancellationWindowClosed {
                    reservation_id: current.id,
                    minutes_until_start: current.minutes_until_start(now),
                });
            }

            Ok(Transition::new(ReservationEvent::UserCanceled, now).with_note("canceled by user"))
        })
        .await
    }

    /// Check in with the clear access token.
    pub async fn check_in(&self, access_token: &str) -> DomainResult<Reservation> {
        let token_hash = credential::hash_token(access_token);
        let found = self
            .repos
            .reservations()
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Reservation",
                field: "access_token",
                value: "<redacted>".to_string(),
            })?;

        self.transition(found.id, |current, now| {
            if current.status == ReservationStatus::Confirmed && !current.window.contains(now) {
                return Err(DomainError::CheckInOutsideWindow {
                    reservation_id: current.id,
                });
            }
            Ok(Transition::new(ReservationEvent::CheckedIn, now).with_note("checked in at connector"))
        })
        .await
    }

    /// Check in with the payload a station scanned from the user's screen.
    pub async fn check_in_scanned(&self, payload: &str) -> DomainResult<Reservation> {
        let token = credential::token_from_payload(payload)?;
        self.check_in(&token).await
    }

    /// Stamp the moment the charger reported energy flow.
    ///
    /// Idempotent: a second report keeps the first timestamp. No status
    /// change and no log entry, but it keeps the reservation out of the
    /// no-show sweep.
    pub async fn record_charging_started(&self, id: Uuid) -> DomainResult<Reservation> {
        let connector_id = self.get_reservation(id).await?.connector_id;
        let lock = self.connector_lock(&connector_id);
        let _guard = lock.lock().await;

        let current = self.get_reservation(id).await?;
        if current.status != ReservationStatus::CheckedIn {
            return Err(DomainError::InvalidTransition {
                reservation_id: current.id,
                from: current.status,
                event: ReservationEvent::ChargingStarted,
            });
        }
        if current.charging_started_at.is_some() {
            debug!(reservation_id = %id, "Charging start already recorded");
            return Ok(current);
        }

        let now = self.clock.now();
        let mut updated = current.clone();
        updated.charging_started_at = Some(now);
        updated.updated_at = now;

        self.repos
            .reservations()
            .compare_and_set(&updated, current.status, None)
            .await?;

        info!(reservation_id = %id, connector_id = %updated.connector_id, "Charging started");
        Ok(updated)
    }

    /// Close a checked-in reservation with the final session cost.
    pub async fn complete_session(&self, id: Uuid, actual_cost: i64) -> DomainResult<Reservation> {
        self.transition(id, |_, now| {
            Ok(Transition::new(ReservationEvent::SessionCompleted, now)
                .with_actual_cost(actual_cost)
                .with_note(format!("session completed, cost {}", actual_cost)))
        })
        .await
    }

    /// Expire a PENDING reservation whose payment deadline has passed.
    pub async fn expire(&self, id: Uuid) -> DomainResult<Reservation> {
        self.transition(id, |_, now| {
            Ok(Transition::new(ReservationEvent::DeadlinePassed, now)
                .with_note("payment deadline passed"))
        })
        .await
    }

    /// Mark a checked-in reservation whose charging never started within
    /// the no-show grace period.
    pub async fn mark_no_show(&self, id: Uuid) -> DomainResult<Reservation> {
        let grace = self.policy.no_show_grace;

        self.transition(id, |current, now| {
            let overdue = current
                .checked_in_at
                .is_some_and(|checked_in| now - checked_in >= grace);
            if current.charging_started_at.is_some() || !overdue {
                return Err(DomainError::InvalidTransition {
                    reservation_id: current.id,
                    from: current.status,
                    event: ReservationEvent::NoShowDetected,
                });
            }
            Ok(Transition::new(ReservationEvent::NoShowDetected, now)
                .with_note("charging did not start after check-in"))
        })
        .await
    }

    /// PENDING -> CONFIRMED on a successful payment.
    pub async fn confirm_payment(
        &self,
        id: Uuid,
        gateway_ref: &str,
        amount: i64,
    ) -> DomainResult<Reservation> {
        self.transition(id, |current, now| {
            if amount != current.estimated_cost {
                warn!(
                    reservation_id = %current.id,
                    amount,
                    estimated_cost = current.estimated_cost,
                    "Paid amount differs from estimate"
                );
            }
            Ok(Transition::new(ReservationEvent::PaymentSucceeded, now)
                .with_payment_ref(gateway_ref)
                .with_note(format!("paid {} {} ({})", amount, current.currency, gateway_ref)))
        })
        .await
    }

    /// PENDING -> CANCELED on a failed or canceled payment.
    pub async fn decline_payment(
        &self,
        id: Uuid,
        gateway_ref: &str,
        outcome: PaymentOutcome,
    ) -> DomainResult<Reservation> {
        self.transition(id, |_, now| {
            Ok(Transition::new(ReservationEvent::PaymentDeclined, now)
                .with_payment_ref(gateway_ref)
                .with_note(format!("payment {} ({})", outcome, gateway_ref)))
        })
        .await
    }
}
