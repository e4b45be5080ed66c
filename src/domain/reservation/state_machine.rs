//! Reservation state machine
//!
//! ```text
//! PENDING ──payment ok──▶ CONFIRMED ──check-in──▶ CHECKED_IN ──session end──▶ COMPLETED
//!    │                        │                       │
//!    ├─declined/cancel─▶ CANCELED ◀──cancel──┘        └──no charging──▶ NO_SHOW
//!    └─deadline──▶ EXPIRED
//! ```
//!
//! [`apply`] is pure: it computes the next version of a reservation and the
//! log entry to append. Persisting it atomically against the expected source
//! status is the repository's job.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{CredentialState, Reservation, ReservationStatus, TransitionRecord};
use crate::shared::errors::{DomainError, DomainResult};

/// Something that happened to a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReservationEvent {
    PaymentSucceeded,
    PaymentDeclined,
    UserCanceled,
    DeadlinePassed,
    CheckedIn,
    /// Charger reported energy flow; stamps the reservation, no status change
    ChargingStarted,
    SessionCompleted,
    NoShowDetected,
}

impl ReservationEvent {
    pub const ALL: [ReservationEvent; 8] = [
        Self::PaymentSucceeded,
        Self::PaymentDeclined,
        Self::UserCanceled,
        Self::DeadlinePassed,
        Self::CheckedIn,
        Self::ChargingStarted,
        Self::SessionCompleted,
        Self::NoShowDetected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentDeclined => "payment_declined",
            Self::UserCanceled => "user_canceled",
            Self::DeadlinePassed => "deadline_passed",
            Self::CheckedIn => "checked_in",
            Self::ChargingStarted => "charging_started",
            Self::SessionCompleted => "session_completed",
            Self::NoShowDetected => "no_show_detected",
        }
    }
}

impl std::fmt::Display for ReservationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition graph. `None` means the event is not allowed.
pub fn next_status(from: ReservationStatus, event: ReservationEvent) -> Option<ReservationStatus> {
    use ReservationEvent as E;
    use ReservationStatus as S;

    match (from, event) {
        (S::Pending, E::PaymentSucceeded) => Some(S::Confirmed),
        (S::Pending, E::PaymentDeclined) => Some(S::Canceled),
        (S::Pending, E::UserCanceled) => Some(S::Canceled),
        (S::Pending, E::DeadlinePassed) => Some(S::Expired),
        (S::Confirmed, E::CheckedIn) => Some(S::CheckedIn),
        (S::Confirmed, E::UserCanceled) => Some(S::Canceled),
        (S::CheckedIn, E::SessionCompleted) => Some(S::Completed),
        (S::CheckedIn, E::NoShowDetected) => Some(S::NoShow),
        _ => None,
    }
}

/// Input for one transition
#[derive(Debug, Clone)]
pub struct Transition {
    pub event: ReservationEvent,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
    pub actual_cost: Option<i64>,
    pub payment_ref: Option<String>,
}

impl Transition {
    pub fn new(event: ReservationEvent, at: DateTime<Utc>) -> Self {
        Self {
            event,
            at,
            note: None,
            actual_cost: None,
            payment_ref: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_actual_cost(mut self, cost: i64) -> Self {
        self.actual_cost = Some(cost);
        self
    }

    pub fn with_payment_ref(mut self, gateway_ref: impl Into<String>) -> Self {
        self.payment_ref = Some(gateway_ref.into());
        self
    }
}

/// Compute the next version of `reservation` for `transition`.
pub fn apply(
    reservation: &Reservation,
    transition: &Transition,
) -> DomainResult<(Reservation, TransitionRecord)> {
    let reject = || DomainError::InvalidTransition {
        reservation_id: reservation.id,
        from: reservation.status,
        event: transition.event,
    };

    let to = next_status(reservation.status, transition.event).ok_or_else(reject)?;

    match transition.event {
        ReservationEvent::DeadlinePassed if !reservation.is_overdue(transition.at) => {
            return Err(reject());
        }
        ReservationEvent::SessionCompleted => match transition.actual_cost {
            Some(cost) if cost >= 0 => {}
            Some(cost) => {
                return Err(DomainError::Validation(format!(
                    "actual cost must not be negative, got {}",
                    cost
                )))
            }
            None => {
                return Err(DomainError::Validation(
                    "actual cost is required to complete a session".into(),
                ))
            }
        },
        _ => {}
    }

    let mut next = reservation.clone();
    next.status = to;
    next.updated_at = transition.at;
    if let Some(gateway_ref) = &transition.payment_ref {
        next.payment_ref = Some(gateway_ref.clone());
    }

    match to {
        ReservationStatus::Confirmed => {
            next.payment_deadline = None;
            next.is_paid = true;
            next.credential = CredentialState::Active;
        }
        ReservationStatus::CheckedIn => {
            next.checked_in_at = Some(transition.at);
        }
        ReservationStatus::Completed => {
            next.actual_cost = transition.actual_cost;
            next.credential = CredentialState::Revoked;
        }
        ReservationStatus::Canceled | ReservationStatus::Expired | ReservationStatus::NoShow => {
            next.payment_deadline = None;
            next.credential = CredentialState::Revoked;
        }
        ReservationStatus::Pending => {}
    }

    debug_assert!(next.deadline_consistent());

    let record = TransitionRecord::new(to, transition.at, transition.note.clone());
    Ok((next, record))
}
