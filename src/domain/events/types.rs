//! Booking events
//!
//! Facts about reservations, broadcast to notification and real-time
//! collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::reservation::{Reservation, ReservationStatus};

/// Event types for notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    ReservationCreated(ReservationCreatedEvent),
    ReservationStatusChanged(ReservationStatusChangedEvent),
    PaymentRejected(PaymentRejectedEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ReservationCreated(_) => "reservation_created",
            Event::ReservationStatusChanged(_) => "reservation_status_changed",
            Event::PaymentRejected(_) => "payment_rejected",
        }
    }

    pub fn reservation_id(&self) -> Uuid {
        match self {
            Event::ReservationCreated(e) => e.reservation_id,
            Event::ReservationStatusChanged(e) => e.reservation_id,
            Event::PaymentRejected(e) => e.reservation_id,
        }
    }

    pub fn connector_id(&self) -> Option<&str> {
        match self {
            Event::ReservationCreated(e) => Some(&e.connector_id),
            Event::ReservationStatusChanged(e) => Some(&e.connector_id),
            Event::PaymentRejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCreatedEvent {
    pub reservation_id: Uuid,
    pub user_id: String,
    pub station_id: String,
    pub connector_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub estimated_cost: i64,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

impl ReservationCreatedEvent {
    pub fn from_reservation(r: &Reservation) -> Self {
        Self {
            reservation_id: r.id,
            user_id: r.user_id.clone(),
            station_id: r.station_id.clone(),
            connector_id: r.connector_id.clone(),
            window_start: r.window.start(),
            window_end: r.window.end(),
            payment_deadline: r.payment_deadline,
            estimated_cost: r.estimated_cost,
            currency: r.currency.clone(),
            timestamp: r.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationStatusChangedEvent {
    pub reservation_id: Uuid,
    pub user_id: String,
    pub station_id: String,
    pub connector_id: String,
    pub old_status: ReservationStatus,
    pub new_status: ReservationStatus,
    pub is_paid: bool,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ReservationStatusChangedEvent {
    pub fn from_reservation(r: &Reservation, old_status: ReservationStatus, note: Option<String>) -> Self {
        Self {
            reservation_id: r.id,
            user_id: r.user_id.clone(),
            station_id: r.station_id.clone(),
            connector_id: r.connector_id.clone(),
            old_status,
            new_status: r.status,
            is_paid: r.is_paid,
            note,
            timestamp: r.updated_at,
        }
    }
}

/// A payment arrived for a reservation that can no longer take it
/// (expired or cancelled first). The gateway side must refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRejectedEvent {
    pub reservation_id: Uuid,
    pub gateway_ref: String,
    pub amount: i64,
    pub status: ReservationStatus,
    pub timestamp: DateTime<Utc>,
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
