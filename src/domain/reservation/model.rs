//! Reservation domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::window::TimeWindow;

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Slot held, waiting for payment until the deadline
    Pending,
    /// Paid; credential active
    Confirmed,
    /// Driver presented the credential at the station
    CheckedIn,
    /// Charging session finished
    Completed,
    /// Cancelled by the user or by a declined payment
    Canceled,
    /// Payment deadline passed without payment
    Expired,
    /// Checked in but never started charging
    NoShow,
}

impl ReservationStatus {
    /// Statuses that hold the connector for the reservation window.
    pub const OCCUPYING: [ReservationStatus; 3] = [Self::Pending, Self::Confirmed, Self::CheckedIn];

    pub const ALL: [ReservationStatus; 7] = [
        Self::Pending,
        Self::Confirmed,
        Self::CheckedIn,
        Self::Completed,
        Self::Canceled,
        Self::Expired,
        Self::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::CheckedIn => "CHECKED_IN",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
            Self::Expired => "EXPIRED",
            Self::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn occupies_slot(&self) -> bool {
        Self::OCCUPYING.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Canceled | Self::Expired | Self::NoShow
        )
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of the check-in credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialState {
    /// Issued at booking, not yet usable
    Inactive,
    /// Usable for check-in
    Active,
    /// Invalidated by a terminal status
    Revoked,
}

impl CredentialState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
            Self::Revoked => "REVOKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INACTIVE" => Some(Self::Inactive),
            "ACTIVE" => Some(Self::Active),
            "REVOKED" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// One entry of the append-only transition log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRecord {
    pub status: ReservationStatus,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

impl TransitionRecord {
    pub fn new(status: ReservationStatus, at: DateTime<Utc>, note: Option<String>) -> Self {
        Self { status, at, note }
    }
}

/// Client request for a connector hold
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub user_id: String,
    pub vehicle_id: String,
    pub station_id: String,
    pub connector_id: String,
    pub window: TimeWindow,
}

/// Connector reservation
#[derive(Debug, Clone, Serialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: String,
    pub vehicle_id: String,
    pub station_id: String,
    pub connector_id: String,
    pub window: TimeWindow,
    pub status: ReservationStatus,
    /// Set only while `status == Pending`
    pub payment_deadline: Option<DateTime<Utc>>,
    pub is_paid: bool,
    /// Smallest currency unit
    pub estimated_cost: i64,
    pub actual_cost: Option<i64>,
    pub currency: String,
    /// SHA-256 of the check-in token; the token itself is never stored
    #[serde(skip_serializing)]
    pub access_token_hash: String,
    pub credential: CredentialState,
    /// Gateway reference of the payment that settled this reservation
    pub payment_ref: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub charging_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new_pending(
        request: BookingRequest,
        estimated_cost: i64,
        currency: impl Into<String>,
        access_token_hash: impl Into<String>,
        now: DateTime<Utc>,
        payment_deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            vehicle_id: request.vehicle_id,
            station_id: request.station_id,
            connector_id: request.connector_id,
            window: request.window,
            status: ReservationStatus::Pending,
            payment_deadline: Some(payment_deadline),
            is_paid: false,
            estimated_cost,
            actual_cost: None,
            currency: currency.into(),
            access_token_hash: access_token_hash.into(),
            credential: CredentialState::Inactive,
            payment_ref: None,
            checked_in_at: None,
            charging_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this reservation currently holds its connector
    pub fn occupies_slot(&self) -> bool {
        self.status.occupies_slot()
    }

    /// Deadline present iff pending
    pub fn deadline_consistent(&self) -> bool {
        self.payment_deadline.is_some() == (self.status == ReservationStatus::Pending)
    }

    /// Pending, unpaid and past its payment deadline
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending
            && !self.is_paid
            && self.payment_deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn minutes_until_start(&self, now: DateTime<Utc>) -> i64 {
        (self.window.start() - now).num_minutes()
    }
}

// ── Tests ──────────────────────────────────────────────────────
