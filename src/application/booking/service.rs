//! Booking Service
//!
//! Creates reservations and answers queries about them. Status transitions
//! live in `lifecycle.rs`; both halves share the per-connector locks below.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::policy::BookingPolicy;
use crate::application::availability::{AvailabilityIndex, Hold};
use crate::application::events::SharedEventBus;
use crate::domain::reservation::{credential, IssuedCredential};
use crate::domain::{
    BookingRequest, DomainError, DomainResult, Reservation, SharedRepositories, TimeWindow,
    TransitionRecord,
};
use crate::shared::SharedClock;

/// What the caller gets back from a successful booking.
///
/// The clear access token only exists here; the store keeps its hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub reservation: Reservation,
    pub access_token: String,
    pub credential_payload: String,
}

pub struct BookingService {
    pub(super) repos: SharedRepositories,
    pub(super) index: Arc<AvailabilityIndex>,
    pub(super) events: SharedEventBus,
    pub(super) clock: SharedClock,
    pub(super) policy: BookingPolicy,
    connector_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl BookingService {
    pub fn new(
        repos: SharedRepositories,
        index: Arc<AvailabilityIndex>,
        events: SharedEventBus,
        clock: SharedClock,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            repos,
            index,
            events,
            clock,
            policy,
            connector_locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    pub fn index(&self) -> &Arc<AvailabilityIndex> {
        &self.index
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn repositories(&self) -> &SharedRepositories {
        &self.repos
    }

    /// Serializes every write that touches one connector's slot map.
    pub(super) fn connector_lock(&self, connector_id: &str) -> Arc<Mutex<()>> {
        self.connector_locks
            .entry(connector_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Hold a connector for a window and open the payment grace period.
    pub async fn create_reservation(&self, request: BookingRequest) -> DomainResult<BookingReceipt> {
        let now = self.clock.now();
        self.policy.validate_window(&request.window, now)?;

        let connector = self
            .repos
            .connectors()
            .get_connector(&request.connector_id)
            .await?
            .filter(|c| c.station_id == request.station_id)
            .ok_or_else(|| DomainError::ConnectorNotFound(request.connector_id.clone()))?;

        let vehicle = self
            .repos
            .vehicles()
            .get_vehicle(&request.vehicle_id)
            .await?
            .ok_or_else(|| DomainError::VehicleNotFound(request.vehicle_id.clone()))?;

        if vehicle.owner_id != request.user_id {
            return Err(DomainError::Forbidden(format!(
                "vehicle {} does not belong to user {}",
                vehicle.id, request.user_id
            )));
        }
        if !vehicle.supports(connector.standard) {
            return Err(DomainError::VehicleIncompatible {
                vehicle_id: vehicle.id,
                standard: connector.standard,
            });
        }

        let estimated_cost = connector
            .pricing
            .estimate(&request.window, connector.max_power_kw)?;
        let currency = if connector.pricing.currency.is_empty() {
            self.policy.default_currency.clone()
        } else {
            connector.pricing.currency.clone()
        };

        let issued = IssuedCredential::generate();
        let reservation = Reservation::new_pending(
            request,
            estimated_cost,
            currency,
            issued.token_hash.clone(),
            now,
            self.policy.payment_deadline(now),
        );
        let initial = TransitionRecord::new(
            reservation.status,
            now,
            Some("slot held, awaiting payment".to_string()),
        );

        let lock = self.connector_lock(&reservation.connector_id);
        {
            let _guard = lock.lock().await;

            let conflicts = self.index.conflicts(&reservation.connector_id, &reservation.window);
            if !conflicts.is_empty() {
                return Err(self.slot_unavailable(&reservation, conflicts));
            }

            // The store re-checks inside its own transaction
            if let Err(e) = self
                .repos
                .reservations()
                .insert_if_free(&reservation, &initial)
                .await
            {
                if matches!(e, DomainError::SlotUnavailable { .. }) {
                    metrics::counter!("booking_rejections_total", "reason" => "slot_unavailable")
                        .increment(1);
                    warn!(
                        connector_id = %reservation.connector_id,
                        window = %reservation.window,
                        "Store reported a conflict the index did not see"
                    );
                }
                return Err(e);
            }

            self.index.apply(&reservation);
        }

        metrics::counter!("booking_reservations_created_total").increment(1);
        info!(
            reservation_id = %reservation.id,
            user_id = %reservation.user_id,
            connector_id = %reservation.connector_id,
            window = %reservation.window,
            estimated_cost = reservation.estimated_cost,
            "Reservation created"
        );

        self.events.publish_created(&reservation);

        let credential_payload = credential::scannable_payload(&reservation, &issued.token)?;
        Ok(BookingReceipt {
            reservation,
            access_token: issued.token,
            credential_payload,
        })
    }

    fn slot_unavailable(&self, reservation: &Reservation, conflicts: Vec<Hold>) -> DomainError {
        metrics::counter!("booking_rejections_total", "reason" => "slot_unavailable").increment(1);
        debug!(
            connector_id = %reservation.connector_id,
            window = %reservation.window,
            conflicts = conflicts.len(),
            "Slot unavailable"
        );
        DomainError::SlotUnavailable {
            connector_id: reservation.connector_id.clone(),
            conflicts: conflicts.into_iter().map(|h| h.reservation_id).collect(),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_available(&self, connector_id: &str, window: &TimeWindow) -> bool {
        self.index.is_available(connector_id, window)
    }

    pub fn list_conflicts(&self, connector_id: &str, window: &TimeWindow) -> Vec<Hold> {
        self.index.conflicts(connector_id, window)
    }

    /// Current holds on a connector, ordered by start
    pub fn connector_schedule(&self, connector_id: &str) -> Vec<Hold> {
        self.index.holds(connector_id)
    }

    pub async fn get_reservation(&self, id: Uuid) -> DomainResult<Reservation> {
        self.repos
            .reservations()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::reservation_not_found(id))
    }

    pub async fn list_user_reservations(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        self.repos.reservations().find_for_user(user_id).await
    }

    pub async fn transition_log(&self, id: Uuid) -> DomainResult<Vec<TransitionRecord>> {
        // Distinguish "unknown id" from "no history"
        self.get_reservation(id).await?;
        self.repos.reservations().transition_log(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::clock::Clock;
    use crate::application::booking::testing::{fixture, request};
    use crate::domain::{CredentialState, ReservationStatus};
    use chrono::Duration;

    #[tokio::test]
    async fn creates_pending_reservation_with_deadline() {
        let fx = fixture();
        let mut events = fx.events.subscribe();

        let receipt = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-1", 120, 60))
            .await
            .unwrap();

        let r = &receipt.reservation;
        assert_eq!(r.status, ReservationStatus::Pending);
        assert!(!r.is_paid);
        assert_eq!(r.payment_deadline, Some(fx.clock.now() + Duration::minutes(15)));
        assert_eq!(r.credential, CredentialState::Inactive);
        assert_eq!(r.currency, "UZS");
        assert!(r.estimated_cost > 0);

        assert_eq!(credential::hash_token(&receipt.access_token), r.access_token_hash);
        assert_eq!(
            credential::token_from_payload(&receipt.credential_payload).unwrap(),
            receipt.access_token
        );

        let stored = fx.booking.get_reservation(r.id).await.unwrap();
        assert_eq!(stored.id, r.id);
        assert!(!fx.booking.is_available("CN-1", &r.window));

        let log = fx.booking.transition_log(r.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, ReservationStatus::Pending);

        let message = events.try_recv().unwrap();
        assert_eq!(message.event.event_type(), "reservation_created");
    }

    #[tokio::test]
    async fn out_of_range_pricing_is_rejected_without_holding_the_slot() {
        let fx = fixture();
        fx.repos.add_connector(crate::domain::Connector {
            id: "CN-9".into(),
            station_id: "ST-1".into(),
            standard: crate::domain::ConnectorStandard::Ccs2,
            max_power_kw: 150.0,
            pricing: crate::domain::ConnectorPricing {
                price_per_kwh: 0,
                price_per_minute: i64::MAX,
                session_fee: 0,
                currency: "UZS".into(),
            },
        });

        let req = request("user-1", "VH-1", "CN-9", 120, 60);
        let window = req.window;
        let err = fx.booking.create_reservation(req).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(fx.booking.is_available("CN-9", &window));
        assert!(fx.booking.list_user_reservations("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlapping_request_is_rejected_with_conflicts() {
        let fx = fixture();
        let first = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-1", 120, 60))
            .await
            .unwrap();

        let err = fx
            .booking
            .create_reservation(request("user-2", "VH-2", "CN-1", 150, 60))
            .await
            .unwrap_err();

        match err {
            DomainError::SlotUnavailable { connector_id, conflicts } => {
                assert_eq!(connector_id, "CN-1");
                assert_eq!(conflicts, vec![first.reservation.id]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn adjacent_window_is_accepted() {
        let fx = fixture();
        fx.booking
            .create_reservation(request("user-1", "VH-1", "CN-1", 120, 60))
            .await
            .unwrap();

        assert!(fx
            .booking
            .create_reservation(request("user-2", "VH-2", "CN-1", 180, 60))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejects_invalid_window() {
        let fx = fixture();
        let err = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-1", -10, 60))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::WindowInvalid(_)));

        let err = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-1", 60, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::WindowInvalid(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_connector_and_vehicle() {
        let fx = fixture();

        let err = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-404", 60, 60))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ConnectorNotFound(id) if id == "CN-404"));

        let err = fx
            .booking
            .create_reservation(request("user-1", "VH-404", "CN-1", 60, 60))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::VehicleNotFound(id) if id == "VH-404"));
    }

    #[tokio::test]
    async fn connector_on_another_station_is_not_found() {
        let fx = fixture();
        let mut req = request("user-1", "VH-1", "CN-1", 60, 60);
        req.station_id = "ST-9".into();

        let err = fx.booking.create_reservation(req).await.unwrap_err();
        assert!(matches!(err, DomainError::ConnectorNotFound(_)));
    }

    #[tokio::test]
    async fn rejects_incompatible_vehicle() {
        let fx = fixture();
        // CN-2 is CHAdeMO, VH-1 is CCS2/Type2 only
        let err = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-2", 60, 60))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::VehicleIncompatible { .. }));
        assert!(fx.booking.index().is_empty());
    }

    #[tokio::test]
    async fn rejects_vehicle_of_another_user() {
        let fx = fixture();
        let err = fx
            .booking
            .create_reservation(request("user-2", "VH-1", "CN-1", 60, 60))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_slot_have_one_winner() {
        let fx = fixture();
        let mut handles = Vec::new();

        for i in 0..16 {
            let booking = fx.booking.clone();
            let (user, vehicle) = if i % 2 == 0 { ("user-1", "VH-1") } else { ("user-2", "VH-2") };
            handles.push(tokio::spawn(async move {
                booking
                    .create_reservation(request(user, vehicle, "CN-1", 120, 60 + i))
                    .await
            }));
        }

        let mut won = 0;
        let mut lost = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(DomainError::SlotUnavailable { .. }) => lost += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(won, 1);
        assert_eq!(lost, 15);
        assert_eq!(fx.booking.connector_schedule("CN-1").len(), 1);
    }

    #[tokio::test]
    async fn store_conflict_is_reported_even_when_index_is_stale() {
        let fx = fixture();
        let receipt = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-1", 120, 60))
            .await
            .unwrap();

        // Simulate a restart that lost the in-memory index
        let stale = AvailabilityIndex::new();
        assert!(stale.is_available("CN-1", &receipt.reservation.window));
        let booking = fx.rebuild_service_with_index(Arc::new(stale));

        let err = booking
            .create_reservation(request("user-2", "VH-2", "CN-1", 120, 60))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SlotUnavailable { .. }));
    }

    #[tokio::test]
    async fn lists_user_reservations_newest_first() {
        let fx = fixture();
        let first = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-1", 120, 60))
            .await
            .unwrap();
        fx.clock.advance(Duration::minutes(1));
        let second = fx
            .booking
            .create_reservation(request("user-1", "VH-1", "CN-1", 240, 60))
            .await
            .unwrap();

        let listed = fx.booking.list_user_reservations("user-1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.reservation.id, first.reservation.id]);

        assert!(fx.booking.list_user_reservations("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_reservation_is_not_found() {
        let fx = fixture();
        let err = fx.booking.get_reservation(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(fx.booking.transition_log(Uuid::new_v4()).await.is_err());
    }
}
