//! In-memory storage implementation
//!
//! Same atomicity contract as the database repositories, with a single
//! async write lock standing in for the transaction.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    Connector, ConnectorDirectory, DomainError, DomainResult, RepositoryProvider, Reservation,
    ReservationRepository, ReservationStatus, TimeWindow, TransitionRecord, Vehicle,
    VehicleDirectory,
};

/// In-memory reservation store for development and testing
#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: DashMap<Uuid, Reservation>,
    logs: DashMap<Uuid, Vec<TransitionRecord>>,
    write_lock: Mutex<()>,
    failures: AtomicU32,
    lost_acks: AtomicU32,
}

impl InMemoryReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with `StoreUnavailable`.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Let the next `count` status writes commit, then report
    /// `StoreUnavailable` as if the acknowledgement got lost.
    pub fn fail_after_commit(&self, count: u32) {
        self.lost_acks.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> DomainResult<()> {
        if take_one(&self.failures) {
            return Err(DomainError::StoreUnavailable("injected failure".into()));
        }
        Ok(())
    }

    fn overlapping(&self, connector_id: &str, window: &TimeWindow) -> Vec<Reservation> {
        self.collect(|r| {
            r.connector_id == connector_id && r.occupies_slot() && r.window.overlaps(window)
        })
    }

    fn collect(&self, filter: impl Fn(&Reservation) -> bool) -> Vec<Reservation> {
        self.reservations
            .iter()
            .filter(|e| filter(e.value()))
            .map(|e| e.value().clone())
            .collect()
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn insert_if_free(
        &self,
        reservation: &Reservation,
        initial: &TransitionRecord,
    ) -> DomainResult<()> {
        self.check_available()?;
        let _guard = self.write_lock.lock().await;

        let conflicts = self.overlapping(&reservation.connector_id, &reservation.window);
        if !conflicts.is_empty() {
            return Err(DomainError::SlotUnavailable {
                connector_id: reservation.connector_id.clone(),
                conflicts: conflicts.into_iter().map(|r| r.id).collect(),
            });
        }

        self.reservations.insert(reservation.id, reservation.clone());
        self.logs.insert(reservation.id, vec![initial.clone()]);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        updated: &Reservation,
        expected: ReservationStatus,
        record: Option<&TransitionRecord>,
    ) -> DomainResult<()> {
        self.check_available()?;
        let _guard = self.write_lock.lock().await;

        let current = self
            .reservations
            .get(&updated.id)
            .map(|r| r.status)
            .ok_or_else(|| DomainError::reservation_not_found(updated.id))?;

        if current != expected {
            return Err(DomainError::StatusConflict {
                reservation_id: updated.id,
                expected,
                actual: current,
            });
        }

        self.reservations.insert(updated.id, updated.clone());
        if let Some(record) = record {
            self.logs.entry(updated.id).or_default().push(record.clone());
        }
        if take_one(&self.lost_acks) {
            return Err(DomainError::StoreUnavailable("acknowledgement lost".into()));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>> {
        self.check_available()?;
        Ok(self.reservations.get(&id).map(|r| r.clone()))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DomainResult<Option<Reservation>> {
        self.check_available()?;
        Ok(self.collect(|r| r.access_token_hash == token_hash).into_iter().next())
    }

    async fn find_overlapping(
        &self,
        connector_id: &str,
        window: &TimeWindow,
    ) -> DomainResult<Vec<Reservation>> {
        self.check_available()?;
        let mut found = self.overlapping(connector_id, window);
        found.sort_by_key(|r| r.window.start());
        Ok(found)
    }

    async fn find_occupying(&self) -> DomainResult<Vec<Reservation>> {
        self.check_available()?;
        Ok(self.collect(|r| r.occupies_slot()))
    }

    async fn find_overdue_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        self.check_available()?;
        let mut found = self.collect(|r| r.is_overdue(now));
        found.sort_by_key(|r| r.payment_deadline);
        Ok(found)
    }

    async fn find_unstarted_check_ins(
        &self,
        checked_in_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>> {
        self.check_available()?;
        Ok(self.collect(|r| {
            r.status == ReservationStatus::CheckedIn
                && r.charging_started_at.is_none()
                && r.checked_in_at.is_some_and(|at| at <= checked_in_before)
        }))
    }

    async fn find_for_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        self.check_available()?;
        let mut found = self.collect(|r| r.user_id == user_id);
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn transition_log(&self, id: Uuid) -> DomainResult<Vec<TransitionRecord>> {
        self.check_available()?;
        Ok(self.logs.get(&id).map(|log| log.clone()).unwrap_or_default())
    }
}

/// Connector lookup backed by a map
#[derive(Default)]
pub struct InMemoryConnectorDirectory {
    connectors: DashMap<String, Connector>,
}

impl InMemoryConnectorDirectory {
    pub fn insert(&self, connector: Connector) {
        self.connectors.insert(connector.id.clone(), connector);
    }
}

#[async_trait]
impl ConnectorDirectory for InMemoryConnectorDirectory {
    async fn get_connector(&self, id: &str) -> DomainResult<Option<Connector>> {
        Ok(self.connectors.get(id).map(|c| c.clone()))
    }
}

/// Vehicle lookup backed by a map
#[derive(Default)]
pub struct InMemoryVehicleDirectory {
    vehicles: DashMap<String, Vehicle>,
}

impl InMemoryVehicleDirectory {
    pub fn insert(&self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id.clone(), vehicle);
    }
}

#[async_trait]
impl VehicleDirectory for InMemoryVehicleDirectory {
    async fn get_vehicle(&self, id: &str) -> DomainResult<Option<Vehicle>> {
        Ok(self.vehicles.get(id).map(|v| v.clone()))
    }
}

/// [`RepositoryProvider`] over the in-memory stores
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    reservations: InMemoryReservationRepository,
    connectors: InMemoryConnectorDirectory,
    vehicles: InMemoryVehicleDirectory,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connector(&self, connector: Connector) {
        self.connectors.insert(connector);
    }

    pub fn add_vehicle(&self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle);
    }

    pub fn reservation_store(&self) -> &InMemoryReservationRepository {
        &self.reservations
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn reservations(&self) -> &dyn ReservationRepository {
        &self.reservations
    }

    fn connectors(&self) -> &dyn ConnectorDirectory {
        &self.connectors
    }

    fn vehicles(&self) -> &dyn VehicleDirectory {
        &self.vehicles
    }
}
