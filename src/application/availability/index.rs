//! Connector availability index
//!
//! In-memory view of which windows each connector is held for. Derived from
//! the reservation store and rebuildable from it at any time; only the
//! booking service feeds it, right after the store write it mirrors.

use std::collections::BTreeMap;
use std::ops::Bound;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::{DomainResult, Reservation, ReservationRepository, ReservationStatus, TimeWindow};

/// One occupying reservation as seen by the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hold {
    pub reservation_id: Uuid,
    pub window: TimeWindow,
    pub status: ReservationStatus,
}

type HoldKey = (DateTime<Utc>, Uuid);

/// Per-connector holds ordered by window start.
///
/// Holds on one connector never overlap, so ordering by start also orders
/// them by end. A lookup seeks to the last hold starting before the query
/// ends and walks backwards until a hold ends at or before the query
/// starts: O(log n + k).
#[derive(Default)]
pub struct AvailabilityIndex {
    connectors: DashMap<String, BTreeMap<HoldKey, Hold>>,
}

impl AvailabilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self, connector_id: &str, window: &TimeWindow) -> bool {
        let mut free = true;
        self.scan(connector_id, window, |_| {
            free = false;
            false
        });
        free
    }

    /// Holds overlapping `window`, ordered by start.
    pub fn conflicts(&self, connector_id: &str, window: &TimeWindow) -> Vec<Hold> {
        let mut found = Vec::new();
        self.scan(connector_id, window, |hold| {
            found.push(hold.clone());
            true
        });
        found.reverse();
        found
    }

    /// All holds on a connector, ordered by start.
    pub fn holds(&self, connector_id: &str) -> Vec<Hold> {
        self.connectors
            .get(connector_id)
            .map(|holds| holds.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Mirror the stored state of `reservation`: occupying statuses are
    /// (re)inserted, everything else is removed.
    pub fn apply(&self, reservation: &Reservation) {
        let key = (reservation.window.start(), reservation.id);

        if reservation.occupies_slot() {
            self.connectors
                .entry(reservation.connector_id.clone())
                .or_default()
                .insert(
                    key,
                    Hold {
                        reservation_id: reservation.id,
                        window: reservation.window,
                        status: reservation.status,
                    },
                );
        } else if let Some(mut holds) = self.connectors.get_mut(&reservation.connector_id) {
            holds.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.connectors.iter().map(|holds| holds.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole index with the occupying reservations in the store.
    pub async fn rebuild(&self, store: &dyn ReservationRepository) -> DomainResult<usize> {
        let occupying = store.find_occupying().await?;

        self.connectors.clear();
        for reservation in &occupying {
            self.apply(reservation);
        }

        info!(holds = occupying.len(), "Availability index rebuilt");
        Ok(occupying.len())
    }

    /// Visit overlapping holds from the latest start backwards while
    /// `visit` returns true.
    fn scan(&self, connector_id: &str, window: &TimeWindow, mut visit: impl FnMut(&Hold) -> bool) {
        let Some(holds) = self.connectors.get(connector_id) else {
            return;
        };

        let upper = Bound::Excluded((window.end(), Uuid::nil()));
        for hold in holds.range((Bound::Unbounded, upper)).rev().map(|(_, hold)| hold) {
            if hold.window.end() <= window.start() {
                break;
            }
            if hold.window.overlaps(window) && !visit(hold) {
                break;
            }
        }
    }
}
