//! Shared fixtures for application-layer tests

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::{BookingPolicy, BookingService};
use crate::application::availability::AvailabilityIndex;
use crate::application::events::{create_event_bus, SharedEventBus};
use crate::domain::{
    BookingRequest, Connector, ConnectorPricing, ConnectorStandard, TimeWindow, Vehicle,
};
use crate::infrastructure::storage::InMemoryRepositoryProvider;
use crate::shared::ManualClock;

pub(crate) struct Fixture {
    pub booking: Arc<BookingService>,
    pub repos: Arc<InMemoryRepositoryProvider>,
    pub clock: Arc<ManualClock>,
    pub events: SharedEventBus,
}

impl Fixture {
    /// A second service over the same store, clock and bus.
    pub fn rebuild_service_with_index(&self, index: Arc<AvailabilityIndex>) -> BookingService {
        BookingService::new(
            self.repos.clone(),
            index,
            self.events.clone(),
            self.clock.clone(),
            BookingPolicy::default(),
        )
    }

    /// Replace the service with one running under `policy`.
    pub fn with_policy(mut self, policy: BookingPolicy) -> Self {
        self.booking = Arc::new(BookingService::new(
            self.repos.clone(),
            Arc::new(AvailabilityIndex::new()),
            self.events.clone(),
            self.clock.clone(),
            policy,
        ));
        self
    }
}

/// 2025-06-16 08:00 UTC
pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 16, 8, 0, 0).unwrap()
}

pub(crate) fn pricing() -> ConnectorPricing {
    ConnectorPricing {
        price_per_kwh: 1_500,
        price_per_minute: 100,
        session_fee: 5_000,
        currency: "UZS".into(),
    }
}

/// Store with CN-1 (CCS2) and CN-2 (CHAdeMO) on ST-1, VH-1 owned by
/// user-1 and VH-2 owned by user-2, both CCS2.
pub(crate) fn fixture() -> Fixture {
    let repos = Arc::new(InMemoryRepositoryProvider::new());
    repos.add_connector(Connector {
        id: "CN-1".into(),
        station_id: "ST-1".into(),
        standard: ConnectorStandard::Ccs2,
        max_power_kw: 50.0,
        pricing: pricing(),
    });
    repos.add_connector(Connector {
        id: "CN-2".into(),
        station_id: "ST-1".into(),
        standard: ConnectorStandard::Chademo,
        max_power_kw: 50.0,
        pricing: pricing(),
    });
    repos.add_vehicle(Vehicle {
        id: "VH-1".into(),
        owner_id: "user-1".into(),
        label: Some("Model 3".into()),
        supported_standards: vec![ConnectorStandard::Ccs2, ConnectorStandard::Type2],
    });
    repos.add_vehicle(Vehicle {
        id: "VH-2".into(),
        owner_id: "user-2".into(),
        label: None,
        supported_standards: vec![ConnectorStandard::Ccs2],
    });

    let clock = ManualClock::shared(t0());
    let events = create_event_bus(64);
    let booking = Arc::new(BookingService::new(
        repos.clone(),
        Arc::new(AvailabilityIndex::new()),
        events.clone(),
        clock.clone(),
        BookingPolicy::default(),
    ));

    Fixture {
        booking,
        repos,
        clock,
        events,
    }
}

/// Booking on ST-1 starting `start_in` minutes after [`t0`].
pub(crate) fn request(
    user_id: &str,
    vehicle_id: &str,
    connector_id: &str,
    start_in: i64,
    minutes: i64,
) -> BookingRequest {
    BookingRequest {
        user_id: user_id.into(),
        vehicle_id: vehicle_id.into(),
        station_id: "ST-1".into(),
        connector_id: connector_id.into(),
        window: TimeWindow::starting_at(t0() + Duration::minutes(start_in), minutes).unwrap(),
    }
}
