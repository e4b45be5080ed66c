//! # Texnouz Booking
//!
//! Reservation lifecycle and payment settlement engine for EV charging
//! connectors.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Reservations, the lifecycle state machine, access
//!   credentials and the repository traits
//! - **application**: Booking, settlement, the availability index and the
//!   expiry / no-show sweepers
//! - **infrastructure**: SeaORM persistence and the in-memory store
//! - **runtime**: Startup, tracing, metrics and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod runtime;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use application::{
    create_event_bus, BookingService, Event, EventBus, EventScope, SettlementHandler,
    SharedEventBus,
};
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
pub use runtime::{init_tracing, BookingRuntime, RuntimeOptions};
