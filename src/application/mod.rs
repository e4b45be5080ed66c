//! Application layer: booking, settlement, background sweeps and the
//! event bus they publish to.

pub mod availability;
pub mod booking;
pub mod events;
pub mod services;
pub mod settlement;

pub use availability::{AvailabilityIndex, Hold};
pub use booking::{BookingPolicy, BookingReceipt, BookingService};
pub use events::{create_event_bus, Event, EventBus, EventScope, EventSubscriber, SharedEventBus};
pub use services::{
    BackgroundSweeper, ExpiryScheduler, ExpirySweep, NoShowMonitor, NoShowSweep, Sweep,
    SweepReport,
};
pub use settlement::{SettlementHandler, SettlementOutcome};
