//! Background services

mod no_show_monitor;
mod reservation_expiry;
mod sweeper;

pub use no_show_monitor::{NoShowMonitor, NoShowSweep};
pub use reservation_expiry::{ExpiryScheduler, ExpirySweep};
pub use sweeper::{BackgroundSweeper, Sweep, SweepReport};
