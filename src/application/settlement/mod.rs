//! Payment settlement

pub mod handler;

pub use handler::{SettlementHandler, SettlementOutcome};
