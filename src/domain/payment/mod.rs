//! Settlement gateway contract
//!
//! Payment records live with the gateway; the engine only consumes outcome
//! notifications.

pub mod model;

pub use model::{PaymentNotification, PaymentOutcome};
