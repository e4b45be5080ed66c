//! Station connectors
//!
//! Connectors are owned by the station catalogue; the booking engine only
//! reads them through [`ConnectorDirectory`].

pub mod model;
pub mod repository;

pub use model::{Connector, ConnectorPricing, ConnectorStandard};
pub use repository::ConnectorDirectory;
