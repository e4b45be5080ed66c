//! Connector entity

use serde::{Deserialize, Serialize};

use crate::domain::window::TimeWindow;
use crate::shared::errors::{DomainError, DomainResult};

/// Physical plug standard of a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectorStandard {
    Type1,
    Type2,
    Ccs1,
    Ccs2,
    Chademo,
    GbT,
    Nacs,
}

impl ConnectorStandard {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type1 => "Type1",
            Self::Type2 => "Type2",
            Self::Ccs1 => "CCS1",
            Self::Ccs2 => "CCS2",
            Self::Chademo => "CHAdeMO",
            Self::GbT => "GB/T",
            Self::Nacs => "NACS",
        }
    }

    /// Case-insensitive parse of the names produced by [`Self::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "type1" => Some(Self::Type1),
            "type2" => Some(Self::Type2),
            "ccs1" => Some(Self::Ccs1),
            "ccs2" => Some(Self::Ccs2),
            "chademo" => Some(Self::Chademo),
            "gb/t" | "gbt" => Some(Self::GbT),
            "nacs" => Some(Self::Nacs),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectorStandard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connector price components, all in the smallest currency unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorPricing {
    pub price_per_kwh: i64,
    pub price_per_minute: i64,
    pub session_fee: i64,
    /// Currency code (ISO 4217)
    pub currency: String,
}

impl ConnectorPricing {
    /// Upper-bound cost of a window, assuming the connector delivers its
    /// rated power for the whole duration.
    ///
    /// Fails with `Validation` when the catalogue prices do not fit in i64.
    pub fn estimate(&self, window: &TimeWindow, max_power_kw: f64) -> DomainResult<i64> {
        let minutes = window.duration().num_minutes();
        let energy_kwh = max_power_kw.max(0.0) * minutes as f64 / 60.0;

        let energy_cost = (energy_kwh * self.price_per_kwh as f64).round();
        if !energy_cost.is_finite() || energy_cost.abs() >= i64::MAX as f64 {
            return Err(self.overflow());
        }

        minutes
            .checked_mul(self.price_per_minute)
            .and_then(|time_cost| time_cost.checked_add(energy_cost as i64))
            .and_then(|cost| cost.checked_add(self.session_fee))
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> DomainError {
        DomainError::Validation(format!(
            "connector pricing out of range (per kWh {}, per minute {}, session fee {})",
            self.price_per_kwh, self.price_per_minute, self.session_fee
        ))
    }
}

/// A bookable connector on a station
#[derive(Debug, Clone)]
pub struct Connector {
    pub id: String,
    pub station_id: String,
    pub standard: ConnectorStandard,
    /// Rated power in kW
    pub max_power_kw: f64,
    pub pricing: ConnectorPricing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn standard_parse_roundtrip() {
        for standard in [
            ConnectorStandard::Type1,
            ConnectorStandard::Type2,
            ConnectorStandard::Ccs1,
            ConnectorStandard::Ccs2,
            ConnectorStandard::Chademo,
            ConnectorStandard::GbT,
            ConnectorStandard::Nacs,
        ] {
            assert_eq!(ConnectorStandard::parse(standard.as_str()), Some(standard));
        }
        assert_eq!(ConnectorStandard::parse(" ccs2 "), Some(ConnectorStandard::Ccs2));
        assert_eq!(ConnectorStandard::parse("schuko"), None);
    }

    #[test]
    fn estimate_combines_all_components() {
        let pricing = ConnectorPricing {
            price_per_kwh: 2_500,
            price_per_minute: 100,
            session_fee: 5_000,
            currency: "UZS".into(),
        };
        let start = Utc.with_ymd_and_hms(2025, 6, 16, 10, 0, 0).unwrap();
        let window = TimeWindow::starting_at(start, 30).unwrap();

        // 50 kW for 30 min = 25 kWh
        let cost = pricing.estimate(&window, 50.0).unwrap();
        assert_eq!(cost, 25 * 2_500 + 30 * 100 + 5_000);
    }

    #[test]
    fn estimate_rejects_prices_that_overflow() {
        let start = Utc.with_ymd_and_hms(2025, 6, 16, 10, 0, 0).unwrap();
        let window = TimeWindow::starting_at(start, 60).unwrap();

        let per_minute = ConnectorPricing {
            price_per_kwh: 0,
            price_per_minute: i64::MAX / 2,
            session_fee: 0,
            currency: "UZS".into(),
        };
        assert!(matches!(
            per_minute.estimate(&window, 22.0),
            Err(DomainError::Validation(_))
        ));

        let fee = ConnectorPricing {
            price_per_kwh: 0,
            price_per_minute: 1,
            session_fee: i64::MAX,
            currency: "UZS".into(),
        };
        assert!(matches!(fee.estimate(&window, 22.0), Err(DomainError::Validation(_))));

        let energy = ConnectorPricing {
            price_per_kwh: i64::MAX,
            price_per_minute: 0,
            session_fee: 0,
            currency: "UZS".into(),
        };
        assert!(matches!(energy.estimate(&window, 350.0), Err(DomainError::Validation(_))));
    }
}
