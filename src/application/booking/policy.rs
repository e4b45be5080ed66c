//! Booking rules applied before anything touches the store

use chrono::{DateTime, Duration, Utc};

use crate::domain::{DomainError, DomainResult, TimeWindow};

/// Runtime booking rules, projected from `[booking]` in the config file
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// How long a PENDING reservation waits for payment
    pub payment_grace: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    /// A CONFIRMED reservation can no longer be canceled this close to its start
    pub cancellation_cutoff: Duration,
    /// How long after check-in charging must start
    pub no_show_grace: Duration,
    /// Used when a connector carries no pricing currency
    pub default_currency: String,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            payment_grace: Duration::minutes(15),
            min_duration: Duration::minutes(30),
            max_duration: Duration::minutes(480),
            cancellation_cutoff: Duration::minutes(60),
            no_show_grace: Duration::minutes(15),
            default_currency: "UZS".to_string(),
        }
    }
}

impl BookingPolicy {
    /// The window must start in the future and last between the minimum
    /// and maximum booking durations.
    pub fn validate_window(&self, window: &TimeWindow, now: DateTime<Utc>) -> DomainResult<()> {
        if window.start() <= now {
            return Err(DomainError::WindowInvalid(format!(
                "window starts at {}, which is not in the future",
                window.start()
            )));
        }

        let duration = window.duration();
        if duration < self.min_duration {
            return Err(DomainError::WindowInvalid(format!(
                "duration {} min is below the minimum of {} min",
                duration.num_minutes(),
                self.min_duration.num_minutes()
            )));
        }
        if duration > self.max_duration {
            return Err(DomainError::WindowInvalid(format!(
                "duration {} min exceeds the maximum of {} min",
                duration.num_minutes(),
                self.max_duration.num_minutes()
            )));
        }

        Ok(())
    }

    pub fn payment_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.payment_grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 16, 8, 0, 0).unwrap()
    }

    #[test]
    fn accepts_future_window_within_bounds() {
        let policy = BookingPolicy::default();
        let window = TimeWindow::starting_at(now() + Duration::hours(2), 60).unwrap();
        assert!(policy.validate_window(&window, now()).is_ok());
    }

    #[test]
    fn rejects_window_starting_now_or_earlier() {
        let policy = BookingPolicy::default();
        let window = TimeWindow::starting_at(now(), 60).unwrap();
        assert!(matches!(
            policy.validate_window(&window, now()),
            Err(DomainError::WindowInvalid(_))
        ));
    }

    #[test]
    fn rejects_too_short_and_too_long() {
        let policy = BookingPolicy::default();
        let start = now() + Duration::hours(1);

        let short = TimeWindow::starting_at(start, 29).unwrap();
        assert!(policy.validate_window(&short, now()).is_err());

        let long = TimeWindow::starting_at(start, 481).unwrap();
        assert!(policy.validate_window(&long, now()).is_err());

        let max = TimeWindow::starting_at(start, 480).unwrap();
        assert!(policy.validate_window(&max, now()).is_ok());
    }
}
