//! Reservation repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{Reservation, ReservationStatus, TransitionRecord};
use crate::domain::window::TimeWindow;
use crate::domain::DomainResult;

/// Durable reservation store; the single source of truth.
///
/// The two write methods are the concurrency primitives of the engine and
/// must be atomic in every implementation.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert a new reservation together with its first log entry, unless
    /// an occupying reservation on the same connector overlaps its window.
    ///
    /// Fails with `SlotUnavailable` listing the conflicting ids.
    async fn insert_if_free(
        &self,
        reservation: &Reservation,
        initial: &TransitionRecord,
    ) -> DomainResult<()>;

    /// Replace the stored reservation with `updated` only if its current
    /// status is still `expected`, appending `record` to the log when given.
    ///
    /// Fails with `StatusConflict` when the status moved on, `NotFound`
    /// when the id is unknown.
    async fn compare_and_set(
        &self,
        updated: &Reservation,
        expected: ReservationStatus,
        record: Option<&TransitionRecord>,
    ) -> DomainResult<()>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>>;

    async fn find_by_token_hash(&self, token_hash: &str) -> DomainResult<Option<Reservation>>;

    /// Occupying reservations on a connector whose window overlaps `window`
    async fn find_overlapping(
        &self,
        connector_id: &str,
        window: &TimeWindow,
    ) -> DomainResult<Vec<Reservation>>;

    /// All occupying reservations (index rebuild)
    async fn find_occupying(&self) -> DomainResult<Vec<Reservation>>;

    /// Pending reservations with `payment_deadline <= now`
    async fn find_overdue_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>>;

    /// Checked-in reservations that never started charging and were
    /// checked in at or before `checked_in_before`
    async fn find_unstarted_check_ins(
        &self,
        checked_in_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>>;

    /// A user's reservations in any status, newest first
    async fn find_for_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>>;

    /// Transition log, oldest first
    async fn transition_log(&self, id: Uuid) -> DomainResult<Vec<TransitionRecord>>;
}
