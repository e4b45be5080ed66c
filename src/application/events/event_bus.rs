//! Reservation event bus
//!
//! Booking code publishes through the typed `publish_*` methods, so an
//! event is always built from the stored reservation it describes.
//! Publishing never blocks: a broadcast send either lands in the ring
//! buffer or is dropped when nobody listens. Slow subscribers lose the
//! oldest events instead of holding up a status transition.
//!
//! Subscribers pick a scope when they subscribe. A kiosk screen only
//! wants its connector, a user's session only wants its reservation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{
    Event, EventMessage, PaymentRejectedEvent, ReservationCreatedEvent,
    ReservationStatusChangedEvent,
};
use crate::domain::{Reservation, ReservationStatus};

const DEFAULT_CAPACITY: usize = 1024;

/// Which events a subscriber receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    All,
    Reservation(Uuid),
    /// Events carrying this connector id. Payment rejections carry none.
    Connector(String),
}

impl EventScope {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            EventScope::All => true,
            EventScope::Reservation(id) => event.reservation_id() == *id,
            EventScope::Connector(id) => event.connector_id() == Some(id.as_str()),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A reservation was inserted and now holds its slot.
    pub fn publish_created(&self, reservation: &Reservation) {
        self.send(Event::ReservationCreated(
            ReservationCreatedEvent::from_reservation(reservation),
        ));
    }

    /// `reservation` is the committed row; `previous` the status it left.
    pub fn publish_status_change(
        &self,
        reservation: &Reservation,
        previous: ReservationStatus,
        note: Option<String>,
    ) {
        self.send(Event::ReservationStatusChanged(
            ReservationStatusChangedEvent::from_reservation(reservation, previous, note),
        ));
    }

    /// A successful payment hit a reservation that can no longer take it.
    pub fn publish_payment_rejected(
        &self,
        reservation: &Reservation,
        gateway_ref: &str,
        amount: i64,
        at: DateTime<Utc>,
    ) {
        self.send(Event::PaymentRejected(PaymentRejectedEvent {
            reservation_id: reservation.id,
            gateway_ref: gateway_ref.to_string(),
            amount,
            status: reservation.status,
            timestamp: at,
        }));
    }

    fn send(&self, event: Event) {
        let message = EventMessage::new(event);
        let event_type = message.event.event_type();
        let reservation_id = message.event.reservation_id();

        match self.sender.send(message) {
            Ok(count) => debug!(event_type, %reservation_id, receivers = count, "Event published"),
            Err(_) => debug!(event_type, %reservation_id, "Event published (no subscribers)"),
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.subscribe_to(EventScope::All)
    }

    pub fn subscribe_to(&self, scope: EventScope) -> EventSubscriber {
        let receiver = self.sender.subscribe();
        let count = self.subscriber_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(total = count, scope = ?scope, "New event subscriber");

        EventSubscriber {
            receiver,
            scope,
            subscriber_count: self.subscriber_count.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<EventMessage>,
    scope: EventScope,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventSubscriber {
    pub fn scope(&self) -> &EventScope {
        &self.scope
    }

    /// Next event in scope; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if self.scope.matches(&msg.event) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(missed = count, "Subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive; `None` when nothing in scope is queued.
    pub fn try_recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(msg) if self.scope.matches(&msg.event) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(missed = count, "Subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        let prev = self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        info!(remaining = prev.saturating_sub(1), "Event subscriber disconnected");
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus(capacity: usize) -> SharedEventBus {
    Arc::new(EventBus::with_capacity(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::booking::testing::{request, t0};

    fn reservation(connector_id: &str) -> Reservation {
        let req = request("user-1", "VH-1", connector_id, 120, 60);
        Reservation::new_pending(req, 1000, "UZS", "hash", t0(), t0())
    }

    fn expired(connector_id: &str) -> Reservation {
        let mut r = reservation(connector_id);
        r.status = ReservationStatus::Expired;
        r
    }

    #[tokio::test]
    async fn status_change_carries_both_statuses() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();
        let r = expired("CN-1");

        bus.publish_status_change(&r, ReservationStatus::Pending, Some("payment window elapsed".into()));

        let received = tokio::time::timeout(std::time::Duration::from_millis(100), subscriber.recv())
            .await
            .expect("Timeout")
            .expect("No message");
        match received.event {
            Event::ReservationStatusChanged(e) => {
                assert_eq!(e.reservation_id, r.id);
                assert_eq!(e.old_status, ReservationStatus::Pending);
                assert_eq!(e.new_status, ReservationStatus::Expired);
                assert_eq!(e.note.as_deref(), Some("payment window elapsed"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn payment_rejection_reports_the_blocking_status() {
        let bus = EventBus::new();
        let mut subscriber = bus.subscribe();
        let r = expired("CN-1");
        let at = Utc::now();

        bus.publish_payment_rejected(&r, "gw-7", 1000, at);

        match subscriber.try_recv().map(|m| m.event) {
            Some(Event::PaymentRejected(e)) => {
                assert_eq!(e.gateway_ref, "gw-7");
                assert_eq!(e.status, ReservationStatus::Expired);
                assert_eq!(e.timestamp, at);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn scoped_subscribers_only_see_their_events() {
        let bus = EventBus::new();
        let a = reservation("CN-1");
        let b = reservation("CN-2");
        let mut by_connector = bus.subscribe_to(EventScope::Connector("CN-2".into()));
        let mut by_reservation = bus.subscribe_to(EventScope::Reservation(a.id));
        let mut everything = bus.subscribe();

        bus.publish_created(&a);
        bus.publish_created(&b);
        bus.publish_payment_rejected(&a, "gw-1", 1000, Utc::now());

        let ids = |sub: &mut EventSubscriber| {
            std::iter::from_fn(|| sub.try_recv())
                .map(|m| (m.event.event_type(), m.event.reservation_id()))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&mut by_connector), vec![("reservation_created", b.id)]);
        assert_eq!(
            ids(&mut by_reservation),
            vec![("reservation_created", a.id), ("payment_rejected", a.id)]
        );
        assert_eq!(ids(&mut everything).len(), 3);
    }

    #[test]
    fn publish_without_subscribers_does_not_fail() {
        let bus = EventBus::new();
        bus.publish_created(&reservation("CN-1"));
    }

    #[test]
    fn lagging_subscriber_keeps_latest() {
        let bus = EventBus::with_capacity(2);
        let mut subscriber = bus.subscribe();
        let r = reservation("CN-1");
        for _ in 0..5 {
            bus.publish_created(&r);
        }
        let mut received = 0;
        while subscriber.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[test]
    fn test_subscriber_count() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let sub1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _sub2 = bus.subscribe_to(EventScope::Connector("CN-1".into()));
        assert_eq!(bus.subscriber_count(), 2);

        drop(sub1);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
