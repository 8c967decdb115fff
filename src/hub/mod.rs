//! Room-based fan-out for connected realtime clients.
//!
//! ```text
//! Lifecycle / ws inbound
//!         │ order_created / order_status_changed / chat / location
//!         ▼
//!        Hub ── registry (one lock) ──┬── rooms: Room → {ConnectionId}
//!                                     ├── connections: ConnectionId → rooms + outbound tx
//!                                     ▼
//!                        per-connection unbounded channel → ws writer task
//! ```
//!
//! Join, leave and emit all take the registry lock, so a join is atomic with
//! respect to delivery and every connection sees events in emission order.
//! There is no backlog: a client only receives what is emitted after it joins.

pub mod events;
pub mod notifications;

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::models::driver::DriverLocation;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::Role;
use crate::observability::metrics::Metrics;

pub use events::{ClientEvent, Room, ServerEvent, Target};
use notifications::{NotificationKind, NotificationLedger};

pub type ConnectionId = Uuid;

struct Connection {
    tx: mpsc::UnboundedSender<ServerEvent>,
    rooms: HashSet<Room>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<Room, HashSet<ConnectionId>>,
}

pub struct Hub {
    registry: Mutex<Registry>,
    ledger: NotificationLedger,
    metrics: Metrics,
}

impl Hub {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            ledger: NotificationLedger::new(),
            metrics,
        }
    }

    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        self.registry.lock().connections.insert(
            id,
            Connection {
                tx,
                rooms: HashSet::new(),
            },
        );
        self.metrics.hub_connections.inc();
        debug!(connection_id = %id, "hub connection registered");

        (id, rx)
    }

    /// Drops the connection and releases every room it held.
    pub fn disconnect(&self, id: ConnectionId) {
        let mut registry = self.registry.lock();
        let Some(connection) = registry.connections.remove(&id) else {
            return;
        };

        for room in connection.rooms {
            if let Some(members) = registry.rooms.get_mut(&room) {
                members.remove(&id);
                if members.is_empty() {
                    registry.rooms.remove(&room);
                }
            }
        }
        self.metrics.hub_connections.dec();
        debug!(connection_id = %id, "hub connection released");
    }

    /// Returns `false` if the connection is unknown.
    pub fn join(&self, id: ConnectionId, room: Room) -> bool {
        let mut registry = self.registry.lock();
        let Some(connection) = registry.connections.get_mut(&id) else {
            return false;
        };

        connection.rooms.insert(room);
        registry.rooms.entry(room).or_default().insert(id);
        true
    }

    pub fn leave(&self, id: ConnectionId, room: Room) {
        let mut registry = self.registry.lock();
        if let Some(connection) = registry.connections.get_mut(&id) {
            connection.rooms.remove(&room);
        }
        if let Some(members) = registry.rooms.get_mut(&room) {
            members.remove(&id);
            if members.is_empty() {
                registry.rooms.remove(&room);
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.registry.lock().connections.len()
    }

    pub fn room_size(&self, room: Room) -> usize {
        self.registry
            .lock()
            .rooms
            .get(&room)
            .map_or(0, HashSet::len)
    }

    /// Delivers `event` to the union of `targets`, at most once per connection.
    /// Returns the number of connections it was queued for.
    pub fn emit(&self, targets: &[Target], event: ServerEvent) -> usize {
        let registry = self.registry.lock();

        let recipients: HashSet<ConnectionId> = if targets.contains(&Target::All) {
            registry.connections.keys().copied().collect()
        } else {
            targets
                .iter()
                .filter_map(|target| match target {
                    Target::Room(room) => registry.rooms.get(room),
                    Target::All => None,
                })
                .flatten()
                .copied()
                .collect()
        };

        let mut delivered = 0;
        for id in &recipients {
            if let Some(connection) = registry.connections.get(id) {
                // a closed receiver is cleaned up by disconnect
                if connection.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        self.metrics
            .hub_events_total
            .with_label_values(&[event.event])
            .inc();
        delivered
    }

    /// Sends to a single connection, outside any room.
    pub fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let registry = self.registry.lock();
        registry
            .connections
            .get(&id)
            .is_some_and(|connection| connection.tx.send(event).is_ok())
    }

    /// Point-to-point notification to one user's room.
    pub fn notify_user(&self, user_id: u64, title: &str, body: &str) -> usize {
        self.notify(Room::User(user_id), title, body, None)
    }

    pub fn order_created(&self, order: &Order, product_name: &str) {
        let approvers = [Target::Room(Room::Role(Role::Approver))];
        self.emit(
            &approvers,
            ServerEvent::new(events::ORDER_NEW, json!({ "order": order })),
        );

        if self.ledger.mark_sent(order.id, NotificationKind::NewOrder) {
            let (title, body) = notifications::new_order_message(order, product_name);
            self.notify(Room::Role(Role::Approver), &title, &body, Some(order.id));
        }
    }

    /// Fans out a status change: a generic update to everyone (approvers and
    /// the assigned driver included), the full record to the consumer, and the
    /// derived notifications. Notifications already sent for this order and
    /// kind are not repeated.
    pub fn order_status_changed(&self, order: &Order) {
        let mut update_targets = vec![Target::All, Target::Room(Room::Role(Role::Approver))];
        if let Some(driver_id) = order.driver_id {
            if order.status == OrderStatus::Assigned {
                update_targets.push(Target::Room(Room::User(driver_id)));
            }
        }
        self.emit(
            &update_targets,
            ServerEvent::new(
                events::ORDER_UPDATED,
                json!({ "orderId": order.id, "status": order.status }),
            ),
        );

        let consumer = Room::User(order.consumer_id);
        self.emit(
            &[Target::Room(consumer)],
            ServerEvent::new(
                events::ORDER_STATUS_CHANGED,
                json!({ "orderId": order.id, "status": order.status, "order": order }),
            ),
        );

        if let Some((title, body)) = notifications::consumer_message(order) {
            if self
                .ledger
                .mark_sent(order.id, NotificationKind::Status(order.status))
            {
                self.notify(consumer, &title, &body, Some(order.id));
            }
        }

        if order.status == OrderStatus::Assigned {
            if let Some(driver_id) = order.driver_id {
                if self.ledger.mark_sent(order.id, NotificationKind::NewDelivery) {
                    let (title, body) = notifications::new_delivery_message(order);
                    self.notify(Room::User(driver_id), &title, &body, Some(order.id));
                }
            }
        }
    }

    /// Live chat delta, visible only to the order's room.
    pub fn chat_message(&self, order_id: u64, message: Value) -> usize {
        self.emit(
            &[Target::Room(Room::Order(order_id))],
            ServerEvent::new(
                events::CHAT_NEW_MESSAGE,
                json!({ "orderId": order_id, "message": message }),
            ),
        )
    }

    pub fn driver_location(&self, driver_id: u64, lat: f64, lng: f64) -> usize {
        self.emit(
            &[Target::All],
            ServerEvent::new(
                events::DRIVER_LOCATION_UPDATE,
                json!({ "driver_id": driver_id, "lat": lat, "lng": lng }),
            ),
        )
    }

    pub fn driver_location_row(&self, location: &DriverLocation) -> usize {
        self.driver_location(location.driver_id, location.lat, location.lng)
    }

    fn notify(&self, room: Room, title: &str, body: &str, order_id: Option<u64>) -> usize {
        let mut data = json!({ "title": title, "body": body });
        if let Some(order_id) = order_id {
            data["orderId"] = json!(order_id);
        }
        self.emit(
            &[Target::Room(room)],
            ServerEvent::new(events::NOTIFICATION, data),
        )
    }
}
