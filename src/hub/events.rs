use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::user::Role;

pub const ORDER_NEW: &str = "order:new";
pub const ORDER_UPDATED: &str = "order:updated";
pub const ORDER_STATUS_CHANGED: &str = "order:status-changed";
pub const CHAT_NEW_MESSAGE: &str = "chat:new-message";
pub const DRIVER_LOCATION_UPDATE: &str = "driver:location-update";
pub const NOTIFICATION: &str = "notification";
pub const ERROR: &str = "error";

/// Outbound frame: `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServerEvent {
    pub event: &'static str,
    pub data: Value,
}

impl ServerEvent {
    pub fn new(event: &'static str, data: Value) -> Self {
        Self { event, data }
    }
}

/// Inbound frames a connected client may send.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join", rename_all = "camelCase")]
    Join { user_id: u64, role: Role },

    #[serde(rename = "join-order", rename_all = "camelCase")]
    JoinOrder { order_id: u64 },

    #[serde(rename = "leave-order", rename_all = "camelCase")]
    LeaveOrder { order_id: u64 },

    #[serde(rename = "chat:message", rename_all = "camelCase")]
    ChatMessage { order_id: u64, message: Value },

    #[serde(rename = "driver:location")]
    DriverLocation { driver_id: u64, lat: f64, lng: f64 },

    /// Sent by older clients after a successful create; re-driven from the store.
    #[serde(rename = "order:created", rename_all = "camelCase")]
    OrderCreated { order_id: u64 },

    /// Sent by older clients after a successful transition; any status or
    /// order payload they attach is ignored in favour of the stored record.
    #[serde(rename = "order:status", rename_all = "camelCase")]
    OrderStatus { order_id: u64 },
}

/// A named broadcast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    User(u64),
    Role(Role),
    Order(u64),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user:{id}"),
            Room::Role(role) => write!(f, "role:{}", role.as_str()),
            Room::Order(id) => write!(f, "order:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Every connected client.
    All,
    Room(Room),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ClientEvent, Room};
    use crate::models::user::Role;

    #[test]
    fn parses_join_and_location_frames() {
        let join: ClientEvent =
            serde_json::from_value(json!({"event": "join", "data": {"userId": 4, "role": "approver"}}))
                .unwrap();
        assert_eq!(
            join,
            ClientEvent::Join {
                user_id: 4,
                role: Role::Approver
            }
        );

        let location: ClientEvent = serde_json::from_value(json!({
            "event": "driver:location",
            "data": {"driver_id": 9, "lat": 41.0, "lng": 29.0}
        }))
        .unwrap();
        assert_eq!(
            location,
            ClientEvent::DriverLocation {
                driver_id: 9,
                lat: 41.0,
                lng: 29.0
            }
        );
    }

    #[test]
    fn legacy_status_frame_ignores_client_payload() {
        let frame: ClientEvent = serde_json::from_value(json!({
            "event": "order:status",
            "data": {"orderId": 3, "status": "delivered", "order": {"total_price": 0}}
        }))
        .unwrap();
        assert_eq!(frame, ClientEvent::OrderStatus { order_id: 3 });
    }

    #[test]
    fn room_names() {
        assert_eq!(Room::User(1).to_string(), "user:1");
        assert_eq!(Room::Role(Role::Approver).to_string(), "role:approver");
        assert_eq!(Room::Order(22).to_string(), "order:22");
    }
}
