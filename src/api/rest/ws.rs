use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::geo::GeoPoint;
use crate::hub::events;
use crate::hub::{ClientEvent, ConnectionId, Room, ServerEvent};
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut rx) = state.hub.connect();

    info!(connection_id = %connection_id, "websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize hub event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_frame(&recv_state, connection_id, &text),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.hub.disconnect(connection_id);
    info!(connection_id = %connection_id, "websocket client disconnected");
}

/// Parses and dispatches one inbound text frame. Malformed frames are answered
/// with an `error` event on the same connection.
pub fn handle_frame(state: &AppState, connection_id: ConnectionId, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => handle_event(state, connection_id, event),
        Err(err) => {
            debug!(connection_id = %connection_id, error = %err, "unparseable client frame");
            state.hub.send_to(
                connection_id,
                ServerEvent::new(
                    events::ERROR,
                    json!({ "message": format!("invalid frame: {err}") }),
                ),
            );
        }
    }
}

pub fn handle_event(state: &AppState, connection_id: ConnectionId, event: ClientEvent) {
    let hub = &state.hub;

    match event {
        ClientEvent::Join { user_id, role } => {
            hub.join(connection_id, Room::User(user_id));
            hub.join(connection_id, Room::Role(role));
            debug!(connection_id = %connection_id, user_id, role = role.as_str(), "joined");
        }
        ClientEvent::JoinOrder { order_id } => {
            hub.join(connection_id, Room::Order(order_id));
        }
        ClientEvent::LeaveOrder { order_id } => {
            hub.leave(connection_id, Room::Order(order_id));
        }
        ClientEvent::ChatMessage { order_id, message } => {
            hub.chat_message(order_id, message);
        }
        ClientEvent::DriverLocation {
            driver_id,
            lat,
            lng,
        } => {
            let point = match GeoPoint::validated(lat, lng) {
                Ok(point) => point,
                Err(err) => {
                    hub.send_to(
                        connection_id,
                        ServerEvent::new(events::ERROR, json!({ "message": err.to_string() })),
                    );
                    return;
                }
            };

            // the live signal goes out even when persisting fails
            match state.driver(driver_id) {
                Ok(_) => {
                    state.locations.upsert(driver_id, point);
                }
                Err(err) => {
                    warn!(driver_id, error = %err, "location not persisted");
                }
            }
            hub.driver_location(driver_id, point.lat, point.lng);
        }
        ClientEvent::OrderCreated { order_id } => {
            let replayed = state.orders.inspect(order_id, |order| {
                let product_name = state
                    .products
                    .get(&order.product_id)
                    .map(|product| product.name.clone())
                    .unwrap_or_default();
                hub.order_created(order, &product_name);
            });
            if let Err(err) = replayed {
                debug!(order_id, error = %err, "ignoring order:created for unknown order");
            }
        }
        ClientEvent::OrderStatus { order_id } => {
            let replayed = state
                .orders
                .inspect(order_id, |order| hub.order_status_changed(order));
            if let Err(err) = replayed {
                debug!(order_id, error = %err, "ignoring order:status for unknown order");
            }
        }
    }
}

