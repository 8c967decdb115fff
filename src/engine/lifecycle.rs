use serde::Serialize;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::order::{NewOrder, Order, OrderAction, OrderView};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct BatchApproveResult {
    /// Orders that actually moved to `approved`.
    pub approved: usize,
    pub order_ids: Vec<u64>,
}

pub fn view(state: &AppState, order: Order) -> OrderView {
    let product_name = state
        .products
        .get(&order.product_id)
        .map(|product| product.name.clone());
    let driver_name = order.driver_id.and_then(|id| state.user_name(id));

    OrderView {
        order,
        product_name,
        driver_name,
    }
}

pub fn get(state: &AppState, id: u64) -> Result<OrderView, AppError> {
    let order = state
        .orders
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    Ok(view(state, order))
}

/// Places an order. The total is computed here from the product's current
/// unit price and never recomputed.
pub fn create(state: &AppState, new_order: NewOrder) -> Result<OrderView, AppError> {
    new_order.validate()?;
    let product = state.product(new_order.product_id)?;
    let total_price = product.price_for(new_order.amount_grams)?;

    let order = state.orders.insert(new_order, total_price, |order| {
        state.hub.order_created(order, &product.name);
    });

    info!(
        order_id = order.id,
        consumer_id = order.consumer_id,
        amount_grams = order.amount_grams,
        total_price = order.total_price,
        "order created"
    );
    Ok(view(state, order))
}

pub fn approve(state: &AppState, id: u64) -> Result<OrderView, AppError> {
    transition(state, id, OrderAction::Approve, None)
}

pub fn reject(state: &AppState, id: u64) -> Result<OrderView, AppError> {
    transition(state, id, OrderAction::Reject, None)
}

pub fn assign(state: &AppState, id: u64, driver_id: u64) -> Result<OrderView, AppError> {
    state.driver(driver_id)?;
    transition(state, id, OrderAction::Assign, Some(driver_id))
}

pub fn start_delivering(state: &AppState, id: u64) -> Result<OrderView, AppError> {
    transition(state, id, OrderAction::StartDelivering, None)
}

pub fn mark_delivered(state: &AppState, id: u64) -> Result<OrderView, AppError> {
    transition(state, id, OrderAction::Deliver, None)
}

pub fn batch_approve(state: &AppState, ids: &[u64]) -> BatchApproveResult {
    let approved = state.orders.batch_approve(ids, |order| {
        state.hub.order_status_changed(order);
    });

    let order_ids: Vec<u64> = approved.iter().map(|order| order.id).collect();
    for _ in &order_ids {
        state.metrics.record_transition("approve", "applied");
    }
    info!(
        requested = ids.len(),
        approved = order_ids.len(),
        "batch approve finished"
    );

    BatchApproveResult {
        approved: order_ids.len(),
        order_ids,
    }
}

/// Runs one guarded transition. A failed precondition is not an error: the
/// caller gets the unchanged record and can compare the status.
fn transition(
    state: &AppState,
    id: u64,
    action: OrderAction,
    driver_id: Option<u64>,
) -> Result<OrderView, AppError> {
    let result = state.orders.apply(id, action, driver_id, |order| {
        state.hub.order_status_changed(order);
    });

    let transition = match result {
        Ok(transition) => transition,
        Err(err) => {
            state.metrics.record_transition(action.as_str(), "error");
            return Err(err);
        }
    };

    if transition.applied {
        state.metrics.record_transition(action.as_str(), "applied");
        info!(
            order_id = id,
            action = action.as_str(),
            status = transition.order.status.as_str(),
            driver_id = ?transition.order.driver_id,
            "order transitioned"
        );
    } else {
        state.metrics.record_transition(action.as_str(), "noop");
        warn!(
            order_id = id,
            action = action.as_str(),
            current = transition.order.status.as_str(),
            "transition precondition not met; order unchanged"
        );
    }

    Ok(view(state, transition.order))
}

#[cfg(test)]
mod tests {
    use super::{approve, assign, batch_approve, create, mark_delivered, reject, start_delivering};
    use crate::config::Config;
    use crate::hub::Room;
    use crate::hub::events;
    use crate::models::order::{NewOrder, OrderStatus};
    use crate::models::user::Role;
    use crate::state::AppState;

    fn state() -> AppState {
        AppState::new(&Config::default()).unwrap()
    }

    fn new_order(consumer_id: u64, product_id: u64, amount_grams: u32) -> NewOrder {
        NewOrder {
            consumer_id,
            product_id,
            amount_grams,
            delivery_address: "Bagdat Cd. 100".to_string(),
            delivery_lat: 40.96,
            delivery_lng: 29.07,
            customer_name: "Can".to_string(),
        }
    }

    #[test]
    fn create_prices_from_the_catalog() {
        let state = state();
        let consumer = state.create_user("Can".to_string(), Role::Consumer);
        let product = state.create_product("Arabica".to_string(), 0.10);

        let created = create(&state, new_order(consumer.id, product.id, 100)).unwrap();

        assert_eq!(created.order.total_price, 10.0);
        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.product_name.as_deref(), Some("Arabica"));
    }

    #[test]
    fn create_rejects_bad_amount_before_writing() {
        let state = state();
        let product = state.create_product("Arabica".to_string(), 0.10);

        assert!(create(&state, new_order(1, product.id, 26)).is_err());
        assert!(state.orders.is_empty());
    }

    #[test]
    fn create_with_unknown_product_is_not_found() {
        let state = state();
        assert!(matches!(
            create(&state, new_order(1, 77, 100)),
            Err(crate::error::AppError::NotFound(_))
        ));
    }

    #[test]
    fn price_change_does_not_touch_existing_orders() {
        let state = state();
        let product = state.create_product("Arabica".to_string(), 0.10);
        let id = create(&state, new_order(1, product.id, 100)).unwrap().order.id;

        if let Some(mut stored) = state.products.get_mut(&product.id) {
            stored.unit_price = 0.50;
        }

        assert_eq!(state.orders.get(id).unwrap().total_price, 10.0);
    }

    #[test]
    fn assign_requires_a_known_driver() {
        let state = state();
        let product = state.create_product("Arabica".to_string(), 0.10);
        let consumer = state.create_user("Can".to_string(), Role::Consumer);
        let id = create(&state, new_order(consumer.id, product.id, 100)).unwrap().order.id;
        approve(&state, id).unwrap();

        assert!(assign(&state, id, 999).is_err());
        assert!(assign(&state, id, consumer.id).is_err());
        assert_eq!(state.orders.get(id).unwrap().status, OrderStatus::Approved);
    }

    #[test]
    fn full_flow_notifies_consumer_in_order() {
        let state = state();
        let consumer = state.create_user("Can".to_string(), Role::Consumer);
        let driver = state.create_user("Mert".to_string(), Role::Driver);
        let product = state.create_product("Arabica".to_string(), 0.10);
        let (conn, mut rx) = state.hub.connect();
        state.hub.join(conn, Room::User(consumer.id));

        let id = create(&state, new_order(consumer.id, product.id, 100)).unwrap().order.id;
        approve(&state, id).unwrap();
        let assigned = assign(&state, id, driver.id).unwrap();
        assert_eq!(assigned.driver_name.as_deref(), Some("Mert"));
        start_delivering(&state, id).unwrap();
        let delivered = mark_delivered(&state, id).unwrap();
        assert_eq!(delivered.order.status, OrderStatus::Delivered);

        let mut titles = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.event == events::NOTIFICATION {
                titles.push(event.data["title"].as_str().unwrap_or_default().to_string());
            }
        }
        assert_eq!(
            titles,
            vec!["Order approved", "Driver assigned", "On the way", "Delivered"]
        );
    }

    #[test]
    fn noop_transition_returns_current_record_without_broadcast() {
        let state = state();
        let product = state.create_product("Arabica".to_string(), 0.10);
        let id = create(&state, new_order(1, product.id, 100)).unwrap().order.id;
        reject(&state, id).unwrap();
        let (_conn, mut rx) = state.hub.connect();

        let result = approve(&state, id).unwrap();

        assert_eq!(result.order.status, OrderStatus::Rejected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn batch_approve_counts_only_transitioned_orders() {
        let state = state();
        let product = state.create_product("Arabica".to_string(), 0.10);
        let a = create(&state, new_order(1, product.id, 100)).unwrap().order.id;
        let b = create(&state, new_order(2, product.id, 100)).unwrap().order.id;
        let b_approved_at = approve(&state, b).unwrap().order.approved_at;

        let result = batch_approve(&state, &[a, b]);

        assert_eq!(result.approved, 1);
        assert_eq!(result.order_ids, vec![a]);
        assert!(state.orders.get(a).unwrap().approved_at.is_some());
        assert_eq!(state.orders.get(b).unwrap().approved_at, b_approved_at);
    }
}
