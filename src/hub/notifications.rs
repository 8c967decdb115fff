use dashmap::DashSet;

use crate::models::order::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    NewOrder,
    NewDelivery,
    Status(OrderStatus),
}

/// Remembers which (order, kind) notifications were already sent so that a
/// replayed fan-out does not raise the same banner twice.
#[derive(Debug, Default)]
pub struct NotificationLedger {
    sent: DashSet<(u64, NotificationKind)>,
}

impl NotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a key is seen.
    pub fn mark_sent(&self, order_id: u64, kind: NotificationKind) -> bool {
        self.sent.insert((order_id, kind))
    }

    pub fn was_sent(&self, order_id: u64, kind: NotificationKind) -> bool {
        self.sent.contains(&(order_id, kind))
    }
}

/// Title and body shown to the consumer when their order reaches `order.status`.
pub fn consumer_message(order: &Order) -> Option<(String, String)> {
    let id = order.id;
    let (title, body) = match order.status {
        OrderStatus::Pending => return None,
        OrderStatus::Approved => ("Order approved", format!("Your order #{id} has been approved.")),
        OrderStatus::Rejected => ("Order rejected", format!("Your order #{id} was rejected.")),
        OrderStatus::Assigned => (
            "Driver assigned",
            format!("A driver has been assigned to your order #{id}."),
        ),
        OrderStatus::Delivering => ("On the way", format!("Your order #{id} is on its way.")),
        OrderStatus::Delivered => ("Delivered", format!("Your order #{id} has been delivered.")),
    };
    Some((title.to_string(), body))
}

pub fn new_order_message(order: &Order, product_name: &str) -> (String, String) {
    (
        "New order".to_string(),
        format!("New order: {}g of {product_name}", order.amount_grams),
    )
}

pub fn new_delivery_message(order: &Order) -> (String, String) {
    (
        "New delivery".to_string(),
        format!(
            "Order #{}: {}g to {}",
            order.id, order.amount_grams, order.delivery_address
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::{NotificationKind, NotificationLedger};
    use crate::models::order::OrderStatus;

    #[test]
    fn ledger_accepts_each_key_once() {
        let ledger = NotificationLedger::new();
        assert!(ledger.mark_sent(1, NotificationKind::Status(OrderStatus::Approved)));
        assert!(!ledger.mark_sent(1, NotificationKind::Status(OrderStatus::Approved)));
        assert!(ledger.mark_sent(1, NotificationKind::Status(OrderStatus::Assigned)));
        assert!(ledger.mark_sent(2, NotificationKind::Status(OrderStatus::Approved)));
        assert!(ledger.was_sent(1, NotificationKind::Status(OrderStatus::Assigned)));
        assert!(!ledger.was_sent(1, NotificationKind::NewDelivery));
    }
}
