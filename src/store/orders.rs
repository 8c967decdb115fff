use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::AppError;
use crate::models::order::{NewOrder, Order, OrderAction, OrderStatus, QueuePosition};

/// Result of a guarded transition. `applied == false` means the precondition
/// did not hold and `order` is the unchanged current record.
#[derive(Debug, Clone)]
pub struct Transition {
    pub applied: bool,
    pub order: Order,
}

#[derive(Default)]
struct OrderTable {
    next_id: u64,
    rows: BTreeMap<u64, Order>,
}

/// Single source of truth for order status.
///
/// Every transition is a compare-status-then-write under the table's write
/// lock, so of two racing requests for the same edge exactly one applies.
/// Ids are monotonic, which makes id order equal creation order.
///
/// The `publish` callbacks run after the write, still under the lock, so
/// events for one order leave in the same order the writes happened. They
/// must not call back into the store.
#[derive(Default)]
pub struct OrderStore {
    table: RwLock<OrderTable>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        new_order: NewOrder,
        total_price: f64,
        publish: impl FnOnce(&Order),
    ) -> Order {
        let mut table = self.table.write();
        table.next_id += 1;

        let order = Order {
            id: table.next_id,
            consumer_id: new_order.consumer_id,
            product_id: new_order.product_id,
            amount_grams: new_order.amount_grams,
            total_price,
            delivery_address: new_order.delivery_address,
            delivery_lat: new_order.delivery_lat,
            delivery_lng: new_order.delivery_lng,
            customer_name: new_order.customer_name,
            status: OrderStatus::Pending,
            driver_id: None,
            created_at: Utc::now(),
            approved_at: None,
        };

        table.rows.insert(order.id, order.clone());
        publish(&order);
        order
    }

    pub fn get(&self, id: u64) -> Option<Order> {
        self.table.read().rows.get(&id).cloned()
    }

    /// Runs `f` on the current record while writers are held off.
    pub fn inspect<R>(&self, id: u64, f: impl FnOnce(&Order) -> R) -> Result<R, AppError> {
        let table = self.table.read();
        let order = table
            .rows
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
        Ok(f(order))
    }

    pub fn len(&self) -> usize {
        self.table.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies `action` if the order currently sits in the action's required
    /// status. `driver_id` is only read for [`OrderAction::Assign`].
    pub fn apply(
        &self,
        id: u64,
        action: OrderAction,
        driver_id: Option<u64>,
        publish: impl FnOnce(&Order),
    ) -> Result<Transition, AppError> {
        let mut table = self.table.write();
        let order = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

        if order.status != action.requires() {
            return Ok(Transition {
                applied: false,
                order: order.clone(),
            });
        }

        match action {
            OrderAction::Approve => order.approved_at = Some(Utc::now()),
            OrderAction::Assign => {
                let driver_id = driver_id.ok_or_else(|| {
                    AppError::Validation("driver_id is required to assign".to_string())
                })?;
                order.driver_id = Some(driver_id);
            }
            OrderAction::Reject | OrderAction::StartDelivering | OrderAction::Deliver => {}
        }
        order.status = action.target();
        publish(order);

        Ok(Transition {
            applied: true,
            order: order.clone(),
        })
    }

    /// Approves every pending order in `ids` as one unit under a single write
    /// lock. Unknown ids and orders not in `pending` are skipped. Returns the
    /// orders that actually transitioned.
    pub fn batch_approve(&self, ids: &[u64], mut publish: impl FnMut(&Order)) -> Vec<Order> {
        let mut table = self.table.write();
        let now = Utc::now();
        let mut approved = Vec::new();

        for id in ids {
            if let Some(order) = table.rows.get_mut(id) {
                if order.status == OrderStatus::Pending {
                    order.status = OrderStatus::Approved;
                    order.approved_at = Some(now);
                    publish(order);
                    approved.push(order.clone());
                }
            }
        }

        approved
    }

    /// Oldest first.
    pub fn pending(&self) -> Vec<Order> {
        self.select(|order| order.status == OrderStatus::Pending)
    }

    pub fn active(&self) -> Vec<Order> {
        self.select(|order| order.status.is_active())
    }

    pub fn by_consumer(&self, consumer_id: u64) -> Vec<Order> {
        self.select(|order| order.consumer_id == consumer_id)
    }

    /// A driver's worklist: only undelivered assignments.
    pub fn by_driver(&self, driver_id: u64) -> Vec<Order> {
        self.select(|order| order.driver_id == Some(driver_id) && order.status.is_on_driver())
    }

    /// Number of active orders created before `id`, excluding itself.
    pub fn queue_position(&self, id: u64) -> Result<QueuePosition, AppError> {
        let table = self.table.read();
        if !table.rows.contains_key(&id) {
            return Err(AppError::NotFound(format!("order {id} not found")));
        }

        let ahead = table
            .rows
            .range(..id)
            .filter(|(_, order)| order.status.is_active())
            .count();

        Ok(QueuePosition::new(id, ahead))
    }

    /// Statuses of every assigned or delivering order, grouped by driver.
    pub fn driver_workloads(&self) -> HashMap<u64, Vec<OrderStatus>> {
        let table = self.table.read();
        let mut workloads: HashMap<u64, Vec<OrderStatus>> = HashMap::new();

        for order in table.rows.values() {
            if let Some(driver_id) = order.driver_id {
                if order.status.is_on_driver() {
                    workloads.entry(driver_id).or_default().push(order.status);
                }
            }
        }

        workloads
    }

    /// Detaches a deleted driver from every order that referenced it.
    pub fn clear_driver(&self, driver_id: u64) -> usize {
        let mut table = self.table.write();
        let mut cleared = 0;

        for order in table.rows.values_mut() {
            if order.driver_id == Some(driver_id) {
                order.driver_id = None;
                cleared += 1;
            }
        }

        cleared
    }

    fn select(&self, predicate: impl Fn(&Order) -> bool) -> Vec<Order> {
        self.table
            .read()
            .rows
            .values()
            .filter(|order| predicate(order))
            .cloned()
            .collect()
    }
}
