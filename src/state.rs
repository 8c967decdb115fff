use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use crate::config::Config;
use crate::error::AppError;
use crate::hub::Hub;
use crate::models::product::Product;
use crate::models::user::{Role, User};
use crate::observability::metrics::Metrics;
use crate::routing::{OsrmRouteProvider, RouteProvider};
use crate::store::{LocationStore, OrderStore};

pub struct AppState {
    pub users: DashMap<u64, User>,
    pub products: DashMap<u64, Product>,
    pub orders: OrderStore,
    pub locations: LocationStore,
    pub hub: Hub,
    pub routing: Option<Arc<dyn RouteProvider>>,
    pub metrics: Metrics,
    next_user_id: AtomicU64,
    next_product_id: AtomicU64,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let routing = match &config.routing_url {
            Some(url) => Some(Arc::new(OsrmRouteProvider::new(url, config.routing_timeout)?)
                as Arc<dyn RouteProvider>),
            None => None,
        };

        let metrics = Metrics::new();
        Ok(Self {
            users: DashMap::new(),
            products: DashMap::new(),
            orders: OrderStore::new(),
            locations: LocationStore::new(config.location_freshness),
            hub: Hub::new(metrics.clone()),
            routing,
            metrics,
            next_user_id: AtomicU64::new(1),
            next_product_id: AtomicU64::new(1),
        })
    }

    pub fn with_route_provider(mut self, provider: Arc<dyn RouteProvider>) -> Self {
        self.routing = Some(provider);
        self
    }

    pub fn create_user(&self, name: String, role: Role) -> User {
        let user = User {
            id: self.next_user_id.fetch_add(1, Ordering::Relaxed),
            name,
            role,
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn create_product(&self, name: String, unit_price: f64) -> Product {
        let product = Product {
            id: self.next_product_id.fetch_add(1, Ordering::Relaxed),
            name,
            unit_price,
            updated_at: Utc::now(),
        };
        self.products.insert(product.id, product.clone());
        product
    }

    /// Registered drivers in ascending id order.
    pub fn drivers(&self) -> Vec<User> {
        let mut drivers: Vec<User> = self
            .users
            .iter()
            .filter(|entry| entry.value().role == Role::Driver)
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by_key(|driver| driver.id);
        drivers
    }

    pub fn driver(&self, id: u64) -> Result<User, AppError> {
        self.users
            .get(&id)
            .filter(|user| user.role == Role::Driver)
            .map(|user| user.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))
    }

    pub fn product(&self, id: u64) -> Result<Product, AppError> {
        self.products
            .get(&id)
            .map(|product| product.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))
    }

    pub fn user_name(&self, id: u64) -> Option<String> {
        self.users.get(&id).map(|user| user.name.clone())
    }
}
