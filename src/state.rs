use std::sync::Arc;

use crate::gateway::RouteOptimizer;
use crate::observability::metrics::Metrics;
use crate::store::DeliveryStore;

pub struct AppState {
    pub store: DeliveryStore,
    pub optimizer: Arc<dyn RouteOptimizer>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: DeliveryStore, optimizer: Arc<dyn RouteOptimizer>) -> Self {
        Self {
            store,
            optimizer,
            metrics: Metrics::new(),
        }
    }
}
