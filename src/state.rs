use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::hub::RealtimeHub;
use crate::lifecycle::request::RideRequestLifecycle;
use crate::lifecycle::trip::TripLifecycle;
use crate::observability::metrics::Metrics;
use crate::store::{Deadline, Store};

pub struct AppState {
    pub store: Arc<Store>,
    pub hub: Arc<RealtimeHub>,
    pub trips: TripLifecycle,
    pub requests: RideRequestLifecycle,
    pub metrics: Metrics,
    store_deadline: Duration,
    pub session_buffer_size: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let store = Arc::new(Store::new());
        let hub = Arc::new(RealtimeHub::new());
        let metrics = Metrics::new();

        Self {
            trips: TripLifecycle::new(store.clone(), hub.clone(), metrics.clone()),
            requests: RideRequestLifecycle::new(store.clone(), hub.clone(), metrics.clone()),
            store,
            hub,
            metrics,
            store_deadline: Duration::from_millis(config.store_deadline_ms),
            session_buffer_size: config.session_buffer_size,
        }
    }

    /// Fresh deadline for one store-bound operation.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.store_deadline)
    }
}
