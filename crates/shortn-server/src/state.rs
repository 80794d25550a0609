use shortn_client::{Counters, LinkStore};
use std::sync::Arc;

/// Counts every request reaching the redirect handler.
pub const NUM_REQUESTS: &str = "num-requests";
pub const NUM_REDIRECTS: &str = "num-redirects";
pub const NUM_NOTFOUNDS: &str = "num-notfounds";

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn LinkStore>,
    counters: Arc<Counters>,
}

impl AppState {
    pub fn new(store: Arc<dyn LinkStore>, counters: Arc<Counters>) -> Self {
        Self { store, counters }
    }

    pub fn store(&self) -> &dyn LinkStore {
        self.store.as_ref()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}
