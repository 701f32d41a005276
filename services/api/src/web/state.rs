//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use trhovisko_core::ports::{ComparisonCache, MarketplaceStore, ModelClient, UsageLedger};
use trhovisko_core::RetryPolicy;

/// The shared application state, created once at startup and passed to all
/// handlers. The model client is injected here explicitly; there is no
/// lazily-constructed global provider instance.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub model: Arc<dyn ModelClient>,
    pub ledger: Arc<dyn UsageLedger>,
    pub cache: Arc<dyn ComparisonCache>,
    pub store: Arc<dyn MarketplaceStore>,
}

impl AppState {
    /// The retry policy for structured generations, derived from config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_retries, self.config.retry_base_delay)
    }
}
