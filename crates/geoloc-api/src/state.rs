//! Application state management

use geoloc_core::config::AppConfig;
use geoloc_extractor::ModelRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers.
///
/// Loaded models are immutable, so no locks are needed.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Models loaded at startup
    pub registry: Arc<ModelRegistry>,
    /// Server start time
    pub start_time: Instant,
    /// Extraction request counter
    pub request_count: AtomicU64,
}

impl AppState {
    pub fn new(config: AppConfig, registry: ModelRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }

    /// Load every model named by `config`
    pub fn load(config: AppConfig) -> Self {
        let registry = ModelRegistry::load(&config.models);
        Self::new(config, registry)
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default(), ModelRegistry::empty())
    }
}
