//! Proxy Speed Tester
//!
//! Benchmarks the proxies declared in Clash/Stash configuration files for
//! latency, jitter, packet loss and sustained download/upload throughput,
//! then ranks them and optionally writes a pruned configuration containing
//! only the proxies that pass quality thresholds.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod registry;
pub mod stats;
pub mod storage;
pub mod throughput;
pub mod types;

// Re-export commonly used types
pub use client::{ProxyAdapter, ProxyTransport, ReqwestAdapter};
pub use error::{AppError, Result};
pub use executor::{ExecutionSummary, TestOrchestrator};
pub use models::{AppConfig, LatencyStats, ProxyDescriptor, TestConfig, TestResult};
pub use probe::LatencyProbe;
pub use registry::{CompatibilityMode, ConfigSource, ProxyFilter, ProxyRegistry};
pub use storage::ResultStore;
pub use throughput::ThroughputMeter;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Version plus commit, build time and target, set by `build.rs`
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_TIME"),
    ", ",
    env!("TARGET_TRIPLE"),
    ")"
);

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_SERVER_URL: &str = "https://speed.cloudflare.com";
    pub const DEFAULT_DOWNLOAD_SIZE: u64 = 50 * 1024 * 1024;
    pub const DEFAULT_UPLOAD_SIZE: u64 = 20 * 1024 * 1024;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_TRANSFER_STREAMS: usize = 20;
    pub const DEFAULT_PROBE_COUNT: u32 = 6;
    pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(100);
    pub const DEFAULT_FILTER: &str = ".+";
    pub const DEFAULT_MAX_LATENCY: Duration = Duration::from_millis(800);
    /// MB/s
    pub const DEFAULT_MIN_DOWNLOAD_SPEED: f64 = 5.0;
    /// MB/s
    pub const DEFAULT_MIN_UPLOAD_SPEED: f64 = 2.0;
    pub const DEFAULT_RESULTS_FILE: &str = "speed-test-results.json";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
    pub const DEFAULT_RENAME_CONCURRENCY: usize = 10;

    /// User agent sent when fetching remote subscriptions
    pub const SUBSCRIPTION_USER_AGENT: &str = "clash.meta";
    pub const GEO_LOOKUP_URL: &str = "http://ip-api.com/json";
    pub const HEALTH_CHECK_URL: &str = "http://www.gstatic.com/generate_204";
    pub const AUTO_SELECT_GROUP: &str = "Auto Select";
    pub const HEALTH_CHECK_INTERVAL: u64 = 300;

    /// Proxies tested at once when no worker count is configured
    pub fn default_workers() -> usize {
        (num_cpus::get() * 2).clamp(4, 50)
    }
}
