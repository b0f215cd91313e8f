//! Data models and structures for the proxy speed tester

pub mod config;
pub mod metrics;
pub mod proxy;

// Re-export main model types
pub use config::{AppConfig, TestConfig};
pub use metrics::{LatencyStats, ProbeSample, TestResult};
pub use proxy::{ProxyDescriptor, RawConfig};
