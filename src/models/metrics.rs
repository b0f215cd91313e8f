//! Probe samples, latency statistics and per-proxy test results

use crate::models::proxy::{ProxyDescriptor, RawConfig};
use crate::types::TestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Outcome of one latency probe round trip
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeSample {
    /// 2xx status within the timeout
    Success(Duration),
    /// Non-2xx status
    Failed,
    /// No response within the timeout
    TimedOut,
}

impl ProbeSample {
    pub fn rtt(&self) -> Option<Duration> {
        match self {
            ProbeSample::Success(rtt) => Some(*rtt),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProbeSample::Success(_))
    }
}

/// Latency, jitter and packet loss derived from a set of probe samples
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    /// Mean round trip of successful samples; `None` when none succeeded
    pub latency: Option<Duration>,
    /// Population standard deviation of successful round trips
    pub jitter: Duration,
    /// failed / total, in [0, 1]
    pub packet_loss: f64,
    pub total_samples: u32,
    pub successful_samples: u32,
}

impl LatencyStats {
    /// Stats for a proxy that could not be probed at all
    pub fn unreachable(total_samples: u32) -> Self {
        Self {
            latency: None,
            jitter: Duration::ZERO,
            packet_loss: 1.0,
            total_samples,
            successful_samples: 0,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.latency.is_some()
    }
}

/// Everything measured for one proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub proxy_name: String,
    pub proxy_type: String,
    #[serde(rename = "latency_ms", with = "option_millis")]
    pub latency: Option<Duration>,
    #[serde(rename = "jitter_ms", with = "millis")]
    pub jitter: Duration,
    pub packet_loss: f64,
    /// Bytes per second
    pub download_speed: Option<f64>,
    /// Bytes per second
    pub upload_speed: Option<f64>,
    #[serde(rename = "proxy_config")]
    pub raw_config: RawConfig,
    pub tested_at: DateTime<Utc>,
}

impl TestResult {
    /// Assemble a result from the probe stats and optional throughput numbers
    pub fn new(
        descriptor: &ProxyDescriptor,
        stats: LatencyStats,
        download_speed: Option<f64>,
        upload_speed: Option<f64>,
    ) -> Self {
        Self {
            proxy_name: descriptor.name.clone(),
            proxy_type: descriptor.proxy_type.clone(),
            latency: stats.latency,
            jitter: stats.jitter,
            packet_loss: stats.packet_loss.clamp(0.0, 1.0),
            download_speed,
            upload_speed,
            raw_config: descriptor.raw_config.clone(),
            tested_at: Utc::now(),
        }
    }

    /// Degraded result: no latency, full loss, no throughput
    pub fn unreachable(descriptor: &ProxyDescriptor) -> Self {
        Self::new(descriptor, LatencyStats::unreachable(0), None, None)
    }

    pub fn is_reachable(&self) -> bool {
        self.latency.is_some()
    }

    pub fn status(&self) -> TestStatus {
        if !self.is_reachable() {
            TestStatus::Unreachable
        } else if self.packet_loss > 0.0 {
            TestStatus::Degraded
        } else {
            TestStatus::Success
        }
    }

    pub fn download_mb_per_sec(&self) -> Option<f64> {
        self.download_speed.map(|s| s / MIB)
    }

    pub fn upload_mb_per_sec(&self) -> Option<f64> {
        self.upload_speed.map(|s| s / MIB)
    }

    pub fn format_latency(&self) -> String {
        match self.latency {
            Some(latency) => format!("{}ms", latency.as_millis()),
            None => "N/A".to_string(),
        }
    }

    pub fn format_jitter(&self) -> String {
        if self.is_reachable() {
            format!("{}ms", self.jitter.as_millis())
        } else {
            "N/A".to_string()
        }
    }

    pub fn format_packet_loss(&self) -> String {
        format!("{:.1}%", self.packet_loss * 100.0)
    }

    pub fn format_download_speed(&self) -> String {
        format_speed(self.download_mb_per_sec())
    }

    pub fn format_upload_speed(&self) -> String {
        format_speed(self.upload_mb_per_sec())
    }
}

fn format_speed(mb_per_sec: Option<f64>) -> String {
    match mb_per_sec {
        Some(speed) => format!("{:.2}MB/s", speed),
        None => "N/A".to_string(),
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
    }
}

mod option_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_secs_f64() * 1000.0)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<f64>::deserialize(deserializer)?;
        Ok(ms.map(|ms| Duration::from_secs_f64(ms.max(0.0) / 1000.0)))
    }
}
