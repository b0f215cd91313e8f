//! Pruned Clash configuration output

use crate::{
    defaults,
    error::{AppError, Result},
    models::{AppConfig, RawConfig, TestResult},
};
use serde::Serialize;
use std::{path::Path, time::Duration};

const MIB: f64 = 1024.0 * 1024.0;

/// Which results are good enough to keep
#[derive(Debug, Clone, PartialEq)]
pub struct QualityThresholds {
    /// Zero disables the check
    pub max_latency: Duration,
    /// MB/s; zero disables the check
    pub min_download_speed: f64,
    /// MB/s; zero disables the check
    pub min_upload_speed: f64,
    pub download_size: u64,
    pub upload_size: u64,
}

impl QualityThresholds {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_latency: config.max_latency,
            min_download_speed: config.min_download_speed,
            min_upload_speed: config.min_upload_speed,
            download_size: config.test.download_size,
            upload_size: config.test.upload_size,
        }
    }

    /// Reachable, under the latency cap, and fast enough wherever speed was
    /// actually measured
    pub fn qualifies(&self, result: &TestResult) -> bool {
        let Some(latency) = result.latency else {
            return false;
        };

        if !self.max_latency.is_zero() && latency > self.max_latency {
            return false;
        }

        let too_slow = |speed: Option<f64>, size: u64, min_mb: f64| match speed {
            Some(speed) if size > 0 && min_mb > 0.0 => speed < min_mb * MIB,
            _ => false,
        };

        !too_slow(result.download_speed, self.download_size, self.min_download_speed)
            && !too_slow(result.upload_speed, self.upload_size, self.min_upload_speed)
    }

    pub fn select<'a>(&self, results: &'a [TestResult]) -> Vec<&'a TestResult> {
        results.iter().filter(|r| self.qualifies(r)).collect()
    }
}

#[derive(Debug, Serialize)]
struct ClashDocument<'a> {
    proxies: Vec<&'a RawConfig>,
    #[serde(rename = "proxy-groups")]
    proxy_groups: Vec<ProxyGroup>,
    rules: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ProxyGroup {
    name: String,
    #[serde(rename = "type")]
    group_type: &'static str,
    proxies: Vec<String>,
    url: String,
    interval: u64,
}

/// Emits a minimal Clash document: the proxies, one url-test group, one rule
#[derive(Debug, Clone)]
pub struct ClashConfigWriter {
    group_name: String,
    health_check_url: String,
    interval: u64,
}

impl Default for ClashConfigWriter {
    fn default() -> Self {
        Self {
            group_name: defaults::AUTO_SELECT_GROUP.to_string(),
            health_check_url: defaults::HEALTH_CHECK_URL.to_string(),
            interval: defaults::HEALTH_CHECK_INTERVAL,
        }
    }
}

impl ClashConfigWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// YAML for `results`, in the given order. Each proxy is written from its
    /// raw configuration with `name` set to the result's current name.
    pub fn render(&self, results: &[TestResult]) -> Result<String> {
        let configs: Vec<RawConfig> = results
            .iter()
            .map(|r| {
                let mut raw = r.raw_config.clone();
                raw.insert("name".to_string(), serde_json::Value::String(r.proxy_name.clone()));
                raw
            })
            .collect();

        let document = ClashDocument {
            proxies: configs.iter().collect(),
            proxy_groups: vec![ProxyGroup {
                name: self.group_name.clone(),
                group_type: "url-test",
                proxies: results.iter().map(|r| r.proxy_name.clone()).collect(),
                url: self.health_check_url.clone(),
                interval: self.interval,
            }],
            rules: vec![format!("MATCH,{}", self.group_name)],
        };

        Ok(serde_yaml::to_string(&document)?)
    }

    pub fn write(&self, path: &Path, results: &[TestResult]) -> Result<()> {
        let yaml = self.render(results)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::io(format!("Failed to create directory '{}': {}", parent.display(), e))
                })?;
            }
        }

        std::fs::write(path, yaml)
            .map_err(|e| AppError::io(format!("Failed to write '{}': {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LatencyStats, ProxyDescriptor};
    use serde_json::json;

    fn result(name: &str, latency_ms: Option<u64>, download_mb: Option<f64>, upload_mb: Option<f64>) -> TestResult {
        let descriptor = ProxyDescriptor::from_raw(
            json!({ "name": name, "type": "ss", "server": "hk.example.com", "port": 8388, "cipher": "aes-128-gcm" })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
        let stats = match latency_ms {
            Some(ms) => LatencyStats {
                latency: Some(Duration::from_millis(ms)),
                jitter: Duration::ZERO,
                packet_loss: 0.0,
                total_samples: 6,
                successful_samples: 6,
            },
            None => LatencyStats::unreachable(6),
        };
        TestResult::new(&descriptor, stats, download_mb.map(|s| s * MIB), upload_mb.map(|s| s * MIB))
    }

    fn thresholds() -> QualityThresholds {
        QualityThresholds {
            max_latency: Duration::from_millis(800),
            min_download_speed: 5.0,
            min_upload_speed: 2.0,
            download_size: 1024,
            upload_size: 1024,
        }
    }

    #[test]
    fn test_threshold_filtering() {
        let t = thresholds();
        assert!(t.qualifies(&result("ok", Some(200), Some(10.0), Some(3.0))));
        assert!(!t.qualifies(&result("dead", None, None, None)));
        assert!(!t.qualifies(&result("laggy", Some(900), Some(10.0), Some(3.0))));
        assert!(!t.qualifies(&result("slow-down", Some(200), Some(4.0), Some(3.0))));
        assert!(!t.qualifies(&result("slow-up", Some(200), Some(10.0), Some(1.0))));
        // Unmeasured speeds are not held against the proxy
        assert!(t.qualifies(&result("fast-mode", Some(200), None, None)));
    }

    #[test]
    fn test_disabled_thresholds() {
        let t = QualityThresholds {
            max_latency: Duration::ZERO,
            min_download_speed: 0.0,
            upload_size: 0,
            ..thresholds()
        };
        assert!(t.qualifies(&result("laggy", Some(5000), Some(0.1), Some(0.1))));
        assert!(!t.qualifies(&result("dead", None, None, None)));
    }

    #[test]
    fn test_select_keeps_order() {
        let results = vec![
            result("a", Some(100), Some(20.0), Some(5.0)),
            result("b", None, None, None),
            result("c", Some(300), Some(8.0), Some(2.5)),
        ];
        let names: Vec<_> = thresholds().select(&results).iter().map(|r| r.proxy_name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn test_render_contains_group_and_rule() {
        let mut renamed = result("HK 01", Some(100), Some(20.0), None);
        renamed.proxy_name = "🇭🇰 HK | ⬇️ 20.00 MB/s".to_string();
        let yaml = ClashConfigWriter::new().render(&[renamed, result("JP 01", Some(120), None, None)]).unwrap();

        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let proxies = doc["proxies"].as_sequence().unwrap();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0]["name"].as_str(), Some("🇭🇰 HK | ⬇️ 20.00 MB/s"));
        assert_eq!(proxies[0]["cipher"].as_str(), Some("aes-128-gcm"));
        assert_eq!(proxies[0]["port"].as_u64(), Some(8388));

        let group = &doc["proxy-groups"][0];
        assert_eq!(group["name"].as_str(), Some("Auto Select"));
        assert_eq!(group["type"].as_str(), Some("url-test"));
        assert_eq!(group["url"].as_str(), Some("http://www.gstatic.com/generate_204"));
        assert_eq!(group["interval"].as_u64(), Some(300));
        assert_eq!(group["proxies"].as_sequence().unwrap().len(), 2);

        assert_eq!(doc["rules"][0].as_str(), Some("MATCH,Auto Select"));
    }

    #[test]
    fn test_write_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out/clash.yaml");
        ClashConfigWriter::new().write(&path, &[result("a", Some(100), None, None)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("MATCH,Auto Select"));
    }
}
