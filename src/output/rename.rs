//! Country-flag renaming of output proxies
//!
//! Each proxy's `server` is looked up with a geolocation service and the
//! proxy is renamed to `{flag} {CC} | ⬇️ {speed} MB/s`. A failed lookup keeps
//! the current name.

use crate::{
    defaults,
    error::{AppError, Result},
    logging::Logger,
    models::TestResult,
};
use futures::{stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};

const GEO_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Flag shown when no country is known
pub const UNKNOWN_FLAG: &str = "🏳️";

/// Country of a server as reported by the lookup service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountryInfo {
    #[serde(default)]
    pub country: String,
    #[serde(rename = "countryCode", default)]
    pub country_code: String,
}

/// Looks up server countries via an ip-api compatible endpoint
pub struct GeoLocator {
    client: Client,
    endpoint: String,
}

impl GeoLocator {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(defaults::GEO_LOOKUP_URL)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(GEO_LOOKUP_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub async fn lookup(&self, host: &str) -> Result<CountryInfo> {
        let url = format!("{}/{}?fields=country,countryCode", self.endpoint, host);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::network(format!("Geolocation request for '{}' failed: {}", host, e)))?;

        if !response.status().is_success() {
            return Err(AppError::http_request(format!(
                "Geolocation service returned {} for '{}'",
                response.status(),
                host
            )));
        }

        let info: CountryInfo = response.json().await?;
        if info.country_code.len() != 2 {
            return Err(AppError::parse(format!("No country code for '{}'", host)));
        }
        Ok(info)
    }
}

/// Regional-indicator flag for a two-letter country code
pub fn country_flag(code: &str) -> String {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return UNKNOWN_FLAG.to_string();
    }

    code.chars()
        .filter_map(|c| char::from_u32(0x1F1E6 + (c as u32 - 'A' as u32)))
        .collect()
}

/// Display name for a located proxy
pub fn node_name(country_code: &str, download_mb_per_sec: Option<f64>) -> String {
    format!(
        "{} {} | ⬇️ {:.2} MB/s",
        country_flag(country_code),
        country_code.trim().to_ascii_uppercase(),
        download_mb_per_sec.unwrap_or(0.0)
    )
}

/// Renames results in place, a bounded number of lookups at a time
pub struct NodeRenamer {
    locator: GeoLocator,
    concurrency: usize,
    logger: Logger,
}

impl NodeRenamer {
    pub fn new(locator: GeoLocator) -> Self {
        Self {
            locator,
            concurrency: defaults::DEFAULT_RENAME_CONCURRENCY,
            logger: Logger::quiet("RENAME".to_string()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Rename every result whose server can be located. Returns how many
    /// were renamed. Names stay unique.
    pub async fn rename(&self, results: &mut [TestResult]) -> usize {
        let hosts: Vec<Option<String>> = results
            .iter()
            .map(|r| r.raw_config.get("server").and_then(|v| v.as_str()).map(String::from))
            .collect();

        let lookups: Vec<Option<CountryInfo>> = stream::iter(hosts)
            .map(|host| async move {
                let host = host?;
                match self.locator.lookup(&host).await {
                    Ok(info) => Some(info),
                    Err(e) => {
                        crate::log_warn!(self.logger, "Cannot locate '{}': {}", host, e);
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut renamed = 0;
        for (result, info) in results.iter_mut().zip(lookups) {
            if let Some(info) = info {
                result.proxy_name = node_name(&info.country_code, result.download_mb_per_sec());
                renamed += 1;
            }
        }

        make_unique(results);
        renamed
    }
}

/// Append ` 2`, ` 3`, ... to repeated names
fn make_unique(results: &mut [TestResult]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for result in results.iter() {
        *counts.entry(result.proxy_name.clone()).or_default() += 1;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for result in results.iter_mut() {
        if counts.get(&result.proxy_name).copied().unwrap_or(0) < 2 {
            continue;
        }
        let occurrence = seen.entry(result.proxy_name.clone()).or_default();
        *occurrence += 1;
        if *occurrence > 1 {
            let mut candidate = format!("{} {}", result.proxy_name, occurrence);
            while counts.contains_key(&candidate) {
                *occurrence += 1;
                candidate = format!("{} {}", result.proxy_name, occurrence);
            }
            counts.insert(candidate.clone(), 1);
            result.proxy_name = candidate;
        }
    }
}
