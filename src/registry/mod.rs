//! Proxy registry: loading, de-duplication and filtering
//!
//! Sources are Clash/Stash YAML documents read from disk or fetched over
//! HTTP. A document contributes its own `proxies` first, then the proxies of
//! each entry under `proxy-providers`, in declaration order.

pub mod compat;
pub mod filter;

pub use compat::CompatibilityMode;
pub use filter::ProxyFilter;

use crate::{
    defaults,
    error::{AppError, ErrorContext, Result},
    logging::Logger,
    models::ProxyDescriptor,
};
use serde_yaml::Value;
use std::{
    collections::HashSet,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a configuration document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Url(String),
}

impl ConfigSource {
    /// `http://` and `https://` sources are remote, anything else is a path
    pub fn parse(source: &str) -> Self {
        let trimmed = source.trim();
        let lowered = trimmed.to_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    /// Directory that relative provider paths resolve against
    fn base_dir(&self) -> Option<&Path> {
        match self {
            Self::File(path) => path.parent(),
            Self::Url(_) => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Loads proxy descriptors from configuration sources
pub struct ProxyRegistry {
    client: reqwest::Client,
    filter: ProxyFilter,
    logger: Logger,
}

impl ProxyRegistry {
    pub fn new(filter: ProxyFilter) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(defaults::SUBSCRIPTION_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AppError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            filter,
            logger: Logger::quiet("REGISTRY".to_string()),
        })
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn filter(&self) -> &ProxyFilter {
        &self.filter
    }

    /// Load every source in order and return the surviving proxies.
    ///
    /// Names are unique in the result; the first occurrence wins.
    pub async fn load(
        &self,
        sources: &[ConfigSource],
        compatibility: CompatibilityMode,
    ) -> Result<Vec<ProxyDescriptor>> {
        let mut seen = HashSet::new();
        let mut proxies = Vec::new();
        let mut filtered = 0usize;
        let mut incompatible = 0usize;
        let mut duplicates = 0usize;

        for source in sources {
            let loaded = self.load_source(source).await?;
            crate::log_debug!(self.logger, "Loaded {} proxies from {}", loaded.len(), source);

            for descriptor in loaded {
                if !compatibility.supports(&descriptor.proxy_type) {
                    incompatible += 1;
                    continue;
                }
                if !self.filter.matches(&descriptor.name) {
                    filtered += 1;
                    continue;
                }
                if !seen.insert(descriptor.name.clone()) {
                    duplicates += 1;
                    continue;
                }
                proxies.push(descriptor);
            }
        }

        self.logger
            .info("Proxies loaded")
            .field("sources", sources.len())
            .field("kept", proxies.len())
            .field("filtered", filtered)
            .field("incompatible", incompatible)
            .field("duplicates", duplicates)
            .log();

        Ok(proxies)
    }

    /// All proxies of one source, providers included, unfiltered
    pub async fn load_source(&self, source: &ConfigSource) -> Result<Vec<ProxyDescriptor>> {
        let text = self.read_source(source).await?;
        let document = parse_document(&text).with_context(|| source.to_string())?;

        let mut proxies = document.proxies;

        for provider in document.providers {
            let provider_source = provider.resolve(source.base_dir());
            let Some(provider_source) = provider_source else {
                crate::log_warn!(
                    self.logger,
                    "Provider '{}' has neither url nor path, skipping",
                    provider.name
                );
                continue;
            };

            let text = self.read_source(&provider_source).await?;
            let provided = parse_document(&text)
                .with_context(|| format!("provider '{}' ({})", provider.name, provider_source))?;
            crate::log_debug!(
                self.logger,
                "Provider '{}' contributed {} proxies",
                provider.name,
                provided.proxies.len()
            );
            proxies.extend(provided.proxies);
        }

        Ok(proxies)
    }

    async fn read_source(&self, source: &ConfigSource) -> Result<String> {
        match source {
            ConfigSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                AppError::config(format!("Cannot read configuration '{}': {}", path.display(), e))
            }),
            ConfigSource::Url(url) => self.fetch(url).await,
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::network(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::http_request(format!(
                "Fetching {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        Ok(response.text().await?)
    }
}

/// Proxies and provider references found in one document
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub proxies: Vec<ProxyDescriptor>,
    pub providers: Vec<ProviderRef>,
}

/// An entry of the `proxy-providers` mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRef {
    pub name: String,
    pub url: Option<String>,
    pub path: Option<String>,
}

impl ProviderRef {
    /// Prefer the remote url; relative paths resolve against `base_dir`
    fn resolve(&self, base_dir: Option<&Path>) -> Option<ConfigSource> {
        if let Some(url) = &self.url {
            return Some(ConfigSource::Url(url.clone()));
        }

        let path = Path::new(self.path.as_deref()?);
        let resolved = match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        Some(ConfigSource::File(resolved))
    }
}

/// Parse a Clash YAML document.
///
/// A missing `proxies` key yields no proxies; a malformed entry fails the
/// whole document.
pub fn parse_document(text: &str) -> Result<ParsedDocument> {
    let root: Value = serde_yaml::from_str(text)?;
    let Value::Mapping(root) = root else {
        return Err(AppError::parse("configuration document is not a mapping"));
    };

    let mut document = ParsedDocument::default();

    match root.get("proxies") {
        None | Some(Value::Null) => {}
        Some(Value::Sequence(entries)) => {
            for (index, entry) in entries.iter().enumerate() {
                let descriptor =
                    ProxyDescriptor::from_yaml(entry).with_context(|| format!("proxies[{}]", index))?;
                document.proxies.push(descriptor);
            }
        }
        Some(_) => return Err(AppError::parse("'proxies' must be a sequence")),
    }

    match root.get("proxy-providers") {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(providers)) => {
            for (name, provider) in providers {
                let name = name.as_str().unwrap_or_default().to_string();
                let field = |key: &str| {
                    provider
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                };
                document.providers.push(ProviderRef {
                    url: field("url"),
                    path: field("path"),
                    name,
                });
            }
        }
        Some(_) => return Err(AppError::parse("'proxy-providers' must be a mapping")),
    }

    Ok(document)
}
