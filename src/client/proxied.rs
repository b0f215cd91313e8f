//! `reqwest`-backed adapter for the protocols an HTTP client can dial natively

use crate::{
    client::{ByteStream, ProxyAdapter, ProxyTransport, TransportResponse},
    error::{AppError, Result},
    models::ProxyDescriptor,
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header::CONTENT_LENGTH, Body, Client, Proxy};
use std::{sync::Arc, time::Duration};
use url::Url;

/// Proxy types this adapter can dial
pub const SUPPORTED_TYPES: &[&str] = &["direct", "http", "https", "socks5"];

/// Builds one `reqwest::Client` per proxy descriptor
#[derive(Debug, Clone)]
pub struct ReqwestAdapter {
    connect_timeout: Duration,
    user_agent: String,
}

impl Default for ReqwestAdapter {
    fn default() -> Self {
        Self::new(crate::defaults::DEFAULT_TIMEOUT)
    }
}

impl ReqwestAdapter {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn supports(proxy_type: &str) -> bool {
        SUPPORTED_TYPES.contains(&proxy_type)
    }

    /// Proxy URL for a descriptor, `None` for direct connections
    pub fn proxy_url(descriptor: &ProxyDescriptor) -> Result<Option<Url>> {
        let scheme = match descriptor.proxy_type.as_str() {
            "direct" => return Ok(None),
            "http" if descriptor.get_bool("tls") => "https",
            "http" => "http",
            "https" => "https",
            // socks5h resolves target hosts on the proxy side
            "socks5" => "socks5h",
            other => {
                return Err(AppError::dial(format!(
                    "proxy '{}' uses unsupported type '{}'",
                    descriptor.name, other
                )))
            }
        };

        let server = descriptor.server().ok_or_else(|| {
            AppError::dial(format!("proxy '{}' has no server", descriptor.name))
        })?;
        let port = descriptor.port().ok_or_else(|| {
            AppError::dial(format!("proxy '{}' has no valid port", descriptor.name))
        })?;

        let host = if server.contains(':') && !server.starts_with('[') {
            format!("[{}]", server)
        } else {
            server.to_string()
        };

        let mut url = Url::parse(&format!("{}://{}:{}", scheme, host, port))
            .map_err(|e| AppError::dial(format!("proxy '{}' has an invalid address: {}", descriptor.name, e)))?;

        if let Some(username) = descriptor.get_str("username").filter(|u| !u.is_empty()) {
            url.set_username(username)
                .map_err(|_| AppError::dial(format!("proxy '{}' has an invalid username", descriptor.name)))?;
            url.set_password(descriptor.get_str("password"))
                .map_err(|_| AppError::dial(format!("proxy '{}' has an invalid password", descriptor.name)))?;
        }

        Ok(Some(url))
    }

    fn build_client(&self, descriptor: &ProxyDescriptor) -> Result<Client> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str());

        builder = match Self::proxy_url(descriptor)? {
            Some(url) => {
                let proxy = Proxy::all(url.as_str())
                    .map_err(|e| AppError::dial(format!("proxy '{}': {}", descriptor.name, e)))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        builder
            .build()
            .map_err(|e| AppError::dial(format!("Failed to create HTTP client for '{}': {}", descriptor.name, e)))
    }
}

impl ProxyAdapter for ReqwestAdapter {
    fn dial(&self, descriptor: &ProxyDescriptor) -> Result<Arc<dyn ProxyTransport>> {
        let client = self.build_client(descriptor)?;
        Ok(Arc::new(ReqwestTransport { client }))
    }
}

/// Transport over a proxied `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

#[async_trait]
impl ProxyTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes_stream().map_err(AppError::from).boxed();
        Ok(TransportResponse::new(status, body))
    }

    async fn post(&self, url: &str, body: ByteStream, content_length: u64) -> Result<u16> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(body))
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: serde_json::Value) -> ProxyDescriptor {
        ProxyDescriptor::from_raw(value.as_object().cloned().unwrap()).unwrap()
    }

    #[test]
    fn test_proxy_url_for_supported_types() {
        let direct = descriptor(json!({"name": "d", "type": "direct"}));
        assert!(ReqwestAdapter::proxy_url(&direct).unwrap().is_none());

        let http = descriptor(json!({"name": "h", "type": "http", "server": "1.2.3.4", "port": 8080}));
        assert_eq!(ReqwestAdapter::proxy_url(&http).unwrap().unwrap().as_str(), "http://1.2.3.4:8080/");

        let https = descriptor(json!({"name": "h", "type": "http", "server": "proxy.example.com", "port": 443, "tls": true}));
        assert_eq!(ReqwestAdapter::proxy_url(&https).unwrap().unwrap().scheme(), "https");

        let socks = descriptor(json!({
            "name": "s", "type": "socks5", "server": "::1", "port": "1080",
            "username": "user", "password": "p@ss"
        }));
        let url = ReqwestAdapter::proxy_url(&socks).unwrap().unwrap();
        assert_eq!(url.scheme(), "socks5h");
        assert_eq!(url.username(), "user");
        assert_eq!(url.port(), Some(1080));
        assert!(url.password().is_some());
    }

    #[test]
    fn test_unsupported_type_is_dial_error() {
        let vmess = descriptor(json!({"name": "v", "type": "vmess", "server": "1.2.3.4", "port": 443}));
        let err = ReqwestAdapter::default().dial(&vmess).err().unwrap();
        assert_eq!(err.category(), "DIAL");
        assert!(err.to_string().contains("vmess"));
    }

    #[test]
    fn test_missing_server_is_dial_error() {
        let http = descriptor(json!({"name": "h", "type": "http", "port": 8080}));
        assert_eq!(ReqwestAdapter::proxy_url(&http).unwrap_err().category(), "DIAL");

        let no_port = descriptor(json!({"name": "h", "type": "socks5", "server": "1.2.3.4"}));
        assert_eq!(ReqwestAdapter::proxy_url(&no_port).unwrap_err().category(), "DIAL");
    }

    #[test]
    fn test_dial_supported() {
        let adapter = ReqwestAdapter::new(Duration::from_secs(1));
        let http = descriptor(json!({"name": "h", "type": "http", "server": "127.0.0.1", "port": 3128}));
        assert!(adapter.dial(&http).is_ok());
        assert!(ReqwestAdapter::supports("socks5"));
        assert!(!ReqwestAdapter::supports("trojan"));
    }
}
