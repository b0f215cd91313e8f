//! Proxy descriptor data model

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Original configuration mapping of a proxy, preserved key for key
pub type RawConfig = serde_json::Map<String, serde_json::Value>;

/// A named proxy backend plus the configuration needed to dial and re-emit it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    /// Unique within a run
    pub name: String,
    /// Protocol tag such as `ss`, `vmess`, `http`
    pub proxy_type: String,
    pub raw_config: RawConfig,
}

impl ProxyDescriptor {
    /// Build a descriptor from a configuration mapping.
    ///
    /// The mapping must carry string `name` and `type` keys.
    pub fn from_raw(raw_config: RawConfig) -> Result<Self> {
        let name = raw_config
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::parse("proxy entry is missing a string 'name'"))?
            .to_string();

        let proxy_type = raw_config
            .get("type")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::parse(format!("proxy '{}' is missing a string 'type'", name)))?
            .to_lowercase();

        Ok(Self {
            name,
            proxy_type,
            raw_config,
        })
    }

    /// Convert a YAML node into a descriptor
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self> {
        if !value.is_mapping() {
            return Err(AppError::parse("proxy entry is not a mapping"));
        }

        let json = serde_json::to_value(value)
            .map_err(|e| AppError::parse(format!("unsupported value in proxy entry: {}", e)))?;

        match json {
            serde_json::Value::Object(map) => Self::from_raw(map),
            _ => Err(AppError::parse("proxy entry is not a mapping")),
        }
    }

    /// Server host, when the configuration declares one
    pub fn server(&self) -> Option<&str> {
        self.raw_config.get("server").and_then(|v| v.as_str())
    }

    /// Server port, accepting numbers or numeric strings
    pub fn port(&self) -> Option<u16> {
        match self.raw_config.get("port")? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String field lookup in the raw configuration
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.raw_config.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.raw_config.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawConfig {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_raw() {
        let descriptor = ProxyDescriptor::from_raw(raw(json!({
            "name": "HK 01",
            "type": "SS",
            "server": "hk.example.com",
            "port": 8388
        })))
        .unwrap();

        assert_eq!(descriptor.name, "HK 01");
        assert_eq!(descriptor.proxy_type, "ss");
        assert_eq!(descriptor.server(), Some("hk.example.com"));
        assert_eq!(descriptor.port(), Some(8388));
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(ProxyDescriptor::from_raw(raw(json!({"type": "ss"}))).is_err());
        assert!(ProxyDescriptor::from_raw(raw(json!({"name": "a"}))).is_err());
        assert!(ProxyDescriptor::from_raw(raw(json!({"name": 1, "type": "ss"}))).is_err());
        assert!(ProxyDescriptor::from_raw(raw(json!({"name": "", "type": "ss"}))).is_err());
    }

    #[test]
    fn test_from_yaml() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("name: jp\ntype: socks5\nserver: 1.2.3.4\nport: \"1080\"\ntls: true\n").unwrap();
        let descriptor = ProxyDescriptor::from_yaml(&value).unwrap();
        assert_eq!(descriptor.name, "jp");
        assert_eq!(descriptor.port(), Some(1080));
        assert!(descriptor.get_bool("tls"));
        assert!(!descriptor.get_bool("udp"));

        let scalar: serde_yaml::Value = serde_yaml::from_str("just-a-string").unwrap();
        assert!(ProxyDescriptor::from_yaml(&scalar).is_err());
    }
}
