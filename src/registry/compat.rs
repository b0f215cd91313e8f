//! Client compatibility modes

use serde::{Deserialize, Serialize};

/// Proxy types the Stash client can dial
const STASH_SUPPORTED_TYPES: &[&str] = &[
    "ss",
    "ssr",
    "vmess",
    "vless",
    "trojan",
    "http",
    "socks5",
    "snell",
    "hysteria",
    "hysteria2",
    "tuic",
    "wireguard",
];

/// Which client the loaded proxies must work with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompatibilityMode {
    /// Every proxy type is kept
    #[default]
    Clash,
    /// Types the Stash client lacks are dropped
    Stash,
}

impl CompatibilityMode {
    pub fn from_stash_flag(stash_compatible: bool) -> Self {
        if stash_compatible {
            Self::Stash
        } else {
            Self::Clash
        }
    }

    pub fn supports(self, proxy_type: &str) -> bool {
        match self {
            Self::Clash => true,
            Self::Stash => STASH_SUPPORTED_TYPES.contains(&proxy_type.to_lowercase().as_str()),
        }
    }
}
