//! Name-based proxy filtering

use crate::error::Result;
use crate::models::config::split_list;
use regex::Regex;

/// Include-by-regex, exclude-by-keyword filter. Exclusion wins.
#[derive(Debug, Clone)]
pub struct ProxyFilter {
    /// `None` accepts every name
    include: Option<Regex>,
    /// Lowercased
    block_keywords: Vec<String>,
}

impl ProxyFilter {
    pub fn new(include_pattern: &str, block_keywords: &[String]) -> Result<Self> {
        Ok(Self {
            include: Some(Regex::new(include_pattern)?),
            block_keywords: block_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }

    /// Parse the CLI form, where block keywords are `|`-separated
    pub fn from_cli(include_pattern: &str, block: &str) -> Result<Self> {
        Self::new(include_pattern, &split_list(block, '|'))
    }

    /// Accepts everything
    pub fn allow_all() -> Self {
        Self {
            include: None,
            block_keywords: Vec::new(),
        }
    }

    pub fn is_blocked(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.block_keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    pub fn matches(&self, name: &str) -> bool {
        !self.is_blocked(name) && self.include.as_ref().map_or(true, |re| re.is_match(name))
    }
}

impl Default for ProxyFilter {
    fn default() -> Self {
        Self::allow_all()
    }
}
