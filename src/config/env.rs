//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                eprintln!("Loaded configuration from .env file");
            }
        } else if debug {
            eprintln!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Proxy Speed Tester Configuration
#
# Values here are defaults; command-line arguments override them.

# Configuration sources: file paths or subscription URLs (comma-separated)
# PST_CONFIG=./clash.yaml,https://sub.example.com/clash

# Speed test server base URL
# PST_SERVER_URL=https://speed.cloudflare.com

# Per-request timeout (500ms, 5s, 1m or bare seconds)
# PST_TIMEOUT=5s

# Proxies tested at once
# PST_WORKERS=16

# Parallel streams per throughput measurement
# PST_CONCURRENT=20

# Results file used to skip already-tested proxies
# PST_RESULTS_FILE=speed-test-results.json

# Enable colored output (true/false)
# PST_ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        let content = Self::create_example_env_content();
        std::fs::write(path, content)
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "PST_CONFIG" => {
                if crate::models::config::split_list(value, ',').is_empty() {
                    return Err(AppError::config("PST_CONFIG must name at least one source"));
                }
            }
            "PST_SERVER_URL" => {
                let parsed = url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid PST_SERVER_URL '{}': {}", value, e)))?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(AppError::config(format!("PST_SERVER_URL must use http or https: {}", value)));
                }
            }
            "PST_TIMEOUT" => {
                crate::cli::parse_duration(value)
                    .map_err(|e| AppError::config(format!("Invalid PST_TIMEOUT value '{}': {}", value, e)))?;
            }
            "PST_WORKERS" | "PST_CONCURRENT" => {
                let count: usize = value
                    .trim()
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if count == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "PST_ENABLE_COLOR" => {
                value
                    .trim()
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid PST_ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("PST_CONFIG", "Comma-separated configuration paths or URLs", "./clash.yaml"),
            ("PST_SERVER_URL", "Speed test server base URL", "https://speed.cloudflare.com"),
            ("PST_TIMEOUT", "Per-request timeout", "5s"),
            ("PST_WORKERS", "Proxies tested at once", "16"),
            ("PST_CONCURRENT", "Parallel streams per throughput measurement", "20"),
            ("PST_RESULTS_FILE", "Results file path", "speed-test-results.json"),
            ("PST_ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        let mut warnings = Vec::new();

        for (var_name, _, _) in Self::get_supported_env_vars() {
            if let Ok(value) = std::env::var(var_name) {
                if let Err(e) = Self::validate_env_var(var_name, &value) {
                    warnings.push(format!("Warning: {}", e));
                }
            }
        }

        warnings
    }
}
