//! Command-line interface

use clap::{ArgAction, Parser};
use std::time::Duration;

/// Proxy Speed Tester - latency, jitter, packet loss and throughput for Clash/Stash proxies
#[derive(Parser, Debug, Clone)]
#[command(name = "pst")]
#[command(version, long_version = crate::LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Configuration file path or subscription URL (repeatable or comma-separated)
    #[arg(short = 'c', long = "config", value_name = "SRC", action = ArgAction::Append, value_delimiter = ',')]
    pub config: Vec<String>,

    /// Only test proxies whose name matches this regex
    #[arg(short = 'f', long, value_name = "REGEX")]
    pub filter: Option<String>,

    /// Skip proxies whose name contains any of these `|`-separated keywords
    #[arg(short = 'b', long, value_name = "KEYWORDS")]
    pub block: Option<String>,

    /// Speed test server base URL
    #[arg(long, value_name = "URL")]
    pub server_url: Option<String>,

    /// Download size per measurement (bytes, or with KB/MB/GB suffix)
    #[arg(long, value_parser = parse_size, value_name = "SIZE")]
    pub download_size: Option<u64>,

    /// Upload size per measurement (bytes, or with KB/MB/GB suffix)
    #[arg(long, value_parser = parse_size, value_name = "SIZE")]
    pub upload_size: Option<u64>,

    /// Per-request timeout, e.g. 500ms, 5s, 1m
    #[arg(long, value_parser = parse_duration, value_name = "DURATION")]
    pub timeout: Option<Duration>,

    /// Window for each throughput measurement (defaults to --timeout)
    #[arg(long, value_parser = parse_duration, value_name = "DURATION")]
    pub transfer_timeout: Option<Duration>,

    /// Parallel streams per throughput measurement
    #[arg(long, value_name = "N")]
    pub concurrent: Option<usize>,

    /// Proxies tested at once
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Latency samples per proxy
    #[arg(long, value_name = "N")]
    pub probe_count: Option<u32>,

    /// Write a pruned Clash configuration with the qualified proxies
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<String>,

    /// Drop proxy types the Stash client does not support
    #[arg(long)]
    pub stash_compatible: bool,

    /// Output filter: maximum latency (0 disables)
    #[arg(long, value_parser = parse_duration_allow_zero, value_name = "DURATION")]
    pub max_latency: Option<Duration>,

    /// Output filter: minimum download speed in MB/s (0 disables)
    #[arg(long, value_name = "MB/S")]
    pub min_download_speed: Option<f64>,

    /// Output filter: minimum upload speed in MB/s (0 disables)
    #[arg(long, value_name = "MB/S")]
    pub min_upload_speed: Option<f64>,

    /// Rename output proxies with country flag and download speed
    #[arg(long)]
    pub rename: bool,

    /// Latency only; skip throughput measurements
    #[arg(long)]
    pub fast: bool,

    /// Results file used to skip already-tested proxies
    #[arg(long, value_name = "PATH")]
    pub results_file: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if let Some(speed) = self.min_download_speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err("--min-download-speed must be a non-negative number".to_string());
            }
        }

        if let Some(speed) = self.min_upload_speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err("--min-upload-speed must be a non-negative number".to_string());
            }
        }

        if self.rename && self.output.is_none() {
            return Err("--rename requires --output".to_string());
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a duration such as `500ms`, `5s`, `1.5s`, `2m` or bare seconds
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let duration = parse_duration_allow_zero(s)?;
    if duration.is_zero() {
        return Err("Duration must be greater than 0".to_string());
    }
    Ok(duration)
}

fn parse_duration_allow_zero(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (number, scale) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 0.001)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1.0)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60.0)
    } else {
        (s, 1.0)
    };

    if number.is_empty() || number.starts_with('+') || number.starts_with('-') {
        return Err(format!("Invalid duration: {}", s));
    }

    let value: f64 = number.parse().map_err(|_| format!("Invalid duration: {}", s))?;
    let seconds = value * scale;
    if !seconds.is_finite() || seconds > 3600.0 {
        return Err("Duration cannot exceed 1 hour".to_string());
    }

    Ok(Duration::from_secs_f64(seconds))
}

/// Parse a byte size; `KB`, `MB` and `GB` suffixes are binary multiples
pub fn parse_size(s: &str) -> Result<u64, String> {
    let upper = s.trim().to_ascii_uppercase();
    let (number, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };

    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| format!("Invalid size: {}", s))
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    // Default to true on Unix-like systems, false on Windows
    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
