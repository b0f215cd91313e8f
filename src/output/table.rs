//! Colored console table of test results

use crate::{
    error::{AppError, Result},
    models::TestResult,
    types::PerformanceLevel,
};
use colored::*;
use std::fmt::Write as _;

const NAME_WIDTH: usize = 36;

/// Download bands in MB/s: green at 10, yellow at 5
const DOWNLOAD_BANDS: (f64, f64) = (10.0, 5.0);
/// Upload bands in MB/s: green at 5, yellow at 2
const UPLOAD_BANDS: (f64, f64) = (5.0, 2.0);

fn level_color(level: PerformanceLevel) -> Color {
    match level {
        PerformanceLevel::Good => Color::Green,
        PerformanceLevel::Moderate => Color::Yellow,
        PerformanceLevel::Poor => Color::Red,
    }
}

/// Renders ranked results as a fixed-width table
#[derive(Debug, Clone)]
pub struct ResultTable {
    enable_color: bool,
    /// Latency only: index, name, type, latency
    fast_mode: bool,
}

impl ResultTable {
    pub fn new(enable_color: bool, fast_mode: bool) -> Self {
        Self {
            enable_color,
            fast_mode,
        }
    }

    fn colorize(&self, text: &str, level: PerformanceLevel) -> String {
        if self.enable_color {
            text.color(level_color(level)).to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.enable_color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn rule(&self, width: usize) -> String {
        let line = "─".repeat(width);
        if self.enable_color {
            line.bright_black().to_string()
        } else {
            line
        }
    }

    fn width(&self) -> usize {
        if self.fast_mode {
            5 + NAME_WIDTH + 10 + 10 + 3
        } else {
            5 + NAME_WIDTH + 10 + 10 + 10 + 8 + 12 + 12 + 7
        }
    }

    pub fn render(&self, results: &[TestResult]) -> Result<String> {
        let mut output = String::new();

        if results.is_empty() {
            writeln!(output, "No test results available.").map_err(table_error)?;
            return Ok(output);
        }

        let header = if self.fast_mode {
            format!("{:<5} {} {:<10} {:>10}", "#", pad("Name", NAME_WIDTH), "Type", "Latency")
        } else {
            format!(
                "{:<5} {} {:<10} {:>10} {:>10} {:>8} {:>12} {:>12}",
                "#",
                pad("Name", NAME_WIDTH),
                "Type",
                "Latency",
                "Jitter",
                "Loss",
                "Download",
                "Upload"
            )
        };

        writeln!(output, "{}", self.bold(&header)).map_err(table_error)?;
        writeln!(output, "{}", self.rule(self.width())).map_err(table_error)?;

        for (index, result) in results.iter().enumerate() {
            let latency_level = PerformanceLevel::from_latency(result.latency);
            let mut row = format!(
                "{:<5} {} {:<10} {}",
                index + 1,
                pad(&result.proxy_name, NAME_WIDTH),
                result.proxy_type,
                self.colorize(&format!("{:>10}", result.format_latency()), latency_level),
            );

            if !self.fast_mode {
                let jitter = result.latency.map(|_| result.jitter);
                let (dl_good, dl_moderate) = DOWNLOAD_BANDS;
                let (ul_good, ul_moderate) = UPLOAD_BANDS;
                write!(
                    row,
                    " {} {} {} {}",
                    self.colorize(
                        &format!("{:>10}", result.format_jitter()),
                        PerformanceLevel::from_jitter(jitter),
                    ),
                    self.colorize(
                        &format!("{:>8}", result.format_packet_loss()),
                        PerformanceLevel::from_packet_loss(result.packet_loss),
                    ),
                    self.colorize(
                        &format!("{:>12}", result.format_download_speed()),
                        PerformanceLevel::from_speed(result.download_mb_per_sec(), dl_good, dl_moderate),
                    ),
                    self.colorize(
                        &format!("{:>12}", result.format_upload_speed()),
                        PerformanceLevel::from_speed(result.upload_mb_per_sec(), ul_good, ul_moderate),
                    ),
                )
                .map_err(table_error)?;
            }

            writeln!(output, "{}", row).map_err(table_error)?;
        }

        Ok(output)
    }
}

fn table_error(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format table: {}", e))
}

/// Left-align to `width` characters, truncating with an ellipsis
fn pad(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        let truncated: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", truncated)
    } else {
        format!("{}{}", text, " ".repeat(width - count))
    }
}
