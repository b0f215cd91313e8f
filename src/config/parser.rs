//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, Result},
    models::{config::split_list, AppConfig},
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Defaults, then `.env`, then the environment, then CLI flags
    pub fn parse(&self) -> Result<AppConfig> {
        self.cli.validate().map_err(AppError::validation)?;

        let mut config = AppConfig::default();

        EnvManager::load_env_file(self.cli.debug)?;

        if self.cli.debug {
            for warning in EnvManager::validate_current_env() {
                eprintln!("{}", warning);
            }
        }

        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    fn apply_cli_overrides(&self, config: &mut AppConfig) {
        let cli = &self.cli;

        if !cli.config.is_empty() {
            config.config_sources = cli
                .config
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(ref filter) = cli.filter {
            config.filter = filter.clone();
        }

        if let Some(ref block) = cli.block {
            config.block_keywords = split_list(block, '|');
        }

        if let Some(ref server_url) = cli.server_url {
            config.test.server_url = server_url.trim().to_string();
        }

        if let Some(size) = cli.download_size {
            config.test.download_size = size;
        }

        if let Some(size) = cli.upload_size {
            config.test.upload_size = size;
        }

        if let Some(timeout) = cli.timeout {
            config.test.timeout = timeout;
            config.test.transfer_timeout = timeout;
        }

        if let Some(transfer_timeout) = cli.transfer_timeout {
            config.test.transfer_timeout = transfer_timeout;
        }

        if let Some(streams) = cli.concurrent {
            config.test.transfer_streams = streams;
        }

        if let Some(workers) = cli.workers {
            config.test.concurrency = workers;
        }

        if let Some(count) = cli.probe_count {
            config.test.probe_count = count;
        }

        if let Some(ref output) = cli.output {
            config.output_path = Some(output.clone());
        }

        if let Some(max_latency) = cli.max_latency {
            config.max_latency = max_latency;
        }

        if let Some(speed) = cli.min_download_speed {
            config.min_download_speed = speed;
        }

        if let Some(speed) = cli.min_upload_speed {
            config.min_upload_speed = speed;
        }

        if let Some(ref results_file) = cli.results_file {
            config.results_file = results_file.clone();
        }

        if cli.no_color {
            config.enable_color = false;
        }

        config.stash_compatible |= cli.stash_compatible;
        config.rename |= cli.rename;
        config.test.fast_mode |= cli.fast;

        // CLI-only
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<AppConfig> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &AppConfig) -> String {
    let test = &config.test;
    let mut summary = Vec::new();

    summary.push(format!("Sources: {}", config.config_sources.join(", ")));
    summary.push(format!("Filter: {}", config.filter));
    if !config.block_keywords.is_empty() {
        summary.push(format!("Blocked keywords: {}", config.block_keywords.join("|")));
    }
    summary.push(format!("Server: {}", test.server_url));
    if test.fast_mode {
        summary.push("Mode: fast (latency only)".to_string());
    } else {
        summary.push(format!(
            "Sizes: download {} bytes, upload {} bytes",
            test.download_size, test.upload_size
        ));
    }
    summary.push(format!(
        "Timeouts: probe {}ms, transfer {}ms",
        test.timeout.as_millis(),
        test.transfer_timeout.as_millis()
    ));
    summary.push(format!(
        "Workers: {}, streams per transfer: {}, probes: {}",
        test.concurrency, test.transfer_streams, test.probe_count
    ));
    summary.push(format!("Results file: {}", config.results_file));
    if let Some(ref output) = config.output_path {
        summary.push(format!("Output: {} (rename: {})", output, config.rename));
    }
    summary.push(format!("Color Output: {}", config.enable_color));

    summary.join("\n")
}
