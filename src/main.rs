//! Proxy Speed Tester - Main CLI Application
//!
//! Benchmarks the proxies declared in Clash/Stash configurations for latency,
//! jitter, packet loss and throughput, then ranks them.

use clap::Parser;
use futures::FutureExt;
use proxy_speed_tester::{
    app::{install_panic_hook, App},
    cli::Cli,
    error::AppError,
};
use std::{any::Any, panic::AssertUnwindSafe, process};

#[tokio::main]
async fn main() {
    install_panic_hook();

    let cli = Cli::parse();
    let use_color = cli.use_colors();

    let result = AssertUnwindSafe(async move {
        let app = App::new(cli)?;
        app.run().await.map(|_| ())
    })
    .catch_unwind()
    .await
    .unwrap_or_else(|payload| Err(AppError::internal(panic_message(payload.as_ref()))));

    if let Err(e) = result {
        eprintln!("{}", e.format_for_console(use_color));
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Pass a configuration with --config <PATH|URL> or set PST_CONFIG");
            eprintln!("  - Check your .env file format");
            eprintln!("  - Durations accept 500ms, 5s, 1m or bare seconds");
        }
        AppError::Validation(_) => {
            eprintln!();
            eprintln!("Run 'pst --help' to see how the options combine.");
        }
        AppError::Network(_) | AppError::HttpRequest(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check that the subscription URL is reachable");
            eprintln!("  - Some providers only answer Clash user agents");
            eprintln!("  - Verify firewall settings");
        }
        AppError::Parse(_) => {
            eprintln!();
            eprintln!("The configuration must be YAML with a 'proxies' list");
            eprintln!("whose entries carry at least 'name' and 'type'.");
        }
        _ => {}
    }
}
