//! Logging setup
//!
//! Logs go to stderr, or to `log_file` when configured. The level comes from
//! `--verbose`, then `RUST_LOG`, then defaults to warnings only.

use std::fs::OpenOptions;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use convind_core::Config;

/// Initialize the global subscriber (ignored if one is already set)
pub fn init(config: &Config, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("convind_core=debug,convind_cli=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("convind_core=warn,convind_cli=warn"))
    };

    let Some(log_path) = &config.log_file else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    debug!("Logging to {:?}", log_path);
}
