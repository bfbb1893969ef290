//! Config command handlers

use anyhow::{bail, Context, Result};

use convind_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config: &Config, output: &Output) -> Result<()> {
    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:  {}", config.data_dir.display());
            println!("  cache_dir: {}", config.cache_dir.display());
            println!(
                "  log_file:  {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Handler-sets:");
            for set in &config.handler_sets {
                println!("  {}", set.name);
                for rule in &set.rules {
                    let prefix = if rule.mime_prefix.is_empty() {
                        "*"
                    } else {
                        &rule.mime_prefix
                    };
                    let output_mime: String = rule.output.clone().into();
                    println!(
                        "    {} -> {} ({})",
                        prefix,
                        rule.command.join(" "),
                        output_mime
                    );
                }
            }
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Print the config file location
pub fn path(output: &Output) -> Result<()> {
    output.print_value("path", &Config::config_file_path().display().to_string());
    Ok(())
}

/// Set a configuration value
pub fn set(mut config: Config, key: String, value: String, output: &Output) -> Result<()> {
    match key.as_str() {
        "data_dir" => {
            config.data_dir = value.clone().into();
        }
        "cache_dir" => {
            config.cache_dir = value.clone().into();
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone().into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, cache_dir, log_file",
                key
            );
        }
    }

    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
