//! convind CLI
//!
//! Command-line interface for convind - a revisioned document store with
//! derived views.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use convind_core::page::MARKDOWN_MIME_TYPE;
use convind_core::{ClassError, Config, Registry, StorageError, Store};

mod commands;
mod logging;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "convind")]
#[command(about = "convind - Revisioned documents and their derived views")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty content
    New {
        /// MIME type, fixed for the content's lifetime
        #[arg(long, default_value = MARKDOWN_MIME_TYPE)]
        mime: String,
    },
    /// Store a new revision from a file or stdin
    Put {
        /// Content ID
        id: String,
        /// File to read (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// List all contents
    #[command(alias = "ls")]
    List,
    /// Show a content and its revisions
    Show {
        /// Content ID
        id: String,
    },
    /// Print a revision's bytes
    Cat {
        /// Content ID
        id: String,
        /// Revision ID (latest when omitted or unknown)
        #[arg(short, long)]
        revision: Option<String>,
    },
    /// Print a page's title
    Title {
        /// Content ID
        id: String,
        /// Revision ID (latest when omitted or unknown)
        #[arg(short, long)]
        revision: Option<String>,
    },
    /// Render a markdown page as HTML
    Render {
        /// Content ID
        id: String,
        /// Revision ID (latest when omitted or unknown)
        #[arg(short, long)]
        revision: Option<String>,
    },
    /// List handler-sets that apply to a revision
    Classes {
        /// Content ID
        id: String,
        /// Revision ID (latest when omitted or unknown)
        #[arg(short, long)]
        revision: Option<String>,
    },
    /// Write a derived instance to stdout
    Instance {
        /// Content ID
        id: String,
        /// Handler-set name
        class: String,
        /// Revision ID (latest when omitted or unknown)
        #[arg(short, long)]
        revision: Option<String>,
    },
    /// Show documents linked to and from a page
    Links {
        /// Content ID
        id: String,
        /// Rebuild the link graph even if nothing changed
        #[arg(long)]
        rebuild: bool,
    },
    /// Delete a content and all its revisions
    #[command(alias = "rm")]
    Delete {
        /// Content ID
        id: String,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Print the config file path
    Path,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, cache_dir, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config = Config::load().context("Failed to load configuration")?;
    logging::init(&config, cli.verbose);

    if let Err(err) = run(cli.command, config, &output).await {
        eprintln!("Error: {:?}", err);
        if let Some(hint) = recovery_hint(&err) {
            eprintln!("\nHint: {}", hint);
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands, config: Config, output: &Output) -> Result<()> {
    // Commands that don't need the store
    let command = match command {
        Commands::Config { command } => return handle_config_command(command, config, output),
        command => command,
    };

    let store = Store::open(&config).context("Failed to open store")?;

    match command {
        Commands::New { mime } => commands::content::create(&store, mime, output),
        Commands::Put { id, file } => commands::content::put(&store, id, file, output),
        Commands::List => commands::content::list(&store, output),
        Commands::Show { id } => commands::content::show(&store, id, output),
        Commands::Cat { id, revision } => commands::content::cat(&store, id, revision, output),
        Commands::Title { id, revision } => commands::content::title(&store, id, revision, output),
        Commands::Render { id, revision } => {
            commands::content::render(&store, id, revision, output)
        }
        Commands::Classes { id, revision } => {
            let registry = open_registry(&config, &store)?;
            commands::class::classes(&store, &registry, id, revision, output)
        }
        Commands::Instance {
            id,
            class,
            revision,
        } => {
            let registry = open_registry(&config, &store)?;
            commands::class::instance(&store, &registry, id, class, revision).await
        }
        Commands::Links { id, rebuild } => commands::class::links(&store, id, rebuild, output),
        Commands::Delete { id } => commands::content::delete(&store, id, output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Suggestion for a storage failure anywhere in the error chain
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(storage) = cause.downcast_ref::<StorageError>() {
            return storage.recovery_suggestion();
        }
        match cause.downcast_ref::<ClassError>() {
            Some(ClassError::Storage(storage)) => storage.recovery_suggestion(),
            _ => None,
        }
    })
}

fn open_registry(config: &Config, store: &Store) -> Result<Registry> {
    Registry::from_config(config, store).context("Failed to set up handler-sets")
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config: Config,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(&config, output),
        Some(ConfigCommands::Path) => commands::config::path(output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(config, key, value, output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_instance() {
        let cli = Cli::try_parse_from(["convind", "--json", "instance", "abc", "wc", "-r", "7"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Instance {
                id,
                class,
                revision,
            } => {
                assert_eq!(id, "abc");
                assert_eq!(class, "wc");
                assert_eq!(revision.as_deref(), Some("7"));
            }
            _ => panic!("expected instance command"),
        }
    }

    #[test]
    fn test_recovery_hint_found_through_context() {
        let denied = StorageError::from_io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            PathBuf::from("/data"),
        );
        let err = anyhow::Error::new(denied).context("Failed to store revision");
        assert!(recovery_hint(&err).is_some_and(|hint| hint.contains("permissions")));

        let wrapped = anyhow::Error::new(ClassError::Storage(StorageError::from_io(
            std::io::Error::new(std::io::ErrorKind::Other, "No space left on device"),
            PathBuf::from("/cache"),
        )));
        assert!(recovery_hint(&wrapped).is_some_and(|hint| hint.contains("disk space")));

        assert!(recovery_hint(&anyhow::anyhow!("plain failure")).is_none());
    }

    #[test]
    fn test_new_defaults_to_markdown() {
        let cli = Cli::try_parse_from(["convind", "new"]).unwrap();
        match cli.command {
            Commands::New { mime } => assert_eq!(mime, "text/markdown"),
            _ => panic!("expected new command"),
        }
    }
}
