//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::Result;
use serde::Serialize;

use convind_core::graph::HopEntry;
use convind_core::{ContentSummary, Neighborhood};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single content with its revisions
    pub fn print_content(&self, content: &ContentSummary) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", content.id);
                println!("MIME type: {}", content.mime_type);
                if let Some(title) = &content.title {
                    println!("Title:     {}", title);
                }
                if content.revisions.is_empty() {
                    println!("No revisions.");
                    return Ok(());
                }
                println!();
                println!("── Revisions ({}) ──", content.revisions.len());
                for revision in &content.revisions {
                    println!(
                        "{}  {}",
                        revision.creation_time.format("%Y-%m-%d %H:%M:%S"),
                        revision.revision_id
                    );
                }
            }
            OutputFormat::Json => print_json(content)?,
            OutputFormat::Quiet => println!("{}", content.id),
        }
        Ok(())
    }

    /// Print a list of contents
    pub fn print_contents(&self, contents: &[ContentSummary]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if contents.is_empty() {
                    println!("No content found.");
                    return Ok(());
                }
                for content in contents {
                    let latest = content
                        .revisions
                        .first()
                        .map(|r| r.creation_time.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let title = content.title.as_deref().unwrap_or("-");
                    println!(
                        "{} | {} | {} | {} rev | {}",
                        content.id,
                        truncate(title, 35),
                        truncate(&content.mime_type, 24),
                        content.revisions.len(),
                        latest
                    );
                }
                println!("\n{} content(s)", contents.len());
            }
            OutputFormat::Json => print_json(contents)?,
            OutputFormat::Quiet => {
                for content in contents {
                    println!("{}", content.id);
                }
            }
        }
        Ok(())
    }

    /// Print the link neighborhood of a document
    pub fn print_neighborhood(&self, neighborhood: &Neighborhood) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if !neighborhood.title.is_empty() {
                    println!("{}", neighborhood.title);
                    println!();
                }
                println!("── Linked ({}) ──", neighborhood.hop1.len());
                for entry in &neighborhood.hop1 {
                    print_hop(entry);
                }
                println!();
                println!("── Two hops ({}) ──", neighborhood.hop2.len());
                for entry in &neighborhood.hop2 {
                    print_hop(entry);
                }
            }
            OutputFormat::Json => print_json(neighborhood)?,
            OutputFormat::Quiet => {
                for entry in neighborhood.hop1.iter().chain(&neighborhood.hop2) {
                    println!("{}", entry.id);
                }
            }
        }
        Ok(())
    }

    /// Print a list of handler-set names
    pub fn print_names(&self, names: &[String]) -> Result<()> {
        match self.format {
            OutputFormat::Json => print_json(&names)?,
            _ => {
                for name in names {
                    println!("{}", name);
                }
            }
        }
        Ok(())
    }

    /// Print a single value, such as a title or path
    pub fn print_value(&self, key: &str, value: &str) {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::json!({ key: value })),
            _ => println!("{}", value),
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_hop(entry: &HopEntry) {
    let title = if entry.title.is_empty() {
        "(untitled)"
    } else {
        &entry.title
    };
    println!("{} | {} | {}", entry.id, truncate(title, 35), entry.mime_type);
    if let Some(context) = entry.context.as_deref().filter(|c| !c.is_empty()) {
        println!("    {}", truncate_line(context, 70));
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
