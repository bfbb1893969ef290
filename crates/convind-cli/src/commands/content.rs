//! Content command handlers

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use convind_core::models::Revision;
use convind_core::page;
use convind_core::{Content, Identity, Store};

use crate::output::Output;

/// Parse a content ID given on the command line
pub fn parse_id(raw: &str) -> Result<Identity> {
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid content ID: {}", raw))
}

/// Look up a content by its textual ID
pub fn find(store: &Store, raw: &str) -> Result<Content> {
    let id = parse_id(raw)?;
    store
        .get(&id)
        .with_context(|| format!("Failed to open content {}", id))
}

/// Revision named by `--revision`, or the latest one
///
/// An unknown or malformed revision falls back to the latest.
pub fn pick_revision(content: &Content, requested: Option<&str>) -> Result<Revision> {
    content
        .resolve_revision(requested)?
        .ok_or_else(|| anyhow::anyhow!("Content {} has no revisions", content.id()))
}

/// Create a new, empty content
pub fn create(store: &Store, mime_type: String, output: &Output) -> Result<()> {
    let content = store
        .create(&mime_type)
        .context("Failed to create content")?;

    if output.is_quiet() {
        println!("{}", content.id());
        return Ok(());
    }
    output.success(&format!("Created content: {}", content.id()));
    output.print_content(&content.summary()?)
}

/// Append a revision read from a file, or stdin when no file is given
pub fn put(store: &Store, id: String, file: Option<PathBuf>, output: &Output) -> Result<()> {
    let content = find(store, &id)?;

    let revision = match file {
        Some(path) => {
            let reader =
                File::open(&path).with_context(|| format!("Failed to open {:?}", path))?;
            store.append_revision(&content, reader)
        }
        None => store.append_revision(&content, io::stdin().lock()),
    }
    .context("Failed to store revision")?;

    if output.is_quiet() {
        println!("{}", revision.revision_id());
        return Ok(());
    }
    output.success(&format!(
        "Stored revision {} of {}",
        revision.revision_id(),
        content.id()
    ));
    Ok(())
}

/// List every content in the store
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let mut summaries = Vec::new();
    for id in store.list_all()? {
        let summary = store.get(&id).and_then(|content| content.summary());
        match summary {
            Ok(summary) => summaries.push(summary),
            // Deleted while listing
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        }
    }
    summaries.sort_by(|a, b| a.id.to_string().cmp(&b.id.to_string()));

    output.print_contents(&summaries)
}

/// Show a content and its revisions
pub fn show(store: &Store, id: String, output: &Output) -> Result<()> {
    let content = find(store, &id)?;
    output.print_content(&content.summary()?)
}

/// Write a revision's bytes to stdout
pub fn cat(store: &Store, id: String, revision: Option<String>, _output: &Output) -> Result<()> {
    let content = find(store, &id)?;
    let revision = pick_revision(&content, revision.as_deref())?;

    let mut reader = revision.open()?;
    let mut stdout = io::stdout().lock();
    io::copy(&mut reader, &mut stdout).context("Failed to write revision")?;
    stdout.flush()?;
    Ok(())
}

/// Print the page title of a revision
pub fn title(store: &Store, id: String, revision: Option<String>, output: &Output) -> Result<()> {
    let content = find(store, &id)?;
    let revision = pick_revision(&content, revision.as_deref())?;

    output.print_value("title", &page::title(&revision)?);
    Ok(())
}

/// Render a revision as HTML
pub fn render(store: &Store, id: String, revision: Option<String>, output: &Output) -> Result<()> {
    let content = find(store, &id)?;
    let revision = pick_revision(&content, revision.as_deref())?;

    let html = page::render_html(&revision)?;
    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "url": page::revision_url(&revision),
                "title": page::title(&revision)?,
                "html": html
            })
        );
    } else {
        print!("{}", html);
    }
    Ok(())
}

/// Delete a content and all its revisions
pub fn delete(store: &Store, id: String, output: &Output) -> Result<()> {
    let id = parse_id(&id)?;
    store
        .delete(&id)
        .with_context(|| format!("Failed to delete {}", id))?;

    output.success(&format!("Deleted content: {}", id));
    Ok(())
}
