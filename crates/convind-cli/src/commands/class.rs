//! Handler-set command handlers

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use convind_core::{LinkGraph, Registry, Store};

use super::content::{find, pick_revision};
use crate::output::Output;

/// List the handler-sets that accept a revision
///
/// A content without revisions has no applicable handler-sets.
pub fn classes(
    store: &Store,
    registry: &Registry,
    id: String,
    revision: Option<String>,
    output: &Output,
) -> Result<()> {
    output.print_names(&applicable_classes(store, registry, &id, revision.as_deref())?)
}

fn applicable_classes(
    store: &Store,
    registry: &Registry,
    id: &str,
    revision: Option<&str>,
) -> Result<Vec<String>> {
    let content = find(store, id)?;
    Ok(match content.resolve_revision(revision)? {
        Some(revision) => registry
            .applicable(&revision)
            .into_iter()
            .map(String::from)
            .collect(),
        None => Vec::new(),
    })
}

/// Stream a derived instance to stdout
pub async fn instance(
    store: &Store,
    registry: &Registry,
    id: String,
    class: String,
    revision: Option<String>,
) -> Result<()> {
    let content = find(store, &id)?;
    let revision = pick_revision(&content, revision.as_deref())?;

    let instance = registry
        .instance(&class, &revision)
        .with_context(|| format!("'{}' cannot handle {}", class, content.id()))?;
    let mut reader = instance
        .open()
        .await
        .with_context(|| format!("Failed to produce '{}' instance", class))?;

    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut reader, &mut stdout)
        .await
        .context("Failed to write instance")?;
    stdout.flush().await?;
    Ok(())
}

/// Show the link neighborhood of a document
pub fn links(store: &Store, id: String, rebuild: bool, output: &Output) -> Result<()> {
    let content = find(store, &id)?;
    let revision = pick_revision(&content, None)?;

    let graph = LinkGraph::new(store.clone());
    if rebuild {
        graph.force_rebuild().context("Failed to rebuild link graph")?;
    }

    output.print_neighborhood(&graph.attempt_instance(&revision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use convind_core::Config;
    use tempfile::TempDir;

    fn setup(temp_dir: &TempDir) -> (Store, Registry) {
        let config = Config {
            data_dir: temp_dir.path().join("data"),
            cache_dir: temp_dir.path().join("cache"),
            ..Config::default()
        };
        let store = Store::open(&config).unwrap();
        let registry = Registry::from_config(&config, &store).unwrap();
        (store, registry)
    }

    #[test]
    fn test_classes_of_content_without_revisions() {
        let temp_dir = TempDir::new().unwrap();
        let (store, registry) = setup(&temp_dir);
        let content = store.create("text/markdown").unwrap();

        let id = content.id().to_string();
        let names = applicable_classes(&store, &registry, &id, None).unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_classes_of_page() {
        let temp_dir = TempDir::new().unwrap();
        let (store, registry) = setup(&temp_dir);
        let content = store.create("text/markdown").unwrap();
        store.append_revision(&content, &b"# Page"[..]).unwrap();

        let id = content.id().to_string();
        let names = applicable_classes(&store, &registry, &id, None).unwrap();
        assert!(names.iter().any(|name| name == "convind/raw"));
    }
}
