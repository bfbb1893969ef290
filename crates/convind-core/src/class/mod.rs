//! Handler-sets ("classes") and the instances they derive
//!
//! A handler-set looks at a revision and either declines it or binds it to
//! an `Instance`: a derived view with its own MIME type and byte stream.
//! The known kinds are enumerated in `HandlerSet`:
//!
//! - command pipelines, configured by the user and cached on disk
//! - passthrough, which serves the revision bytes unchanged
//! - the link graph, which serves a document's neighborhood as JSON
//!
//! The `Registry` holds handler-sets in registration order and answers
//! which of them apply to a revision.

pub mod cache;
pub mod command;
pub mod error;

use std::io::Cursor;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::Config;
use crate::graph::{LinkGraph, Neighborhood};
use crate::models::Revision;
use crate::storage::StorageError;
use crate::store::Store;

pub use cache::{ArtifactCache, CacheKey};
pub use command::{CommandClass, CommandInstance, CommandSetConfig, OutputMime, Rule};
pub use error::{ClassError, ClassResult};

/// Name of the link-graph handler-set
pub const WIKI_CLASS: &str = "convind/wiki";

/// Name of the passthrough handler-set
pub const RAW_CLASS: &str = "convind/raw";

/// MIME type of link-graph instances
pub const GRAPH_MIME_TYPE: &str = "application/json";

/// Byte stream of an instance
pub type InstanceReader = Box<dyn AsyncRead + Send + Unpin>;

/// A registered handler-set
#[derive(Debug, Clone)]
pub enum HandlerSet {
    Command(CommandClass),
    Passthrough,
    LinkGraph(Arc<LinkGraph>),
}

impl HandlerSet {
    pub fn name(&self) -> &str {
        match self {
            HandlerSet::Command(class) => class.name(),
            HandlerSet::Passthrough => RAW_CLASS,
            HandlerSet::LinkGraph(_) => WIKI_CLASS,
        }
    }

    /// Bind `revision` to this handler-set, or report that it does not apply
    ///
    /// Command sets only match rules here. The link graph refreshes its
    /// snapshot, which blocks on store I/O; see [`LinkGraph::attempt_instance`].
    pub fn attempt_instance(&self, revision: &Revision) -> ClassResult<Instance> {
        match self {
            HandlerSet::Command(class) => class.attempt_instance(revision).map(Instance::Command),
            HandlerSet::Passthrough => Ok(Instance::Passthrough(revision.clone())),
            HandlerSet::LinkGraph(graph) => {
                Ok(Instance::Neighborhood(graph.attempt_instance(revision)))
            }
        }
    }
}

/// A derived view of one revision
#[derive(Debug, Clone)]
pub enum Instance {
    Command(CommandInstance),
    Passthrough(Revision),
    Neighborhood(Neighborhood),
}

impl Instance {
    pub fn mime_type(&self) -> &str {
        match self {
            Instance::Command(instance) => instance.mime_type(),
            Instance::Passthrough(revision) => revision.mime_type(),
            Instance::Neighborhood(_) => GRAPH_MIME_TYPE,
        }
    }

    /// Open the instance's bytes, producing them first if necessary
    pub async fn open(&self) -> ClassResult<InstanceReader> {
        match self {
            Instance::Command(instance) => Ok(Box::new(instance.open().await?)),
            Instance::Passthrough(revision) => {
                let file = tokio::fs::File::open(revision.path())
                    .await
                    .map_err(|e| StorageError::from_read(e, revision.path().to_path_buf()))?;
                Ok(Box::new(file))
            }
            Instance::Neighborhood(neighborhood) => {
                Ok(Box::new(Cursor::new(neighborhood.to_json()?)))
            }
        }
    }

    /// Read the whole instance into memory
    pub async fn read_to_vec(&self) -> ClassResult<Vec<u8>> {
        let mut reader = self.open().await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

/// Ordered collection of handler-sets
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sets: Vec<HandlerSet>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handler-sets and every configured one
    ///
    /// Order: link graph, passthrough, then the configured command sets in
    /// declaration order.
    pub fn from_config(config: &Config, store: &Store) -> ClassResult<Self> {
        let cache = Arc::new(ArtifactCache::open(&config.cache_dir)?);

        let mut registry = Self::new();
        registry.register(HandlerSet::LinkGraph(Arc::new(LinkGraph::new(store.clone()))));
        registry.register(HandlerSet::Passthrough);
        for set in &config.handler_sets {
            let class = CommandClass::new(set.clone(), Arc::clone(&cache))?;
            registry.register(HandlerSet::Command(class));
        }
        Ok(registry)
    }

    /// Add a handler-set after those already registered
    pub fn register(&mut self, set: HandlerSet) {
        self.sets.push(set);
    }

    /// First handler-set registered under `name`
    pub fn get(&self, name: &str) -> Option<&HandlerSet> {
        self.sets.iter().find(|set| set.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sets.iter().map(HandlerSet::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HandlerSet> {
        self.sets.iter()
    }

    /// Names of the handler-sets that accept `revision`
    ///
    /// A set that fails for any reason other than declining is left out as
    /// well. No command runs to answer this, but the link graph may rebuild.
    pub fn applicable(&self, revision: &Revision) -> Vec<&str> {
        self.sets
            .iter()
            .filter(|set| set.attempt_instance(revision).is_ok())
            .map(HandlerSet::name)
            .collect()
    }

    /// Instance of `revision` under the handler-set called `name`
    pub fn instance(&self, name: &str, revision: &Revision) -> ClassResult<Instance> {
        self.get(name)
            .ok_or_else(|| ClassError::UnknownClass {
                name: name.to_string(),
            })?
            .attempt_instance(revision)
    }

    /// The registered link graph, if any
    pub fn link_graph(&self) -> Option<&Arc<LinkGraph>> {
        self.sets.iter().find_map(|set| match set {
            HandlerSet::LinkGraph(graph) => Some(graph),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        Config {
            data_dir: temp_dir.path().join("data"),
            cache_dir: temp_dir.path().join("cache"),
            log_file: None,
            handler_sets: vec![
                CommandSetConfig {
                    name: "upper".to_string(),
                    rules: vec![Rule::prefix(
                        "text/",
                        ["tr", "a-z", "A-Z"],
                        OutputMime::Passthrough,
                    )],
                },
                CommandSetConfig {
                    name: "thumbnail".to_string(),
                    rules: vec![Rule::prefix(
                        "image/",
                        ["cat"],
                        OutputMime::Fixed("image/png".to_string()),
                    )],
                },
            ],
        }
    }

    fn setup(temp_dir: &TempDir) -> (Store, Registry) {
        let config = test_config(temp_dir);
        let store = Store::open(&config).unwrap();
        let registry = Registry::from_config(&config, &store).unwrap();
        (store, registry)
    }

    #[test]
    fn test_registration_order() {
        let temp_dir = TempDir::new().unwrap();
        let (_, registry) = setup(&temp_dir);

        assert_eq!(
            registry.names(),
            vec![WIKI_CLASS, RAW_CLASS, "upper", "thumbnail"]
        );
        assert!(registry.link_graph().is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_applicable_filters_by_rules() {
        let temp_dir = TempDir::new().unwrap();
        let (store, registry) = setup(&temp_dir);

        let content = store.create("text/plain").unwrap();
        let revision = store.append_revision(&content, &b"words"[..]).unwrap();

        assert_eq!(
            registry.applicable(&revision),
            vec![WIKI_CLASS, RAW_CLASS, "upper"]
        );
    }

    #[test]
    fn test_unknown_class() {
        let temp_dir = TempDir::new().unwrap();
        let (store, registry) = setup(&temp_dir);

        let content = store.create("text/plain").unwrap();
        let revision = store.append_revision(&content, &b"words"[..]).unwrap();

        let err = registry.instance("nope", &revision).unwrap_err();
        assert!(matches!(err, ClassError::UnknownClass { .. }));
    }

    #[test]
    fn test_empty_configured_command_fails_registry() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.handler_sets.push(CommandSetConfig {
            name: "empty".to_string(),
            rules: vec![Rule::prefix("", Vec::<String>::new(), OutputMime::Passthrough)],
        });
        let store = Store::open(&config).unwrap();

        let err = Registry::from_config(&config, &store).unwrap_err();
        assert!(matches!(err, ClassError::EmptyCommand { .. }));
    }

    #[tokio::test]
    async fn test_instances_through_registry() {
        let temp_dir = TempDir::new().unwrap();
        let (store, registry) = setup(&temp_dir);

        let content = store.create("text/plain").unwrap();
        let revision = store.append_revision(&content, &b"quiet"[..]).unwrap();

        let raw = registry.instance(RAW_CLASS, &revision).unwrap();
        assert_eq!(raw.mime_type(), "text/plain");
        assert_eq!(raw.read_to_vec().await.unwrap(), b"quiet");

        let upper = registry.instance("upper", &revision).unwrap();
        assert_eq!(upper.mime_type(), "text/plain");
        assert_eq!(upper.read_to_vec().await.unwrap(), b"QUIET");

        let graph = registry.instance(WIKI_CLASS, &revision).unwrap();
        assert_eq!(graph.mime_type(), GRAPH_MIME_TYPE);
        let json: serde_json::Value =
            serde_json::from_slice(&graph.read_to_vec().await.unwrap()).unwrap();
        assert_eq!(json["1"], serde_json::json!([]));
        assert_eq!(json["2"], serde_json::json!([]));

        let err = registry.instance("thumbnail", &revision).unwrap_err();
        assert!(err.is_no_match());
    }

    #[test]
    fn test_manual_registration() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(ArtifactCache::open(temp_dir.path().join("cache")).unwrap());
        let mut registry = Registry::new();

        let class = CommandClass::new(
            CommandSetConfig {
                name: "wc".to_string(),
                rules: vec![Rule::prefix(
                    "text/",
                    ["wc"],
                    OutputMime::Fixed("text/plain".to_string()),
                )],
            },
            cache,
        )
        .unwrap();
        registry.register(HandlerSet::Command(class));
        registry.register(HandlerSet::Passthrough);

        assert_eq!(registry.names(), vec!["wc", RAW_CLASS]);
        assert!(registry.link_graph().is_none());
        assert_eq!(
            registry.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            vec!["wc".to_string(), RAW_CLASS.to_string()]
        );
    }
}
