//! Command-pipeline handler-sets
//!
//! A command handler-set is an ordered list of rules. The first rule whose
//! MIME prefix accepts a revision names the external command that derives
//! the artifact: the revision bytes are fed on stdin and stdout becomes the
//! cached artifact.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::info;

use super::cache::{ArtifactCache, CacheKey};
use super::error::{ClassError, ClassResult};
use crate::models::Revision;
use crate::storage::StorageError;

const PASSTHROUGH: &str = "passthrough";

/// MIME type reported by a rule's instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputMime {
    /// Always this type
    Fixed(String),
    /// Whatever the source revision is
    Passthrough,
}

impl OutputMime {
    pub fn resolve(&self, source_mime: &str) -> String {
        match self {
            OutputMime::Fixed(mime) => mime.clone(),
            OutputMime::Passthrough => source_mime.to_string(),
        }
    }
}

impl From<String> for OutputMime {
    fn from(value: String) -> Self {
        if value == PASSTHROUGH {
            OutputMime::Passthrough
        } else {
            OutputMime::Fixed(value)
        }
    }
}

impl From<OutputMime> for String {
    fn from(value: OutputMime) -> Self {
        match value {
            OutputMime::Fixed(mime) => mime,
            OutputMime::Passthrough => PASSTHROUGH.to_string(),
        }
    }
}

/// One match-and-transform rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Accepts revisions whose MIME type starts with this; empty accepts all
    #[serde(default)]
    pub mime_prefix: String,
    /// Executable followed by its arguments
    pub command: Vec<String>,
    pub output: OutputMime,
}

impl Rule {
    pub fn prefix<I, S>(mime_prefix: impl Into<String>, command: I, output: OutputMime) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mime_prefix: mime_prefix.into(),
            command: command.into_iter().map(Into::into).collect(),
            output,
        }
    }

    pub fn matches(&self, revision: &Revision) -> bool {
        revision.mime_type().starts_with(&self.mime_prefix)
    }
}

/// Declarative form of a command handler-set, as found in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSetConfig {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Handler-set backed by external commands
#[derive(Debug, Clone)]
pub struct CommandClass {
    name: String,
    rules: Vec<Rule>,
    cache: Arc<ArtifactCache>,
}

impl CommandClass {
    /// Build a handler-set, rejecting rules with nothing to run
    pub fn new(config: CommandSetConfig, cache: Arc<ArtifactCache>) -> ClassResult<Self> {
        if config.rules.iter().any(|rule| rule.command.is_empty()) {
            return Err(ClassError::EmptyCommand { class: config.name });
        }
        Ok(Self {
            name: config.name,
            rules: config.rules,
            cache,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Bind the first accepting rule to `revision`
    ///
    /// Nothing runs yet; the command executes when the instance is opened.
    pub fn attempt_instance(&self, revision: &Revision) -> ClassResult<CommandInstance> {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.matches(revision))
            .ok_or_else(|| ClassError::NoMatchingHandler {
                class: self.name.clone(),
            })?;

        Ok(CommandInstance {
            revision: revision.clone(),
            key: CacheKey::new(revision.content_id(), revision.revision_id(), &rule.command),
            mime_type: rule.output.resolve(revision.mime_type()),
            cache: Arc::clone(&self.cache),
        })
    }
}

/// A revision bound to the command that derives its artifact
#[derive(Debug, Clone)]
pub struct CommandInstance {
    revision: Revision,
    key: CacheKey,
    mime_type: String,
    cache: Arc<ArtifactCache>,
}

impl CommandInstance {
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn command(&self) -> &[String] {
        &self.key.command
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Path of the artifact, running the command if it is not cached yet
    pub async fn artifact(&self) -> ClassResult<PathBuf> {
        let source = self.revision.path().to_path_buf();
        let command = self.key.command.clone();
        self.cache
            .get_or_produce(&self.key, |staged| async move {
                run_transformation(&command, &source, &staged).await
            })
            .await
    }

    /// Stream of the artifact bytes
    pub async fn open(&self) -> ClassResult<tokio::fs::File> {
        let path = self.artifact().await?;
        tokio::fs::File::open(&path)
            .await
            .map_err(|e| ClassError::Storage(StorageError::from_read(e, path)))
    }
}

/// Run `command` with `source` on stdin and stdout captured into `staged`
///
/// The child is killed if the returned future is dropped before it exits.
async fn run_transformation(command: &[String], source: &Path, staged: &Path) -> ClassResult<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| ClassError::execution(command, "empty command"))?;

    let mut input = tokio::fs::File::open(source)
        .await
        .map_err(|e| StorageError::from_read(e, source.to_path_buf()))?;
    let output = tokio::fs::File::create(staged)
        .await
        .map_err(|e| StorageError::from_io(e, staged.to_path_buf()))?
        .into_std()
        .await;

    info!("Running {:?} on {}", command, source.display());

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(output))
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ClassError::execution(command, format!("failed to start: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ClassError::execution(command, "stdin unavailable"))?;

    let feed = async move {
        let copied = tokio::io::copy(&mut input, &mut stdin).await;
        let closed = stdin.shutdown().await;
        drop(stdin);
        match copied.and(closed) {
            // The command stopped reading; its exit status decides the outcome
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    };

    let (fed, finished) = tokio::join!(feed, child.wait_with_output());

    let finished = finished.map_err(|e| ClassError::execution(command, e.to_string()))?;
    if !finished.status.success() {
        let stderr = String::from_utf8_lossy(&finished.stderr);
        return Err(ClassError::execution(
            command,
            format!("{}: {}", finished.status, stderr.trim()),
        ));
    }
    fed.map_err(|e| ClassError::execution(command, format!("failed to write input: {}", e)))?;

    Ok(())
}
