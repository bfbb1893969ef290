//! convind core library
//!
//! This crate provides the core of convind, a personal document store:
//! immutable, revisioned content identified by unique IDs, plus handler-sets
//! that derive alternate views of stored revisions.
//!
//! # Architecture
//!
//! - **Store**: one directory per content, one file per revision
//! - **Handler-sets**: command pipelines cached on disk, passthrough, and a
//!   link graph over markdown documents
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let store = Store::open(&config)?;
//! let registry = Registry::from_config(&config, &store)?;
//!
//! // Add a page
//! let page = store.create("text/markdown")?;
//! let revision = store.append_revision(&page, "# Hello".as_bytes())?;
//!
//! // Derive a view of it
//! let instance = registry.instance("wc", &revision)?;
//! let bytes = instance.read_to_vec().await?;
//! ```
//!
//! # Modules
//!
//! - `store`: Content store (main entry point)
//! - `models`: Content and revision handles
//! - `identity`: Content identities and their text form
//! - `class`: Handler-sets, instances and the artifact cache
//! - `graph`: Link graph over markdown pages
//! - `page`: Markdown page helpers
//! - `storage`: On-disk layout and atomic writes
//! - `config`: Application configuration

pub mod class;
pub mod config;
pub mod graph;
pub mod identity;
pub mod models;
pub mod page;
pub mod storage;
pub mod store;

pub use class::{ClassError, HandlerSet, Instance, Registry};
pub use config::Config;
pub use graph::{BuildError, LinkGraph, Neighborhood};
pub use identity::{IdError, Identity};
pub use models::{Content, ContentSummary, Revision, RevisionSummary};
pub use storage::{StorageError, StorageResult};
pub use store::Store;
