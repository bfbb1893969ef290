//! Markdown pages
//!
//! A page is a content whose MIME type is `text/markdown`. Its title is the
//! first line of the latest revision, minus a leading `# `.

use comrak::{markdown_to_html, Options};

use crate::identity::Identity;
use crate::models::Revision;
use crate::storage::StorageResult;

pub const MARKDOWN_MIME_TYPE: &str = "text/markdown";

/// Scheme of internal links
pub const URL_SCHEME: &str = "convind://";

/// Whether `mime_type` is markdown, parameters allowed
pub fn is_markdown(mime_type: &str) -> bool {
    mime_type == MARKDOWN_MIME_TYPE
        || mime_type
            .strip_prefix(MARKDOWN_MIME_TYPE)
            .is_some_and(|rest| rest.starts_with(';'))
}

pub fn title_from_text(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    first.strip_prefix("# ").unwrap_or(first).to_string()
}

/// Title of a page revision
pub fn title(revision: &Revision) -> StorageResult<String> {
    Ok(title_from_text(&revision.read_to_string()?))
}

/// Revision rendered as HTML
pub fn render_html(revision: &Revision) -> StorageResult<String> {
    Ok(markdown_to_html(
        &revision.read_to_string()?,
        &Options::default(),
    ))
}

pub fn url(id: &Identity) -> String {
    format!("{}{}", URL_SCHEME, id)
}

pub fn revision_url(revision: &Revision) -> String {
    format!(
        "{}?revision={}",
        url(&revision.content_id()),
        revision.revision_id()
    )
}
