//! Link extraction from markdown
//!
//! Every link and image in a document yields its destination plus a short
//! context snippet: the tail of the preceding sibling's text, the link's own
//! text, and the head of the following sibling's text, joined by an
//! ellipsis.

use comrak::nodes::{AstNode, NodeValue};
use comrak::{parse_document, Arena, Options};
use tracing::debug;

use crate::identity::Identity;
use crate::page::URL_SCHEME;

/// Absolute API path that carries an identity
pub const API_DATA_PREFIX: &str = "/api/v1/data/";

/// Characters of sibling text kept on each side of a link
pub const CONTEXT_CHARS: usize = 30;

const SEPARATOR: &str = " … ";

/// A link found in a document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExtractedLink {
    pub destination: String,
    pub context: String,
}

/// All links and images in `text`, deduplicated and sorted by destination
pub fn extract_links(text: &str) -> Vec<ExtractedLink> {
    let arena = Arena::new();
    let root = parse_document(&arena, text, &Options::default());

    let mut links: Vec<ExtractedLink> = root
        .descendants()
        .filter_map(|node| {
            let destination = match &node.data.borrow().value {
                NodeValue::Link(link) | NodeValue::Image(link) => link.url.clone(),
                _ => return None,
            };
            Some(ExtractedLink {
                destination,
                context: context_of(node),
            })
        })
        .collect();

    links.sort();
    links.dedup();
    links
}

/// Identity referenced by an internal link destination
///
/// External destinations and internal ones whose identity does not decode
/// both yield `None`.
pub fn internal_target(destination: &str) -> Option<Identity> {
    let encoded = destination
        .strip_prefix(URL_SCHEME)
        .or_else(|| destination.strip_prefix(API_DATA_PREFIX))?;

    match Identity::decode(encoded) {
        Ok(id) => Some(id),
        Err(e) => {
            debug!("Ignoring malformed internal link {:?}: {}", destination, e);
            None
        }
    }
}

fn context_of<'a>(node: &'a AstNode<'a>) -> String {
    let before = sibling(node, |n| n.previous_sibling())
        .map(|n| last_chars(&flatten_text(n), CONTEXT_CHARS).to_string())
        .unwrap_or_default();
    let after = sibling(node, |n| n.next_sibling())
        .map(|n| first_chars(&flatten_text(n), CONTEXT_CHARS).to_string())
        .unwrap_or_default();

    let mut context = String::new();
    if !before.is_empty() {
        context.push_str(&before);
        context.push_str(SEPARATOR);
    }
    context.push_str(&flatten_text(node));
    if !after.is_empty() {
        context.push_str(SEPARATOR);
        context.push_str(&after);
    }
    context
}

/// Nearest sibling in one direction, stepping over line breaks
fn sibling<'a, F>(node: &'a AstNode<'a>, step: F) -> Option<&'a AstNode<'a>>
where
    F: Fn(&'a AstNode<'a>) -> Option<&'a AstNode<'a>>,
{
    let mut current = step(node);
    while let Some(candidate) = current {
        let is_break = matches!(
            candidate.data.borrow().value,
            NodeValue::SoftBreak | NodeValue::LineBreak
        );
        if !is_break {
            return Some(candidate);
        }
        current = step(candidate);
    }
    None
}

fn flatten_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for descendant in node.descendants() {
        match &descendant.data.borrow().value {
            NodeValue::Text(literal) => text.push_str(literal),
            NodeValue::Code(code) => text.push_str(&code.literal),
            _ => {}
        }
    }
    text
}

fn last_chars(text: &str, count: usize) -> &str {
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(count);
    match text.char_indices().nth(skip) {
        Some((start, _)) => &text[start..],
        None => "",
    }
}

fn first_chars(text: &str, count: usize) -> &str {
    let text = text.trim();
    match text.char_indices().nth(count) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
