//! Neighborhood queries over a link-graph snapshot

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::Snapshot;
use crate::identity::Identity;

/// Documents around one document, as served by the link-graph handler-set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighborhood {
    /// Title of the queried document
    pub title: String,
    /// Documents it links to, and documents linking to it
    #[serde(rename = "1")]
    pub hop1: Vec<HopEntry>,
    /// Documents one link further out
    #[serde(rename = "2")]
    pub hop2: Vec<HopEntry>,
}

impl Neighborhood {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// One neighbor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopEntry {
    #[serde(rename = "ID")]
    pub id: Identity,
    #[serde(rename = "Title")]
    pub title: String,
    /// Text around the incoming link; empty for outgoing links, absent in hop 2
    #[serde(rename = "Context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "MIMEType")]
    pub mime_type: String,
}

impl Snapshot {
    /// Neighborhood of the document `id`
    ///
    /// Documents unknown to the snapshot get an empty neighborhood.
    pub fn neighborhood(&self, id: &Identity) -> Neighborhood {
        let mut hop1: Vec<(Identity, String)> = Vec::new();
        for edge in &self.edges {
            if edge.src == *id {
                hop1.push((edge.dst, String::new()));
            }
            if edge.dst == *id {
                hop1.push((edge.src, edge.context.clone()));
            }
        }
        hop1.sort_by_cached_key(|(target, context)| (target.to_string(), context.clone()));
        hop1.dedup();

        let neighbors: HashSet<Identity> = hop1.iter().map(|(target, _)| *target).collect();
        let mut hop2: Vec<Identity> = Vec::new();
        for edge in &self.edges {
            if neighbors.contains(&edge.src) {
                hop2.push(edge.dst);
            }
            if neighbors.contains(&edge.dst) {
                hop2.push(edge.src);
            }
        }
        hop2.retain(|other| other != id);
        hop2.sort_by_cached_key(Identity::to_string);
        hop2.dedup();

        Neighborhood {
            title: self.title(id).to_string(),
            hop1: hop1
                .into_iter()
                .map(|(target, context)| self.entry(target, Some(context)))
                .collect(),
            hop2: hop2
                .into_iter()
                .map(|target| self.entry(target, None))
                .collect(),
        }
    }

    fn entry(&self, id: Identity, context: Option<String>) -> HopEntry {
        HopEntry {
            id,
            title: self.title(&id).to_string(),
            context,
            mime_type: self.mime_type(&id).to_string(),
        }
    }
}
