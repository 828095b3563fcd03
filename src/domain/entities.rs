//! Domain entities: serializable tree outlines
//!
//! An outline is the nested, owned form of a subclone tree used by documents
//! and by the builder. The arena form (`SubcloneTree`) is what the
//! comparison code reads.

use serde::{Deserialize, Serialize};

use crate::domain::event::SomaticEvent;

/// A whole tree: optional name plus the root subclone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeOutline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub root: SubcloneOutline,
}

/// One subclone with its local events and nested children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubcloneOutline {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
    pub events: Vec<SomaticEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SubcloneOutline>,
}

impl SubcloneOutline {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = SomaticEvent>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn with_child(mut self, child: SubcloneOutline) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = Some(fraction);
        self
    }
}
