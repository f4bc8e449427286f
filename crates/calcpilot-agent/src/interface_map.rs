//! Interface map: a frozen snapshot of the application's clickable surface.
//!
//! Produced by an external labeling pipeline as JSON:
//!
//! ```json
//! { "states": { "root": { "image": "root.png", "nodes": {
//!     "icon_12": { "bbox": [10, 20, 50, 60], "g_icon_name": "7 Button", "g_brief": "digit seven" }
//! } } } }
//! ```
//!
//! Node order is preserved from the document, since resolution is first-match.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// The whole map: state id → state.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceMap {
    pub states: HashMap<String, StateMap>,
}

impl InterfaceMap {
    /// Load a map from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Map(format!("failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse a map from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: InterfaceMap = serde_json::from_str(json)?;
        if map.states.is_empty() {
            return Err(Error::Map("no states defined".into()));
        }
        Ok(map)
    }

    /// Look up a state by id.
    pub fn state(&self, id: &str) -> Result<&StateMap> {
        self.states
            .get(id)
            .ok_or_else(|| Error::Map(format!("state '{}' not found", id)))
    }
}

/// One captured application state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateMap {
    /// Screenshot the labels were produced from.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub nodes: Nodes,
}

impl StateMap {
    pub fn get(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.0.iter().find(|(k, _)| k == id).map(|(_, n)| n)
    }

    /// Nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeRecord)> {
        self.nodes.0.iter().map(|(k, n)| (k.as_str(), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.0.is_empty()
    }
}

/// Node id → record, in document order.
#[derive(Debug, Clone, Default)]
pub struct Nodes(Vec<(String, NodeRecord)>);

impl FromIterator<(String, NodeRecord)> for Nodes {
    fn from_iter<I: IntoIterator<Item = (String, NodeRecord)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for Nodes {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(NodesVisitor)
    }
}

struct NodesVisitor;

impl<'de> Visitor<'de> for NodesVisitor {
    type Value = Nodes;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of node id to node record")
    }

    fn visit_map<M>(self, mut map: M) -> std::result::Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut nodes = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((id, node)) = map.next_entry::<String, NodeRecord>()? {
            nodes.push((id, node));
        }
        Ok(Nodes(nodes))
    }
}

/// A labeled, clickable element.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NodeRecord {
    /// `[x1, y1, x2, y2]` relative to the window origin.
    #[serde(default)]
    pub bbox: Vec<i64>,
    /// Short label, e.g. "7 Button" or "M+ Button".
    #[serde(rename = "g_icon_name", alias = "icon_name", default)]
    pub icon_name: String,
    /// Longer description, e.g. "addition operator".
    #[serde(rename = "g_brief", alias = "brief", default)]
    pub brief: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "yes")]
    pub interactive: bool,
}

fn yes() -> bool {
    true
}

impl NodeRecord {
    /// Validated bounding box. Anything but four values is an upstream defect.
    pub fn bbox(&self, node_id: &str) -> Result<BBox> {
        match self.bbox.as_slice() {
            &[x1, y1, x2, y2] => Ok(BBox {
                x1: to_i32(x1, node_id)?,
                y1: to_i32(y1, node_id)?,
                x2: to_i32(x2, node_id)?,
                y2: to_i32(y2, node_id)?,
            }),
            other => Err(Error::MalformedNode {
                node_id: node_id.to_string(),
                len: other.len(),
            }),
        }
    }
}

fn to_i32(v: i64, node_id: &str) -> Result<i32> {
    i32::try_from(v).map_err(|_| Error::Map(format!("bbox value {} out of range for {}", v, node_id)))
}

/// Element rectangle in window-relative pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    /// Integer midpoint, floored on both axes.
    pub fn center(&self) -> (i32, i32) {
        (
            (self.x1 + self.x2).div_euclid(2),
            (self.y1 + self.y2).div_euclid(2),
        )
    }
}
