//! Query result rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Stable identifier of one record across every projection.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EntityId = String;

/// One record returned by the query engine.
///
/// Field values stay untyped; the renderer resolves them through the facet
/// names of the active projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: EntityId,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, facet: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(facet.into(), value.into());
        self
    }

    pub fn field(&self, facet: &str) -> Option<&Value> {
        self.fields.get(facet)
    }
}
