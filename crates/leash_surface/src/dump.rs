//! Structured debug dumps
//!
//! Dumps are read-only trees of fields keyed by stable numeric ids, so
//! diagnostic tooling can rely on the ids even if display names change.

use serde::Serialize;

/// Field ids for a thumbnail dump
pub mod thumbnail_fields {
    pub const WIDTH: u32 = 1;
    pub const HEIGHT: u32 = 2;
    pub const SURFACE_ANIMATOR: u32 = 4;
}

/// Field ids for a leash coordinator dump
pub mod animator_fields {
    pub const LEASH: u32 = 1;
    pub const ANIMATION_START_DELAYED: u32 = 2;
    pub const ANIMATION: u32 = 3;
    pub const ANIMATION_TYPE: u32 = 4;
}

/// A dumped value
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DumpValue {
    U64(u64),
    Bool(bool),
    Str(String),
    Node(DumpNode),
}

/// One field of a dump
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DumpField {
    pub id: u32,
    pub name: &'static str,
    pub value: DumpValue,
}

/// A dumped object
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DumpNode {
    pub fields: Vec<DumpField>,
}

impl DumpNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder pattern)
    pub fn field(mut self, id: u32, name: &'static str, value: impl Into<DumpValue>) -> Self {
        self.fields.push(DumpField {
            id,
            name,
            value: value.into(),
        });
        self
    }

    /// Look up a field by id
    pub fn get(&self, id: u32) -> Option<&DumpValue> {
        self.fields.iter().find(|f| f.id == id).map(|f| &f.value)
    }

    /// Look up a nested node by id
    pub fn node(&self, id: u32) -> Option<&DumpNode> {
        match self.get(id) {
            Some(DumpValue::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl From<u64> for DumpValue {
    fn from(v: u64) -> Self {
        DumpValue::U64(v)
    }
}

impl From<u32> for DumpValue {
    fn from(v: u32) -> Self {
        DumpValue::U64(v as u64)
    }
}

impl From<bool> for DumpValue {
    fn from(v: bool) -> Self {
        DumpValue::Bool(v)
    }
}

impl From<&str> for DumpValue {
    fn from(v: &str) -> Self {
        DumpValue::Str(v.to_string())
    }
}

impl From<String> for DumpValue {
    fn from(v: String) -> Self {
        DumpValue::Str(v)
    }
}

impl From<DumpNode> for DumpValue {
    fn from(v: DumpNode) -> Self {
        DumpValue::Node(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id() {
        let inner = DumpNode::new().field(animator_fields::ANIMATION_START_DELAYED, "delayed", false);
        let node = DumpNode::new()
            .field(thumbnail_fields::WIDTH, "width", 200u32)
            .field(thumbnail_fields::SURFACE_ANIMATOR, "surface_animator", inner);

        assert_eq!(node.get(thumbnail_fields::WIDTH), Some(&DumpValue::U64(200)));
        assert_eq!(node.get(thumbnail_fields::HEIGHT), None);
        let nested = node.node(thumbnail_fields::SURFACE_ANIMATOR).unwrap();
        assert_eq!(
            nested.get(animator_fields::ANIMATION_START_DELAYED),
            Some(&DumpValue::Bool(false))
        );
    }

    #[test]
    fn test_json_shape() {
        let node = DumpNode::new().field(thumbnail_fields::HEIGHT, "height", 100u32);
        let json = node.to_json();
        assert_eq!(json["fields"][0]["id"], 2);
        assert_eq!(json["fields"][0]["name"], "height");
        assert_eq!(json["fields"][0]["value"], 100);
    }
}
