//! Directed relations between registered types and the edge documents that
//! store them.

use serde_json::{Map, Value};

use crate::entity::TypeTag;

/// A resolved relation between two types, as found in a built registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationEntry {
    pub(crate) from: TypeTag,
    pub(crate) to: TypeTag,
    pub(crate) edge_collection: String,
    pub(crate) explicit_edge: bool,
    pub(crate) from_collection: String,
    pub(crate) to_collection: String,
    pub(crate) from_properties: Vec<String>,
    pub(crate) to_properties: Vec<String>,
}

impl RelationEntry {
    /// The source type.
    pub fn from(&self) -> TypeTag {
        self.from
    }

    /// The target type.
    pub fn to(&self) -> TypeTag {
        self.to
    }

    /// The prefixed edge collection name.
    pub fn edge_collection(&self) -> &str {
        &self.edge_collection
    }

    /// Whether the edge name was given at registration rather than derived.
    pub fn has_explicit_edge(&self) -> bool {
        self.explicit_edge
    }

    /// The prefixed collection `_from` handles point into.
    pub fn from_collection(&self) -> &str {
        &self.from_collection
    }

    /// The prefixed collection `_to` handles point into.
    pub fn to_collection(&self) -> &str {
        &self.to_collection
    }

    /// Properties copied from the source document onto the edge.
    pub fn from_properties(&self) -> &[String] {
        &self.from_properties
    }

    /// Properties copied from the target document onto the edge.
    pub fn to_properties(&self) -> &[String] {
        &self.to_properties
    }

    /// Builds the edge document linking `from_key` to `to_key`.
    ///
    /// The extra properties are copied from `from_doc` and `to_doc` when
    /// present; a property named on both sides keeps the source's value.
    pub fn edge_document(
        &self,
        from_key: &str,
        to_key: &str,
        from_doc: Option<&Value>,
        to_doc: Option<&Value>,
    ) -> Value {
        let mut edge = Map::new();
        edge.insert(
            "_from".into(),
            Value::String(format!("{}/{}", self.from_collection, from_key)),
        );
        edge.insert(
            "_to".into(),
            Value::String(format!("{}/{}", self.to_collection, to_key)),
        );

        copy_properties(&mut edge, &self.from_properties, from_doc);
        copy_properties(&mut edge, &self.to_properties, to_doc);

        Value::Object(edge)
    }
}

fn copy_properties(edge: &mut Map<String, Value>, properties: &[String], source: Option<&Value>) {
    let Some(source) = source else {
        return;
    };

    for property in properties {
        if edge.contains_key(property) {
            continue;
        }
        if let Some(value) = source.get(property) {
            edge.insert(property.clone(), value.clone());
        }
    }
}
