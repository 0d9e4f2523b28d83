//! Application types known to the mapping registry.
//!
//! Types are identified by a [`TypeTag`], an explicit name chosen by the
//! application, instead of runtime type information. Implementing [`Entity`]
//! binds a Rust type to its tag so the typed helpers of the registry can be
//! used.

use std::fmt;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};
use uuid::Uuid;

use crate::error::{ArangoError, ArangoResult};

/// Stable name of an application type inside the mapping registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(&'static str);

impl TypeTag {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

impl From<&'static str> for TypeTag {
    fn from(name: &'static str) -> Self {
        Self(name)
    }
}

/// A type that is stored in, or read from, the database.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: String,
///     pub name: String,
/// }
///
/// impl Entity for User {
///     fn type_tag() -> TypeTag {
///         TypeTag::new("User")
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// The tag this type is registered under.
    fn type_tag() -> TypeTag;

    /// The natural key of this value, if the type carries one.
    fn key(&self) -> Option<String> {
        None
    }
}

/// Conversion helpers, implemented for every [`Entity`].
pub trait EntityExt: Entity {
    /// Converts this value to a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> ArangoResult<Value>;

    /// Creates a value from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the type.
    fn from_json(value: Value) -> ArangoResult<Self>;
}

impl<E: Entity> EntityExt for E {
    fn to_json(&self) -> ArangoResult<Value> {
        to_value(self).map_err(|e| ArangoError::Serialization(e.to_string()))
    }

    fn from_json(value: Value) -> ArangoResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Generates a fresh document key.
pub fn new_key() -> String {
    Uuid::new_v4().to_string()
}
