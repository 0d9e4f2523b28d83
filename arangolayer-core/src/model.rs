//! Mapping registry: application types to collections, keys, discriminators
//! and edge relations.
//!
//! The registry is configured once at startup through a [`ModelBuilder`] and
//! frozen into a [`ModelRegistry`] by [`ModelBuilder::build`], which applies the
//! collection prefixes and derives edge collection names. The built registry
//! is read-only and can be shared between threads without synchronization.
//!
//! # Aliases
//!
//! An *alias* is a type that shares storage with one or more *main* types,
//! such as an interface implemented by several stored types or a view type
//! projected from one. Lookups for an alias without its own entry fall back to
//! its main types.
//!
//! # Example
//!
//! ```ignore
//! let mut builder = ModelBuilder::new();
//! builder
//!     .set_collection(USER, "users")
//!     .set_key_property(USER, "id")
//!     .set_discriminator(USER, "Kind", "User")
//!     .set_collection(GROUP, "groups")
//!     .add_alias(USER, PROFILE)
//!     .add_alias(GROUP, PROFILE)
//!     .add_relation(USER, GROUP, None, &[], &[]);
//!
//! let registry = builder.build("prod_", "prod_query_")?;
//! assert_eq!(registry.edge_collection(USER, GROUP), Some("prod_users_groups"));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    entity::{Entity, TypeTag},
    error::{ArangoError, ArangoResult},
    relation::RelationEntry,
};

/// Dense index assigned to a type when it is first registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeSlot(pub u32);

/// Which prefix a collection receives at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollectionScope {
    /// Write-side storage, prefixed with the collection prefix.
    #[default]
    Command,
    /// Read-model storage, prefixed with the query-collection prefix.
    Query,
}

/// Kind of collection to create on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionKind {
    Document,
    Edge,
}

impl CollectionKind {
    /// The numeric collection type used by the HTTP API.
    pub fn type_code(&self) -> u8 {
        match self {
            CollectionKind::Document => 2,
            CollectionKind::Edge => 3,
        }
    }
}

/// A collection the registry expects to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub kind: CollectionKind,
}

/// Property/value pair telling polymorphic variants in one collection apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    pub property: String,
    pub value: Value,
}

impl Discriminator {
    pub fn new(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Whether `document` carries this discriminator.
    pub fn matches(&self, document: &Value) -> bool {
        document.get(&self.property) == Some(&self.value)
    }

    /// Stamps the discriminator onto `document` if it is an object.
    pub fn apply(&self, document: &mut Value) {
        if let Value::Object(map) = document {
            map.insert(self.property.clone(), self.value.clone());
        }
    }
}

#[derive(Debug, Clone)]
struct EntityConfig {
    tag: TypeTag,
    collection: Option<String>,
    scope: CollectionScope,
    alias_collections: BTreeMap<TypeTag, String>,
    key_property: Option<String>,
    discriminator: Option<Discriminator>,
    alias_discriminators: BTreeMap<TypeTag, Discriminator>,
}

impl EntityConfig {
    fn new(tag: TypeTag) -> Self {
        Self {
            tag,
            collection: None,
            scope: CollectionScope::Command,
            alias_collections: BTreeMap::new(),
            key_property: None,
            discriminator: None,
            alias_discriminators: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct RelationConfig {
    from: TypeTag,
    to: TypeTag,
    edge_name: Option<String>,
    from_properties: Vec<String>,
    to_properties: Vec<String>,
}

/// Accumulates mapping configuration before the registry is built.
///
/// Setters register the type on first use, so calling
/// [`register_entity`](Self::register_entity) first is optional.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    entities: Vec<EntityConfig>,
    index: HashMap<TypeTag, usize>,
    aliases: Vec<(TypeTag, TypeTag)>,
    relations: Vec<RelationConfig>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tag`, returning its slot. Registering a known type returns
    /// the existing slot.
    pub fn register_entity(&mut self, tag: TypeTag) -> TypeSlot {
        TypeSlot(self.slot(tag) as u32)
    }

    /// Registers an [`Entity`] type.
    pub fn register<E: Entity>(&mut self) -> TypeSlot {
        self.register_entity(E::type_tag())
    }

    fn slot(&mut self, tag: TypeTag) -> usize {
        if let Some(slot) = self.index.get(&tag) {
            return *slot;
        }

        let slot = self.entities.len();
        self.entities.push(EntityConfig::new(tag));
        self.index.insert(tag, slot);
        slot
    }

    fn entity_mut(&mut self, tag: TypeTag) -> &mut EntityConfig {
        let slot = self.slot(tag);
        &mut self.entities[slot]
    }

    /// Sets the default collection of `tag`.
    pub fn set_collection(&mut self, tag: TypeTag, name: impl Into<String>) -> &mut Self {
        let entity = self.entity_mut(tag);
        entity.collection = Some(name.into());
        entity.scope = CollectionScope::Command;
        self
    }

    /// Sets the default collection of `tag` as a read-model collection,
    /// prefixed with the query-collection prefix.
    pub fn set_query_collection(&mut self, tag: TypeTag, name: impl Into<String>) -> &mut Self {
        let entity = self.entity_mut(tag);
        entity.collection = Some(name.into());
        entity.scope = CollectionScope::Query;
        self
    }

    /// Stores `tag` in `name` when it is accessed as `alias`.
    ///
    /// Also records `alias` as an alias of `tag`.
    pub fn set_alias_collection(
        &mut self,
        tag: TypeTag,
        alias: TypeTag,
        name: impl Into<String>,
    ) -> &mut Self {
        self.entity_mut(tag)
            .alias_collections
            .insert(alias, name.into());
        self.add_alias(tag, alias)
    }

    /// Names the natural key property of `tag`.
    pub fn set_key_property(&mut self, tag: TypeTag, property: impl Into<String>) -> &mut Self {
        self.entity_mut(tag).key_property = Some(property.into());
        self
    }

    /// Sets the discriminator identifying `tag` inside a shared collection.
    pub fn set_discriminator(
        &mut self,
        tag: TypeTag,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.entity_mut(tag).discriminator = Some(Discriminator::new(property, value));
        self
    }

    /// Sets the discriminator used when `tag` is accessed as `alias`.
    ///
    /// Also records `alias` as an alias of `tag`.
    pub fn set_alias_discriminator(
        &mut self,
        tag: TypeTag,
        alias: TypeTag,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.entity_mut(tag)
            .alias_discriminators
            .insert(alias, Discriminator::new(property, value));
        self.add_alias(tag, alias)
    }

    /// Declares `alias` as sharing storage with `main`.
    pub fn add_alias(&mut self, main: TypeTag, alias: TypeTag) -> &mut Self {
        self.slot(main);

        if !self.aliases.contains(&(alias, main)) {
            self.aliases.push((alias, main));
        }
        self
    }

    /// Registers a directed relation from `from` to `to`.
    ///
    /// With `edge_name` set to `None` the edge collection is derived as
    /// `{fromCollection}_{toCollection}` at build time. Only the first
    /// registration of a `(from, to)` pair counts.
    pub fn add_relation(
        &mut self,
        from: TypeTag,
        to: TypeTag,
        edge_name: Option<&str>,
        from_properties: &[&str],
        to_properties: &[&str],
    ) -> &mut Self {
        if self.relations.iter().any(|r| r.from == from && r.to == to) {
            debug!(%from, %to, "relation already registered, ignoring");
            return self;
        }

        self.relations.push(RelationConfig {
            from,
            to,
            edge_name: edge_name.map(str::to_string),
            from_properties: from_properties.iter().map(|p| p.to_string()).collect(),
            to_properties: to_properties.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Freezes the configuration into a [`ModelRegistry`].
    ///
    /// Prefixes are applied to the names as registered, so building again
    /// with the same prefixes yields an identical registry.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Mapping`] if a type is declared an alias of
    /// itself, or if a relation endpoint has no resolvable collection.
    pub fn build(
        &self,
        collection_prefix: &str,
        query_collection_prefix: &str,
    ) -> ArangoResult<ModelRegistry> {
        let mut main_types: HashMap<TypeTag, Vec<TypeTag>> = HashMap::new();
        let mut alias_types: HashMap<TypeTag, Vec<TypeTag>> = HashMap::new();

        for (alias, main) in &self.aliases {
            if alias == main {
                return Err(ArangoError::Mapping(format!(
                    "type {alias} cannot be an alias of itself"
                )));
            }
            main_types.entry(*alias).or_default().push(*main);
            alias_types.entry(*main).or_default().push(*alias);
        }

        let prefix = |scope: CollectionScope, name: &str| match scope {
            CollectionScope::Command => format!("{collection_prefix}{name}"),
            CollectionScope::Query => format!("{query_collection_prefix}{name}"),
        };

        let entries = self
            .entities
            .iter()
            .enumerate()
            .map(|(slot, config)| TypeEntry {
                tag: config.tag,
                slot: TypeSlot(slot as u32),
                collection: config.collection.as_deref().map(|c| prefix(config.scope, c)),
                base_collection: config.collection.clone(),
                scope: config.scope,
                alias_collections: config
                    .alias_collections
                    .iter()
                    .map(|(alias, name)| (*alias, prefix(config.scope, name)))
                    .collect(),
                base_alias_collections: config.alias_collections.clone(),
                key_property: config.key_property.clone(),
                discriminator: config.discriminator.clone(),
                alias_discriminators: config.alias_discriminators.clone(),
            })
            .collect();

        let mut registry = ModelRegistry {
            entries,
            index: self.index.clone(),
            main_types,
            alias_types,
            relations: Vec::with_capacity(self.relations.len()),
            relation_index: HashMap::new(),
            collection_prefix: collection_prefix.to_string(),
            query_collection_prefix: query_collection_prefix.to_string(),
        };

        for relation in &self.relations {
            let entry = registry.resolve_relation(relation)?;
            registry
                .relation_index
                .insert((relation.from, relation.to), registry.relations.len());
            registry.relations.push(entry);
        }

        Ok(registry)
    }
}

/// The frozen configuration of one registered type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeEntry {
    tag: TypeTag,
    slot: TypeSlot,
    collection: Option<String>,
    base_collection: Option<String>,
    scope: CollectionScope,
    alias_collections: BTreeMap<TypeTag, String>,
    base_alias_collections: BTreeMap<TypeTag, String>,
    key_property: Option<String>,
    discriminator: Option<Discriminator>,
    alias_discriminators: BTreeMap<TypeTag, Discriminator>,
}

impl TypeEntry {
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn slot(&self) -> TypeSlot {
        self.slot
    }

    /// The prefixed default collection; `None` for storage-less types.
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn scope(&self) -> CollectionScope {
        self.scope
    }

    /// Prefixed collection overrides per alias.
    pub fn alias_collections(&self) -> &BTreeMap<TypeTag, String> {
        &self.alias_collections
    }

    pub fn key_property(&self) -> Option<&str> {
        self.key_property.as_deref()
    }

    pub fn discriminator(&self) -> Option<&Discriminator> {
        self.discriminator.as_ref()
    }

    pub fn alias_discriminators(&self) -> &BTreeMap<TypeTag, Discriminator> {
        &self.alias_discriminators
    }
}

/// Read-only mapping registry produced by [`ModelBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRegistry {
    entries: Vec<TypeEntry>,
    index: HashMap<TypeTag, usize>,
    main_types: HashMap<TypeTag, Vec<TypeTag>>,
    alias_types: HashMap<TypeTag, Vec<TypeTag>>,
    relations: Vec<RelationEntry>,
    relation_index: HashMap<(TypeTag, TypeTag), usize>,
    collection_prefix: String,
    query_collection_prefix: String,
}

impl ModelRegistry {
    pub fn collection_prefix(&self) -> &str {
        &self.collection_prefix
    }

    pub fn query_collection_prefix(&self) -> &str {
        &self.query_collection_prefix
    }

    /// The entry registered directly for `tag`.
    pub fn entry(&self, tag: TypeTag) -> Option<&TypeEntry> {
        self.index.get(&tag).map(|slot| &self.entries[*slot])
    }

    /// The entry holding `slot`.
    pub fn entry_by_slot(&self, slot: TypeSlot) -> Option<&TypeEntry> {
        self.entries.get(slot.0 as usize)
    }

    /// All registered entries in registration order.
    pub fn entries(&self) -> &[TypeEntry] {
        &self.entries
    }

    /// The main types `tag` is a direct alias of, in declaration order.
    pub fn main_types(&self, tag: TypeTag) -> &[TypeTag] {
        self.main_types.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_alias(&self, tag: TypeTag) -> bool {
        self.main_types.contains_key(&tag)
    }

    /// Resolves the prefixed collection of `tag`.
    ///
    /// A directly registered collection wins. Otherwise, for an alias, the
    /// first main type (in declaration order) with a collection override for
    /// this alias or a default collection provides it. Unknown types resolve
    /// to `None`.
    pub fn collection_name(&self, tag: TypeTag) -> Option<&str> {
        self.resolve_collection(tag, |e| e.collection.as_deref(), |e, alias| {
            e.alias_collections.get(&alias).map(String::as_str)
        })
    }

    /// Typed form of [`collection_name`](Self::collection_name).
    pub fn collection_of<E: Entity>(&self) -> Option<&str> {
        self.collection_name(E::type_tag())
    }

    fn base_collection_name(&self, tag: TypeTag) -> Option<&str> {
        self.resolve_collection(tag, |e| e.base_collection.as_deref(), |e, alias| {
            e.base_alias_collections.get(&alias).map(String::as_str)
        })
    }

    fn resolve_collection<'a>(
        &'a self,
        tag: TypeTag,
        default: impl Fn(&'a TypeEntry) -> Option<&'a str>,
        alias_override: impl Fn(&'a TypeEntry, TypeTag) -> Option<&'a str>,
    ) -> Option<&'a str> {
        if let Some(name) = self.entry(tag).and_then(&default) {
            return Some(name);
        }

        let mains = self.main_types(tag);

        mains
            .iter()
            .filter_map(|main| self.entry(*main))
            .find_map(|main| alias_override(main, tag))
            .or_else(|| {
                mains
                    .iter()
                    .filter_map(|main| self.entry(*main))
                    .find_map(&default)
            })
    }

    /// The key property of `tag`, falling back to its main types.
    pub fn key_property(&self, tag: TypeTag) -> Option<&str> {
        self.entry(tag)
            .and_then(TypeEntry::key_property)
            .or_else(|| {
                self.main_types(tag)
                    .iter()
                    .filter_map(|main| self.entry(*main))
                    .find_map(TypeEntry::key_property)
            })
    }

    /// The discriminator of `tag`.
    ///
    /// Without a direct discriminator, an alias uses the first main type's
    /// alias-scoped discriminator for it, then the first main type's own
    /// discriminator.
    pub fn discriminator(&self, tag: TypeTag) -> Option<&Discriminator> {
        if let Some(discriminator) = self.entry(tag).and_then(TypeEntry::discriminator) {
            return Some(discriminator);
        }

        let mains: Vec<&TypeEntry> = self
            .main_types(tag)
            .iter()
            .filter_map(|main| self.entry(*main))
            .collect();

        mains
            .iter()
            .copied()
            .find_map(|main| main.alias_discriminators.get(&tag))
            .or_else(|| mains.iter().copied().find_map(TypeEntry::discriminator))
    }

    /// Every discriminator of the concrete types behind `tag`, in the order of
    /// [`alias_types`](Self::alias_types). Useful to filter an umbrella alias.
    pub fn discriminators(&self, tag: TypeTag) -> Vec<&Discriminator> {
        self.alias_types(tag)
            .into_iter()
            .filter_map(|concrete| {
                self.entry(concrete).and_then(|e| {
                    e.alias_discriminators
                        .get(&tag)
                        .or(e.discriminator.as_ref())
                })
            })
            .collect()
    }

    /// The concrete types reachable from `tag` through alias links,
    /// transitively, excluding `tag` itself.
    ///
    /// Only types stored somewhere are returned: a collection of their own or
    /// one scoped to `tag` through
    /// [`ModelBuilder::set_alias_collection`]. Order is breadth-first
    /// declaration order.
    pub fn alias_types(&self, tag: TypeTag) -> Vec<TypeTag> {
        let mut seen = HashSet::from([tag]);
        let mut queue: VecDeque<TypeTag> = self.main_types(tag).iter().copied().collect();
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }

            let stored = self.entry(current).is_some_and(|e| {
                e.collection.is_some() || e.alias_collections.contains_key(&tag)
            });
            if stored {
                found.push(current);
            }

            queue.extend(self.main_types(current).iter().copied());
        }

        found
    }

    /// The distinct collections behind `tag`'s concrete types.
    pub fn alias_collections(&self, tag: TypeTag) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();

        for concrete in self.alias_types(tag) {
            let name = self.entry(concrete).and_then(|e| {
                e.alias_collections
                    .get(&tag)
                    .map(String::as_str)
                    .or(e.collection())
            });

            if let Some(name) = name {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        names
    }

    /// Whether `tag` resolves to a read-model collection.
    pub fn is_query_collection(&self, tag: TypeTag) -> bool {
        let scoped = |e: &TypeEntry| e.collection.is_some().then_some(e.scope);

        self.entry(tag)
            .and_then(scoped)
            .or_else(|| {
                self.main_types(tag)
                    .iter()
                    .filter_map(|main| self.entry(*main))
                    .find_map(scoped)
            })
            .is_some_and(|scope| scope == CollectionScope::Query)
    }

    /// The relation registered for `(from, to)`.
    pub fn relation(&self, from: TypeTag, to: TypeTag) -> Option<&RelationEntry> {
        self.relation_index
            .get(&(from, to))
            .map(|i| &self.relations[*i])
    }

    pub fn relations(&self) -> &[RelationEntry] {
        &self.relations
    }

    pub fn relations_from(&self, tag: TypeTag) -> impl Iterator<Item = &RelationEntry> {
        self.relations.iter().filter(move |r| r.from == tag)
    }

    /// The edge collection of the `(from, to)` relation.
    pub fn edge_collection(&self, from: TypeTag, to: TypeTag) -> Option<&str> {
        self.relation(from, to).map(RelationEntry::edge_collection)
    }

    /// Reads the natural key of a document of type `tag`.
    pub fn key_of(&self, tag: TypeTag, document: &Value) -> Option<String> {
        match document.get(self.key_property(tag)?)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The `collection/key` document handle for a document of type `tag`.
    pub fn document_id(&self, tag: TypeTag, key: &str) -> Option<String> {
        self.collection_name(tag).map(|c| format!("{c}/{key}"))
    }

    /// Every collection the registry maps to, document collections first,
    /// without duplicates.
    pub fn collections(&self) -> Vec<CollectionSpec> {
        let mut specs: Vec<CollectionSpec> = Vec::new();
        let mut push = |name: &str, kind: CollectionKind| {
            if !specs.iter().any(|s| s.name == name) {
                specs.push(CollectionSpec {
                    name: name.to_string(),
                    kind,
                });
            }
        };

        for entry in &self.entries {
            if let Some(name) = entry.collection() {
                push(name, CollectionKind::Document);
            }
            for name in entry.alias_collections.values() {
                push(name, CollectionKind::Document);
            }
        }

        for relation in &self.relations {
            push(&relation.edge_collection, CollectionKind::Edge);
        }

        specs
    }

    fn resolve_relation(&self, relation: &RelationConfig) -> ArangoResult<RelationEntry> {
        let unresolved = |tag: TypeTag| {
            ArangoError::Mapping(format!(
                "relation {} -> {} references type {tag} which has no collection",
                relation.from, relation.to
            ))
        };

        let from_base = self
            .base_collection_name(relation.from)
            .ok_or_else(|| unresolved(relation.from))?;
        let to_base = self
            .base_collection_name(relation.to)
            .ok_or_else(|| unresolved(relation.to))?;

        let edge = match &relation.edge_name {
            Some(name) => name.clone(),
            None => format!("{from_base}_{to_base}"),
        };

        Ok(RelationEntry {
            from: relation.from,
            to: relation.to,
            edge_collection: format!("{}{}", self.collection_prefix, edge),
            explicit_edge: relation.edge_name.is_some(),
            from_collection: self
                .collection_name(relation.from)
                .ok_or_else(|| unresolved(relation.from))?
                .to_string(),
            to_collection: self
                .collection_name(relation.to)
                .ok_or_else(|| unresolved(relation.to))?
                .to_string(),
            from_properties: relation.from_properties.clone(),
            to_properties: relation.to_properties.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    const USER: TypeTag = TypeTag::new("User");
    const GROUP: TypeTag = TypeTag::new("Group");
    const ORGANIZATION: TypeTag = TypeTag::new("Organization");
    const PROFILE: TypeTag = TypeTag::new("IProfile");
    const CONTAINER: TypeTag = TypeTag::new("IContainerProfile");
    const USER_VIEW: TypeTag = TypeTag::new("UserView");
    const ROLE: TypeTag = TypeTag::new("Role");
    const TAG: TypeTag = TypeTag::new("Tag");
    const ASSIGNMENT_INDEX: TypeTag = TypeTag::new("AssignmentIndex");

    fn profiles() -> ModelBuilder {
        let mut builder = ModelBuilder::new();
        builder
            .set_collection(USER, "profiles")
            .set_key_property(USER, "id")
            .set_discriminator(USER, "Kind", "User")
            .set_collection(GROUP, "profiles")
            .set_key_property(GROUP, "id")
            .set_discriminator(GROUP, "Kind", "Group")
            .set_collection(ORGANIZATION, "organizations")
            .set_discriminator(ORGANIZATION, "Kind", "Organization")
            .add_alias(USER, PROFILE)
            .add_alias(GROUP, PROFILE)
            .add_alias(GROUP, CONTAINER)
            .add_alias(ORGANIZATION, CONTAINER)
            .set_alias_collection(USER, USER_VIEW, "userViews")
            .set_collection(ROLE, "roles")
            .set_query_collection(TAG, "tags")
            .register_entity(ASSIGNMENT_INDEX);
        builder
    }

    #[test]
    fn registering_twice_returns_the_same_slot() {
        let mut builder = ModelBuilder::new();
        let first = builder.register_entity(USER);
        let second = builder.register_entity(USER);

        assert_eq!(first, second);
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn registers_entity_types_by_tag() {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct User {
            id: String,
        }

        impl Entity for User {
            fn type_tag() -> TypeTag {
                USER
            }
        }

        let mut builder = ModelBuilder::new();
        let slot = builder.register::<User>();
        builder.set_collection(USER, "users");
        let registry = builder.build("", "").unwrap();

        assert_eq!(registry.collection_of::<User>(), Some("users"));
        assert_eq!(registry.entry_by_slot(slot).unwrap().tag(), USER);
    }

    #[test]
    fn prefixes_are_applied_once_per_scope() {
        let registry = profiles().build("p_", "q_").unwrap();

        assert_eq!(registry.collection_name(USER), Some("p_profiles"));
        assert_eq!(registry.collection_name(TAG), Some("q_tags"));
        assert!(registry.is_query_collection(TAG));
        assert!(!registry.is_query_collection(USER));
        assert!(!registry.is_query_collection(ASSIGNMENT_INDEX));
    }

    #[test]
    fn building_twice_with_same_prefixes_is_idempotent() {
        let builder = profiles();
        let first = builder.build("p_", "q_").unwrap();
        let second = builder.build("p_", "q_").unwrap();

        assert_eq!(first, second);
        assert_eq!(second.collection_name(ROLE), Some("p_roles"));
    }

    #[test]
    fn storage_less_and_unknown_types_have_no_collection() {
        let registry = profiles().build("p_", "q_").unwrap();

        assert!(registry.entry(ASSIGNMENT_INDEX).is_some());
        assert_eq!(registry.collection_name(ASSIGNMENT_INDEX), None);
        assert_eq!(registry.collection_name(TypeTag::new("Unknown")), None);
    }

    #[test]
    fn alias_without_entry_uses_main_collection() {
        let registry = profiles().build("p_", "q_").unwrap();

        assert_eq!(registry.collection_name(PROFILE), Some("p_profiles"));
        assert_eq!(registry.collection_name(USER_VIEW), Some("p_userViews"));
        assert_eq!(registry.key_property(PROFILE), Some("id"));
    }

    #[test]
    fn discriminator_falls_back_to_main_type() {
        let mut builder = profiles();
        builder.set_alias_discriminator(GROUP, TypeTag::new("GroupView"), "Kind", "GroupView");
        let registry = builder.build("", "").unwrap();

        assert_eq!(registry.discriminator(USER), Some(&Discriminator::new("Kind", "User")));
        assert_eq!(
            registry.discriminator(USER_VIEW),
            Some(&Discriminator::new("Kind", "User"))
        );
        assert_eq!(
            registry.discriminator(TypeTag::new("GroupView")),
            Some(&Discriminator::new("Kind", "GroupView"))
        );
        assert_eq!(registry.discriminator(TypeTag::new("Unknown")), None);
    }

    #[test]
    fn umbrella_alias_expands_to_concrete_types() {
        let registry = profiles().build("p_", "q_").unwrap();

        assert_eq!(registry.alias_types(PROFILE), vec![USER, GROUP]);
        assert_eq!(registry.alias_collections(PROFILE), vec!["p_profiles"]);
        assert_eq!(
            registry.alias_collections(CONTAINER),
            vec!["p_profiles", "p_organizations"]
        );
        assert_eq!(
            registry.discriminators(CONTAINER),
            vec![
                &Discriminator::new("Kind", "Group"),
                &Discriminator::new("Kind", "Organization")
            ]
        );
    }

    #[test]
    fn alias_expansion_is_transitive_and_excludes_the_alias() {
        let mut builder = profiles();
        let any = TypeTag::new("IAny");
        builder.add_alias(PROFILE, any).add_alias(ROLE, any);
        let registry = builder.build("", "").unwrap();

        assert_eq!(registry.alias_types(any), vec![ROLE, USER, GROUP]);
        assert!(!registry.alias_types(any).contains(&any));
    }

    #[test]
    fn alias_scoped_collections_join_the_alias_expansion() {
        let archived = TypeTag::new("ArchivedUser");
        let mut builder = profiles();
        builder.set_alias_collection(archived, PROFILE, "archive");
        let registry = builder.build("p_", "q_").unwrap();

        assert_eq!(registry.collection_name(archived), None);
        assert_eq!(registry.alias_types(PROFILE), vec![USER, GROUP, archived]);
        assert_eq!(
            registry.alias_collections(PROFILE),
            vec!["p_profiles", "p_archive"]
        );
        assert!(!registry.alias_types(CONTAINER).contains(&archived));
    }

    #[test]
    fn self_alias_is_rejected() {
        let mut builder = ModelBuilder::new();
        builder.add_alias(USER, USER);

        assert!(matches!(builder.build("", ""), Err(ArangoError::Mapping(_))));
    }

    #[test]
    fn derived_edge_names_are_prefixed_once() {
        let mut builder = profiles();
        builder.add_relation(USER, ROLE, None, &[], &[]);
        let registry = builder.build("p_", "q_").unwrap();

        let relation = registry.relation(USER, ROLE).unwrap();
        assert_eq!(relation.edge_collection(), "p_profiles_roles");
        assert!(!relation.has_explicit_edge());
        assert_eq!(relation.from_collection(), "p_profiles");
        assert_eq!(relation.to_collection(), "p_roles");

        let rebuilt = builder.build("p_", "q_").unwrap();
        assert_eq!(rebuilt.edge_collection(USER, ROLE), Some("p_profiles_roles"));
    }

    #[test]
    fn explicit_edge_names_ignore_collection_names() {
        let mut builder = profiles();
        builder.add_relation(GROUP, USER, Some("memberOf"), &["name"], &[]);
        let registry = builder.build("p_", "q_").unwrap();

        assert_eq!(registry.edge_collection(GROUP, USER), Some("p_memberOf"));
        assert!(registry.relation(GROUP, USER).unwrap().has_explicit_edge());
    }

    #[test]
    fn first_relation_registration_wins() {
        let mut builder = profiles();
        builder
            .add_relation(USER, ROLE, Some("first"), &[], &[])
            .add_relation(USER, ROLE, Some("second"), &[], &[]);
        let registry = builder.build("", "").unwrap();

        assert_eq!(registry.relations().len(), 1);
        assert_eq!(registry.edge_collection(USER, ROLE), Some("first"));
    }

    #[test]
    fn relation_to_type_without_collection_fails_build() {
        let mut builder = profiles();
        builder.add_relation(USER, ASSIGNMENT_INDEX, None, &[], &[]);

        match builder.build("p_", "q_") {
            Err(ArangoError::Mapping(msg)) => assert!(msg.contains("AssignmentIndex")),
            other => panic!("expected mapping error, got {other:?}"),
        }
    }

    #[test]
    fn relations_resolve_alias_endpoints() {
        let mut builder = profiles();
        builder.add_relation(PROFILE, ROLE, None, &[], &[]);
        let registry = builder.build("p_", "").unwrap();

        assert_eq!(registry.edge_collection(PROFILE, ROLE), Some("p_profiles_roles"));
        assert_eq!(registry.relations_from(PROFILE).count(), 1);
    }

    #[test]
    fn collection_plan_lists_documents_then_edges() {
        let mut builder = profiles();
        builder.add_relation(USER, ROLE, None, &[], &[]);
        let registry = builder.build("p_", "q_").unwrap();

        let names: Vec<(String, CollectionKind)> = registry
            .collections()
            .into_iter()
            .map(|s| (s.name, s.kind))
            .collect();

        assert_eq!(
            names,
            vec![
                ("p_profiles".to_string(), CollectionKind::Document),
                ("p_userViews".to_string(), CollectionKind::Document),
                ("p_organizations".to_string(), CollectionKind::Document),
                ("p_roles".to_string(), CollectionKind::Document),
                ("q_tags".to_string(), CollectionKind::Document),
                ("p_profiles_roles".to_string(), CollectionKind::Edge),
            ]
        );
    }

    #[test]
    fn keys_and_document_ids() {
        let registry = profiles().build("p_", "").unwrap();
        let user = json!({"id": "u-1", "Kind": "User"});

        assert_eq!(registry.key_of(USER, &user), Some("u-1".to_string()));
        assert_eq!(registry.key_of(ROLE, &user), None);
        assert_eq!(registry.document_id(USER, "u-1"), Some("p_profiles/u-1".to_string()));
    }

    #[test]
    fn discriminators_match_and_stamp_documents() {
        let discriminator = Discriminator::new("Kind", "Group");
        let mut document = json!({"name": "admins"});

        assert!(!discriminator.matches(&document));
        discriminator.apply(&mut document);
        assert!(discriminator.matches(&document));
        assert_eq!(document["Kind"], "Group");
    }

    #[test]
    fn built_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModelRegistry>();
    }
}
