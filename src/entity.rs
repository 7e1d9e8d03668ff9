//! Entity declarations and the type-erased collections that make up a [`Snapshot`].
//!
//! Node and relation types implement [`NodeEntity`] / [`RelationEntity`], normally
//! through [`graph_node!`](crate::graph_node) and
//! [`graph_relation!`](crate::graph_relation). Collections erase the concrete type
//! once the natural keys have been read, so a snapshot can hold any number of kinds.

use std::fmt;

use crate::{
    mapping::MappingConfig,
    property::{FieldValue, PropertyValue, Record, coerce, normalize_field_name},
};

/// A record stored as a graph vertex.
pub trait NodeEntity: Record {
    const LABEL: &'static str;
    /// Declared name of the natural key field.
    const KEY_FIELD: &'static str;
    const FIELD_NAMES: &'static [&'static str];

    fn natural_key(&self) -> FieldValue;
}

/// A record describing a directed edge between two node natural keys.
pub trait RelationEntity: Record {
    const KIND: &'static str;
    const FIELD_NAMES: &'static [&'static str];

    fn from_key(&self) -> FieldValue;
    fn to_key(&self) -> FieldValue;
}

/// Declares a node struct together with its [`Record`] and [`NodeEntity`] impls.
///
/// ```
/// graphload::graph_node! {
///     #[derive(Clone, Debug)]
///     pub struct City: "City", key = code {
///         pub code: String,
///         pub population: i64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! graph_node {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $label:literal, key = $key:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $ty, )*
        }

        impl $crate::property::Record for $name {
            fn fields(&self) -> ::std::vec::Vec<(&'static str, $crate::property::FieldValue)> {
                ::std::vec![
                    $( (
                        stringify!($field),
                        $crate::property::AsFieldValue::as_field_value(&self.$field),
                    ), )*
                ]
            }
        }

        impl $crate::entity::NodeEntity for $name {
            const LABEL: &'static str = $label;
            const KEY_FIELD: &'static str = stringify!($key);
            const FIELD_NAMES: &'static [&'static str] = &[ $( stringify!($field) ),* ];

            fn natural_key(&self) -> $crate::property::FieldValue {
                $crate::property::AsFieldValue::as_field_value(&self.$key)
            }
        }
    };
}

/// Declares a relation struct with `from_key` / `to_key` endpoint fields followed
/// by its extra properties.
///
/// ```
/// graphload::graph_relation! {
///     #[derive(Clone, Debug)]
///     pub struct Borders: "Borders", from = String, to = String {
///         pub length_km: f64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! graph_relation {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident : $kind:literal, from = $fty:ty, to = $tty:ty {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            pub from_key: $fty,
            pub to_key: $tty,
            $( $(#[$fmeta])* $fvis $field: $ty, )*
        }

        impl $crate::property::Record for $name {
            fn fields(&self) -> ::std::vec::Vec<(&'static str, $crate::property::FieldValue)> {
                ::std::vec![
                    ("from_key", $crate::property::AsFieldValue::as_field_value(&self.from_key)),
                    ("to_key", $crate::property::AsFieldValue::as_field_value(&self.to_key)),
                    $( (
                        stringify!($field),
                        $crate::property::AsFieldValue::as_field_value(&self.$field),
                    ), )*
                ]
            }
        }

        impl $crate::entity::RelationEntity for $name {
            const KIND: &'static str = $kind;
            const FIELD_NAMES: &'static [&'static str] =
                &[ "from_key", "to_key", $( stringify!($field) ),* ];

            fn from_key(&self) -> $crate::property::FieldValue {
                $crate::property::AsFieldValue::as_field_value(&self.from_key)
            }

            fn to_key(&self) -> $crate::property::FieldValue {
                $crate::property::AsFieldValue::as_field_value(&self.to_key)
            }
        }
    };
}

/// Hashable form of a natural key, used for endpoint consistency checks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NaturalKey {
    Integer(i64),
    Text(String),
}

impl NaturalKey {
    /// `None` for null keys, which can never be resolved.
    pub fn from_field(value: &FieldValue) -> Option<Self> {
        coerce(value.clone()).map(|value| Self::from_property(&value))
    }

    pub fn from_property(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Integer(int) => NaturalKey::Integer(*int),
            PropertyValue::Text(text) => NaturalKey::Text(text.clone()),
            PropertyValue::Float(float) => NaturalKey::Text(float.to_string()),
            PropertyValue::Boolean(flag) => NaturalKey::Text(flag.to_string()),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::Integer(int) => write!(f, "{int}"),
            NaturalKey::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<i64> for NaturalKey {
    fn from(value: i64) -> Self {
        NaturalKey::Integer(value)
    }
}

impl From<&str> for NaturalKey {
    fn from(value: &str) -> Self {
        NaturalKey::Text(value.to_string())
    }
}

type BoxedRecord = Box<dyn Record + Send + Sync>;

pub struct NodeEntry {
    key: Option<NaturalKey>,
    record: BoxedRecord,
}

impl NodeEntry {
    pub fn key(&self) -> Option<&NaturalKey> {
        self.key.as_ref()
    }

    pub fn record(&self) -> &dyn Record {
        self.record.as_ref()
    }
}

impl fmt::Debug for NodeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeEntry").field("key", &self.key).finish()
    }
}

/// All nodes of one kind, in source order.
pub struct NodeCollection {
    label: String,
    key_property: String,
    fields: Vec<String>,
    entries: Vec<NodeEntry>,
}

impl NodeCollection {
    pub fn from_entities<T>(entities: Vec<T>) -> Self
    where
        T: NodeEntity + Send + Sync + 'static,
    {
        let entries = entities
            .into_iter()
            .map(|entity| NodeEntry {
                key: NaturalKey::from_field(&entity.natural_key()),
                record: Box::new(entity) as BoxedRecord,
            })
            .collect();
        Self {
            label: T::LABEL.to_string(),
            key_property: normalize_field_name(T::KEY_FIELD),
            fields: T::FIELD_NAMES
                .iter()
                .map(|name| normalize_field_name(name))
                .collect(),
            entries,
        }
    }

    /// Stores the nodes under a label other than the declared one.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn key_property(&self) -> &str {
        &self.key_property
    }

    /// Normalized names of every declared field.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn entries(&self) -> &[NodeEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &NaturalKey> {
        self.entries.iter().filter_map(NodeEntry::key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for NodeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCollection")
            .field("label", &self.label)
            .field("key_property", &self.key_property)
            .field("len", &self.entries.len())
            .finish()
    }
}

pub struct RelationEntry {
    from: Option<NaturalKey>,
    to: Option<NaturalKey>,
    record: BoxedRecord,
}

impl RelationEntry {
    pub fn from_key(&self) -> Option<&NaturalKey> {
        self.from.as_ref()
    }

    pub fn to_key(&self) -> Option<&NaturalKey> {
        self.to.as_ref()
    }

    pub fn record(&self) -> &dyn Record {
        self.record.as_ref()
    }
}

impl fmt::Debug for RelationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationEntry")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// All relations of one kind together with the mapping that resolves them.
pub struct RelationCollection {
    kind: String,
    mapping: MappingConfig,
    fields: Vec<String>,
    entries: Vec<RelationEntry>,
}

impl RelationCollection {
    pub fn from_relations<T>(mapping: MappingConfig, relations: Vec<T>) -> Self
    where
        T: RelationEntity + Send + Sync + 'static,
    {
        let entries = relations
            .into_iter()
            .map(|relation| RelationEntry {
                from: NaturalKey::from_field(&relation.from_key()),
                to: NaturalKey::from_field(&relation.to_key()),
                record: Box::new(relation) as BoxedRecord,
            })
            .collect();
        Self {
            kind: T::KIND.to_string(),
            mapping,
            fields: T::FIELD_NAMES
                .iter()
                .map(|name| normalize_field_name(name))
                .collect(),
            entries,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn mapping(&self) -> &MappingConfig {
        &self.mapping
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn entries(&self) -> &[RelationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for RelationCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationCollection")
            .field("kind", &self.kind)
            .field("mapping", &self.mapping)
            .field("len", &self.entries.len())
            .finish()
    }
}

/// The full input of one reload: node kinds first, relation kinds after.
#[derive(Debug, Default)]
pub struct Snapshot {
    nodes: Vec<NodeCollection>,
    relations: Vec<RelationCollection>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, collection: NodeCollection) -> Self {
        self.nodes.push(collection);
        self
    }

    pub fn with_relations(mut self, collection: RelationCollection) -> Self {
        self.relations.push(collection);
        self
    }

    pub fn nodes(&self) -> &[NodeCollection] {
        &self.nodes
    }

    pub fn relations(&self) -> &[RelationCollection] {
        &self.relations
    }

    pub fn node_collection(&self, label: &str) -> Option<&NodeCollection> {
        self.nodes.iter().find(|c| c.label() == label)
    }

    /// Number of nodes plus relations before any consistency filtering.
    pub fn item_count(&self) -> usize {
        self.nodes.iter().map(NodeCollection::len).sum::<usize>()
            + self.relations.iter().map(RelationCollection::len).sum::<usize>()
    }
}
