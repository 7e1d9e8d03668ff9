//! Referential-consistency repair before load: relations whose endpoints do not
//! resolve to a node in the snapshot are dropped and reported, never raised.

use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};

use crate::{
    entity::{NaturalKey, NodeCollection, RelationCollection, RelationEntry, Snapshot},
    property::project,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    From,
    To,
}

/// A relation endpoint that did not resolve. `key` is `None` for a null key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsistencyWarning {
    pub relation_kind: String,
    pub endpoint: Endpoint,
    pub label: String,
    pub key: Option<NaturalKey>,
}

/// Values of the loaded nodes, per `(label, property)` pair that relations
/// resolve through.
#[derive(Clone, Debug, Default)]
pub struct NodeKeyIndex {
    keys: AHashMap<(String, String), AHashSet<NaturalKey>>,
}

impl NodeKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes each collection under its natural key property.
    pub fn from_collections(collections: &[NodeCollection]) -> Self {
        let mut index = Self::new();
        for collection in collections {
            index
                .entry(collection.label(), collection.key_property())
                .extend(collection.keys().cloned());
        }
        index
    }

    /// Indexes natural keys plus every lookup property named by a relation
    /// mapping, so the filter agrees with how the backend resolves endpoints.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut index = Self::from_collections(snapshot.nodes());
        for relations in snapshot.relations() {
            let mapping = relations.mapping();
            for (label, property) in [
                (mapping.from_label(), mapping.from_lookup_property()),
                (mapping.to_label(), mapping.to_lookup_property()),
            ] {
                if index.keys.contains_key(&(label.to_string(), property.to_string())) {
                    continue;
                }
                for nodes in snapshot.nodes().iter().filter(|c| c.label() == label) {
                    index.index_property(nodes, property);
                }
            }
        }
        index
    }

    /// Adds the projected `property` value of every node in `collection`.
    /// Nodes without the property contribute nothing.
    pub fn index_property(&mut self, collection: &NodeCollection, property: &str) {
        if property == collection.key_property() {
            self.entry(collection.label(), property)
                .extend(collection.keys().cloned());
            return;
        }
        let values: Vec<NaturalKey> = collection
            .entries()
            .iter()
            .filter_map(|entry| {
                project(entry.record())
                    .get(property)
                    .map(NaturalKey::from_property)
            })
            .collect();
        self.entry(collection.label(), property).extend(values);
    }

    pub fn insert(&mut self, label: &str, property: &str, key: NaturalKey) {
        self.entry(label, property).insert(key);
    }

    pub fn contains(&self, label: &str, property: &str, key: &NaturalKey) -> bool {
        self.keys_for(label, property)
            .map(|set| set.contains(key))
            .unwrap_or(false)
    }

    pub fn keys_for(&self, label: &str, property: &str) -> Option<&AHashSet<NaturalKey>> {
        self.keys.get(&(label.to_string(), property.to_string()))
    }

    fn entry(&mut self, label: &str, property: &str) -> &mut AHashSet<NaturalKey> {
        self.keys
            .entry((label.to_string(), property.to_string()))
            .or_default()
    }
}

/// Anything with two natural-key endpoints.
pub trait Endpoints {
    fn from_key(&self) -> Option<&NaturalKey>;
    fn to_key(&self) -> Option<&NaturalKey>;
}

impl Endpoints for RelationEntry {
    fn from_key(&self) -> Option<&NaturalKey> {
        RelationEntry::from_key(self)
    }

    fn to_key(&self) -> Option<&NaturalKey> {
        RelationEntry::to_key(self)
    }
}

#[derive(Debug)]
pub struct FilterOutcome<'a, R> {
    pub kept: Vec<&'a R>,
    pub dropped_count: usize,
    pub missing_from: BTreeSet<NaturalKey>,
    pub missing_to: BTreeSet<NaturalKey>,
    /// Dropped relations that had a null endpoint.
    pub null_endpoints: usize,
}

impl<R> FilterOutcome<'_, R> {
    /// Every distinct key that failed to resolve, on either side.
    pub fn dropped_keys(&self) -> BTreeSet<NaturalKey> {
        self.missing_from.union(&self.missing_to).cloned().collect()
    }
}

/// Keeps the relations whose `from` key is in `valid_from` and `to` key is in
/// `valid_to`. Source order of the kept relations is preserved.
pub fn filter_relations<'a, R: Endpoints>(
    valid_from: &AHashSet<NaturalKey>,
    valid_to: &AHashSet<NaturalKey>,
    relations: &'a [R],
) -> FilterOutcome<'a, R> {
    let mut outcome = FilterOutcome {
        kept: Vec::with_capacity(relations.len()),
        dropped_count: 0,
        missing_from: BTreeSet::new(),
        missing_to: BTreeSet::new(),
        null_endpoints: 0,
    };
    for relation in relations {
        let from_ok = resolve(relation.from_key(), valid_from, &mut outcome.missing_from);
        let to_ok = resolve(relation.to_key(), valid_to, &mut outcome.missing_to);
        if from_ok && to_ok {
            outcome.kept.push(relation);
            continue;
        }
        if relation.from_key().is_none() || relation.to_key().is_none() {
            outcome.null_endpoints += 1;
        }
        outcome.dropped_count += 1;
    }
    outcome
}

fn resolve(
    key: Option<&NaturalKey>,
    valid: &AHashSet<NaturalKey>,
    missing: &mut BTreeSet<NaturalKey>,
) -> bool {
    match key {
        Some(key) if valid.contains(key) => true,
        Some(key) => {
            missing.insert(key.clone());
            false
        }
        None => false,
    }
}

/// Result of filtering one relation kind.
#[derive(Debug)]
pub struct RelationFilterReport<'a> {
    pub kind: String,
    pub kept: Vec<&'a RelationEntry>,
    pub dropped_count: usize,
    pub warnings: Vec<ConsistencyWarning>,
}

/// Filters every relation kind against the same node value index.
pub struct ConsistencyFilter<'i> {
    index: &'i NodeKeyIndex,
}

impl<'i> ConsistencyFilter<'i> {
    pub fn new(index: &'i NodeKeyIndex) -> Self {
        Self { index }
    }

    pub fn apply<'a>(&self, collection: &'a RelationCollection) -> RelationFilterReport<'a> {
        let mapping = collection.mapping();
        let empty = AHashSet::new();
        let valid_from = self
            .index
            .keys_for(mapping.from_label(), mapping.from_lookup_property())
            .unwrap_or(&empty);
        let valid_to = self
            .index
            .keys_for(mapping.to_label(), mapping.to_lookup_property())
            .unwrap_or(&empty);
        let outcome = filter_relations(valid_from, valid_to, collection.entries());

        let mut warnings = Vec::new();
        for key in &outcome.missing_from {
            tracing::debug!(kind = collection.kind(), label = mapping.from_label(), %key, "from endpoint not found");
            warnings.push(ConsistencyWarning {
                relation_kind: collection.kind().to_string(),
                endpoint: Endpoint::From,
                label: mapping.from_label().to_string(),
                key: Some(key.clone()),
            });
        }
        for key in &outcome.missing_to {
            tracing::debug!(kind = collection.kind(), label = mapping.to_label(), %key, "to endpoint not found");
            warnings.push(ConsistencyWarning {
                relation_kind: collection.kind().to_string(),
                endpoint: Endpoint::To,
                label: mapping.to_label().to_string(),
                key: Some(key.clone()),
            });
        }
        for entry in collection.entries() {
            if entry.from_key().is_none() {
                warnings.push(null_warning(collection, Endpoint::From));
            }
            if entry.to_key().is_none() {
                warnings.push(null_warning(collection, Endpoint::To));
            }
        }

        RelationFilterReport {
            kind: collection.kind().to_string(),
            kept: outcome.kept,
            dropped_count: outcome.dropped_count,
            warnings,
        }
    }
}

fn null_warning(collection: &RelationCollection, endpoint: Endpoint) -> ConsistencyWarning {
    let mapping = collection.mapping();
    let label = match endpoint {
        Endpoint::From => mapping.from_label(),
        Endpoint::To => mapping.to_label(),
    };
    ConsistencyWarning {
        relation_kind: collection.kind().to_string(),
        endpoint,
        label: label.to_string(),
        key: None,
    }
}
