use ahash::AHashSet;
use graphload::{
    NaturalKey, NodeCollection, NodeKeyIndex, RelationCollection, Snapshot,
    consistency::{ConsistencyFilter, Endpoint, Endpoints, filter_relations},
    graph_relation,
    mapping::MappingConfig,
    movies::{ActedIn, Directed, Movie, Person, acted_in_mapping, directed_mapping},
};

graph_relation! {
    #[derive(Clone, Debug)]
    struct MaybeActed: "MaybeActed", from = Option<i64>, to = Option<i64> {}
}

struct Edge {
    from: Option<NaturalKey>,
    to: Option<NaturalKey>,
}

impl Endpoints for Edge {
    fn from_key(&self) -> Option<&NaturalKey> {
        self.from.as_ref()
    }

    fn to_key(&self) -> Option<&NaturalKey> {
        self.to.as_ref()
    }
}

fn edge(from: i64, to: i64) -> Edge {
    Edge {
        from: Some(NaturalKey::Integer(from)),
        to: Some(NaturalKey::Integer(to)),
    }
}

fn keys(values: &[i64]) -> AHashSet<NaturalKey> {
    values.iter().map(|v| NaturalKey::Integer(*v)).collect()
}

fn people_and_movies() -> Vec<NodeCollection> {
    vec![
        NodeCollection::from_entities(vec![Person::new(1, "Alice"), Person::new(2, "Bob")]),
        NodeCollection::from_entities(vec![Movie::new(10, "Arrival")]),
    ]
}

#[test]
fn test_filter_keeps_only_resolvable_relations() {
    let relations = vec![edge(1, 10), edge(1, 999), edge(3, 10), edge(2, 10)];
    let outcome = filter_relations(&keys(&[1, 2]), &keys(&[10]), &relations);
    assert_eq!(outcome.kept.len(), 2);
    assert_eq!(outcome.dropped_count, 2);
    assert_eq!(outcome.kept.len() + outcome.dropped_count, relations.len());
    assert!(outcome.missing_to.contains(&NaturalKey::Integer(999)));
    assert!(outcome.missing_from.contains(&NaturalKey::Integer(3)));
    assert_eq!(outcome.dropped_keys().len(), 2);
}

#[test]
fn test_filter_is_idempotent() {
    let relations = vec![edge(1, 10), edge(5, 10), edge(2, 11)];
    let from = keys(&[1, 2]);
    let to = keys(&[10, 11]);
    let first = filter_relations(&from, &to, &relations);
    let kept: Vec<Edge> = first
        .kept
        .iter()
        .map(|e| Edge {
            from: e.from.clone(),
            to: e.to.clone(),
        })
        .collect();
    let second = filter_relations(&from, &to, &kept);
    assert_eq!(second.kept.len(), kept.len());
    assert_eq!(second.dropped_count, 0);
}

#[test]
fn test_nothing_missing_reports_no_drops() {
    let relations = vec![edge(1, 10)];
    let outcome = filter_relations(&keys(&[1]), &keys(&[10]), &relations);
    assert_eq!(outcome.dropped_count, 0);
    assert!(outcome.dropped_keys().is_empty());
}

#[test]
fn test_integer_and_text_keys_do_not_match() {
    let relations = vec![Edge {
        from: Some(NaturalKey::from("1")),
        to: Some(NaturalKey::Integer(10)),
    }];
    let outcome = filter_relations(&keys(&[1]), &keys(&[10]), &relations);
    assert_eq!(outcome.dropped_count, 1);
}

#[test]
fn test_filter_collection_reports_missing_endpoint() {
    let nodes = people_and_movies();
    let index = NodeKeyIndex::from_collections(&nodes);
    let relations = RelationCollection::from_relations(
        acted_in_mapping(),
        vec![ActedIn::new(1, 10, 0, "Lead"), ActedIn::new(1, 999, 1, "Cameo")],
    );
    let report = ConsistencyFilter::new(&index).apply(&relations);
    assert_eq!(report.kind, "ActedIn");
    assert_eq!(report.kept.len(), 1);
    assert_eq!(report.dropped_count, 1);
    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.endpoint, Endpoint::To);
    assert_eq!(warning.label, "Movie");
    assert_eq!(warning.key, Some(NaturalKey::Integer(999)));
}

#[test]
fn test_all_relation_kinds_use_same_index() {
    let snapshot = Snapshot::new()
        .with_nodes(NodeCollection::from_entities(vec![Person::new(1, "Alice")]))
        .with_nodes(NodeCollection::from_entities(vec![Movie::new(10, "Arrival")]))
        .with_relations(RelationCollection::from_relations(
            acted_in_mapping(),
            vec![ActedIn::new(1, 10, 0, "Lead")],
        ))
        .with_relations(RelationCollection::from_relations(
            directed_mapping(),
            vec![Directed::new(2, 10), Directed::new(1, 10)],
        ));
    let index = NodeKeyIndex::from_collections(snapshot.nodes());
    let filter = ConsistencyFilter::new(&index);
    let reports: Vec<_> = snapshot.relations().iter().map(|c| filter.apply(c)).collect();
    assert_eq!(reports[0].dropped_count, 0);
    assert_eq!(reports[1].dropped_count, 1);
    assert_eq!(reports[1].kept.len(), 1);
}

#[test]
fn test_null_endpoint_is_dropped_with_warning() {
    let nodes = people_and_movies();
    let index = NodeKeyIndex::from_collections(&nodes);
    let mapping = MappingConfig::new("MAYBE", "Person", "TmdbId", "Movie", "TmdbId");
    let relations = RelationCollection::from_relations(
        mapping,
        vec![
            MaybeActed {
                from_key: None,
                to_key: Some(10),
            },
            MaybeActed {
                from_key: Some(2),
                to_key: Some(10),
            },
        ],
    );
    let report = ConsistencyFilter::new(&index).apply(&relations);
    assert_eq!(report.kept.len(), 1);
    assert_eq!(report.dropped_count, 1);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].endpoint, Endpoint::From);
    assert_eq!(report.warnings[0].key, None);
}

#[test]
fn test_unknown_label_resolves_nothing() {
    let index = NodeKeyIndex::new();
    assert!(!index.contains("Person", "tmdbId", &NaturalKey::Integer(1)));
    let relations = RelationCollection::from_relations(
        acted_in_mapping(),
        vec![ActedIn::new(1, 10, 0, "Lead")],
    );
    let report = ConsistencyFilter::new(&index).apply(&relations);
    assert_eq!(report.dropped_count, 1);
    assert_eq!(report.warnings.len(), 2);
}

graph_relation! {
    #[derive(Clone, Debug)]
    struct ImdbCredit: "ImdbCredit", from = String, to = i64 {}
}

#[test]
fn test_index_follows_mapping_lookup_property() {
    let alice = Person {
        imdb_id: Some("nm1".to_string()),
        ..Person::new(1, "Alice")
    };
    let snapshot = Snapshot::new()
        .with_nodes(NodeCollection::from_entities(vec![alice, Person::new(2, "Bob")]))
        .with_nodes(NodeCollection::from_entities(vec![Movie::new(10, "Arrival")]))
        .with_relations(RelationCollection::from_relations(
            MappingConfig::new("CREDITED", "Person", "ImdbId", "Movie", "TmdbId"),
            vec![
                ImdbCredit {
                    from_key: "nm1".to_string(),
                    to_key: 10,
                },
                ImdbCredit {
                    from_key: "nm2".to_string(),
                    to_key: 10,
                },
            ],
        ));
    let index = NodeKeyIndex::from_snapshot(&snapshot);
    assert!(index.contains("Person", "imdbId", &NaturalKey::from("nm1")));
    assert!(index.contains("Person", "tmdbId", &NaturalKey::Integer(2)));
    assert_eq!(index.keys_for("Person", "imdbId").map(|k| k.len()), Some(1));

    let report = ConsistencyFilter::new(&index).apply(&snapshot.relations()[0]);
    assert_eq!(report.kept.len(), 1);
    assert_eq!(report.dropped_count, 1);
    assert_eq!(report.warnings[0].key, Some(NaturalKey::from("nm2")));
    assert!(!format!("{report:?}").is_empty());
}
