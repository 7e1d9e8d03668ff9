#![cfg(feature = "sqlite-backend")]

use graphload::{
    NodeCollection, RelationCollection, ReloadOrchestrator, Snapshot, SqliteGraphBackend,
    movies::{ActedIn, Movie, Person, acted_in_mapping},
    safety::{
        run_safety_checks, run_strict_safety_checks, validate_no_duplicate_edges,
        validate_referential_integrity,
    },
};

fn loaded_backend() -> SqliteGraphBackend {
    let snapshot = Snapshot::new()
        .with_nodes(NodeCollection::from_entities(vec![Person::new(1, "Alice")]))
        .with_nodes(NodeCollection::from_entities(vec![Movie::new(10, "Arrival")]))
        .with_relations(RelationCollection::from_relations(
            acted_in_mapping(),
            vec![ActedIn::new(1, 10, 0, "Lead")],
        ));
    let mut orchestrator =
        ReloadOrchestrator::with_defaults(SqliteGraphBackend::in_memory().expect("backend"));
    orchestrator.reload(&snapshot).expect("reload");
    orchestrator.into_backend()
}

#[test]
fn report_for_clean_graph_no_issues() {
    let backend = loaded_backend();
    let report = run_safety_checks(&backend).unwrap();
    assert_eq!(report.total_nodes, 2);
    assert_eq!(report.total_edges, 1);
    assert_eq!(report.orphan_edges, 0);
    assert_eq!(report.duplicate_edges, 0);
    assert!(run_strict_safety_checks(&backend).is_ok());
}

#[test]
fn orphan_edges_detected() {
    let backend = loaded_backend();
    backend
        .connection()
        .execute("DELETE FROM graph_entities WHERE kind = 'Movie'", [])
        .unwrap();
    let report = validate_referential_integrity(&backend).unwrap();
    assert_eq!(report.orphan_edges, 1);
}

#[test]
fn duplicate_edges_detected() {
    let backend = loaded_backend();
    backend
        .connection()
        .execute(
            "INSERT INTO graph_edges(from_id, to_id, edge_type, data) \
             SELECT from_id, to_id, edge_type, data FROM graph_edges",
            [],
        )
        .unwrap();
    let report = validate_no_duplicate_edges(&backend).unwrap();
    assert_eq!(report.duplicate_edges, 1);
}

#[test]
fn strict_mode_fails_on_issues() {
    let backend = loaded_backend();
    backend
        .connection()
        .execute(
            "INSERT INTO graph_edges(from_id, to_id, edge_type, data) VALUES(999, 998, 'ACTED_IN', '{}')",
            [],
        )
        .unwrap();
    let err = run_strict_safety_checks(&backend).unwrap_err();
    assert_eq!(err.report.orphan_edges, 1);
    assert!(err.to_string().contains("1 orphan edges"));
}
