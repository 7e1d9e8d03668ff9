use graphload::{
    GraphLoadError, GraphOperation, NumericLiteralMode, PropertySet, PropertyValue,
    StatementBuilder, graph_relation,
    mapping::MappingConfig,
    movies::{ActedIn, Directed, Person, acted_in_mapping, directed_mapping},
    project,
    statement::{escape_text, is_identifier, render_literal},
};

graph_relation! {
    #[derive(Clone, Debug)]
    struct Sneaky: "Sneaky", from = i64, to = i64 {
        from_lookup: String,
    }
}

fn sample_properties() -> PropertySet {
    let mut props = PropertySet::new();
    props.insert("tmdbId", 1i64);
    props.insert("name", "Alice");
    props
}

#[test]
fn test_create_node_template_uses_parameters() {
    let op = StatementBuilder::new()
        .build_create_node("Person", sample_properties())
        .unwrap();
    let statement = op.statement();
    assert_eq!(
        statement.text(),
        "CREATE (x:Person {tmdbId: $tmdbId, name: $name}) RETURN x"
    );
    assert_eq!(statement.parameter("tmdbId"), Some(&PropertyValue::Integer(1)));
    assert_eq!(statement.parameters().len(), 2);
}

#[test]
fn test_create_node_without_properties() {
    let op = StatementBuilder::new()
        .build_create_node("Person", PropertySet::new())
        .unwrap();
    assert_eq!(op.statement().text(), "CREATE (x:Person) RETURN x");
}

#[test]
fn test_invalid_label_is_rejected() {
    let err = StatementBuilder::new()
        .build_create_node("Person) DETACH DELETE (n", sample_properties())
        .unwrap_err();
    assert!(matches!(err, GraphLoadError::Validation(_)));
    assert!(err.is_build_error());
}

#[test]
fn test_invalid_property_key_is_rejected() {
    let mut props = sample_properties();
    props.insert("na me", "x");
    let err = StatementBuilder::new()
        .build_create_node("Person", props)
        .unwrap_err();
    assert!(matches!(err, GraphLoadError::Validation(_)));
}

#[test]
fn test_quote_in_value_stays_in_parameter() {
    let person = Person::new(7, "O'Brien");
    let op = StatementBuilder::new().build_node("Person", &person).unwrap();
    let statement = op.statement();
    assert_eq!(
        statement.parameter("name"),
        Some(&PropertyValue::Text("O'Brien".into()))
    );
    assert!(!statement.text().contains("O'Brien"));
    assert_eq!(statement.text().matches('\'').count(), 0);
    let rendered = statement.render_inline(NumericLiteralMode::Native);
    assert!(rendered.contains(r"name: 'O\'Brien'"));
}

#[test]
fn test_create_relation_binds_lookup_values() {
    let op = StatementBuilder::new()
        .build_relation(&ActedIn::new(1, 10, 0, "Lead"), &acted_in_mapping())
        .unwrap();
    match &op {
        GraphOperation::CreateRelation {
            from_label,
            from_lookup_property,
            from_lookup_value,
            to_lookup_value,
            relation_name,
            properties,
            ..
        } => {
            assert_eq!(from_label, "Person");
            assert_eq!(from_lookup_property, "tmdbId");
            assert_eq!(from_lookup_value, &PropertyValue::Integer(1));
            assert_eq!(to_lookup_value, &PropertyValue::Integer(10));
            assert_eq!(relation_name, "ACTED_IN");
            let keys: Vec<&str> = properties.keys().collect();
            assert_eq!(keys, vec!["order", "role"]);
        }
        other => panic!("unexpected operation {other:?}"),
    }
    assert_eq!(
        op.statement().text(),
        "MATCH (f:Person), (t:Movie) WHERE f.tmdbId = $fromLookup AND t.tmdbId = $toLookup \
         CREATE (f)-[r:ACTED_IN {order: $order, role: $role}]->(t) RETURN r"
    );
}

#[test]
fn test_relation_without_extra_properties() {
    let op = StatementBuilder::new()
        .build_relation(&Directed::new(2, 10), &directed_mapping())
        .unwrap();
    let statement = op.statement();
    assert!(statement.text().contains("CREATE (f)-[r:DIRECTED]->(t)"));
    assert_eq!(statement.parameters().len(), 2);
    assert_eq!(
        statement.render_inline(NumericLiteralMode::Native),
        "MATCH (f:Person), (t:Movie) WHERE f.tmdbId = 2 AND t.tmdbId = 10 \
         CREATE (f)-[r:DIRECTED]->(t) RETURN r"
    );
}

#[test]
fn test_missing_key_field_is_mapping_error() {
    let mut relation = PropertySet::new();
    relation.insert("toKey", 10i64);
    let err = StatementBuilder::new()
        .build_create_relation(relation, &acted_in_mapping())
        .unwrap_err();
    assert!(matches!(err, GraphLoadError::Mapping(_)));
}

#[test]
fn test_custom_key_fields() {
    let mapping = MappingConfig::new("KNOWS", "Person", "TmdbId", "Person", "TmdbId")
        .with_key_fields("PersonA", "PersonB");
    let mut relation = PropertySet::new();
    relation.insert("personA", 1i64);
    relation.insert("personB", 2i64);
    relation.insert("since", 1999i64);
    let op = StatementBuilder::new()
        .build_create_relation(relation, &mapping)
        .unwrap();
    let statement = op.statement();
    assert_eq!(statement.parameter("fromLookup"), Some(&PropertyValue::Integer(1)));
    assert_eq!(statement.parameter("since"), Some(&PropertyValue::Integer(1999)));
    assert!(statement.parameter("personA").is_none());
}

#[test]
fn test_property_colliding_with_lookup_parameter_is_rejected() {
    let relation = Sneaky {
        from_key: 1,
        to_key: 10,
        from_lookup: "x".into(),
    };
    let mapping = MappingConfig::new("SNEAKY", "Person", "TmdbId", "Movie", "TmdbId");
    assert!(project(&relation).contains("fromLookup"));
    let err = StatementBuilder::new()
        .build_relation(&relation, &mapping)
        .unwrap_err();
    assert!(matches!(err, GraphLoadError::Validation(_)));
}

#[test]
fn test_index_and_clear_statements() {
    let builder = StatementBuilder::new();
    let index = builder.build_create_index("Person", "tmdbId").unwrap();
    assert_eq!(index.statement().text(), "CREATE INDEX ON :Person(tmdbId)");
    assert!(builder.build_create_index("Person", "tmdb-id").is_err());
    assert_eq!(
        builder.build_clear_all().statement().text(),
        "MATCH (n) DETACH DELETE n"
    );
    assert_eq!(builder.build_clear_all().kind_name(), "clear_all");
}

// Quoting floats is a compatibility workaround for backends with unreliable
// float literal parsing, selected per backend. Native rendering is the default.
#[test]
fn test_quoted_float_literals_are_backend_workaround() {
    let value = PropertyValue::Float(7.5);
    assert_eq!(render_literal(&value, NumericLiteralMode::Native), "7.5");
    assert_eq!(render_literal(&value, NumericLiteralMode::QuotedFloats), "'7.5'");
    assert_eq!(
        render_literal(&PropertyValue::Integer(3), NumericLiteralMode::QuotedFloats),
        "3"
    );
    assert_eq!(NumericLiteralMode::default(), NumericLiteralMode::Native);
}

#[test]
fn test_escape_text_handles_quotes_and_backslashes() {
    assert_eq!(escape_text("O'Brien"), r"O\'Brien");
    assert_eq!(escape_text(r"a\b"), r"a\\b");
    assert_eq!(
        render_literal(&PropertyValue::Text("it's".into()), NumericLiteralMode::Native),
        r"'it\'s'"
    );
}

#[test]
fn test_identifier_rules() {
    assert!(is_identifier("Person"));
    assert!(is_identifier("_private"));
    assert!(is_identifier("ACTED_IN"));
    assert!(!is_identifier(""));
    assert!(!is_identifier("1abc"));
    assert!(!is_identifier("a-b"));
    assert!(!is_identifier("a b"));
    assert!(!is_identifier(&"x".repeat(129)));
}
