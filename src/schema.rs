use rusqlite::Connection;

use crate::errors::GraphLoadError;

pub fn ensure_schema(conn: &Connection) -> Result<(), GraphLoadError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS graph_entities (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            kind      TEXT NOT NULL,
            data      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            from_id   INTEGER NOT NULL,
            to_id     INTEGER NOT NULL,
            edge_type TEXT NOT NULL,
            data      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_lookup_indexes (
            name      TEXT PRIMARY KEY,
            kind      TEXT NOT NULL,
            property  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_entities_kind ON graph_entities(kind);
        CREATE INDEX IF NOT EXISTS idx_edges_from ON graph_edges(from_id);
        CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_id);
        CREATE INDEX IF NOT EXISTS idx_edges_type ON graph_edges(edge_type);
        "#,
    )
    .map_err(|e| GraphLoadError::schema(e.to_string()))?;
    Ok(())
}

/// Name of the expression index backing lookups of `kind.property`.
pub fn lookup_index_name(kind: &str, property: &str) -> String {
    format!("idx_lookup_{kind}_{property}")
}
