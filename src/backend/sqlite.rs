//! SQLite graph backend.
//!
//! Nodes live in `graph_entities` with their properties as a JSON document,
//! relations in `graph_edges`. Relation endpoints are resolved with
//! `json_extract` lookups bound to the lookup value, backed by the expression
//! indexes created through [`GraphOperation::CreateIndex`].

use rusqlite::{
    Connection, OptionalExtension, ToSql, params,
    types::{ToSqlOutput, Value},
};

use crate::{
    GraphLoadError,
    backend::{GraphBackend, OperationOutcome, StoredNode, StoredRelation},
    cache::LookupCache,
    config::{NumericLiteralMode, SqliteConfig},
    property::{PropertySet, PropertyValue},
    schema::{ensure_schema, lookup_index_name},
    statement::{GraphOperation, validate_identifier},
};

impl ToSql for PropertyValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            PropertyValue::Text(text) => ToSqlOutput::from(text.as_str()),
            PropertyValue::Integer(int) => ToSqlOutput::from(*int),
            PropertyValue::Float(float) => ToSqlOutput::from(*float),
            // json_extract yields 1/0 for JSON booleans
            PropertyValue::Boolean(flag) => ToSqlOutput::Owned(Value::Integer(i64::from(*flag))),
        })
    }
}

/// Marker for the single open `BEGIN IMMEDIATE` transaction.
#[derive(Debug)]
pub struct SqliteTransaction {
    executed: usize,
}

impl SqliteTransaction {
    pub fn executed(&self) -> usize {
        self.executed
    }
}

pub struct SqliteGraphBackend {
    conn: Connection,
    lookup_cache: LookupCache,
    delete_batch_size: usize,
    numeric_literals: NumericLiteralMode,
    tx_open: bool,
}

impl SqliteGraphBackend {
    pub fn open(config: &SqliteConfig) -> Result<Self, GraphLoadError> {
        config.validate()?;
        let conn = match &config.path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| GraphLoadError::connection(e.to_string()))?;

        if let Some(capacity) = config.cache_size {
            conn.set_prepared_statement_cache_capacity(capacity);
        }
        for (name, value) in &config.pragma_settings {
            conn.pragma_update(None, name, value)
                .map_err(|e| GraphLoadError::config(format!("pragma {name}: {e}")))?;
        }
        ensure_schema(&conn)?;

        Ok(Self {
            conn,
            lookup_cache: LookupCache::new(),
            delete_batch_size: config.delete_batch_size,
            numeric_literals: NumericLiteralMode::default(),
            tx_open: false,
        })
    }

    pub fn in_memory() -> Result<Self, GraphLoadError> {
        Self::open(&SqliteConfig::in_memory())
    }

    pub fn with_numeric_literals(mut self, mode: NumericLiteralMode) -> Self {
        self.numeric_literals = mode;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn count_nodes(&self, label: &str) -> Result<i64, GraphLoadError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM graph_entities WHERE kind=?1",
                params![label],
                |row| row.get(0),
            )
            .map_err(|e| GraphLoadError::backend(e.to_string()))
    }

    pub fn count_relations(&self, relation_name: &str) -> Result<i64, GraphLoadError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM graph_edges WHERE edge_type=?1",
                params![relation_name],
                |row| row.get(0),
            )
            .map_err(|e| GraphLoadError::backend(e.to_string()))
    }

    pub fn node(&self, id: i64) -> Result<Option<StoredNode>, GraphLoadError> {
        self.conn
            .query_row(
                "SELECT id, kind, data FROM graph_entities WHERE id=?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| GraphLoadError::backend(e.to_string()))?
            .map(|(id, label, data)| to_node(id, label, &data))
            .transpose()
    }

    pub fn find_nodes(
        &self,
        label: &str,
        property: &str,
        value: &PropertyValue,
    ) -> Result<Vec<StoredNode>, GraphLoadError> {
        validate_identifier("lookup property", property)?;
        let sql = format!(
            "SELECT id, kind, data FROM graph_entities \
             WHERE kind=?1 AND json_extract(data, '$.{property}')=?2 ORDER BY id"
        );
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| GraphLoadError::backend(e.to_string()))?;
        let rows = stmt
            .query_map(params![label, value], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| GraphLoadError::backend(e.to_string()))?;
        let mut nodes = Vec::new();
        for row in rows {
            let (id, label, data) = row.map_err(|e| GraphLoadError::backend(e.to_string()))?;
            nodes.push(to_node(id, label, &data)?);
        }
        Ok(nodes)
    }

    pub fn relations(&self, relation_name: &str) -> Result<Vec<StoredRelation>, GraphLoadError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT id, from_id, to_id, edge_type, data FROM graph_edges \
                 WHERE edge_type=?1 ORDER BY id",
            )
            .map_err(|e| GraphLoadError::backend(e.to_string()))?;
        let rows = stmt
            .query_map(params![relation_name], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| GraphLoadError::backend(e.to_string()))?;
        let mut relations = Vec::new();
        for row in rows {
            let (id, from_id, to_id, relation_name, data) =
                row.map_err(|e| GraphLoadError::backend(e.to_string()))?;
            relations.push(StoredRelation {
                id,
                from_id,
                to_id,
                relation_name,
                properties: parse_properties(&data)?,
            });
        }
        Ok(relations)
    }

    /// Both endpoint nodes of every relation named `relation_name`.
    pub fn relation_endpoints(
        &self,
        relation_name: &str,
    ) -> Result<Vec<(StoredNode, StoredNode)>, GraphLoadError> {
        let mut endpoints = Vec::new();
        for relation in self.relations(relation_name)? {
            let from = self.node(relation.from_id)?;
            let to = self.node(relation.to_id)?;
            if let (Some(from), Some(to)) = (from, to) {
                endpoints.push((from, to));
            }
        }
        Ok(endpoints)
    }

    /// Names of the lookup indexes currently in place.
    pub fn lookup_indexes(&self) -> Result<Vec<(String, String)>, GraphLoadError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT kind, property FROM graph_lookup_indexes ORDER BY name")
            .map_err(|e| GraphLoadError::backend(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| GraphLoadError::backend(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| GraphLoadError::backend(e.to_string()))
    }

    fn lookup(
        &self,
        label: &str,
        property: &str,
        value: &PropertyValue,
    ) -> Result<Vec<i64>, GraphLoadError> {
        let encoded = value.to_json().to_string();
        if let Some(ids) = self.lookup_cache.get(label, property, &encoded) {
            return Ok(ids);
        }
        let ids: Vec<i64> = self
            .find_nodes(label, property, value)?
            .into_iter()
            .map(|node| node.id)
            .collect();
        self.lookup_cache.insert(label, property, &encoded, ids.clone());
        Ok(ids)
    }

    fn insert_node(&self, label: &str, properties: &PropertySet) -> Result<i64, GraphLoadError> {
        let data = properties.to_json().to_string();
        self.conn
            .prepare_cached("INSERT INTO graph_entities(kind, data) VALUES(?1, ?2)")
            .and_then(|mut stmt| stmt.execute(params![label, data]))
            .map_err(|e| GraphLoadError::backend(e.to_string()))?;
        self.lookup_cache.clear();
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_edge(
        &self,
        from_id: i64,
        to_id: i64,
        relation_name: &str,
        properties: &PropertySet,
    ) -> Result<i64, GraphLoadError> {
        let data = properties.to_json().to_string();
        self.conn
            .prepare_cached(
                "INSERT INTO graph_edges(from_id, to_id, edge_type, data) VALUES(?1, ?2, ?3, ?4)",
            )
            .and_then(|mut stmt| stmt.execute(params![from_id, to_id, relation_name, data]))
            .map_err(|e| GraphLoadError::backend(e.to_string()))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_lookup_index(&self, label: &str, property: &str) -> Result<(), GraphLoadError> {
        validate_identifier("label", label)?;
        validate_identifier("index property", property)?;
        let name = lookup_index_name(label, property);
        self.conn
            .execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {name} \
                 ON graph_entities(kind, json_extract(data, '$.{property}'))"
            ))
            .map_err(|e| GraphLoadError::schema(e.to_string()))?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO graph_lookup_indexes(name, kind, property) VALUES(?1, ?2, ?3)",
                params![name, label, property],
            )
            .map_err(|e| GraphLoadError::schema(e.to_string()))?;
        Ok(())
    }

    /// Deletes edges, then entities, `delete_batch_size` rows at a time, and
    /// drops every recorded lookup index.
    fn clear_graph(&self) -> Result<u64, GraphLoadError> {
        let limit = self.delete_batch_size as i64;
        let mut deleted = 0u64;
        for table in ["graph_edges", "graph_entities"] {
            let sql =
                format!("DELETE FROM {table} WHERE id IN (SELECT id FROM {table} LIMIT ?1)");
            loop {
                let affected = self
                    .conn
                    .execute(&sql, params![limit])
                    .map_err(|e| GraphLoadError::backend(e.to_string()))?;
                if affected == 0 {
                    break;
                }
                deleted += affected as u64;
                tracing::debug!(table, affected, "cleared chunk");
            }
        }

        let names = {
            let mut stmt = self
                .conn
                .prepare("SELECT name FROM graph_lookup_indexes")
                .map_err(|e| GraphLoadError::backend(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| GraphLoadError::backend(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| GraphLoadError::backend(e.to_string()))?
        };
        for name in names {
            validate_identifier("index name", &name)?;
            self.conn
                .execute_batch(&format!("DROP INDEX IF EXISTS {name}"))
                .map_err(|e| GraphLoadError::schema(e.to_string()))?;
        }
        self.conn
            .execute("DELETE FROM graph_lookup_indexes", [])
            .map_err(|e| GraphLoadError::schema(e.to_string()))?;
        self.lookup_cache.clear();
        Ok(deleted)
    }
}

fn parse_properties(data: &str) -> Result<PropertySet, GraphLoadError> {
    let value: serde_json::Value =
        serde_json::from_str(data).map_err(|e| GraphLoadError::backend(e.to_string()))?;
    Ok(PropertySet::from_json(&value))
}

fn to_node(id: i64, label: String, data: &str) -> Result<StoredNode, GraphLoadError> {
    Ok(StoredNode {
        id,
        label,
        properties: parse_properties(data)?,
    })
}

impl GraphBackend for SqliteGraphBackend {
    type Transaction = SqliteTransaction;

    fn set_numeric_literals(&mut self, mode: NumericLiteralMode) {
        self.numeric_literals = mode;
    }

    fn begin_transaction(&mut self) -> Result<SqliteTransaction, GraphLoadError> {
        if self.tx_open {
            return Err(GraphLoadError::transaction("a transaction is already open"));
        }
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| GraphLoadError::transaction(e.to_string()))?;
        self.tx_open = true;
        Ok(SqliteTransaction { executed: 0 })
    }

    fn execute(
        &mut self,
        tx: &mut SqliteTransaction,
        op: &GraphOperation,
    ) -> Result<OperationOutcome, GraphLoadError> {
        if !self.tx_open {
            return Err(GraphLoadError::transaction("no open transaction"));
        }
        tracing::trace!(
            statement = %op.statement().render_inline(self.numeric_literals),
            "execute"
        );
        let outcome = match op {
            GraphOperation::CreateNode { label, properties } => {
                validate_identifier("label", label)?;
                OperationOutcome::created(vec![self.insert_node(label, properties)?])
            }
            GraphOperation::CreateRelation {
                from_label,
                from_lookup_property,
                from_lookup_value,
                to_label,
                to_lookup_property,
                to_lookup_value,
                relation_name,
                properties,
            } => {
                let from_ids = self.lookup(from_label, from_lookup_property, from_lookup_value)?;
                let to_ids = self.lookup(to_label, to_lookup_property, to_lookup_value)?;
                let mut created = Vec::with_capacity(from_ids.len() * to_ids.len());
                for &from_id in &from_ids {
                    for &to_id in &to_ids {
                        created.push(self.insert_edge(from_id, to_id, relation_name, properties)?);
                    }
                }
                OperationOutcome::created(created)
            }
            GraphOperation::CreateIndex { label, property } => {
                self.create_lookup_index(label, property)?;
                OperationOutcome::default()
            }
            GraphOperation::ClearAll => OperationOutcome::deleted(self.clear_graph()?),
        };
        tx.executed += 1;
        Ok(outcome)
    }

    fn commit(&mut self, tx: SqliteTransaction) -> Result<(), GraphLoadError> {
        if let Err(err) = self.conn.execute_batch("COMMIT") {
            tracing::warn!(error = %err, executed = tx.executed, "commit failed, rolling back");
            if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            self.lookup_cache.clear();
            self.tx_open = false;
            return Err(GraphLoadError::transaction(err.to_string()));
        }
        self.tx_open = false;
        tracing::debug!(operations = tx.executed, "committed");
        Ok(())
    }

    fn rollback(&mut self, tx: SqliteTransaction) -> Result<(), GraphLoadError> {
        self.tx_open = false;
        self.lookup_cache.clear();
        tracing::debug!(operations = tx.executed, "rolling back");
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| GraphLoadError::transaction(e.to_string()))
    }

    fn clear_all(&mut self) -> Result<OperationOutcome, GraphLoadError> {
        if self.tx_open {
            return Err(GraphLoadError::transaction(
                "cannot clear while a transaction is open",
            ));
        }
        Ok(OperationOutcome::deleted(self.clear_graph()?))
    }
}
