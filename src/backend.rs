//! Backend capability consumed by the loader. Adapters only need to execute
//! [`GraphOperation`]s inside explicit transactions; batching, validation and
//! ordering live in the engine. The `sqlite-backend` Cargo feature (enabled by
//! default) compiles in the SQLite adapter.

pub mod memory;
#[cfg(feature = "sqlite-backend")]
pub mod sqlite;

pub use memory::{FaultPoint, MemoryGraphBackend};
#[cfg(feature = "sqlite-backend")]
pub use sqlite::SqliteGraphBackend;

use crate::{
    GraphLoadError, config::NumericLiteralMode, property::PropertySet,
    statement::GraphOperation,
};

/// A node as read back from a backend.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredNode {
    pub id: i64,
    pub label: String,
    pub properties: PropertySet,
}

/// A relation as read back from a backend.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRelation {
    pub id: i64,
    pub from_id: i64,
    pub to_id: i64,
    pub relation_name: String,
    pub properties: PropertySet,
}

/// What one executed operation did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationOutcome {
    pub created: u64,
    pub deleted: u64,
    /// Backend identifiers of created items.
    pub identifiers: Vec<i64>,
}

impl OperationOutcome {
    pub fn created(identifiers: Vec<i64>) -> Self {
        Self {
            created: identifiers.len() as u64,
            deleted: 0,
            identifiers,
        }
    }

    pub fn deleted(count: u64) -> Self {
        Self {
            created: 0,
            deleted: count,
            identifiers: Vec::new(),
        }
    }
}

/// A graph store that can execute operations transactionally. At most one
/// transaction is open at a time.
pub trait GraphBackend {
    type Transaction;

    fn begin_transaction(&mut self) -> Result<Self::Transaction, GraphLoadError>;

    fn execute(
        &mut self,
        tx: &mut Self::Transaction,
        op: &GraphOperation,
    ) -> Result<OperationOutcome, GraphLoadError>;

    fn commit(&mut self, tx: Self::Transaction) -> Result<(), GraphLoadError>;

    fn rollback(&mut self, tx: Self::Transaction) -> Result<(), GraphLoadError>;

    /// Literal style for inline statement previews. Backends without previews
    /// ignore it.
    fn set_numeric_literals(&mut self, _mode: NumericLiteralMode) {}

    /// Removes every node, relation and lookup index.
    fn clear_all(&mut self) -> Result<OperationOutcome, GraphLoadError> {
        run_single(self, &GraphOperation::ClearAll)
    }

    fn create_index(&mut self, label: &str, property: &str) -> Result<(), GraphLoadError> {
        let op = GraphOperation::CreateIndex {
            label: label.to_string(),
            property: property.to_string(),
        };
        run_single(self, &op).map(|_| ())
    }
}

/// Runs one operation in its own transaction, rolling back on failure.
pub fn run_single<B: GraphBackend + ?Sized>(
    backend: &mut B,
    op: &GraphOperation,
) -> Result<OperationOutcome, GraphLoadError> {
    let mut tx = backend.begin_transaction()?;
    match backend.execute(&mut tx, op) {
        Ok(outcome) => {
            backend.commit(tx)?;
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback_err) = backend.rollback(tx) {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

impl<B> GraphBackend for &mut B
where
    B: GraphBackend + ?Sized,
{
    type Transaction = B::Transaction;

    fn begin_transaction(&mut self) -> Result<Self::Transaction, GraphLoadError> {
        (**self).begin_transaction()
    }

    fn execute(
        &mut self,
        tx: &mut Self::Transaction,
        op: &GraphOperation,
    ) -> Result<OperationOutcome, GraphLoadError> {
        (**self).execute(tx, op)
    }

    fn commit(&mut self, tx: Self::Transaction) -> Result<(), GraphLoadError> {
        (**self).commit(tx)
    }

    fn rollback(&mut self, tx: Self::Transaction) -> Result<(), GraphLoadError> {
        (**self).rollback(tx)
    }

    fn set_numeric_literals(&mut self, mode: NumericLiteralMode) {
        (**self).set_numeric_literals(mode)
    }

    fn clear_all(&mut self) -> Result<OperationOutcome, GraphLoadError> {
        (**self).clear_all()
    }

    fn create_index(&mut self, label: &str, property: &str) -> Result<(), GraphLoadError> {
        (**self).create_index(label, property)
    }
}
