//! BatchLoader: executes graph operations in bounded transactions.

use std::{
    collections::BTreeMap,
    fmt,
    time::{Duration, Instant},
};

use crate::{
    GraphLoadError,
    backend::{GraphBackend, OperationOutcome},
    config::ReloadConfig,
    statement::GraphOperation,
};

/// Committed progress of one [`BatchLoader::load`] call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadResult {
    /// Operations executed in committed transactions.
    pub operations: usize,
    pub created: u64,
    pub deleted: u64,
    /// Created items keyed by node label or relation name.
    pub created_by_target: BTreeMap<String, u64>,
    /// Committed relation operations whose endpoints resolved to nothing.
    pub unresolved_relations: usize,
    /// Size of each committed transaction, in commit order.
    pub commits: Vec<usize>,
    pub elapsed: Duration,
}

impl LoadResult {
    pub fn created_for(&self, target: &str) -> u64 {
        self.created_by_target.get(target).copied().unwrap_or(0)
    }

    fn absorb(&mut self, batch: PendingBatch) {
        self.operations += batch.operations;
        self.created += batch.created;
        self.deleted += batch.deleted;
        self.unresolved_relations += batch.unresolved_relations;
        for (target, count) in batch.created_by_target {
            *self.created_by_target.entry(target).or_insert(0) += count;
        }
        self.commits.push(batch.operations);
    }
}

/// Counts for the transaction currently open; discarded on rollback.
#[derive(Default)]
struct PendingBatch {
    operations: usize,
    created: u64,
    deleted: u64,
    unresolved_relations: usize,
    created_by_target: BTreeMap<String, u64>,
}

impl PendingBatch {
    fn record(&mut self, op: &GraphOperation, outcome: &OperationOutcome) {
        self.operations += 1;
        self.created += outcome.created;
        self.deleted += outcome.deleted;
        if let Some(target) = op.target() {
            *self.created_by_target.entry(target.to_string()).or_insert(0) += outcome.created;
        }
        if let GraphOperation::CreateRelation {
            relation_name,
            from_lookup_value,
            to_lookup_value,
            ..
        } = op
        {
            if outcome.created == 0 {
                self.unresolved_relations += 1;
                tracing::warn!(
                    relation = %relation_name,
                    from = ?from_lookup_value,
                    to = ?to_lookup_value,
                    "relation endpoints resolved to no nodes"
                );
            }
        }
    }
}

/// A load that stopped on a backend error. `result` holds what was committed
/// before the failing transaction, which was rolled back.
#[derive(Debug)]
pub struct LoadFailure {
    pub result: LoadResult,
    pub error: GraphLoadError,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "load stopped after {} committed operations: {}",
            self.result.operations, self.error
        )
    }
}

impl std::error::Error for LoadFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BatchLoader {
    batch_size: usize,
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self {
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchLoader {
    pub fn new(batch_size: usize) -> Result<Self, GraphLoadError> {
        if batch_size == 0 {
            return Err(GraphLoadError::config("batch_size must be at least 1"));
        }
        Ok(Self { batch_size })
    }

    pub fn from_config(config: &ReloadConfig) -> Result<Self, GraphLoadError> {
        config.validate()?;
        Self::new(config.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Executes `operations` in order. A transaction is committed after every
    /// `batch_size` operations and once more for any remainder; no operations
    /// means no transaction at all. A failed execute rolls back the open
    /// transaction and is not retried.
    pub fn load<B, I>(&self, backend: &mut B, operations: I) -> Result<LoadResult, LoadFailure>
    where
        B: GraphBackend + ?Sized,
        I: IntoIterator<Item = GraphOperation>,
    {
        let started = Instant::now();
        let mut result = LoadResult::default();
        let mut open: Option<B::Transaction> = None;
        let mut pending = PendingBatch::default();

        for op in operations {
            let mut tx = match open.take() {
                Some(tx) => tx,
                None => match backend.begin_transaction() {
                    Ok(tx) => tx,
                    Err(error) => return Err(failed(result, started, error)),
                },
            };

            match backend.execute(&mut tx, &op) {
                Ok(outcome) => pending.record(&op, &outcome),
                Err(error) => {
                    tracing::warn!(
                        %error,
                        operation = op.kind_name(),
                        discarded = pending.operations,
                        "execute failed, rolling back batch"
                    );
                    if let Err(rollback_err) = backend.rollback(tx) {
                        tracing::warn!(error = %rollback_err, "rollback failed");
                    }
                    return Err(failed(result, started, error));
                }
            }

            if pending.operations == self.batch_size {
                if let Err(error) = backend.commit(tx) {
                    return Err(failed(result, started, error));
                }
                tracing::debug!(operations = pending.operations, "batch committed");
                result.absorb(std::mem::take(&mut pending));
            } else {
                open = Some(tx);
            }
        }

        if let Some(tx) = open.take() {
            if let Err(error) = backend.commit(tx) {
                return Err(failed(result, started, error));
            }
            tracing::debug!(operations = pending.operations, "final batch committed");
            result.absorb(pending);
        }

        result.elapsed = started.elapsed();
        Ok(result)
    }
}

fn failed(mut result: LoadResult, started: Instant, error: GraphLoadError) -> LoadFailure {
    result.elapsed = started.elapsed();
    LoadFailure { result, error }
}
