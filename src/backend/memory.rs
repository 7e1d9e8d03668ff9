//! In-memory graph backend.
//!
//! Keeps nodes and relations in vectors, records every statement it is given,
//! and supports instance-scoped fault injection so failure paths of the loader
//! can be exercised without a real database.

use std::collections::{BTreeSet, HashMap};

use crate::{
    GraphLoadError,
    backend::{GraphBackend, OperationOutcome, StoredNode, StoredRelation},
    config::NumericLiteralMode,
    property::PropertyValue,
    statement::{GraphOperation, Statement},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Begin,
    Execute,
    Commit,
}

/// Open transaction handle. Holds what is needed to undo the transaction.
#[derive(Debug)]
pub struct MemoryTransaction {
    node_mark: usize,
    relation_mark: usize,
    index_mark: BTreeSet<(String, String)>,
    cleared: Option<(Vec<StoredNode>, Vec<StoredRelation>)>,
    executed: usize,
}

#[derive(Debug, Default)]
pub struct MemoryGraphBackend {
    nodes: Vec<StoredNode>,
    relations: Vec<StoredRelation>,
    indexes: BTreeSet<(String, String)>,
    next_id: i64,
    in_transaction: bool,
    numeric_literals: NumericLiteralMode,
    transcript: Vec<Statement>,
    commit_sizes: Vec<usize>,
    rollbacks: usize,
    faults: HashMap<FaultPoint, usize>,
}

impl MemoryGraphBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric_literals(mut self, mode: NumericLiteralMode) -> Self {
        self.numeric_literals = mode;
        self
    }

    /// Makes the `nth` upcoming call at `point` fail once (1-based).
    pub fn inject_fault(&mut self, point: FaultPoint, nth: usize) {
        if nth == 0 {
            self.faults.remove(&point);
        } else {
            self.faults.insert(point, nth);
        }
    }

    pub fn reset_faults(&mut self) {
        self.faults.clear();
    }

    pub fn nodes(&self) -> &[StoredNode] {
        &self.nodes
    }

    pub fn relations(&self) -> &[StoredRelation] {
        &self.relations
    }

    pub fn count_nodes(&self, label: &str) -> usize {
        self.nodes.iter().filter(|n| n.label == label).count()
    }

    pub fn count_relations(&self, relation_name: &str) -> usize {
        self.relations
            .iter()
            .filter(|r| r.relation_name == relation_name)
            .count()
    }

    pub fn indexes(&self) -> &BTreeSet<(String, String)> {
        &self.indexes
    }

    pub fn node(&self, id: i64) -> Option<&StoredNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_nodes(&self, label: &str, property: &str, value: &PropertyValue) -> Vec<&StoredNode> {
        self.nodes
            .iter()
            .filter(|n| n.label == label && n.properties.get(property) == Some(value))
            .collect()
    }

    /// Every statement handed to this backend, in order.
    pub fn transcript(&self) -> &[Statement] {
        &self.transcript
    }

    /// Transcript rendered with inline literals.
    pub fn rendered_transcript(&self) -> Vec<String> {
        self.transcript
            .iter()
            .map(|s| s.render_inline(self.numeric_literals))
            .collect()
    }

    /// Number of operations in each committed transaction.
    pub fn commit_sizes(&self) -> &[usize] {
        &self.commit_sizes
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    fn check_fault(&mut self, point: FaultPoint) -> Result<(), GraphLoadError> {
        if let Some(remaining) = self.faults.get_mut(&point) {
            *remaining -= 1;
            if *remaining == 0 {
                self.faults.remove(&point);
                return Err(GraphLoadError::fault_injection(format!("{point:?}")));
            }
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn lookup(&self, label: &str, property: &str, value: &PropertyValue) -> Vec<i64> {
        self.find_nodes(label, property, value)
            .into_iter()
            .map(|n| n.id)
            .collect()
    }

    fn apply(
        &mut self,
        tx: &mut MemoryTransaction,
        op: &GraphOperation,
    ) -> Result<OperationOutcome, GraphLoadError> {
        match op {
            GraphOperation::CreateNode { label, properties } => {
                let id = self.allocate_id();
                self.nodes.push(StoredNode {
                    id,
                    label: label.clone(),
                    properties: properties.clone(),
                });
                Ok(OperationOutcome::created(vec![id]))
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
                let from_ids = self.lookup(from_label, from_lookup_property, from_lookup_value);
                let to_ids = self.lookup(to_label, to_lookup_property, to_lookup_value);
                let mut created = Vec::new();
                for &from_id in &from_ids {
                    for &to_id in &to_ids {
                        let id = self.allocate_id();
                        self.relations.push(StoredRelation {
                            id,
                            from_id,
                            to_id,
                            relation_name: relation_name.clone(),
                            properties: properties.clone(),
                        });
                        created.push(id);
                    }
                }
                Ok(OperationOutcome::created(created))
            }
            GraphOperation::CreateIndex { label, property } => {
                self.indexes.insert((label.clone(), property.clone()));
                Ok(OperationOutcome::default())
            }
            GraphOperation::ClearAll => {
                let deleted = (self.nodes.len() + self.relations.len()) as u64;
                let mut nodes = std::mem::take(&mut self.nodes);
                let mut relations = std::mem::take(&mut self.relations);
                if tx.cleared.is_none() {
                    // Only what existed before the transaction began survives a rollback.
                    nodes.truncate(tx.node_mark);
                    relations.truncate(tx.relation_mark);
                    tx.cleared = Some((nodes, relations));
                }
                self.indexes.clear();
                Ok(OperationOutcome::deleted(deleted))
            }
        }
    }
}

impl GraphBackend for MemoryGraphBackend {
    type Transaction = MemoryTransaction;

    fn set_numeric_literals(&mut self, mode: NumericLiteralMode) {
        self.numeric_literals = mode;
    }

    fn begin_transaction(&mut self) -> Result<MemoryTransaction, GraphLoadError> {
        if self.in_transaction {
            return Err(GraphLoadError::transaction("a transaction is already open"));
        }
        self.check_fault(FaultPoint::Begin)?;
        self.in_transaction = true;
        Ok(MemoryTransaction {
            node_mark: self.nodes.len(),
            relation_mark: self.relations.len(),
            index_mark: self.indexes.clone(),
            cleared: None,
            executed: 0,
        })
    }

    fn execute(
        &mut self,
        tx: &mut MemoryTransaction,
        op: &GraphOperation,
    ) -> Result<OperationOutcome, GraphLoadError> {
        self.check_fault(FaultPoint::Execute)?;
        let statement = op.statement();
        tracing::trace!(statement = %statement.render_inline(self.numeric_literals), "execute");
        self.transcript.push(statement);
        let outcome = self.apply(tx, op)?;
        tx.executed += 1;
        Ok(outcome)
    }

    fn commit(&mut self, tx: MemoryTransaction) -> Result<(), GraphLoadError> {
        if let Err(err) = self.check_fault(FaultPoint::Commit) {
            self.rollback(tx)?;
            return Err(err);
        }
        self.in_transaction = false;
        self.commit_sizes.push(tx.executed);
        Ok(())
    }

    fn rollback(&mut self, tx: MemoryTransaction) -> Result<(), GraphLoadError> {
        match tx.cleared {
            Some((nodes, relations)) => {
                self.nodes = nodes;
                self.relations = relations;
            }
            None => {
                self.nodes.truncate(tx.node_mark);
                self.relations.truncate(tx.relation_mark);
            }
        }
        self.indexes = tx.index_mark;
        self.in_transaction = false;
        self.rollbacks += 1;
        Ok(())
    }
}
