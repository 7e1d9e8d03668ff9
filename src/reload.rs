//! ReloadOrchestrator: replaces the whole backend graph with one snapshot.
//!
//! Stages run strictly in order: clear, node load, lookup index creation,
//! relation load. Every operation is validated and built before the first
//! backend call, so validation and mapping errors leave the backend untouched.

use std::fmt;

use crate::{
    GraphLoadError,
    backend::GraphBackend,
    config::ReloadConfig,
    consistency::{ConsistencyFilter, NodeKeyIndex},
    entity::Snapshot,
    loader::{BatchLoader, LoadFailure, LoadResult},
    statement::{GraphOperation, StatementBuilder, validate_identifier},
    summary::{LoadSummary, StageTimer},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Clearing,
    LoadingNodes,
    CreatingIndexes,
    LoadingRelations,
    Done,
    Failed,
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReloadState::Idle => "idle",
            ReloadState::Clearing => "clearing",
            ReloadState::LoadingNodes => "loading nodes",
            ReloadState::CreatingIndexes => "creating indexes",
            ReloadState::LoadingRelations => "loading relations",
            ReloadState::Done => "done",
            ReloadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A reload that ended in [`ReloadState::Failed`]. `summary` holds the counts
/// committed before the failure.
#[derive(Debug)]
pub struct ReloadFailure {
    pub failed_in: ReloadState,
    pub summary: LoadSummary,
    pub error: GraphLoadError,
}

impl fmt::Display for ReloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reload failed while {}: {}", self.failed_in, self.error)
    }
}

impl std::error::Error for ReloadFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Operations for one node or relation kind, built ahead of loading.
struct PlannedLoad {
    kind: String,
    operations: Vec<GraphOperation>,
}

struct ReloadPlan {
    nodes: Vec<PlannedLoad>,
    indexes: Vec<(String, String)>,
    relations: Vec<PlannedLoad>,
}

pub struct ReloadOrchestrator<B: GraphBackend> {
    backend: B,
    config: ReloadConfig,
    loader: BatchLoader,
    builder: StatementBuilder,
    state: ReloadState,
    history: Vec<ReloadState>,
}

impl<B: GraphBackend> ReloadOrchestrator<B> {
    /// Applies `config.numeric_literals` to the backend's statement previews.
    pub fn new(mut backend: B, config: ReloadConfig) -> Result<Self, GraphLoadError> {
        let loader = BatchLoader::from_config(&config)?;
        backend.set_numeric_literals(config.numeric_literals);
        Ok(Self {
            backend,
            config,
            loader,
            builder: StatementBuilder::new(),
            state: ReloadState::Idle,
            history: vec![ReloadState::Idle],
        })
    }

    /// Default configuration; the backend keeps its own literal style.
    pub fn with_defaults(backend: B) -> Self {
        Self {
            backend,
            config: ReloadConfig::default(),
            loader: BatchLoader::default(),
            builder: StatementBuilder::new(),
            state: ReloadState::Idle,
            history: vec![ReloadState::Idle],
        }
    }

    pub fn state(&self) -> ReloadState {
        self.state
    }

    /// States entered during the most recent run, starting with `Idle`.
    pub fn history(&self) -> &[ReloadState] {
        &self.history
    }

    pub fn config(&self) -> &ReloadConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    fn enter(&mut self, state: ReloadState) {
        tracing::debug!(from = %self.state, to = %state, "reload state");
        self.state = state;
        self.history.push(state);
    }

    fn fail(
        &mut self,
        mut summary: LoadSummary,
        timer: &StageTimer,
        error: GraphLoadError,
    ) -> ReloadFailure {
        summary.elapsed = timer.total();
        summary.stages = timer.laps().to_vec();
        let failed_in = self.state;
        tracing::warn!(stage = %failed_in, %error, "reload failed");
        self.enter(ReloadState::Failed);
        ReloadFailure {
            failed_in,
            summary,
            error,
        }
    }

    /// Clears the backend and loads `snapshot` into it.
    pub fn reload(&mut self, snapshot: &Snapshot) -> Result<LoadSummary, ReloadFailure> {
        self.state = ReloadState::Idle;
        self.history = vec![ReloadState::Idle];
        let mut timer = StageTimer::start();
        let mut summary = LoadSummary::default();

        let plan = match self.plan(snapshot, &mut summary) {
            Ok(plan) => plan,
            Err(error) => return Err(self.fail(summary, &timer, error)),
        };
        timer.lap("prepare");

        self.enter(ReloadState::Clearing);
        match self.backend.clear_all() {
            Ok(outcome) => summary.deleted = outcome.deleted,
            Err(error) => return Err(self.fail(summary, &timer, error)),
        }
        tracing::info!(deleted = summary.deleted, "backend cleared");
        timer.lap("clear");

        self.enter(ReloadState::LoadingNodes);
        for planned in plan.nodes {
            self.load_kind(planned, &mut summary, &timer)?;
        }
        timer.lap("nodes");

        self.enter(ReloadState::CreatingIndexes);
        for (label, property) in &plan.indexes {
            if let Err(error) = self.backend.create_index(label, property) {
                return Err(self.fail(summary, &timer, error));
            }
            tracing::info!(label = %label, property = %property, "lookup index created");
        }
        timer.lap("indexes");

        self.enter(ReloadState::LoadingRelations);
        for planned in plan.relations {
            self.load_kind(planned, &mut summary, &timer)?;
        }
        timer.lap("relations");

        self.enter(ReloadState::Done);
        summary.elapsed = timer.total();
        summary.stages = timer.laps().to_vec();
        tracing::info!(
            items = summary.total_items(),
            dropped = summary.total_dropped(),
            elapsed_ms = summary.elapsed_ms() as u64,
            avg_ms_per_item = ?summary.average_ms_per_item(),
            "reload complete"
        );
        Ok(summary)
    }

    fn load_kind(
        &mut self,
        planned: PlannedLoad,
        summary: &mut LoadSummary,
        timer: &StageTimer,
    ) -> Result<(), ReloadFailure> {
        let count = planned.operations.len();
        match self.loader.load(&mut self.backend, planned.operations) {
            Ok(result) => {
                record(summary, &planned.kind, &result);
                tracing::info!(
                    kind = %planned.kind,
                    operations = count,
                    created = result.created,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "kind loaded"
                );
                Ok(())
            }
            Err(LoadFailure { result, error }) => {
                record(summary, &planned.kind, &result);
                Err(self.fail(std::mem::take(summary), timer, error))
            }
        }
    }

    /// Validates the snapshot, filters relations and builds every operation.
    fn plan(
        &self,
        snapshot: &Snapshot,
        summary: &mut LoadSummary,
    ) -> Result<ReloadPlan, GraphLoadError> {
        validate_snapshot(snapshot)?;

        let mut nodes = Vec::with_capacity(snapshot.nodes().len());
        let mut indexes: Vec<(String, String)> = Vec::new();
        for collection in snapshot.nodes() {
            let operations = collection
                .entries()
                .iter()
                .map(|entry| self.builder.build_node(collection.label(), entry.record()))
                .collect::<Result<Vec<_>, _>>()?;
            nodes.push(PlannedLoad {
                kind: collection.label().to_string(),
                operations,
            });
            if self.config.index_natural_keys {
                let index = (
                    collection.label().to_string(),
                    collection.key_property().to_string(),
                );
                if !indexes.contains(&index) {
                    indexes.push(index);
                }
            }
        }

        if self.config.index_natural_keys {
            for collection in snapshot.relations() {
                let mapping = collection.mapping();
                for (label, property) in [
                    (mapping.from_label(), mapping.from_lookup_property()),
                    (mapping.to_label(), mapping.to_lookup_property()),
                ] {
                    let index = (label.to_string(), property.to_string());
                    if !indexes.contains(&index) {
                        indexes.push(index);
                    }
                }
            }
        }

        let key_index = NodeKeyIndex::from_snapshot(snapshot);
        let filter = ConsistencyFilter::new(&key_index);
        let mut relations = Vec::with_capacity(snapshot.relations().len());
        for collection in snapshot.relations() {
            let report = filter.apply(collection);
            if report.dropped_count > 0 {
                tracing::info!(
                    kind = %report.kind,
                    dropped = report.dropped_count,
                    kept = report.kept.len(),
                    "dropped relations with missing endpoints"
                );
            }
            *summary
                .dropped_relations
                .entry(report.kind.clone())
                .or_insert(0) += report.dropped_count;
            summary.warnings.extend(report.warnings);

            let operations = report
                .kept
                .iter()
                .map(|entry| {
                    self.builder
                        .build_relation(entry.record(), collection.mapping())
                })
                .collect::<Result<Vec<_>, _>>()?;
            relations.push(PlannedLoad {
                kind: report.kind,
                operations,
            });
        }

        Ok(ReloadPlan {
            nodes,
            indexes,
            relations,
        })
    }
}

fn record(summary: &mut LoadSummary, kind: &str, result: &LoadResult) {
    summary.add_count(kind, result.created);
    summary.commits += result.commits.len();
    summary.unresolved_relations += result.unresolved_relations;
}

/// Checks names and mappings across the whole snapshot.
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), GraphLoadError> {
    for collection in snapshot.nodes() {
        validate_identifier("label", collection.label())?;
        for field in collection.fields() {
            validate_identifier(&format!("field of {}", collection.label()), field)?;
        }
        reject_duplicate_fields(collection.label(), collection.fields())?;
        if !collection.fields().iter().any(|f| f == collection.key_property()) {
            return Err(GraphLoadError::mapping(format!(
                "{} key {:?} is not a declared field",
                collection.label(),
                collection.key_property()
            )));
        }
    }

    for collection in snapshot.relations() {
        let mapping = collection.mapping();
        validate_identifier("relation kind", collection.kind())?;
        validate_identifier("relation name", mapping.relation_name())?;
        for field in collection.fields() {
            validate_identifier(&format!("field of {}", collection.kind()), field)?;
        }
        reject_duplicate_fields(collection.kind(), collection.fields())?;
        for key_field in [mapping.from_key_field(), mapping.to_key_field()] {
            if !collection.fields().iter().any(|f| f == key_field) {
                return Err(GraphLoadError::mapping(format!(
                    "{} declares no {key_field:?} field",
                    collection.kind()
                )));
            }
        }
        for (label, property) in [
            (mapping.from_label(), mapping.from_lookup_property()),
            (mapping.to_label(), mapping.to_lookup_property()),
        ] {
            validate_identifier("label", label)?;
            validate_identifier("lookup property", property)?;
            let nodes = snapshot.node_collection(label).ok_or_else(|| {
                GraphLoadError::mapping(format!(
                    "{} resolves against {label}, which is not in the snapshot",
                    collection.kind()
                ))
            })?;
            if !nodes.fields().iter().any(|f| f == property) {
                return Err(GraphLoadError::mapping(format!(
                    "{} looks up {label}.{property}, which is not a declared field",
                    collection.kind()
                )));
            }
        }
    }
    Ok(())
}

/// Two declared fields that normalize to the same property name would
/// overwrite each other.
fn reject_duplicate_fields(owner: &str, fields: &[String]) -> Result<(), GraphLoadError> {
    for (position, field) in fields.iter().enumerate() {
        if fields[..position].contains(field) {
            return Err(GraphLoadError::validation(format!(
                "{owner} declares more than one field named {field:?} after normalization"
            )));
        }
    }
    Ok(())
}
