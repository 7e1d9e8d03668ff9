//! Post-load integrity checks over the SQLite graph tables.

use std::{fmt, result};

use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::{GraphLoadError, backend::SqliteGraphBackend};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub total_nodes: i64,
    pub total_edges: i64,
    pub orphan_edges: i64,
    pub duplicate_edges: i64,
}

impl SafetyReport {
    pub fn merge(&mut self, other: &SafetyReport) {
        self.total_nodes = self.total_nodes.max(other.total_nodes);
        self.total_edges = self.total_edges.max(other.total_edges);
        self.orphan_edges += other.orphan_edges;
        self.duplicate_edges += other.duplicate_edges;
    }

    pub fn has_issues(&self) -> bool {
        self.orphan_edges > 0 || self.duplicate_edges > 0
    }
}

#[derive(Debug)]
pub struct SafetyError {
    pub report: SafetyReport,
    pub source: Option<GraphLoadError>,
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(err) => write!(f, "safety checks could not run: {err}"),
            None => write!(
                f,
                "safety violations detected: {} orphan edges, {} duplicate edges",
                self.report.orphan_edges, self.report.duplicate_edges
            ),
        }
    }
}

impl std::error::Error for SafetyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &dyn std::error::Error)
    }
}

/// Edges whose endpoint entity no longer exists.
pub fn validate_referential_integrity(
    backend: &SqliteGraphBackend,
) -> Result<SafetyReport, GraphLoadError> {
    let mut report = base_report(backend)?;
    report.orphan_edges = query_single(
        backend,
        "SELECT COUNT(*) FROM graph_edges e \
         LEFT JOIN graph_entities src ON src.id = e.from_id \
         LEFT JOIN graph_entities dst ON dst.id = e.to_id \
         WHERE src.id IS NULL OR dst.id IS NULL",
    )?;
    Ok(report)
}

/// Extra copies of the same (from, to, type) edge.
pub fn validate_no_duplicate_edges(
    backend: &SqliteGraphBackend,
) -> Result<SafetyReport, GraphLoadError> {
    let mut report = base_report(backend)?;
    report.duplicate_edges = query_single(
        backend,
        "SELECT COALESCE(SUM(cnt - 1), 0) FROM ( \
             SELECT COUNT(*) AS cnt FROM graph_edges \
             GROUP BY from_id, to_id, edge_type \
             HAVING cnt > 1 \
         )",
    )?;
    Ok(report)
}

pub fn run_safety_checks(backend: &SqliteGraphBackend) -> Result<SafetyReport, GraphLoadError> {
    let mut report = SafetyReport::default();
    report.merge(&validate_referential_integrity(backend)?);
    report.merge(&validate_no_duplicate_edges(backend)?);
    Ok(report)
}

pub fn run_strict_safety_checks(backend: &SqliteGraphBackend) -> result::Result<(), SafetyError> {
    let report = run_safety_checks(backend).map_err(|err| SafetyError {
        report: SafetyReport::default(),
        source: Some(err),
    })?;
    if report.has_issues() {
        tracing::warn!(?report, "graph failed safety checks");
        Err(SafetyError {
            report,
            source: None,
        })
    } else {
        Ok(())
    }
}

fn base_report(backend: &SqliteGraphBackend) -> Result<SafetyReport, GraphLoadError> {
    let total_nodes = query_single(backend, "SELECT COUNT(*) FROM graph_entities")?;
    let total_edges = query_single(backend, "SELECT COUNT(*) FROM graph_edges")?;
    Ok(SafetyReport {
        total_nodes,
        total_edges,
        ..SafetyReport::default()
    })
}

fn query_single(backend: &SqliteGraphBackend, sql: &str) -> Result<i64, GraphLoadError> {
    backend
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .optional()
        .map(|opt| opt.unwrap_or(0))
        .map_err(|e| GraphLoadError::backend(e.to_string()))
}
