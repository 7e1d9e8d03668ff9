//! Full-reload ingestion of typed entity snapshots into a graph backend.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod backend;
pub mod bench_utils;
#[cfg(feature = "sqlite-backend")]
pub mod cache;
pub mod config;
pub mod consistency;
pub mod entity;
pub mod errors;
pub mod loader;
pub mod mapping;
pub mod movies;
pub mod property;
pub mod reload;
#[cfg(feature = "sqlite-backend")]
pub mod safety;
#[cfg(feature = "sqlite-backend")]
pub mod schema;
pub mod statement;
pub mod summary;

pub use crate::backend::{GraphBackend, MemoryGraphBackend, OperationOutcome};
#[cfg(feature = "sqlite-backend")]
pub use crate::backend::SqliteGraphBackend;
pub use crate::config::{NumericLiteralMode, ReloadConfig, SqliteConfig};
pub use crate::consistency::{ConsistencyFilter, ConsistencyWarning, NodeKeyIndex};
pub use crate::entity::{NaturalKey, NodeCollection, RelationCollection, Snapshot};
pub use crate::errors::GraphLoadError;
pub use crate::loader::{BatchLoader, LoadFailure, LoadResult};
pub use crate::mapping::MappingConfig;
pub use crate::property::{PropertySet, PropertyValue, project};
pub use crate::reload::{ReloadFailure, ReloadOrchestrator, ReloadState};
pub use crate::statement::{GraphOperation, Statement, StatementBuilder};
pub use crate::summary::{LoadSummary, StageTiming};
