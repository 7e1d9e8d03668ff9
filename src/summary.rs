use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::consistency::ConsistencyWarning;

/// Elapsed time of one reload stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub label: String,
    pub elapsed: Duration,
}

/// Lap timer for reload stages.
#[derive(Debug)]
pub struct StageTimer {
    started: Instant,
    lap_started: Instant,
    laps: Vec<StageTiming>,
}

impl StageTimer {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            lap_started: now,
            laps: Vec::new(),
        }
    }

    /// Closes the current lap under `label` and starts the next one.
    pub fn lap(&mut self, label: &str) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.lap_started);
        self.lap_started = now;
        self.laps.push(StageTiming {
            label: label.to_string(),
            elapsed,
        });
        elapsed
    }

    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn laps(&self) -> &[StageTiming] {
        &self.laps
    }
}

/// Outcome of one reload run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    /// Created items per node label and relation kind.
    pub counts: BTreeMap<String, u64>,
    /// Relations removed by the consistency filter, per relation kind.
    pub dropped_relations: BTreeMap<String, usize>,
    #[serde(skip)]
    pub warnings: Vec<ConsistencyWarning>,
    /// Relation operations that resolved no endpoint pair in the backend.
    pub unresolved_relations: usize,
    /// Items removed by the initial clear.
    pub deleted: u64,
    pub commits: usize,
    pub elapsed: Duration,
    pub stages: Vec<StageTiming>,
}

impl LoadSummary {
    pub fn count(&self, kind: &str) -> u64 {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn total_items(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped_relations.values().sum()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }

    pub fn stage(&self, label: &str) -> Option<&StageTiming> {
        self.stages.iter().find(|stage| stage.label == label)
    }

    /// `None` when nothing was loaded.
    pub fn average_ms_per_item(&self) -> Option<f64> {
        match self.total_items() {
            0 => None,
            items => Some(self.elapsed.as_secs_f64() * 1000.0 / items as f64),
        }
    }

    /// `None` when nothing was loaded or no time elapsed.
    pub fn items_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        match self.total_items() {
            0 => None,
            _ if secs <= 0.0 => None,
            items => Some(items as f64 / secs),
        }
    }

    pub(crate) fn add_count(&mut self, kind: &str, created: u64) {
        *self.counts.entry(kind.to_string()).or_insert(0) += created;
    }
}
