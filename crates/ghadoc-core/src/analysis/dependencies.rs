//! Job dependency map and execution levels.
//!
//! Levels are built by repeatedly peeling off every job whose dependencies
//! have all been placed already. When nothing is ready but jobs remain, the
//! remaining jobs contain a cycle: the lowest id (by string order) is placed
//! on its own level and leveling continues, so every job is always emitted
//! exactly once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::workflow::JobTable;

/// Job id → ids it directly depends on.
pub type DependencyMap = BTreeMap<String, BTreeSet<String>>;

/// Jobs grouped into levels that can run concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFlow {
    /// Each level sorted by job id
    pub levels: Vec<Vec<String>>,
    /// Jobs placed on their own level to break a dependency cycle
    #[serde(default)]
    pub forced: Vec<String>,
}

impl ExecutionFlow {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn has_cycle(&self) -> bool {
        !self.forced.is_empty()
    }

    /// Index of the level containing `job`.
    pub fn level_of(&self, job: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|j| j == job))
    }
}

/// Build the dependency map for a job table.
///
/// Dependency targets that are not jobs of this table are kept and also added
/// as keys with no dependencies of their own.
pub fn compute_dependencies(jobs: &JobTable) -> DependencyMap {
    let mut dependencies: DependencyMap = jobs
        .iter()
        .map(|job| (job.id.clone(), job.needs.to_set()))
        .collect();

    let undeclared: Vec<String> = dependencies
        .values()
        .flatten()
        .filter(|dep| !dependencies.contains_key(*dep))
        .cloned()
        .collect();
    for dep in undeclared {
        dependencies.entry(dep).or_default();
    }

    dependencies
}

/// Level the dependency graph, breaking cycles deterministically.
pub fn compute_execution_flow(dependencies: &DependencyMap) -> ExecutionFlow {
    let mut graph: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (job, deps) in dependencies {
        graph
            .entry(job.as_str())
            .or_default()
            .extend(deps.iter().map(String::as_str));
        for dep in deps {
            graph.entry(dep.as_str()).or_default();
        }
    }

    let mut remaining: BTreeSet<&str> = graph.keys().copied().collect();
    let mut flow = ExecutionFlow::default();

    while !remaining.is_empty() {
        let mut level: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|job| !graph[job].iter().any(|dep| remaining.contains(dep)))
            .collect();

        if level.is_empty() {
            // `remaining` is ordered, so the first entry is the lowest id.
            let Some(&forced) = remaining.iter().next() else {
                break;
            };
            tracing::warn!(
                "[Analyzer] Dependency cycle detected among jobs [{}]; placing '{}' first",
                remaining.iter().copied().collect::<Vec<_>>().join(", "),
                forced
            );
            flow.forced.push(forced.to_string());
            level.push(forced);
        }

        for job in &level {
            remaining.remove(job);
        }
        flow.levels
            .push(level.into_iter().map(str::to_string).collect());
    }

    flow
}
