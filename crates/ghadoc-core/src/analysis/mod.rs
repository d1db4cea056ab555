//! Per-workflow analysis.
//!
//! ```text
//! WorkflowModel ─► compute_dependencies ─► compute_execution_flow
//!       │                   │                       │
//!       │                   └──────────┬────────────┘
//!       │                              ▼
//!       └──► insights          ComplexityMetrics
//!                 │                    │
//!                 └────► WorkflowAnalysis ◄┘
//! ```

pub mod dependencies;
pub mod insights;
pub mod metrics;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use dependencies::{compute_dependencies, compute_execution_flow, DependencyMap, ExecutionFlow};
pub use insights::{
    ConditionalPaths, EnvRequirements, MatrixUsage, PermissionUsage, WorkflowCall,
};
pub use metrics::ComplexityMetrics;

use crate::workflow::WorkflowModel;

/// Everything derived from one workflow model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowAnalysis {
    pub dependencies: DependencyMap,
    pub execution_flow: ExecutionFlow,
    pub complexity: ComplexityMetrics,
    pub workflow_calls: Vec<WorkflowCall>,
    pub action_usage: BTreeMap<String, usize>,
    pub conditional_paths: ConditionalPaths,
    pub matrix_usage: MatrixUsage,
    pub env_requirements: EnvRequirements,
    pub permission_usage: PermissionUsage,
}

pub fn analyze(model: &WorkflowModel) -> WorkflowAnalysis {
    let dependencies = compute_dependencies(&model.jobs);
    let execution_flow = compute_execution_flow(&dependencies);
    let complexity = ComplexityMetrics::compute(&model.jobs, &dependencies, &execution_flow);

    tracing::debug!(
        "[Analyzer] '{}': {} jobs in {} levels (score {:.1})",
        model.name,
        complexity.jobs_count,
        execution_flow.len(),
        complexity.complexity_score
    );

    WorkflowAnalysis {
        workflow_calls: insights::workflow_calls(model),
        action_usage: insights::action_usage(model),
        conditional_paths: insights::conditional_paths(model),
        matrix_usage: insights::matrix_usage(model),
        env_requirements: insights::env_requirements(&model.raw_content),
        permission_usage: insights::permission_usage(model),
        dependencies,
        execution_flow,
        complexity,
    }
}
