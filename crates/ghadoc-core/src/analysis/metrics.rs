use serde::{Deserialize, Serialize};

use super::dependencies::{DependencyMap, ExecutionFlow};
use crate::workflow::JobTable;

/// Size and shape figures for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub jobs_count: usize,
    /// Steps across jobs that run their own steps
    pub total_steps: usize,
    pub avg_steps_per_job: f64,
    pub avg_dependencies: f64,
    /// Number of execution levels
    pub max_chain_length: usize,
    pub complexity_score: f64,
}

impl ComplexityMetrics {
    pub fn compute(jobs: &JobTable, dependencies: &DependencyMap, flow: &ExecutionFlow) -> Self {
        let jobs_count = jobs.len();
        let total_steps: usize = jobs
            .iter()
            .filter(|job| !job.is_reusable())
            .map(|job| job.steps.len())
            .sum();
        let total_dependencies: usize = dependencies.values().map(|deps| deps.len()).sum();

        let divisor = jobs_count.max(1) as f64;
        let avg_steps_per_job = total_steps as f64 / divisor;
        let avg_dependencies = total_dependencies as f64 / divisor;
        let max_chain_length = flow.len();

        let complexity_score = jobs_count as f64 * 0.5
            + total_steps as f64 * 0.3
            + avg_dependencies * 2.0
            + max_chain_length as f64 * 1.5;

        Self {
            jobs_count,
            total_steps,
            avg_steps_per_job,
            avg_dependencies,
            max_chain_length,
            complexity_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dependencies::{compute_dependencies, compute_execution_flow};
    use crate::workflow::{JobSpec, NeedsSpec, StepSpec, UsesRef};

    #[test]
    fn test_metrics_for_small_workflow() {
        let mut build = JobSpec::new("build");
        build.steps = vec![StepSpec::default(), StepSpec::default()];
        let mut test = JobSpec::new("test");
        test.needs = NeedsSpec::Single("build".to_string());
        test.steps = vec![StepSpec::default()];
        let mut deploy = JobSpec::new("deploy");
        deploy.needs = NeedsSpec::Single("test".to_string());
        deploy.uses = Some(UsesRef::LocalCall("./deploy.yml".to_string()));

        let jobs: JobTable = vec![build, test, deploy].into_iter().collect();
        let deps = compute_dependencies(&jobs);
        let flow = compute_execution_flow(&deps);
        let metrics = ComplexityMetrics::compute(&jobs, &deps, &flow);

        assert_eq!(metrics.jobs_count, 3);
        assert_eq!(metrics.total_steps, 3);
        assert_eq!(metrics.max_chain_length, 3);
        assert!((metrics.avg_dependencies - 2.0 / 3.0).abs() < 1e-9);
        let expected = 3.0 * 0.5 + 3.0 * 0.3 + (2.0 / 3.0) * 2.0 + 3.0 * 1.5;
        assert!((metrics.complexity_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_workflow_does_not_divide_by_zero() {
        let jobs = JobTable::new();
        let deps = compute_dependencies(&jobs);
        let flow = compute_execution_flow(&deps);
        let metrics = ComplexityMetrics::compute(&jobs, &deps, &flow);
        assert_eq!(metrics.avg_steps_per_job, 0.0);
        assert_eq!(metrics.complexity_score, 0.0);
    }
}
