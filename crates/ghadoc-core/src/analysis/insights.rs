//! Secondary facts pulled from a workflow for the documentation: reusable
//! workflow calls, action usage, conditions, matrices, referenced
//! variables/secrets, and permissions.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::workflow::WorkflowModel;

/// A job that invokes another workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCall {
    pub job_id: String,
    pub workflow_path: String,
    pub remote: bool,
    #[serde(default)]
    pub inputs: Map<String, JsonValue>,
    #[serde(default)]
    pub secrets: Option<JsonValue>,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalJob {
    pub job_id: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalStep {
    pub step_index: usize,
    pub step_name: String,
    pub condition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalPaths {
    pub jobs: Vec<ConditionalJob>,
    /// Job id → its conditional steps
    pub steps: BTreeMap<String, Vec<ConditionalStep>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixJob {
    pub job_id: String,
    pub matrix_dimensions: Vec<String>,
    pub combinations: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixUsage {
    pub jobs_with_matrix: Vec<MatrixJob>,
    pub total_combinations: usize,
    pub has_matrix: bool,
}

/// Names referenced through `${{ ... }}` expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvRequirements {
    pub environment_variables: BTreeSet<String>,
    pub secrets: BTreeSet<String>,
    pub contexts: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionUsage {
    pub workflow_level: Option<JsonValue>,
    pub job_level: BTreeMap<String, JsonValue>,
}

pub fn workflow_calls(model: &WorkflowModel) -> Vec<WorkflowCall> {
    model
        .jobs
        .iter()
        .filter_map(|job| {
            let call = job.call()?;
            Some(WorkflowCall {
                job_id: job.id.clone(),
                workflow_path: call.raw(),
                remote: matches!(call, crate::workflow::UsesRef::RemoteCall(_)),
                inputs: job.with.clone(),
                secrets: job.secrets.clone(),
                condition: job.condition.clone(),
            })
        })
        .collect()
}

/// Count step-level actions by name (the part before `@`).
pub fn action_usage(model: &WorkflowModel) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for job in model.jobs.iter().filter(|job| !job.is_reusable()) {
        for uses in job.steps.iter().filter_map(|step| step.uses.as_deref()) {
            let action = uses.split('@').next().unwrap_or(uses).to_string();
            *counts.entry(action).or_insert(0) += 1;
        }
    }
    counts
}

pub fn conditional_paths(model: &WorkflowModel) -> ConditionalPaths {
    let mut paths = ConditionalPaths::default();

    for job in &model.jobs {
        if let Some(condition) = job.condition.as_deref().filter(|c| !c.is_empty()) {
            paths.jobs.push(ConditionalJob {
                job_id: job.id.clone(),
                condition: condition.to_string(),
            });
        }

        let steps: Vec<ConditionalStep> = job
            .steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| {
                let condition = step.condition.as_deref().filter(|c| !c.is_empty())?;
                Some(ConditionalStep {
                    step_index: i,
                    step_name: step
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("Step {}", i + 1)),
                    condition: condition.to_string(),
                })
            })
            .collect();
        if !steps.is_empty() {
            paths.steps.insert(job.id.clone(), steps);
        }
    }

    paths
}

pub fn matrix_usage(model: &WorkflowModel) -> MatrixUsage {
    let mut usage = MatrixUsage::default();

    for job in &model.jobs {
        let Some(strategy) = job.strategy.as_ref().filter(|_| job.has_matrix()) else {
            continue;
        };
        let combinations = strategy
            .matrix
            .values()
            .filter_map(JsonValue::as_array)
            .map(Vec::len)
            .product::<usize>();

        usage.jobs_with_matrix.push(MatrixJob {
            job_id: job.id.clone(),
            matrix_dimensions: strategy.matrix.keys().cloned().collect(),
            combinations,
        });
        usage.total_combinations += combinations;
        usage.has_matrix = true;
    }

    usage
}

pub fn env_requirements(raw_content: &str) -> EnvRequirements {
    let mut requirements = EnvRequirements::default();
    let Ok(re) = Regex::new(r"\$\{\{\s*([A-Za-z]+)\.([A-Za-z0-9_]+)\s*\}\}") else {
        return requirements;
    };

    for caps in re.captures_iter(raw_content) {
        let (context, name) = (&caps[1], &caps[2]);
        match context {
            "env" => {
                requirements.environment_variables.insert(name.to_string());
            }
            "secrets" => {
                requirements.secrets.insert(name.to_string());
            }
            _ if context.chars().all(|c| c.is_ascii_lowercase()) => {
                requirements.contexts.insert(format!("{}.{}", context, name));
            }
            _ => {}
        }
    }

    requirements
}

pub fn permission_usage(model: &WorkflowModel) -> PermissionUsage {
    PermissionUsage {
        workflow_level: model.permissions.clone(),
        job_level: model
            .jobs
            .iter()
            .filter_map(|job| Some((job.id.clone(), job.permissions.clone()?)))
            .collect(),
    }
}
