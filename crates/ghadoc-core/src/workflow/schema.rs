//! Structured model of a GitHub Actions workflow file.
//!
//! A workflow YAML is read defensively: unknown keys are ignored and
//! oddly-shaped values fall back to empty defaults instead of failing the
//! whole document. Only a document that is not valid YAML, or whose top level
//! is not a mapping, is rejected.
//!
//! ```yaml
//! # @description: Build and publish the container image
//! name: "Release"
//!
//! on:
//!   push:
//!     tags: ["v*"]
//!   workflow_dispatch:
//!     inputs:
//!       environment:
//!         description: "Target environment"
//!         default: "staging"
//!
//! jobs:
//!   build:
//!     runs-on: ubuntu-latest
//!     steps:
//!       - uses: actions/checkout@v4
//!       - run: make image
//!   publish:
//!     needs: build
//!     uses: ./.github/workflows/publish.yml
//!     secrets: inherit
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use serde_yaml::{Mapping, Value};

use crate::error::DocError;
use crate::workflow::reference::{classify_uses, UsesRef};

/// A parsed workflow document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowModel {
    /// Display name (`name:` or the file stem)
    pub name: String,

    /// File name including extension
    pub file_name: String,

    /// On-disk path or remote tag this workflow was loaded from
    #[serde(default)]
    pub raw_reference: Option<String>,

    /// Value of the `# @description:` annotation, if any
    #[serde(default)]
    pub description: String,

    /// All `# @key: value` comment annotations
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub triggers: Vec<Trigger>,

    #[serde(default)]
    pub inputs: Vec<WorkflowInput>,

    /// Workflow-level environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub concurrency: Option<Concurrency>,

    /// Workflow-level `permissions` block
    #[serde(default)]
    pub permissions: Option<JsonValue>,

    pub jobs: JobTable,

    /// Original YAML text
    #[serde(default, skip_serializing)]
    pub raw_content: String,
}

/// An event that starts the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub event_type: String,
    /// Event filters (branches, paths, types, cron, ...)
    #[serde(default)]
    pub filters: Map<String, JsonValue>,
}

/// A `workflow_dispatch` / `workflow_call` / top-level input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: String,
    #[serde(rename = "type", default = "default_input_type")]
    pub input_type: String,
}

fn default_input_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concurrency {
    pub group: String,
    #[serde(default)]
    pub cancel_in_progress: bool,
}

/// Declared predecessors of a job, as written in `needs:`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NeedsSpec {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl NeedsSpec {
    /// Normalize to a set of job ids; duplicates collapse.
    pub fn to_set(&self) -> BTreeSet<String> {
        match self {
            NeedsSpec::None => BTreeSet::new(),
            NeedsSpec::Single(id) => BTreeSet::from([id.clone()]),
            NeedsSpec::Multiple(ids) => ids.iter().cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            NeedsSpec::None => true,
            NeedsSpec::Single(_) => false,
            NeedsSpec::Multiple(ids) => ids.is_empty(),
        }
    }

    fn from_yaml(value: Option<&Value>, job_id: &str) -> Self {
        match value {
            None | Some(Value::Null) => NeedsSpec::None,
            Some(Value::String(id)) => NeedsSpec::Single(id.clone()),
            Some(Value::Sequence(items)) => {
                NeedsSpec::Multiple(items.iter().filter_map(scalar_to_string).collect())
            }
            Some(other) => {
                tracing::debug!(
                    "[Parser] Ignoring unsupported 'needs' shape on job '{}': {:?}",
                    job_id,
                    other
                );
                NeedsSpec::None
            }
        }
    }
}

/// A single job inside a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job id (key under `jobs:`)
    pub id: String,

    /// Display name (defaults to the id)
    pub name: String,

    #[serde(default)]
    pub needs: NeedsSpec,

    /// Job-level `uses:` (reusable workflow call)
    #[serde(default)]
    pub uses: Option<UsesRef>,

    #[serde(default)]
    pub runs_on: Option<String>,

    /// The job's `if:` expression
    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub steps: Vec<StepSpec>,

    /// `with:` inputs passed to a called workflow
    #[serde(default)]
    pub with: Map<String, JsonValue>,

    /// `secrets:` passed to a called workflow (mapping or `inherit`)
    #[serde(default)]
    pub secrets: Option<JsonValue>,

    #[serde(default)]
    pub outputs: Map<String, JsonValue>,

    #[serde(default)]
    pub env: Map<String, JsonValue>,

    #[serde(default)]
    pub strategy: Option<Strategy>,

    #[serde(default)]
    pub permissions: Option<JsonValue>,
}

impl JobSpec {
    /// A job with no body of its own, only the given dependencies.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            needs: NeedsSpec::None,
            uses: None,
            runs_on: None,
            condition: None,
            steps: Vec::new(),
            with: Map::new(),
            secrets: None,
            outputs: Map::new(),
            env: Map::new(),
            strategy: None,
            permissions: None,
        }
    }

    /// The job delegates to `uses:` instead of running steps.
    pub fn is_reusable(&self) -> bool {
        self.uses.is_some()
    }

    /// The workflow reference this job calls, if it calls one.
    pub fn call(&self) -> Option<&UsesRef> {
        self.uses.as_ref().filter(|uses| uses.is_call())
    }

    pub fn has_matrix(&self) -> bool {
        self.strategy.as_ref().is_some_and(|s| !s.matrix.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default)]
    pub matrix: Map<String, JsonValue>,
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
    #[serde(default)]
    pub max_parallel: Option<u64>,
}

fn default_fail_fast() -> bool {
    true
}

/// One entry under a job's `steps:`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uses: Option<String>,
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub with: Map<String, JsonValue>,
    #[serde(default)]
    pub env: Map<String, JsonValue>,
}

impl StepSpec {
    /// Best human label: name, then command, then action.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.run.as_deref())
            .or(self.uses.as_deref())
            .unwrap_or("Unknown step")
    }
}

/// Jobs in declaration order, addressable by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobTable {
    jobs: Vec<JobSpec>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job, replacing any existing job with the same id.
    pub fn insert(&mut self, job: JobSpec) {
        match self.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
    }

    pub fn get(&self, id: &str) -> Option<&JobSpec> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JobSpec> {
        self.jobs.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.iter().map(|j| j.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl FromIterator<JobSpec> for JobTable {
    fn from_iter<I: IntoIterator<Item = JobSpec>>(iter: I) -> Self {
        let mut table = JobTable::new();
        for job in iter {
            table.insert(job);
        }
        table
    }
}

impl<'a> IntoIterator for &'a JobTable {
    type Item = &'a JobSpec;
    type IntoIter = std::slice::Iter<'a, JobSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}

impl WorkflowModel {
    /// Parse a workflow from YAML text; `reference` is the path or tag it came from.
    pub fn from_yaml(yaml: &str, reference: &str) -> Result<Self, DocError> {
        let file_name = reference
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(reference)
            .to_string();
        Self::from_yaml_named(yaml, reference, &file_name)
    }

    /// Parse a workflow from YAML text with an explicit file name.
    pub fn from_yaml_named(yaml: &str, reference: &str, file_name: &str) -> Result<Self, DocError> {
        let document: Value = serde_yaml::from_str(yaml)
            .map_err(|e| DocError::parse(reference, format!("invalid YAML: {}", e)))?;
        let root = document
            .as_mapping()
            .ok_or_else(|| DocError::parse(reference, "top level is not a mapping"))?;

        let annotations = extract_annotations(yaml);
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string());

        Ok(Self {
            name: get(root, "name").and_then(scalar_to_string).unwrap_or(stem),
            file_name: file_name.to_string(),
            raw_reference: Some(reference.to_string()),
            description: annotations.get("description").cloned().unwrap_or_default(),
            annotations,
            triggers: extract_triggers(get(root, "on")),
            inputs: extract_inputs(root),
            env: get(root, "env")
                .and_then(Value::as_mapping)
                .map(string_map)
                .unwrap_or_default(),
            concurrency: extract_concurrency(get(root, "concurrency")),
            permissions: get(root, "permissions").map(to_json),
            jobs: extract_jobs(get(root, "jobs"), reference),
            raw_content: yaml.to_string(),
        })
    }

    /// Load a workflow from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DocError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DocError::Io(format!(
                "Failed to read workflow file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content, &path.to_string_lossy())
    }

    /// Stem used for output file names.
    pub fn file_stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

fn get<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    mapping.get(key)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_json(value: &Value) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

fn to_json_map(value: Option<&Value>) -> Map<String, JsonValue> {
    match value.map(to_json) {
        Some(JsonValue::Object(map)) => map,
        _ => Map::new(),
    }
}

fn string_map(mapping: &Mapping) -> BTreeMap<String, String> {
    mapping
        .iter()
        .filter_map(|(k, v)| {
            let key = scalar_to_string(k)?;
            let value = scalar_to_string(v).unwrap_or_else(|| to_json(v).to_string());
            Some((key, value))
        })
        .collect()
}

fn extract_annotations(content: &str) -> BTreeMap<String, String> {
    let re = match Regex::new(r"^#\s*@(\w+):\s*(.*)") {
        Ok(re) => re,
        Err(_) => return BTreeMap::new(),
    };
    content
        .lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
        .collect()
}

fn extract_triggers(on: Option<&Value>) -> Vec<Trigger> {
    let trigger = |event_type: String, filters: Map<String, JsonValue>| Trigger {
        event_type,
        filters,
    };

    match on {
        Some(Value::String(event)) => vec![trigger(event.clone(), Map::new())],
        Some(Value::Sequence(events)) => events
            .iter()
            .filter_map(scalar_to_string)
            .map(|event| trigger(event, Map::new()))
            .collect(),
        Some(Value::Mapping(events)) => events
            .iter()
            .filter_map(|(event, config)| {
                let event = scalar_to_string(event)?;
                // Dispatch inputs are reported as workflow inputs, not filters.
                let filters = match event.as_str() {
                    "workflow_dispatch" | "workflow_call" => Map::new(),
                    _ => to_json_map(Some(config)),
                };
                Some(trigger(event, filters))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn extract_inputs(root: &Mapping) -> Vec<WorkflowInput> {
    let mut inputs: Vec<WorkflowInput> = Vec::new();

    let mut sources: Vec<&Mapping> = Vec::new();
    if let Some(top_level) = get(root, "inputs").and_then(Value::as_mapping) {
        sources.push(top_level);
    }
    if let Some(on) = get(root, "on").and_then(Value::as_mapping) {
        for event in ["workflow_dispatch", "workflow_call"] {
            if let Some(event_inputs) = on
                .get(event)
                .and_then(Value::as_mapping)
                .and_then(|config| config.get("inputs"))
                .and_then(Value::as_mapping)
            {
                sources.push(event_inputs);
            }
        }
    }

    for source in sources {
        for (name, config) in source {
            let Some(name) = scalar_to_string(name) else {
                continue;
            };
            if inputs.iter().any(|i| i.name == name) {
                continue;
            }
            let config = config.as_mapping();
            let field = |key: &str| config.and_then(|c| c.get(key));
            inputs.push(WorkflowInput {
                name,
                description: field("description").and_then(scalar_to_string).unwrap_or_default(),
                required: field("required").and_then(Value::as_bool).unwrap_or(false),
                default: field("default").and_then(scalar_to_string).unwrap_or_default(),
                input_type: field("type")
                    .and_then(scalar_to_string)
                    .unwrap_or_else(default_input_type),
            });
        }
    }

    inputs
}

fn extract_concurrency(value: Option<&Value>) -> Option<Concurrency> {
    match value? {
        Value::String(group) => Some(Concurrency {
            group: group.clone(),
            cancel_in_progress: false,
        }),
        Value::Mapping(config) => Some(Concurrency {
            group: config.get("group").and_then(scalar_to_string).unwrap_or_default(),
            cancel_in_progress: config
                .get("cancel-in-progress")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }),
        _ => None,
    }
}

fn extract_jobs(value: Option<&Value>, reference: &str) -> JobTable {
    let Some(jobs) = value.and_then(Value::as_mapping) else {
        return JobTable::new();
    };

    let mut table = JobTable::new();
    for (id, config) in jobs {
        let Some(id) = scalar_to_string(id) else {
            continue;
        };
        let Some(config) = config.as_mapping() else {
            tracing::warn!(
                "[Parser] Skipping job '{}' in '{}': job body is not a mapping",
                id,
                reference
            );
            continue;
        };
        table.insert(extract_job(id, config));
    }
    table
}

fn extract_job(id: String, config: &Mapping) -> JobSpec {
    let runs_on = config.get("runs-on").and_then(|v| match v {
        Value::Sequence(labels) => Some(
            labels
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => scalar_to_string(other).or_else(|| Some(to_json(other).to_string())),
    });

    let strategy = config
        .get("strategy")
        .and_then(Value::as_mapping)
        .map(|strategy| Strategy {
            matrix: to_json_map(strategy.get("matrix")),
            fail_fast: strategy
                .get("fail-fast")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            max_parallel: strategy.get("max-parallel").and_then(Value::as_u64),
        });

    let steps = config
        .get("steps")
        .and_then(Value::as_sequence)
        .map(|steps| {
            steps
                .iter()
                .filter_map(Value::as_mapping)
                .map(extract_step)
                .collect()
        })
        .unwrap_or_default();

    JobSpec {
        name: config
            .get("name")
            .and_then(scalar_to_string)
            .unwrap_or_else(|| id.clone()),
        needs: NeedsSpec::from_yaml(config.get("needs"), &id),
        uses: config
            .get("uses")
            .and_then(scalar_to_string)
            .map(|raw| classify_uses(&raw)),
        runs_on,
        condition: config.get("if").and_then(scalar_to_string),
        steps,
        with: to_json_map(config.get("with")),
        secrets: config.get("secrets").map(to_json),
        outputs: to_json_map(config.get("outputs")),
        env: to_json_map(config.get("env")),
        strategy,
        permissions: config.get("permissions").map(to_json),
        id,
    }
}

fn extract_step(step: &Mapping) -> StepSpec {
    StepSpec {
        name: step.get("name").and_then(scalar_to_string),
        uses: step.get("uses").and_then(scalar_to_string),
        run: step.get("run").and_then(scalar_to_string),
        shell: step.get("shell").and_then(scalar_to_string),
        condition: step.get("if").and_then(scalar_to_string),
        with: to_json_map(step.get("with")),
        env: to_json_map(step.get("env")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# @description: This is a test workflow
# @author: Test Author
name: Test Workflow

on:
  push:
    branches: [ main ]
  pull_request:
    branches: [ main ]
  workflow_dispatch:
    inputs:
      environment:
        description: 'Environment to deploy to'
        required: true
        default: 'dev'

env:
  NODE_VERSION: 20

concurrency:
  group: ci-${{ github.ref }}
  cancel-in-progress: true

jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v3
      - name: Set up Python
        uses: actions/setup-python@v4
        with:
          python-version: '3.10'
      - name: Run tests
        run: pytest
  deploy:
    needs: build
    uses: ./.github/workflows/deploy.yml
    with:
      environment: prod
    secrets: inherit
"#;

    #[test]
    fn test_parse_workflow() {
        let wf = WorkflowModel::from_yaml(SAMPLE, "/repo/.github/workflows/ci.yml").unwrap();
        assert_eq!(wf.name, "Test Workflow");
        assert_eq!(wf.file_name, "ci.yml");
        assert_eq!(wf.description, "This is a test workflow");
        assert_eq!(wf.annotations.get("author").unwrap(), "Test Author");
        assert_eq!(wf.jobs.len(), 2);
        assert_eq!(wf.jobs.ids().collect::<Vec<_>>(), vec!["build", "deploy"]);
        assert_eq!(wf.env.get("NODE_VERSION").unwrap(), "20");

        let triggers: Vec<_> = wf.triggers.iter().map(|t| t.event_type.as_str()).collect();
        assert_eq!(triggers, vec!["push", "pull_request", "workflow_dispatch"]);
        assert!(wf.triggers[0].filters.contains_key("branches"));

        assert_eq!(wf.inputs.len(), 1);
        assert_eq!(wf.inputs[0].name, "environment");
        assert!(wf.inputs[0].required);
        assert_eq!(wf.inputs[0].default, "dev");

        let concurrency = wf.concurrency.unwrap();
        assert!(concurrency.cancel_in_progress);
    }

    #[test]
    fn test_job_shapes() {
        let wf = WorkflowModel::from_yaml(SAMPLE, "ci.yml").unwrap();
        let build = wf.jobs.get("build").unwrap();
        assert_eq!(build.runs_on.as_deref(), Some("ubuntu-latest"));
        assert_eq!(build.steps.len(), 3);
        assert_eq!(build.steps[0].label(), "actions/checkout@v3");
        assert_eq!(build.steps[2].label(), "Run tests");
        assert!(!build.is_reusable());

        let deploy = wf.jobs.get("deploy").unwrap();
        assert_eq!(deploy.needs, NeedsSpec::Single("build".to_string()));
        assert_eq!(
            deploy.call(),
            Some(&UsesRef::LocalCall("./.github/workflows/deploy.yml".to_string()))
        );
        assert_eq!(deploy.secrets, Some(JsonValue::String("inherit".to_string())));
    }

    #[test]
    fn test_needs_shapes_are_normalized() {
        let yaml = r#"
on: push
jobs:
  a:
    runs-on: ubuntu-latest
  b:
    needs: [a, a]
  c:
    needs: { weird: true }
"#;
        let wf = WorkflowModel::from_yaml(yaml, "needs.yml").unwrap();
        assert_eq!(wf.name, "needs");
        assert_eq!(wf.triggers.len(), 1);
        assert_eq!(wf.jobs.get("a").unwrap().needs, NeedsSpec::None);
        assert_eq!(
            wf.jobs.get("b").unwrap().needs.to_set(),
            BTreeSet::from(["a".to_string()])
        );
        assert_eq!(wf.jobs.get("c").unwrap().needs, NeedsSpec::None);
    }

    #[test]
    fn test_rejects_non_mapping_document() {
        assert!(WorkflowModel::from_yaml("- just\n- a list\n", "list.yml").is_err());
        assert!(WorkflowModel::from_yaml("jobs: [unclosed", "broken.yml").is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = WorkflowModel::from_file("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, DocError::Io(_)));
    }
}
