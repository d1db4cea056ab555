//! Document rendering.
//!
//! The renderer flattens a workflow and its analysis into a serializable view
//! and feeds it to an embedded minijinja template (`workflow.md` or
//! `workflow.html`; the `.html` name turns on auto-escaping).

pub mod mermaid;

use std::collections::BTreeSet;

use minijinja::Environment;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::analysis::{ComplexityMetrics, WorkflowAnalysis};
use crate::callgraph::consolidate::CalledWorkflow;
use crate::config::OutputFormat;
use crate::enhance::AiEnhancement;
use crate::error::DocError;
use crate::workflow::{Concurrency, UsesRef, WorkflowInput, WorkflowModel};

const MARKDOWN_TEMPLATE: &str = include_str!("templates/workflow.md.j2");
const HTML_TEMPLATE: &str = include_str!("templates/workflow.html.j2");

const STEP_LABEL_MAX: usize = 50;

/// Everything a document is rendered from.
pub struct DocumentInput<'a> {
    pub model: &'a WorkflowModel,
    pub analysis: &'a WorkflowAnalysis,
    /// Workflows folded into this document
    pub called: &'a [CalledWorkflow],
    pub enhancement: Option<&'a AiEnhancement>,
    /// Mermaid source to embed
    pub diagram: Option<&'a str>,
    /// Rendered diagram file, relative to the document
    pub diagram_image: Option<&'a str>,
    pub include_source: bool,
}

#[derive(Serialize)]
struct DocumentView<'a> {
    title: &'a str,
    file_name: &'a str,
    description: String,
    generated_on: String,
    diagram: Option<&'a str>,
    diagram_image: Option<&'a str>,
    triggers: Vec<TriggerView>,
    inputs: &'a [WorkflowInput],
    env: Vec<EnvView>,
    concurrency: Option<&'a Concurrency>,
    jobs: Vec<JobView>,
    flow_tree: String,
    forced: &'a [String],
    metrics: &'a ComplexityMetrics,
    called: &'a [CalledWorkflow],
    source: Option<&'a str>,
    ai: Option<&'a AiEnhancement>,
    related: Vec<LinkView>,
}

#[derive(Serialize)]
struct TriggerView {
    event: String,
    conditions: Vec<String>,
    description: &'static str,
}

#[derive(Serialize)]
struct EnvView {
    name: String,
    source: &'static str,
    value: String,
}

#[derive(Serialize)]
struct JobView {
    id: String,
    name: String,
    badge: &'static str,
    summary: String,
    runs_on: Option<String>,
    needs: Vec<String>,
    condition: Option<String>,
    uses: Option<String>,
    strategy: Option<String>,
    permissions: Option<String>,
    steps: Vec<String>,
}

#[derive(Serialize)]
struct LinkView {
    title: String,
    href: String,
}

pub struct DocumentRenderer {
    env: Environment<'static>,
    format: OutputFormat,
}

impl DocumentRenderer {
    pub fn new(format: OutputFormat) -> Result<Self, DocError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("workflow.md", MARKDOWN_TEMPLATE)?;
        env.add_template("workflow.html", HTML_TEMPLATE)?;
        env.add_filter("blockquote", blockquote_filter);
        Ok(Self { env, format })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn render(&self, input: &DocumentInput<'_>) -> Result<String, DocError> {
        let view = build_view(input);
        let name = match self.format {
            OutputFormat::Markdown => "workflow.md",
            OutputFormat::Html => "workflow.html",
        };
        let template = self.env.get_template(name)?;
        Ok(template.render(&view)?)
    }
}

fn blockquote_filter(value: String) -> String {
    value
        .lines()
        .map(|line| format!("> {}", line).trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_view<'a>(input: &DocumentInput<'a>) -> DocumentView<'a> {
    let model = input.model;
    let analysis = input.analysis;

    let description = if !model.description.is_empty() {
        model.description.clone()
    } else if let Some(ai) = input.enhancement.filter(|ai| !ai.description.is_empty()) {
        ai.description.clone()
    } else {
        format!("Documentation for the {} workflow.", model.name)
    };

    let mut env: Vec<EnvView> = model
        .env
        .iter()
        .map(|(name, value)| EnvView {
            name: name.clone(),
            source: "Workflow",
            value: value.clone(),
        })
        .collect();
    for var in &analysis.env_requirements.environment_variables {
        if !model.env.contains_key(var) {
            env.push(EnvView {
                name: var.clone(),
                source: "Set by user",
                value: String::new(),
            });
        }
    }

    DocumentView {
        title: &model.name,
        file_name: &model.file_name,
        description,
        generated_on: chrono::Local::now().format("%Y-%m-%d").to_string(),
        diagram: input.diagram,
        diagram_image: input.diagram_image,
        triggers: model
            .triggers
            .iter()
            .map(|t| TriggerView {
                event: t.event_type.clone(),
                conditions: t
                    .filters
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, display_json(v)))
                    .collect(),
                description: trigger_description(&t.event_type),
            })
            .collect(),
        inputs: &model.inputs,
        env,
        concurrency: model.concurrency.as_ref(),
        jobs: model.jobs.iter().map(|job| job_view(model, analysis, job)).collect(),
        flow_tree: flow_tree(&analysis.execution_flow.levels),
        forced: &analysis.execution_flow.forced,
        metrics: &analysis.complexity,
        called: input.called,
        source: input.include_source.then_some(model.raw_content.as_str()),
        ai: input.enhancement,
        related: related_links(analysis),
    }
}

fn job_view(model: &WorkflowModel, analysis: &WorkflowAnalysis, job: &crate::workflow::JobSpec) -> JobView {
    let badge = if job.condition.is_some() {
        "Conditional"
    } else if job.is_reusable() {
        "Reusable Workflow"
    } else if !job.needs.is_empty() {
        "Dependent"
    } else {
        "Required"
    };

    let uses = job.uses.as_ref().map(UsesRef::raw);
    let summary = model
        .annotations
        .get(&job.id)
        .cloned()
        .unwrap_or_else(|| match &uses {
            Some(uses) => format!("Calls the {} reusable workflow", uses),
            None => format!("{} job", job.name),
        });

    let strategy = job.strategy.as_ref().filter(|_| job.has_matrix()).map(|s| {
        format!(
            "Matrix with {}, fail-fast: {}, max-parallel: {}",
            JsonValue::Object(s.matrix.clone()),
            s.fail_fast,
            s.max_parallel
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".to_string())
        )
    });

    let permissions = analysis
        .permission_usage
        .job_level
        .get(&job.id)
        .map(|p| match p {
            JsonValue::Object(map) => map
                .iter()
                .map(|(k, v)| format!("{}:{}", k, display_json(v)))
                .collect::<Vec<_>>()
                .join(", "),
            other => display_json(other),
        });

    JobView {
        id: job.id.clone(),
        name: job.name.clone(),
        badge,
        summary,
        runs_on: job.runs_on.clone(),
        needs: job.needs.to_set().into_iter().collect(),
        condition: job.condition.clone(),
        uses,
        strategy,
        permissions,
        steps: job.steps.iter().map(|s| truncate(s.label(), STEP_LABEL_MAX)).collect(),
    }
}

/// Levels as an indented arrow tree, one level per line.
pub fn flow_tree(levels: &[Vec<String>]) -> String {
    levels
        .iter()
        .enumerate()
        .map(|(i, level)| {
            let jobs = level.join(" | ");
            if i == 0 {
                jobs
            } else {
                format!("{}└─► {}", "  ".repeat(i), jobs)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn trigger_description(event: &str) -> &'static str {
    match event {
        "push" => "Triggered when code is pushed to the repository",
        "pull_request" | "pull_request_target" => {
            "Triggered when a pull request is opened, synchronized, or modified"
        }
        "workflow_dispatch" => "Manually triggered through the GitHub UI or API",
        "workflow_call" => "Called by other workflows",
        "schedule" => "Triggered on a schedule",
        "repository_dispatch" => "Triggered by a custom webhook event",
        "release" => "Triggered by release activity",
        _ => "Triggers the workflow",
    }
}

fn related_links(analysis: &WorkflowAnalysis) -> Vec<LinkView> {
    let mut links = vec![
        LinkView {
            title: "GitHub Actions Documentation".to_string(),
            href: "https://docs.github.com/en/actions".to_string(),
        },
        LinkView {
            title: "Workflow Syntax Reference".to_string(),
            href: "https://docs.github.com/en/actions/using-workflows/workflow-syntax-for-github-actions"
                .to_string(),
        },
    ];

    let mut seen = BTreeSet::new();
    for call in &analysis.workflow_calls {
        if !seen.insert(call.workflow_path.as_str()) {
            continue;
        }
        let href = if call.remote {
            let path = call.workflow_path.split('@').next().unwrap_or(&call.workflow_path);
            let mut parts = path.splitn(3, '/');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(org), Some(repo), Some(file)) => {
                    let git_ref = call.workflow_path.rsplit('@').next().unwrap_or("main");
                    format!("https://github.com/{}/{}/blob/{}/{}", org, repo, git_ref, file)
                }
                _ => format!("https://github.com/{}", path),
            }
        } else {
            call.workflow_path.clone()
        };
        links.push(LinkView {
            title: call.workflow_path.clone(),
            href,
        });
    }
    links
}

fn display_json(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items.iter().map(display_json).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max && first_line.len() == s.len() {
        return s.to_string();
    }
    let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;

    const WORKFLOW: &str = r#"
# @description: Builds and ships the service
# @deploy: Pushes the image to production
name: Ship <Service>
on:
  push:
    branches: [main]
  workflow_dispatch:
    inputs:
      environment:
        description: Target environment
        default: staging
env:
  REGISTRY: ghcr.io
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - name: Build
        run: docker build -t ${{ env.IMAGE }} .
  deploy:
    needs: build
    if: github.ref == 'refs/heads/main'
    uses: org/infra/.github/workflows/deploy.yml@v3
"#;

    fn model() -> WorkflowModel {
        WorkflowModel::from_yaml(WORKFLOW, "ship.yml").unwrap()
    }

    fn render(format: OutputFormat, include_source: bool, ai: Option<&AiEnhancement>) -> String {
        let model = model();
        let analysis = analyze(&model);
        let diagram = mermaid::diagram(&model, &analysis);
        DocumentRenderer::new(format)
            .unwrap()
            .render(&DocumentInput {
                model: &model,
                analysis: &analysis,
                called: &[],
                enhancement: ai,
                diagram: Some(&diagram),
                diagram_image: None,
                include_source,
            })
            .unwrap()
    }

    #[test]
    fn test_markdown_sections() {
        let md = render(OutputFormat::Markdown, false, None);
        assert!(md.starts_with("# GitHub Actions Workflow: Ship <Service>"));
        assert!(md.contains("Builds and ships the service"));
        assert!(md.contains("| `push` | branches: main |"));
        assert!(md.contains("| `environment` |"));
        assert!(md.contains("| `REGISTRY` | Workflow |"));
        assert!(md.contains("| `IMAGE` | Set by user |"));
        assert!(md.contains("## Execution Flow"));
        assert!(md.contains("build\n  └─► deploy"));
        assert!(md.contains("Pushes the image to production"));
        assert!(md.contains("```mermaid\ngraph TD;"));
        assert!(md.contains("https://github.com/org/infra/blob/v3/.github/workflows/deploy.yml"));
        assert!(md.contains("Generated by gha-doc"));
        assert!(!md.contains("## Workflow Source"));
    }

    #[test]
    fn test_markdown_optional_sections() {
        let ai = AiEnhancement {
            description: "AI description".to_string(),
            best_practices: "1. First\n2. Second".to_string(),
            implementation_notes: "Notes".to_string(),
            usage_examples: "Example".to_string(),
        };
        let md = render(OutputFormat::Markdown, true, Some(&ai));
        assert!(md.contains("## Workflow Source"));
        assert!(md.contains("> 1. First\n> 2. Second"));
        assert!(md.contains("## AI-Generated Usage Examples"));
    }

    #[test]
    fn test_html_is_escaped() {
        let html = render(OutputFormat::Html, false, None);
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("Ship &lt;Service&gt;"));
        assert!(html.contains("Execution Flow"));
    }

    #[test]
    fn test_flow_tree() {
        let levels = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string()],
            vec!["d".to_string()],
        ];
        assert_eq!(flow_tree(&levels), "a | b\n  └─► c\n    └─► d");
    }

    #[test]
    fn test_truncate_step_labels() {
        assert_eq!(truncate("short", 50), "short");
        let long = "x".repeat(60);
        assert_eq!(truncate(&long, 50).chars().count(), 50);
        assert_eq!(truncate("line one\nline two", 50), "line one...");
    }
}
