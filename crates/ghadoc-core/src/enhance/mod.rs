//! Optional prose sections written by a text-generation service.
//!
//! Four sections are requested independently. Without an API key (or with
//! `MOCK_AI_API=true`) every section uses canned text, and any section whose
//! call fails falls back to its canned text on its own.

pub mod caller;

use serde::{Deserialize, Serialize};

pub use caller::{HttpTextGenerator, MockTextGenerator, TextGenerator};

use crate::analysis::WorkflowAnalysis;
use crate::config::AiConfig;
use crate::workflow::WorkflowModel;

const SYSTEM_PROMPT: &str = "You are a GitHub Actions documentation assistant. \
Provide clear, concise, and helpful information about GitHub Actions workflows.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiEnhancement {
    pub description: String,
    pub best_practices: String,
    pub implementation_notes: String,
    pub usage_examples: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    BestPractices,
    ImplementationNotes,
    UsageExamples,
}

impl Section {
    fn name(&self) -> &'static str {
        match self {
            Section::Description => "description",
            Section::BestPractices => "best practices",
            Section::ImplementationNotes => "implementation notes",
            Section::UsageExamples => "usage examples",
        }
    }
}

pub struct AiEnhancer {
    generator: Option<Box<dyn TextGenerator>>,
}

impl AiEnhancer {
    /// HTTP-backed enhancer, or a mock one when the config says so.
    pub fn from_config(config: &AiConfig) -> Self {
        if config.use_mock() {
            tracing::info!("[Enhancer] No API key configured, using canned text");
            return Self::mock();
        }
        Self::with_generator(Box::new(HttpTextGenerator::new(config.clone())))
    }

    pub fn with_generator(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    pub fn mock() -> Self {
        Self { generator: None }
    }

    pub async fn enhance(&self, model: &WorkflowModel, analysis: &WorkflowAnalysis) -> AiEnhancement {
        AiEnhancement {
            description: self.section(Section::Description, model, analysis).await,
            best_practices: self.section(Section::BestPractices, model, analysis).await,
            implementation_notes: self.section(Section::ImplementationNotes, model, analysis).await,
            usage_examples: self.section(Section::UsageExamples, model, analysis).await,
        }
    }

    async fn section(&self, section: Section, model: &WorkflowModel, analysis: &WorkflowAnalysis) -> String {
        let Some(generator) = &self.generator else {
            return canned(section);
        };

        let prompt = prompt(section, model, analysis);
        match generator.generate(SYSTEM_PROMPT, &prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("[Enhancer] Empty {} for '{}', using canned text", section.name(), model.name);
                canned(section)
            }
            Err(e) => {
                tracing::warn!(
                    "[Enhancer] Failed to generate {} for '{}': {}",
                    section.name(),
                    model.name,
                    e
                );
                canned(section)
            }
        }
    }
}

fn prompt(section: Section, model: &WorkflowModel, analysis: &WorkflowAnalysis) -> String {
    let name = &model.name;
    match section {
        Section::Description => {
            let triggers: Vec<&str> = model.triggers.iter().map(|t| t.event_type.as_str()).collect();
            let jobs: Vec<&str> = model.jobs.ids().collect();
            format!(
                "Describe the GitHub Actions workflow \"{name}\".\n\n\
                 Triggered by: {}.\n\
                 Jobs: {}.\n\n\
                 Infer its purpose from the jobs and write a 2-3 sentence description \
                 in plain language, focused on what it achieves for the project.",
                join_or(&triggers, "none"),
                join_or(&jobs, "none"),
            )
        }
        Section::BestPractices => format!(
            "Review the GitHub Actions workflow \"{name}\" and suggest 3-5 concrete improvements.\n\n\
             Complexity score: {:.1}.\n\n\
             Typical areas: job timeouts, environment-scoped secrets, status checks before \
             deployment, composite actions for repeated steps, dependency caching.",
            analysis.complexity.complexity_score
        ),
        Section::ImplementationNotes => format!(
            "Write 1-2 paragraphs of implementation notes for the GitHub Actions workflow \"{name}\".\n\n\
             It has {} jobs and a dependency chain of {} levels.\n\n\
             Cover the overall structure, notable patterns, how correctness is protected, \
             and how responsibilities are split between jobs.",
            analysis.complexity.jobs_count,
            analysis.execution_flow.len()
        ),
        Section::UsageExamples => {
            let inputs: Vec<&str> = model.inputs.iter().map(|i| i.name.as_str()).collect();
            format!(
                "Write 1-2 practical usage examples for the GitHub Actions workflow \"{name}\".\n\n\
                 Inputs: {}.\n\n\
                 For each example give a title, when to use it, and the YAML that triggers the workflow.",
                join_or(&inputs, "none"),
            )
        }
    }
}

fn join_or(items: &[&str], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

fn canned(section: Section) -> String {
    match section {
        Section::Description => "This workflow automates part of the project's CI/CD process, \
running its jobs in a consistent and repeatable order whenever it is triggered."
            .to_string(),
        Section::BestPractices => "Consider the following practices:\n\n\
1. Set `timeout-minutes` on jobs to stop runaway runs\n\
2. Scope secrets to environments instead of the whole repository\n\
3. Require status checks before deployment steps\n\
4. Retry network-dependent operations\n\
5. Cache dependencies to shorten builds"
            .to_string(),
        Section::ImplementationNotes => "Jobs are split by responsibility and ordered through \
`needs`, so independent work runs in parallel while dependent stages wait for their inputs. \
Reusable workflows keep shared steps in one place."
            .to_string(),
        Section::UsageExamples => "Trigger the workflow manually from the Actions tab, or call it \
from another workflow:\n\n\
```yaml\n\
jobs:\n  run:\n    uses: ./.github/workflows/this-workflow.yml\n    secrets: inherit\n\
```"
        .to_string(),
    }
}
