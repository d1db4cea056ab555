//! `gha-doc generate` — the documentation run.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use ghadoc_core::config::default_base_url;
use ghadoc_core::{AiConfig, DiagramFormat, DocumentationPipeline, GeneratorConfig, OutputFormat};

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Workflow file glob, relative to the workspace
    #[arg(long, env = "INPUT_WORKFLOW_FILES", default_value = ".github/workflows/*.yml")]
    pub workflow_files: String,

    /// Output directory, relative to the workspace
    #[arg(long, env = "INPUT_OUTPUT_DIR", default_value = "docs/workflows")]
    pub output_dir: String,

    /// Output format: markdown or html
    #[arg(long, env = "INPUT_FORMAT", default_value = "markdown")]
    pub format: String,

    /// Write Mermaid diagrams next to the documents
    #[arg(
        long,
        env = "INPUT_GENERATE_DIAGRAMS",
        default_value = "true",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub generate_diagrams: bool,

    /// Diagram format: mmd, png, svg or pdf (images need mmdc)
    #[arg(long, env = "INPUT_DIAGRAM_FORMAT", default_value = "mmd")]
    pub diagram_format: String,

    /// Embed the workflow YAML in each document
    #[arg(
        long,
        env = "INPUT_INCLUDE_SOURCE",
        default_value = "false",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub include_source: bool,

    /// Add LLM-written sections to each document
    #[arg(
        long,
        env = "INPUT_AI_ENHANCEMENT",
        default_value = "false",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub ai_enhancement: bool,

    /// API key for the text-generation service; canned text is used without one
    #[arg(long, env = "INPUT_AI_API_KEY", hide_env_values = true)]
    pub ai_api_key: Option<String>,

    /// Base URL of the text-generation service
    #[arg(long, env = "INPUT_AI_BASE_URL")]
    pub ai_base_url: Option<String>,

    /// Model name
    #[arg(long, env = "INPUT_AI_MODEL")]
    pub ai_model: Option<String>,

    /// Adapter: openai or anthropic
    #[arg(long, env = "INPUT_AI_ADAPTER", default_value = "openai")]
    pub ai_adapter: String,

    /// Repository root
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    pub workspace: String,

    /// Document every workflow on its own instead of one document per root
    #[arg(long)]
    pub no_consolidate: bool,
}

impl GenerateArgs {
    pub fn into_config(self) -> Result<GeneratorConfig, String> {
        let format = self.format.parse::<OutputFormat>().map_err(|e| e.to_string())?;
        let diagram_format = self
            .diagram_format
            .parse::<DiagramFormat>()
            .map_err(|e| e.to_string())?;

        let adapter = self.ai_adapter.trim().to_ascii_lowercase();
        let mut ai = AiConfig {
            base_url: self
                .ai_base_url
                .unwrap_or_else(|| default_base_url(&adapter).to_string()),
            api_key: self.ai_api_key.unwrap_or_default(),
            adapter,
            ..AiConfig::default()
        };
        if let Some(model) = self.ai_model {
            ai.model = model;
        } else if ai.adapter == "anthropic" || ai.adapter == "claude" {
            ai.model = "claude-3-5-haiku-latest".to_string();
        }

        Ok(GeneratorConfig {
            workspace: PathBuf::from(self.workspace),
            workflow_pattern: self.workflow_files,
            output_dir: PathBuf::from(self.output_dir),
            format,
            generate_diagrams: self.generate_diagrams,
            diagram_format,
            include_source: self.include_source,
            ai_enhancement: self.ai_enhancement,
            ai: ai.resolved(),
            consolidate: !self.no_consolidate,
        })
    }
}

pub async fn run(args: GenerateArgs) -> Result<(), String> {
    let config = args.into_config()?;
    if config.ai_enhancement {
        tracing::info!(
            "[Generate] AI enhancement via '{}' ({}){}",
            config.ai.adapter,
            config.ai.model,
            if config.ai.use_mock() { ", canned text only" } else { "" }
        );
    }

    println!("📄 Generating workflow documentation");
    println!("   Workspace: {}", config.workspace.display());
    println!("   Pattern:   {}", config.workflow_pattern);
    println!("   Output:    {}", config.resolved_output_dir().display());
    println!();

    let pipeline = DocumentationPipeline::new(config).map_err(|e| e.to_string())?;
    let summary = pipeline.run().await.map_err(|e| e.to_string())?;

    for path in &summary.written {
        println!("   ✓ {}", path.display());
    }
    for (workflow, error) in &summary.failures {
        println!("   ✗ {}: {}", workflow, error);
    }

    let documents = summary.documents().count();
    println!();
    println!(
        "✅ Generated {} document(s), {} file(s) total",
        documents,
        summary.written.len()
    );

    if documents == 0 && !summary.failures.is_empty() {
        return Err(format!(
            "No documentation produced; {} workflow(s) failed",
            summary.failures.len()
        ));
    }
    Ok(())
}
