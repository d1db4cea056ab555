//! Run configuration.
//!
//! Values come from CLI flags or the GitHub Action's `INPUT_*` environment
//! (handled by the binary); this module holds the resolved settings plus the
//! small environment helpers shared by both.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            other => Err(DocError::Config(format!("Unknown output format: '{}'", other))),
        }
    }
}

/// Format for diagram files; anything but `mmd` needs `mmdc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    #[default]
    Mmd,
    Png,
    Svg,
    Pdf,
}

impl DiagramFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DiagramFormat::Mmd => "mmd",
            DiagramFormat::Png => "png",
            DiagramFormat::Svg => "svg",
            DiagramFormat::Pdf => "pdf",
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, DiagramFormat::Mmd)
    }
}

impl FromStr for DiagramFormat {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mmd" | "mermaid" => Ok(DiagramFormat::Mmd),
            "png" => Ok(DiagramFormat::Png),
            "svg" => Ok(DiagramFormat::Svg),
            "pdf" => Ok(DiagramFormat::Pdf),
            other => Err(DocError::Config(format!("Unknown diagram format: '{}'", other))),
        }
    }
}

/// Text-generation service settings.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Adapter type: "openai" or "anthropic"
    pub adapter: String,
    pub base_url: String,
    /// Empty means mock mode
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            adapter: "openai".to_string(),
            base_url: default_base_url("openai").to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: Some(0.7),
            max_tokens: 500,
        }
    }
}

impl AiConfig {
    /// Expand `${VAR}` references in the key and URL.
    pub fn resolved(mut self) -> Self {
        self.api_key = resolve_env_vars(&self.api_key);
        self.base_url = resolve_env_vars(&self.base_url);
        self
    }

    /// Whether calls should be answered with canned text instead of the API.
    pub fn use_mock(&self) -> bool {
        self.api_key.trim().is_empty() || env_flag("MOCK_AI_API").unwrap_or(false)
    }
}

pub fn default_base_url(adapter: &str) -> &'static str {
    match adapter {
        "anthropic" | "claude" => "https://api.anthropic.com",
        _ => "https://api.openai.com/v1",
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Repository root; local workflow references resolve against it
    pub workspace: PathBuf,
    /// Glob relative to the workspace
    pub workflow_pattern: String,
    /// Output directory, relative to the workspace unless absolute
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub generate_diagrams: bool,
    pub diagram_format: DiagramFormat,
    pub include_source: bool,
    pub ai_enhancement: bool,
    pub ai: AiConfig,
    /// One document per root workflow, including everything it calls
    pub consolidate: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            workflow_pattern: ".github/workflows/*.yml".to_string(),
            output_dir: PathBuf::from("docs/workflows"),
            format: OutputFormat::Markdown,
            generate_diagrams: true,
            diagram_format: DiagramFormat::Mmd,
            include_source: false,
            ai_enhancement: false,
            ai: AiConfig::default(),
            consolidate: true,
        }
    }
}

impl GeneratorConfig {
    pub fn resolved_output_dir(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.workspace.join(&self.output_dir)
        }
    }
}

/// Parse a boolean-ish environment variable.
pub fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_flag(&v))
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax.
pub fn resolve_env_vars(input: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_expr = &caps[1];
        if let Some((var_name, default_val)) = var_expr.split_once(":-") {
            std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
        } else {
            std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
        }
    })
    .to_string()
}

/// Load `.env.local` then `.env` from `dir`; variables already set win.
pub fn load_dotenv(dir: &Path) {
    for filename in [".env.local", ".env"] {
        let path = dir.join(filename);
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().trim_start_matches("export ").trim();
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
        tracing::info!("[Config] Loaded environment from '{}'", path.display());
    }
}
