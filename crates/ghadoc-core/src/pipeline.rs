//! End-to-end documentation run.
//!
//! ```text
//! discover ─► call graph ─► roots + orphans ─► consolidate ─► analyze
//!                                                               │
//!                    write ◄─ render ◄─ enhance ◄─ diagram ◄────┘
//! ```
//!
//! With consolidation off, every discovered file is documented on its own.
//! A failure while documenting one workflow is recorded in the summary and
//! the run moves on to the next.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::analysis::analyze;
use crate::callgraph::consolidate::{consolidate, CalledWorkflow};
use crate::callgraph::{collect_all_called, CallGraphBuilder, GitHubRawFetcher, RemoteFetcher, DEFAULT_MAX_DEPTH};
use crate::config::GeneratorConfig;
use crate::discovery::discover_workflows;
use crate::enhance::AiEnhancer;
use crate::error::DocError;
use crate::render::{mermaid, DocumentInput, DocumentRenderer};
use crate::workflow::WorkflowModel;

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    /// (workflow, error message)
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    pub fn documents(&self) -> impl Iterator<Item = &PathBuf> {
        self.written.iter().filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "md" || ext == "html")
        })
    }
}

pub struct DocumentationPipeline {
    config: GeneratorConfig,
    fetcher: Box<dyn RemoteFetcher>,
    enhancer: AiEnhancer,
    renderer: DocumentRenderer,
}

impl DocumentationPipeline {
    pub fn new(config: GeneratorConfig) -> Result<Self, DocError> {
        let renderer = DocumentRenderer::new(config.format)?;
        let enhancer = AiEnhancer::from_config(&config.ai);
        Ok(Self {
            config,
            fetcher: Box::new(GitHubRawFetcher::new()),
            enhancer,
            renderer,
        })
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn RemoteFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_enhancer(mut self, enhancer: AiEnhancer) -> Self {
        self.enhancer = enhancer;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<RunSummary, DocError> {
        let files = discover_workflows(&self.config.workspace, &self.config.workflow_pattern)?;
        if files.is_empty() {
            return Err(DocError::NoWorkflowFiles(self.config.workflow_pattern.clone()));
        }

        let output_dir = self.config.resolved_output_dir();
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            DocError::Io(format!(
                "Failed to create output directory '{}': {}",
                output_dir.display(),
                e
            ))
        })?;

        let summary = if self.config.consolidate {
            self.run_consolidated(&files, &output_dir).await
        } else {
            self.run_per_file(&files, &output_dir).await
        };

        tracing::info!(
            "[Pipeline] Wrote {} file(s) to {} ({} failure(s))",
            summary.written.len(),
            output_dir.display(),
            summary.failures.len()
        );
        Ok(summary)
    }

    async fn run_consolidated(&self, files: &[PathBuf], output_dir: &Path) -> RunSummary {
        let mut summary = RunSummary::default();
        let builder = CallGraphBuilder::new(&self.config.workspace, self.fetcher.as_ref());
        let ctx = builder.build(files).await;

        summary.failures.extend(
            ctx.failures
                .iter()
                .map(|(key, message)| (key.to_string(), message.clone())),
        );

        let (roots, orphans) = ctx.roots_and_orphans();
        if roots.is_empty() {
            tracing::warn!("[Pipeline] Every discovered workflow is called by another; no entry points to document");
        }
        tracing::info!("[Pipeline] {} root(s), {} orphan(s)", roots.len(), orphans.len());

        let mut stems = BTreeSet::new();
        for key in roots.iter().chain(orphans.iter()) {
            let called = collect_all_called(key, &ctx.graph, DEFAULT_MAX_DEPTH);
            // Unparsed roots were already reported by the builder.
            let Some(merged) = consolidate(key, &called, &ctx.parsed, builder.workspace_root()) else {
                continue;
            };

            let stem = unique_stem(&mut stems, &merged.model.file_stem());
            match self.document(&merged.model, &merged.called, output_dir, &stem).await {
                Ok(paths) => summary.written.extend(paths),
                Err(e) => {
                    tracing::error!("[Pipeline] Failed to document {}: {}", key, e);
                    summary.failures.push((key.to_string(), e.to_string()));
                }
            }
        }

        summary
    }

    async fn run_per_file(&self, files: &[PathBuf], output_dir: &Path) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut stems = BTreeSet::new();

        for file in files {
            let result = match WorkflowModel::from_file(file) {
                Ok(model) => {
                    let stem = unique_stem(&mut stems, &model.file_stem());
                    self.document(&model, &[], output_dir, &stem).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(paths) => summary.written.extend(paths),
                Err(e) => {
                    tracing::error!("[Pipeline] Failed to document {}: {}", file.display(), e);
                    summary.failures.push((file.display().to_string(), e.to_string()));
                }
            }
        }

        summary
    }

    /// Analyze, diagram, enhance, render and write one workflow.
    async fn document(
        &self,
        model: &WorkflowModel,
        called: &[CalledWorkflow],
        output_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>, DocError> {
        let mut written = Vec::new();
        let analysis = analyze(model);

        let mut diagram = None;
        let mut diagram_image = None;
        if self.config.generate_diagrams {
            let source = mermaid::diagram(model, &analysis);
            let source_path = output_dir.join(format!("{}-diagram.mmd", stem));
            write_file(&source_path, &source).await?;
            written.push(source_path.clone());

            let format = self.config.diagram_format;
            if format.is_image() {
                let image_name = format!("{}-diagram.{}", stem, format.extension());
                let image_path = output_dir.join(&image_name);
                if mermaid::render_with_mmdc(&source_path, &image_path) {
                    written.push(image_path);
                    diagram_image = Some(image_name);
                }
            }
            diagram = Some(source);
        }

        let enhancement = if self.config.ai_enhancement {
            Some(self.enhancer.enhance(model, &analysis).await)
        } else {
            None
        };

        let document = self.renderer.render(&DocumentInput {
            model,
            analysis: &analysis,
            called,
            enhancement: enhancement.as_ref(),
            diagram: diagram.as_deref(),
            diagram_image: diagram_image.as_deref(),
            include_source: self.config.include_source,
        })?;

        let doc_path = output_dir.join(format!("{}.{}", stem, self.renderer.format().extension()));
        write_file(&doc_path, &document).await?;
        tracing::info!("[Pipeline] Documented '{}' → {}", model.name, doc_path.display());
        written.push(doc_path);

        Ok(written)
    }
}

async fn write_file(path: &Path, content: &str) -> Result<(), DocError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| DocError::Io(format!("Failed to write '{}': {}", path.display(), e)))
}

fn unique_stem(used: &mut BTreeSet<String>, stem: &str) -> String {
    let mut candidate = stem.to_string();
    let mut n = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{}-{}", stem, n);
        n += 1;
    }
    candidate
}
