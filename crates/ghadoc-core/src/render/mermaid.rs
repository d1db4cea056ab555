//! Mermaid flowchart of a workflow's jobs.

use std::fmt::Write as _;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::analysis::WorkflowAnalysis;
use crate::workflow::WorkflowModel;

/// Mermaid `graph TD` source for the workflow.
pub fn diagram(model: &WorkflowModel, analysis: &WorkflowAnalysis) -> String {
    let mut out = String::from("graph TD;\n");

    for job in &model.jobs {
        let suffix = if job.is_reusable() {
            " (Reusable)"
        } else if job.has_matrix() {
            " (Matrix)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "    {}[\"{}{}\"];",
            node_id(&job.id),
            escape_label(&job.name),
            suffix
        );
    }

    for (job, deps) in &analysis.dependencies {
        if !model.jobs.contains(job) {
            continue;
        }
        for dep in deps.iter().filter(|dep| model.jobs.contains(dep)) {
            let _ = writeln!(out, "    {} --> {};", node_id(dep), node_id(job));
        }
    }

    for conditional in &analysis.conditional_paths.jobs {
        let _ = writeln!(
            out,
            "    style {} fill:#f9f,stroke:#333,stroke-dasharray: 5 5",
            node_id(&conditional.job_id)
        );
    }

    if !analysis.workflow_calls.is_empty() {
        out.push_str("\n    subgraph \"Reusable Workflows\"\n");
        for (i, call) in analysis.workflow_calls.iter().enumerate() {
            let _ = writeln!(out, "    wf{}[\"{}\"];", i, escape_label(&call.workflow_path));
        }
        out.push_str("    end\n");
        for (i, call) in analysis.workflow_calls.iter().enumerate() {
            let _ = writeln!(out, "    {} -- uses --> wf{};", node_id(&call.job_id), i);
        }
    }

    out
}

/// Mermaid node ids may only contain word characters.
pub fn node_id(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn escape_label(label: &str) -> String {
    label.replace('"', "#quot;")
}

/// Whether the Mermaid CLI is on `PATH`.
pub fn mmdc_available() -> bool {
    Command::new("mmdc")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Render `source` (a `.mmd` file) to `output` with `mmdc`; the image format
/// follows the output extension. Returns `false` when `mmdc` is missing or fails.
pub fn render_with_mmdc(source: &Path, output: &Path) -> bool {
    if !mmdc_available() {
        tracing::info!("[Render] Mermaid CLI not found; keeping diagram source only");
        return false;
    }

    let result = Command::new("mmdc")
        .arg("-i")
        .arg(source)
        .arg("-o")
        .arg(output)
        .args(["-t", "forest", "-b", "transparent"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();

    match result {
        Ok(o) if o.status.success() && output.exists() => true,
        Ok(o) => {
            tracing::warn!(
                "[Render] mmdc failed for {}: {}",
                source.display(),
                String::from_utf8_lossy(&o.stderr).trim()
            );
            false
        }
        Err(e) => {
            tracing::warn!("[Render] Could not run mmdc: {}", e);
            false
        }
    }
}
