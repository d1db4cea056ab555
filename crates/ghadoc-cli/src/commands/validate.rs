//! `gha-doc validate <file>`

use ghadoc_core::analysis::analyze;
use ghadoc_core::workflow::WorkflowModel;

pub fn run(file: &str) -> Result<(), String> {
    for line in summary(file)? {
        println!("{}", line);
    }
    Ok(())
}

/// Human-readable summary lines for a workflow that parses.
pub fn summary(file: &str) -> Result<Vec<String>, String> {
    let model = WorkflowModel::from_file(file).map_err(|e| e.to_string())?;
    let analysis = analyze(&model);
    let mut lines = Vec::new();

    lines.push(format!("✅ Workflow '{}' is valid", model.name));
    let events: Vec<&str> = model.triggers.iter().map(|t| t.event_type.as_str()).collect();
    lines.push(format!(
        "   Triggers: {}",
        if events.is_empty() { "-".to_string() } else { events.join(", ") }
    ));
    lines.push(format!("   Jobs: {}", model.jobs.len()));
    lines.push(format!("   Execution levels: {}", analysis.execution_flow.len()));

    for (i, job) in model.jobs.iter().enumerate() {
        let kind = match job.call() {
            Some(call) => format!("calls {}", call.raw()),
            None => format!("{} step(s)", job.steps.len()),
        };
        let needs: Vec<String> = job.needs.to_set().into_iter().collect();
        if needs.is_empty() {
            lines.push(format!("   {}. {} ({})", i + 1, job.id, kind));
        } else {
            lines.push(format!("   {}. {} ({}, needs: {})", i + 1, job.id, kind, needs.join(", ")));
        }
    }

    if analysis.execution_flow.has_cycle() {
        lines.push(format!(
            "⚠️  Dependency cycle; placed ahead of their dependencies: {}",
            analysis.execution_flow.forced.join(", ")
        ));
    }

    Ok(lines)
}
