//! `gha-doc analyze <file>`

use ghadoc_core::analysis::analyze;
use ghadoc_core::workflow::WorkflowModel;

use super::print_json;

pub fn run(file: &str) -> Result<(), String> {
    print_json(&report(file)?);
    Ok(())
}

/// Workflow name, file and full analysis as one JSON document.
pub fn report(file: &str) -> Result<serde_json::Value, String> {
    let model = WorkflowModel::from_file(file).map_err(|e| e.to_string())?;
    let analysis = analyze(&model);

    Ok(serde_json::json!({
        "workflow": model.name,
        "file": file,
        "analysis": analysis,
    }))
}
