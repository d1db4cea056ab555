//! Workflow ingestion — GitHub Actions YAML to `WorkflowModel`.
//!
//! `needs:` and `uses:` are resolved into tagged enums once, while parsing,
//! so the analysis and call-graph code never re-inspect raw YAML shapes.

pub mod reference;
pub mod schema;

pub use reference::{classify_uses, RemoteRef, UsesRef, WORKFLOWS_DIR};
pub use schema::{
    Concurrency, JobSpec, JobTable, NeedsSpec, StepSpec, Strategy, Trigger, WorkflowInput,
    WorkflowModel,
};
