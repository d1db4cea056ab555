//! gha-doc core — documentation for GitHub Actions workflows.
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │ discovery  │──►│ callgraph  │──►│ analysis  │──►│ render   │
//! │ (glob)     │   │ (+ fetch)  │   │ (levels)  │   │ (md/html)│
//! └────────────┘   └────────────┘   └───────────┘   └──────────┘
//!                        │                │               ▲
//!                        ▼                ▼               │
//!                   workflow::*       enhance (LLM) ──────┘
//! ```
//!
//! `pipeline::DocumentationPipeline` wires these together for the CLI.

pub mod analysis;
pub mod callgraph;
pub mod config;
pub mod discovery;
pub mod enhance;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod workflow;

pub use config::{AiConfig, DiagramFormat, GeneratorConfig, OutputFormat};
pub use error::DocError;
pub use pipeline::{DocumentationPipeline, RunSummary};
