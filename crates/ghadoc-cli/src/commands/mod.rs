//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and drives the
//! ghadoc-core library directly.

pub mod analyze;
pub mod generate;
pub mod graph;
pub mod validate;

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
