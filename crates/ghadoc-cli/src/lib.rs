//! gha-doc CLI — generate documentation for GitHub Actions workflows.
//!
//! Runs as a plain command-line tool or as a GitHub Action: when
//! `GITHUB_ACTION` is set and no subcommand is given, `generate` runs with
//! its configuration taken from the action's `INPUT_*` environment.
//!
//! ```text
//! .env / .env.local ─► clap (flags, INPUT_* env) ─► select_command ─► dispatch
//! ```

pub mod commands;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use ghadoc_core::config::load_dotenv;

use commands::generate::GenerateArgs;

/// gha-doc — GitHub Actions workflow documentation generator
#[derive(Parser)]
#[command(name = "gha-doc", version, about = "gha-doc — GitHub Actions workflow documentation generator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate documentation for every discovered workflow
    Generate(GenerateArgs),

    /// Print the dependency/flow analysis of one workflow as JSON
    Analyze {
        /// Path to the workflow YAML file
        file: String,
    },

    /// Print the cross-workflow call graph with its roots and orphans
    Graph {
        /// Repository root
        #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
        workspace: String,
        /// Workflow file glob, relative to the workspace
        #[arg(long, env = "INPUT_WORKFLOW_FILES", default_value = ".github/workflows/*.yml")]
        workflow_files: String,
        /// Do not fetch workflows from other repositories
        #[arg(long)]
        offline: bool,
    },

    /// Parse a workflow file and print a short summary
    Validate {
        /// Path to the workflow YAML file
        file: String,
    },
}

/// Directory the `.env` files are read from: the Action workspace, else the
/// current directory.
pub fn env_dir() -> PathBuf {
    std::env::var_os("GITHUB_WORKSPACE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load `.env` files from `env_dir`, then parse `args`.
///
/// The files must be loaded first: clap reads the `INPUT_*` fallbacks while
/// parsing.
pub fn parse_args<I, T>(args: I, env_dir: &Path) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    load_dotenv(env_dir);
    Cli::parse_from(args)
}

/// The command to run. Inside a GitHub Action a missing subcommand means
/// `generate`, configured from the environment.
pub fn select_command(command: Option<Commands>, in_github_action: bool) -> Option<Commands> {
    match command {
        None if in_github_action => Cli::parse_from(["gha-doc", "generate"]).command,
        other => other,
    }
}

pub async fn dispatch(command: Option<Commands>) -> Result<(), String> {
    match command {
        Some(Commands::Generate(args)) => commands::generate::run(args).await,
        Some(Commands::Analyze { file }) => commands::analyze::run(&file),
        Some(Commands::Graph {
            workspace,
            workflow_files,
            offline,
        }) => commands::graph::run(&workspace, &workflow_files, offline).await,
        Some(Commands::Validate { file }) => commands::validate::run(&file),
        None => {
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    }
}
