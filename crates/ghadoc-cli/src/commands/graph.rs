//! `gha-doc graph` — print the cross-workflow call graph.

use std::path::Path;

use async_trait::async_trait;
use ghadoc_core::callgraph::{CallGraphBuilder, GitHubRawFetcher, RemoteFetcher};
use ghadoc_core::discovery::discover_workflows;
use ghadoc_core::workflow::RemoteRef;
use serde_json::json;

use super::print_json;

/// Treats every remote workflow as unreachable.
pub struct OfflineFetcher;

#[async_trait]
impl RemoteFetcher for OfflineFetcher {
    async fn fetch(&self, _remote: &RemoteRef) -> Option<String> {
        None
    }
}

pub async fn run(workspace: &str, pattern: &str, offline: bool) -> Result<(), String> {
    let fetcher: Box<dyn RemoteFetcher> = if offline {
        Box::new(OfflineFetcher)
    } else {
        Box::new(GitHubRawFetcher::new())
    };
    let value = report(Path::new(workspace), pattern, fetcher.as_ref()).await?;
    print_json(&value);
    Ok(())
}

/// Call graph, roots, orphans and parse failures as JSON.
pub async fn report(
    workspace: &Path,
    pattern: &str,
    fetcher: &dyn RemoteFetcher,
) -> Result<serde_json::Value, String> {
    let files = discover_workflows(workspace, pattern).map_err(|e| e.to_string())?;
    if files.is_empty() {
        return Err(format!("No workflow files found matching pattern: {}", pattern));
    }

    let ctx = CallGraphBuilder::new(workspace, fetcher).build(&files).await;
    let (roots, orphans) = ctx.roots_and_orphans();

    let workflows: Vec<serde_json::Value> = ctx
        .graph
        .iter()
        .map(|(key, calls)| {
            json!({
                "key": key.to_string(),
                "remote": key.is_remote(),
                "name": ctx.parsed.get(key).map(|m| m.name.clone()),
                "parsed": ctx.parsed.contains_key(key),
                "calls": calls.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            })
        })
        .collect();

    Ok(json!({
        "workflows": workflows,
        "roots": roots.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
        "orphans": orphans.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
        "failures": ctx
            .failures
            .iter()
            .map(|(key, message)| json!({ "key": key.to_string(), "error": message }))
            .collect::<Vec<_>>(),
    }))
}
