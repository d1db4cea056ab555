//! Cross-workflow call graph.
//!
//! Discovered files are parsed first; every call job (`uses:` naming another
//! workflow) adds an edge. Called workflows that have not been seen yet are
//! then parsed in bounded rounds, fetching remote ones over HTTP:
//!
//! ```text
//! discovered ──parse──► parsed ──calls──► frontier ──parse/fetch──► parsed ...
//!                         │                                           │
//!                         └──────────────── graph ◄───────────────────┘
//!                                             │
//!                          find_roots_and_orphans / collect_all_called
//! ```
//!
//! A called workflow that cannot be read or fetched is a leaf: it stays a
//! target in the graph but never gets an entry in `parsed`.

pub mod consolidate;
pub mod fetch;
pub mod key;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::DocError;
use crate::workflow::WorkflowModel;

pub use consolidate::consolidate;
pub use fetch::{GitHubRawFetcher, RemoteFetcher, DEFAULT_RAW_CONTENT_URL};
pub use key::{resolve_call, resolve_local, WorkflowKey};

/// Expansion rounds over newly-called workflows.
pub const DEFAULT_MAX_ROUNDS: usize = 5;

/// Traversal depth for [`collect_all_called`].
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Workflow → workflows its jobs call.
pub type CallGraph = BTreeMap<WorkflowKey, BTreeSet<WorkflowKey>>;

/// Workflow → parsed model.
pub type ParsedRegistry = BTreeMap<WorkflowKey, WorkflowModel>;

/// All state accumulated while building the call graph for one run.
#[derive(Debug, Default)]
pub struct CallGraphContext {
    /// Discovered files, in discovery order
    pub discovered: Vec<WorkflowKey>,
    pub parsed: ParsedRegistry,
    pub graph: CallGraph,
    /// Every key a parse was tried for, successful or not
    pub attempted: BTreeSet<WorkflowKey>,
    /// Discovered files that could not be parsed
    pub failures: Vec<(WorkflowKey, String)>,
}

impl CallGraphContext {
    /// Call targets that have not been tried yet.
    fn frontier(&self) -> BTreeSet<WorkflowKey> {
        self.graph
            .values()
            .flatten()
            .filter(|key| !self.parsed.contains_key(key) && !self.attempted.contains(key))
            .cloned()
            .collect()
    }

    pub fn roots_and_orphans(&self) -> (Vec<WorkflowKey>, Vec<WorkflowKey>) {
        find_roots_and_orphans(&self.graph, &self.discovered)
    }
}

pub struct CallGraphBuilder<'a> {
    workspace_root: PathBuf,
    fetcher: &'a dyn RemoteFetcher,
    max_rounds: usize,
}

impl<'a> CallGraphBuilder<'a> {
    pub fn new(workspace_root: impl AsRef<Path>, fetcher: &'a dyn RemoteFetcher) -> Self {
        Self {
            workspace_root: key::absolutize(workspace_root.as_ref()),
            fetcher,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Parse the workflow a key names.
    ///
    /// Remote workflows that cannot be fetched yield `Ok(None)`; unreadable or
    /// invalid local files are errors.
    pub async fn parse_reference(&self, key: &WorkflowKey) -> Result<Option<WorkflowModel>, DocError> {
        match key {
            WorkflowKey::Local(path) => WorkflowModel::from_file(path).map(Some),
            WorkflowKey::Remote(remote) => {
                let Some(text) = self.fetcher.fetch(remote).await else {
                    return Ok(None);
                };
                let file_name = remote
                    .file_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&remote.file_path);
                WorkflowModel::from_yaml_named(&text, &key.to_string(), file_name).map(Some)
            }
        }
    }

    /// Parse the discovered files and expand their calls.
    pub async fn build(&self, discovered: &[PathBuf]) -> CallGraphContext {
        let mut ctx = CallGraphContext::default();

        for path in discovered {
            let key = WorkflowKey::local(path);
            if ctx.attempted.contains(&key) {
                continue;
            }
            ctx.discovered.push(key.clone());
            ctx.attempted.insert(key.clone());

            match self.parse_reference(&key).await {
                Ok(Some(model)) => self.record(&mut ctx, key, model),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("[CallGraph] Failed to parse {}: {}", key, e);
                    ctx.failures.push((key, e.to_string()));
                }
            }
        }

        let expanded = self.expand(&mut ctx).await;
        tracing::info!(
            "[CallGraph] {} discovered, {} parsed ({} via calls), {} edges",
            ctx.discovered.len(),
            ctx.parsed.len(),
            expanded,
            ctx.graph.values().map(BTreeSet::len).sum::<usize>()
        );
        ctx
    }

    /// Parse call targets not yet tried, for up to `max_rounds` rounds.
    ///
    /// Returns how many workflows were newly parsed. Running it again on a
    /// context that has reached its fixed point changes nothing.
    pub async fn expand(&self, ctx: &mut CallGraphContext) -> usize {
        let mut parsed = 0;

        for round in 1..=self.max_rounds {
            let frontier = ctx.frontier();
            if frontier.is_empty() {
                break;
            }
            tracing::debug!("[CallGraph] Round {}: {} workflow(s) to resolve", round, frontier.len());

            for key in frontier {
                ctx.attempted.insert(key.clone());
                match self.parse_reference(&key).await {
                    Ok(Some(model)) => {
                        self.record(ctx, key, model);
                        parsed += 1;
                    }
                    Ok(None) => {
                        tracing::warn!("[CallGraph] Called workflow {} is unavailable", key);
                    }
                    Err(e) => {
                        tracing::warn!("[CallGraph] Skipping called workflow {}: {}", key, e);
                    }
                }
            }
        }

        parsed
    }

    fn record(&self, ctx: &mut CallGraphContext, key: WorkflowKey, model: WorkflowModel) {
        let calls: BTreeSet<WorkflowKey> = model
            .jobs
            .iter()
            .filter_map(|job| job.call())
            .filter_map(|uses| resolve_call(uses, &key, &self.workspace_root))
            .collect();

        ctx.graph.insert(key.clone(), calls);
        ctx.parsed.insert(key, model);
    }
}

/// Split workflows into entry points and stray reusable workflows.
///
/// Roots are discovered workflows nothing calls. Orphans are graph keys nothing
/// calls that were not discovered either.
pub fn find_roots_and_orphans(
    graph: &CallGraph,
    discovered: &[WorkflowKey],
) -> (Vec<WorkflowKey>, Vec<WorkflowKey>) {
    let all_called: BTreeSet<&WorkflowKey> = graph.values().flatten().collect();
    let discovered_set: BTreeSet<&WorkflowKey> = discovered.iter().collect();

    let roots: BTreeSet<WorkflowKey> = discovered
        .iter()
        .filter(|key| !all_called.contains(key))
        .cloned()
        .collect();
    let orphans: Vec<WorkflowKey> = graph
        .keys()
        .filter(|key| !all_called.contains(key) && !discovered_set.contains(key))
        .cloned()
        .collect();

    (roots.into_iter().collect(), orphans)
}

/// Every workflow reachable from `start`, at most `max_depth` calls away.
/// `start` itself is not included.
///
/// Depth-first; a workflow first seen deep in one branch is walked again if
/// another branch reaches it in fewer calls, so the result does not depend on
/// edge order.
pub fn collect_all_called(start: &WorkflowKey, graph: &CallGraph, max_depth: usize) -> BTreeSet<WorkflowKey> {
    let mut depth_of: BTreeMap<&WorkflowKey, usize> = BTreeMap::new();
    let mut stack: Vec<(&WorkflowKey, usize)> = vec![(start, 0)];

    while let Some((node, depth)) = stack.pop() {
        if depth >= max_depth {
            continue;
        }
        for callee in graph.get(node).into_iter().flatten() {
            if callee == start {
                continue;
            }
            let shorter = depth_of.get(callee).map_or(true, |&seen| depth + 1 < seen);
            if shorter {
                depth_of.insert(callee, depth + 1);
                stack.push((callee, depth + 1));
            }
        }
    }

    depth_of.into_keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::workflow::RemoteRef;

    /// Serves remote workflows from memory and counts fetches.
    #[derive(Default)]
    struct MemoryFetcher {
        files: BTreeMap<String, String>,
        calls: AtomicUsize,
    }

    impl MemoryFetcher {
        fn with(mut self, remote: &str, yaml: &str) -> Self {
            self.files.insert(remote.to_string(), yaml.to_string());
            self
        }
    }

    #[async_trait]
    impl RemoteFetcher for MemoryFetcher {
        async fn fetch(&self, remote: &RemoteRef) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.files.get(&remote.to_string()).cloned()
        }
    }

    fn calling(targets: &[&str]) -> String {
        let mut yaml = String::from("on: push\njobs:\n  work:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo hi\n");
        for (i, target) in targets.iter().enumerate() {
            yaml.push_str(&format!("  call{}:\n    needs: work\n    uses: {}\n", i, target));
        }
        yaml
    }

    fn workspace(files: &[(&str, String)]) -> (TempDir, Vec<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let wf_dir = dir.path().join(".github/workflows");
        std::fs::create_dir_all(&wf_dir).unwrap();
        let mut paths = Vec::new();
        for (name, content) in files {
            let path = wf_dir.join(name);
            std::fs::write(&path, content).unwrap();
            paths.push(path);
        }
        (dir, paths)
    }

    fn key(dir: &TempDir, name: &str) -> WorkflowKey {
        WorkflowKey::local(dir.path().join(".github/workflows").join(name))
    }

    #[tokio::test]
    async fn test_three_level_chain() {
        let (dir, paths) = workspace(&[
            ("root.yml", calling(&["./.github/workflows/mid.yml"])),
            ("mid.yml", calling(&["./.github/workflows/leaf.yml"])),
            ("leaf.yml", calling(&[])),
        ]);
        let fetcher = MemoryFetcher::default();
        let builder = CallGraphBuilder::new(dir.path(), &fetcher);
        let ctx = builder.build(&paths).await;

        assert_eq!(ctx.parsed.len(), 3);
        let (roots, orphans) = ctx.roots_and_orphans();
        assert_eq!(roots, vec![key(&dir, "root.yml")]);
        assert!(orphans.is_empty());

        let called = collect_all_called(&key(&dir, "root.yml"), &ctx.graph, DEFAULT_MAX_DEPTH);
        assert_eq!(called, BTreeSet::from([key(&dir, "mid.yml"), key(&dir, "leaf.yml")]));
    }

    #[tokio::test]
    async fn test_remote_calls_are_fetched_once() {
        let remote = "org/tools/.github/workflows/build.yml@v2";
        let (dir, paths) = workspace(&[
            ("a.yml", calling(&[remote, "actions/checkout@v4"])),
            ("b.yml", calling(&[remote])),
        ]);
        let fetcher = MemoryFetcher::default().with(remote, &calling(&[]));
        let builder = CallGraphBuilder::new(dir.path(), &fetcher);
        let ctx = builder.build(&paths).await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.parsed.len(), 3);
        let remote_key = ctx.parsed.keys().find(|k| k.is_remote()).unwrap();
        assert_eq!(remote_key.to_string(), "remote:::org/tools:::.github/workflows/build.yml:::v2");
        assert_eq!(ctx.graph[&key(&dir, "a.yml")].len(), 1, "actions are not calls");

        let (roots, _) = ctx.roots_and_orphans();
        assert_eq!(roots, vec![key(&dir, "a.yml"), key(&dir, "b.yml")]);
    }

    #[tokio::test]
    async fn test_failed_remote_fetch_is_a_leaf() {
        let remote = "org/gone/.github/workflows/missing.yml@main";
        let (dir, paths) = workspace(&[("root.yml", calling(&[remote]))]);
        let fetcher = MemoryFetcher::default();
        let builder = CallGraphBuilder::new(dir.path(), &fetcher);
        let ctx = builder.build(&paths).await;

        assert_eq!(ctx.parsed.len(), 1);
        assert!(ctx.failures.is_empty());
        let called = collect_all_called(&key(&dir, "root.yml"), &ctx.graph, DEFAULT_MAX_DEPTH);
        assert_eq!(called.len(), 1);
        assert!(called.iter().all(|k| !ctx.parsed.contains_key(k)));
    }

    #[tokio::test]
    async fn test_malformed_discovered_file_does_not_stop_the_build() {
        let (dir, paths) = workspace(&[
            ("bad.yml", "jobs: [unclosed".to_string()),
            ("good.yml", calling(&[])),
        ]);
        let fetcher = MemoryFetcher::default();
        let ctx = CallGraphBuilder::new(dir.path(), &fetcher).build(&paths).await;

        assert_eq!(ctx.failures.len(), 1);
        assert_eq!(ctx.failures[0].0, key(&dir, "bad.yml"));
        assert!(ctx.parsed.contains_key(&key(&dir, "good.yml")));
    }

    #[tokio::test]
    async fn test_expansion_is_bounded_and_idempotent() {
        // w0 → w1 → ... → w7, only w0 discovered
        let files: Vec<(String, String)> = (0..8)
            .map(|i| {
                let targets = if i < 7 {
                    vec![format!("./.github/workflows/w{}.yml", i + 1)]
                } else {
                    vec![]
                };
                let refs: Vec<&str> = targets.iter().map(String::as_str).collect();
                (format!("w{}.yml", i), calling(&refs))
            })
            .collect();
        let borrowed: Vec<(&str, String)> = files.iter().map(|(n, c)| (n.as_str(), c.clone())).collect();
        let (dir, paths) = workspace(&borrowed);

        let fetcher = MemoryFetcher::default();
        let builder = CallGraphBuilder::new(dir.path(), &fetcher);
        let mut ctx = builder.build(&paths[..1]).await;

        // discovered file plus five rounds
        assert_eq!(ctx.parsed.len(), 6);
        assert!(!ctx.parsed.contains_key(&key(&dir, "w6.yml")));

        let unbounded = CallGraphBuilder::new(dir.path(), &fetcher).with_max_rounds(10);
        assert_eq!(unbounded.expand(&mut ctx).await, 2);
        assert_eq!(ctx.parsed.len(), 8);

        let graph_before = ctx.graph.clone();
        assert_eq!(unbounded.expand(&mut ctx).await, 0);
        assert_eq!(ctx.graph, graph_before);

        let shallow = collect_all_called(&key(&dir, "w0.yml"), &ctx.graph, 3);
        assert_eq!(shallow.len(), 3);
    }

    #[test]
    fn test_roots_and_orphans_partition() {
        let k = |name: &str| WorkflowKey::Local(PathBuf::from(format!("/ws/{}", name)));
        let mut graph = CallGraph::new();
        graph.insert(k("main.yml"), BTreeSet::from([k("lib.yml")]));
        graph.insert(k("lib.yml"), BTreeSet::new());
        graph.insert(k("stray.yml"), BTreeSet::from([k("lib.yml")]));
        let discovered = vec![k("main.yml"), k("lib.yml")];

        let (roots, orphans) = find_roots_and_orphans(&graph, &discovered);
        assert_eq!(roots, vec![k("main.yml")]);
        assert_eq!(orphans, vec![k("stray.yml")]);
    }

    #[test]
    fn test_collect_all_called_survives_cycles() {
        let k = |name: &str| WorkflowKey::Local(PathBuf::from(format!("/ws/{}", name)));
        let mut graph = CallGraph::new();
        graph.insert(k("a"), BTreeSet::from([k("b")]));
        graph.insert(k("b"), BTreeSet::from([k("a"), k("c")]));
        let called = collect_all_called(&k("a"), &graph, DEFAULT_MAX_DEPTH);
        assert_eq!(called, BTreeSet::from([k("b"), k("c")]));
    }

    #[test]
    fn test_collect_all_called_uses_shortest_distance() {
        let k = |name: &str| WorkflowKey::Local(PathBuf::from(format!("/ws/{}", name)));
        let mut graph = CallGraph::new();
        graph.insert(k("a"), BTreeSet::from([k("b"), k("c")]));
        graph.insert(k("b"), BTreeSet::from([k("c")]));
        graph.insert(k("c"), BTreeSet::from([k("d")]));
        graph.insert(k("d"), BTreeSet::from([k("e")]));

        let called = collect_all_called(&k("a"), &graph, 2);
        assert_eq!(called, BTreeSet::from([k("b"), k("c"), k("d")]));
    }
}
