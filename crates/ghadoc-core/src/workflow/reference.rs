//! Classification of job-level `uses:` values.
//!
//! A job either runs its own steps or hands off to a reusable workflow. The
//! `uses` string decides which, using the shape of the path:
//!
//! ```text
//! actions/checkout@v4                            → Action
//! docker://alpine:3.19                           → Action
//! ./.github/workflows/build.yml                  → LocalCall (workspace-rooted)
//! ./deploy.yml                                   → LocalCall (relative to caller)
//! org/repo/.github/workflows/build.yml@v2        → RemoteCall
//! org/build.yml@v2                               → Unrecognized
//! ```

use serde::{Deserialize, Serialize};

/// Directory GitHub reads workflow files from.
pub const WORKFLOWS_DIR: &str = ".github/workflows/";

/// Namespace of first-party actions; never a workflow call.
const BUILTIN_ACTION_NAMESPACE: &str = "actions/";

/// Coordinates of a workflow file in another repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteRef {
    pub org: String,
    pub repo: String,
    /// Path inside the repository, e.g. `.github/workflows/build.yml`
    pub file_path: String,
    /// Branch, tag, or commit SHA
    pub git_ref: String,
}

impl RemoteRef {
    /// File name without extension (`build` for `.github/workflows/build.yml`).
    pub fn file_stem(&self) -> &str {
        let name = self.file_path.rsplit('/').next().unwrap_or(&self.file_path);
        name.strip_suffix(".yml")
            .or_else(|| name.strip_suffix(".yaml"))
            .unwrap_or(name)
    }
}

impl std::fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}@{}", self.org, self.repo, self.file_path, self.git_ref)
    }
}

/// What a job's `uses` value refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum UsesRef {
    /// An action (marketplace, docker, or local action directory).
    Action(String),
    /// A workflow file in this repository, as written in the YAML.
    LocalCall(String),
    /// A workflow file in another repository.
    RemoteCall(RemoteRef),
    /// Looks like a workflow file but fits no known reference shape.
    Unrecognized(String),
}

impl UsesRef {
    /// Whether this reference invokes another workflow.
    pub fn is_call(&self) -> bool {
        matches!(self, UsesRef::LocalCall(_) | UsesRef::RemoteCall(_))
    }

    /// The reference as it would appear in YAML.
    pub fn raw(&self) -> String {
        match self {
            UsesRef::Action(s) | UsesRef::LocalCall(s) | UsesRef::Unrecognized(s) => s.clone(),
            UsesRef::RemoteCall(remote) => remote.to_string(),
        }
    }
}

fn is_workflow_file(path: &str) -> bool {
    path.ends_with(".yml") || path.ends_with(".yaml")
}

/// Classify a raw `uses` string.
pub fn classify_uses(raw: &str) -> UsesRef {
    let value = raw.trim();
    if value.is_empty() {
        return UsesRef::Unrecognized(value.to_string());
    }
    if value.starts_with("docker://") || value.starts_with(BUILTIN_ACTION_NAMESPACE) {
        return UsesRef::Action(value.to_string());
    }

    let (path, git_ref) = match value.rsplit_once('@') {
        Some((path, git_ref)) => (path, Some(git_ref)),
        None => (value, None),
    };

    if !is_workflow_file(path) {
        return UsesRef::Action(value.to_string());
    }

    if path.starts_with("./") {
        return UsesRef::LocalCall(path.to_string());
    }

    match git_ref {
        None => UsesRef::LocalCall(path.to_string()),
        Some(git_ref) => {
            if path.matches('/').count() < 3 || git_ref.is_empty() {
                return UsesRef::Unrecognized(value.to_string());
            }
            let mut parts = path.splitn(3, '/');
            let org = parts.next().unwrap_or_default();
            let repo = parts.next().unwrap_or_default();
            let file_path = parts.next().unwrap_or_default();
            if org.is_empty() || repo.is_empty() || file_path.is_empty() {
                return UsesRef::Unrecognized(value.to_string());
            }
            UsesRef::RemoteCall(RemoteRef {
                org: org.to_string(),
                repo: repo.to_string(),
                file_path: file_path.to_string(),
                git_ref: git_ref.to_string(),
            })
        }
    }
}
