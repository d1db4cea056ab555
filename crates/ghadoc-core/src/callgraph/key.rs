//! Map keys for workflows in the call graph.
//!
//! Local workflows are keyed by a lexically normalized absolute path, so
//! `./.github/workflows/a.yml`, `.github/workflows/a.yml` and
//! `.github/workflows/sub/../a.yml` all land on the same entry. Remote
//! workflows keep their structured coordinates.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::workflow::{RemoteRef, UsesRef, WORKFLOWS_DIR};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum WorkflowKey {
    Local(PathBuf),
    Remote(RemoteRef),
}

impl WorkflowKey {
    /// Key for a file found on disk.
    pub fn local(path: impl AsRef<Path>) -> Self {
        WorkflowKey::Local(absolutize(path.as_ref()))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, WorkflowKey::Remote(_))
    }

    /// File name without extension.
    pub fn file_stem(&self) -> String {
        match self {
            WorkflowKey::Local(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            WorkflowKey::Remote(remote) => remote.file_stem().to_string(),
        }
    }

    /// Short label used when namespacing jobs from this workflow.
    pub fn label(&self) -> String {
        match self {
            WorkflowKey::Local(_) => self.file_stem(),
            WorkflowKey::Remote(remote) => format!("{}.{}", remote.repo, remote.file_stem()),
        }
    }

    /// Directory a relative `./` reference inside this workflow resolves from.
    fn base_dir(&self) -> Option<&Path> {
        match self {
            WorkflowKey::Local(path) => path.parent(),
            WorkflowKey::Remote(_) => None,
        }
    }
}

impl std::fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowKey::Local(path) => write!(f, "{}", path.display()),
            WorkflowKey::Remote(r) => write!(
                f,
                "remote:::{}/{}:::{}:::{}",
                r.org, r.repo, r.file_path, r.git_ref
            ),
        }
    }
}

/// Key for the workflow a call job targets, or `None` when `uses` is not a call.
pub fn resolve_call(uses: &UsesRef, referrer: &WorkflowKey, workspace_root: &Path) -> Option<WorkflowKey> {
    match uses {
        UsesRef::LocalCall(path) => Some(resolve_local(path, referrer, workspace_root)),
        UsesRef::RemoteCall(remote) => Some(WorkflowKey::Remote(remote.clone())),
        UsesRef::Action(_) | UsesRef::Unrecognized(_) => None,
    }
}

/// Resolve a local workflow reference to a normalized key.
///
/// - `.github/workflows/...` (with or without `./`) is workspace-rooted;
/// - other `./...` paths are relative to the referencing file's directory;
/// - anything else falls back to the workspace root.
pub fn resolve_local(reference: &str, referrer: &WorkflowKey, workspace_root: &Path) -> WorkflowKey {
    let stripped = reference.strip_prefix("./").unwrap_or(reference);

    let joined = if stripped.starts_with(WORKFLOWS_DIR) {
        workspace_root.join(stripped)
    } else if reference.starts_with("./") {
        referrer
            .base_dir()
            .unwrap_or(workspace_root)
            .join(stripped)
    } else {
        workspace_root.join(stripped)
    };

    WorkflowKey::Local(absolutize(&joined))
}

/// Make `path` absolute (against the current directory) and drop `.`/`..`.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    normalize(&absolute)
}

/// Lexical normalization; does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/work/repo")
    }

    fn referrer() -> WorkflowKey {
        WorkflowKey::Local(PathBuf::from("/work/repo/.github/workflows/ci.yml"))
    }

    #[test]
    fn test_equivalent_spellings_share_a_key() {
        let expected = WorkflowKey::Local(PathBuf::from("/work/repo/.github/workflows/build.yml"));
        for spelling in [
            "./.github/workflows/build.yml",
            ".github/workflows/build.yml",
            ".github/workflows/sub/../build.yml",
            "./build.yml",
        ] {
            assert_eq!(resolve_local(spelling, &referrer(), &root()), expected, "{}", spelling);
        }
    }

    #[test]
    fn test_relative_to_referrer_directory() {
        let referrer = WorkflowKey::Local(PathBuf::from("/work/repo/ci/pipelines/main.yml"));
        assert_eq!(
            resolve_local("./shared/deploy.yml", &referrer, &root()),
            WorkflowKey::Local(PathBuf::from("/work/repo/ci/pipelines/shared/deploy.yml"))
        );
    }

    #[test]
    fn test_fallback_and_remote_referrer_use_workspace_root() {
        assert_eq!(
            resolve_local("ci/deploy.yml", &referrer(), &root()),
            WorkflowKey::Local(PathBuf::from("/work/repo/ci/deploy.yml"))
        );

        let remote = WorkflowKey::Remote(RemoteRef {
            org: "org".to_string(),
            repo: "repo".to_string(),
            file_path: ".github/workflows/x.yml".to_string(),
            git_ref: "main".to_string(),
        });
        assert_eq!(
            resolve_local("./y.yml", &remote, &root()),
            WorkflowKey::Local(PathBuf::from("/work/repo/y.yml"))
        );
    }

    #[test]
    fn test_remote_key_display_and_label() {
        let key = WorkflowKey::Remote(RemoteRef {
            org: "org".to_string(),
            repo: "tools".to_string(),
            file_path: ".github/workflows/build.yml".to_string(),
            git_ref: "v2".to_string(),
        });
        assert_eq!(key.to_string(), "remote:::org/tools:::.github/workflows/build.yml:::v2");
        assert_eq!(key.label(), "tools.build");
        assert!(key.is_remote());
    }

    #[test]
    fn test_actions_do_not_resolve() {
        let uses = UsesRef::Action("actions/checkout@v4".to_string());
        assert!(resolve_call(&uses, &referrer(), &root()).is_none());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert!(absolutize(Path::new("x/../y.yml")).is_absolute());
    }
}
