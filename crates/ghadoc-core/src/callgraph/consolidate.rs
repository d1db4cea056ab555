//! Merge a root workflow with the workflows it calls into one model.
//!
//! The root's jobs keep their ids. Jobs of each called workflow are added as
//! `{label}.{job}`; their `needs` are namespaced the same way, and jobs that
//! declared no `needs` wait on every job that calls their workflow, so the
//! merged execution flow places them after the call site. Only calls that
//! lead away from the root count as call sites; a workflow called again
//! further down its own chain keeps the ordering of its first call.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::key::{resolve_call, WorkflowKey};
use super::ParsedRegistry;
use crate::workflow::{NeedsSpec, WorkflowModel};

/// A called workflow as it appears in a consolidated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalledWorkflow {
    /// Path or remote tag
    pub reference: String,
    /// Job namespace, empty when the workflow could not be loaded
    pub label: String,
    pub name: String,
    pub job_count: usize,
    pub parsed: bool,
}

#[derive(Debug, Clone)]
pub struct ConsolidatedWorkflow {
    pub model: WorkflowModel,
    pub called: Vec<CalledWorkflow>,
}

/// Build the consolidated model for `root`, or `None` if the root itself was
/// never parsed. Called workflows missing from `parsed` are listed but add no jobs.
pub fn consolidate(
    root: &WorkflowKey,
    called: &BTreeSet<WorkflowKey>,
    parsed: &ParsedRegistry,
    workspace_root: &Path,
) -> Option<ConsolidatedWorkflow> {
    let root_model = parsed.get(root)?;

    let mut labels: BTreeMap<WorkflowKey, String> = BTreeMap::new();
    let mut used: BTreeSet<String> = BTreeSet::new();
    for key in called.iter().filter(|key| parsed.contains_key(key)) {
        let base = key.label();
        let mut label = base.clone();
        let mut n = 2;
        while !used.insert(label.clone()) {
            label = format!("{}_{}", base, n);
            n += 1;
        }
        labels.insert(key.clone(), label);
    }

    let qualify = |key: &WorkflowKey, job: &str| match labels.get(key) {
        Some(label) => format!("{}.{}", label, job),
        None => job.to_string(),
    };

    // (calling workflow, qualified job id, called workflow)
    let mut edges: Vec<(&WorkflowKey, String, &WorkflowKey)> = Vec::new();
    for source in std::iter::once(root).chain(labels.keys()) {
        for job in &parsed[source].jobs {
            let Some(target) = job
                .call()
                .and_then(|uses| resolve_call(uses, source, workspace_root))
            else {
                continue;
            };
            if let Some((target, _)) = labels.get_key_value(&target) {
                edges.push((source, qualify(source, &job.id), target));
            }
        }
    }

    // Calls from the root outward. A call back towards the root (b → c → b)
    // would otherwise turn into a job cycle in the merged model.
    let distance = call_distances(root, &edges);
    let outward = |source: &WorkflowKey, target: &WorkflowKey| {
        match (distance.get(source), distance.get(target)) {
            (Some(s), Some(t)) => s < t,
            _ => true,
        }
    };

    // called workflow → qualified ids of the jobs that call it
    let mut callers: BTreeMap<&WorkflowKey, BTreeSet<String>> = BTreeMap::new();
    for (source, job_id, target) in edges {
        if outward(source, target) {
            callers.entry(target).or_default().insert(job_id);
        } else {
            tracing::debug!(
                "[Consolidate] Ignoring call {} → {} from job '{}' for ordering",
                source,
                target,
                job_id
            );
        }
    }

    let mut model = root_model.clone();
    for key in labels.keys() {
        let entry_needs: Vec<String> = callers
            .get(key)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();

        for job in &parsed[key].jobs {
            let mut job = job.clone();
            job.id = qualify(key, &job.id);
            job.needs = if job.needs.is_empty() {
                match entry_needs.len() {
                    0 => NeedsSpec::None,
                    _ => NeedsSpec::Multiple(entry_needs.clone()),
                }
            } else {
                NeedsSpec::Multiple(job.needs.to_set().iter().map(|id| qualify(key, id)).collect())
            };
            model.jobs.insert(job);
        }
    }

    let called = called
        .iter()
        .map(|key| match parsed.get(key) {
            Some(workflow) => CalledWorkflow {
                reference: key.to_string(),
                label: labels.get(key).cloned().unwrap_or_default(),
                name: workflow.name.clone(),
                job_count: workflow.jobs.len(),
                parsed: true,
            },
            None => CalledWorkflow {
                reference: key.to_string(),
                label: String::new(),
                name: key.file_stem(),
                job_count: 0,
                parsed: false,
            },
        })
        .collect();

    Some(ConsolidatedWorkflow { model, called })
}

/// Fewest calls needed to reach each workflow from `root`.
fn call_distances<'a>(
    root: &'a WorkflowKey,
    edges: &[(&'a WorkflowKey, String, &'a WorkflowKey)],
) -> BTreeMap<&'a WorkflowKey, usize> {
    let mut distance = BTreeMap::from([(root, 0)]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        let next = distance[current] + 1;
        for (_, _, target) in edges.iter().filter(|(source, _, _)| *source == current) {
            if !distance.contains_key(target) {
                distance.insert(*target, next);
                queue.push_back(*target);
            }
        }
    }
    distance
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::analysis::analyze;
    use crate::workflow::RemoteRef;

    fn local(name: &str) -> WorkflowKey {
        WorkflowKey::Local(PathBuf::from(format!("/ws/.github/workflows/{}", name)))
    }

    fn parse(key: &WorkflowKey, yaml: &str) -> WorkflowModel {
        WorkflowModel::from_yaml(yaml, &key.to_string()).unwrap()
    }

    #[test]
    fn test_called_jobs_are_namespaced_and_follow_the_caller() {
        let root = local("release.yml");
        let build = local("build.yml");
        let mut parsed = ParsedRegistry::new();
        parsed.insert(
            root.clone(),
            parse(
                &root,
                r#"
on: push
jobs:
  prepare:
    runs-on: ubuntu-latest
  build:
    needs: prepare
    uses: ./.github/workflows/build.yml
  publish:
    needs: build
    runs-on: ubuntu-latest
"#,
            ),
        );
        parsed.insert(
            build.clone(),
            parse(
                &build,
                r#"
on: workflow_call
jobs:
  compile:
    runs-on: ubuntu-latest
  package:
    needs: compile
    runs-on: ubuntu-latest
"#,
            ),
        );

        let called = BTreeSet::from([build.clone()]);
        let merged = consolidate(&root, &called, &parsed, Path::new("/ws")).unwrap();
        let jobs = &merged.model.jobs;

        assert_eq!(
            jobs.ids().collect::<Vec<_>>(),
            vec!["prepare", "build", "publish", "build.compile", "build.package"]
        );
        assert_eq!(
            jobs.get("build.compile").unwrap().needs.to_set(),
            BTreeSet::from(["build".to_string()])
        );
        assert_eq!(
            jobs.get("build.package").unwrap().needs.to_set(),
            BTreeSet::from(["build.compile".to_string()])
        );

        let flow = analyze(&merged.model).execution_flow;
        assert!(flow.level_of("build.compile") > flow.level_of("build"));
        assert!(!flow.has_cycle());
        assert_eq!(merged.called.len(), 1);
        assert!(merged.called[0].parsed);
    }

    #[test]
    fn test_unparsed_called_workflow_is_listed_without_jobs() {
        let root = local("ci.yml");
        let remote = WorkflowKey::Remote(RemoteRef {
            org: "org".to_string(),
            repo: "shared".to_string(),
            file_path: ".github/workflows/lint.yml".to_string(),
            git_ref: "main".to_string(),
        });
        let mut parsed = ParsedRegistry::new();
        parsed.insert(
            root.clone(),
            parse(
                &root,
                "on: push\njobs:\n  lint:\n    uses: org/shared/.github/workflows/lint.yml@main\n",
            ),
        );

        let called = BTreeSet::from([remote]);
        let merged = consolidate(&root, &called, &parsed, Path::new("/ws")).unwrap();
        assert_eq!(merged.model.jobs.len(), 1);
        assert!(!merged.called[0].parsed);
        assert_eq!(merged.called[0].name, "lint");
    }

    #[test]
    fn test_call_cycle_between_called_workflows_is_not_a_job_cycle() {
        let root = local("ci.yml");
        let b = local("b.yml");
        let c = local("c.yml");
        let mut parsed = ParsedRegistry::new();
        parsed.insert(
            root.clone(),
            parse(&root, "on: push\njobs:\n  x:\n    uses: ./.github/workflows/b.yml\n"),
        );
        parsed.insert(
            b.clone(),
            parse(&b, "on: workflow_call\njobs:\n  y:\n    uses: ./.github/workflows/c.yml\n"),
        );
        parsed.insert(
            c.clone(),
            parse(&c, "on: workflow_call\njobs:\n  z:\n    uses: ./.github/workflows/b.yml\n"),
        );

        let called = BTreeSet::from([b, c]);
        let merged = consolidate(&root, &called, &parsed, Path::new("/ws")).unwrap();
        let jobs = &merged.model.jobs;
        assert_eq!(jobs.get("b.y").unwrap().needs.to_set(), BTreeSet::from(["x".to_string()]));
        assert_eq!(jobs.get("c.z").unwrap().needs.to_set(), BTreeSet::from(["b.y".to_string()]));

        let flow = analyze(&merged.model).execution_flow;
        assert!(!flow.has_cycle(), "{:?}", flow.forced);
        assert_eq!(
            flow.levels,
            vec![vec!["x".to_string()], vec!["b.y".to_string()], vec!["c.z".to_string()]]
        );
    }

    #[test]
    fn test_self_calling_workflow_follows_only_the_root() {
        let root = local("ci.yml");
        let again = local("again.yml");
        let mut parsed = ParsedRegistry::new();
        parsed.insert(
            root.clone(),
            parse(&root, "on: push\njobs:\n  start:\n    uses: ./.github/workflows/again.yml\n"),
        );
        parsed.insert(
            again.clone(),
            parse(&again, "on: workflow_call\njobs:\n  loop:\n    uses: ./.github/workflows/again.yml\n"),
        );

        let called = BTreeSet::from([again]);
        let merged = consolidate(&root, &called, &parsed, Path::new("/ws")).unwrap();
        assert_eq!(
            merged.model.jobs.get("again.loop").unwrap().needs.to_set(),
            BTreeSet::from(["start".to_string()])
        );
        assert!(!analyze(&merged.model).execution_flow.has_cycle());
    }

    #[test]
    fn test_missing_root_yields_none() {
        let parsed = ParsedRegistry::new();
        assert!(consolidate(&local("x.yml"), &BTreeSet::new(), &parsed, Path::new("/ws")).is_none());
    }

    #[test]
    fn test_label_collisions_get_suffixes() {
        let root = local("ci.yml");
        let a = local("deploy.yml");
        let b = WorkflowKey::Local(PathBuf::from("/ws/ci/deploy.yml"));
        let body = "on: workflow_call\njobs:\n  run:\n    runs-on: ubuntu-latest\n";
        let mut parsed = ParsedRegistry::new();
        parsed.insert(
            root.clone(),
            parse(
                &root,
                "on: push\njobs:\n  one:\n    uses: ./.github/workflows/deploy.yml\n  two:\n    uses: ci/deploy.yml\n",
            ),
        );
        parsed.insert(a.clone(), parse(&a, body));
        parsed.insert(b.clone(), parse(&b, body));

        let called = BTreeSet::from([a, b]);
        let merged = consolidate(&root, &called, &parsed, Path::new("/ws")).unwrap();
        let ids: Vec<&str> = merged.model.jobs.ids().collect();
        assert!(ids.contains(&"deploy.run"));
        assert!(ids.contains(&"deploy_2.run"));
        assert_eq!(merged.model.jobs.len(), 4);
    }
}
