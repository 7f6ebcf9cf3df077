//! Git history analysis through the git CLI.
//!
//! No libgit2 binding: `git log` output is stable enough to parse and the
//! dependency footprint stays zero. Produces Contributor and Commit nodes,
//! AUTHORED edges and per-file MODIFIED_IN edges for files in the scanned
//! set. Disabled silently when the root is not a git work tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::graph::{NodeLabel, NodeRef, NodeRow, RelRow, RelType};

/// Commits examined per run; history beyond this is old news for a code
/// graph.
const MAX_COMMITS: usize = 500;

const FIELD_SEP: char = '\u{1f}';

#[derive(Default)]
pub struct VcsEmission {
    pub nodes: Vec<NodeRow>,
    pub edges: Vec<RelRow>,
    pub commit_count: u64,
}

/// Mine `git log` for contributors, commits and file modifications.
///
/// `known_files` limits MODIFIED_IN edges to files that exist in the
/// graph.
pub fn analyze_history(repo_path: &Path, known_files: &BTreeSet<String>) -> VcsEmission {
    let mut emission = VcsEmission::default();

    let output = Command::new("git")
        .current_dir(repo_path)
        .args([
            "log",
            &format!("--max-count={MAX_COMMITS}"),
            &format!("--pretty=format:%H{FIELD_SEP}%an{FIELD_SEP}%ae{FIELD_SEP}%aI{FIELD_SEP}%s"),
            "--name-only",
        ])
        .output();

    let output = match output {
        Ok(out) if out.status.success() => out,
        Ok(_) | Err(_) => {
            debug!("git history unavailable, skipping VCS analysis");
            return emission;
        }
    };

    let log = String::from_utf8_lossy(&output.stdout);
    let mut contributors: BTreeMap<String, (String, u64)> = BTreeMap::new();
    let mut current_sha: Option<String> = None;

    for line in log.lines() {
        if line.contains(FIELD_SEP) {
            let fields: Vec<&str> = line.split(FIELD_SEP).collect();
            if fields.len() != 5 {
                continue;
            }
            let (sha, name, email, date, subject) =
                (fields[0], fields[1], fields[2], fields[3], fields[4]);

            emission.commit_count += 1;
            emission.nodes.push(
                NodeRow::new(NodeLabel::Commit, sha)
                    .prop("author", name)
                    .prop("date", date)
                    .prop("message", truncate(subject, 200)),
            );
            let entry = contributors
                .entry(email.to_string())
                .or_insert_with(|| (name.to_string(), 0));
            entry.1 += 1;

            emission.edges.push(RelRow::new(
                NodeRef::new(NodeLabel::Contributor, email.to_string()),
                RelType::Authored,
                NodeRef::new(NodeLabel::Commit, sha.to_string()),
            ));
            current_sha = Some(sha.to_string());
        } else if !line.trim().is_empty() {
            // a touched file under the current commit
            let Some(sha) = &current_sha else {
                continue;
            };
            let path = line.trim();
            if known_files.contains(path) {
                emission.edges.push(RelRow::new(
                    NodeRef::new(NodeLabel::File, path.to_string()),
                    RelType::ModifiedIn,
                    NodeRef::new(NodeLabel::Commit, sha.clone()),
                ));
            }
        }
    }

    for (email, (name, count)) in contributors {
        emission.nodes.push(
            NodeRow::new(NodeLabel::Contributor, email)
                .prop("name", name)
                .prop("commit_count", count as i64),
        );
    }

    emission
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
