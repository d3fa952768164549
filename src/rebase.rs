use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{git::Git, types::Commit};

/// Name of the todo file written inside the git directory.
pub const TODO_FILE: &str = "PT_REBASE_TODO";

/// An interactive rebase todo list that moves the selected commits directly
/// on top of the upstream branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebasePlan {
    picks: Vec<String>,
    selected: usize,
}

impl RebasePlan {
    /// Builds a plan from the unpublished commits (newest first, as `git log`
    /// lists them) and the hashes chosen for the pull request.
    ///
    /// Selected commits keep their relative history order and come first;
    /// everything else follows in history order.
    pub fn new(commits: &[Commit], selected: &[String]) -> Result<Self> {
        for hash in selected {
            if !commits.iter().any(|c| &c.hash == hash) {
                anyhow::bail!("Selected commit {} is not an unpublished commit", hash);
            }
        }

        let oldest_first = || commits.iter().rev();
        let is_selected = |c: &Commit| selected.contains(&c.hash);

        let picks: Vec<String> = oldest_first()
            .filter(|c| is_selected(*c))
            .chain(oldest_first().filter(|c| !is_selected(*c)))
            .map(|c| c.hash.clone())
            .collect();

        let selected_count = picks.iter().filter(|h| selected.contains(*h)).count();
        if selected_count == 0 {
            anyhow::bail!("No commits selected");
        }

        Ok(Self {
            picks,
            selected: selected_count,
        })
    }

    /// The todo file contents, one `pick` per line.
    pub fn todo(&self) -> String {
        self.picks
            .iter()
            .map(|hash| format!("pick {}\n", hash))
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected
    }

    /// Finds the tip of the selected commits in the post-rebase log.
    pub fn target_in<'c>(&self, rebased: &'c [Commit]) -> Result<&'c Commit> {
        rebased
            .len()
            .checked_sub(self.selected)
            .and_then(|idx| rebased.get(idx))
            .context("Rebased history is shorter than the selected commits")
    }
}

/// Builds the `GIT_SEQUENCE_EDITOR` command that replaces git's todo list
/// with the file at `todo_path`.
pub fn sequence_editor_command(todo_path: &Path) -> String {
    let path = todo_path.to_string_lossy().replace('\'', r"'\''");
    format!("cp '{}'", path)
}

/// Reorders the unpublished commits according to `plan` on top of `onto`.
///
/// A failing rebase is always aborted before the error is returned.
pub async fn rebase_onto(
    git: &dyn Git,
    git_dir: &Path,
    onto: &str,
    plan: &RebasePlan,
) -> Result<()> {
    let todo_path = git_dir.join(TODO_FILE);
    tokio::fs::write(&todo_path, plan.todo())
        .await
        .with_context(|| format!("Failed to write rebase todo: {}", todo_path.display()))?;

    debug!(todo = %plan.todo(), "rebasing onto {}", onto);
    let result = git
        .rebase_interactive(onto, &sequence_editor_command(&todo_path))
        .await;

    if let Err(e) = tokio::fs::remove_file(&todo_path).await {
        debug!("Failed to remove {}: {}", todo_path.display(), e);
    }

    if let Err(rebase_err) = result {
        if let Err(abort_err) = git.abort_rebase().await {
            warn!("Failed to abort rebase: {:#}", abort_err);
        }
        return Err(rebase_err.context("Failed to rebase"));
    }

    Ok(())
}
