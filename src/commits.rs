use anyhow::Result;
use futures::stream;
use owo_colors::OwoColorize;
use tracing::debug;

use crate::{
    branch::branch_from_message,
    git::Git,
    pr::resolve_upstream,
    selector::{Selectable, SelectOption, Selector, choose},
    types::{Commit, PullRequest},
};

pub const SELECT_PROMPT: &str = "Select commit(s):";

/// A commit offered for selection, with the pull request its branch
/// already backs, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub commit: Commit,
    pub updates: Option<u64>,
}

impl Selectable for CommitEntry {
    fn select_option(&self) -> SelectOption {
        let mut label = format!(
            "{} {} {}",
            self.commit.short_hash().red(),
            format!("[{}]", self.commit.author).blue(),
            self.commit.message.white(),
        );
        if let Some(number) = self.updates {
            label.push_str(&format!(" {}", format!("(updates #{})", number).bright_yellow()));
        }
        SelectOption::new(self.commit.hash.clone(), label)
    }
}

/// Pairs each commit with the open pull request on its derived branch.
pub fn commit_entries(
    commits: &[Commit],
    pulls: &[PullRequest],
    prefix: Option<&str>,
) -> Vec<CommitEntry> {
    commits
        .iter()
        .map(|commit| {
            let updates = branch_from_message(prefix, &commit.message)
                .ok()
                .and_then(|branch| pulls.iter().find(|pr| pr.head_ref_name == branch))
                .map(|pr| pr.number);
            CommitEntry {
                commit: commit.clone(),
                updates,
            }
        })
        .collect()
}

/// Asks the user to pick commits, returned in selection order.
pub async fn select_commits(
    selector: &dyn Selector,
    prompt: &str,
    entries: Vec<CommitEntry>,
) -> Result<Vec<Commit>> {
    let records = stream::iter(entries.into_iter().map(Ok));
    let chosen = choose(selector, prompt, records).await?;
    Ok(chosen.into_iter().map(|entry| entry.commit).collect())
}

/// Offers the commits after the upstream branch and returns the full
/// hashes of those picked.
pub async fn select_commit_hashes(git: &dyn Git, selector: &dyn Selector) -> Result<Vec<String>> {
    let upstream = resolve_upstream(git).await?;
    let commits = git.log(&upstream.rev()).await?;
    debug!("{} commits after {}", commits.len(), upstream);

    let entries = commit_entries(&commits, &[], None);
    let selected = select_commits(selector, SELECT_PROMPT, entries).await?;
    Ok(selected.into_iter().map(|c| c.hash).collect())
}
