use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    assignees::{IgnoreList, select_reviewers},
    branch::{branch_from_message, email_username},
    commits::{commit_entries, select_commits},
    config::Config,
    editor::{Editor, edit_pull_request},
    git::Git,
    github::Forge,
    rebase::{RebasePlan, rebase_onto},
    selector::Selector,
    types::{Assignee, Commit, CreatePullRequest, PullRequest, RepoKey, ReviewRequest, Upstream},
};

pub const COMMIT_PROMPT: &str = "Select commit(s) for PR:";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrOptions {
    /// Open the pull request as a draft.
    pub draft: bool,
    /// Enable squash auto-merge once the pull request exists.
    pub auto_merge: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoMerge {
    NotRequested,
    Enabled,
    /// The repository does not allow it; the pull request was still created.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrOutcome {
    /// The branch already backed an open pull request, which now has the
    /// new commits.
    Updated {
        branch: String,
        pull_request: PullRequest,
    },
    Created {
        branch: String,
        pull_request: PullRequest,
        reviewers: Vec<Assignee>,
        reviews_requested: bool,
        auto_merge: AutoMerge,
    },
}

impl PrOutcome {
    pub fn pull_request(&self) -> &PullRequest {
        match self {
            PrOutcome::Updated { pull_request, .. } | PrOutcome::Created { pull_request, .. } => {
                pull_request
            }
        }
    }
}

/// Determines HEAD's upstream, failing when HEAD is detached or untracked.
pub async fn resolve_upstream(git: &dyn Git) -> Result<Upstream> {
    git.head_branch()
        .await?
        .filter(|head| head != "HEAD")
        .context("Cannot determine HEAD branch name")?;

    let upstream = git
        .upstream_branch()
        .await?
        .context("Cannot determine upstream HEAD branch name")?;

    Upstream::parse(&upstream)
}

/// The configured branch prefix, else the user's email name.
pub async fn branch_prefix(git: &dyn Git, config: &Config) -> Result<Option<String>> {
    if let Some(prefix) = config.branch_prefix.as_ref().filter(|p| !p.is_empty()) {
        return Ok(Some(prefix.clone()));
    }
    Ok(git.user_email().await?.as_deref().and_then(email_username))
}

/// Turns local commits into a pull request.
pub struct PrFlow<'a> {
    pub git: &'a dyn Git,
    pub forge: &'a dyn Forge,
    pub selector: &'a dyn Selector,
    pub editor: &'a dyn Editor,
    pub config: &'a Config,
}

impl PrFlow<'_> {
    pub async fn run(&self, options: PrOptions) -> Result<PrOutcome> {
        let ignore = IgnoreList::new(self.config.ignore_assignees.as_slice())?;

        let upstream = resolve_upstream(self.git).await?;
        let remote_url = self.git.remote_url(&upstream.remote).await?;
        let repo = RepoKey::from_remote_url(&remote_url)?;
        let prefix = branch_prefix(self.git, self.config).await?;
        let upstream_rev = upstream.rev();

        info!("Fetching {} info, commits after {} and open PRs", repo, upstream);
        let (repo_info, commits, pulls) = tokio::try_join!(
            self.forge.repository(&repo),
            self.git.log(&upstream_rev),
            self.forge.open_pull_requests(&repo),
        )?;

        let repo_info =
            repo_info.with_context(|| format!("Failed to get repository ID for {}", repo))?;

        if commits.is_empty() {
            anyhow::bail!("No commits to push after {}", upstream);
        }
        info!(
            "Found {} publishable commits and {} existing PRs",
            commits.len(),
            pulls.len()
        );

        let selected = self.select(&commits, &pulls, prefix.as_deref()).await?;
        let hashes: Vec<String> = selected.iter().map(|c| c.hash.clone()).collect();
        let plan = RebasePlan::new(&commits, &hashes)?;

        // Newest selected commit; it becomes the tip of the pushed branch.
        let target = commits
            .iter()
            .find(|c| hashes.contains(&c.hash))
            .context("No commits selected")?;
        let branch = branch_from_message(prefix.as_deref(), &target.message)?;

        let git_dir = self.git.git_dir().await?;
        info!(
            "Rebasing {} selected commit(s) onto {}",
            plan.selected_count(),
            upstream
        );
        rebase_onto(self.git, &git_dir, &upstream_rev, &plan).await?;

        let rebased = self.git.log(&upstream_rev).await?;
        let tip = plan.target_in(&rebased)?;
        let refspec = format!("{}:refs/heads/{}", tip.hash, branch);

        info!("Pushing {} to {}", tip.short_hash(), branch);
        self.git
            .force_push(&upstream.remote, &refspec)
            .await
            .with_context(|| format!("Failed to push {}", branch))?;

        if let Some(existing) = pulls.iter().find(|pr| pr.head_ref_name == branch) {
            info!("Updated pull request #{}", existing.number);
            return Ok(PrOutcome::Updated {
                branch,
                pull_request: existing.clone(),
            });
        }

        let message = edit_pull_request(self.editor, &git_dir, target).await?;
        if message.title.is_empty() {
            anyhow::bail!("Missing PR title, aborting");
        }

        info!("Creating pull request");
        let pull_request = self
            .forge
            .create_pull_request(&CreatePullRequest {
                repository_id: repo_info.id,
                base_ref_name: repo_info.default_branch,
                head_ref_name: branch.clone(),
                title: message.title,
                body: message.body,
                draft: options.draft,
            })
            .await?;
        info!("Created pull request #{}", pull_request.number);

        let auto_merge = if options.auto_merge {
            match self.forge.enable_auto_merge(&pull_request.id).await {
                Ok(()) => AutoMerge::Enabled,
                Err(e) => {
                    warn!("Auto merge not available, skipping: {:#}", e);
                    AutoMerge::Skipped
                }
            }
        } else {
            AutoMerge::NotRequested
        };

        let reviewers = select_reviewers(self.forge, self.selector, &repo, &ignore).await?;
        let review = ReviewRequest::new(&pull_request.id, &reviewers);

        let reviews_requested = if review.is_empty() {
            false
        } else {
            info!("Requesting {} reviewer(s)", reviewers.len());
            match self.forge.request_reviews(&review).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Review request failed, skipping: {:#}", e);
                    false
                }
            }
        };

        Ok(PrOutcome::Created {
            branch,
            pull_request,
            reviewers,
            reviews_requested,
            auto_merge,
        })
    }

    /// Chooses the commits for the pull request; a lone commit is chosen
    /// without asking.
    async fn select(
        &self,
        commits: &[Commit],
        pulls: &[PullRequest],
        prefix: Option<&str>,
    ) -> Result<Vec<Commit>> {
        if let [only] = commits {
            return Ok(vec![only.clone()]);
        }

        let entries = commit_entries(commits, pulls, prefix);
        let selected = select_commits(self.selector, COMMIT_PROMPT, entries).await?;

        if selected.is_empty() {
            anyhow::bail!("No commits selected");
        }
        Ok(selected)
    }
}
