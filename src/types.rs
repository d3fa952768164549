use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Identifies a GitHub repository by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoKey {
    pub owner: String,
    pub repo: String,
    pub full_name: String,
}

impl RepoKey {
    pub fn new(owner: &str, repo: &str) -> Result<Self> {
        if owner.is_empty() || repo.is_empty() {
            anyhow::bail!("Repository owner and name must be non-empty");
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            full_name: format!("{}/{}", owner, repo),
        })
    }

    /// Parses a git remote URL in https, ssh or scp-like form.
    pub fn from_remote_url(remote_url: &str) -> Result<Self> {
        let remote_url = remote_url.trim();

        let path = if remote_url.contains("://") {
            let url = url::Url::parse(remote_url)
                .with_context(|| format!("Failed to parse remote URL: '{}'", remote_url))?;
            url.path().trim_start_matches('/').to_string()
        } else if let Some((_, path)) = remote_url.split_once(':') {
            // scp-like syntax: git@github.com:owner/repo.git
            path.to_string()
        } else {
            anyhow::bail!("Unsupported remote URL: '{}'", remote_url);
        };

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [.., owner, repo] => Self::new(owner, repo),
            _ => anyhow::bail!(
                "Remote URL must point at owner/repo, got: '{}'",
                remote_url
            ),
        }
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

/// The remote-tracking branch HEAD is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub remote: String,
    pub branch: String,
}

impl Upstream {
    /// Splits an abbreviated upstream ref such as `origin/main`.
    pub fn parse(abbrev_ref: &str) -> Result<Self> {
        let abbrev_ref = abbrev_ref.trim();
        match abbrev_ref.split_once('/') {
            Some((remote, branch)) if !remote.is_empty() && !branch.is_empty() => Ok(Self {
                remote: remote.to_string(),
                branch: branch.to_string(),
            }),
            _ => anyhow::bail!(
                "Upstream '{}' is not a remote-tracking branch; track one with \
                 `git branch --set-upstream-to <remote>/<branch>`",
                abbrev_ref
            ),
        }
    }

    pub fn rev(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

/// A commit that exists locally but not on the upstream branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    pub author: String,
    /// Subject line.
    pub message: String,
    pub body: String,
}

impl Commit {
    pub fn short_hash(&self) -> &str {
        self.hash.get(..8).unwrap_or(&self.hash)
    }
}

/// Distinguishes the two kinds of reviewer GitHub accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeKind {
    User,
    Team,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignee {
    pub kind: AssigneeKind,
    pub id: String,
    pub slug: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub id: String,
    pub number: u64,
    #[serde(default)]
    pub head_ref_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
}

/// Repository metadata needed to open a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub id: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequest {
    pub repository_id: String,
    pub base_ref_name: String,
    pub head_ref_name: String,
    pub title: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub pull_request_id: String,
    pub user_ids: Vec<String>,
    pub team_ids: Vec<String>,
}

impl ReviewRequest {
    pub fn new(pull_request_id: &str, reviewers: &[Assignee]) -> Self {
        let ids_of = |kind: AssigneeKind| -> Vec<String> {
            reviewers
                .iter()
                .filter(|a| a.kind == kind)
                .map(|a| a.id.clone())
                .collect()
        };
        Self {
            pull_request_id: pull_request_id.to_string(),
            user_ids: ids_of(AssigneeKind::User),
            team_ids: ids_of(AssigneeKind::Team),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty() && self.team_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Connection<T> {
    pub nodes: Vec<Option<T>>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLRepositoryData {
    pub repository: Option<GraphQLRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRepository {
    pub id: String,
    pub default_branch_ref: Option<GraphQLRef>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLViewerData {
    pub viewer: GraphQLViewer,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLViewer {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLSearchData {
    pub search: GraphQLSearch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLSearch {
    pub edges: Vec<GraphQLSearchEdge>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLSearchEdge {
    pub node: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLAssignableUsersData {
    pub repository: GraphQLAssignableUsers,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLAssignableUsers {
    pub assignable_users: Connection<GraphQLUser>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLUser {
    pub id: String,
    pub login: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLTeamsData {
    pub organization: GraphQLTeams,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLTeams {
    pub teams: Connection<GraphQLTeam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLTeam {
    pub id: String,
    pub combined_slug: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLCreatePullRequestData {
    pub create_pull_request: GraphQLCreatedPullRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLCreatedPullRequest {
    pub pull_request: PullRequest,
}

impl From<GraphQLUser> for Assignee {
    fn from(user: GraphQLUser) -> Self {
        Self {
            kind: AssigneeKind::User,
            id: user.id,
            slug: user.login,
            name: user.name,
        }
    }
}

impl From<GraphQLTeam> for Assignee {
    fn from(team: GraphQLTeam) -> Self {
        Self {
            kind: AssigneeKind::Team,
            id: team.id,
            slug: team.combined_slug,
            name: team.name,
        }
    }
}
