use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use octocrab::Octocrab;
use serde_json::json;
use tracing::debug;

use crate::{
    config,
    graphql::{GraphQLClient, GraphQLError},
    types::*,
};

const REPOSITORY_QUERY: &str = r#"
    query repo($owner: String!, $repo: String!) {
        repository(owner: $owner, name: $repo) {
            id
            defaultBranchRef {
                name
            }
        }
    }
"#;

const VIEWER_QUERY: &str = r#"
    query {
        viewer {
            login
        }
    }
"#;

const PULL_REQUEST_SEARCH_QUERY: &str = r#"
    query myPullRequests($query: String!, $cursor: String) {
        search(query: $query, first: 100, type: ISSUE, after: $cursor) {
            edges {
                node {
                    ... on PullRequest {
                        id
                        number
                        title
                        body
                        url
                        headRefName
                    }
                }
            }
            pageInfo {
                endCursor
                hasNextPage
            }
        }
    }
"#;

const ASSIGNABLE_USERS_QUERY: &str = r#"
    query userAssignees($owner: String!, $repo: String!, $cursor: String) {
        repository(owner: $owner, name: $repo) {
            assignableUsers(first: 100, after: $cursor) {
                nodes {
                    id
                    login
                    name
                }
                pageInfo {
                    endCursor
                    hasNextPage
                }
            }
        }
    }
"#;

const ORGANIZATION_QUERY: &str = r#"
    query orgInfo($owner: String!) {
        organization(login: $owner) {
            name
        }
    }
"#;

const TEAMS_QUERY: &str = r#"
    query teamAssignees($owner: String!, $cursor: String) {
        organization(login: $owner) {
            teams(first: 100, after: $cursor) {
                nodes {
                    id
                    combinedSlug
                    name
                }
                pageInfo {
                    endCursor
                    hasNextPage
                }
            }
        }
    }
"#;

const CREATE_PULL_REQUEST_MUTATION: &str = r#"
    mutation createPull($input: CreatePullRequestInput!) {
        createPullRequest(input: $input) {
            pullRequest {
                id
                number
                title
                body
                url
                headRefName
            }
        }
    }
"#;

const REQUEST_REVIEWS_MUTATION: &str = r#"
    mutation requestReview($input: RequestReviewsInput!) {
        requestReviews(input: $input) {
            clientMutationId
        }
    }
"#;

const ENABLE_AUTO_MERGE_MUTATION: &str = r#"
    mutation enableAutoMerge($input: EnablePullRequestAutoMergeInput!) {
        enablePullRequestAutoMerge(input: $input) {
            clientMutationId
        }
    }
"#;

/// The remote operations needed to publish a pull request.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Repository metadata, or `None` when the repository cannot be found.
    async fn repository(&self, repo: &RepoKey) -> Result<Option<RepoInfo>>;

    /// Open pull requests authored by the authenticated user.
    async fn open_pull_requests(&self, repo: &RepoKey) -> Result<Vec<PullRequest>>;

    /// Every assignable user, plus the owner's teams when the owner is an
    /// organization. Items are yielded as their pages arrive.
    fn assignees<'a>(&'a self, repo: &'a RepoKey) -> BoxStream<'a, Result<Assignee>>;

    async fn create_pull_request(&self, input: &CreatePullRequest) -> Result<PullRequest>;

    async fn request_reviews(&self, input: &ReviewRequest) -> Result<()>;

    /// Enables squash auto-merge on a pull request.
    async fn enable_auto_merge(&self, pull_request_id: &str) -> Result<()>;
}

pub fn get_github_token() -> Result<String> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }
    }

    if let Some(path) = config::token_path().filter(|p| p.exists()) {
        let token = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read token file: {}", path.display()))?;
        let token = token.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Cannot get token from `gh auth token`")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// Creates an authenticated GitHub client using available credentials.
pub fn setup_github_client() -> Result<Octocrab> {
    let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
    Octocrab::builder()
        .personal_token(token)
        .build()
        .context("Failed to create GitHub client")
}

/// [`Forge`] backed by the GitHub GraphQL API.
pub struct GitHub {
    client: GraphQLClient,
}

impl GitHub {
    pub fn new(client: GraphQLClient) -> Self {
        Self { client }
    }

    pub fn connect() -> Result<Self> {
        Ok(Self::new(GraphQLClient::new(setup_github_client()?)))
    }

    pub async fn viewer_login(&self) -> Result<String> {
        let data: GraphQLViewerData = self.client.request(VIEWER_QUERY, json!({})).await?;
        Ok(data.viewer.login)
    }

    /// Whether `owner` is an organization. An owner the API cannot resolve
    /// as an organization is a user.
    pub async fn is_organization(&self, owner: &str) -> Result<bool> {
        let result = self
            .client
            .request::<serde_json::Value>(ORGANIZATION_QUERY, json!({ "owner": owner }))
            .await;

        match result {
            Ok(data) => Ok(!data["organization"].is_null()),
            Err(e) if e.is::<GraphQLError>() => {
                debug!("{} is not an organization: {}", owner, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn user_assignees<'a>(&'a self, repo: &RepoKey) -> BoxStream<'a, Result<Assignee>> {
        self.client
            .paginate(
                ASSIGNABLE_USERS_QUERY,
                json!({ "owner": repo.owner, "repo": repo.repo }),
                users_page_info,
            )
            .map_ok(|data| {
                let users = data.repository.assignable_users.nodes;
                stream::iter(
                    users
                        .into_iter()
                        .flatten()
                        .map(|u| Ok::<_, anyhow::Error>(Assignee::from(u))),
                )
            })
            .try_flatten()
            .boxed()
    }

    fn team_assignees<'a>(&'a self, owner: &str) -> BoxStream<'a, Result<Assignee>> {
        self.client
            .paginate(TEAMS_QUERY, json!({ "owner": owner }), teams_page_info)
            .map_ok(|data| {
                let teams = data.organization.teams.nodes;
                stream::iter(
                    teams
                        .into_iter()
                        .flatten()
                        .map(|t| Ok::<_, anyhow::Error>(Assignee::from(t))),
                )
            })
            .try_flatten()
            .boxed()
    }
}

fn users_page_info(data: &GraphQLAssignableUsersData) -> &PageInfo {
    &data.repository.assignable_users.page_info
}

fn teams_page_info(data: &GraphQLTeamsData) -> &PageInfo {
    &data.organization.teams.page_info
}

fn search_page_info(data: &GraphQLSearchData) -> &PageInfo {
    &data.search.page_info
}

/// The search query listing `login`'s open pull requests in `repo`.
pub fn open_pulls_search(login: &str, repo: &RepoKey) -> String {
    format!("is:pr is:open author:{} repo:{}", login, repo.full_name)
}

#[async_trait]
impl Forge for GitHub {
    async fn repository(&self, repo: &RepoKey) -> Result<Option<RepoInfo>> {
        let result: Result<GraphQLRepositoryData> = self
            .client
            .request(
                REPOSITORY_QUERY,
                json!({ "owner": repo.owner, "repo": repo.repo }),
            )
            .await;

        let repository = match result {
            Ok(data) => data.repository,
            Err(e) if e.is::<GraphQLError>() => {
                debug!("Repository lookup for {} failed: {}", repo, e);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(repository.map(|r| RepoInfo {
            id: r.id,
            default_branch: r
                .default_branch_ref
                .map(|b| b.name)
                .unwrap_or_else(|| "main".to_string()),
        }))
    }

    async fn open_pull_requests(&self, repo: &RepoKey) -> Result<Vec<PullRequest>> {
        let login = self.viewer_login().await?;
        let search = open_pulls_search(&login, repo);

        let pages: Vec<GraphQLSearchData> = self
            .client
            .paginate(
                PULL_REQUEST_SEARCH_QUERY,
                json!({ "query": search }),
                search_page_info,
            )
            .try_collect()
            .await?;

        let mut pulls = Vec::new();
        for edge in pages.into_iter().flat_map(|p| p.search.edges) {
            // Non pull request search hits come back as empty objects.
            if let Some(node) = edge.node.filter(|n| n.get("id").is_some()) {
                pulls.push(serde_json::from_value(node).context("Failed to decode pull request")?);
            }
        }

        debug!("Found {} open pull requests by {}", pulls.len(), login);
        Ok(pulls)
    }

    fn assignees<'a>(&'a self, repo: &'a RepoKey) -> BoxStream<'a, Result<Assignee>> {
        let teams = stream::once(self.is_organization(&repo.owner))
            .map(move |is_org| match is_org {
                Ok(true) => self.team_assignees(&repo.owner),
                Ok(false) => stream::empty().boxed(),
                Err(e) => stream::iter([Err(e)]).boxed(),
            })
            .flatten();

        stream::select(self.user_assignees(repo), teams).boxed()
    }

    async fn create_pull_request(&self, input: &CreatePullRequest) -> Result<PullRequest> {
        let data: GraphQLCreatePullRequestData = self
            .client
            .request(CREATE_PULL_REQUEST_MUTATION, json!({ "input": input }))
            .await
            .context("Failed to create pull request")?;
        Ok(data.create_pull_request.pull_request)
    }

    async fn request_reviews(&self, input: &ReviewRequest) -> Result<()> {
        self.client
            .request::<serde_json::Value>(REQUEST_REVIEWS_MUTATION, json!({ "input": input }))
            .await
            .context("Failed to request reviews")?;
        Ok(())
    }

    async fn enable_auto_merge(&self, pull_request_id: &str) -> Result<()> {
        let input = json!({
            "pullRequestId": pull_request_id,
            "mergeMethod": "SQUASH",
        });
        self.client
            .request::<serde_json::Value>(ENABLE_AUTO_MERGE_MUTATION, json!({ "input": input }))
            .await
            .context("Failed to enable auto-merge")?;
        Ok(())
    }
}
