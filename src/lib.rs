//! pt: turn local commits into GitHub pull requests.
//!
//! Picks commits after the upstream branch with fzf, rebases them to the
//! front of the local history, force-pushes them to a branch named after
//! the commit subject and opens a pull request for them through the GitHub
//! GraphQL API, asking for reviewers along the way.

pub mod assignees;
pub mod branch;
pub mod cli;
pub mod commands;
pub mod commits;
pub mod config;
pub mod editor;
pub mod git;
pub mod github;
pub mod graphql;
pub mod pr;
pub mod rebase;
pub mod selector;
pub mod types;

pub use cli::{Command, Invocation, parse_args};
pub use config::Config;
pub use editor::{Editor, ExternalEditor};
pub use git::{Git, GitCli};
pub use github::{Forge, GitHub};
pub use pr::{AutoMerge, PrFlow, PrOptions, PrOutcome};
pub use selector::{Fzf, MemorySelector, SelectOption, Selector};
pub use types::{Assignee, AssigneeKind, Commit, PullRequest, RepoInfo, RepoKey};
