use anyhow::{Context, Result};
use futures::{StreamExt, TryStreamExt, future};
use owo_colors::OwoColorize;
use regex::Regex;

use crate::{
    github::Forge,
    selector::{Selectable, SelectOption, Selector, choose},
    types::{Assignee, RepoKey},
};

pub const ASSIGNEE_PROMPT: &str = "Select Assignees:";

/// Compiled `ignoreAssignees` patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    patterns: Vec<Regex>,
}

impl IgnoreList {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref())
                    .with_context(|| format!("Invalid ignoreAssignees pattern: '{}'", p.as_ref()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True when any pattern matches anywhere in `slug`.
    pub fn is_ignored(&self, slug: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(slug))
    }
}

impl Selectable for Assignee {
    fn select_option(&self) -> SelectOption {
        let name = match &self.name {
            Some(name) if !name.is_empty() => name.yellow().to_string(),
            _ => "No name".bright_black().to_string(),
        };
        SelectOption::new(self.id.clone(), format!("{} [{}]", self.slug, name))
    }
}

/// Lets the user choose reviewers among the repository's assignable users
/// and teams, hiding anything on the ignore list.
pub async fn select_reviewers(
    forge: &dyn Forge,
    selector: &dyn Selector,
    repo: &RepoKey,
    ignore: &IgnoreList,
) -> Result<Vec<Assignee>> {
    let assignees = forge
        .assignees(repo)
        .try_filter(|assignee| future::ready(!ignore.is_ignored(&assignee.slug)))
        .boxed();

    choose(selector, ASSIGNEE_PROMPT, assignees).await
}
