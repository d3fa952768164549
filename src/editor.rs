use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::types::Commit;

/// File inside the git directory that holds the pull request message.
pub const EDIT_FILE: &str = "PULLREQ_EDITMSG";

const DEFAULT_EDITOR: &str = "vim";

/// Opens a file for the user to edit and returns once they are done.
#[async_trait]
pub trait Editor: Send + Sync {
    async fn edit(&self, path: &Path) -> Result<()>;
}

/// Runs the user's editor attached to the terminal.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    command: String,
}

impl ExternalEditor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Uses `$EDITOR`, falling back to vim.
    pub fn from_env() -> Self {
        let command = std::env::var("EDITOR")
            .ok()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string());
        Self::new(command)
    }
}

#[async_trait]
impl Editor for ExternalEditor {
    async fn edit(&self, path: &Path) -> Result<()> {
        debug!(editor = %self.command, "opening {}", path.display());

        // Through the shell so that values like "code --wait" work.
        let status = Command::new("sh")
            .arg("-c")
            .arg(format!("{} \"$1\"", self.command))
            .arg("sh")
            .arg(path)
            .status()
            .await
            .with_context(|| format!("Failed to launch editor '{}'", self.command))?;

        if !status.success() {
            anyhow::bail!("Editor '{}' exited with {}", self.command, status);
        }

        Ok(())
    }
}

/// Title and body parsed from an edited message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestMessage {
    pub title: String,
    pub body: String,
}

/// The initial message: the commit subject, then the body after a blank
/// line when there is one.
pub fn message_template(commit: &Commit) -> String {
    if commit.body.is_empty() {
        commit.message.clone()
    } else {
        format!("{}\n\n{}", commit.message, commit.body)
    }
}

/// Splits an edited message into title (first line) and trimmed body.
pub fn parse_message(contents: &str) -> PullRequestMessage {
    let (title, body) = contents.split_once('\n').unwrap_or((contents, ""));
    PullRequestMessage {
        title: title.trim_end().to_string(),
        body: body.trim().to_string(),
    }
}

/// Lets the user write the pull request message, starting from `commit`.
pub async fn edit_pull_request(
    editor: &dyn Editor,
    git_dir: &Path,
    commit: &Commit,
) -> Result<PullRequestMessage> {
    let path = git_dir.join(EDIT_FILE);

    tokio::fs::write(&path, message_template(commit))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    editor.edit(&path).await?;

    let contents = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(parse_message(&contents))
}
