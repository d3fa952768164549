use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::types::Commit;

const FIELD_SEPARATOR: char = '\x1f';
const RECORD_SEPARATOR: char = '\x1e';

/// The git operations the pull request workflow depends on.
#[async_trait]
pub trait Git: Send + Sync {
    async fn remote_url(&self, remote: &str) -> Result<String>;

    async fn user_email(&self) -> Result<Option<String>>;

    async fn git_dir(&self) -> Result<PathBuf>;

    async fn head_branch(&self) -> Result<Option<String>>;

    /// Abbreviated name of HEAD's upstream, e.g. `origin/main`.
    async fn upstream_branch(&self) -> Result<Option<String>>;

    /// Commits reachable from HEAD but not from `upstream`, newest first.
    async fn log(&self, upstream: &str) -> Result<Vec<Commit>>;

    /// Runs `git rebase --interactive --autostash <onto>` with the given
    /// command as the sequence editor.
    async fn rebase_interactive(&self, onto: &str, sequence_editor: &str) -> Result<()>;

    async fn abort_rebase(&self) -> Result<()>;

    async fn force_push(&self, remote: &str, refspec: &str) -> Result<()>;
}

/// Drives the `git` executable in the current directory.
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    async fn output(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(?args, "running git");
        Command::new("git")
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to run git {}", args.join(" ")))
    }

    async fn stdout(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }

        Ok(String::from_utf8(output.stdout)?.trim_end().to_string())
    }

    /// Like `stdout` but maps a failing command to `None`.
    async fn optional_stdout(&self, args: &[&str]) -> Result<Option<String>> {
        let output = self.output(args).await?;

        if !output.status.success() {
            return Ok(None);
        }

        let value = String::from_utf8(output.stdout)?.trim().to_string();
        Ok((!value.is_empty()).then_some(value))
    }
}

#[async_trait]
impl Git for GitCli {
    async fn remote_url(&self, remote: &str) -> Result<String> {
        self.stdout(&["remote", "get-url", remote]).await
    }

    async fn user_email(&self) -> Result<Option<String>> {
        self.optional_stdout(&["config", "--get", "user.email"])
            .await
    }

    async fn git_dir(&self) -> Result<PathBuf> {
        let dir = self.stdout(&["rev-parse", "--absolute-git-dir"]).await?;
        Ok(PathBuf::from(dir))
    }

    async fn head_branch(&self) -> Result<Option<String>> {
        self.optional_stdout(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await
    }

    async fn upstream_branch(&self) -> Result<Option<String>> {
        self.optional_stdout(&["rev-parse", "--abbrev-ref", "@{upstream}"])
            .await
    }

    async fn log(&self, upstream: &str) -> Result<Vec<Commit>> {
        let range = format!("{}..HEAD", upstream);
        let format = format!("--format=%H{0}%an{0}%s{0}%b{1}", FIELD_SEPARATOR, RECORD_SEPARATOR);
        let output = self.stdout(&["log", &format, &range]).await?;
        parse_log(&output)
    }

    async fn rebase_interactive(&self, onto: &str, sequence_editor: &str) -> Result<()> {
        debug!(onto, sequence_editor, "running git rebase");
        let output = Command::new("git")
            .args(["rebase", "--interactive", "--autostash", onto])
            .env("GIT_SEQUENCE_EDITOR", sequence_editor)
            .output()
            .await
            .context("Failed to run git rebase")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git rebase onto {} failed: {}", onto, stderr.trim());
        }

        Ok(())
    }

    async fn abort_rebase(&self) -> Result<()> {
        self.stdout(&["rebase", "--abort"]).await.map(|_| ())
    }

    async fn force_push(&self, remote: &str, refspec: &str) -> Result<()> {
        self.stdout(&["push", "--force", remote, refspec])
            .await
            .map(|_| ())
    }
}

/// Parses `git log` output produced with the separator-delimited format used
/// by [`GitCli::log`].
pub fn parse_log(output: &str) -> Result<Vec<Commit>> {
    output
        .split(RECORD_SEPARATOR)
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.trim().is_empty())
        .map(|record| {
            let fields: Vec<&str> = record.splitn(4, FIELD_SEPARATOR).collect();
            match fields.as_slice() {
                [hash, author, message, body] => Ok(Commit {
                    hash: hash.to_string(),
                    author: author.to_string(),
                    message: message.to_string(),
                    body: body.trim().to_string(),
                }),
                _ => anyhow::bail!("Malformed git log record: '{}'", record),
            }
        })
        .collect()
}
