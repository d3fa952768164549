use std::{
    process::Stdio,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt, stream::BoxStream};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::Command,
};
use tokio_stream::wrappers::LinesStream;
use tracing::debug;

/// A single entry offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// Identifier returned when the entry is chosen.
    pub id: String,
    /// Text shown to the user.
    pub label: String,
}

impl SelectOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Lets the user pick any number of options.
///
/// Options arrive as a stream so slow producers (paginated API results) can
/// be shown while they load. Selecting nothing is not an error.
#[async_trait]
pub trait Selector: Send + Sync {
    async fn select(
        &self,
        prompt: &str,
        options: BoxStream<'_, Result<SelectOption>>,
    ) -> Result<Vec<String>>;
}

/// Records that can be offered to a [`Selector`].
pub trait Selectable {
    fn select_option(&self) -> SelectOption;
}

/// Offers `records` to `selector` and maps the chosen ids back to records.
///
/// Records are returned in the order the selector reported them. Ids that
/// do not correspond to any record are ignored.
pub async fn choose<T, S>(selector: &dyn Selector, prompt: &str, records: S) -> Result<Vec<T>>
where
    T: Selectable + Send,
    S: Stream<Item = Result<T>> + Send,
{
    let offered = Mutex::new(Vec::new());

    let options = records
        .and_then(|record| {
            let option = record.select_option();
            let stored = offered
                .lock()
                .map(|mut offered| offered.push((option.id.clone(), record)))
                .map_err(|_| anyhow::anyhow!("selection state poisoned"));
            futures::future::ready(stored.map(|_| option))
        })
        .boxed();

    let ids = selector.select(prompt, options).await?;

    let mut offered = offered
        .into_inner()
        .map_err(|_| anyhow::anyhow!("selection state poisoned"))?;

    let mut chosen = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(pos) = offered.iter().position(|(offered_id, _)| *offered_id == id) {
            chosen.push(offered.swap_remove(pos).1);
        } else {
            debug!(id = %id, "selector returned an unknown id");
        }
    }

    Ok(chosen)
}

/// Selects through an `fzf` subprocess.
#[derive(Debug, Clone)]
pub struct Fzf {
    program: String,
}

impl Default for Fzf {
    fn default() -> Self {
        Self {
            program: "fzf".to_string(),
        }
    }
}

impl Fzf {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--ansi",
            "--height=40%",
            "--reverse",
            "--multi",
            "--delimiter=\t",
            "--with-nth=2..",
        ])
        .arg(format!("--header={}", prompt))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        // fzf draws its interface on the terminal through stderr.
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
        cmd
    }
}

/// Formats an option as one fzf input line: `id<TAB>label`.
pub fn fzf_line(option: &SelectOption) -> String {
    let label = option.label.trim().replace(['\n', '\t'], " ");
    format!("{}\t{}\n", option.id, label)
}

/// Extracts the id (text before the first tab) of every selected line.
pub fn parse_fzf_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split('\t').next().unwrap_or(line).to_string())
        .collect()
}

#[async_trait]
impl Selector for Fzf {
    async fn select(
        &self,
        prompt: &str,
        mut options: BoxStream<'_, Result<SelectOption>>,
    ) -> Result<Vec<String>> {
        let mut child = self
            .command(prompt)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program))?;

        let mut stdin = child.stdin.take().context("fzf stdin unavailable")?;
        let stdout = child.stdout.take().context("fzf stdout unavailable")?;

        while let Some(option) = options.next().await {
            let option = match option {
                Ok(option) => option,
                Err(e) => {
                    drop(stdin);
                    if let Err(kill_err) = child.kill().await {
                        debug!("Failed to stop fzf: {}", kill_err);
                    }
                    return Err(e);
                }
            };
            let line = fzf_line(&option);
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                // fzf exits early when the user accepts before input ends.
                debug!("fzf stopped reading input: {}", e);
                break;
            }
        }
        drop(stdin);

        let lines: Vec<String> = LinesStream::new(BufReader::new(stdout).lines())
            .try_collect()
            .await
            .context("Failed to read fzf output")?;

        let status = child.wait().await.context("Failed to wait for fzf")?;

        match status.code() {
            Some(0) => Ok(parse_fzf_output(&lines.join("\n"))),
            // No match, or the user cancelled.
            Some(1 | 130) => Ok(Vec::new()),
            Some(code) => anyhow::bail!("fzf exited with code {}", code),
            None => anyhow::bail!("fzf was terminated by signal"),
        }
    }
}

/// In-memory selector that answers with scripted ids.
///
/// Each call to [`Selector::select`] consumes the next scripted answer (an
/// empty selection once the script runs out) and records the prompt and the
/// options it was offered.
#[derive(Debug, Clone, Default)]
pub struct MemorySelector {
    answers: Arc<Mutex<Vec<Vec<String>>>>,
    calls: Arc<Mutex<Vec<(String, Vec<SelectOption>)>>>,
}

impl MemorySelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push(ids.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Prompts and offered options of every call so far.
    pub fn calls(&self) -> Vec<(String, Vec<SelectOption>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Selector for MemorySelector {
    async fn select(
        &self,
        prompt: &str,
        options: BoxStream<'_, Result<SelectOption>>,
    ) -> Result<Vec<String>> {
        let offered: Vec<SelectOption> = options.try_collect().await?;

        let answer = {
            let mut answers = self
                .answers
                .lock()
                .map_err(|_| anyhow::anyhow!("selector state poisoned"))?;
            if answers.is_empty() {
                Vec::new()
            } else {
                answers.remove(0)
            }
        };

        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("selector state poisoned"))?
            .push((prompt.to_string(), offered));

        Ok(answer)
    }
}
