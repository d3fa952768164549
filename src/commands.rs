use std::io::Write;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::warn;

use crate::{
    commits::select_commit_hashes,
    config::Config,
    editor::ExternalEditor,
    git::GitCli,
    github::GitHub,
    pr::{AutoMerge, PrFlow, PrOptions, PrOutcome},
    selector::Fzf,
};

/// Runs `pt pr` against the real git, GitHub, fzf and editor.
pub async fn run_pr(options: PrOptions) -> Result<()> {
    let config = Config::load()?;
    let forge = GitHub::connect()?;
    let git = GitCli;
    let selector = Fzf::default();
    let editor = ExternalEditor::from_env();

    let flow = PrFlow {
        git: &git,
        forge: &forge,
        selector: &selector,
        editor: &editor,
        config: &config,
    };
    let outcome = flow.run(options).await?;

    let mut stdout = std::io::stdout();
    write_outcome(&outcome, &mut stdout)?;

    if let PrOutcome::Created { .. } = &outcome {
        let url = &outcome.pull_request().url;
        if let Err(e) = open::that(url) {
            warn!("Failed to open {}: {}", url, e);
        }
    }

    Ok(())
}

/// Runs `pt select-commit`, printing one hash per line.
pub async fn run_select_commit() -> Result<()> {
    let hashes = select_commit_hashes(&GitCli, &Fzf::default()).await?;

    let mut stdout = std::io::stdout();
    for hash in hashes {
        writeln!(stdout, "{}", hash)?;
    }
    Ok(())
}

pub fn write_outcome<W: Write>(outcome: &PrOutcome, writer: &mut W) -> Result<()> {
    let (verb, branch) = match outcome {
        PrOutcome::Updated { branch, .. } => ("Updated", branch),
        PrOutcome::Created { branch, .. } => ("Created", branch),
    };
    let pull_request = outcome.pull_request();

    writeln!(
        writer,
        "{} {} {}",
        verb,
        format!("#{}", pull_request.number).green(),
        branch
    )?;
    writeln!(writer, "{}", pull_request.url)?;

    if let PrOutcome::Created {
        reviewers,
        reviews_requested,
        auto_merge,
        ..
    } = outcome
    {
        if *auto_merge == AutoMerge::Enabled {
            writeln!(writer, "Auto-merge enabled")?;
        }
        if *reviews_requested {
            let slugs: Vec<&str> = reviewers.iter().map(|r| r.slug.as_str()).collect();
            writeln!(writer, "Requested reviews from {}", slugs.join(", "))?;
        }
    }

    writer.flush().context("Failed to write output")
}
