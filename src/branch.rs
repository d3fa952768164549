use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

/// Longest branch name the tool will push.
pub const MAX_BRANCH_LEN: usize = 255;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^0-9a-z]+").expect("Failed to compile branch pattern"));

/// Generates a consistent branch name from a commit message.
///
/// The message is lower-cased and every run of characters outside
/// `[0-9a-z]` becomes a single hyphen, without leading or trailing hyphens.
/// With a prefix the result is `<prefix>/<slug>`. The full name never
/// exceeds [`MAX_BRANCH_LEN`] characters.
pub fn branch_from_message(prefix: Option<&str>, message: &str) -> Result<String> {
    let lowered = message.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        anyhow::bail!("Cannot derive a branch name from message: '{}'", message);
    }

    let prefix = prefix.filter(|p| !p.is_empty());
    let budget = match prefix {
        Some(p) => MAX_BRANCH_LEN.saturating_sub(p.chars().count() + 1),
        None => MAX_BRANCH_LEN,
    };

    if budget == 0 {
        anyhow::bail!("Branch prefix is too long: '{}'", prefix.unwrap_or_default());
    }

    // The slug is ASCII so byte and char lengths agree.
    let slug = slug[..slug.len().min(budget)].trim_end_matches('-');

    Ok(match prefix {
        Some(p) => format!("{}/{}", p, slug),
        None => slug.to_string(),
    })
}

/// The local part of an email address, lower-cased.
pub fn email_username(email: &str) -> Option<String> {
    let local = email.trim().split('@').next()?.trim();
    (!local.is_empty()).then(|| local.to_lowercase())
}
