use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use pt::{
    AutoMerge, Config, Editor, Forge, Git, MemorySelector, PrFlow, PrOptions, PrOutcome,
    commits::select_commit_hashes,
    pr::COMMIT_PROMPT,
    types::{
        Assignee, AssigneeKind, Commit, CreatePullRequest, PullRequest, RepoInfo, RepoKey,
        ReviewRequest,
    },
};

fn commit(hash: &str, message: &str) -> Commit {
    Commit {
        hash: hash.to_string(),
        author: "Alice".to_string(),
        message: message.to_string(),
        body: String::new(),
    }
}

fn assignee(kind: AssigneeKind, id: &str, slug: &str) -> Assignee {
    Assignee {
        kind,
        id: id.to_string(),
        slug: slug.to_string(),
        name: None,
    }
}

fn open_pull(number: u64, head: &str) -> PullRequest {
    PullRequest {
        id: format!("PR_{}", number),
        number,
        head_ref_name: head.to_string(),
        title: String::new(),
        body: String::new(),
        url: format!("https://github.com/acme/widgets/pull/{}", number),
    }
}

/// Git double: serves scripted logs in order and records every call.
struct FakeGit {
    git_dir: PathBuf,
    logs: Mutex<VecDeque<Vec<Commit>>>,
    fail_rebase: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeGit {
    fn new(git_dir: &Path, logs: Vec<Vec<Commit>>) -> Self {
        Self {
            git_dir: git_dir.to_path_buf(),
            logs: Mutex::new(logs.into()),
            fail_rebase: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_rebase(mut self) -> Self {
        self.fail_rebase = true;
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Git for FakeGit {
    async fn remote_url(&self, remote: &str) -> Result<String> {
        self.record(format!("remote_url {}", remote));
        Ok("git@github.com:acme/widgets.git".to_string())
    }

    async fn user_email(&self) -> Result<Option<String>> {
        Ok(Some("alice@example.com".to_string()))
    }

    async fn git_dir(&self) -> Result<PathBuf> {
        Ok(self.git_dir.clone())
    }

    async fn head_branch(&self) -> Result<Option<String>> {
        Ok(Some("work".to_string()))
    }

    async fn upstream_branch(&self) -> Result<Option<String>> {
        Ok(Some("origin/main".to_string()))
    }

    async fn log(&self, upstream: &str) -> Result<Vec<Commit>> {
        self.record(format!("log {}", upstream));
        Ok(self.logs.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn rebase_interactive(&self, onto: &str, sequence_editor: &str) -> Result<()> {
        self.record(format!("rebase {}", onto));
        assert!(sequence_editor.starts_with("cp '"));
        if self.fail_rebase {
            anyhow::bail!("CONFLICT (content): Merge conflict in src/lib.rs");
        }
        Ok(())
    }

    async fn abort_rebase(&self) -> Result<()> {
        self.record("abort");
        Ok(())
    }

    async fn force_push(&self, remote: &str, refspec: &str) -> Result<()> {
        self.record(format!("push {} {}", remote, refspec));
        Ok(())
    }
}

/// Forge double: canned data, recorded mutations.
#[derive(Default)]
struct MockForge {
    missing_repository: bool,
    pulls: Vec<PullRequest>,
    assignees: Vec<Assignee>,
    auto_merge_fails: bool,
    created: Mutex<Vec<CreatePullRequest>>,
    reviews: Mutex<Vec<ReviewRequest>>,
    auto_merged: Mutex<Vec<String>>,
}

#[async_trait]
impl Forge for MockForge {
    async fn repository(&self, repo: &RepoKey) -> Result<Option<RepoInfo>> {
        assert_eq!(repo.full_name, "acme/widgets");
        if self.missing_repository {
            return Ok(None);
        }
        Ok(Some(RepoInfo {
            id: "R_1".to_string(),
            default_branch: "trunk".to_string(),
        }))
    }

    async fn open_pull_requests(&self, _repo: &RepoKey) -> Result<Vec<PullRequest>> {
        Ok(self.pulls.clone())
    }

    fn assignees<'a>(&'a self, _repo: &'a RepoKey) -> BoxStream<'a, Result<Assignee>> {
        stream::iter(self.assignees.clone().into_iter().map(Ok)).boxed()
    }

    async fn create_pull_request(&self, input: &CreatePullRequest) -> Result<PullRequest> {
        self.created.lock().unwrap().push(input.clone());
        Ok(PullRequest {
            id: "PR_new".to_string(),
            number: 99,
            head_ref_name: input.head_ref_name.clone(),
            title: input.title.clone(),
            body: input.body.clone(),
            url: "https://github.com/acme/widgets/pull/99".to_string(),
        })
    }

    async fn request_reviews(&self, input: &ReviewRequest) -> Result<()> {
        self.reviews.lock().unwrap().push(input.clone());
        Ok(())
    }

    async fn enable_auto_merge(&self, pull_request_id: &str) -> Result<()> {
        if self.auto_merge_fails {
            anyhow::bail!("Pull request is not in the correct state to enable auto-merge");
        }
        self.auto_merged
            .lock()
            .unwrap()
            .push(pull_request_id.to_string());
        Ok(())
    }
}

/// Editor double that replaces the message, or leaves it as written.
#[derive(Clone, Default)]
struct FakeEditor {
    replacement: Option<String>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl FakeEditor {
    fn writing(text: &str) -> Self {
        Self {
            replacement: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Editor for FakeEditor {
    async fn edit(&self, path: &Path) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push(std::fs::read_to_string(path)?);
        if let Some(text) = &self.replacement {
            std::fs::write(path, text)?;
        }
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    git: FakeGit,
    forge: MockForge,
    selector: MemorySelector,
    editor: FakeEditor,
    config: Config,
}

impl Harness {
    fn new(logs: Vec<Vec<Commit>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let git = FakeGit::new(dir.path(), logs);
        Self {
            _dir: dir,
            git,
            forge: MockForge::default(),
            selector: MemorySelector::new(),
            editor: FakeEditor::default(),
            config: Config::default(),
        }
    }

    async fn run(&self, options: PrOptions) -> Result<PrOutcome> {
        PrFlow {
            git: &self.git,
            forge: &self.forge,
            selector: &self.selector,
            editor: &self.editor,
            config: &self.config,
        }
        .run(options)
        .await
    }
}

#[tokio::test]
async fn test_single_commit_is_selected_without_prompt() {
    let mut h = Harness::new(vec![
        vec![commit("c1", "Add widget sizing")],
        vec![commit("r1", "Add widget sizing")],
    ]);
    h.editor = FakeEditor::writing("Add widget sizing\n\nLonger description\n");

    let outcome = h.run(PrOptions::default()).await.unwrap();

    assert!(h.selector.calls().iter().all(|(prompt, _)| prompt != COMMIT_PROMPT));
    assert!(
        h.git
            .calls()
            .contains(&"push origin r1:refs/heads/alice/add-widget-sizing".to_string())
    );

    let created = h.forge.created.lock().unwrap().clone();
    assert_eq!(
        created,
        vec![CreatePullRequest {
            repository_id: "R_1".to_string(),
            base_ref_name: "trunk".to_string(),
            head_ref_name: "alice/add-widget-sizing".to_string(),
            title: "Add widget sizing".to_string(),
            body: "Longer description".to_string(),
            draft: false,
        }]
    );

    match outcome {
        PrOutcome::Created {
            branch,
            pull_request,
            reviews_requested,
            auto_merge,
            ..
        } => {
            assert_eq!(branch, "alice/add-widget-sizing");
            assert_eq!(pull_request.number, 99);
            assert!(!reviews_requested);
            assert_eq!(auto_merge, AutoMerge::NotRequested);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_selected_commit_is_pushed_from_rebased_history() {
    // c3 is newest. Selecting c2 moves it to the front of the rebase, so in
    // the rebased log it sits just above upstream.
    let mut h = Harness::new(vec![
        vec![
            commit("c3", "Third"),
            commit("c2", "Second change"),
            commit("c1", "First"),
        ],
        vec![commit("r3", "Third"), commit("r1", "First"), commit("r2", "Second change")],
    ]);
    h.selector = MemorySelector::new().answer(["c2"]);

    h.run(PrOptions::default()).await.unwrap();

    let calls = h.git.calls();
    assert!(calls.contains(&"rebase origin/main".to_string()));
    assert!(calls.contains(&"push origin r2:refs/heads/alice/second-change".to_string()));

    let (prompt, offered) = &h.selector.calls()[0];
    assert_eq!(prompt, COMMIT_PROMPT);
    assert_eq!(offered.len(), 3);
    assert_eq!(offered[0].id, "c3");
}

#[tokio::test]
async fn test_rebase_failure_aborts_before_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = Harness::new(vec![]);
    h.git = FakeGit::new(dir.path(), vec![vec![commit("c1", "Only")]]).failing_rebase();

    let err = h.run(PrOptions::default()).await.unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to rebase"));
    let calls = h.git.calls();
    let rebase = calls.iter().position(|c| c == "rebase origin/main").unwrap();
    assert_eq!(calls[rebase + 1], "abort");
    assert!(!calls.iter().any(|c| c.starts_with("push")));
    assert!(h.forge.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_existing_pull_request_is_updated() {
    let mut h = Harness::new(vec![
        vec![commit("c1", "Fix Bug: edge case!!")],
        vec![commit("r1", "Fix Bug: edge case!!")],
    ]);
    h.forge.pulls = vec![open_pull(7, "alice/fix-bug-edge-case")];

    let outcome = h.run(PrOptions::default()).await.unwrap();

    match outcome {
        PrOutcome::Updated {
            branch,
            pull_request,
        } => {
            assert_eq!(branch, "alice/fix-bug-edge-case");
            assert_eq!(pull_request.number, 7);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(h.editor.seen.lock().unwrap().is_empty());
    assert!(h.forge.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_title_aborts_without_pull_request() {
    let mut h = Harness::new(vec![
        vec![commit("c1", "Something")],
        vec![commit("r1", "Something")],
    ]);
    h.editor = FakeEditor::writing("\n\nbody only\n");

    let err = h.run(PrOptions::default()).await.unwrap_err();

    assert!(err.to_string().contains("Missing PR title"));
    assert!(h.forge.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_reviewers_are_filtered_and_split() {
    let mut h = Harness::new(vec![
        vec![commit("c1", "Tidy")],
        vec![commit("r1", "Tidy")],
    ]);
    h.config.ignore_assignees = vec!["^bot-".to_string(), "everyone$".to_string()];
    h.forge.assignees = vec![
        assignee(AssigneeKind::User, "U_bob", "bob"),
        assignee(AssigneeKind::User, "U_bot", "bot-ci"),
        assignee(AssigneeKind::Team, "T_core", "acme/core"),
        assignee(AssigneeKind::Team, "T_all", "acme/everyone"),
    ];
    h.selector = MemorySelector::new().answer(["T_core", "U_bob"]);

    let outcome = h.run(PrOptions::default()).await.unwrap();

    let (prompt, offered) = &h.selector.calls()[0];
    assert_eq!(prompt, "Select Assignees:");
    let ids: Vec<&str> = offered.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["U_bob", "T_core"]);

    let reviews = h.forge.reviews.lock().unwrap().clone();
    assert_eq!(
        reviews,
        vec![ReviewRequest {
            pull_request_id: "PR_new".to_string(),
            user_ids: vec!["U_bob".to_string()],
            team_ids: vec!["T_core".to_string()],
        }]
    );

    match outcome {
        PrOutcome::Created {
            reviewers,
            reviews_requested,
            ..
        } => {
            assert!(reviews_requested);
            assert_eq!(reviewers.len(), 2);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_draft_and_auto_merge() {
    let h = Harness::new(vec![vec![commit("c1", "Draft me")], vec![commit("r1", "Draft me")]]);

    let outcome = h
        .run(PrOptions {
            draft: true,
            auto_merge: true,
        })
        .await
        .unwrap();

    assert!(h.forge.created.lock().unwrap()[0].draft);
    assert_eq!(*h.forge.auto_merged.lock().unwrap(), vec!["PR_new".to_string()]);
    assert!(matches!(
        outcome,
        PrOutcome::Created {
            auto_merge: AutoMerge::Enabled,
            ..
        }
    ));
}

#[tokio::test]
async fn test_auto_merge_failure_is_skipped() {
    let mut h = Harness::new(vec![vec![commit("c1", "Merge me")], vec![commit("r1", "Merge me")]]);
    h.forge.auto_merge_fails = true;

    let outcome = h
        .run(PrOptions {
            draft: false,
            auto_merge: true,
        })
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        PrOutcome::Created {
            auto_merge: AutoMerge::Skipped,
            ..
        }
    ));
}

#[tokio::test]
async fn test_no_commits_is_an_error() {
    let h = Harness::new(vec![vec![]]);

    let err = h.run(PrOptions::default()).await.unwrap_err();

    assert!(err.to_string().contains("No commits to push"));
    assert!(!h.git.calls().iter().any(|c| c.starts_with("rebase")));
}

#[tokio::test]
async fn test_empty_selection_is_an_error() {
    let h = Harness::new(vec![vec![commit("c2", "Two"), commit("c1", "One")]]);

    let err = h.run(PrOptions::default()).await.unwrap_err();

    assert!(err.to_string().contains("No commits selected"));
    assert!(!h.git.calls().iter().any(|c| c.starts_with("rebase")));
}

#[tokio::test]
async fn test_unknown_repository_is_an_error() {
    let mut h = Harness::new(vec![vec![commit("c1", "One")]]);
    h.forge.missing_repository = true;

    let err = h.run(PrOptions::default()).await.unwrap_err();

    assert!(err.to_string().contains("acme/widgets"));
}

#[tokio::test]
async fn test_select_commit_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let git = FakeGit::new(
        dir.path(),
        vec![vec![commit("c3", "Three"), commit("c2", "Two"), commit("c1", "One")]],
    );
    let selector = MemorySelector::new().answer(["c1", "c3"]);

    let hashes = select_commit_hashes(&git, &selector).await.unwrap();

    assert_eq!(hashes, vec!["c1", "c3"]);
    assert_eq!(selector.calls()[0].0, "Select commit(s):");
    assert_eq!(git.calls(), vec!["log origin/main"]);
}
