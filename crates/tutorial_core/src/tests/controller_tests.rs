use super::*;

use std::{
    fs,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use git_checkpoint::GitError;
use serde_json::{json, Value};
use shared::{
    domain::{Checkpoint, Position, Tutorial, WebviewState},
    error::ErrorCode,
    protocol::{DataPayload, StatePayload},
};
use storage::MemoryStore;
use tempfile::TempDir;
use test_runner::TestOutcome;

use crate::view::UiSurface;

#[derive(Default)]
struct FakeSurface {
    posted: Mutex<Vec<ViewMessage>>,
    revealed: Mutex<Vec<ViewColumn>>,
    disposed: AtomicBool,
}

impl UiSurface for FakeSurface {
    fn post_message(&self, message: &ViewMessage) -> anyhow::Result<()> {
        self.posted.lock().expect("lock").push(message.clone());
        Ok(())
    }

    fn reveal(&self, column: ViewColumn) {
        self.revealed.lock().expect("lock").push(column);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl FakeSurface {
    fn last_state(&self) -> StatePayload {
        self.posted
            .lock()
            .expect("lock")
            .iter()
            .rev()
            .find_map(|message| match message {
                ViewMessage::SetState(payload) => Some(payload.clone()),
                ViewMessage::SetData(_) => None,
            })
            .expect("a state snapshot was posted")
    }

    fn posted_count(&self) -> usize {
        self.posted.lock().expect("lock").len()
    }
}

struct FakeHost {
    root: PathBuf,
    notices: Mutex<Vec<String>>,
    opened: Mutex<Vec<(PathBuf, ViewColumn)>>,
    surfaces: Mutex<Vec<Arc<FakeSurface>>>,
    layouts: AtomicUsize,
}

impl FakeHost {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            notices: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
            surfaces: Mutex::new(Vec::new()),
            layouts: AtomicUsize::new(0),
        }
    }

    fn notices(&self) -> Vec<String> {
        self.notices.lock().expect("lock").clone()
    }

    fn surface(&self) -> Arc<FakeSurface> {
        self.surfaces
            .lock()
            .expect("lock")
            .last()
            .cloned()
            .expect("a surface was created")
    }

    fn surface_count(&self) -> usize {
        self.surfaces.lock().expect("lock").len()
    }

    fn notice(&self, level: &str, message: &str) {
        self.notices
            .lock()
            .expect("lock")
            .push(format!("{level}: {message}"));
    }
}

#[async_trait]
impl EditorHost for FakeHost {
    fn workspace_root(&self) -> Option<PathBuf> {
        Some(self.root.clone())
    }

    async fn show_information(&self, message: &str) {
        self.notice("info", message);
    }

    async fn show_warning(&self, message: &str) {
        self.notice("warn", message);
    }

    async fn show_error(&self, message: &str) {
        self.notice("error", message);
    }

    async fn set_layout(&self, layout: &EditorLayout) -> anyhow::Result<()> {
        assert_eq!(layout, &EditorLayout::tutorial_split());
        self.layouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_document(&self, path: &Path, column: ViewColumn) -> anyhow::Result<()> {
        self.opened
            .lock()
            .expect("lock")
            .push((path.to_path_buf(), column));
        Ok(())
    }

    async fn create_surface(&self, _column: ViewColumn) -> anyhow::Result<Arc<dyn UiSurface>> {
        let surface = Arc::new(FakeSurface::default());
        self.surfaces.lock().expect("lock").push(surface.clone());
        Ok(surface as Arc<dyn UiSurface>)
    }
}

#[derive(Default)]
struct FakeGit {
    calls: Mutex<Vec<String>>,
    fail_remote: AtomicBool,
    fail_loads: AtomicBool,
}

impl FakeGit {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl GitCheckpoints for FakeGit {
    async fn git_init_if_not_exists(&self) -> Result<(), GitError> {
        self.calls.lock().expect("lock").push("init".to_string());
        Ok(())
    }

    async fn git_setup_remote(&self, uri: &str) -> Result<(), GitError> {
        if self.fail_remote.load(Ordering::SeqCst) {
            return Err(GitError::CommandFailed {
                command: "fetch --quiet tutorial".to_string(),
                stderr: "could not resolve host".to_string(),
            });
        }
        self.calls
            .lock()
            .expect("lock")
            .push(format!("remote {uri}"));
        Ok(())
    }

    async fn load_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), GitError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(GitError::CheckpointFailed {
                checkpoint: checkpoint.id.to_string(),
                reason: "cherry-pick conflict".to_string(),
            });
        }
        self.calls
            .lock()
            .expect("lock")
            .push(format!("load {}", checkpoint.id));
        Ok(())
    }
}

#[derive(Default)]
struct FakeTests {
    outcomes: Mutex<VecDeque<TestOutcome>>,
    runs: AtomicUsize,
}

impl FakeTests {
    fn queue(&self, outcome: TestOutcome) {
        self.outcomes.lock().expect("lock").push_back(outcome);
    }
}

#[async_trait]
impl TestRunner for FakeTests {
    async fn run_tests(&self) -> TestOutcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(TestOutcome::Pass)
    }
}

struct Harness {
    host: Arc<FakeHost>,
    git: Arc<FakeGit>,
    tests: Arc<FakeTests>,
    store: Arc<MemoryStore>,
    controller: Controller,
}

impl Harness {
    fn new(root: &Path) -> Self {
        Self::with_store(root, Arc::new(MemoryStore::default()))
    }

    fn with_store(root: &Path, store: Arc<MemoryStore>) -> Self {
        let host = Arc::new(FakeHost::new(root));
        let git = Arc::new(FakeGit::default());
        let tests = Arc::new(FakeTests::default());
        let controller = Controller::new(Adapters {
            host: host.clone(),
            git: git.clone(),
            tests: tests.clone(),
            store: store.clone(),
        });
        Self {
            host,
            git,
            tests,
            store,
            controller,
        }
    }

    async fn command(&mut self, command: Command) {
        self.controller.handle(Input::Command(command)).await;
    }

    async fn ui(&mut self, raw: &str) {
        self.controller
            .handle(Input::SurfaceMessage(raw.to_string()))
            .await;
    }

    async fn select(&mut self, tutorial: Value) {
        let raw = json!({ "type": "SELECT_TUTORIAL", "payload": tutorial }).to_string();
        self.ui(&raw).await;
    }

    /// Opens the surface and acknowledges it like a real UI would.
    async fn open(&mut self) {
        self.command(Command::Start).await;
        self.ui(r#""WEBVIEW_INITIALIZED""#).await;
    }

    async fn save(&mut self, scheme: &str, language: &str) {
        self.controller
            .handle(Input::DocumentSaved(SavedDocument {
                uri_scheme: scheme.to_string(),
                language_id: language.to_string(),
                path: Some(PathBuf::from("src/index.js")),
            }))
            .await;
    }

    async fn stored(&self, root: &Path) -> Option<Progress> {
        self.store
            .load_progress(&WorkspaceKey::for_root(root))
            .await
            .expect("memory store")
    }
}

fn tutorial_json() -> Value {
    json!({
        "id": "basics",
        "title": "Basics",
        "repo": { "uri": "https://github.com/example/basics.git" },
        "coding_language": "javascript",
        "levels": [
            {
                "id": "L1",
                "title": "Variables",
                "setup": { "id": "L1:SETUP", "commits": ["aaaa01"] },
                "steps": [
                    {
                        "id": "L1:S1",
                        "title": "Declare",
                        "setup": { "id": "L1:S1:SETUP", "commits": ["bbbb01"] },
                        "solution": { "id": "L1:S1:SOLUTION", "commits": ["cccc01"] }
                    },
                    {
                        "id": "L1:S2",
                        "title": "Assign",
                        "solution": { "id": "L1:S2:SOLUTION", "commits": ["cccc02"] }
                    }
                ]
            },
            {
                "id": "L2",
                "title": "Functions",
                "steps": [{ "id": "L2:S1", "title": "Call" }]
            }
        ]
    })
}

fn single_step_json() -> Value {
    json!({
        "id": "tiny",
        "title": "Tiny",
        "repo": { "uri": "https://github.com/example/tiny.git" },
        "levels": [{ "id": "L1", "title": "Only", "steps": [{ "id": "L1:S1", "title": "Only" }] }]
    })
}

#[tokio::test]
async fn start_activates_machine_and_opens_surface() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());

    h.command(Command::Start).await;

    assert!(h.controller.machine.is_active());
    assert_eq!(h.host.surface_count(), 1);
    assert_eq!(h.host.layouts.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.view().status(), SurfaceStatus::Pending);
    assert_eq!(h.controller.state().webview, WebviewState::Initializing);

    h.ui(r#""WEBVIEW_INITIALIZED""#).await;
    assert_eq!(h.controller.view().status(), SurfaceStatus::Ready);
    let snapshot = h.host.surface().last_state();
    assert_eq!(snapshot.state.webview, WebviewState::Ready);
    assert_eq!(snapshot.state.phase, Phase::Idle);
}

#[tokio::test]
async fn selecting_tutorial_launches_and_loads_first_step() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;

    h.select(tutorial_json()).await;

    assert_eq!(
        h.git.calls(),
        vec![
            "init".to_string(),
            "remote https://github.com/example/basics.git".to_string(),
            "load L1:S1:ENTER".to_string(),
        ]
    );
    let state = h.controller.state();
    assert_eq!(state.phase, Phase::StepActive);
    assert_eq!(state.position, Some(Position::new("L1", "L1:S1")));
    assert_eq!(h.controller.save_hook(), Some("javascript"));

    let snapshot = h.host.surface().last_state();
    assert_eq!(snapshot.state.phase, Phase::StepActive);
    assert_eq!(snapshot.data.position, Some(Position::new("L1", "L1:S1")));

    let stored = h.stored(root.path()).await.expect("progress saved");
    assert_eq!(stored.phase, Phase::StepActive);
}

#[tokio::test]
async fn saving_matching_document_runs_tests_and_advances() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    h.select(tutorial_json()).await;

    h.save("file", "javascript").await;

    assert_eq!(h.tests.runs.load(Ordering::SeqCst), 1);
    assert_eq!(h.git.calls().last().map(String::as_str), Some("load L1:S1:PASS"));
    assert_eq!(
        h.controller.state().position,
        Some(Position::new("L1", "L1:S2"))
    );
    assert!(h.host.notices().contains(&"info: PASS".to_string()));

    let stored = h.stored(root.path()).await.expect("progress saved");
    assert_eq!(stored.position, Some(Position::new("L1", "L1:S2")));
}

#[tokio::test]
async fn unrelated_saves_do_not_run_tests() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;

    // No hook before a tutorial with a language is loaded.
    h.save("file", "javascript").await;
    h.select(tutorial_json()).await;
    h.save("untitled", "javascript").await;
    h.save("file", "python").await;

    assert_eq!(h.tests.runs.load(Ordering::SeqCst), 0);
    assert_eq!(h.controller.state().phase, Phase::StepActive);
}

#[tokio::test]
async fn failing_tests_keep_step_and_warn() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    h.select(tutorial_json()).await;
    h.tests.queue(TestOutcome::Fail {
        message: "not ok 1 - declares x".to_string(),
    });

    h.save("file", "javascript").await;

    let state = h.controller.state();
    assert_eq!(state.phase, Phase::StepActive);
    assert_eq!(state.position, Some(Position::new("L1", "L1:S1")));
    assert_eq!(state.test_failure.as_deref(), Some("not ok 1 - declares x"));
    assert!(h.host.notices().contains(&"warn: FAIL".to_string()));
    assert_eq!(
        h.host.surface().last_state().state.test_failure.as_deref(),
        Some("not ok 1 - declares x")
    );
}

#[tokio::test]
async fn checkpoint_failure_keeps_step_and_surfaces_error() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    h.select(tutorial_json()).await;
    let before = h.controller.state().clone();
    h.git.fail_loads.store(true, Ordering::SeqCst);

    h.save("file", "javascript").await;

    let state = h.controller.state();
    assert_eq!(state.phase, Phase::StepActive);
    assert_eq!(state.position, before.position);
    assert_eq!(state.tutorial, before.tutorial);
    let error = state.error.clone().expect("error recorded");
    assert_eq!(error.code, ErrorCode::Adapter);
    assert!(error.message.contains("cherry-pick conflict"));

    assert!(h
        .host
        .notices()
        .iter()
        .any(|notice| notice.starts_with("error: ")));
    assert_eq!(h.host.surface().last_state().state.error, Some(error));

    // Persisted progress still points at the step that failed to advance.
    let stored = h.stored(root.path()).await.expect("progress");
    assert_eq!(stored.position, before.position);
}

#[tokio::test]
async fn non_empty_workspace_blocks_launch() {
    let root = TempDir::new().expect("workspace");
    fs::write(root.path().join("notes.txt"), "mine").expect("write");
    let mut h = Harness::new(root.path());
    h.open().await;

    h.select(tutorial_json()).await;

    assert!(h.git.calls().is_empty());
    let state = h.controller.state();
    assert_eq!(state.phase, Phase::Idle);
    assert!(state.tutorial.is_none());
    assert_eq!(
        state.error.as_ref().map(|e| e.code),
        Some(ErrorCode::Precondition)
    );
    assert!(h.stored(root.path()).await.is_none());

    // Selecting again once the folder is empty retries the launch.
    fs::remove_file(root.path().join("notes.txt")).expect("remove");
    h.select(tutorial_json()).await;
    assert_eq!(h.controller.state().phase, Phase::StepActive);
    assert_eq!(h.controller.state().error, None);
}

#[tokio::test]
async fn missing_repo_uri_is_a_precondition_error() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;

    let mut tutorial = tutorial_json();
    tutorial["repo"] = Value::Null;
    h.select(tutorial).await;

    assert!(h.git.calls().is_empty());
    let state = h.controller.state();
    assert_eq!(state.phase, Phase::Idle);
    let error = state.error.clone().expect("error");
    assert_eq!(error.code, ErrorCode::Precondition);
    assert!(error.message.contains("uri"));
    assert!(h.stored(root.path()).await.is_none());
}

#[tokio::test]
async fn remote_failure_leaves_machine_idle_and_unsaved() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    h.git.fail_remote.store(true, Ordering::SeqCst);

    h.select(tutorial_json()).await;

    let state = h.controller.state();
    assert_eq!(state.phase, Phase::Idle);
    assert!(state.tutorial.is_none());
    assert_eq!(state.error.as_ref().map(|e| e.code), Some(ErrorCode::Adapter));
    assert_eq!(h.host.surface().last_state().state.phase, Phase::Idle);
    assert!(h.stored(root.path()).await.is_none());

    h.git.fail_remote.store(false, Ordering::SeqCst);
    h.select(tutorial_json()).await;
    assert_eq!(h.controller.state().phase, Phase::StepActive);
}

#[tokio::test]
async fn invalid_tutorial_is_rejected_without_side_effects() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;

    let mut tutorial = tutorial_json();
    tutorial["levels"][0]["steps"][0]["solution"]["commits"] = json!(["HEAD~1"]);
    h.select(tutorial).await;

    assert!(h.git.calls().is_empty());
    let state = h.controller.state();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.error.as_ref().map(|e| e.code), Some(ErrorCode::Protocol));
}

#[tokio::test]
async fn malformed_ui_messages_are_dropped() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    let posted = h.host.surface().posted_count();

    h.ui("{broken").await;
    h.ui(r#"{"type":"SELECT_TUTORIAL","payload":{"id":3}}"#).await;

    assert_eq!(h.host.surface().posted_count(), posted);
    assert_eq!(h.controller.state().phase, Phase::Idle);
    assert!(h.host.notices().is_empty());
}

#[tokio::test]
async fn unknown_actions_are_published() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    let mut passthrough = h.controller.subscribe_passthrough();

    h.ui(r#"{"type":"ANALYTICS","payload":{"panel":"intro"}}"#).await;

    let action = passthrough.try_recv().expect("published action");
    assert_eq!(action.kind, "ANALYTICS");
    assert_eq!(action.payload, Some(json!({ "panel": "intro" })));
}

#[tokio::test]
async fn second_start_with_ready_surface_only_notifies() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;

    h.command(Command::Start).await;

    assert_eq!(h.host.surface_count(), 1);
    assert_eq!(
        h.host.notices(),
        vec!["info: Tutorial already open".to_string()]
    );
    assert_eq!(h.controller.state().webview, WebviewState::Ready);
}

#[tokio::test]
async fn start_before_acknowledgement_restarts_existing_surface() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.command(Command::Start).await;

    h.command(Command::Start).await;

    assert_eq!(h.host.surface_count(), 1);
    assert_eq!(h.controller.state().webview, WebviewState::Restarting);
    assert_eq!(
        *h.host.surface().revealed.lock().expect("lock"),
        vec![ViewColumn::Two]
    );
}

#[tokio::test]
async fn disposed_surface_is_recreated_on_start() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    h.select(tutorial_json()).await;

    h.host.surface().disposed.store(true, Ordering::SeqCst);
    h.controller.handle(Input::SurfaceDisposed).await;
    assert_eq!(h.controller.view().status(), SurfaceStatus::Missing);

    h.command(Command::Start).await;
    assert_eq!(h.host.surface_count(), 2);
    assert_eq!(h.controller.state().webview, WebviewState::Restarting);
    // Progress survives the surface going away.
    assert_eq!(h.controller.state().phase, Phase::StepActive);

    h.ui(r#""WEBVIEW_INITIALIZED""#).await;
    let snapshot = h.host.surface().last_state();
    assert_eq!(snapshot.state.webview, WebviewState::Ready);
    assert_eq!(snapshot.data.position, Some(Position::new("L1", "L1:S1")));
}

#[tokio::test]
async fn open_file_stays_inside_workspace() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;

    h.command(Command::OpenFile {
        relative_path: "src/index.js".to_string(),
    })
    .await;
    h.command(Command::OpenFile {
        relative_path: "../outside.js".to_string(),
    })
    .await;
    h.command(Command::OpenFile {
        relative_path: "/etc/passwd".to_string(),
    })
    .await;

    assert_eq!(
        *h.host.opened.lock().expect("lock"),
        vec![(root.path().join("src/index.js"), ViewColumn::One)]
    );
    assert_eq!(
        *h.host.surface().revealed.lock().expect("lock"),
        vec![ViewColumn::Two]
    );
    assert!(h.host.notices().is_empty());
}

#[tokio::test]
async fn send_commands_post_directly_to_surface() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    let posted = h.host.surface().posted_count();

    h.command(Command::SendData(DataPayload {
        data: json!({ "hint": "use let" }),
    }))
    .await;

    let surface = h.host.surface();
    assert_eq!(surface.posted_count(), posted + 1);
    assert_eq!(
        surface.posted.lock().expect("lock").last(),
        Some(&ViewMessage::SetData(DataPayload {
            data: json!({ "hint": "use let" })
        }))
    );
}

#[tokio::test]
async fn run_test_and_notification_commands() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    h.select(tutorial_json()).await;

    h.command(Command::TestFail).await;
    h.command(Command::RunTest).await;

    assert_eq!(h.tests.runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.controller.state().position,
        Some(Position::new("L1", "L1:S2"))
    );
    assert_eq!(
        h.host.notices(),
        vec!["warn: FAIL".to_string(), "info: PASS".to_string()]
    );
}

#[tokio::test]
async fn completing_tutorial_clears_saved_progress() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    h.select(single_step_json()).await;
    assert!(h.stored(root.path()).await.is_some());

    h.ui(r#""TEST_PASS""#).await;

    assert_eq!(h.controller.state().phase, Phase::TutorialComplete);
    assert!(h.stored(root.path()).await.is_none());
}

#[tokio::test]
async fn progress_is_restored_for_same_workspace() {
    let root = TempDir::new().expect("workspace");
    let store = Arc::new(MemoryStore::default());
    {
        let mut first = Harness::with_store(root.path(), store.clone());
        first.open().await;
        first.select(tutorial_json()).await;
        first.save("file", "javascript").await;
    }

    let mut second = Harness::with_store(root.path(), store);
    second.command(Command::Start).await;

    let state = second.controller.state();
    assert_eq!(state.phase, Phase::StepActive);
    assert_eq!(state.position, Some(Position::new("L1", "L1:S2")));
    assert_eq!(second.controller.save_hook(), Some("javascript"));
    assert!(second.git.calls().is_empty());
}

#[tokio::test]
async fn reset_clears_progress_and_starts_fresh() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    h.open().await;
    h.select(tutorial_json()).await;

    h.command(Command::Reset).await;

    let state = h.controller.state();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.tutorial, None);
    assert_eq!(state.webview, WebviewState::Ready);
    assert_eq!(h.controller.save_hook(), None);
    assert!(h.stored(root.path()).await.is_none());
    assert_eq!(h.host.surface().last_state().state.phase, Phase::Idle);
}

#[tokio::test]
async fn refresh_requires_activation_and_reposts_state() {
    let root = TempDir::new().expect("workspace");
    let mut h = Harness::new(root.path());
    assert!(matches!(
        h.controller.refresh(),
        Err(CoreError::Machine(MachineError::NotActive))
    ));

    h.open().await;
    let surface = h.host.surface();
    let before = surface.posted_count();
    h.controller.refresh().expect("refresh");
    h.controller.refresh().expect("refresh");

    let posted = surface.posted.lock().expect("lock");
    assert_eq!(posted.len(), before + 2);
    assert_eq!(posted[posted.len() - 1], posted[posted.len() - 2]);
}

#[tokio::test]
async fn spawned_controller_processes_submitted_inputs() {
    let root = TempDir::new().expect("workspace");
    let h = Harness::new(root.path());
    let host = h.host.clone();

    let (handle, task) = h.controller.spawn();
    assert!(handle.submit(Input::Command(Command::Start)).await);
    assert!(
        handle
            .submit(Input::SurfaceMessage(r#""WEBVIEW_INITIALIZED""#.to_string()))
            .await
    );
    drop(handle);
    task.await.expect("controller task");

    assert_eq!(host.surface_count(), 1);
    assert_eq!(host.surface().last_state().state.webview, WebviewState::Ready);
}

#[test]
fn tutorial_fixture_is_valid() {
    let tutorial: Tutorial = serde_json::from_value(tutorial_json()).expect("tutorial");
    assert_eq!(tutorial.levels.len(), 2);
    assert!(serde_json::from_value::<Tutorial>(single_step_json()).is_ok());
}
