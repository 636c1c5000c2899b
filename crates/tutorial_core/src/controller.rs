//! Controller actor: owns the machine, the view channel and the adapters, and
//! processes inputs one at a time so adapter calls never overlap.

use std::{
    collections::VecDeque,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use git_checkpoint::{is_empty_workspace, GitCheckpoints};
use shared::{
    domain::{MachineState, Phase, Progress, TutorialRepo},
    error::{MachineError, PreconditionError, ReportedError},
    protocol::{Action, ViewMessage},
};
use storage::{ProgressStore, WorkspaceKey};
use test_runner::TestRunner;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    commands::Command,
    error::CoreError,
    host::{EditorHost, EditorLayout, SavedDocument, ViewColumn},
    machine::{Event, FollowUp, Transition, TutorialMachine},
    view::{SurfaceStatus, ViewChannel},
};

const INPUT_QUEUE_CAPACITY: usize = 256;
const PASSTHROUGH_CAPACITY: usize = 64;

pub struct Adapters {
    pub host: Arc<dyn EditorHost>,
    pub git: Arc<dyn GitCheckpoints>,
    pub tests: Arc<dyn TestRunner>,
    pub store: Arc<dyn ProgressStore>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(Command),
    DocumentSaved(SavedDocument),
    SurfaceMessage(String),
    SurfaceDisposed,
}

#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Input>,
}

impl ControllerHandle {
    /// Queues an input. Returns `false` once the controller has stopped.
    pub async fn submit(&self, input: Input) -> bool {
        match self.tx.send(input).await {
            Ok(()) => true,
            Err(_) => {
                warn!("tutorial controller is no longer running; input dropped");
                false
            }
        }
    }
}

pub struct Controller {
    machine: TutorialMachine,
    view: ViewChannel,
    adapters: Adapters,
    workspace_key: WorkspaceKey,
    save_hook: Option<String>,
    passthrough: broadcast::Sender<Action>,
}

impl Controller {
    pub fn new(adapters: Adapters) -> Self {
        let workspace_key = adapters
            .host
            .workspace_root()
            .map(|root| WorkspaceKey::for_root(&root))
            .unwrap_or_else(|| WorkspaceKey::from("no-workspace"));
        let (passthrough, _) = broadcast::channel(PASSTHROUGH_CAPACITY);
        Self {
            machine: TutorialMachine::new(),
            view: ViewChannel::new(),
            adapters,
            workspace_key,
            save_hook: None,
            passthrough,
        }
    }

    pub fn state(&self) -> &MachineState {
        self.machine.state()
    }

    pub fn view(&self) -> &ViewChannel {
        &self.view
    }

    pub fn save_hook(&self) -> Option<&str> {
        self.save_hook.as_deref()
    }

    /// Actions the machine does not handle are published here.
    pub fn subscribe_passthrough(&self) -> broadcast::Receiver<Action> {
        self.passthrough.subscribe()
    }

    pub fn spawn(self) -> (ControllerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);
        let task = tokio::spawn(self.run(rx));
        (ControllerHandle { tx }, task)
    }

    pub async fn run(mut self, mut inputs: mpsc::Receiver<Input>) {
        info!("tutorial controller started");
        while let Some(input) = inputs.recv().await {
            self.handle(input).await;
        }
        info!("tutorial controller stopped");
    }

    /// Processes one input to completion. Errors are reported, never propagated.
    pub async fn handle(&mut self, input: Input) {
        let result = match input {
            Input::Command(command) => self.dispatch(command).await,
            Input::DocumentSaved(document) => self.document_saved(document).await,
            Input::SurfaceMessage(raw) => match self.view.receive(&raw) {
                Some(action) => self.dispatch(Command::ReceiveAction(action)).await,
                None => Ok(()),
            },
            Input::SurfaceDisposed => {
                debug!("ui surface disposed");
                self.view.detach();
                Ok(())
            }
        };

        if let Err(err) = result {
            self.report(&err).await;
        }
    }

    pub async fn dispatch(&mut self, command: Command) -> Result<(), CoreError> {
        debug!(command = command.name(), "dispatching command");
        match command {
            Command::Start => self.start().await,
            Command::OpenWebview { column } => self.open_webview(column).await,
            Command::TutorialLaunch { repo } => {
                self.launch_tutorial(repo.as_ref()).await?;
                self.send(Event::TutorialLoaded).await
            }
            Command::TutorialSetup { coding_language } => {
                self.register_save_hook(coding_language);
                Ok(())
            }
            Command::OpenFile { relative_path } => {
                self.open_file(&relative_path).await;
                Ok(())
            }
            Command::SendState(payload) => {
                self.view.post_message(&ViewMessage::SetState(payload));
                Ok(())
            }
            Command::SendData(payload) => {
                self.view.post_message(&ViewMessage::SetData(payload));
                Ok(())
            }
            Command::ReceiveAction(action) => match Event::from_action(action) {
                Ok(event) => self.send(event).await,
                Err(err) => {
                    warn!(error = %err, "dropping malformed ui action");
                    Ok(())
                }
            },
            Command::RunTest => {
                let event = self.run_tests().await;
                self.send(event).await
            }
            Command::TestPass => {
                self.notify_test_result(true).await;
                Ok(())
            }
            Command::TestFail => {
                self.notify_test_result(false).await;
                Ok(())
            }
            Command::Reset => self.reset().await,
        }
    }

    /// Loads persisted progress for this workspace, or starts fresh.
    pub async fn activate(&mut self) -> Result<(), CoreError> {
        if self.machine.is_active() {
            return Err(MachineError::AlreadyActive.into());
        }

        let restored = match self.adapters.store.load_progress(&self.workspace_key).await {
            Ok(progress) => progress,
            Err(err) => {
                warn!(error = %err, "failed to restore tutorial progress; starting fresh");
                None
            }
        };

        let state = self.machine.activate(restored)?;
        let language = if state.phase.is_tutorial_active() {
            state
                .tutorial
                .as_ref()
                .and_then(|tutorial| tutorial.coding_language.clone())
        } else {
            None
        };
        info!(phase = %state.phase, "tutorial machine activated");

        if let Some(language) = language {
            self.register_save_hook(language);
        }
        Ok(())
    }

    /// Feeds an event to the machine, runs its workspace launch and checkpoint,
    /// commits, and then runs follow-ups. Events produced by follow-ups are handled
    /// before this returns.
    pub async fn send(&mut self, event: Event) -> Result<(), CoreError> {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            if event == Event::WebviewInitialized {
                self.view.mark_ready();
            }

            match self.machine.plan(event)? {
                Transition::Ignored { event, phase } => {
                    debug!(%event, %phase, "event not applicable in current phase");
                }
                Transition::PassThrough(action) => {
                    debug!(action = %action.kind, "passing action through");
                    let _ = self.passthrough.send(action);
                }
                Transition::Rejected(error) => {
                    warn!(error = %error.message, "transition rejected");
                    self.fail_transition(error).await;
                }
                Transition::Next(plan) => {
                    if plan.launch {
                        let repo = plan.next.tutorial.as_ref().and_then(|t| t.repo.as_ref());
                        if let Err(err) = self.launch_tutorial(repo).await {
                            warn!(
                                event = %plan.event,
                                error = %err,
                                "tutorial launch failed; transition aborted"
                            );
                            self.fail_transition(err.reported()).await;
                            continue;
                        }
                    }
                    if let Some(checkpoint) = &plan.checkpoint {
                        if let Err(err) = self.adapters.git.load_checkpoint(checkpoint).await {
                            warn!(
                                event = %plan.event,
                                checkpoint = %checkpoint.id,
                                error = %err,
                                "checkpoint load failed; transition aborted"
                            );
                            self.fail_transition(CoreError::from(err).reported()).await;
                            continue;
                        }
                    }

                    let before = self.machine.state().progress();
                    let event = plan.event.clone();
                    let follow_ups = self.machine.commit(*plan);
                    info!(%event, phase = %self.machine.state().phase, "transition committed");

                    self.persist(before).await;
                    self.post_snapshot();

                    for follow_up in follow_ups {
                        if let Some(next) = self.follow_up(follow_up).await {
                            queue.push_back(next);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-posts the current state without changing it.
    pub fn refresh(&self) -> Result<(), CoreError> {
        let snapshot = self.machine.refresh()?;
        self.view.post_message(&snapshot);
        Ok(())
    }

    pub async fn document_saved(&mut self, document: SavedDocument) -> Result<(), CoreError> {
        let Some(language) = self.save_hook.as_deref() else {
            return Ok(());
        };
        if !document.is_file() || document.language_id != language {
            return Ok(());
        }
        debug!(path = ?document.path, "tutorial document saved; running tests");
        self.send(Event::TestRun).await
    }

    async fn start(&mut self) -> Result<(), CoreError> {
        let restarting = match self.view.status() {
            SurfaceStatus::Ready => {
                self.adapters
                    .host
                    .show_information("Tutorial already open")
                    .await;
                return Ok(());
            }
            SurfaceStatus::Pending => true,
            SurfaceStatus::Missing => self.machine.is_active(),
        };

        if !self.machine.is_active() {
            self.activate().await?;
        }
        self.send(Event::WebviewOpened { restarting }).await?;
        self.open_webview(ViewColumn::Two).await
    }

    async fn open_webview(&mut self, column: ViewColumn) -> Result<(), CoreError> {
        if let Err(err) = self
            .adapters
            .host
            .set_layout(&EditorLayout::tutorial_split())
            .await
        {
            warn!(error = %err, "failed to apply tutorial layout");
        }

        if let Some(surface) = self.view.surface() {
            surface.reveal(column);
            return Ok(());
        }

        let surface = self
            .adapters
            .host
            .create_surface(column)
            .await
            .map_err(CoreError::Host)?;
        self.view.attach(surface);
        Ok(())
    }

    async fn launch_tutorial(&self, repo: Option<&TutorialRepo>) -> Result<(), CoreError> {
        let root = self
            .adapters
            .host
            .workspace_root()
            .ok_or(PreconditionError::NoWorkspaceRoot)?;
        let uri = repo
            .map(|repo| repo.uri.trim())
            .filter(|uri| !uri.is_empty())
            .ok_or(PreconditionError::MissingTutorialUri)?;
        if !is_empty_workspace(&root).await? {
            return Err(PreconditionError::WorkspaceNotEmpty(root).into());
        }

        self.adapters.git.git_init_if_not_exists().await?;
        self.adapters.git.git_setup_remote(uri).await?;

        info!(uri, "tutorial repository ready");
        Ok(())
    }

    fn register_save_hook(&mut self, coding_language: String) {
        info!(language = %coding_language, "running tests on save");
        self.save_hook = Some(coding_language);
    }

    async fn open_file(&self, relative_path: &str) {
        let path = match self.resolve_workspace_path(relative_path) {
            Ok(path) => path,
            Err(err) => {
                warn!(relative_path, error = %err, "failed to open file");
                return;
            }
        };
        if let Err(err) = self
            .adapters
            .host
            .open_document(&path, ViewColumn::One)
            .await
        {
            warn!(path = %path.display(), error = %err, "failed to open file");
            return;
        }
        // Opening a document can push the tutorial panel behind it.
        if let Some(surface) = self.view.surface() {
            surface.reveal(ViewColumn::Two);
        }
    }

    fn resolve_workspace_path(&self, relative_path: &str) -> Result<PathBuf, PreconditionError> {
        let root = self
            .adapters
            .host
            .workspace_root()
            .ok_or(PreconditionError::NoWorkspaceRoot)?;
        let relative = Path::new(relative_path);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if relative_path.trim().is_empty() || escapes {
            return Err(PreconditionError::PathOutsideWorkspace(
                relative_path.to_string(),
            ));
        }
        Ok(root.join(relative))
    }

    async fn run_tests(&self) -> Event {
        test_runner::run(
            self.adapters.tests.as_ref(),
            || Event::TestPass,
            |message| Event::TestFail {
                message: Some(message),
            },
        )
        .await
    }

    async fn notify_test_result(&self, passed: bool) {
        if passed {
            self.adapters.host.show_information("PASS").await;
        } else {
            self.adapters.host.show_warning("FAIL").await;
        }
    }

    async fn reset(&mut self) -> Result<(), CoreError> {
        self.adapters
            .store
            .clear_progress(&self.workspace_key)
            .await
            .map_err(CoreError::Storage)?;
        self.machine.reset();
        self.save_hook = None;
        self.activate().await?;
        info!("tutorial progress reset");
        self.refresh()
    }

    async fn follow_up(&mut self, follow_up: FollowUp) -> Option<Event> {
        match follow_up {
            FollowUp::FinishLoading => Some(Event::TutorialLoaded),
            FollowUp::RegisterSaveHook(language) => {
                self.register_save_hook(language);
                None
            }
            FollowUp::RunTests => Some(self.run_tests().await),
            FollowUp::NotifyPass => {
                self.notify_test_result(true).await;
                None
            }
            FollowUp::NotifyFail => {
                self.notify_test_result(false).await;
                None
            }
        }
    }

    async fn fail_transition(&mut self, error: ReportedError) {
        self.adapters.host.show_error(&error.message).await;
        self.machine.abort(error);
        self.post_snapshot();
    }

    async fn persist(&self, before: Option<Progress>) {
        let state = self.machine.state();
        let after = state.progress();
        if after == before {
            return;
        }

        let result = match after {
            Some(progress) if state.phase != Phase::TutorialComplete => {
                self.adapters
                    .store
                    .save_progress(&self.workspace_key, &progress)
                    .await
            }
            _ => self.adapters.store.clear_progress(&self.workspace_key).await,
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to persist tutorial progress");
        }
    }

    fn post_snapshot(&self) {
        self.view.post_message(&self.machine.snapshot());
    }

    async fn report(&self, err: &CoreError) {
        match err {
            CoreError::Protocol(_) => warn!(error = %err, "protocol error; input dropped"),
            _ => {
                warn!(error = %err, code = ?err.code(), "command failed");
                self.adapters.host.show_error(&err.to_string()).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
