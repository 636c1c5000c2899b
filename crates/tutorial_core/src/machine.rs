//! Tutorial progression state machine.
//!
//! Transitions are computed as a [`Plan`] without touching the current state.
//! The controller runs the plan's workspace launch and checkpoint first and
//! only then commits it, so a failed git operation leaves the machine where
//! it was.
//! Statuses only move forward: every status change goes through [`promote`].

use std::collections::HashSet;

use serde::Deserialize;
use shared::{
    domain::{
        Checkpoint, Level, LevelId, MachineState, Phase, Position, Progress, Status, Step,
        Tutorial, WebviewState,
    },
    error::{ErrorCode, MachineError, ProtocolError, ReportedError},
    protocol::{Action, StatePayload, ViewMessage},
};

pub const SELECT_TUTORIAL: &str = "SELECT_TUTORIAL";
pub const TUTORIAL_LOADED: &str = "TUTORIAL_LOADED";
pub const WEBVIEW_INITIALIZED: &str = "WEBVIEW_INITIALIZED";
pub const TEST_RUN: &str = "TEST_RUN";
pub const TEST_PASS: &str = "TEST_PASS";
pub const TEST_FAIL: &str = "TEST_FAIL";

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SelectTutorial(Box<Tutorial>),
    TutorialLoaded,
    WebviewOpened { restarting: bool },
    WebviewInitialized,
    TestRun,
    TestPass,
    TestFail { message: Option<String> },
    PassThrough(Action),
}

#[derive(Debug, Default, Deserialize)]
struct TestFailPayload {
    #[serde(default)]
    message: Option<String>,
}

impl Event {
    /// Maps a UI action onto a machine event. Unknown action types become
    /// [`Event::PassThrough`]; known types with unusable payloads are errors.
    pub fn from_action(action: Action) -> Result<Self, ProtocolError> {
        let event = match action.kind.as_str() {
            SELECT_TUTORIAL => Event::SelectTutorial(Box::new(action.payload_as()?)),
            TUTORIAL_LOADED => Event::TutorialLoaded,
            WEBVIEW_INITIALIZED => Event::WebviewInitialized,
            TEST_RUN => Event::TestRun,
            TEST_PASS => Event::TestPass,
            TEST_FAIL => {
                let payload: Option<TestFailPayload> = action.payload_as()?;
                Event::TestFail {
                    message: payload.and_then(|p| p.message),
                }
            }
            _ => Event::PassThrough(action),
        };
        Ok(event)
    }

    pub fn name(&self) -> &str {
        match self {
            Event::SelectTutorial(_) => SELECT_TUTORIAL,
            Event::TutorialLoaded => TUTORIAL_LOADED,
            Event::WebviewOpened { .. } => "WEBVIEW_OPENED",
            Event::WebviewInitialized => WEBVIEW_INITIALIZED,
            Event::TestRun => TEST_RUN,
            Event::TestPass => TEST_PASS,
            Event::TestFail { .. } => TEST_FAIL,
            Event::PassThrough(action) => action.kind.as_str(),
        }
    }
}

/// Work the controller performs after a plan is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// The workspace is prepared; continue with `TUTORIAL_LOADED`.
    FinishLoading,
    RegisterSaveHook(String),
    RunTests,
    NotifyPass,
    NotifyFail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub event: String,
    pub next: MachineState,
    /// Prepare the workspace for `next.tutorial` before commit.
    pub launch: bool,
    /// Materialized before commit; failure aborts the whole plan.
    pub checkpoint: Option<Checkpoint>,
    pub follow_ups: Vec<FollowUp>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Next(Box<Plan>),
    Ignored { event: String, phase: Phase },
    Rejected(ReportedError),
    PassThrough(Action),
}

#[derive(Debug, Default)]
pub struct TutorialMachine {
    state: MachineState,
    active: bool,
}

impl TutorialMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Starts the machine from restored progress, or fresh when `None`.
    pub fn activate(&mut self, restored: Option<Progress>) -> Result<&MachineState, MachineError> {
        if self.active {
            return Err(MachineError::AlreadyActive);
        }

        let mut state = MachineState {
            webview: self.state.webview,
            ..MachineState::default()
        };
        if let Some(progress) = restored {
            state.tutorial = Some(progress.tutorial);
            state.position = progress.position;
            // A test run never survives a restart.
            state.phase = match progress.phase {
                Phase::TestRunning => Phase::StepActive,
                phase => phase,
            };
        }

        self.state = state;
        self.active = true;
        Ok(&self.state)
    }

    /// Drops all progress and deactivates the machine so it can be activated again.
    pub fn reset(&mut self) {
        self.state = MachineState {
            webview: self.state.webview,
            ..MachineState::default()
        };
        self.active = false;
    }

    /// Current state as a `SET_STATE` message. Never mutates.
    pub fn refresh(&self) -> Result<ViewMessage, MachineError> {
        if !self.active {
            return Err(MachineError::NotActive);
        }
        Ok(self.snapshot())
    }

    pub fn snapshot(&self) -> ViewMessage {
        ViewMessage::SetState(StatePayload::from(&self.state))
    }

    pub fn plan(&self, event: Event) -> Result<Transition, MachineError> {
        if !self.active {
            return Err(MachineError::NotActive);
        }

        let name = event.name().to_string();
        let phase = self.state.phase;
        let ignored = || Transition::Ignored {
            event: name.clone(),
            phase,
        };

        let transition = match event {
            Event::PassThrough(action) => Transition::PassThrough(action),
            Event::SelectTutorial(tutorial) => match phase {
                Phase::Idle | Phase::TutorialLoading | Phase::TutorialComplete => {
                    self.plan_select(*tutorial)
                }
                _ => ignored(),
            },
            Event::TutorialLoaded => match phase {
                Phase::TutorialLoading => self.plan_loaded().unwrap_or_else(ignored),
                _ => ignored(),
            },
            Event::WebviewOpened { restarting } => {
                let webview = if restarting {
                    WebviewState::Restarting
                } else {
                    WebviewState::Initializing
                };
                self.plan_webview(&name, webview)
            }
            Event::WebviewInitialized => self.plan_webview(&name, WebviewState::Ready),
            Event::TestRun => match phase {
                Phase::StepActive => {
                    let mut next = self.next_state();
                    next.phase = Phase::TestRunning;
                    next.test_failure = None;
                    Transition::Next(Box::new(Plan {
                        event: name.clone(),
                        next,
                        launch: false,
                        checkpoint: None,
                        follow_ups: vec![FollowUp::RunTests],
                    }))
                }
                _ => ignored(),
            },
            Event::TestPass => match phase {
                Phase::StepActive | Phase::TestRunning => {
                    self.plan_test_pass().unwrap_or_else(ignored)
                }
                _ => ignored(),
            },
            Event::TestFail { message } => match phase {
                Phase::StepActive | Phase::TestRunning => {
                    let mut next = self.next_state();
                    next.phase = Phase::StepActive;
                    next.test_failure = Some(message.unwrap_or_else(|| "tests failed".to_string()));
                    Transition::Next(Box::new(Plan {
                        event: name.clone(),
                        next,
                        launch: false,
                        checkpoint: None,
                        follow_ups: vec![FollowUp::NotifyFail],
                    }))
                }
                _ => ignored(),
            },
        };
        Ok(transition)
    }

    /// Replaces the state with the plan's target state and hands back the follow-ups.
    pub fn commit(&mut self, plan: Plan) -> Vec<FollowUp> {
        self.state = plan.next;
        plan.follow_ups
    }

    /// Records a failed transition. An interrupted test cycle falls back to
    /// `STEP_ACTIVE` so the step can be retried.
    pub fn abort(&mut self, error: ReportedError) {
        if self.state.phase == Phase::TestRunning {
            self.state.phase = Phase::StepActive;
        }
        self.state.error = Some(error);
    }

    fn next_state(&self) -> MachineState {
        MachineState {
            error: None,
            ..self.state.clone()
        }
    }

    fn plan_webview(&self, event: &str, webview: WebviewState) -> Transition {
        let mut next = self.state.clone();
        next.webview = webview;
        Transition::Next(Box::new(Plan {
            event: event.to_string(),
            next,
            launch: false,
            checkpoint: None,
            follow_ups: Vec::new(),
        }))
    }

    fn plan_select(&self, mut tutorial: Tutorial) -> Transition {
        if let Err(reason) = validate_tutorial(&tutorial) {
            return Transition::Rejected(ReportedError::new(ErrorCode::Protocol, reason));
        }
        for level in &mut tutorial.levels {
            level.status = Status::Incomplete;
            for step in &mut level.steps {
                step.status = Status::Incomplete;
            }
        }

        let next = MachineState {
            tutorial: Some(tutorial),
            position: None,
            phase: Phase::TutorialLoading,
            webview: self.state.webview,
            error: None,
            test_failure: None,
        };
        Transition::Next(Box::new(Plan {
            event: SELECT_TUTORIAL.to_string(),
            next,
            launch: true,
            checkpoint: None,
            follow_ups: vec![FollowUp::FinishLoading],
        }))
    }

    fn plan_loaded(&self) -> Option<Transition> {
        let mut tutorial = self.state.tutorial.clone()?;
        let first = tutorial.first_position()?;

        let mut checkpoints = Vec::new();
        let level = level_mut(&mut tutorial, &first.level_id)?;
        promote(&mut level.status, Status::Active);
        checkpoints.extend(level.setup.clone());
        let step = step_mut(&mut tutorial, &first)?;
        promote(&mut step.status, Status::Active);
        checkpoints.extend(step.setup.clone());

        let mut follow_ups = Vec::new();
        if let Some(language) = tutorial.coding_language.clone() {
            follow_ups.push(FollowUp::RegisterSaveHook(language));
        }

        let mut next = self.next_state();
        next.test_failure = None;
        next.tutorial = Some(tutorial);
        next.position = Some(first.clone());
        next.phase = Phase::StepActive;

        Some(Transition::Next(Box::new(Plan {
            event: TUTORIAL_LOADED.to_string(),
            next,
            launch: false,
            checkpoint: merge_checkpoints(&format!("{}:ENTER", first.step_id), &checkpoints),
            follow_ups,
        })))
    }

    fn plan_test_pass(&self) -> Option<Transition> {
        let mut tutorial = self.state.tutorial.clone()?;
        let current = self.state.position.clone()?;

        let mut checkpoints = Vec::new();
        let step = step_mut(&mut tutorial, &current)?;
        promote(&mut step.status, Status::Complete);
        checkpoints.extend(step.solution.clone());

        let mut next = self.next_state();
        next.test_failure = None;

        match tutorial.next_position(&current) {
            Some(upcoming) => {
                if upcoming.level_id != current.level_id {
                    complete_levels_between(&mut tutorial, &current.level_id, &upcoming.level_id);
                    let level = level_mut(&mut tutorial, &upcoming.level_id)?;
                    promote(&mut level.status, Status::Active);
                    checkpoints.extend(level.setup.clone());
                }
                let step = step_mut(&mut tutorial, &upcoming)?;
                promote(&mut step.status, Status::Active);
                checkpoints.extend(step.setup.clone());

                next.position = Some(upcoming);
                next.phase = Phase::StepActive;
            }
            None => {
                for level in &mut tutorial.levels {
                    if level.steps.iter().all(|s| s.status == Status::Complete) {
                        promote(&mut level.status, Status::Complete);
                    }
                }
                next.position = None;
                next.phase = Phase::TutorialComplete;
            }
        }
        next.tutorial = Some(tutorial);

        Some(Transition::Next(Box::new(Plan {
            event: TEST_PASS.to_string(),
            next,
            launch: false,
            checkpoint: merge_checkpoints(&format!("{}:PASS", current.step_id), &checkpoints),
            follow_ups: vec![FollowUp::NotifyPass],
        })))
    }
}

/// Moves `status` forward to `to`; never moves it back.
fn promote(status: &mut Status, to: Status) {
    if to.rank() > status.rank() {
        *status = to;
    }
}

fn level_mut<'a>(tutorial: &'a mut Tutorial, id: &LevelId) -> Option<&'a mut Level> {
    tutorial.levels.iter_mut().find(|level| &level.id == id)
}

fn step_mut<'a>(tutorial: &'a mut Tutorial, position: &Position) -> Option<&'a mut Step> {
    level_mut(tutorial, &position.level_id)?
        .steps
        .iter_mut()
        .find(|step| step.id == position.step_id)
}

/// Completes `from` and any step-less levels skipped on the way to `to`.
fn complete_levels_between(tutorial: &mut Tutorial, from: &LevelId, to: &LevelId) {
    let (Some(start), Some(end)) = (tutorial.level_index(from), tutorial.level_index(to)) else {
        return;
    };
    for level in &mut tutorial.levels[start..end] {
        promote(&mut level.status, Status::Complete);
    }
}

fn merge_checkpoints(id: &str, parts: &[Checkpoint]) -> Option<Checkpoint> {
    let merged = Checkpoint::merged(id, parts);
    (!merged.is_empty()).then_some(merged)
}

fn validate_tutorial(tutorial: &Tutorial) -> Result<(), String> {
    if tutorial.first_position().is_none() {
        return Err(format!("tutorial '{}' has no steps", tutorial.id));
    }

    let mut level_ids = HashSet::new();
    let mut step_ids = HashSet::new();
    for level in &tutorial.levels {
        if !level_ids.insert(&level.id) {
            return Err(format!("duplicate level id '{}'", level.id));
        }
        check_commits(level.setup.as_ref())?;
        for step in &level.steps {
            if !step_ids.insert(&step.id) {
                return Err(format!("duplicate step id '{}'", step.id));
            }
            check_commits(step.setup.as_ref())?;
            check_commits(step.solution.as_ref())?;
        }
    }
    Ok(())
}

fn check_commits(checkpoint: Option<&Checkpoint>) -> Result<(), String> {
    match checkpoint.and_then(Checkpoint::invalid_commit) {
        Some(commit) => Err(format!("invalid commit reference '{commit}'")),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
