use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReportedError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(TutorialId);
id_newtype!(LevelId);
id_newtype!(StepId);
id_newtype!(CheckpointId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[default]
    Incomplete,
    Active,
    Complete,
}

impl Status {
    /// Rank used to check that progress never moves backwards.
    pub fn rank(self) -> u8 {
        match self {
            Status::Incomplete => 0,
            Status::Active => 1,
            Status::Complete => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub commits: Vec<String>,
}

impl Checkpoint {
    pub fn new(id: impl Into<String>, commits: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: CheckpointId::new(id),
            commits: commits.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Folds several checkpoints into one so they can be applied as a single unit.
    pub fn merged<'a>(id: impl Into<String>, parts: impl IntoIterator<Item = &'a Checkpoint>) -> Self {
        let commits = parts
            .into_iter()
            .flat_map(|part| part.commits.iter().cloned())
            .collect();
        Self {
            id: CheckpointId::new(id),
            commits,
        }
    }

    /// Returns the first commit reference that is not an abbreviated or full hex hash.
    pub fn invalid_commit(&self) -> Option<&str> {
        self.commits
            .iter()
            .find(|commit| !is_commit_hash(commit))
            .map(String::as_str)
    }
}

pub fn is_commit_hash(value: &str) -> bool {
    (4..=40).contains(&value.len()) && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<Checkpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<Checkpoint>,
    #[serde(default)]
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<Checkpoint>,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub status: Status,
}

impl Level {
    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|step| &step.id == id)
    }

    pub fn step_index(&self, id: &StepId) -> Option<usize> {
        self.steps.iter().position(|step| &step.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialRepo {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tutorial {
    pub id: TutorialId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<TutorialRepo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_language: Option<String>,
    pub levels: Vec<Level>,
}

impl Tutorial {
    pub fn level(&self, id: &LevelId) -> Option<&Level> {
        self.levels.iter().find(|level| &level.id == id)
    }

    pub fn level_index(&self, id: &LevelId) -> Option<usize> {
        self.levels.iter().position(|level| &level.id == id)
    }

    pub fn step(&self, position: &Position) -> Option<&Step> {
        self.level(&position.level_id)?.step(&position.step_id)
    }

    /// First step of the first level that has any steps.
    pub fn first_position(&self) -> Option<Position> {
        self.levels.iter().find_map(|level| {
            level.steps.first().map(|step| Position {
                level_id: level.id.clone(),
                step_id: step.id.clone(),
            })
        })
    }

    /// Position after `current`, crossing into the next non-empty level when needed.
    pub fn next_position(&self, current: &Position) -> Option<Position> {
        let level_idx = self.level_index(&current.level_id)?;
        let step_idx = self.levels[level_idx].step_index(&current.step_id)?;

        if let Some(step) = self.levels[level_idx].steps.get(step_idx + 1) {
            return Some(Position {
                level_id: current.level_id.clone(),
                step_id: step.id.clone(),
            });
        }

        self.levels[level_idx + 1..].iter().find_map(|level| {
            level.steps.first().map(|step| Position {
                level_id: level.id.clone(),
                step_id: step.id.clone(),
            })
        })
    }

    pub fn active_steps(&self) -> impl Iterator<Item = &Step> {
        self.levels
            .iter()
            .flat_map(|level| level.steps.iter())
            .filter(|step| step.status == Status::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub level_id: LevelId,
    pub step_id: StepId,
}

impl Position {
    pub fn new(level_id: impl Into<String>, step_id: impl Into<String>) -> Self {
        Self {
            level_id: LevelId::new(level_id),
            step_id: StepId::new(step_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Idle,
    TutorialLoading,
    StepActive,
    TestRunning,
    TutorialComplete,
}

impl Phase {
    /// `STEP_ACTIVE` and `TEST_RUNNING` together form the active-tutorial state.
    pub fn is_tutorial_active(self) -> bool {
        matches!(self, Phase::StepActive | Phase::TestRunning)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "IDLE",
            Phase::TutorialLoading => "TUTORIAL_LOADING",
            Phase::StepActive => "STEP_ACTIVE",
            Phase::TestRunning => "TEST_RUNNING",
            Phase::TutorialComplete => "TUTORIAL_COMPLETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebviewState {
    #[default]
    Uninitialized,
    Initializing,
    Restarting,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MachineState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tutorial: Option<Tutorial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub phase: Phase,
    pub webview: WebviewState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_failure: Option<String>,
}

impl MachineState {
    pub fn current_step(&self) -> Option<&Step> {
        let tutorial = self.tutorial.as_ref()?;
        tutorial.step(self.position.as_ref()?)
    }

    pub fn progress(&self) -> Option<Progress> {
        Some(Progress {
            tutorial: self.tutorial.clone()?,
            position: self.position.clone(),
            phase: self.phase,
        })
    }
}

/// The subset of machine state that survives editor restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub tutorial: Tutorial,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub phase: Phase,
}
