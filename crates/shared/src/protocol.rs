use serde::{Deserialize, Serialize};

use crate::{
    domain::{MachineState, Phase, Position, Tutorial, WebviewState},
    error::{ProtocolError, ReportedError},
};

/// Tutorial content half of a `SET_STATE` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tutorial: Option<Tutorial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Lifecycle half of a `SET_STATE` payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotState {
    pub phase: Phase,
    pub webview: WebviewState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatePayload {
    pub data: SnapshotData,
    pub state: SnapshotState,
}

impl From<&MachineState> for StatePayload {
    fn from(value: &MachineState) -> Self {
        Self {
            data: SnapshotData {
                tutorial: value.tutorial.clone(),
                position: value.position.clone(),
            },
            state: SnapshotState {
                phase: value.phase,
                webview: value.webview,
                error: value.error.clone(),
                test_failure: value.test_failure.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    pub data: serde_json::Value,
}

/// Messages posted from the controller to the UI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewMessage {
    SetState(StatePayload),
    SetData(DataPayload),
}

/// Action sent by the UI surface. A bare JSON string is shorthand for an action
/// without payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAction")]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAction {
    Named(String),
    Full {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        payload: Option<serde_json::Value>,
    },
}

impl From<RawAction> for Action {
    fn from(value: RawAction) -> Self {
        match value {
            RawAction::Named(kind) => Self {
                kind,
                payload: None,
            },
            RawAction::Full { kind, payload } => Self { kind, payload },
        }
    }
}

impl Action {
    pub fn named(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    pub fn with_payload(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload: Some(payload),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let action: Action = serde_json::from_str(raw)?;
        if action.kind.trim().is_empty() {
            return Err(ProtocolError::InvalidPayload {
                action: action.kind,
                reason: "action type must not be empty".to_string(),
            });
        }
        Ok(action)
    }

    /// Decodes the payload into `T`, treating a missing payload as JSON `null`.
    pub fn payload_as<T>(&self) -> Result<T, ProtocolError>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.payload.clone().unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value).map_err(|err| ProtocolError::InvalidPayload {
            action: self.kind.clone(),
            reason: err.to_string(),
        })
    }
}
