//! Commands the editor host can invoke on the controller.

use serde::de::DeserializeOwned;
use shared::{
    domain::TutorialRepo,
    error::ProtocolError,
    protocol::{Action, DataPayload, StatePayload},
};

use crate::host::ViewColumn;

const PREFIX: &str = "tutorial.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    OpenWebview { column: ViewColumn },
    TutorialLaunch { repo: Option<TutorialRepo> },
    TutorialSetup { coding_language: String },
    OpenFile { relative_path: String },
    SendState(StatePayload),
    SendData(DataPayload),
    ReceiveAction(Action),
    RunTest,
    TestPass,
    TestFail,
    Reset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "tutorial.start",
            Command::OpenWebview { .. } => "tutorial.open_webview",
            Command::TutorialLaunch { .. } => "tutorial.tutorial_launch",
            Command::TutorialSetup { .. } => "tutorial.tutorial_setup",
            Command::OpenFile { .. } => "tutorial.open_file",
            Command::SendState(_) => "tutorial.send_state",
            Command::SendData(_) => "tutorial.send_data",
            Command::ReceiveAction(_) => "tutorial.receive_action",
            Command::RunTest => "tutorial.run_test",
            Command::TestPass => "tutorial.test_pass",
            Command::TestFail => "tutorial.test_fail",
            Command::Reset => "tutorial.reset",
        }
    }

    /// Builds a command from its registered name and JSON argument.
    pub fn from_invocation(name: &str, args: serde_json::Value) -> Result<Self, ProtocolError> {
        let short = name.strip_prefix(PREFIX).unwrap_or(name);
        let command = match short {
            "start" => Command::Start,
            "open_webview" => Command::OpenWebview {
                column: optional_arg(name, args)?.unwrap_or_default(),
            },
            "tutorial_launch" => Command::TutorialLaunch {
                repo: optional_arg(name, args)?,
            },
            "tutorial_setup" => Command::TutorialSetup {
                coding_language: required_arg(name, args)?,
            },
            "open_file" => Command::OpenFile {
                relative_path: required_arg(name, args)?,
            },
            "send_state" => Command::SendState(required_arg(name, args)?),
            "send_data" => Command::SendData(required_arg(name, args)?),
            "receive_action" => Command::ReceiveAction(required_arg(name, args)?),
            "run_test" => Command::RunTest,
            "test_pass" => Command::TestPass,
            "test_fail" => Command::TestFail,
            "reset" => Command::Reset,
            _ => return Err(ProtocolError::UnknownCommand(name.to_string())),
        };
        Ok(command)
    }
}

fn required_arg<T: DeserializeOwned>(name: &str, args: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(args).map_err(|err| ProtocolError::InvalidPayload {
        action: name.to_string(),
        reason: err.to_string(),
    })
}

fn optional_arg<T: DeserializeOwned>(
    name: &str,
    args: serde_json::Value,
) -> Result<Option<T>, ProtocolError> {
    if args.is_null() {
        return Ok(None);
    }
    required_arg(name, args).map(Some)
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
