//! Line-delimited JSON bridge between an editor process and the controller.
//!
//! The editor writes one JSON object per line to stdin and reads requests
//! (notifications, layout, documents, UI messages) as JSON lines on stdout.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{error::ProtocolError, protocol::ViewMessage};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tracing::{debug, warn};
use tutorial_core::{Command, EditorHost, EditorLayout, Input, SavedDocument, UiSurface, ViewColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Information,
    Warning,
    Error,
}

/// Requests sent to the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Outbound {
    Notify { level: NoticeLevel, message: String },
    Layout { layout: EditorLayout },
    OpenDocument { path: PathBuf, column: ViewColumn },
    CreateSurface { column: ViewColumn },
    Reveal { column: ViewColumn },
    PostMessage { message: ViewMessage },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BridgeLine {
    Command {
        command: String,
        #[serde(default)]
        args: Value,
    },
    Saved {
        saved: SavedDocument,
    },
    Message {
        message: Value,
    },
    Surface {
        surface: SurfaceEvent,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SurfaceEvent {
    Disposed,
}

/// Parses one line of bridge input into a controller input.
pub fn parse_line(line: &str) -> Result<Input, ProtocolError> {
    let input = match serde_json::from_str::<BridgeLine>(line)? {
        BridgeLine::Command { command, args } => {
            Input::Command(Command::from_invocation(&command, args)?)
        }
        BridgeLine::Saved { saved } => Input::DocumentSaved(saved),
        // The controller parses UI messages itself so malformed ones are
        // reported in one place.
        BridgeLine::Message { message } => Input::SurfaceMessage(message.to_string()),
        BridgeLine::Surface {
            surface: SurfaceEvent::Disposed,
        } => Input::SurfaceDisposed,
    };
    Ok(input)
}

/// Drains outbound requests into `writer`, one JSON object per line.
pub async fn write_outbound<W>(
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    mut writer: W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = outbound.recv().await {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

pub struct StdioSurface {
    outbound: mpsc::UnboundedSender<Outbound>,
    disposed: AtomicBool,
}

impl StdioSurface {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

impl UiSurface for StdioSurface {
    fn post_message(&self, message: &ViewMessage) -> anyhow::Result<()> {
        if self.is_disposed() {
            return Err(anyhow!("ui surface is disposed"));
        }
        self.outbound
            .send(Outbound::PostMessage {
                message: message.clone(),
            })
            .map_err(|_| anyhow!("host bridge output closed"))
    }

    fn reveal(&self, column: ViewColumn) {
        if self.outbound.send(Outbound::Reveal { column }).is_err() {
            debug!("host bridge output closed; reveal dropped");
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

pub struct StdioHost {
    root: Option<PathBuf>,
    outbound: mpsc::UnboundedSender<Outbound>,
    surface: Mutex<Option<Arc<StdioSurface>>>,
}

impl StdioHost {
    pub fn new(root: Option<PathBuf>, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            root,
            outbound,
            surface: Mutex::new(None),
        }
    }

    /// Marks the current surface as gone after the editor closed it.
    pub fn surface_disposed(&self) {
        let surface = self
            .surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(surface) = surface {
            surface.dispose();
        }
    }

    fn emit(&self, event: Outbound) -> anyhow::Result<()> {
        self.outbound
            .send(event)
            .map_err(|_| anyhow!("host bridge output closed"))
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        let event = Outbound::Notify {
            level,
            message: message.to_string(),
        };
        if let Err(err) = self.emit(event) {
            warn!(error = %err, ?level, message, "notification dropped");
        }
    }
}

#[async_trait]
impl EditorHost for StdioHost {
    fn workspace_root(&self) -> Option<PathBuf> {
        self.root.clone()
    }

    async fn show_information(&self, message: &str) {
        self.notify(NoticeLevel::Information, message);
    }

    async fn show_warning(&self, message: &str) {
        self.notify(NoticeLevel::Warning, message);
    }

    async fn show_error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }

    async fn set_layout(&self, layout: &EditorLayout) -> anyhow::Result<()> {
        self.emit(Outbound::Layout {
            layout: layout.clone(),
        })
    }

    async fn open_document(&self, path: &Path, column: ViewColumn) -> anyhow::Result<()> {
        self.emit(Outbound::OpenDocument {
            path: path.to_path_buf(),
            column,
        })
    }

    async fn create_surface(&self, column: ViewColumn) -> anyhow::Result<Arc<dyn UiSurface>> {
        self.emit(Outbound::CreateSurface { column })?;
        let surface = Arc::new(StdioSurface {
            outbound: self.outbound.clone(),
            disposed: AtomicBool::new(false),
        });
        let previous = self
            .surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(surface.clone());
        if let Some(previous) = previous {
            previous.dispose();
        }
        Ok(surface as Arc<dyn UiSurface>)
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
