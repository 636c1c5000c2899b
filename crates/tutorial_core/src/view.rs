//! View channel between the controller and the UI surface.

use std::sync::Arc;

use shared::protocol::{Action, ViewMessage};
use tracing::{debug, warn};

use crate::host::ViewColumn;

pub trait UiSurface: Send + Sync {
    fn post_message(&self, message: &ViewMessage) -> anyhow::Result<()>;
    fn reveal(&self, column: ViewColumn);
    fn is_disposed(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    Missing,
    /// Created, but the UI has not acknowledged its first paint yet.
    Pending,
    Ready,
}

/// Owns the UI surface handle for the lifetime of the controller.
#[derive(Default)]
pub struct ViewChannel {
    surface: Option<Arc<dyn UiSurface>>,
    ready: bool,
}

impl ViewChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, surface: Arc<dyn UiSurface>) {
        self.surface = Some(surface);
        self.ready = false;
    }

    pub fn detach(&mut self) {
        self.surface = None;
        self.ready = false;
    }

    pub fn mark_ready(&mut self) {
        if self.live_surface().is_some() {
            self.ready = true;
        }
    }

    pub fn status(&self) -> SurfaceStatus {
        match (self.live_surface(), self.ready) {
            (None, _) => SurfaceStatus::Missing,
            (Some(_), false) => SurfaceStatus::Pending,
            (Some(_), true) => SurfaceStatus::Ready,
        }
    }

    pub fn surface(&self) -> Option<&Arc<dyn UiSurface>> {
        self.live_surface()
    }

    fn live_surface(&self) -> Option<&Arc<dyn UiSurface>> {
        self.surface.as_ref().filter(|surface| !surface.is_disposed())
    }

    /// Best-effort delivery. Messages are dropped, not queued, while no surface exists.
    pub fn post_message(&self, message: &ViewMessage) {
        let Some(surface) = self.live_surface() else {
            debug!("no ui surface; dropping view message");
            return;
        };
        if let Err(err) = surface.post_message(message) {
            warn!(error = %err, "failed to deliver view message");
        }
    }

    /// Parses a raw inbound message. Malformed input is logged and dropped.
    pub fn receive(&self, raw: &str) -> Option<Action> {
        match Action::parse(raw) {
            Ok(action) => Some(action),
            Err(err) => {
                warn!(error = %err, "dropping inbound ui message");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
