pub mod commands;
pub mod controller;
pub mod error;
pub mod host;
pub mod machine;
pub mod settings;
pub mod view;

pub use commands::Command;
pub use controller::{Adapters, Controller, ControllerHandle, Input};
pub use error::CoreError;
pub use host::{EditorHost, EditorLayout, SavedDocument, ViewColumn};
pub use machine::{Event, TutorialMachine};
pub use settings::{load_settings, load_settings_from, Settings};
pub use view::{SurfaceStatus, UiSurface, ViewChannel};
