//! Editor host seam: the narrow set of editor capabilities the controller uses.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::view::UiSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewColumn {
    One,
    #[default]
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutGroup {
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorLayout {
    pub orientation: Orientation,
    pub groups: Vec<LayoutGroup>,
}

impl EditorLayout {
    /// Editor on the left, tutorial surface on the right.
    pub fn tutorial_split() -> Self {
        Self {
            orientation: Orientation::Horizontal,
            groups: vec![LayoutGroup { size: 0.6 }, LayoutGroup { size: 0.4 }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDocument {
    pub uri_scheme: String,
    pub language_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl SavedDocument {
    pub fn is_file(&self) -> bool {
        self.uri_scheme == "file"
    }
}

#[async_trait]
pub trait EditorHost: Send + Sync {
    fn workspace_root(&self) -> Option<PathBuf>;
    async fn show_information(&self, message: &str);
    async fn show_warning(&self, message: &str);
    async fn show_error(&self, message: &str);
    async fn set_layout(&self, layout: &EditorLayout) -> anyhow::Result<()>;
    async fn open_document(&self, path: &Path, column: ViewColumn) -> anyhow::Result<()>;
    async fn create_surface(&self, column: ViewColumn) -> anyhow::Result<Arc<dyn UiSurface>>;
}
