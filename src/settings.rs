use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::format::DateStyle;

const HISTORY_FILE: &str = ".datecalc_history";

/// Front-end preferences, read from a JSON file. Missing keys keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub date_style: DateStyle,
    pub show_tokens: bool,
    pub show_tree: bool,
    pub history_file: Option<PathBuf>,
}

impl Settings {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid settings")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Configured history file, else `~/.datecalc_history`, else the working
    /// directory.
    pub fn history_path(&self) -> PathBuf {
        if let Some(path) = &self.history_file {
            return path.clone();
        }
        dirs::home_dir()
            .map(|home| home.join(HISTORY_FILE))
            .unwrap_or_else(|| PathBuf::from(HISTORY_FILE))
    }
}
