//! Display preferences kept next to the instrument list
//!
//! The portfolio title and the last chart range selected. A missing or empty
//! file means no title and the default range.

use crate::feed::ChartRange;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub chart_range: ChartRange,
}

impl Preferences {
    /// Stored title, or `default` when none (or only whitespace) is set
    pub fn title_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(default)
    }
}

/// JSON file holding one `Preferences` object
#[derive(Debug, Clone)]
pub struct PreferencesFile {
    path: PathBuf,
}

impl PreferencesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Preferences, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Preferences::default()),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StoreError::Format(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    pub fn save(&self, preferences: &Preferences) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(preferences)
            .map_err(|e| StoreError::Format(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Set (or clear, with `None`) the portfolio title
    pub fn set_title(&self, title: Option<String>) -> Result<(), StoreError> {
        let mut preferences = self.load()?;
        preferences.title = title;
        self.save(&preferences)
    }

    pub fn set_chart_range(&self, range: ChartRange) -> Result<(), StoreError> {
        let mut preferences = self.load()?;
        preferences.chart_range = range;
        self.save(&preferences)
    }
}
