use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::languages::Language;
use crate::paths;

#[derive(Debug, Serialize, Deserialize, Default)]
struct PreferenceFile {
    #[serde(rename = "lastLanguage")]
    last_language: Option<String>,
}

/// Session-spanning user choices, stored as a small JSON file.
#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
}

impl Preferences {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Self {
        Self::at(paths::preferences_path())
    }

    pub fn last_language(&self) -> Option<Language> {
        let file = match self.read() {
            Ok(file) => file,
            Err(err) => {
                warn!("ignoring unreadable preferences: {:#}", err);
                return None;
            }
        };
        let code = file.last_language?;
        let language = Language::parse_code(&code);
        if language.is_none() {
            warn!("ignoring unsupported stored language '{}'", code);
        }
        language
    }

    pub fn set_last_language(&self, language: Language) -> Result<()> {
        let mut file = self.read().unwrap_or_default();
        file.last_language = Some(language.code().to_string());
        self.write(&file)
    }

    fn read(&self) -> Result<PreferenceFile> {
        if !self.path.exists() {
            return Ok(PreferenceFile::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read preferences: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse preferences: {}", self.path.display()))
    }

    fn write(&self, file: &PreferenceFile) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).with_context(|| "failed to create preferences directory")?;
        }
        let content = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write preferences: {}", self.path.display()))
    }
}
