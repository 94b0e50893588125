//! Runtime settings and chat profiles.
//!
//! Settings are read from a TOML file (missing file means defaults) and then
//! overridden by `COPILOT_*` environment variables.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stream::citations::ResourceResolver;

pub const API_KEY_ENV: &str = "COPILOT_OPENAI_API_KEY";
pub const MODEL_ENV: &str = "COPILOT_MODEL";
pub const SETTINGS_PATH_ENV: &str = "COPILOT_SETTINGS_PATH";

const DEFAULT_SETTINGS_PATH: &str = "copilot.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write settings file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings")]
    Serialize(#[from] toml::ser::Error),

    #[error("no API key configured; set COPILOT_OPENAI_API_KEY")]
    MissingApiKey,

    #[error("Unknown chat profile: {0}")]
    UnknownChatProfile(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    pub model: String,
    pub assistant_name: String,
    pub instructions: String,
    /// JSON file holding persisted thread and vector store ids.
    pub persistence_path: PathBuf,
    /// Files cited from here are shown as inline PDFs.
    pub resources_root: PathBuf,
    /// Files cited from here are shown as downloadable files.
    pub files_root: PathBuf,
    /// Documents uploaded when the vector store is first created.
    pub documents: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: ChatProfile::default().model().to_string(),
            assistant_name: "Copilot".to_string(),
            instructions:
                "You are a helpful assistant that can answer questions about PDF documents."
                    .to_string(),
            persistence_path: PathBuf::from(".copilot/persistence.json"),
            resources_root: PathBuf::from("resources"),
            files_root: PathBuf::from(".files"),
            documents: vec![PathBuf::from("resources/concept_drift.pdf")],
        }
    }
}

impl Settings {
    /// Load from `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `COPILOT_SETTINGS_PATH` (or `copilot.toml`) and apply
    /// environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Settings::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = lookup(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
        let mut settings = Self::load(&path)?;
        settings.apply_overrides(lookup);
        Ok(settings)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV) {
            self.openai_api_key = Some(key);
        }
        if let Some(model) = lookup(MODEL_ENV) {
            self.model = model;
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(write_err)
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn resource_resolver(&self) -> ResourceResolver {
        ResourceResolver::new(&self.resources_root, &self.files_root)
    }
}

/// Model choices offered in the chat UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatProfile {
    #[default]
    #[serde(rename = "GPT-4o-mini")]
    Gpt4oMini,
    #[serde(rename = "GPT-4o")]
    Gpt4o,
}

impl ChatProfile {
    pub const ALL: [ChatProfile; 2] = [ChatProfile::Gpt4oMini, ChatProfile::Gpt4o];

    pub fn label(self) -> &'static str {
        match self {
            ChatProfile::Gpt4oMini => "GPT-4o-mini",
            ChatProfile::Gpt4o => "GPT-4o",
        }
    }

    pub fn model(self) -> &'static str {
        match self {
            ChatProfile::Gpt4oMini => "gpt-4o-mini",
            ChatProfile::Gpt4o => "gpt-4o",
        }
    }
}

impl fmt::Display for ChatProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChatProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.label() == s)
            .ok_or_else(|| ConfigError::UnknownChatProfile(s.to_string()))
    }
}
