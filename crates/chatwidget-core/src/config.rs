use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::endpoint::EndpointConfig;
use crate::voice::{self, CommandRecognizer, CommandSynthesizer, SpeechRecognizer, SpeechSynthesizer, VoiceSender};
use crate::widget::DEFAULT_ADMIN_KEY;

pub const BACKEND_URL_ENV: &str = "CHATWIDGET_BACKEND_URL";
pub const ADMIN_KEY_ENV: &str = "CHATWIDGET_ADMIN_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub admin_key: String,
    pub speech: SpeechConfig,
    pub log_level: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    /// Program and arguments for read-aloud; the text is appended as the last argument.
    /// Auto-detected when unset.
    pub synthesizer_command: Option<Vec<String>>,
    /// Program and arguments that record until stdin closes and print the transcript
    pub recognizer_command: Option<Vec<String>>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            synthesizer_command: None,
            recognizer_command: None,
        }
    }
}

impl SpeechConfig {
    /// Builds the speech backends this config asks for, falling back to
    /// unsupported stand-ins for anything unavailable.
    pub fn backends(&self, events: VoiceSender) -> (Box<dyn SpeechRecognizer>, Box<dyn SpeechSynthesizer>) {
        if !self.enabled {
            return (Box::new(voice::Unsupported), Box::new(voice::Unsupported));
        }

        let recognizer: Box<dyn SpeechRecognizer> = match self
            .recognizer_command
            .as_deref()
            .and_then(|cmd| CommandRecognizer::new(cmd, events.clone()))
        {
            Some(recognizer) => Box::new(recognizer),
            None => Box::new(voice::Unsupported),
        };

        let synthesizer = match &self.synthesizer_command {
            Some(cmd) => CommandSynthesizer::new(cmd, events),
            None => CommandSynthesizer::detect(events),
        };
        let synthesizer: Box<dyn SpeechSynthesizer> = match synthesizer {
            Some(synthesizer) => Box::new(synthesizer),
            None => Box::new(voice::Unsupported),
        };

        (recognizer, synthesizer)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            admin_key: DEFAULT_ADMIN_KEY.to_string(),
            speech: SpeechConfig::default(),
            log_level: None,
        }
    }

    /// Loads the config file (or defaults when there is none), then applies
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(BACKEND_URL_ENV).ok(),
            std::env::var(ADMIN_KEY_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, backend_url: Option<String>, admin_key: Option<String>) {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            self.endpoint.url = url;
        }
        if let Some(key) = admin_key.filter(|k| !k.is_empty()) {
            self.admin_key = key;
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("chatwidget").join("config.json"))
    }
}
