use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::conversation::client::DEFAULT_BASE_URL;
use crate::conversation::TrimPolicy;
use crate::error::WatchError;
use crate::models::Point;
use crate::normalize::config::DEFAULT_MERGE_GAP_PX;
use crate::normalize::NormalizeConfig;

/// Environment variable naming an optional settings file.
pub const SETTINGS_ENV_VAR: &str = "CHATWATCH_SETTINGS";

/// Credential variables, checked in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl From<ScreenPoint> for Point {
    fn from(point: ScreenPoint) -> Self {
        Point::new(point.x as f64, point.y as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Title prefix of the chat window to watch.
    pub window_title_prefix: String,
    /// Screen coordinate of the chat input box.
    pub input_box: ScreenPoint,
    pub marker_prefixes: Vec<String>,
    pub poll_interval_secs: u64,
    /// Total time the watcher runs before exiting.
    pub run_budget_secs: u64,
    pub model: String,
    pub temperature: f32,
    pub persona: String,
    pub completion_base_url: String,
    pub merge_gap_px: f64,
    pub history_max_messages: usize,
    pub history_max_tokens: usize,
    /// OCR program and leading arguments; the PNG path is appended.
    pub ocr_command: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_title_prefix: "SVCA VIP".into(),
            input_box: ScreenPoint { x: 1050, y: 1065 },
            marker_prefixes: vec!["机器人".into(), "@chatgpt".into()],
            poll_interval_secs: 5,
            run_budget_secs: 3600,
            model: "gpt-3.5-turbo".into(),
            temperature: 0.8,
            persona: "你是一个很幽默的助手".into(),
            completion_base_url: DEFAULT_BASE_URL.into(),
            merge_gap_px: DEFAULT_MERGE_GAP_PX,
            history_max_messages: 10,
            history_max_tokens: 2000,
            ocr_command: vec!["paddleocr-json".into(), "--lang".into(), "ch".into()],
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `CHATWATCH_SETTINGS`, falling back to
    /// defaults when neither names a file. Missing keys take their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(SETTINGS_ENV_VAR).map(PathBuf::from));

        let settings = match path {
            Some(path) => {
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read settings from {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse settings in {}", path.display()))?
            }
            None => Settings::default(),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), WatchError> {
        if self.window_title_prefix.is_empty() {
            return Err(WatchError::Settings("window_title_prefix is empty".into()));
        }
        if self.marker_prefixes.iter().all(|marker| marker.is_empty()) {
            return Err(WatchError::Settings("no marker prefixes configured".into()));
        }
        if self.ocr_command.is_empty() {
            return Err(WatchError::Settings("ocr_command is empty".into()));
        }
        if self.merge_gap_px < 0.0 {
            return Err(WatchError::Settings("merge_gap_px must not be negative".into()));
        }
        Ok(())
    }

    pub fn normalize_config(&self) -> NormalizeConfig {
        NormalizeConfig::new(&self.marker_prefixes, self.merge_gap_px)
    }

    pub fn trim_policy(&self) -> TrimPolicy {
        TrimPolicy {
            max_messages: self.history_max_messages,
            max_tokens: self.history_max_tokens,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }
}

/// Read the completion credential from the environment.
pub fn api_key_from_env() -> Result<String, WatchError> {
    API_KEY_ENV_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|value| !value.trim().is_empty()))
        .ok_or_else(|| WatchError::MissingCredential {
            var: API_KEY_ENV_VARS[0].to_string(),
        })
}
