//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to the
//! session by value.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable that overrides [`BackendConfig::base_url`].
pub const API_URL_ENV: &str = "SETU_API_URL";

// ---------------------------------------------------------------------------
// ResetPolicy
// ---------------------------------------------------------------------------

/// What a full session reset does with the selected photos.
///
/// | Variant       | Result | Photos | Features / price |
/// |---------------|--------|--------|------------------|
/// | `ClearImages` | gone   | gone   | cleared          |
/// | `KeepImages`  | gone   | kept   | kept             |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetPolicy {
    /// Start over with a new item ("scan another item").
    ClearImages,
    /// Drop only the result and keep the current selection for another try.
    KeepImages,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self::ClearImages
    }
}

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Connection settings for the analysis / transcription backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Path of the image analysis endpoint.
    pub analyze_path: String,
    /// Path of the voice transcription endpoint.
    pub transcribe_path: String,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            analyze_path: "/analyze".into(),
            transcribe_path: "/analyze-voice".into(),
            timeout_secs: 60,
        }
    }
}

impl BackendConfig {
    /// Full URL of the analysis endpoint.
    pub fn analyze_url(&self) -> String {
        join_url(&self.base_url, &self.analyze_path)
    }

    /// Full URL of the transcription endpoint.
    pub fn transcribe_url(&self) -> String {
        join_url(&self.base_url, &self.transcribe_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for voice-note capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the uploaded voice note in Hz.
    pub sample_rate: u32,
    /// Audio beyond this many seconds is dropped from the voice note.
    pub max_recording_secs: f32,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            max_recording_secs: 60.0,
            input_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Policies for the submission state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Behaviour of a full reset.
    pub reset_policy: ResetPolicy,
    /// Whether dismissing an analysis error also clears the photos.
    pub clear_images_on_error: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reset_policy: ResetPolicy::default(),
            clear_images_on_error: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use setu_client::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env_overrides();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Voice-note capture settings.
    #[serde(default)]
    pub audio: AudioConfig,
    /// Submission / reset policies.
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply [`API_URL_ENV`] on top of the loaded values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_api_url(std::env::var(API_URL_ENV).ok());
    }

    fn apply_api_url(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            log::debug!("config: backend URL overridden by {API_URL_ENV}");
            self.backend.base_url = url;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
