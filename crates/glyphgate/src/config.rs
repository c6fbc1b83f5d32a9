//! Configuration management for Glyphgate.

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use glyphgate_common::constants::{
    DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_LISTEN_ADDR, DEFAULT_SWEEP_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS,
};
use glyphgate_common::{GateError, UserId};

use crate::captcha::{ChallengeParams, Compositor};
use crate::handler::GateSettings;
use crate::sweeper::SweeperConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Super admins, allowed to lift restrictions
    #[serde(default)]
    pub admins: Vec<UserId>,

    /// Leave groups the bot was added to by anyone but a super admin
    #[serde(default)]
    pub leave_unknown_groups: bool,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub captcha: CaptchaConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

/// Glyph catalog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding one PNG per glyph
    #[serde(default = "default_glyph_dir")]
    pub glyph_dir: PathBuf,

    #[serde(default = "default_min_codepoints")]
    pub min_codepoints: usize,

    #[serde(default = "default_max_codepoints")]
    pub max_codepoints: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            glyph_dir: default_glyph_dir(),
            min_codepoints: default_min_codepoints(),
            max_codepoints: default_max_codepoints(),
        }
    }
}

/// Challenge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Glyphs drawn on the image
    #[serde(default = "default_correct_glyphs")]
    pub correct_glyphs: usize,

    /// Correct selections needed to pass, all of them when unset
    #[serde(default)]
    pub required_correct: Option<usize>,

    #[serde(default = "default_total_buttons")]
    pub total_buttons: usize,

    /// Wrong selections tolerated
    #[serde(default = "default_error_budget")]
    pub error_budget: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_canvas_side")]
    pub canvas_width: u32,

    #[serde(default = "default_canvas_side")]
    pub canvas_height: u32,

    #[serde(default = "default_cell_padding")]
    pub cell_padding: u32,

    /// Background used when a group has none of its own
    #[serde(default = "default_background_path")]
    pub background_path: PathBuf,

    #[serde(default = "default_backgrounds_dir")]
    pub backgrounds_dir: PathBuf,

    /// Scratch directory for rendered images
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Post a notice in the group when a user fails or times out
    #[serde(default = "default_true")]
    pub notify_on_fail: bool,

    #[serde(default)]
    pub ban_on_fail: bool,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            correct_glyphs: default_correct_glyphs(),
            required_correct: None,
            total_buttons: default_total_buttons(),
            error_budget: default_error_budget(),
            timeout_secs: default_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            canvas_width: default_canvas_side(),
            canvas_height: default_canvas_side(),
            cell_padding: default_cell_padding(),
            background_path: default_background_path(),
            backgrounds_dir: default_backgrounds_dir(),
            artifact_dir: default_artifact_dir(),
            notify_on_fail: true,
            ban_on_fail: false,
        }
    }
}

/// Messaging boundary configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Upper bound for a single transport call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Commands held before the chat adapter drains them
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_glyph_dir() -> PathBuf { PathBuf::from("assets/glyphs") }
fn default_min_codepoints() -> usize { 1 }
fn default_max_codepoints() -> usize { 1 }
fn default_correct_glyphs() -> usize { 4 }
fn default_total_buttons() -> usize { 8 }
fn default_error_budget() -> u32 { 2 }
fn default_timeout() -> u64 { DEFAULT_TIMEOUT_SECS }
fn default_sweep_interval() -> u64 { DEFAULT_SWEEP_INTERVAL_SECS }
fn default_canvas_side() -> u32 { 740 }
fn default_cell_padding() -> u32 { 10 }
fn default_background_path() -> PathBuf { PathBuf::from("assets/background.jpg") }
fn default_backgrounds_dir() -> PathBuf { PathBuf::from("backgrounds") }
fn default_artifact_dir() -> PathBuf { PathBuf::from("tmp") }
fn default_true() -> bool { true }
fn default_call_timeout() -> u64 { DEFAULT_CALL_TIMEOUT_SECS }
fn default_outbox_capacity() -> usize { 10_000 }

impl AppConfig {
    /// Load configuration from file. A missing file yields the defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config: Self = if config_path.exists() {
            let settings = config::Config::builder()
                .add_source(config::File::from(config_path))
                .build()
                .context("Failed to load config file")?;

            settings.try_deserialize().context("Failed to parse config")?
        } else {
            tracing::warn!(path = ?config_path, "Config file not found, using defaults");
            Self::default()
        };

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Apply CLI overrides
    pub fn with_overrides(mut self, listen: Option<String>, glyph_dir: Option<PathBuf>) -> Self {
        if let Some(listen) = listen {
            self.listen_addr = listen;
        }
        if let Some(glyph_dir) = glyph_dir {
            self.catalog.glyph_dir = glyph_dir;
        }
        self
    }

    /// Reject settings no challenge could be built from
    pub fn validate(&self) -> Result<(), GateError> {
        self.challenge_params().validate()?;

        if self.catalog.min_codepoints == 0 || self.catalog.min_codepoints > self.catalog.max_codepoints {
            return Err(GateError::Config(format!(
                "catalog codepoint range {}..={} is empty",
                self.catalog.min_codepoints, self.catalog.max_codepoints
            )));
        }
        if self.captcha.timeout_secs == 0 || self.captcha.sweep_interval_secs == 0 {
            return Err(GateError::Config("timeout and sweep interval must be positive".into()));
        }
        if self.captcha.canvas_width == 0 || self.captcha.canvas_height == 0 {
            return Err(GateError::Config("canvas must not be empty".into()));
        }

        Ok(())
    }

    pub fn challenge_params(&self) -> ChallengeParams {
        let params = ChallengeParams::new(
            self.captcha.correct_glyphs,
            self.captcha.total_buttons,
            self.captcha.error_budget,
        );
        match self.captcha.required_correct {
            Some(required) => params.with_required_correct(required),
            None => params,
        }
    }

    pub fn timeout(&self) -> TimeDelta {
        i64::try_from(self.captcha.timeout_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.call_timeout_secs)
    }

    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            params: self.challenge_params(),
            compositor: Compositor::new(
                self.captcha.canvas_width,
                self.captcha.canvas_height,
                self.captcha.cell_padding,
            ),
            artifact_dir: self.captcha.artifact_dir.clone(),
            timeout: self.timeout(),
            notify_on_fail: self.captcha.notify_on_fail,
            ban_on_fail: self.captcha.ban_on_fail,
            admins: self.admins.clone(),
            leave_unknown_groups: self.leave_unknown_groups,
        }
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_secs(self.captcha.sweep_interval_secs),
            timeout: self.timeout(),
            notify_on_fail: self.captcha.notify_on_fail,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            admins: Vec::new(),
            leave_unknown_groups: false,
            catalog: CatalogConfig::default(),
            captcha: CaptchaConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.challenge_params(), ChallengeParams::new(4, 8, 2));
        assert_eq!(config.timeout(), TimeDelta::seconds(600));
        assert!(config.captcha.notify_on_fail);
        assert!(!config.captcha.ban_on_fail);
        assert!(!config.leave_unknown_groups);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
admins = [11, 12]
leave_unknown_groups = true

[captcha]
correct_glyphs = 3
required_correct = 2
total_buttons = 6
ban_on_fail = true

[transport]
call_timeout_secs = 3
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.admins, vec![UserId(11), UserId(12)]);
        assert_eq!(config.challenge_params().required_correct(), 2);
        assert_eq!(config.captcha.error_budget, 2);
        assert_eq!(config.call_timeout(), Duration::from_secs(3));
        assert_eq!(config.transport.outbox_capacity, 10_000);

        let settings = config.gate_settings();
        assert!(settings.ban_on_fail);
        assert!(settings.leave_unknown_groups);
        assert_eq!(settings.params.total_buttons, 6);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[captcha]\ntotal_buttons = 7").unwrap();
        assert!(AppConfig::load(file.path()).is_err());

        let mut config = AppConfig::default();
        config.catalog.min_codepoints = 3;
        config.catalog.max_codepoints = 2;
        assert!(matches!(config.validate(), Err(GateError::Config(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let config = AppConfig::default().with_overrides(Some("0.0.0.0:80".into()), Some("glyphs".into()));
        assert_eq!(config.listen_addr, "0.0.0.0:80");
        assert_eq!(config.catalog.glyph_dir, PathBuf::from("glyphs"));
    }
}
