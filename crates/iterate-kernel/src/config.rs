//! Panel configuration: playback and reveal timing, greeting, feature flags.
//!
//! Loaded from a RON file. Every section has `#[serde(default)]`, so a config
//! only needs the fields it changes:
//!
//! ```ron
//! (
//!     playback: (thinking_step_ms: 1000),
//!     flags: (debug_mode: true),
//!     seed: Some(7),
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Greeting shown as the first assistant message.
pub const DEFAULT_GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// Delays used to build a playback plan, relative to the submit instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackTiming {
    /// When the thinking placeholder appears.
    pub placeholder_delay_ms: u64,
    /// When the placeholder is removed and step replay begins.
    pub scenario_delay_ms: u64,
    /// Offset consumed by a thinking-note step.
    pub thinking_step_ms: u64,
    /// Offset consumed by a file-changes step.
    pub file_change_step_ms: u64,
    /// Gap between the end of the steps and the summary.
    pub summary_delay_ms: u64,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            placeholder_delay_ms: 500,
            scenario_delay_ms: 2000,
            thinking_step_ms: 2000,
            file_change_step_ms: 2500,
            summary_delay_ms: 1000,
        }
    }
}

impl PlaybackTiming {
    pub fn placeholder_delay(&self) -> Duration {
        Duration::from_millis(self.placeholder_delay_ms)
    }

    pub fn scenario_delay(&self) -> Duration {
        Duration::from_millis(self.scenario_delay_ms)
    }

    pub fn thinking_step(&self) -> Duration {
        Duration::from_millis(self.thinking_step_ms)
    }

    pub fn file_change_step(&self) -> Duration {
        Duration::from_millis(self.file_change_step_ms)
    }

    pub fn summary_delay(&self) -> Duration {
        Duration::from_millis(self.summary_delay_ms)
    }
}

/// Delays used by the progressive reveal of a file-change card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealTiming {
    /// Line `i` appears at `(i + 1) * line_interval`.
    pub line_interval_ms: u64,
    /// Gap between the last line and completion.
    pub complete_delay_ms: u64,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            line_interval_ms: 800,
            complete_delay_ms: 500,
        }
    }
}

impl RevealTiming {
    pub fn line_interval(&self) -> Duration {
        Duration::from_millis(self.line_interval_ms)
    }

    pub fn complete_delay(&self) -> Duration {
        Duration::from_millis(self.complete_delay_ms)
    }
}

/// Admin-panel feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub enable_new_chat_ui: bool,
    pub enable_advanced_search: bool,
    pub enable_beta_features: bool,
    /// Raises the default log level to `debug`.
    pub debug_mode: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_new_chat_ui: false,
            enable_advanced_search: true,
            enable_beta_features: false,
            debug_mode: false,
        }
    }
}

impl FeatureFlags {
    /// All flags as `(name, enabled)`, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        [
            ("enable_new_chat_ui", self.enable_new_chat_ui),
            ("enable_advanced_search", self.enable_advanced_search),
            ("enable_beta_features", self.enable_beta_features),
            ("debug_mode", self.debug_mode),
        ]
        .into_iter()
    }

    /// Flip a flag by name, returning its new value.
    pub fn toggle(&mut self, name: &str) -> Result<bool, ConfigError> {
        let flag = match name {
            "enable_new_chat_ui" => &mut self.enable_new_chat_ui,
            "enable_advanced_search" => &mut self.enable_advanced_search,
            "enable_beta_features" => &mut self.enable_beta_features,
            "debug_mode" => &mut self.debug_mode,
            other => return Err(ConfigError::UnknownFlag(other.to_string())),
        };
        *flag = !*flag;
        Ok(*flag)
    }
}

/// Complete panel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub playback: PlaybackTiming,
    pub reveal: RevealTiming,
    /// First assistant message; `None` starts with an empty timeline.
    pub greeting: Option<String>,
    pub flags: FeatureFlags,
    /// Fixes scenario selection for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackTiming::default(),
            reveal: RevealTiming::default(),
            greeting: Some(DEFAULT_GREETING.to_string()),
            flags: FeatureFlags::default(),
            seed: None,
        }
    }
}

impl PanelConfig {
    /// `$XDG_CONFIG_HOME/iterate/config.ron` (or the platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("iterate").join("config.ron"))
    }

    /// Load from a RON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    fn from_ron_str(content: &str) -> Result<Self, String> {
        ron::from_str(content).map_err(|e| e.to_string())
    }

    /// Serialize as pretty RON (for `flags --toggle` write-back).
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Write to a RON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.to_ron_string()?).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_playback_script() {
        let t = PlaybackTiming::default();
        assert_eq!(t.placeholder_delay(), Duration::from_millis(500));
        assert_eq!(t.scenario_delay(), Duration::from_millis(2000));
        assert_eq!(t.thinking_step(), Duration::from_millis(2000));
        assert_eq!(t.file_change_step(), Duration::from_millis(2500));
        assert_eq!(t.summary_delay(), Duration::from_millis(1000));

        let r = RevealTiming::default();
        assert_eq!(r.line_interval(), Duration::from_millis(800));
        assert_eq!(r.complete_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_ron_keeps_other_defaults() {
        let cfg = PanelConfig::from_ron_str(
            "(playback: (thinking_step_ms: 10), flags: (debug_mode: true), seed: Some(7))",
        )
        .unwrap();
        assert_eq!(cfg.playback.thinking_step_ms, 10);
        assert_eq!(cfg.playback.file_change_step_ms, 2500);
        assert!(cfg.flags.debug_mode);
        assert!(cfg.flags.enable_advanced_search);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.greeting.as_deref(), Some(DEFAULT_GREETING));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PanelConfig::load(&dir.path().join("nope.ron")).unwrap();
        assert_eq!(cfg, PanelConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ron");
        let mut cfg = PanelConfig::default();
        cfg.greeting = None;
        cfg.flags.toggle("enable_beta_features").unwrap();
        cfg.save(&path).unwrap();

        let loaded = PanelConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ron");
        std::fs::write(&path, "(playback: 12").unwrap();
        let err = PanelConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.ron"));
    }

    #[test]
    fn test_write_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = PanelConfig::default().save(&blocker.join("config.ron")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("blocker"));

        let err = ConfigError::Serialize("bad float".into());
        assert_eq!(err.to_string(), "failed to serialize config: bad float");
    }

    #[test]
    fn test_toggle_flags() {
        let mut flags = FeatureFlags::default();
        assert_eq!(flags.toggle("debug_mode").unwrap(), true);
        assert_eq!(flags.toggle("enable_advanced_search").unwrap(), false);
        assert!(matches!(
            flags.toggle("dark_mode"),
            Err(ConfigError::UnknownFlag(name)) if name == "dark_mode"
        ));
        let names: Vec<_> = flags.iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), 4);
    }
}
