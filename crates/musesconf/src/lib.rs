//! Layered configuration loading for Muses.
//!
//! This crate is imported by every Muses crate, so it stays small and
//! free of runtime dependencies.
//!
//! # Configuration Philosophy
//!
//! Configuration is split into two categories:
//!
//! - **Infrastructure** (`PortsConfig`, `TelemetryConfig`): which MIDI ports
//!   to open and how loudly to log.
//!
//! - **Performance** (`TempoConfig`, `HarmonyConfig`, `GeneratorConfig`,
//!   `PlaybackConfig`): musical parameters that seed the engine.
//!
//! Everything is validated once, before any port is opened. Invalid values
//! abort startup.
//!
//! # Usage
//!
//! ```rust,no_run
//! use musesconf::MusesConfig;
//!
//! let config = MusesConfig::load().expect("Failed to load config");
//! config.validate().expect("invalid config");
//!
//! println!("tempo: {} bpm", config.tempo.bpm);
//! println!("input port: {}", config.ports.input);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/muses/config.toml` (system)
//! 2. `~/.config/muses/config.toml` (user)
//! 3. `./muses.toml` (local override, replaced by `--config` when given)
//! 4. Environment variables (`MUSES_*`)
//!
//! # Example Config
//!
//! ```toml
//! [ports]
//! input = "Keystation"
//! melody = "IAC Bus 1"
//! chord = "IAC Bus 2"
//! rhythm = "IAC Bus 3"
//!
//! [tempo]
//! bpm = 74.0
//! measures_per_scale_change = 4
//!
//! [generator]
//! markov_order = 3
//! markov_inertia = 0.7
//! melody_octaves = [4, 6]
//! chord_octaves = [2, 5]
//!
//! [harmony]
//! channel_map = [1, 2, 3, 4, 5, 6, 7]
//! ```

pub mod infra;
pub mod loader;
pub mod performance;

pub use infra::{PortsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use performance::{
    GeneratorConfig, HarmonyConfig, OctaveRange, PlaybackConfig, RhythmSource, TempoConfig,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to render config: {0}")]
    Render(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Complete Muses configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MusesConfig {
    #[serde(default)]
    pub ports: PortsConfig,

    #[serde(default)]
    pub tempo: TempoConfig,

    #[serde(default)]
    pub harmony: HarmonyConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl MusesConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut table = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path)? {
            let file_table = loader::load_table(&path)?;
            loader::merge_tables(&mut table, file_table);
            sources.files.push(path);
        }

        let mut config = loader::from_table(table, Path::new("<merged>"))?;
        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Check every value the engine depends on.
    ///
    /// Ports are not checked here; a missing port surfaces when the engine
    /// tries to open it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tempo = &self.tempo;
        if !(tempo.bpm.is_finite() && tempo.bpm > 0.0) {
            return Err(ConfigError::invalid(
                "tempo.bpm",
                format!("must be > 0, got {}", tempo.bpm),
            ));
        }
        if tempo.beats_per_measure == 0 {
            return Err(ConfigError::invalid("tempo.beats_per_measure", "must be > 0"));
        }
        if tempo.measures_per_scale_change == 0 {
            return Err(ConfigError::invalid(
                "tempo.measures_per_scale_change",
                "must be > 0",
            ));
        }

        let generator = &self.generator;
        if generator.markov_order == 0 {
            return Err(ConfigError::invalid("generator.markov_order", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&generator.markov_inertia) {
            return Err(ConfigError::invalid(
                "generator.markov_inertia",
                format!("must be within [0, 1], got {}", generator.markov_inertia),
            ));
        }
        if generator.batch_size == 0 {
            return Err(ConfigError::invalid("generator.batch_size", "must be > 0"));
        }
        if generator.queue_capacity == 0 {
            return Err(ConfigError::invalid("generator.queue_capacity", "must be > 0"));
        }
        for (field, range) in [
            ("generator.melody_octaves", generator.melody_octaves),
            ("generator.chord_octaves", generator.chord_octaves),
        ] {
            if !range.is_valid() {
                return Err(ConfigError::invalid(
                    field,
                    format!(
                        "expected [low, high] with low <= high <= {}, got [{}, {}]",
                        OctaveRange::MAX_OCTAVE,
                        range.low(),
                        range.high()
                    ),
                ));
            }
        }

        let harmony = &self.harmony;
        if harmony.families.is_empty() {
            return Err(ConfigError::invalid("harmony.families", "at least one family required"));
        }
        for (i, family) in harmony.families.iter().enumerate() {
            let sum: u32 = family.iter().map(|&s| s as u32).sum();
            if family.len() != 7 || family.contains(&0) || sum != 12 {
                return Err(ConfigError::invalid(
                    "harmony.families",
                    format!("family {i} must be 7 positive steps summing to 12, got {family:?}"),
                ));
            }
        }
        if let Some(bad) = harmony.channel_map.iter().find(|&&c| !(1..=16).contains(&c)) {
            return Err(ConfigError::invalid(
                "harmony.channel_map",
                format!("channels must be within 1..=16, got {bad}"),
            ));
        }

        if self.playback.click_pitch > 127 {
            return Err(ConfigError::invalid("playback.click_pitch", "must be a MIDI pitch"));
        }

        Ok(())
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body = toml::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))?;
        Ok(format!("# Muses Configuration\n\n{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MusesConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tempo.bpm, 74.0);
    }

    #[test]
    fn test_to_toml() {
        let config = MusesConfig::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[tempo]"));
        assert!(toml.contains("[generator]"));
        assert!(toml.contains("markov_inertia"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = MusesConfig::default();
        config.ports.input = "keys".into();
        config.generator.seed = Some(7);
        let rendered = config.to_toml().unwrap();
        let table: toml::Table = rendered.parse().unwrap();
        let parsed = loader::from_table(table, Path::new("rendered")).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_non_positive_bpm() {
        let mut config = MusesConfig::default();
        config.tempo.bpm = 0.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "tempo.bpm", .. }));

        config.tempo.bpm = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_order() {
        let mut config = MusesConfig::default();
        config.generator.markov_order = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "generator.markov_order", .. })
        ));
    }

    #[test]
    fn test_rejects_inertia_out_of_range() {
        let mut config = MusesConfig::default();
        config.generator.markov_inertia = 1.5;
        assert!(config.validate().is_err());
        config.generator.markov_inertia = -0.1;
        assert!(config.validate().is_err());
        config.generator.markov_inertia = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_malformed_octaves() {
        let mut config = MusesConfig::default();
        config.generator.melody_octaves = OctaveRange(6, 4);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "generator.melody_octaves", .. })
        ));

        let mut config = MusesConfig::default();
        config.generator.chord_octaves = OctaveRange(2, 12);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "generator.chord_octaves", .. })
        ));
    }

    #[test]
    fn test_octave_nine_is_out_of_range() {
        let mut config = MusesConfig::default();
        config.generator.melody_octaves = OctaveRange(9, 9);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "generator.melody_octaves", .. })
        ));

        config.generator.melody_octaves = OctaveRange(8, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_config_path_fails_load() {
        let err = MusesConfig::load_with_sources_from(Some(Path::new(
            "/nonexistent/muses-typo.toml",
        )))
        .unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_rejects_bad_family() {
        let mut config = MusesConfig::default();
        config.harmony.families = vec![vec![2, 2, 2, 2, 2, 2, 2]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_channel() {
        let mut config = MusesConfig::default();
        config.harmony.channel_map = [1, 2, 3, 4, 5, 6, 0];
        assert!(config.validate().is_err());
    }
}
