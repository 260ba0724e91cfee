//! Infrastructure configuration - things that cannot change once the engine runs.

use serde::{Deserialize, Serialize};

/// MIDI port selection.
///
/// Ports are matched by substring against the names reported by the MIDI
/// backend, so `"IAC"` will match `"IAC Driver Bus 1"`. Empty means unset;
/// the engine refuses to start without all four.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortsConfig {
    /// Port the performer plays into.
    #[serde(default)]
    pub input: String,

    /// Output port for the generated melody.
    #[serde(default)]
    pub melody: String,

    /// Output port for the chord pad.
    #[serde(default)]
    pub chord: String,

    /// Output port for the rhythmic click.
    #[serde(default)]
    pub rhythm: String,
}

impl PortsConfig {
    /// Names of the ports that are still unset.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.input.is_empty() {
            missing.push("input");
        }
        if self.melody.is_empty() {
            missing.push("melody");
        }
        if self.chord.is_empty() {
            missing.push("chord");
        }
        if self.rhythm.is_empty() {
            missing.push("rhythm");
        }
        missing
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter directive (trace, debug, info, warn, error, or an
    /// `EnvFilter` expression such as `info,muses=debug`).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
