//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, MusesConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in load order (system, user, local).
///
/// Standard locations are skipped when absent. A `cli_path` replaces
/// `./muses.toml` and must exist.
pub fn discover_config_files_with_override(
    cli_path: Option<&Path>,
) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/muses/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("muses/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if !path.is_file() {
            return Err(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such config file"),
            });
        }
        files.push(path.to_path_buf());
        return Ok(files);
    }

    let local = PathBuf::from("muses.toml");
    if local.exists() {
        files.push(local);
    }

    Ok(files)
}

/// Read a config file as a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Deserialize a (possibly merged) table into a config.
pub fn from_table(table: toml::Table, origin: &Path) -> Result<MusesConfig, ConfigError> {
    let mut config: MusesConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

    if let Some(model) = config.harmony.chord_model.take() {
        config.harmony.chord_model = Some(expand_path(&model.to_string_lossy()));
    }

    Ok(config)
}

/// Merge `overlay` into `base`, recursing into nested tables.
///
/// Scalars and arrays in `overlay` replace those in `base`; tables merge
/// key by key, so a user file only needs the keys it changes.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut MusesConfig, sources: &mut ConfigSources) {
    // Ports
    if let Ok(v) = env::var("MUSES_INPUT_PORT") {
        config.ports.input = v;
        sources.env_overrides.push("MUSES_INPUT_PORT".to_string());
    }
    if let Ok(v) = env::var("MUSES_MELODY_PORT") {
        config.ports.melody = v;
        sources.env_overrides.push("MUSES_MELODY_PORT".to_string());
    }
    if let Ok(v) = env::var("MUSES_CHORD_PORT") {
        config.ports.chord = v;
        sources.env_overrides.push("MUSES_CHORD_PORT".to_string());
    }
    if let Ok(v) = env::var("MUSES_RHYTHM_PORT") {
        config.ports.rhythm = v;
        sources.env_overrides.push("MUSES_RHYTHM_PORT".to_string());
    }

    // Performance
    if let Ok(v) = env::var("MUSES_BPM") {
        if let Ok(bpm) = v.parse() {
            config.tempo.bpm = bpm;
            sources.env_overrides.push("MUSES_BPM".to_string());
        }
    }
    if let Ok(v) = env::var("MUSES_SEED") {
        if let Ok(seed) = v.parse() {
            config.generator.seed = Some(seed);
            sources.env_overrides.push("MUSES_SEED".to_string());
        }
    }

    // Telemetry
    if let Ok(v) = env::var("MUSES_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("MUSES_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
