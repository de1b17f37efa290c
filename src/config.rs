//! TOML-based site configuration for a twin run.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Top-level twin configuration parsed from a site's `twin.toml`.
///
/// All fields have defaults so a minimal site file only needs to name what
/// it changes. Load with [`TwinConfig::from_toml_file`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwinConfig {
    /// Run length, warmup, and identity parameters.
    #[serde(default)]
    pub run: RunConfig,
    /// File names of the row tables, relative to the site directory.
    #[serde(default)]
    pub tables: TablesConfig,
    /// Building model template and rewrite output.
    #[serde(default)]
    pub model: ModelConfig,
    /// Real-time pacing parameters.
    #[serde(default)]
    pub pacing: PacingConfig,
    /// Site geography, used by solar conversion functions.
    #[serde(default)]
    pub site: SiteConfig,
    /// Durable store parameters.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Live-publish parameters.
    #[serde(default)]
    pub publish: PublishConfig,
    /// Bundled stub engine parameters.
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Run length, warmup, and identity parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Identifier for this twin instance; keys the durable store.
    pub twin_id: String,
    /// Days of data collection (must be > 0).
    pub run_length_days: i64,
    /// Days of simulated lead-in before data collection starts.
    pub warmup_days: i64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            twin_id: "twin".to_string(),
            run_length_days: 1,
            warmup_days: 0,
        }
    }
}

/// File names of the row tables, relative to the site directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TablesConfig {
    pub signals_file: String,
    pub sensors_file: String,
    pub actuators_file: String,
    pub extensions_file: String,
    /// Historian replay file; only read when a signal declares the
    /// `historian` source.
    pub historian_file: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            signals_file: "signals.csv".to_string(),
            sensors_file: "sensors.csv".to_string(),
            actuators_file: "actuators.csv".to_string(),
            extensions_file: "extensions.csv".to_string(),
            historian_file: "historian.csv".to_string(),
        }
    }
}

/// Building model template and rewrite output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Template model file, relative to the site directory.
    pub template_file: String,
    /// Rewritten model written before invocation, relative to the site
    /// directory.
    pub output_file: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            template_file: "building.idf".to_string(),
            output_file: "twin_in.idf".to_string(),
        }
    }
}

/// Real-time pacing parameters.
///
/// The orchestrator blocks at each timestep until wall clock has passed
/// the simulated timestamp plus `buffer_minutes`, polling every
/// `poll_seconds`. Replaying a historical start date never waits because
/// wall clock is already past the threshold.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    /// How far wall clock must be past a simulated timepoint before the
    /// step may proceed (must be >= 0).
    pub buffer_minutes: i64,
    /// Poll interval of the pacing wait (must be > 0).
    pub poll_seconds: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            buffer_minutes: 5,
            poll_seconds: 5,
        }
    }
}

/// Site geography, used by solar conversion functions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Latitude in degrees, positive north (must be in [-90, 90]).
    pub latitude: f64,
    /// Longitude in degrees, positive east (must be in [-180, 180]).
    pub longitude: f64,
    /// Offset of local standard time from UTC in hours.
    pub utc_offset_hours: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            utc_offset_hours: 0.0,
        }
    }
}

/// Durable store parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Journal file, relative to the site directory.
    pub journal_file: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            journal_file: "twin_journal.csv".to_string(),
        }
    }
}

/// Live-publish parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Whether the live tag board and its publish loop run at all.
    pub enabled: bool,
    /// Publish-loop wake interval (must be > 0 when enabled).
    pub interval_seconds: u64,
    /// Tags operators may write from the live side; the publish loop never
    /// overwrites these.
    pub writable_tags: Vec<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: 10,
            writable_tags: Vec::new(),
        }
    }
}

/// Bundled stub engine parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Engine timestep length (must divide 60).
    pub step_minutes: i64,
    /// Timesteps the stub reports as warmup after readiness.
    pub warmup_steps: usize,
    /// Seed for the stub's synthetic sensor noise.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            step_minutes: 15,
            warmup_steps: 0,
            seed: 42,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"pacing.poll_seconds"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

impl TwinConfig {
    /// Returns the all-defaults configuration.
    pub fn default_site() -> Self {
        Self {
            run: RunConfig::default(),
            tables: TablesConfig::default(),
            model: ModelConfig::default(),
            pacing: PacingConfig::default(),
            site: SiteConfig::default(),
            persistence: PersistenceConfig::default(),
            publish: PublishConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is
    /// invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "twin.toml".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown
    /// fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.run.twin_id.is_empty() {
            errors.push(ConfigError {
                field: "run.twin_id".into(),
                message: "must not be empty".into(),
            });
        }
        if self.run.run_length_days <= 0 {
            errors.push(ConfigError {
                field: "run.run_length_days".into(),
                message: "must be > 0".into(),
            });
        }
        if self.run.warmup_days < 0 {
            errors.push(ConfigError {
                field: "run.warmup_days".into(),
                message: "must be >= 0".into(),
            });
        }

        if self.pacing.buffer_minutes < 0 {
            errors.push(ConfigError {
                field: "pacing.buffer_minutes".into(),
                message: "must be >= 0".into(),
            });
        }
        if self.pacing.poll_seconds == 0 {
            errors.push(ConfigError {
                field: "pacing.poll_seconds".into(),
                message: "must be > 0".into(),
            });
        }

        if !(-90.0..=90.0).contains(&self.site.latitude) {
            errors.push(ConfigError {
                field: "site.latitude".into(),
                message: "must be in [-90, 90]".into(),
            });
        }
        if !(-180.0..=180.0).contains(&self.site.longitude) {
            errors.push(ConfigError {
                field: "site.longitude".into(),
                message: "must be in [-180, 180]".into(),
            });
        }

        if self.publish.enabled && self.publish.interval_seconds == 0 {
            errors.push(ConfigError {
                field: "publish.interval_seconds".into(),
                message: "must be > 0 when publish is enabled".into(),
            });
        }

        if self.simulator.step_minutes <= 0 || 60 % self.simulator.step_minutes != 0 {
            errors.push(ConfigError {
                field: "simulator.step_minutes".into(),
                message: "must be > 0 and divide 60".into(),
            });
        }

        errors
    }
}
