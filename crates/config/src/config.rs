//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// A value is outside its accepted range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Title discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// Minimum title length in seconds passed to the disc tool (default 1200)
    #[serde(default = "default_min_length_secs")]
    pub min_length_secs: u32,
    /// Fraction of the disc image a title must exceed to count as a main feature
    #[serde(default = "default_size_cutoff")]
    pub size_cutoff: f64,
    /// Parallel inspection workers (0 = host core count)
    #[serde(default)]
    pub workers: u32,
}

fn default_min_length_secs() -> u32 {
    1200
}

fn default_size_cutoff() -> f64 {
    0.5
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_length_secs: default_min_length_secs(),
            size_cutoff: default_size_cutoff(),
            workers: 0,
        }
    }
}

/// MakeMKV tool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MakeMkvConfig {
    /// Name or path of the `makemkvcon` executable
    #[serde(default = "default_makemkv_binary")]
    pub binary: String,
}

fn default_makemkv_binary() -> String {
    "makemkvcon".to_string()
}

impl Default for MakeMkvConfig {
    fn default() -> Self {
        Self {
            binary: default_makemkv_binary(),
        }
    }
}

/// Remux pass settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessConfig {
    /// File the catalog is written to when a remux pass is interrupted
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
    /// Keep going after a failed remux instead of stopping the batch
    #[serde(default)]
    pub continue_on_error: bool,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("in_process.json")
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
            continue_on_error: false,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub makemkv: MakeMkvConfig,
    #[serde(default)]
    pub process: ProcessConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - ISO_REMUX_MIN_LENGTH -> discovery.min_length_secs
    /// - ISO_REMUX_SIZE_CUTOFF -> discovery.size_cutoff
    /// - ISO_REMUX_WORKERS -> discovery.workers
    /// - ISO_REMUX_MAKEMKVCON -> makemkv.binary
    /// - ISO_REMUX_CHECKPOINT -> process.checkpoint_path
    /// - ISO_REMUX_CONTINUE_ON_ERROR -> process.continue_on_error
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("ISO_REMUX_MIN_LENGTH") {
            if let Ok(secs) = val.parse::<u32>() {
                self.discovery.min_length_secs = secs;
            }
        }

        if let Ok(val) = env::var("ISO_REMUX_SIZE_CUTOFF") {
            if let Ok(cutoff) = val.parse::<f64>() {
                self.discovery.size_cutoff = cutoff;
            }
        }

        if let Ok(val) = env::var("ISO_REMUX_WORKERS") {
            if let Ok(workers) = val.parse::<u32>() {
                self.discovery.workers = workers;
            }
        }

        if let Ok(val) = env::var("ISO_REMUX_MAKEMKVCON") {
            if !val.trim().is_empty() {
                self.makemkv.binary = val;
            }
        }

        if let Ok(val) = env::var("ISO_REMUX_CHECKPOINT") {
            if !val.trim().is_empty() {
                self.process.checkpoint_path = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("ISO_REMUX_CONTINUE_ON_ERROR") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.process.continue_on_error = true,
                "false" | "0" | "no" => self.process.continue_on_error = false,
                _ => {}
            }
        }
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cutoff = self.discovery.size_cutoff;
        if !cutoff.is_finite() || !(0.0..1.0).contains(&cutoff) {
            return Err(ConfigError::Invalid(format!(
                "discovery.size_cutoff must be in [0, 1), got {}",
                cutoff
            )));
        }
        if self.makemkv.binary.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "makemkv.binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults. Environment
    /// overrides apply either way.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Env var tests share process state
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env_vars() {
        env::remove_var("ISO_REMUX_MIN_LENGTH");
        env::remove_var("ISO_REMUX_SIZE_CUTOFF");
        env::remove_var("ISO_REMUX_WORKERS");
        env::remove_var("ISO_REMUX_MAKEMKVCON");
        env::remove_var("ISO_REMUX_CHECKPOINT");
        env::remove_var("ISO_REMUX_CONTINUE_ON_ERROR");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            min_length in 0u32..10_000,
            cutoff in 0.0f64..1.0,
            workers in 0u32..128,
            binary in "[a-z/_-]{1,30}",
            checkpoint in "[a-z_]{1,20}\\.json",
            continue_on_error in proptest::bool::ANY,
        ) {
            let toml_str = format!(
                r#"
[discovery]
min_length_secs = {}
size_cutoff = {}
workers = {}

[makemkv]
binary = "{}"

[process]
checkpoint_path = "{}"
continue_on_error = {}
"#,
                min_length, cutoff, workers, binary, checkpoint, continue_on_error
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.discovery.min_length_secs, min_length);
            prop_assert!((config.discovery.size_cutoff - cutoff).abs() < 1e-9);
            prop_assert_eq!(config.discovery.workers, workers);
            prop_assert_eq!(&config.makemkv.binary, &binary);
            prop_assert_eq!(config.process.checkpoint_path, PathBuf::from(&checkpoint));
            prop_assert_eq!(config.process.continue_on_error, continue_on_error);
        }

        #[test]
        fn prop_env_overrides_min_length(
            initial in 0u32..5000,
            override_secs in 0u32..5000,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[discovery]\nmin_length_secs = {}\n", initial);
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("ISO_REMUX_MIN_LENGTH", override_secs.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.discovery.min_length_secs, override_secs);
        }

        #[test]
        fn prop_env_overrides_workers(
            initial in 0u32..64,
            override_workers in 0u32..64,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[discovery]\nworkers = {}\n", initial);
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("ISO_REMUX_WORKERS", override_workers.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.discovery.workers, override_workers);
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(config.discovery.min_length_secs, 1200);
        assert!((config.discovery.size_cutoff - 0.5).abs() < 1e-9);
        assert_eq!(config.discovery.workers, 0);
        assert_eq!(config.makemkv.binary, "makemkvcon");
        assert_eq!(config.process.checkpoint_path, PathBuf::from("in_process.json"));
        assert!(!config.process.continue_on_error);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let toml_str = r#"
[discovery]
size_cutoff = 0.4
"#;
        let config = Config::parse_toml(toml_str).expect("Partial TOML should parse");

        assert!((config.discovery.size_cutoff - 0.4).abs() < 1e-9);
        assert_eq!(config.discovery.min_length_secs, 1200);
        assert_eq!(config.makemkv, MakeMkvConfig::default());
        assert_eq!(config.process, ProcessConfig::default());
    }

    #[test]
    fn test_env_overrides_strings_and_flags() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("ISO_REMUX_MAKEMKVCON", "/opt/makemkv/bin/makemkvcon");
        env::set_var("ISO_REMUX_CHECKPOINT", "/var/lib/iso-remux/resume.json");
        env::set_var("ISO_REMUX_CONTINUE_ON_ERROR", "yes");
        env::set_var("ISO_REMUX_SIZE_CUTOFF", "not-a-number");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.makemkv.binary, "/opt/makemkv/bin/makemkvcon");
        assert_eq!(
            config.process.checkpoint_path,
            PathBuf::from("/var/lib/iso-remux/resume.json")
        );
        assert!(config.process.continue_on_error);
        // Unparseable override keeps the existing value
        assert!((config.discovery.size_cutoff - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_validate_rejects_out_of_range_cutoff() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.discovery.size_cutoff = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.discovery.size_cutoff = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let config = Config::load_or_default(None::<&Path>).expect("defaults are valid");
        assert_eq!(config, Config::default());
    }
}
