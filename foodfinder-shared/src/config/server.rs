use crate::config::gemini::GeminiConfig;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, str::FromStr};
use thiserror::Error;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format '{0}'. Use 'yaml' or 'json'.")]
    UnsupportedFormat(String),

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {var} value: {message}")]
    InvalidEnv { var: &'static str, message: String },

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Deployment profile. Controls defaults and whether diagnostics are exposed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Dev,
    Test,
    Prod,
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(format!("unknown profile '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: false,
            max_age_seconds: 600,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub request_id_header: String,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_id_header: "x-request-id".to_string(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Optional pre-built front-end bundle served next to the API.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct WebConfig {
    pub static_dir: Option<PathBuf>,
    /// Defaults to `index.html` inside `static_dir`.
    pub spa_index: Option<PathBuf>,
}

impl WebConfig {
    /// Index file used as the SPA fallback.
    #[must_use]
    pub fn index_path(&self) -> Option<PathBuf> {
        let static_dir = self.static_dir.as_ref()?;
        Some(
            self.spa_index
                .clone()
                .unwrap_or_else(|| static_dir.join("index.html")),
        )
    }
}

/// The main configuration structure for the Food Finder server
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub profile: Profile,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub web: WebConfig,
    pub gemini: GeminiConfig,
}

impl Config {
    /// Generates the default configuration for a profile.
    #[must_use]
    pub fn default_for_profile(profile: Profile) -> Self {
        let mut config = Self {
            profile,
            ..Self::default()
        };

        match profile {
            Profile::Dev => config.logging.level = "debug".to_string(),
            Profile::Test => config.logging.level = "warn".to_string(),
            Profile::Prod => config.logging.format = LogFormat::Json,
        }

        config
    }

    /// Whether upstream diagnostics may be returned to clients.
    #[must_use]
    pub fn expose_diagnostics(&self) -> bool {
        self.profile != Profile::Prod
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Environment variables only fill values the file left at their defaults;
    /// `GEMINI_*` variables always apply. `port_override` wins over both.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, an
    /// environment variable is malformed, or the result fails validation.
    pub fn load_config(
        config_path: Option<PathBuf>,
        port_override: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => {
                let profile = match env::var("FOODFINDER_PROFILE") {
                    Ok(value) => parse_env("FOODFINDER_PROFILE", &value)?,
                    Err(_) => Profile::default(),
                };
                Self::default_for_profile(profile)
            }
        };

        config.apply_env_defaults()?;
        config.gemini.apply_env_overrides();

        if let Some(port) = port_override {
            config.server.port = port;
        }

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Parses a YAML or JSON file, choosing the format by extension.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the file is unreadable, malformed, or has
    /// an unsupported extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if !matches!(extension.as_str(), "yaml" | "yml" | "json") {
            return Err(ConfigError::UnsupportedFormat(extension));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = if extension == "json" {
            serde_json::from_str(&content)?
        } else {
            serde_yml::from_str(&content)?
        };
        config.gemini.normalize();
        Ok(config)
    }

    fn apply_env_defaults(&mut self) -> Result<(), ConfigError> {
        let defaults = Self::default();

        if self.profile == defaults.profile {
            if let Ok(value) = env::var("FOODFINDER_PROFILE") {
                self.profile = parse_env("FOODFINDER_PROFILE", &value)?;
            }
        }
        if self.server.port == defaults.server.port {
            if let Ok(value) = env::var("FOODFINDER_SERVER_PORT") {
                self.server.port = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: "FOODFINDER_SERVER_PORT",
                    message: "must be a valid number between 1 and 65535".to_string(),
                })?;
            }
        }
        if self.logging.level == defaults.logging.level {
            if let Ok(value) = env::var("FOODFINDER_LOG_LEVEL") {
                self.logging.level = value.trim().to_string();
            }
        }
        if self.logging.format == defaults.logging.format {
            if let Ok(value) = env::var("FOODFINDER_LOG_FORMAT") {
                self.logging.format = parse_env("FOODFINDER_LOG_FORMAT", &value)?;
            }
        }
        if self.web.static_dir.is_none() {
            if let Ok(value) = env::var("FOODFINDER_STATIC_DIR") {
                self.web.static_dir = Some(PathBuf::from(value));
            }
        }

        Ok(())
    }

    /// Validate the complete configuration including Gemini settings
    ///
    /// # Errors
    /// Returns every validation problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("Invalid server port. Must be greater than 0.".to_string());
        }

        if self.server.request_id_header.trim().is_empty() {
            errors.push("server.request_id_header must not be empty".to_string());
        }

        if let Some(static_dir) = &self.web.static_dir {
            if !static_dir.exists() {
                errors.push(format!(
                    "Static directory does not exist: {}",
                    static_dir.display()
                ));
            }
        }

        if let Err(gemini_errors) = self.gemini.validate() {
            errors.extend(gemini_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|message| ConfigError::InvalidEnv { var, message })
}
