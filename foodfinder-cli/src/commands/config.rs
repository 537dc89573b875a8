use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use shared::config::server::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ConfigFormat {
    #[default]
    Yaml,
    Json,
}

impl ConfigFormat {
    const fn file_name(self) -> &'static str {
        match self {
            Self::Yaml => "config.yaml",
            Self::Json => "config.json",
        }
    }
}

/// Writes the default server configuration into `output_dir`.
///
/// The API key is never written; supply it through `GEMINI_API_KEY`.
///
/// # Errors
/// Returns an error if serialization or writing the file fails.
pub fn generate_config(format: ConfigFormat, output_dir: &Path) -> Result<PathBuf> {
    let config = Config::default();
    let serialized = match format {
        ConfigFormat::Yaml => serde_yml::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
    };

    let path = output_dir.join(format.file_name());
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Configuration file '{}' generated successfully.", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generated_yaml_loads_back() {
        let dir = tempdir().unwrap();
        let path = generate_config(ConfigFormat::Yaml, dir.path()).unwrap();

        assert!(path.ends_with("config.yaml"));
        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.server.port, Config::default().server.port);
        assert_eq!(loaded.gemini.fallback_models, Config::default().gemini.fallback_models);
    }

    #[test]
    fn test_generated_json_has_no_api_key() {
        let dir = tempdir().unwrap();
        let path = generate_config(ConfigFormat::Json, dir.path()).unwrap();

        let contents = fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert!(value["gemini"].get("api_key").is_none());
        assert_eq!(value["gemini"]["choice_cache_ttl_seconds"], 3600);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(generate_config(ConfigFormat::Yaml, &dir.path().join("nope")).is_err());
    }
}
