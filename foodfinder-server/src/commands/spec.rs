//! Writes the OpenAPI document to a file or stdout.

use crate::openapi::ApiDoc;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use utoipa::OpenApi;

/// Where and how the document is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecTarget {
    StdoutYaml,
    StdoutJson,
    File(PathBuf),
}

impl SpecTarget {
    /// `json`/`yaml` stream to stdout, anything else is a file path, nothing is YAML on stdout.
    #[must_use]
    pub fn parse(output: Option<&str>) -> Self {
        match output {
            None | Some("yaml") => Self::StdoutYaml,
            Some("json") => Self::StdoutJson,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }
}

/// Renders the OpenAPI document as pretty JSON or YAML.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn render_spec(as_json: bool) -> anyhow::Result<String> {
    let openapi = ApiDoc::openapi();
    if as_json {
        Ok(openapi.to_pretty_json()?)
    } else {
        Ok(openapi.to_yaml()?)
    }
}

/// Generates the OpenAPI document for `output` (see [`SpecTarget::parse`]).
///
/// # Errors
/// Returns an error if the document cannot be rendered or written.
pub fn generate_spec(output: Option<&str>) -> anyhow::Result<()> {
    match SpecTarget::parse(output) {
        SpecTarget::StdoutYaml => io::stdout().write_all(render_spec(false)?.as_bytes())?,
        SpecTarget::StdoutJson => io::stdout().write_all(render_spec(true)?.as_bytes())?,
        SpecTarget::File(path) => {
            write_spec(&path)?;
            println!("OpenAPI spec written to {}", path.display());
        }
    }
    Ok(())
}

fn write_spec(path: &Path) -> anyhow::Result<()> {
    let as_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
    fs::write(path, render_spec(as_json)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_targets() {
        assert_eq!(SpecTarget::parse(None), SpecTarget::StdoutYaml);
        assert_eq!(SpecTarget::parse(Some("yaml")), SpecTarget::StdoutYaml);
        assert_eq!(SpecTarget::parse(Some("json")), SpecTarget::StdoutJson);
        assert_eq!(
            SpecTarget::parse(Some("out/api.yaml")),
            SpecTarget::File(PathBuf::from("out/api.yaml"))
        );
    }

    #[test]
    fn test_generate_spec_to_json() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("spec.json");
        generate_spec(output_path.to_str()).unwrap();

        let contents = fs::read_to_string(&output_path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert!(doc["paths"]["/api/chat"].is_object());
    }

    #[test]
    fn test_generate_spec_to_yaml() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("spec.yaml");
        generate_spec(output_path.to_str()).unwrap();

        let contents = fs::read_to_string(&output_path).unwrap();
        assert!(contents.contains("openapi:"));
        assert!(contents.contains("Food Finder API"));
    }
}
