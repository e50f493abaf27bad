//! Reading check and fixture documents from YAML or JSON.

use crate::checks::types::{Check, CheckTest};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported check document {0}: expected a .yaml, .yml or .json file")]
    UnsupportedFormat(String),
}

/// Encoding of a check or fixture document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

fn parse_document<T: serde::de::DeserializeOwned>(
    content: &str,
    format: DocumentFormat,
    source: &str,
) -> Result<T, LoadError> {
    let parsed = match format {
        DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        DocumentFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| LoadError::Parse {
        path: source.to_string(),
        message,
    })
}

/// Parse a single check. `source` becomes the check's path.
pub fn parse_check(content: &str, format: DocumentFormat, source: &str) -> Result<Check, LoadError> {
    let mut check: Check = parse_document(content, format, source)?;
    check.path = source.to_string();
    Ok(check)
}

/// Parse a fixture document: a list of tests for one check.
pub fn parse_tests(content: &str, format: DocumentFormat, source: &str) -> Result<Vec<CheckTest>, LoadError> {
    parse_document(content, format, source)
}

/// Parse a Kubernetes object written as YAML or JSON.
///
/// JSON is valid YAML, so a single YAML parse covers both.
pub fn parse_object(content: &str) -> Result<serde_json::Value, LoadError> {
    serde_yaml::from_str(content).map_err(|e| LoadError::Parse {
        path: "<input>".to_string(),
        message: e.to_string(),
    })
}

/// Load a check from a file on disk.
pub fn load_check_file(path: &Path) -> Result<Check, LoadError> {
    let display = path.display().to_string();
    let format = DocumentFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(display.clone()))?;
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    log::debug!("Loaded check document {}", display);
    parse_check(&content, format, &display)
}

/// Load a fixture document from a file on disk.
pub fn load_tests_file(path: &Path) -> Result<Vec<CheckTest>, LoadError> {
    let display = path.display().to_string();
    let format = DocumentFormat::from_path(path).ok_or_else(|| LoadError::UnsupportedFormat(display.clone()))?;
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    parse_tests(&content, format, &display)
}
