//! File loading and document parsing.
//!
//! Configuration is TOML; resource manifests are multi-document YAML.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::result::Result;

/// Read a file into a string, mapping a missing file to [`Error::FileNotFound`].
///
/// # Errors
///
/// Returns an error if the file does not exist or cannot be read.
pub fn read_to_string(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::file_not_found(path));
    }
    std::fs::read_to_string(path).map_err(|e| Error::file_read_failed(path, e.to_string()))
}

/// Parse a TOML document.
///
/// # Errors
///
/// Returns [`Error::TomlParseFailed`] if the content is not valid for `T`.
pub fn parse_toml<T: DeserializeOwned>(source_name: &str, content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::toml_parse_failed(source_name, e.to_string()))
}

/// Parse every non-empty document of a YAML stream.
///
/// Empty documents (a trailing `---`, comment-only sections) are skipped.
///
/// # Errors
///
/// Returns [`Error::YamlParseFailed`] on the first document that does not parse as `T`.
pub fn parse_yaml_documents<T: DeserializeOwned>(source_name: &str, content: &str) -> Result<Vec<T>> {
    serde_yaml::Deserializer::from_str(content)
        .map(|document| {
            serde_yaml::Value::deserialize(document)
                .map_err(|e| Error::yaml_parse_failed(source_name, e.to_string()))
        })
        .filter(|value| !matches!(value, Ok(serde_yaml::Value::Null)))
        .map(|value| {
            value.and_then(|v| {
                serde_yaml::from_value(v)
                    .map_err(|e| Error::yaml_parse_failed(source_name, e.to_string()))
            })
        })
        .collect()
}

/// Load a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string(path)?;
    parse_toml(&path.display().to_string(), &content)
}

/// Load every document of a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or any document fails to parse.
pub fn load_yaml_documents<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = read_to_string(path)?;
    parse_yaml_documents(&path.display().to_string(), &content)
}
