//! JSON configuration-file loading.
//!
//! Reads a JSON document into any `Deserialize` configuration struct. Kept
//! deliberately small: one file, one struct, no layering or interpolation.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// What can go wrong while loading configuration. Both variants name the
/// offending file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads `path` and deserializes the JSON found there into `T`.
pub fn load<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|source| ConfigError::Io { path: path.to_owned(), source })?;
    serde_json::from_slice(&bytes)
        .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })
}

/// Like [`load`], but an absent path yields the default configuration — for
/// applications where the config file flag is optional.
pub fn load_or_default<T>(path: Option<&Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) => load(path),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct TestConfig {
        addr: String,
        verbose: bool,
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_a_json_file() {
        let path = temp_file("torii-config-ok.json", r#"{"addr":"0.0.0.0:3000","verbose":true}"#);
        let config: TestConfig = load(&path).unwrap();
        assert_eq!(TestConfig { addr: "0.0.0.0:3000".into(), verbose: true }, config);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result: Result<TestConfig, _> = load("/nonexistent/torii-config.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let path = temp_file("torii-config-bad.json", "{");
        let result: Result<TestConfig, _> = load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn absent_path_yields_the_default() {
        let config: TestConfig = load_or_default(None).unwrap();
        assert_eq!(TestConfig::default(), config);
    }
}
