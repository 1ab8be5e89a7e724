//! ets_options: checker options.
//!
//! Options are read from the `checkerOptions` object of a JSON config
//! file, or built in code. Every field is optional in the file; absent
//! fields take the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options that change how the checker behaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckerOptions {
    /// Stop reporting after this many errors.
    pub max_errors: Option<usize>,
    /// When off, `null` and `undefined` are assignable to every reference type.
    pub strict_null_checks: bool,
    /// Let a lambda omit trailing optional parameters of its target.
    pub infer_optional_lambda_params: bool,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            max_errors: None,
            strict_null_checks: true,
            infer_optional_lambda_params: true,
        }
    }
}

/// The on-disk config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub checker_options: Option<CheckerOptions>,
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse checker options from config file text.
pub fn parse_options(content: &str) -> Result<CheckerOptions, OptionsError> {
    let config: ConfigFile = serde_json::from_str(content)?;
    Ok(config.checker_options.unwrap_or_default())
}

/// Read and parse checker options from a config file.
pub fn load_options(path: impl AsRef<Path>) -> Result<CheckerOptions, OptionsError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_options(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = CheckerOptions::default();
        assert!(opts.strict_null_checks);
        assert!(opts.infer_optional_lambda_params);
        assert_eq!(opts.max_errors, None);
    }

    #[test]
    fn test_parse_partial_options() {
        let opts = parse_options(r#"{ "checkerOptions": { "maxErrors": 5, "strictNullChecks": false } }"#).unwrap();
        assert_eq!(opts.max_errors, Some(5));
        assert!(!opts.strict_null_checks);
        assert!(opts.infer_optional_lambda_params);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let opts = parse_options("{}").unwrap();
        assert_eq!(opts, CheckerOptions::default());
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_options("{ not json").unwrap_err();
        assert!(matches!(err, OptionsError::Json(_)));
        assert!(err.to_string().starts_with("invalid config"));
    }

    #[test]
    fn test_missing_file() {
        let err = load_options("/nonexistent/ets-config.json").unwrap_err();
        assert!(matches!(err, OptionsError::Io { .. }));
    }
}
