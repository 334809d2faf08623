//! # Parameter Builder
//!
//! Merges the three untyped parameter sources of an invocation into one mapping. Later sources
//! overwrite earlier ones key by key:
//!
//! 1. the parameter file (`-f`), YAML or JSON, nested maps and sequences kept as they are,
//! 2. the inline JSON document (`-j`), replacing whole top-level keys,
//! 3. repeated `key=value` tokens (`-p`), each value parsed as a JSON literal when possible.
//!
//! Paging directives of `list` calls are appended after the merge and always win.
use crate::options::{DEFAULT_PAGE_SIZE, FetchOptions};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// The merged request attributes of one invocation.
pub type ParameterSet = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("Invalid parameter '{0}', expected the 'key=value' format")]
    InvalidPair(String),
    #[error("Failed to read parameter file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid parameter file '{path}': {source}")]
    InvalidFile {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("Parameter file '{0}' must contain a mapping at the top level")]
    FileNotAMapping(PathBuf),
    #[error("Invalid JSON parameter: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("JSON parameter must be an object")]
    JsonNotAnObject,
}

/// Builds the parameter set of a `verb` call from the sources in `options`.
pub fn build(options: &FetchOptions, verb: &str) -> Result<ParameterSet, ParameterError> {
    let mut params = ParameterSet::new();

    if let Some(path) = &options.file_parameter {
        params.extend(read_file(path)?);
    }

    if let Some(json) = &options.json_parameter {
        match serde_json::from_str(json).map_err(ParameterError::InvalidJson)? {
            Value::Object(map) => params.extend(map),
            _ => return Err(ParameterError::JsonNotAnObject),
        }
    }

    for token in &options.parameters {
        let (key, value) = parse_pair(token)?;
        params.insert(key, value);
    }

    if verb == "list" && options.page > 0 {
        let page_size = match options.page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size,
        };
        params.shift_remove("page");
        params.shift_remove("page_size");
        params.insert("page".to_string(), Value::from(options.page));
        params.insert("page_size".to_string(), Value::from(page_size));
    }

    tracing::debug!(keys = params.len(), "built parameter set");
    Ok(params)
}

/// Splits a `key=value` token on the first `=` and infers the type of the value.
pub fn parse_pair(token: &str) -> Result<(String, Value), ParameterError> {
    match token.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), infer_value(value)))
        }
        _ => Err(ParameterError::InvalidPair(token.to_string())),
    }
}

/// Parses numbers, booleans, `null`, arrays and objects; anything else stays a string.
pub fn infer_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn read_file(path: &Path) -> Result<ParameterSet, ParameterError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParameterError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    // JSON is a subset of YAML, so one parser covers both file flavours.
    let document: Value =
        serde_yaml_ng::from_str(&content).map_err(|source| ParameterError::InvalidFile {
            path: path.to_path_buf(),
            source,
        })?;

    match document {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ParameterSet::new()),
        _ => Err(ParameterError::FileNotAMapping(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn options_with(parameters: &[&str]) -> FetchOptions {
        FetchOptions {
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    fn parameter_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn infers_value_types() {
        let params = build(&options_with(&["name=test", "count=3"]), "create").unwrap();
        assert_eq!(Value::Object(params), json!({ "name": "test", "count": 3 }));

        assert_eq!(infer_value("true"), json!(true));
        assert_eq!(infer_value("1.5"), json!(1.5));
        assert_eq!(infer_value(r#"{"a": [1, 2]}"#), json!({ "a": [1, 2] }));
        assert_eq!(infer_value("{not json"), json!("{not json"));
        assert_eq!(infer_value(""), json!(""));
    }

    #[test]
    fn splits_on_first_equals_sign() {
        let (key, value) = parse_pair("filter=a=b").unwrap();
        assert_eq!(key, "filter");
        assert_eq!(value, json!("a=b"));
    }

    #[test]
    fn malformed_pair_fails_the_whole_build() {
        let result = build(&options_with(&["name=test", "oops"]), "create");
        assert!(matches!(result, Err(ParameterError::InvalidPair(token)) if token == "oops"));

        assert!(parse_pair("=value").is_err());
    }

    #[test]
    fn key_value_pairs_override_file_and_json() {
        let file = parameter_file("name: from-file\ntags:\n  env: dev\nlist:\n  - 1\n  - 2\n");
        let options = FetchOptions {
            file_parameter: Some(file.path().to_path_buf()),
            json_parameter: Some(r#"{"tags": {"team": "core"}, "domain": "d-1"}"#.to_string()),
            parameters: vec!["name=from-pair".to_string()],
            ..Default::default()
        };

        let params = build(&options, "create").unwrap();

        assert_eq!(params["name"], json!("from-pair"));
        // The JSON document replaces whole top-level keys.
        assert_eq!(params["tags"], json!({ "team": "core" }));
        assert_eq!(params["list"], json!([1, 2]));
        assert_eq!(params["domain"], json!("d-1"));
    }

    #[test]
    fn paging_parameters_are_appended_last_for_list() {
        let options = FetchOptions {
            parameters: vec!["page=9".to_string(), "name=x".to_string()],
            page: 2,
            page_size: 20,
            ..Default::default()
        };

        let params = build(&options, "list").unwrap();
        let keys: Vec<_> = params.keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["name", "page", "page_size"]);
        assert_eq!(params["page"], json!(2));
        assert_eq!(params["page_size"], json!(20));

        let params = build(&options, "get").unwrap();
        assert_eq!(params["page"], json!(9));
    }

    #[test]
    fn invalid_sources_are_reported() {
        let file = parameter_file("- just\n- a list\n");
        let options = FetchOptions {
            file_parameter: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            build(&options, "create"),
            Err(ParameterError::FileNotAMapping(_))
        ));

        let options = FetchOptions {
            json_parameter: Some("[1, 2]".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            build(&options, "create"),
            Err(ParameterError::JsonNotAnObject)
        ));

        let options = FetchOptions {
            file_parameter: Some(PathBuf::from("/definitely/not/here.yaml")),
            ..Default::default()
        };
        assert!(matches!(
            build(&options, "create"),
            Err(ParameterError::ReadFile { .. })
        ));
    }
}
