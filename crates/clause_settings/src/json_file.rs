//! JSON document persistence with atomic replacement.

use clause_error::{SettingsError, SettingsErrorKind, SettingsResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Read a JSON object from disk.
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`SettingsErrorKind::Io`] if the file exists but cannot be read, and
/// [`SettingsErrorKind::Parse`] if it is not a JSON object.
#[instrument(fields(path = %path.display()))]
pub fn read_json_object(path: &Path) -> SettingsResult<Option<Map<String, Value>>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("JSON document not found");
            return Ok(None);
        }
        Err(e) => {
            return Err(SettingsError::new(SettingsErrorKind::Io(format!(
                "{}: {}",
                path.display(),
                e
            ))));
        }
    };

    parse_json_object(path, &contents).map(Some)
}

/// Parse a JSON object already read from `path`.
pub(crate) fn parse_json_object(path: &Path, contents: &str) -> SettingsResult<Map<String, Value>> {
    match serde_json::from_str(contents) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(SettingsError::new(SettingsErrorKind::Parse(format!(
            "{}: expected a JSON object, found {}",
            path.display(),
            json_type_name(&other)
        )))),
        Err(e) => Err(SettingsError::new(SettingsErrorKind::Parse(format!(
            "{}: {}",
            path.display(),
            e
        )))),
    }
}

/// Write a value as pretty-printed JSON, replacing the file atomically.
///
/// The document is written to a sibling `.tmp` file and renamed over the
/// target, so readers never observe a half-written file. Parent directories
/// are created as needed.
///
/// # Errors
///
/// Returns [`SettingsErrorKind::Serialize`] if the value cannot be encoded and
/// [`SettingsErrorKind::Io`] if any filesystem step fails.
#[instrument(skip(value), fields(path = %path.display()))]
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> SettingsResult<()> {
    let mut encoded = serde_json::to_string_pretty(value)
        .map_err(|e| SettingsError::new(SettingsErrorKind::Serialize(e.to_string())))?;
    encoded.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let temp_path = temp_path_for(path);
    std::fs::write(&temp_path, encoded).map_err(|e| io_error(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| io_error(path, e))?;

    debug!("JSON document written");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[track_caller]
fn io_error(path: &Path, err: std::io::Error) -> SettingsError {
    SettingsError::new(SettingsErrorKind::Io(format!("{}: {}", path.display(), err)))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let result = read_json_object(&dir.path().join("absent.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_write_creates_parents_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/data/settings.json");

        write_json_atomic(&path, &json!({ "max_queue_size": 3 })).unwrap();

        let object = read_json_object(&path).unwrap().unwrap();
        assert_eq!(object["max_queue_size"], json!(3));
        assert!(!dir.path().join("nested/data/settings.json.tmp").exists());
    }

    #[test]
    fn test_non_object_document_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let err = read_json_object(&path).unwrap_err();
        assert!(matches!(err.kind(), SettingsErrorKind::Parse(msg) if msg.contains("an array")));
    }

    #[test]
    fn test_corrupt_document_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ \"max_queue_size\": ").unwrap();

        assert!(matches!(
            read_json_object(&path).unwrap_err().kind(),
            SettingsErrorKind::Parse(_)
        ));
    }
}
