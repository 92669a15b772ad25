use std::{fs, path::Path, path::PathBuf};

use crate::runtime_paths;

pub const CONFIG_FILE_NAME: &str = "config.json";

pub fn config_file_path() -> Option<PathBuf> {
    runtime_paths::blueprint_root_dir().map(|root| root.join(CONFIG_FILE_NAME))
}

/// Presence is the sole first-run signal; the content is never validated
/// here, so a stat is all this does. Any error reads as "absent".
pub fn config_record_exists(path: &Path) -> bool {
    path.is_file()
}

/// Wholesale overwrite via a sibling temp file and rename, so an interrupted
/// save never corrupts a previously written record.
pub fn save_config_record(path: &Path, record: &serde_json::Value) -> Result<(), String> {
    let parent = path
        .parent()
        .ok_or_else(|| format!("Config path has no parent directory: {}", path.display()))?;
    fs::create_dir_all(parent).map_err(|error| {
        format!(
            "Failed to create config directory {}: {}",
            parent.display(),
            error
        )
    })?;

    let serialized = serde_json::to_string_pretty(record)
        .map_err(|error| format!("Failed to serialize config record: {error}"))?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, serialized.as_bytes()).map_err(|error| {
        format!(
            "Failed to write config record {}: {}",
            temp_path.display(),
            error
        )
    })?;
    fs::rename(&temp_path, path).map_err(|error| {
        format!(
            "Failed to replace config record {}: {}",
            path.display(),
            error
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_record_reads_as_absent() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(!config_record_exists(&dir.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("deeper").join(CONFIG_FILE_NAME);

        save_config_record(&path, &json!({"installDir": "/opt/mt5"})).expect("save config");
        assert!(config_record_exists(&path));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read config"))
                .expect("parse config");
        assert_eq!(written["installDir"], "/opt/mt5");
    }

    #[test]
    fn save_replaces_prior_record_wholesale() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);

        save_config_record(&path, &json!({"a": 1, "stale": true})).expect("first save");
        save_config_record(&path, &json!({"a": 2})).expect("second save");

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read config"))
                .expect("parse config");
        assert_eq!(written, json!({"a": 2}));
    }

    #[test]
    fn save_reports_failure_when_parent_is_a_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").expect("create blocker file");

        let result = save_config_record(&blocker.join(CONFIG_FILE_NAME), &json!({}));
        assert!(result.is_err());
    }
}
