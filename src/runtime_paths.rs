use std::{
    env,
    path::{Path, PathBuf},
};
use tauri::{path::BaseDirectory, AppHandle, Manager};

/// Per-user root for the Configuration Record and the desktop log.
/// `BLUEPRINT_CONFIG_DIR` overrides the default for tests and portable
/// deployments; `None` only when no home directory can be resolved.
pub fn blueprint_root_dir() -> Option<PathBuf> {
    if let Ok(custom) = env::var("BLUEPRINT_CONFIG_DIR") {
        let candidate = PathBuf::from(custom.trim());
        if !candidate.as_os_str().is_empty() {
            return Some(candidate);
        }
    }
    home::home_dir().map(|home| home.join(".blueprint-terminal"))
}

pub fn resolve_resource_path<F>(app: &AppHandle, relative_path: &str, log: F) -> Option<PathBuf>
where
    F: Fn(&str),
{
    if let Ok(path) = app.path().resolve(relative_path, BaseDirectory::Resource) {
        if path.exists() {
            return Some(path);
        }
    }

    log(&format!("resource not found: {relative_path}"));
    None
}

pub fn workspace_root_dir() -> PathBuf {
    let candidate = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    candidate
        .canonicalize()
        .unwrap_or_else(|_| candidate.to_path_buf())
}

pub fn is_backend_dir(candidate: &Path) -> bool {
    candidate.join("server.py").is_file()
}

/// `BLUEPRINT_BACKEND_DIR` override. Outranks both the packaged resource and
/// the workspace layout, but only when it actually holds the entry script.
pub fn explicit_backend_dir() -> Option<PathBuf> {
    explicit_backend_dir_from(env::var("BLUEPRINT_BACKEND_DIR").ok())
}

fn explicit_backend_dir_from(raw: Option<String>) -> Option<PathBuf> {
    let candidate = raw
        .map(|value| PathBuf::from(value.trim()))
        .filter(|path| !path.as_os_str().is_empty())?;
    if is_backend_dir(&candidate) {
        Some(candidate.canonicalize().unwrap_or(candidate))
    } else {
        None
    }
}

/// Development layout: the backend sources sit next to the shell crate.
pub fn detect_dev_backend_dir() -> Option<PathBuf> {
    detect_dev_backend_dir_with(workspace_root_dir())
}

fn detect_dev_backend_dir_with(workspace_root: PathBuf) -> Option<PathBuf> {
    let candidates = [
        workspace_root.join("python-backend"),
        workspace_root.join("..").join("python-backend"),
    ];
    for candidate in candidates {
        if is_backend_dir(&candidate) {
            return Some(candidate.canonicalize().unwrap_or(candidate));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;

    fn write_server_script(dir: &Path) {
        File::create(dir.join("server.py"))
            .and_then(|mut file| file.write_all(b"print('ok')"))
            .expect("create server.py");
    }

    #[test]
    fn backend_dir_requires_server_script() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert!(!is_backend_dir(dir.path()));

        write_server_script(dir.path());
        assert!(is_backend_dir(dir.path()));
    }

    #[test]
    fn explicit_backend_dir_requires_the_entry_script() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let raw = Some(dir.path().to_string_lossy().into_owned());
        assert!(explicit_backend_dir_from(raw.clone()).is_none());

        write_server_script(dir.path());
        let resolved =
            explicit_backend_dir_from(raw).expect("expected override dir to resolve");
        assert_eq!(
            resolved,
            dir.path().canonicalize().expect("canonicalize override dir")
        );
    }

    #[test]
    fn explicit_backend_dir_ignores_blank_values() {
        assert!(explicit_backend_dir_from(Some("   ".to_string())).is_none());
        assert!(explicit_backend_dir_from(None).is_none());
    }

    #[test]
    fn workspace_backend_dir_is_detected() {
        let workspace = tempfile::tempdir().expect("create workspace dir");
        let backend = workspace.path().join("python-backend");
        fs::create_dir_all(&backend).expect("create backend dir");
        write_server_script(&backend);

        let detected = detect_dev_backend_dir_with(workspace.path().to_path_buf())
            .expect("expected workspace backend dir to be detected");
        assert!(detected.ends_with("python-backend"));
    }
}
