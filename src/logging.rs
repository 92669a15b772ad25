use std::{
    env,
    ffi::OsString,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};

use crate::{runtime_paths, DESKTOP_LOG_FILE, DESKTOP_LOG_MAX_BYTES, LOG_BACKUP_COUNT};

static DESKTOP_LOG_WRITE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopLogCategory {
    Startup,
    Runtime,
    Backend,
    Shutdown,
}

impl DesktopLogCategory {
    fn as_label(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Runtime => "runtime",
            Self::Backend => "backend",
            Self::Shutdown => "shutdown",
        }
    }
}

pub fn resolve_desktop_log_path() -> PathBuf {
    if let Ok(custom) = env::var("BLUEPRINT_DESKTOP_LOG_PATH") {
        let candidate = PathBuf::from(custom.trim());
        if !candidate.as_os_str().is_empty() {
            return candidate;
        }
    }

    if let Some(root) = runtime_paths::blueprint_root_dir() {
        return root.join("logs").join(DESKTOP_LOG_FILE);
    }

    env::temp_dir()
        .join("blueprint-terminal")
        .join("logs")
        .join(DESKTOP_LOG_FILE)
}

fn rotated_log_path(path: &Path, index: usize) -> PathBuf {
    let mut value = OsString::from(path.as_os_str());
    value.push(format!(".{index}"));
    PathBuf::from(value)
}

pub fn rotate_log_if_needed(path: &Path, max_bytes: u64, backup_count: usize) {
    if max_bytes == 0 || backup_count == 0 {
        return;
    }

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return,
    };
    if metadata.len() < max_bytes {
        return;
    }

    let oldest = rotated_log_path(path, backup_count);
    if let Err(error) = fs::remove_file(&oldest) {
        if error.kind() != std::io::ErrorKind::NotFound {
            eprintln!(
                "[log rotation] failed to remove oldest backup {}: {}",
                oldest.display(),
                error
            );
        }
    }

    for index in (1..backup_count).rev() {
        let source = rotated_log_path(path, index);
        if !source.exists() {
            continue;
        }
        let target = rotated_log_path(path, index + 1);
        if let Err(error) = fs::rename(&source, &target) {
            eprintln!(
                "[log rotation] failed to rename {} to {}: {}",
                source.display(),
                target.display(),
                error
            );
        }
    }

    if let Err(error) = fs::rename(path, rotated_log_path(path, 1)) {
        eprintln!(
            "[log rotation] failed to rotate {}: {}",
            path.display(),
            error
        );
    }
}

fn append_with_category(category: DesktopLogCategory, message: &str) {
    let path = resolve_desktop_log_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _guard = match DESKTOP_LOG_WRITE_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    rotate_log_if_needed(&path, DESKTOP_LOG_MAX_BYTES, LOG_BACKUP_COUNT);
    let timestamp = chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.3f %z")
        .to_string();
    let line = format!("[{}] [{}] {}\n", timestamp, category.as_label(), message);
    let _ = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()));
}

pub fn append_startup_log(message: &str) {
    append_with_category(DesktopLogCategory::Startup, message);
}

pub fn append_runtime_log(message: &str) {
    append_with_category(DesktopLogCategory::Runtime, message);
}

pub fn append_backend_log(message: &str) {
    append_with_category(DesktopLogCategory::Backend, message);
}

pub fn append_shutdown_log(message: &str) {
    append_with_category(DesktopLogCategory::Shutdown, message);
}

/// A panicking worker thread must never take the shell down with it; the
/// hook records the panic and lets the default handler print it.
pub fn install_panic_log_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        append_runtime_log(&format!("uncaught panic: {info}"));
        default_hook(info);
    }));
}
