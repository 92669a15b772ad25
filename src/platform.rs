use std::{env, path::PathBuf};

use crate::logging::append_runtime_log;

const PLATFORM_PATHS_ENV: &str = "BLUEPRINT_PLATFORM_PATHS";

/// Well-known MetaTrader 5 install locations per operating system.
#[cfg(target_os = "windows")]
pub fn platform_candidate_paths() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from("C:\\Program Files\\MetaTrader 5\\terminal64.exe"),
        PathBuf::from("C:\\Program Files (x86)\\MetaTrader 5\\terminal64.exe"),
    ];
    if let Some(home) = home::home_dir() {
        candidates.push(
            home.join("AppData")
                .join("Local")
                .join("Programs")
                .join("MetaTrader 5")
                .join("terminal64.exe"),
        );
    }
    candidates
}

#[cfg(target_os = "macos")]
pub fn platform_candidate_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("/Applications/MetaTrader 5.app")]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub fn platform_candidate_paths() -> Vec<PathBuf> {
    // MetaTrader 5 has no native build here; detection always fails and the
    // shell routes to setup.
    Vec::new()
}

pub fn parse_candidate_paths_override(raw: &str) -> Vec<PathBuf> {
    env::split_paths(raw.trim())
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}

pub fn any_candidate_present(candidates: &[PathBuf]) -> bool {
    candidates.iter().any(|path| path.exists())
}

/// Recomputed fresh on every call; never cached, including for explicit
/// rechecks from the setup page.
pub fn platform_present() -> bool {
    let candidates = match env::var(PLATFORM_PATHS_ENV) {
        Ok(raw) => parse_candidate_paths_override(&raw),
        Err(_) => platform_candidate_paths(),
    };
    let present = any_candidate_present(&candidates);
    append_runtime_log(&format!(
        "platform check: candidates={}, present={}",
        candidates.len(),
        present
    ));
    present
}
