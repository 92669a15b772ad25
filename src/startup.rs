use tauri::{AppHandle, Manager};

use crate::{
    config_store,
    logging::{append_runtime_log, append_startup_log},
    platform, window, ShellState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupReason {
    FirstRun,
    PlatformMissing,
}

impl SetupReason {
    fn as_label(self) -> &'static str {
        match self {
            Self::FirstRun => "first run, no config record",
            Self::PlatformMissing => "trading platform not installed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchDecision {
    StartBackend,
    SetupRequired(SetupReason),
}

#[derive(Debug)]
enum StartupOutcome {
    BackendRunning,
    SetupRequired(SetupReason),
}

/// The launch gate: config presence first, platform second. The platform
/// probe is deliberately lazy; a first run decides without touching it.
/// Check failures land on the setup branch, never on a silent backend start.
pub fn evaluate_launch<C, P>(config_present: C, platform_present: P) -> LaunchDecision
where
    C: FnOnce() -> bool,
    P: FnOnce() -> bool,
{
    if !config_present() {
        return LaunchDecision::SetupRequired(SetupReason::FirstRun);
    }
    if !platform_present() {
        return LaunchDecision::SetupRequired(SetupReason::PlatformMissing);
    }
    LaunchDecision::StartBackend
}

fn config_record_present() -> bool {
    match config_store::config_file_path() {
        Some(path) => config_store::config_record_exists(&path),
        None => {
            // No resolvable home directory reads as a first run.
            append_startup_log("cannot resolve config directory, treating launch as first run");
            false
        }
    }
}

fn run_launch_sequence(app_handle: &AppHandle) -> Result<StartupOutcome, String> {
    let decision = evaluate_launch(config_record_present, platform::platform_present);
    match decision {
        LaunchDecision::SetupRequired(reason) => Ok(StartupOutcome::SetupRequired(reason)),
        LaunchDecision::StartBackend => {
            let state = app_handle.state::<ShellState>();
            state.launch_backend(app_handle)?;
            Ok(StartupOutcome::BackendRunning)
        }
    }
}

fn handle_launch_outcome(app_handle: &AppHandle, outcome: Result<StartupOutcome, String>) {
    match outcome {
        Ok(StartupOutcome::BackendRunning) => {
            if let Err(error) = window::run_on_main_thread_dispatch(
                app_handle,
                "navigate to backend",
                move |main_app| {
                    if let Err(navigate_error) = window::navigate_main_window_to_backend(main_app) {
                        append_startup_log(&navigate_error);
                    }
                },
            ) {
                append_startup_log(&error);
            }
        }
        Ok(StartupOutcome::SetupRequired(reason)) => {
            append_startup_log(&format!("setup required: {}", reason.as_label()));
            if let Err(error) =
                window::run_on_main_thread_dispatch(app_handle, "show setup page", |main_app| {
                    window::show_setup_page(main_app);
                })
            {
                append_startup_log(&error);
            }
        }
        Err(error) => {
            // Fatal to this launch attempt only; the shell survives on the
            // setup page and the user may retry via the bridge.
            let dialog_handle = app_handle.clone();
            tauri::async_runtime::spawn_blocking(move || {
                window::show_launch_failure(&dialog_handle, &error);
                if let Err(dispatch_error) = window::run_on_main_thread_dispatch(
                    &dialog_handle,
                    "show setup page",
                    |main_app| {
                        window::show_setup_page(main_app);
                    },
                ) {
                    append_startup_log(&dispatch_error);
                }
            });
        }
    }
}

/// One launch sequence per application lifetime, kicked off from `setup()`.
pub fn spawn_startup_task(app_handle: AppHandle) {
    tauri::async_runtime::spawn(async move {
        let worker_handle = app_handle.clone();
        let outcome = tauri::async_runtime::spawn_blocking(move || {
            run_launch_sequence(&worker_handle)
        })
        .await
        .map_err(|error| format!("Backend startup task failed: {error}"))
        .and_then(|result| result);

        handle_launch_outcome(&app_handle, outcome);
    });
}

/// Setup-page recheck: re-runs only the platform probe, never the config
/// presence check. A hit starts the backend through the same launch path.
pub fn run_platform_recheck(app_handle: &AppHandle) -> bool {
    let present = platform::platform_present();
    append_runtime_log(&format!("platform recheck requested: present={present}"));
    if !present {
        return false;
    }

    let task_handle = app_handle.clone();
    tauri::async_runtime::spawn(async move {
        let worker_handle = task_handle.clone();
        let outcome = tauri::async_runtime::spawn_blocking(move || {
            let state = worker_handle.state::<ShellState>();
            state
                .launch_backend(&worker_handle)
                .map(|()| StartupOutcome::BackendRunning)
        })
        .await
        .map_err(|error| format!("Backend launch task failed: {error}"))
        .and_then(|result| result);

        handle_launch_outcome(&task_handle, outcome);
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn missing_config_requires_setup_without_probing_the_platform() {
        let platform_probed = Cell::new(false);
        let decision = evaluate_launch(
            || false,
            || {
                platform_probed.set(true);
                true
            },
        );

        assert_eq!(decision, LaunchDecision::SetupRequired(SetupReason::FirstRun));
        assert!(
            !platform_probed.get(),
            "first-run decision must not touch the platform detector"
        );
    }

    #[test]
    fn present_config_with_missing_platform_requires_setup() {
        let decision = evaluate_launch(|| true, || false);
        assert_eq!(
            decision,
            LaunchDecision::SetupRequired(SetupReason::PlatformMissing)
        );
    }

    #[test]
    fn present_config_and_platform_starts_the_backend() {
        assert_eq!(evaluate_launch(|| true, || true), LaunchDecision::StartBackend);
    }

    #[test]
    fn setup_reasons_have_distinct_labels() {
        assert_ne!(
            SetupReason::FirstRun.as_label(),
            SetupReason::PlatformMissing.as_label()
        );
    }
}
