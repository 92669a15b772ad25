#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod bridge;
mod config_store;
mod exit_flow;
mod launch;
mod lifecycle;
mod logging;
mod navigation;
mod platform;
mod process_control;
mod readiness;
mod runtime_paths;
mod startup;
mod supervisor;
mod window;

use std::{
    env,
    process::Child,
    sync::{atomic::AtomicBool, Mutex},
    time::Duration,
};

use tauri::{Manager, RunEvent, WindowEvent};

use crate::logging::append_startup_log;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000/";
const BACKEND_URL_ENV: &str = "BLUEPRINT_BACKEND_URL";
const BACKEND_TIMEOUT_ENV: &str = "BLUEPRINT_BACKEND_TIMEOUT_MS";
const DEFAULT_BACKEND_WAIT_TIMEOUT_MS: u64 = 30_000;
const BACKEND_WAIT_TIMEOUT_MIN_MS: u64 = 1_000;
const BACKEND_WAIT_TIMEOUT_MAX_MS: u64 = 10 * 60 * 1000;
const BACKEND_READY_POLL_INTERVAL_MS: u64 = 300;
const BACKEND_READY_PROBE_TIMEOUT_MS: u64 = 800;
const GRACEFUL_STOP_TIMEOUT_MS: u64 = 5_000;
const FINAL_EXIT_DELAY_MS: u64 = 1_000;
const EXIT_WATCH_INTERVAL: Duration = Duration::from_secs(2);
const DESKTOP_LOG_FILE: &str = "desktop.log";
const DESKTOP_LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;
const LOG_BACKUP_COUNT: usize = 3;
const MAIN_WINDOW_LABEL: &str = "main";
const WINDOW_TITLE: &str = "Blueprint Trading Terminal v2.1";

#[derive(Debug)]
pub(crate) struct ShellState {
    child: Mutex<Option<Child>>,
    backend_url: String,
    lifecycle: Mutex<lifecycle::LifecycleStateMachine>,
    is_starting: AtomicBool,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            child: Mutex::new(None),
            backend_url: navigation::normalize_backend_url(
                &env::var(BACKEND_URL_ENV).unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            ),
            lifecycle: Mutex::new(lifecycle::LifecycleStateMachine::default()),
            is_starting: AtomicBool::new(false),
        }
    }
}

fn main() {
    logging::install_panic_log_hook();
    append_startup_log("desktop shell starting");
    append_startup_log(&format!(
        "desktop log path: {}",
        logging::resolve_desktop_log_path().display()
    ));

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _argv, _cwd| {
            window::focus_main_window(app);
        }))
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_opener::init())
        .manage(ShellState::default())
        .invoke_handler(tauri::generate_handler![
            bridge::bridge_recheck_platforms,
            bridge::bridge_select_install_directory,
            bridge::bridge_show_risk_warning,
            bridge::bridge_save_user_config
        ])
        .on_window_event(|window, event| {
            if window.label() != MAIN_WINDOW_LABEL {
                return;
            }

            if let WindowEvent::CloseRequested { api, .. } = event {
                let app_handle = window.app_handle();
                let state = app_handle.state::<ShellState>();
                if state.is_quitting() {
                    return;
                }

                api.prevent_close();
                exit_flow::begin_shutdown(app_handle);
            }
        })
        .setup(|app| {
            let app_handle = app.handle().clone();
            if let Err(error) = window::create_main_window(&app_handle) {
                append_startup_log(&error);
                return Err(error.into());
            }

            startup::spawn_startup_task(app_handle);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| match event {
            RunEvent::ExitRequested { api, .. } => {
                exit_flow::handle_exit_requested(app_handle, &api);
            }
            RunEvent::Exit => {
                exit_flow::handle_exit_event(app_handle);
            }
            _ => {}
        });
}
