use tauri::{AppHandle, Manager, Url, WebviewUrl, WebviewWindowBuilder};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_plugin_opener::OpenerExt;

use crate::{
    logging::{append_runtime_log, append_startup_log},
    navigation::{self, NavigationDecision},
    ShellState, MAIN_WINDOW_LABEL, WINDOW_TITLE,
};

pub fn create_main_window(app_handle: &AppHandle) -> Result<(), String> {
    let backend_url = {
        let state = app_handle.state::<ShellState>();
        Url::parse(&state.backend_url)
            .map_err(|error| format!("Invalid backend URL {}: {}", state.backend_url, error))?
    };

    let policy_handle = app_handle.clone();
    WebviewWindowBuilder::new(
        app_handle,
        MAIN_WINDOW_LABEL,
        WebviewUrl::App("index.html".into()),
    )
    .title(WINDOW_TITLE)
    .inner_size(1400.0, 900.0)
    .min_inner_size(1200.0, 700.0)
    .on_navigation(move |target| {
        match navigation::navigation_decision(&backend_url, target) {
            NavigationDecision::AllowInWindow => true,
            NavigationDecision::OpenExternally => {
                append_runtime_log(&format!("blocked in-window navigation to {target}"));
                if let Err(error) = policy_handle
                    .opener()
                    .open_url(target.as_str(), None::<&str>)
                {
                    append_runtime_log(&format!("failed to open {target} externally: {error}"));
                }
                false
            }
        }
    })
    .build()
    .map_err(|error| format!("Failed to create main window: {error}"))?;
    Ok(())
}

pub fn focus_main_window(app_handle: &AppHandle) {
    let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) else {
        append_runtime_log("focus_main_window skipped: main window not found");
        return;
    };
    if let Err(error) = window.unminimize() {
        append_runtime_log(&format!("failed to unminimize main window: {error}"));
    }
    if let Err(error) = window.set_focus() {
        append_runtime_log(&format!("failed to focus main window: {error}"));
    }
}

pub fn navigate_main_window_to_backend(app_handle: &AppHandle) -> Result<(), String> {
    let backend_url = {
        let state = app_handle.state::<ShellState>();
        state.backend_url.clone()
    };
    let backend_url_json =
        serde_json::to_string(&backend_url).unwrap_or_else(|_| "\"/\"".to_string());
    let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) else {
        return Err("Main window is unavailable after backend startup.".to_string());
    };

    let js = format!("window.location.replace({backend_url_json});");
    window
        .eval(&js)
        .map_err(|error| format!("Failed to navigate to the backend UI: {error}"))
}

/// The setup page is the window's bundled start page; this only ever runs
/// while the window is still on the app origin, so a relative replace is
/// enough.
pub fn show_setup_page(app_handle: &AppHandle) {
    let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) else {
        append_startup_log("show_setup_page skipped: main window not found");
        return;
    };
    if let Err(error) = window.eval("window.location.replace('index.html');") {
        append_startup_log(&format!("failed to show setup page: {error}"));
    }
}

pub fn run_on_main_thread_dispatch<F>(
    app_handle: &AppHandle,
    task_name: &str,
    mut task: F,
) -> Result<(), String>
where
    F: FnMut(&AppHandle) + Send + 'static,
{
    let app_handle_for_thread = app_handle.clone();
    app_handle
        .run_on_main_thread(move || {
            task(&app_handle_for_thread);
        })
        .map_err(|error| format!("Failed to dispatch '{task_name}' on main thread: {error}"))
}

/// Blocking launch-failure notification; must only be called off the main
/// thread. The shell stays alive on the setup page afterwards.
pub fn show_launch_failure(app_handle: &AppHandle, message: &str) {
    append_startup_log(&format!("backend launch failure: {message}"));
    app_handle
        .dialog()
        .message(format!(
            "Failed to start the trading backend.\n\n{message}\n\nPlease ensure Python is installed."
        ))
        .title("Backend Error")
        .kind(MessageDialogKind::Error)
        .blocking_show();
}
