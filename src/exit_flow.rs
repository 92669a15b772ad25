use std::{thread, time::Duration};

use tauri::{AppHandle, Manager};

use crate::{logging::append_shutdown_log, ShellState, FINAL_EXIT_DELAY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    WindowClose,
    ExitRequested,
    ExitFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitRequestedDecision {
    AllowImmediateExit,
    RunBackendCleanupFirst,
}

fn decide_exit_requested_flow(has_exit_request_allowance: bool) -> ExitRequestedDecision {
    if has_exit_request_allowance {
        ExitRequestedDecision::AllowImmediateExit
    } else {
        ExitRequestedDecision::RunBackendCleanupFirst
    }
}

fn try_begin_exit_cleanup(state: &ShellState, trigger: ExitTrigger) -> bool {
    if state.try_begin_exit_cleanup() {
        return true;
    }

    let message = match trigger {
        ExitTrigger::WindowClose => "window close while backend cleanup is already running",
        ExitTrigger::ExitRequested => "exit requested while backend cleanup is already running",
        ExitTrigger::ExitFallback => {
            "exit fallback cleanup skipped: backend cleanup already running"
        }
    };
    append_shutdown_log(message);
    false
}

fn stop_backend_for_exit(state: &ShellState, trigger: ExitTrigger) {
    if let Err(error) = state.stop_backend() {
        append_shutdown_log(&format!("backend stop on {trigger:?} failed: {error}"));
        return;
    }
    append_shutdown_log(&format!("backend stop finished on {trigger:?}"));
}

/// Stops the child in the blocking pool and, independently, exits the shell
/// after a fixed delay. The two are deliberately decoupled: responsiveness
/// wins over confirming the child is dead.
fn run_shutdown_sequence(app_handle: AppHandle, trigger: ExitTrigger) {
    append_shutdown_log(&format!("shutdown sequence started by {trigger:?}"));

    let stop_handle = app_handle.clone();
    tauri::async_runtime::spawn_blocking(move || {
        let state = stop_handle.state::<ShellState>();
        stop_backend_for_exit(&state, trigger);
    });

    tauri::async_runtime::spawn_blocking(move || {
        thread::sleep(Duration::from_millis(FINAL_EXIT_DELAY_MS));
        let state = app_handle.state::<ShellState>();
        state.allow_next_exit_request();
        append_shutdown_log("final exit delay elapsed, exiting shell");
        app_handle.exit(0);
    });
}

/// Window-close interception path: the close was prevented, the shutdown
/// sequence now owns the exit.
pub fn begin_shutdown(app_handle: &AppHandle) {
    let state = app_handle.state::<ShellState>();
    state.mark_quitting();
    if !try_begin_exit_cleanup(&state, ExitTrigger::WindowClose) {
        return;
    }
    run_shutdown_sequence(app_handle.clone(), ExitTrigger::WindowClose);
}

pub fn handle_exit_requested(app_handle: &AppHandle, api: &tauri::ExitRequestApi) {
    let state = app_handle.state::<ShellState>();
    match decide_exit_requested_flow(state.take_exit_request_allowance()) {
        ExitRequestedDecision::AllowImmediateExit => {
            append_shutdown_log("exit request allowed to pass through after backend cleanup");
            return;
        }
        ExitRequestedDecision::RunBackendCleanupFirst => {}
    }
    // Hold the process open so the kill sequence can run in the blocking
    // pool; the final-delay task exits explicitly.
    api.prevent_exit();
    state.mark_quitting();
    if !try_begin_exit_cleanup(&state, ExitTrigger::ExitRequested) {
        return;
    }
    run_shutdown_sequence(app_handle.clone(), ExitTrigger::ExitRequested);
}

/// Last-chance synchronous cleanup when the runtime is exiting anyway and no
/// shutdown sequence ever ran.
pub fn handle_exit_event(app_handle: &AppHandle) {
    let state = app_handle.state::<ShellState>();
    if !try_begin_exit_cleanup(&state, ExitTrigger::ExitFallback) {
        return;
    }

    append_shutdown_log("exit event triggered fallback backend cleanup");
    stop_backend_for_exit(&state, ExitTrigger::ExitFallback);
}
