use std::{
    io::{BufRead, BufReader},
    process::{Command, ExitStatus, Stdio},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use tauri::{AppHandle, Manager};

use crate::{
    launch::{self, LaunchPlan},
    logging::{append_backend_log, append_runtime_log},
    process_control, ShellState, EXIT_WATCH_INTERVAL, GRACEFUL_STOP_TIMEOUT_MS,
};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// RAII guard over a busy flag; releases on drop so an early `?` return
/// cannot leave the supervisor wedged.
pub struct AtomicFlagGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> AtomicFlagGuard<'a> {
    pub fn try_set(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { flag })
    }
}

impl Drop for AtomicFlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub(crate) enum ChildPoll {
    StillRunning,
    Exited(ExitStatus),
    Gone,
}

impl ShellState {
    /// Launches the backend and blocks until it answers HTTP. Refuses to run
    /// while a previous launch is in flight or a child handle is live; one
    /// supervisor owns at most one backend.
    pub(crate) fn launch_backend(&self, app: &AppHandle) -> Result<(), String> {
        let _start_guard = AtomicFlagGuard::try_set(&self.is_starting)
            .ok_or_else(|| "Backend launch already in progress.".to_string())?;

        let plan = launch::resolve_launch_plan(app, append_runtime_log)?;
        self.start_backend_process(app, &plan)?;
        if let Err(error) = self.wait_for_backend() {
            self.discard_unready_backend();
            return Err(error);
        }
        Ok(())
    }

    /// The backend never became reachable. A live child left behind would
    /// make every later relaunch refuse with "already running", so stop it
    /// before surfacing the failure.
    fn discard_unready_backend(&self) {
        if let Err(stop_error) = self.stop_backend() {
            append_runtime_log(&format!("failed to stop unready backend: {stop_error}"));
        }
    }

    fn start_backend_process(&self, app: &AppHandle, plan: &LaunchPlan) -> Result<(), String> {
        let mut guard = self
            .child
            .lock()
            .map_err(|_| "Backend process lock poisoned.".to_string())?;
        if guard.is_some() {
            return Err("Backend process is already running.".to_string());
        }

        if !plan.cwd.is_dir() {
            return Err(format!(
                "Backend working directory does not exist: {}",
                plan.cwd.display()
            ));
        }

        let mut command = Command::new(&plan.cmd);
        command
            .args(&plan.args)
            .current_dir(&plan.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("PYTHONUNBUFFERED", "1");
        #[cfg(target_os = "windows")]
        command.creation_flags(CREATE_NO_WINDOW);

        let mut child = command.spawn().map_err(|error| {
            format!(
                "Failed to spawn backend process with command {:?}: {}",
                plan.debug_command(),
                error
            )
        })?;
        let child_pid = child.id();
        append_runtime_log(&format!(
            "spawned backend: pid={}, cmd={:?}, cwd={}",
            child_pid,
            plan.debug_command(),
            plan.cwd.display()
        ));

        if let Some(stdout) = child.stdout.take() {
            spawn_output_reader("stdout", child_pid, stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_output_reader("stderr", child_pid, stderr);
        }

        *guard = Some(child);
        drop(guard);

        spawn_exit_watcher(app.clone(), child_pid);
        Ok(())
    }

    /// Reaps the child if it already exited, clearing the handle. `Gone`
    /// means another reaper (the exit watcher) cleared it first.
    pub(crate) fn reap_exited_child(&self) -> Result<ChildPoll, String> {
        let mut guard = self
            .child
            .lock()
            .map_err(|_| "Backend process lock poisoned.".to_string())?;
        let Some(child) = guard.as_mut() else {
            return Ok(ChildPoll::Gone);
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                *guard = None;
                Ok(ChildPoll::Exited(status))
            }
            Ok(None) => Ok(ChildPoll::StillRunning),
            Err(error) => Err(format!("Failed to poll backend process status: {error}")),
        }
    }

    fn poll_child(&self, expected_pid: u32) -> ChildPoll {
        let mut guard = match self.child.lock() {
            Ok(guard) => guard,
            Err(error) => {
                append_runtime_log(&format!(
                    "backend child lock poisoned in exit watcher: {error}"
                ));
                return ChildPoll::Gone;
            }
        };

        let Some(child) = guard.as_mut() else {
            return ChildPoll::Gone;
        };
        if child.id() != expected_pid {
            return ChildPoll::Gone;
        }

        match child.try_wait() {
            Ok(None) => ChildPoll::StillRunning,
            Ok(Some(status)) => {
                *guard = None;
                ChildPoll::Exited(status)
            }
            Err(error) => {
                append_runtime_log(&format!(
                    "failed to poll backend process in exit watcher: pid={expected_pid}, error={error}"
                ));
                ChildPoll::Gone
            }
        }
    }

    /// Graceful stop with forceful escalation. A missing child is a no-op.
    pub(crate) fn stop_backend(&self) -> Result<(), String> {
        let mut guard = self
            .child
            .lock()
            .map_err(|_| "Backend process lock poisoned.".to_string())?;

        let Some(child) = guard.as_mut() else {
            return Ok(());
        };

        if process_control::stop_child_process_gracefully(
            child,
            Duration::from_millis(GRACEFUL_STOP_TIMEOUT_MS),
            append_backend_log,
        ) {
            *guard = None;
            return Ok(());
        }

        Err(format!(
            "Backend process did not exit after {GRACEFUL_STOP_TIMEOUT_MS}ms graceful stop timeout."
        ))
    }
}

fn spawn_output_reader<R>(stream_name: &'static str, child_pid: u32, stream: R)
where
    R: std::io::Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            match line {
                Ok(line) => append_backend_log(&format!("pid={child_pid} {stream_name}: {line}")),
                Err(_) => break,
            }
        }
    });
}

/// Logs the exit status whenever the child terminates, whatever the trigger.
/// A post-startup crash is recorded here and nowhere else; there is no
/// automatic restart.
fn spawn_exit_watcher(app_handle: AppHandle, child_pid: u32) {
    thread::spawn(move || loop {
        thread::sleep(EXIT_WATCH_INTERVAL);
        let state = app_handle.state::<ShellState>();
        match state.poll_child(child_pid) {
            ChildPoll::StillRunning => {}
            ChildPoll::Exited(status) => {
                append_backend_log(&format!(
                    "backend process exited: pid={child_pid}, status={status}"
                ));
                break;
            }
            ChildPoll::Gone => break,
        }
    });
}
