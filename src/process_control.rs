#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;
use std::{
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

const EXIT_POLL_INTERVAL_MS: u64 = 100;
const FORCE_KILL_FOLLOWUP_WAIT_MS: u64 = 1_500;
#[cfg(target_os = "windows")]
const WINDOWS_CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub fn wait_for_child_exit(child: &mut Child, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    return false;
                }
                thread::sleep(Duration::from_millis(EXIT_POLL_INTERVAL_MS));
            }
            Err(_) => return false,
        }
    }
}

#[cfg(target_os = "windows")]
fn request_polite_stop<F>(pid: u32, log: F)
where
    F: Fn(&str),
{
    let pid_arg = pid.to_string();
    let mut command = Command::new("taskkill");
    command
        .args(["/pid", &pid_arg, "/t"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .creation_flags(WINDOWS_CREATE_NO_WINDOW);
    match command.status() {
        Ok(status) if status.success() => {}
        Ok(status) => log(&format!(
            "taskkill graceful stop returned non-zero: pid={pid}, status={status:?}"
        )),
        Err(error) => log(&format!(
            "taskkill graceful stop failed to start: pid={pid}, error={error}"
        )),
    }
}

#[cfg(not(target_os = "windows"))]
fn request_polite_stop<F>(pid: u32, log: F)
where
    F: Fn(&str),
{
    let pid_arg = pid.to_string();
    let mut command = Command::new("kill");
    command
        .args(["-TERM", &pid_arg])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .stdin(Stdio::null());
    match command.status() {
        Ok(status) if status.success() => {}
        Ok(status) => log(&format!(
            "kill -TERM returned non-zero: pid={pid}, status={status:?}"
        )),
        Err(error) => log(&format!(
            "kill -TERM failed to start: pid={pid}, error={error}"
        )),
    }
}

/// Termination escalation: polite stop first, then an unconditional kill if
/// the child has not exited within `timeout`. The polite request always
/// precedes the forceful one by at least the full timeout.
pub fn stop_child_process_gracefully<F>(child: &mut Child, timeout: Duration, log: F) -> bool
where
    F: Fn(&str) + Copy,
{
    let pid = child.id();
    request_polite_stop(pid, log);

    if wait_for_child_exit(child, timeout) {
        return true;
    }

    log(&format!(
        "backend ignored polite stop after {}ms, force-killing: pid={pid}",
        timeout.as_millis()
    ));
    if let Err(error) = child.kill() {
        log(&format!("force kill failed: pid={pid}, error={error}"));
    }
    wait_for_child_exit(child, Duration::from_millis(FORCE_KILL_FOLLOWUP_WAIT_MS))
}
