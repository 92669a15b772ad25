use std::{
    env,
    io::{Read, Write},
    net::{TcpStream, ToSocketAddrs},
    thread,
    time::{Duration, Instant},
};

use url::Url;

use crate::{
    logging::append_runtime_log, supervisor::ChildPoll, ShellState, BACKEND_READY_POLL_INTERVAL_MS,
    BACKEND_READY_PROBE_TIMEOUT_MS, BACKEND_TIMEOUT_ENV, BACKEND_WAIT_TIMEOUT_MAX_MS,
    BACKEND_WAIT_TIMEOUT_MIN_MS, DEFAULT_BACKEND_WAIT_TIMEOUT_MS,
};

pub fn parse_clamped_millis_env<F>(
    raw: &str,
    env_name: &str,
    fallback_ms: u64,
    min_ms: u64,
    max_ms: u64,
    mut log: F,
) -> u64
where
    F: FnMut(String),
{
    match raw.trim().parse::<u128>() {
        Ok(parsed) if parsed > 0 => {
            if parsed < min_ms as u128 {
                log(format!(
                    "{env_name}='{raw}' is below minimum {min_ms}ms, clamped to {min_ms}ms"
                ));
                min_ms
            } else if parsed > max_ms as u128 {
                log(format!(
                    "{env_name}='{raw}' is above maximum {max_ms}ms, clamped to {max_ms}ms"
                ));
                max_ms
            } else {
                parsed as u64
            }
        }
        _ => {
            log(format!(
                "invalid {env_name}='{raw}', fallback to {fallback_ms}ms"
            ));
            fallback_ms
        }
    }
}

pub fn resolve_backend_wait_timeout_ms<F>(log: F) -> u64
where
    F: FnMut(String),
{
    match env::var(BACKEND_TIMEOUT_ENV) {
        Ok(raw) => parse_clamped_millis_env(
            &raw,
            BACKEND_TIMEOUT_ENV,
            DEFAULT_BACKEND_WAIT_TIMEOUT_MS,
            BACKEND_WAIT_TIMEOUT_MIN_MS,
            BACKEND_WAIT_TIMEOUT_MAX_MS,
            log,
        ),
        Err(_) => DEFAULT_BACKEND_WAIT_TIMEOUT_MS,
    }
}

pub fn parse_http_status_line(raw: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(raw).ok()?;
    let status_line = text.lines().next()?;
    if !status_line.starts_with("HTTP/") {
        return None;
    }
    status_line.split_whitespace().nth(1)?.parse().ok()
}

pub fn ping_backend(backend_url: &str, timeout: Duration) -> bool {
    let Some((host, port)) = backend_host_port(backend_url) else {
        return false;
    };
    let addrs = match (host.as_str(), port).to_socket_addrs() {
        Ok(addrs) => addrs.collect::<Vec<_>>(),
        Err(_) => return false,
    };
    addrs
        .iter()
        .any(|address| TcpStream::connect_timeout(address, timeout).is_ok())
}

fn backend_host_port(backend_url: &str) -> Option<(String, u16)> {
    let parsed = Url::parse(backend_url).ok()?;
    let host = parsed.host_str()?.to_string();
    let port = parsed.port_or_known_default().unwrap_or(80);
    Some((host, port))
}

/// Minimal one-shot GET against the backend root; enough to distinguish a
/// serving HTTP process from a bare listening socket.
fn probe_http_status(backend_url: &str, timeout: Duration) -> Option<u16> {
    let (host, port) = backend_host_port(backend_url)?;
    let addrs = (host.as_str(), port).to_socket_addrs().ok()?;
    let mut stream = addrs
        .into_iter()
        .find_map(|address| TcpStream::connect_timeout(&address, timeout).ok())?;
    let _ = stream.set_read_timeout(Some(timeout));
    let _ = stream.set_write_timeout(Some(timeout));

    let request = format!("GET / HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).ok()?;

    let mut response = Vec::new();
    let _ = stream.take(4096).read_to_end(&mut response);
    parse_http_status_line(&response)
}

impl ShellState {
    /// Polls the backend address until it answers HTTP, the child dies, or
    /// the bounded wait elapses. Navigation must never happen on a timeout.
    pub(crate) fn wait_for_backend(&self) -> Result<(), String> {
        // Blocking polling by design; always called from spawn_blocking
        // workers, never on the UI thread.
        let timeout = Duration::from_millis(resolve_backend_wait_timeout_ms(|message| {
            append_runtime_log(&message)
        }));
        self.wait_for_backend_with_timeout(timeout)
    }

    fn wait_for_backend_with_timeout(&self, timeout: Duration) -> Result<(), String> {
        let probe_timeout = Duration::from_millis(BACKEND_READY_PROBE_TIMEOUT_MS);
        let start_time = Instant::now();
        let mut tcp_ready_logged = false;

        loop {
            let http_status = probe_http_status(&self.backend_url, probe_timeout);
            if matches!(http_status, Some(status) if (200..400).contains(&status)) {
                append_runtime_log(&format!(
                    "backend ready after {}ms: url={}",
                    start_time.elapsed().as_millis(),
                    self.backend_url
                ));
                return Ok(());
            }

            if !tcp_ready_logged && ping_backend(&self.backend_url, probe_timeout) {
                append_runtime_log(
                    "backend TCP port is reachable but HTTP is not serving yet; waiting",
                );
                tcp_ready_logged = true;
            }

            match self.reap_exited_child()? {
                ChildPoll::StillRunning => {}
                ChildPoll::Exited(status) => {
                    return Err(format!(
                        "Backend process exited before becoming reachable: {status}"
                    ));
                }
                // The exit watcher reaped the child first; same outcome for
                // the user, just without the status.
                ChildPoll::Gone => {
                    return Err("Backend process exited before becoming reachable.".to_string());
                }
            }

            if start_time.elapsed() >= timeout {
                return Err(format!(
                    "Timed out after {}ms waiting for the backend at {}.",
                    timeout.as_millis(),
                    self.backend_url
                ));
            }

            thread::sleep(Duration::from_millis(BACKEND_READY_POLL_INTERVAL_MS));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::{atomic::AtomicBool, Mutex};

    fn one_shot_http_server(response: &'static [u8]) -> (u16, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        let handle = thread::spawn(move || {
            if let Ok((mut socket, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request);
                let _ = socket.write_all(response);
            }
        });
        (port, handle)
    }

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);
        port
    }

    fn idle_state(backend_url: String) -> ShellState {
        ShellState {
            child: Mutex::new(None),
            backend_url,
            lifecycle: Mutex::new(Default::default()),
            is_starting: AtomicBool::new(false),
        }
    }

    #[test]
    fn status_line_parsing_reads_the_code() {
        assert_eq!(
            parse_http_status_line(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"),
            Some(200)
        );
        assert_eq!(parse_http_status_line(b"HTTP/1.0 302 Found\r\n"), Some(302));
        assert_eq!(parse_http_status_line(b"not http at all"), None);
        assert_eq!(parse_http_status_line(b""), None);
    }

    #[test]
    fn clamp_parsing_accepts_in_range_values() {
        let value = parse_clamped_millis_env("1200", "TEST_ENV", 500, 100, 5_000, |_| {});
        assert_eq!(value, 1200);
    }

    #[test]
    fn clamp_parsing_clamps_and_logs_small_values() {
        let mut logs = Vec::new();
        let value = parse_clamped_millis_env("20", "TEST_ENV", 500, 100, 5_000, |message| {
            logs.push(message)
        });
        assert_eq!(value, 100);
        assert!(logs.iter().any(|line| line.contains("below minimum")));
    }

    #[test]
    fn clamp_parsing_falls_back_on_garbage() {
        let mut logs = Vec::new();
        let value = parse_clamped_millis_env("soon", "TEST_ENV", 500, 100, 5_000, |message| {
            logs.push(message)
        });
        assert_eq!(value, 500);
        assert!(logs.iter().any(|line| line.contains("invalid TEST_ENV")));
    }

    #[test]
    fn ping_detects_a_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        let url = format!("http://127.0.0.1:{port}/");

        assert!(ping_backend(&url, Duration::from_millis(500)));
    }

    #[test]
    fn ping_fails_on_a_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let url = format!("http://127.0.0.1:{port}/");
        assert!(!ping_backend(&url, Duration::from_millis(300)));
    }

    #[test]
    fn ping_rejects_unparseable_urls() {
        assert!(!ping_backend("not a url", Duration::from_millis(100)));
    }

    #[test]
    fn http_probe_reads_the_status_from_a_live_server() {
        let (port, server) = one_shot_http_server(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        let url = format!("http://127.0.0.1:{port}/");

        let status = probe_http_status(&url, Duration::from_millis(1_000));
        assert_eq!(status, Some(200));
        server.join().expect("server thread");
    }

    #[test]
    fn http_probe_passes_error_statuses_through() {
        let (port, server) =
            one_shot_http_server(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\n\r\n");
        let url = format!("http://127.0.0.1:{port}/");

        let status = probe_http_status(&url, Duration::from_millis(1_000));
        assert_eq!(status, Some(503));
        server.join().expect("server thread");
    }

    #[test]
    fn http_probe_finds_nothing_on_a_closed_port() {
        let url = format!("http://127.0.0.1:{}/", closed_port());
        assert_eq!(probe_http_status(&url, Duration::from_millis(300)), None);
    }

    #[cfg(unix)]
    #[test]
    fn unreachable_backend_fails_the_bounded_wait() {
        let state = idle_state(format!("http://127.0.0.1:{}/", closed_port()));
        let child = std::process::Command::new("sh")
            .arg("-c")
            .arg("sleep 30")
            .spawn()
            .expect("spawn sleeper");
        *state.child.lock().expect("child lock") = Some(child);

        let error = state
            .wait_for_backend_with_timeout(Duration::from_millis(0))
            .expect_err("expected the bounded wait to time out");
        assert!(error.contains("Timed out"));

        let mut guard = state.child.lock().expect("child lock");
        if let Some(mut child) = guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    #[test]
    fn a_reaped_child_reads_as_an_early_exit() {
        let state = idle_state(format!("http://127.0.0.1:{}/", closed_port()));

        let error = state
            .wait_for_backend_with_timeout(Duration::from_millis(200))
            .expect_err("expected the wait to fail without a child");
        assert!(error.contains("exited before becoming reachable"));
        assert!(!error.contains("not running"));
    }
}
