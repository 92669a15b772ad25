use std::net::IpAddr;

use url::Url;

use crate::DEFAULT_BACKEND_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    AllowInWindow,
    OpenExternally,
}

fn same_origin(left: &Url, right: &Url) -> bool {
    left.scheme() == right.scheme()
        && left.host_str() == right.host_str()
        && left.port_or_known_default() == right.port_or_known_default()
}

fn is_loopback_host(host: Option<&str>) -> bool {
    match host {
        Some("localhost") => true,
        Some(raw) => raw.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}

/// The window may only show the bundled setup page (non-http app origin) or
/// the backend itself; anything else is handed to the system browser.
pub fn navigation_decision(backend_url: &Url, target: &Url) -> NavigationDecision {
    if !matches!(target.scheme(), "http" | "https") {
        // tauri://localhost, about:blank and friends are the shell's own pages.
        return NavigationDecision::AllowInWindow;
    }

    if same_origin(backend_url, target) {
        return NavigationDecision::AllowInWindow;
    }

    let loopback_pair =
        is_loopback_host(backend_url.host_str()) && is_loopback_host(target.host_str());
    if loopback_pair && backend_url.port_or_known_default() == target.port_or_known_default() {
        return NavigationDecision::AllowInWindow;
    }

    NavigationDecision::OpenExternally
}

pub fn normalize_backend_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed.to_string(),
        _ => DEFAULT_BACKEND_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> Url {
        Url::parse(DEFAULT_BACKEND_URL).expect("parse default backend url")
    }

    #[test]
    fn backend_origin_stays_in_window() {
        let target = Url::parse("http://127.0.0.1:5000/dashboard").expect("parse target");
        assert_eq!(
            navigation_decision(&backend(), &target),
            NavigationDecision::AllowInWindow
        );
    }

    #[test]
    fn localhost_alias_on_same_port_stays_in_window() {
        let target = Url::parse("http://localhost:5000/").expect("parse target");
        assert_eq!(
            navigation_decision(&backend(), &target),
            NavigationDecision::AllowInWindow
        );
    }

    #[test]
    fn app_origin_stays_in_window() {
        let target = Url::parse("tauri://localhost/index.html").expect("parse target");
        assert_eq!(
            navigation_decision(&backend(), &target),
            NavigationDecision::AllowInWindow
        );
    }

    #[test]
    fn external_sites_open_in_the_system_browser() {
        let target = Url::parse("https://example.com/broker-offer").expect("parse target");
        assert_eq!(
            navigation_decision(&backend(), &target),
            NavigationDecision::OpenExternally
        );
    }

    #[test]
    fn different_loopback_port_opens_externally() {
        let target = Url::parse("http://127.0.0.1:3000/").expect("parse target");
        assert_eq!(
            navigation_decision(&backend(), &target),
            NavigationDecision::OpenExternally
        );
    }

    #[test]
    fn backend_url_normalization_falls_back_to_default() {
        assert_eq!(normalize_backend_url("not a url"), DEFAULT_BACKEND_URL);
        assert_eq!(normalize_backend_url("ftp://127.0.0.1:5000"), DEFAULT_BACKEND_URL);
        assert_eq!(
            normalize_backend_url(" http://127.0.0.1:9000 "),
            "http://127.0.0.1:9000/"
        );
    }
}
