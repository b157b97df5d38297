//! Target construction and host resolution.
//!
//! Targets are built once at startup from the configured host, port and path
//! list and stay immutable for the process lifetime. The host is resolved to
//! an IPv4 address up front so the attack traffic skips per-request DNS; the
//! original hostname travels along as the `Host` header so virtual-hosted
//! services still route correctly.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use reqwest::header::{HeaderMap, HeaderValue, HOST};
use reqwest::Method;
use thiserror::Error;

/// One HTTP request template attacked repeatedly during a round.
#[derive(Debug, Clone)]
pub struct Target {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

/// Failure to turn the configured host into a usable attack address.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("error looking up {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no IPv4 address found for {host}")]
    NoIpv4 { host: String },
}

/// Resolves `host` to its first IPv4 address.
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr, ResolveError> {
    let addrs = (host, 0u16)
        .to_socket_addrs()
        .map_err(|source| ResolveError::Lookup {
            host: host.to_string(),
            source,
        })?;

    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(|| ResolveError::NoIpv4 {
            host: host.to_string(),
        })
}

/// Builds one GET target per comma-separated path.
///
/// The URL points at the resolved IP (port elided when 80) while the `Host`
/// header carries the original hostname.
pub fn build_targets(host: &str, ip: Ipv4Addr, port: u16, paths: &str) -> Vec<Target> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(host) {
        headers.insert(HOST, value);
    }

    let authority = if port == 80 {
        ip.to_string()
    } else {
        format!("{}:{}", ip, port)
    };

    paths
        .split(',')
        .map(|path| {
            let path = path.trim_start_matches('/');
            Target {
                method: Method::GET,
                url: format!("http://{}/{}", authority, path),
                headers: headers.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_one_target_per_path_with_host_header() {
        let ip: Ipv4Addr = "203.0.113.5".parse().unwrap();
        let targets = build_targets("app.example.com", ip, 8080, "/,/health");

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].method, Method::GET);
        assert_eq!(targets[0].url, "http://203.0.113.5:8080/");
        assert_eq!(targets[1].url, "http://203.0.113.5:8080/health");
        for target in &targets {
            assert_eq!(
                target.headers.get(HOST).and_then(|v| v.to_str().ok()),
                Some("app.example.com")
            );
        }
    }

    #[test]
    fn port_80_is_elided() {
        let ip: Ipv4Addr = "203.0.113.5".parse().unwrap();
        let targets = build_targets("app.example.com", ip, 80, "/status");

        assert_eq!(targets[0].url, "http://203.0.113.5/status");
    }

    #[test]
    fn leading_slashes_do_not_double() {
        let ip: Ipv4Addr = "198.51.100.7".parse().unwrap();
        let targets = build_targets("h", ip, 80, "//deep/path");

        assert_eq!(targets[0].url, "http://198.51.100.7/deep/path");
    }

    #[test]
    fn resolves_localhost() {
        let ip = resolve_ipv4("localhost").unwrap();
        assert!(ip.is_loopback());
    }

    #[test]
    fn unresolvable_host_errors() {
        // RFC 2606 reserves .invalid for guaranteed NXDOMAIN.
        let err = resolve_ipv4("no-such-host.invalid").unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Lookup { .. } | ResolveError::NoIpv4 { .. }
        ));
    }
}
