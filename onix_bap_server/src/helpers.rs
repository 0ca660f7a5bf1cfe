use std::net::{IpAddr, SocketAddr};

use actix_web::http::header::HeaderMap;
use log::trace;
use regex::Regex;

/// Determines the remote peer address from 3 sources, in decreasing order of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set in the configuration.
/// 3. The peer address from the connection info.
pub fn remote_ip(
    headers: &HeaderMap,
    peer_addr: Option<&str>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        result = headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|s| s.trim().parse().ok());
        if let Some(ip) = result {
            trace!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if result.is_none() && use_forwarded {
        let re = Regex::new(r#"for=(?P<ip>[^;,\s]+)"#).unwrap();
        result = headers
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| re.captures(v))
            .and_then(|caps| caps.name("ip"))
            .and_then(|m| m.as_str().trim_matches('"').parse().ok());
        if let Some(ip) = result {
            trace!("Using Forwarded header for remote address: {ip}");
        }
    }
    // The connection peer address may or may not carry a port.
    result.or_else(|| {
        peer_addr.and_then(|s| s.parse::<SocketAddr>().map(|a| a.ip()).or_else(|_| s.parse::<IpAddr>()).ok())
    })
}

#[cfg(test)]
mod test {
    use actix_web::http::header::{HeaderName, HeaderValue};

    use super::*;

    #[test]
    fn prefers_x_forwarded_for_when_enabled() {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-forwarded-for"), HeaderValue::from_static("10.1.2.3, 10.0.0.1"));
        let ip = remote_ip(&headers, Some("192.168.1.1:4432"), true, false);
        assert_eq!(ip, Some("10.1.2.3".parse().unwrap()));
        // disabled: the peer address wins
        let ip = remote_ip(&headers, Some("192.168.1.1:4432"), false, false);
        assert_eq!(ip, Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn reads_the_forwarded_header_when_enabled() {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("forwarded"), HeaderValue::from_static("for=10.9.8.7;proto=https"));
        let ip = remote_ip(&headers, None, false, true);
        assert_eq!(ip, Some("10.9.8.7".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_the_bare_peer_address() {
        let headers = HeaderMap::new();
        assert_eq!(remote_ip(&headers, Some("172.16.0.9"), false, false), Some("172.16.0.9".parse().unwrap()));
        assert_eq!(remote_ip(&headers, None, false, false), None);
    }
}
