//! Destination filtering: URL hygiene, host lists, reserved-range IPs
//!
//! Redirects can point anywhere, so every hop re-runs these checks,
//! including the DNS-resolved addresses.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use url::Url;

use crate::error::WebError;

/// Host allow/block lists
///
/// Entries match the host itself and any subdomain. An empty
/// allowlist admits every host not blocked.
#[derive(Debug, Clone, Default)]
pub struct HostPolicy {
    allowlist: Vec<String>,
    blocklist: Vec<String>,
}

impl HostPolicy {
    pub fn new(allowlist: Vec<String>, blocklist: Vec<String>) -> Self {
        Self { allowlist, blocklist }
    }

    fn matches(entries: &[String], host: &str) -> bool {
        entries
            .iter()
            .any(|entry| host == entry || host.ends_with(&format!(".{entry}")))
    }

    /// Check a lowercased host against both lists
    pub fn check(&self, host: &str) -> Result<(), WebError> {
        if Self::matches(&self.blocklist, host) {
            return Err(WebError::Blocked(format!("host is blocklisted: {host}")));
        }
        if !self.allowlist.is_empty() && !Self::matches(&self.allowlist, host) {
            return Err(WebError::Blocked(format!("host is not allowlisted: {host}")));
        }
        Ok(())
    }
}

/// Validate URL shape and host policy for one hop
pub fn validate_url(url: &Url, policy: &HostPolicy) -> Result<(), WebError> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(WebError::InvalidUrl(format!("unsupported scheme: {other}"))),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(WebError::Blocked("credentials in URL are not allowed".to_owned()));
    }
    let Some(host) = url.host_str() else {
        return Err(WebError::InvalidUrl("missing host".to_owned()));
    };
    let host = host.to_lowercase();

    if host == "localhost" {
        return Err(WebError::Blocked("private or loopback address: localhost".to_owned()));
    }
    policy.check(&host)
}

/// Resolve the URL's host and reject private or reserved destinations
pub async fn resolve_public(url: &Url) -> Result<(), WebError> {
    let Some(host) = url.host_str() else {
        return Err(WebError::InvalidUrl("missing host".to_owned()));
    };
    let port = url.port_or_known_default().unwrap_or(443);

    // IP literals skip DNS
    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        return check_ip(ip, host);
    }

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| WebError::Request(format!("dns lookup failed for {host}: {e}")))?;

    let mut any = false;
    for addr in addrs {
        any = true;
        check_ip(addr.ip(), host)?;
    }
    if !any {
        return Err(WebError::Request(format!("dns lookup returned no addresses for {host}")));
    }
    Ok(())
}

fn check_ip(ip: IpAddr, host: &str) -> Result<(), WebError> {
    if is_reserved(ip) {
        return Err(WebError::Blocked(format!("private or loopback address: {host} ({ip})")));
    }
    Ok(())
}

/// Addresses that must never be fetched from this server
pub fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_reserved_v4(v4),
        IpAddr::V6(v6) => is_reserved_v6(v6),
    }
}

fn is_reserved_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // CGNAT 100.64.0.0/10
        || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
        // 240.0.0.0/4 reserved
        || octets[0] >= 240
}

fn is_reserved_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_reserved_v4(v4);
    }
    let segments = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        // Unique-local fc00::/7
        || (segments[0] & 0xFE00) == 0xFC00
        // Link-local fe80::/10
        || (segments[0] & 0xFFC0) == 0xFE80
}
