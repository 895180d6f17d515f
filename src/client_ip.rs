//! Client address resolution behind trusted proxies.
//!
//! Only loopback peers may vouch for the real client through
//! `X-Forwarded-For` or `X-Real-IP`. Any other peer is taken at face value,
//! which keeps arbitrary upstreams from spoofing their way past a network
//! rule.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Headers consulted, in order, when the peer is a trusted proxy.
const FORWARDED_HEADERS: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

/// Resolves the client address for a request.
#[derive(Debug, Clone)]
pub struct ClientIpResolver {
    trusted_proxies: Vec<IpAddr>,
}

impl Default for ClientIpResolver {
    /// Trusts IPv4 and IPv6 loopback only.
    fn default() -> Self {
        Self::new(vec![
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
        ])
    }
}

impl ClientIpResolver {
    pub fn new(trusted_proxies: Vec<IpAddr>) -> Self {
        Self { trusted_proxies }
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.contains(&ip.to_canonical())
    }

    /// Client address as text, given the socket peer and lowercased request headers.
    pub fn resolve(&self, peer: SocketAddr, headers: &HashMap<String, String>) -> String {
        let peer_ip = peer.ip().to_canonical();

        if self.is_trusted(peer_ip) {
            for name in FORWARDED_HEADERS {
                if let Some(ip) = headers.get(name).and_then(|value| self.forwarded_client(value)) {
                    return ip.to_string();
                }
            }
        }

        peer_ip.to_string()
    }

    /// Walk a forwarding chain from the nearest hop outwards and return the
    /// first hop we don't trust. An unparsable hop ends the walk.
    fn forwarded_client<'a>(&self, value: &'a str) -> Option<&'a str> {
        let hops: Vec<&str> = value.split(',').map(str::trim).collect();

        for (i, hop) in hops.iter().enumerate().rev() {
            let ip: IpAddr = hop.parse().ok()?;
            if i == 0 || !self.is_trusted(ip) {
                return Some(*hop);
            }
        }

        None
    }
}
