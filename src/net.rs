//! LAN address discovery for the shareable URL.
//!
//! Mirrors what people expect from "which address do I tell the other
//! device": a non-loopback IPv4, preferring the interface names that are
//! almost always the right one on macOS, Linux and Windows.

use std::net::{IpAddr, Ipv4Addr};

const PREFERRED_INTERFACES: [&str; 3] = ["en0", "eth0", "Wi-Fi"];

/// The local network address other devices can reach this host at, if any.
pub fn lan_ip() -> Option<Ipv4Addr> {
    let netifas = local_ip_address::list_afinet_netifas().ok()?;
    pick_address(&netifas)
}

/// Shareable base URL for the server banner; falls back to localhost when no
/// LAN-facing interface exists.
pub fn share_url(port: u16) -> String {
    match lan_ip() {
        Some(ip) => format!("http://{ip}:{port}"),
        None => format!("http://localhost:{port}"),
    }
}

fn pick_address(netifas: &[(String, IpAddr)]) -> Option<Ipv4Addr> {
    let candidates: Vec<(&str, Ipv4Addr)> = netifas
        .iter()
        .filter_map(|(name, addr)| match addr {
            IpAddr::V4(v4) if !v4.is_loopback() => Some((name.as_str(), *v4)),
            _ => None,
        })
        .collect();

    for preferred in PREFERRED_INTERFACES {
        if let Some((_, addr)) = candidates.iter().find(|(name, _)| *name == preferred) {
            return Some(*addr);
        }
    }

    candidates.first().map(|(_, addr)| *addr)
}
