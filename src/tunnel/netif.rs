//! Local interface discovery for the no-tunnel fallback.

use std::net::{IpAddr, Ipv4Addr};

use log::warn;
use serde::Serialize;

/// Reachability scope of a local IPv4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressScope {
    /// 127.0.0.0/8, reachable from this host only
    Loopback,
    /// 169.254.0.0/16, not routable off the segment
    LinkLocal,
    /// RFC 1918 space, reachable from the local network
    PrivateLan,
    /// The configured VPN/overlay prefix, reachable from mesh peers
    VpnOverlay,
    Other,
}

/// An address a client on the right network could reach the service at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceCandidate {
    pub address: Ipv4Addr,
    pub scope: AddressScope,
}

/// An IPv4 prefix treated as the VPN overlay range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayNet {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl OverlayNet {
    /// Parse CIDR notation, e.g. "100.64.0.0/10".
    pub fn parse(cidr: &str) -> Option<Self> {
        let (addr, len) = cidr.split_once('/')?;
        let network: Ipv4Addr = addr.trim().parse().ok()?;
        let prefix_len: u8 = len.trim().parse().ok()?;
        if prefix_len > 32 {
            return None;
        }
        Some(Self {
            network,
            prefix_len,
        })
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(self.prefix_len))
        };
        (u32::from(addr) & mask) == (u32::from(self.network) & mask)
    }
}

/// Classify an address by how far away a client can be and still reach it.
/// The overlay check runs before the RFC 1918 check so a mesh carved out
/// of private space still reports as overlay.
pub fn classify(addr: Ipv4Addr, overlay: &OverlayNet) -> AddressScope {
    let octets = addr.octets();
    if octets[0] == 127 {
        AddressScope::Loopback
    } else if octets[0] == 169 && octets[1] == 254 {
        AddressScope::LinkLocal
    } else if overlay.contains(addr) {
        AddressScope::VpnOverlay
    } else if octets[0] == 10
        || (octets[0] == 172 && (16..=31).contains(&octets[1]))
        || (octets[0] == 192 && octets[1] == 168)
    {
        AddressScope::PrivateLan
    } else {
        AddressScope::Other
    }
}

/// Enumerate local IPv4 addresses worth advertising: loopback and
/// link-local are dropped, duplicates collapse to the first sighting, and
/// order follows enumeration order. Failures yield an empty list, never an
/// error.
pub fn discover_candidates(overlay: &OverlayNet) -> Vec<InterfaceCandidate> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("Interface enumeration failed: {}", e);
            return Vec::new();
        }
    };

    let mut seen: Vec<Ipv4Addr> = Vec::new();
    let mut candidates = Vec::new();

    for interface in interfaces {
        let IpAddr::V4(address) = interface.ip() else {
            continue;
        };
        if seen.contains(&address) {
            continue;
        }
        seen.push(address);

        let scope = classify(address, overlay);
        if matches!(scope, AddressScope::Loopback | AddressScope::LinkLocal) {
            continue;
        }
        candidates.push(InterfaceCandidate { address, scope });
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay() -> OverlayNet {
        OverlayNet::parse("100.64.0.0/10").unwrap()
    }

    #[test]
    fn test_classify_loopback_and_link_local() {
        assert_eq!(
            classify(Ipv4Addr::new(127, 0, 0, 1), &overlay()),
            AddressScope::Loopback
        );
        assert_eq!(
            classify(Ipv4Addr::new(127, 8, 9, 10), &overlay()),
            AddressScope::Loopback
        );
        assert_eq!(
            classify(Ipv4Addr::new(169, 254, 3, 4), &overlay()),
            AddressScope::LinkLocal
        );
        // 169.x outside 169.254/16 is not link-local
        assert_eq!(
            classify(Ipv4Addr::new(169, 253, 1, 1), &overlay()),
            AddressScope::Other
        );
    }

    #[test]
    fn test_classify_private_ranges() {
        assert_eq!(
            classify(Ipv4Addr::new(10, 1, 2, 3), &overlay()),
            AddressScope::PrivateLan
        );
        assert_eq!(
            classify(Ipv4Addr::new(172, 16, 0, 1), &overlay()),
            AddressScope::PrivateLan
        );
        assert_eq!(
            classify(Ipv4Addr::new(172, 31, 255, 1), &overlay()),
            AddressScope::PrivateLan
        );
        assert_eq!(
            classify(Ipv4Addr::new(192, 168, 1, 50), &overlay()),
            AddressScope::PrivateLan
        );
        // Just outside 172.16/12
        assert_eq!(
            classify(Ipv4Addr::new(172, 15, 0, 1), &overlay()),
            AddressScope::Other
        );
        assert_eq!(
            classify(Ipv4Addr::new(172, 32, 0, 1), &overlay()),
            AddressScope::Other
        );
    }

    #[test]
    fn test_classify_overlay_range() {
        assert_eq!(
            classify(Ipv4Addr::new(100, 64, 0, 1), &overlay()),
            AddressScope::VpnOverlay
        );
        assert_eq!(
            classify(Ipv4Addr::new(100, 127, 255, 254), &overlay()),
            AddressScope::VpnOverlay
        );
        // One past the /10
        assert_eq!(
            classify(Ipv4Addr::new(100, 128, 0, 1), &overlay()),
            AddressScope::Other
        );
    }

    #[test]
    fn test_overlay_carved_from_private_space_wins() {
        let vpn = OverlayNet::parse("10.8.0.0/16").unwrap();
        assert_eq!(
            classify(Ipv4Addr::new(10, 8, 1, 5), &vpn),
            AddressScope::VpnOverlay
        );
        assert_eq!(
            classify(Ipv4Addr::new(10, 9, 1, 5), &vpn),
            AddressScope::PrivateLan
        );
    }

    #[test]
    fn test_overlay_net_parse() {
        assert!(OverlayNet::parse("100.64.0.0/10").is_some());
        assert!(OverlayNet::parse("10.0.0.0/8").is_some());
        assert!(OverlayNet::parse("100.64.0.0").is_none());
        assert!(OverlayNet::parse("100.64.0.0/33").is_none());
        assert!(OverlayNet::parse("not-an-address/8").is_none());
    }

    #[test]
    fn test_discovery_excludes_loopback_and_duplicates() {
        // Runs against the real interface table; the properties hold anywhere
        let candidates = discover_candidates(&overlay());
        for candidate in &candidates {
            assert_ne!(candidate.scope, AddressScope::Loopback);
            assert_ne!(candidate.scope, AddressScope::LinkLocal);
            assert!(!candidate.address.is_loopback());
        }
        let mut addresses: Vec<_> = candidates.iter().map(|c| c.address).collect();
        addresses.sort();
        addresses.dedup();
        assert_eq!(addresses.len(), candidates.len());
    }

    #[test]
    fn test_scope_serializes_snake_case() {
        let candidate = InterfaceCandidate {
            address: Ipv4Addr::new(192, 168, 1, 7),
            scope: AddressScope::PrivateLan,
        };
        let value = serde_json::to_value(&candidate).unwrap();
        assert_eq!(value["address"], "192.168.1.7");
        assert_eq!(value["scope"], "private_lan");
    }
}
