//! Remote address helpers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Hostname some proxies forward instead of a loopback address.
const LOCALHOST: &str = "localhost";

/// Truncates an address to its network prefix.
///
/// - IPv4: /24 (last octet zeroed)
/// - IPv6: /48 (last 80 bits zeroed)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let [a, b, c, _] = addr.octets();
            IpAddr::V4(Ipv4Addr::new(a, b, c, 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}

/// Anonymizes a textual remote address before it is stored.
///
/// Loopback addresses and `localhost` are kept as they are. Anything that is
/// not an IP address is dropped, since it cannot be anonymized.
pub fn anonymize_remote_addr(remote_addr: Option<&str>) -> Option<String> {
    let remote_addr = remote_addr?.trim();
    if remote_addr.is_empty() {
        return None;
    }
    if remote_addr.eq_ignore_ascii_case(LOCALHOST) {
        return Some(remote_addr.to_string());
    }

    let ip: IpAddr = remote_addr.parse().ok()?;
    if ip.is_loopback() {
        return Some(ip.to_string());
    }

    Some(anonymize_ip(ip).to_string())
}

/// Whether an address is worth sending to the geolocation resolver.
///
/// `None`, empty strings, `localhost` and loopback addresses are not.
/// Unparsable addresses are considered locatable so the resolver reports them
/// as malformed.
pub fn is_locatable(remote_addr: Option<&str>) -> bool {
    let Some(remote_addr) = remote_addr.map(str::trim) else {
        return false;
    };
    if remote_addr.is_empty() || remote_addr.eq_ignore_ascii_case(LOCALHOST) {
        return false;
    }

    !remote_addr
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_loopback())
}
