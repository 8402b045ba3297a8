use std::net::{IpAddr, Ipv4Addr};

/// Returns the local non-loopback, non-link-local IPv4 addresses.
pub(crate) fn local_ipv4s() -> Vec<Ipv4Addr> {
    let mut ips = Vec::new();

    let Ok(interfaces) = if_addrs::get_if_addrs() else {
        return ips;
    };

    for iface in interfaces {
        if iface.is_loopback() {
            continue;
        }
        if let IpAddr::V4(ipv4) = iface.ip() {
            if ipv4.is_loopback() || ipv4.is_link_local() {
                continue;
            }
            ips.push(ipv4);
        }
    }

    ips
}

/// Picks the IP to advertise: an explicit override, else the bound address
/// if it is specific, else the first usable interface address, else loopback.
pub(crate) fn advertised_ip(override_ip: Option<IpAddr>, bound: IpAddr) -> IpAddr {
    if let Some(ip) = override_ip {
        return ip;
    }
    if !bound.is_unspecified() {
        return bound;
    }
    local_ipv4s()
        .into_iter()
        .next()
        .map(IpAddr::V4)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
