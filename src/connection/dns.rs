//! IPv4 resolution for broker hosts.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::lookup_host;

/// Resolves a host to its IPv4 addresses.
///
/// A pre-parsed IP literal is accepted without a resolver round-trip.
pub async fn get_all_ipv4(host: &str, port: u16) -> std::io::Result<Vec<SocketAddrV4>> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(vec![SocketAddrV4::new(ip, port)]);
    }

    let addrs = lookup_host((host, port))
        .await?
        .filter_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .collect();

    Ok(addrs)
}
