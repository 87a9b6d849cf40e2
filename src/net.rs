use log::{debug, info, warn};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::ProbeError;

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a successful TCP dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachable {
    pub peer: SocketAddr,
    pub local: SocketAddr,
}

/// Resolves `host` to every address it maps to. Literal IPs are returned as is.
pub async fn resolve_host(host: &str) -> Result<Vec<IpAddr>, ProbeError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    debug!("Looking up {host}");
    let addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|source| ProbeError::Resolve {
            host: host.to_string(),
            source,
        })?;

    let mut ips: Vec<IpAddr> = Vec::new();
    for addr in addrs {
        if !ips.contains(&addr.ip()) {
            ips.push(addr.ip());
        }
    }
    if ips.is_empty() {
        return Err(ProbeError::NoAddress {
            host: host.to_string(),
        });
    }
    Ok(ips)
}

/// Dials `ip:port` once and closes the socket straight away.
pub async fn dial(ip: IpAddr, port: u16, timeout: Duration) -> Result<Reachable, ProbeError> {
    let addr = SocketAddr::new(ip, port);
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let local = stream.local_addr().map_err(|source| ProbeError::Unreachable {
                addr: addr.to_string(),
                source,
            })?;
            info!("TCP probe to {addr} succeeded from {local}");
            Ok(Reachable { peer: addr, local })
        }
        Ok(Err(source)) => {
            warn!("TCP probe to {addr} failed: {source}");
            Err(ProbeError::Unreachable {
                addr: addr.to_string(),
                source,
            })
        }
        Err(_) => {
            warn!("TCP probe to {addr} timed out after {timeout:?}");
            Err(ProbeError::Timeout {
                addr: addr.to_string(),
            })
        }
    }
}
