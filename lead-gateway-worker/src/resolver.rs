//! # Safe resolver
//!
//! A DNS resolver for the delivery client's `reqwest::Client` that refuses
//! to hand back addresses in private, loopback, link-local, or otherwise
//! non-routable space. The downstream URL is operator configuration rather
//! than attacker-controlled input, but a misconfigured or compromised DNS
//! record for that hostname should still not let the worker be tricked into
//! making requests against the gateway's own internal network.

use std::error::Error as StdError;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use futures::FutureExt;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::task::spawn_blocking;

type BoxError = Box<dyn StdError + Send + Sync>;

fn is_globally_routable(addr: &SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(ip) => {
            !(ip.octets()[0] == 0
                || ip.is_private()
                || ip.is_loopback()
                || ip.is_link_local()
                || ip.is_broadcast()
                || ip.is_multicast()
                || ip.is_documentation())
        }
        IpAddr::V6(ip) => !(ip.is_loopback() || ip.is_multicast() || ip.is_unspecified()),
    }
}

/// Resolves hostnames using the system resolver, filtering out any address
/// that is not globally routable. If every candidate address is filtered
/// out, resolution fails rather than silently connecting somewhere unsafe.
pub struct SafeResolver;

impl Resolve for SafeResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolve_host = move || (name.as_str(), 0).to_socket_addrs();

        let future = spawn_blocking(resolve_host).map(|result| match result {
            Ok(Ok(addrs)) => {
                let safe: Vec<SocketAddr> = addrs.filter(|a| is_globally_routable(a)).collect();
                if safe.is_empty() {
                    let err: BoxError = Box::new(io::Error::new(
                        io::ErrorKind::Other,
                        "resolved address is not globally routable",
                    ));
                    Err(err)
                } else {
                    let addrs: Addrs = Box::new(safe.into_iter());
                    Ok(addrs)
                }
            }
            Ok(Err(err)) => Err(Box::new(err) as BoxError),
            Err(join_err) => {
                if join_err.is_cancelled() {
                    Err(Box::new(io::Error::new(io::ErrorKind::Interrupted, join_err)) as BoxError)
                } else {
                    panic!("background DNS resolution task failed: {join_err:?}")
                }
            }
        });

        Box::pin(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_private_and_loopback_addresses() {
        for addr in ["127.0.0.1:80", "10.0.0.1:80", "192.168.1.1:80", "169.254.1.1:80"] {
            let addr: SocketAddr = addr.parse().unwrap();
            assert!(!is_globally_routable(&addr), "{addr} should not be routable");
        }
    }

    #[test]
    fn accepts_public_addresses() {
        let addr: SocketAddr = "93.184.216.34:443".parse().unwrap();
        assert!(is_globally_routable(&addr));
    }
}
