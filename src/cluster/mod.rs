// A computation is split into equally sized, contiguous partitions of the
// index range, one per worker. Each partition travels to its worker as a
// single datagram and comes back as a single datagram; nothing is retried
// and nothing is acknowledged. A lost datagram therefore shows up as a
// missing partition in the aggregate, never as a stalled run, because every
// dispatch task is bounded by the reply deadline and reports its outcome
// whether it succeeded or not.
//
// Partition `p` is always routed to worker `p`. Workers are stateless: they
// decode, compute, reply and go back to listening, so any number of
// coordinators can share the same set of workers.
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

pub mod config;
pub mod error;
pub mod function;
pub mod plan;
pub mod wire;

#[cfg(feature = "coordinator")]
pub mod aggregate;
#[cfg(feature = "coordinator")]
pub mod coordinator;
#[cfg(feature = "coordinator")]
pub mod dispatch;
#[cfg(feature = "worker")]
pub mod worker;

/// Converts an IP address and port to a socket address.
fn ip_addr_to_socket_addr(ip: IpAddr, port: u16) -> SocketAddr {
    match ip {
        IpAddr::V4(ip) => SocketAddr::from((ip, port)),
        IpAddr::V6(ip) => SocketAddr::from((ip, port)),
    }
}

/// Returns an ephemeral local address in the same family as `remote`, so an
/// outbound session can reach it.
#[cfg(feature = "coordinator")]
fn ephemeral_addr_for(remote: &SocketAddr) -> SocketAddr {
    let ip = match remote {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    ip_addr_to_socket_addr(ip, 0)
}

/// Port of the first worker; further workers on the same host count up.
pub const DEFAULT_WORKER_PORT: u16 = 8080;
/// The number of workers a default local cluster runs.
pub const DEFAULT_WORKER_COUNT: usize = 5;
