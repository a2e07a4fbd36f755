use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use typed_builder::TypedBuilder;

use super::{ip_addr_to_socket_addr, DEFAULT_WORKER_PORT};

/// How long a dispatch task waits for its reply unless configured otherwise.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// The static topology of a cluster. Worker `p` receives partition `p`, so
/// the order of `workers` matters.
#[derive(TypedBuilder, Clone, Debug, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Worker endpoints, in partition order.
    pub workers: Vec<SocketAddr>,
    /// Deadline for each worker's reply. `None` waits forever, which means a
    /// single silent worker stalls the whole run.
    #[builder(default = Some(DEFAULT_REPLY_TIMEOUT))]
    pub reply_timeout: Option<Duration>,
}

impl ClusterConfig {
    /// `count` workers on localhost, on consecutive ports starting at
    /// [`DEFAULT_WORKER_PORT`]. Stops early when the ports run out at 65535.
    pub fn localhost(count: usize) -> Self {
        Self::builder()
            .workers(
                (0..count)
                    .map_while(|i| {
                        let port = u16::try_from(i)
                            .ok()
                            .and_then(|i| DEFAULT_WORKER_PORT.checked_add(i))?;
                        Some(ip_addr_to_socket_addr(
                            IpAddr::V4(Ipv4Addr::LOCALHOST),
                            port,
                        ))
                    })
                    .collect(),
            )
            .build()
    }
}
