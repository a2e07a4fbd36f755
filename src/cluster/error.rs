use std::{io, net::SocketAddr, time::Duration};

use thiserror::Error;

/// Rejections raised while planning, before anything is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("{workers} workers cannot address their partitions with a 32-bit index")]
    TooManyWorkers { workers: usize },
    #[error("n must be divisible by the worker count ({total_terms} % {workers} != 0)")]
    NotDivisible { total_terms: u64, workers: usize },
    #[error("n ({total_terms}) must be at least the worker count ({workers})")]
    FewerTermsThanWorkers { total_terms: u64, workers: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("could not serialize message body")]
    Encode,
    #[error("encoded message is {len} bytes, datagrams are limited to {max}")]
    TooLarge { len: usize, max: usize },
    #[error("datagram truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: u8, found: u8 },
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("{0} unexpected bytes after the message body")]
    TrailingBytes(usize),
    #[error("message body failed validation")]
    Malformed,
}

/// Why a single partition produced no usable reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("could not open a session to {worker}: {source}")]
    Connect {
        worker: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("could not encode request: {0}")]
    Encode(#[source] WireError),
    #[error("could not send request: {0}")]
    Send(#[source] io::Error),
    #[error("sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },
    #[error("could not receive reply: {0}")]
    Receive(#[source] io::Error),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("could not decode reply: {0}")]
    Decode(#[source] WireError),
    #[error("worker answered with a request")]
    UnexpectedRequest,
    #[error("reply does not match request: {field} differs")]
    Mismatch { field: &'static str },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not bind worker socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}
