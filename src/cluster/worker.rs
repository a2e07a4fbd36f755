use std::{future::Future, net::SocketAddr};

use thiserror::Error;
use tokio::{net::UdpSocket, select};
use tracing::{debug, info, info_span, warn, Instrument};

use super::{
    error::Error,
    function::Function,
    wire::{Inclusion, Message, Reply, Request, MAX_DATAGRAM_LEN},
};
use crate::hex::HexDisplayExt;

/// Requests that decode fine but can't be served. They are dropped without
/// a reply, like undecodable ones.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("unknown function {0}")]
    UnknownFunction(u32),
    #[error("range end {end} is before range start {start}")]
    InvertedRange { start: u64, end: u64 },
    #[error("range [{start}, {end}] has more terms than a u64 can count")]
    RangeTooLarge { start: u64, end: u64 },
}

/// Computes the reply for a request.
pub fn answer(request: &Request) -> Result<Reply, Rejection> {
    let function = Function::try_from(request.function)
        .map_err(Rejection::UnknownFunction)?;
    if request.range_end < request.range_start {
        Err(Rejection::InvertedRange {
            start: request.range_start,
            end: request.range_end,
        })?
    }
    let term_count = (request.range_end - request.range_start)
        .checked_add(1)
        .ok_or(Rejection::RangeTooLarge {
            start: request.range_start,
            end: request.range_end,
        })?;

    Ok(Reply {
        function: request.function,
        partition: request.partition,
        term_count,
        total_terms: request.total_terms,
        exponent: request.exponent,
        partial_sum: function.evaluate(
            request.range_start,
            request.range_end,
            request.exponent,
        ),
        inclusion: Inclusion::Include,
    })
}

/// A worker serves one partition per datagram, one datagram at a time, and
/// answers to whichever address the request came from.
pub struct Worker {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl Worker {
    pub async fn bind(addr: SocketAddr) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests forever.
    pub async fn serve(self) -> Result<(), Error> {
        self.serve_until(std::future::pending()).await
    }

    /// Serves requests until `shutdown` resolves. Bad datagrams and failed
    /// sends are logged and never end the loop.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let span = info_span!("worker", addr = %self.local_addr);
        async move {
            info!("listening");
            tokio::pin!(shutdown);
            let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
            loop {
                let received = select! {
                    _ = &mut shutdown => break,
                    received = self.socket.recv_from(&mut buf) => received,
                };
                match received {
                    Ok((len, peer)) => self.handle(&buf[..len], peer).await,
                    Err(e) => warn!("could not receive datagram: {e}"),
                }
            }
            info!("shutting down");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn handle(&self, datagram: &[u8], peer: SocketAddr) {
        let request = match Message::decode(datagram) {
            Ok(Message::Request(request)) => request,
            Ok(other) => {
                warn!(%peer, "expected a request, got a {:?}. Ignoring.", other.kind());
                return;
            }
            Err(e) => {
                warn!(%peer, "could not decode request: {e}. Ignoring. Raw data: {}", datagram.hex());
                return;
            }
        };
        debug!(
            %peer,
            partition = request.partition,
            "summing [{}, {}] with t = {}",
            request.range_start,
            request.range_end,
            request.exponent
        );

        // summing is CPU bound; keep it off the runtime threads so other
        // workers and sockets in this process stay responsive
        let reply = match tokio::task::spawn_blocking(move || answer(&request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(%peer, partition = request.partition, "rejected request: {e}");
                return;
            }
            Err(e) => {
                warn!(%peer, partition = request.partition, "computation failed: {e}");
                return;
            }
        };

        let payload = match Message::Reply(reply).encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(partition = reply.partition, "could not encode reply: {e}");
                return;
            }
        };

        if let Err(e) = self.socket.send_to(&payload, peer).await {
            warn!(%peer, partition = reply.partition, "could not send reply: {e}");
            return;
        }

        info!(
            partition = reply.partition,
            "processed partition: sum = {:.2}", reply.partial_sum
        );
    }
}
