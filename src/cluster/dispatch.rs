use std::{net::SocketAddr, time::Duration};

use tokio::{
    net::UdpSocket,
    sync::mpsc::{self, UnboundedReceiver},
    time::timeout,
};
use tracing::{debug, debug_span, warn, Instrument};

use super::{
    ephemeral_addr_for,
    error::DispatchError,
    plan::{Job, PartitionPlan},
    wire::{Message, Reply, Request, MAX_DATAGRAM_LEN},
};

/// What became of one partition's round trip.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub partition: u32,
    pub worker: SocketAddr,
    pub result: Result<Reply, DispatchError>,
}

/// Sends every partition of `plan` to its worker concurrently, one task per
/// partition.
///
/// Each task reports exactly one outcome, whether its round trip succeeded
/// or not. The returned receiver yields `None` once every task has
/// finished, which is the signal that collection is complete.
///
/// `workers` must be index aligned with the plan's partitions. Partitions
/// without a worker are not dispatched.
pub fn scatter(
    plan: &PartitionPlan,
    job: &Job,
    workers: &[SocketAddr],
    reply_timeout: Option<Duration>,
) -> UnboundedReceiver<DispatchOutcome> {
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    for (request, &worker) in plan.requests(job).zip(workers) {
        let outcome_tx = outcome_tx.clone();
        let span = debug_span!("dispatch", partition = request.partition, %worker);
        tokio::spawn(
            async move {
                let result = exchange(worker, request, reply_timeout).await;
                if let Err(e) = &result {
                    warn!("partition lost: {e}");
                }
                // the aggregator may have given up on us, which is fine
                let _ = outcome_tx.send(DispatchOutcome {
                    partition: request.partition,
                    worker,
                    result,
                });
            }
            .instrument(span),
        );
    }
    outcome_rx
}

/// Performs a single request/reply round trip with a worker.
pub async fn exchange(
    worker: SocketAddr,
    request: Request,
    reply_timeout: Option<Duration>,
) -> Result<Reply, DispatchError> {
    let socket = UdpSocket::bind(ephemeral_addr_for(&worker))
        .await
        .map_err(|source| DispatchError::Connect { worker, source })?;
    socket
        .connect(worker)
        .await
        .map_err(|source| DispatchError::Connect { worker, source })?;
    debug!(local = ?socket.local_addr().ok(), "session open");

    let payload = Message::Request(request).encode().map_err(DispatchError::Encode)?;
    let sent = socket.send(&payload).await.map_err(DispatchError::Send)?;
    if sent != payload.len() {
        Err(DispatchError::ShortWrite {
            sent,
            expected: payload.len(),
        })?
    }
    debug!("sent [{}, {}]", request.range_start, request.range_end);

    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    let len = match reply_timeout {
        Some(deadline) => timeout(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| DispatchError::Timeout(deadline))?,
        None => socket.recv(&mut buf).await,
    }
    .map_err(DispatchError::Receive)?;

    let reply = match Message::decode(&buf[..len]).map_err(DispatchError::Decode)? {
        Message::Reply(reply) => reply,
        Message::Request(_) => Err(DispatchError::UnexpectedRequest)?,
    };
    check_echo(&request, &reply)?;
    debug!("received sum {:.2}", reply.partial_sum);
    Ok(reply)
}

/// A reply must repeat the fields of the request it answers.
fn check_echo(request: &Request, reply: &Reply) -> Result<(), DispatchError> {
    let field = if reply.partition != request.partition {
        "partition"
    } else if reply.function != request.function {
        "function"
    } else if reply.total_terms != request.total_terms {
        "total_terms"
    } else if reply.exponent != request.exponent {
        "exponent"
    } else if Some(reply.term_count)
        != request
            .range_end
            .checked_sub(request.range_start)
            .and_then(|span| span.checked_add(1))
    {
        "term_count"
    } else {
        return Ok(());
    };
    Err(DispatchError::Mismatch { field })
}
