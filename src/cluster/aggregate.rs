use std::net::SocketAddr;

use hashbrown::HashSet;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use super::{
    dispatch::DispatchOutcome,
    error::DispatchError,
    plan::Job,
    wire::{Inclusion, Reply},
};

/// A partition whose reply arrived.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartitionSum {
    pub partition: u32,
    pub sum: f64,
    pub terms: u64,
}

/// A partition that never produced a usable reply.
#[derive(Debug)]
pub struct PartitionFailure {
    pub partition: u32,
    pub worker: SocketAddr,
    pub error: DispatchError,
}

/// The totals of one run. Only authoritative if [`is_complete`] holds;
/// otherwise some partitions are missing from `total_sum`.
///
/// [`is_complete`]: AggregateResult::is_complete
#[derive(Debug)]
pub struct AggregateResult {
    pub total_sum: f64,
    pub terms_seen: u64,
    pub total_terms: u64,
    pub exponent: u32,
    /// Counted partitions, in arrival order.
    pub partitions: Vec<PartitionSum>,
    pub failures: Vec<PartitionFailure>,
    /// Replies flagged [`Inclusion::Exclude`]; not counted.
    pub excluded: Vec<PartitionSum>,
    /// Partition indices that were answered more than once.
    pub duplicates: Vec<u32>,
}

impl AggregateResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.terms_seen == self.total_terms
    }

    /// Terms that should have been summed but weren't.
    pub fn missing_terms(&self) -> u64 {
        self.total_terms.saturating_sub(self.terms_seen)
    }
}

/// Folds dispatch outcomes into running totals. Summation is commutative,
/// so the arrival order doesn't matter.
pub struct Aggregator {
    total_sum: f64,
    terms_seen: u64,
    total_terms: u64,
    exponent: u32,
    seen: HashSet<u32>,
    partitions: Vec<PartitionSum>,
    failures: Vec<PartitionFailure>,
    excluded: Vec<PartitionSum>,
    duplicates: Vec<u32>,
}

impl Aggregator {
    pub fn new(job: &Job) -> Self {
        Self {
            total_sum: 0.,
            terms_seen: 0,
            total_terms: job.total_terms,
            exponent: job.exponent,
            seen: HashSet::new(),
            partitions: Vec::new(),
            failures: Vec::new(),
            excluded: Vec::new(),
            duplicates: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: DispatchOutcome) {
        match outcome.result {
            Ok(reply) => self.record_reply(reply),
            Err(error) => self.failures.push(PartitionFailure {
                partition: outcome.partition,
                worker: outcome.worker,
                error,
            }),
        }
    }

    fn record_reply(&mut self, reply: Reply) {
        let sum = PartitionSum {
            partition: reply.partition,
            sum: reply.partial_sum,
            terms: reply.term_count,
        };
        if reply.inclusion == Inclusion::Exclude {
            debug!(partition = reply.partition, "reply excludes its terms");
            self.excluded.push(sum);
            return;
        }
        if !self.seen.insert(reply.partition) {
            // still counted, the duplicate is only reported
            warn!(partition = reply.partition, "partition answered twice");
            self.duplicates.push(reply.partition);
        }
        self.total_sum += sum.sum;
        self.terms_seen = self.terms_seen.saturating_add(sum.terms);
        self.partitions.push(sum);
    }

    /// Consumes outcomes until every dispatch task has finished.
    pub async fn collect(
        mut self,
        mut outcomes: UnboundedReceiver<DispatchOutcome>,
    ) -> AggregateResult {
        while let Some(outcome) = outcomes.recv().await {
            self.record(outcome);
        }
        self.finish()
    }

    pub fn finish(self) -> AggregateResult {
        if self.terms_seen != self.total_terms || !self.failures.is_empty() {
            warn!(
                "incomplete result: {} of {} terms, {} partitions failed",
                self.terms_seen,
                self.total_terms,
                self.failures.len()
            );
        }
        AggregateResult {
            total_sum: self.total_sum,
            terms_seen: self.terms_seen,
            total_terms: self.total_terms,
            exponent: self.exponent,
            partitions: self.partitions,
            failures: self.failures,
            excluded: self.excluded,
            duplicates: self.duplicates,
        }
    }
}
