use tracing::{info, info_span, Instrument};

use super::{
    aggregate::{AggregateResult, Aggregator},
    config::ClusterConfig,
    dispatch::scatter,
    error::PlanError,
    plan::{Job, PartitionPlan},
};

/// Runs computations across a fixed set of workers.
pub struct Coordinator {
    config: ClusterConfig,
}

impl Coordinator {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Splits `total_terms` across this coordinator's workers.
    pub fn plan(&self, total_terms: u64) -> Result<PartitionPlan, PlanError> {
        PartitionPlan::new(total_terms, self.config.workers.len())
    }

    /// Plans, scatters and gathers one computation. Invalid input is rejected
    /// before anything is sent; lost partitions are not an error and show up
    /// in the result instead.
    pub async fn run(&self, job: Job) -> Result<AggregateResult, PlanError> {
        let plan = self.plan(job.total_terms)?;
        let span = info_span!("run", t = job.exponent, n = job.total_terms);
        let result = async move {
            info!("dispatching {} partitions", plan.len());
            let outcomes = scatter(
                &plan,
                &job,
                &self.config.workers,
                self.config.reply_timeout,
            );
            let result = Aggregator::new(&job).collect(outcomes).await;
            info!(
                "collected {} of {} terms, sum = {:.2}",
                result.terms_seen, result.total_terms, result.total_sum
            );
            result
        }
        .instrument(span)
        .await;
        Ok(result)
    }
}
