use super::{error::PlanError, function::Function, wire::Request};

/// The parameters of one computation: Σ i^exponent over `[0, total_terms)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Job {
    pub function: Function,
    pub exponent: u32,
    pub total_terms: u64,
}

impl Job {
    pub fn power_sum(exponent: u32, total_terms: u64) -> Self {
        Self {
            function: Function::PowerSum,
            exponent,
            total_terms,
        }
    }
}

/// A contiguous, inclusive slice of the index range handled by one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

impl Partition {
    pub fn term_count(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn request(&self, job: &Job) -> Request {
        Request {
            function: job.function.id(),
            partition: self.index,
            range_start: self.start,
            range_end: self.end,
            total_terms: job.total_terms,
            exponent: job.exponent,
        }
    }
}

/// Equal partitions of `[0, total_terms)`, partition `p` belonging to
/// worker `p`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionPlan {
    partitions: Vec<Partition>,
    total_terms: u64,
}

impl PartitionPlan {
    pub fn new(total_terms: u64, workers: usize) -> Result<Self, PlanError> {
        if workers == 0 {
            Err(PlanError::NoWorkers)?
        }
        let count = u32::try_from(workers)
            .map_err(|_| PlanError::TooManyWorkers { workers })?;
        if total_terms % count as u64 != 0 {
            Err(PlanError::NotDivisible {
                total_terms,
                workers,
            })?
        }
        if total_terms < count as u64 {
            Err(PlanError::FewerTermsThanWorkers {
                total_terms,
                workers,
            })?
        }

        let size = total_terms / count as u64;
        let partitions = (0..count)
            .map(|index| {
                let start = index as u64 * size;
                Partition {
                    index,
                    start,
                    end: start + size - 1,
                }
            })
            .collect();

        Ok(Self {
            partitions,
            total_terms,
        })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    /// One request per partition, in partition order.
    pub fn requests<'a>(&'a self, job: &'a Job) -> impl Iterator<Item = Request> + 'a {
        self.partitions.iter().map(move |p| p.request(job))
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn ranges(plan: &PartitionPlan) -> Vec<(u64, u64)> {
        plan.partitions().iter().map(|p| (p.start, p.end)).collect()
    }

    #[test]
    fn ten_terms_over_five_workers() {
        let plan = PartitionPlan::new(10, 5).unwrap();

        assert_eq!(
            ranges(&plan),
            vec![(0, 1), (2, 3), (4, 5), (6, 7), (8, 9)]
        );
        assert!(plan.partitions().iter().all(|p| p.term_count() == 2));
    }

    #[test]
    fn requests_carry_the_job() {
        let plan = PartitionPlan::new(10, 5).unwrap();
        let job = Job::power_sum(2, 10);
        let requests: Vec<_> = plan.requests(&job).collect();

        assert_eq!(requests.len(), 5);
        assert_eq!(
            requests[3],
            Request {
                function: 1,
                partition: 3,
                range_start: 6,
                range_end: 7,
                total_terms: 10,
                exponent: 2,
            }
        );
    }

    #[test]
    fn covers_every_index_exactly_once() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let workers = rng.gen_range(1..=16usize);
            let total_terms = workers as u64 * rng.gen_range(1..=64u64);
            let plan = PartitionPlan::new(total_terms, workers).unwrap();

            assert_eq!(plan.len(), workers);
            let mut next = 0;
            for (index, partition) in plan.partitions().iter().enumerate() {
                assert_eq!(partition.index as usize, index);
                assert_eq!(partition.start, next);
                assert!(partition.end >= partition.start);
                next = partition.end + 1;
            }
            assert_eq!(next, total_terms);
            let counted: u64 =
                plan.partitions().iter().map(Partition::term_count).sum();
            assert_eq!(counted, total_terms);
        }
    }

    #[test]
    fn single_worker_takes_everything() {
        let plan = PartitionPlan::new(7, 1).unwrap();

        assert_eq!(ranges(&plan), vec![(0, 6)]);
    }

    #[test]
    fn rejects_indivisible_terms() {
        assert_eq!(
            PartitionPlan::new(11, 5),
            Err(PlanError::NotDivisible {
                total_terms: 11,
                workers: 5
            })
        );
    }

    #[test]
    fn rejects_fewer_terms_than_workers() {
        assert_eq!(
            PartitionPlan::new(0, 5),
            Err(PlanError::FewerTermsThanWorkers {
                total_terms: 0,
                workers: 5
            })
        );
    }

    #[test]
    fn rejects_empty_cluster() {
        assert_eq!(PartitionPlan::new(10, 0), Err(PlanError::NoWorkers));
    }
}
