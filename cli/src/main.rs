use std::{
    io::{self, BufRead, Write},
    net::SocketAddr,
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::future::try_join_all;
use scatter::cluster::{
    config::ClusterConfig, coordinator::Coordinator, plan::Job, worker::Worker,
    DEFAULT_WORKER_COUNT,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "scatter-cli")]
#[command(about = "Distributed power sums over UDP workers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more workers in this process
    Worker {
        /// Address to serve on; repeat to run several workers
        #[arg(long, default_values_t = default_workers())]
        listen: Vec<SocketAddr>,
    },

    /// Compute Σ i^t over [0, n) across the workers
    Coordinate {
        /// Exponent t; asked for on stdin when omitted
        #[arg(short, long)]
        exponent: Option<u32>,
        /// Total number of terms n; asked for on stdin when omitted
        #[arg(short = 'n', long)]
        terms: Option<u64>,
        /// Worker address, in partition order; repeat once per worker
        #[arg(long = "worker", default_values_t = default_workers())]
        workers: Vec<SocketAddr>,
        /// Per-worker reply deadline in milliseconds, 0 waits forever
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
}

fn default_workers() -> Vec<SocketAddr> {
    ClusterConfig::localhost(DEFAULT_WORKER_COUNT).workers
}

/// Prompts on stdout and parses one line from stdin.
fn prompt<T>(question: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    print!("{question}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("stdin closed before an answer was given");
    }
    line.trim()
        .parse()
        .with_context(|| format!("could not parse {:?}", line.trim()))
}

async fn run_workers(listen: Vec<SocketAddr>) -> Result<()> {
    let mut workers = Vec::with_capacity(listen.len());
    for addr in listen {
        workers.push(Worker::bind(addr).await?);
    }
    for worker in &workers {
        println!("Worker listening on {}", worker.local_addr());
    }
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let shutdown = futures::FutureExt::shared(Box::pin(shutdown));
    let handles = workers
        .into_iter()
        .map(|worker| tokio::spawn(worker.serve_until(shutdown.clone())));
    for served in try_join_all(handles).await? {
        served?;
    }
    Ok(())
}

async fn coordinate(
    exponent: Option<u32>,
    terms: Option<u64>,
    workers: Vec<SocketAddr>,
    timeout_ms: u64,
) -> Result<()> {
    let exponent = match exponent {
        Some(t) => t,
        None => prompt("Enter the exponent (t): ")?,
    };
    let terms = match terms {
        Some(n) => n,
        None => prompt("Enter the value of n (total terms): ")?,
    };
    let reply_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

    let coordinator = Coordinator::new(
        ClusterConfig::builder()
            .workers(workers)
            .reply_timeout(reply_timeout)
            .build(),
    );
    let result = coordinator.run(Job::power_sum(exponent, terms)).await?;
    info!(complete = result.is_complete(), "run finished");

    for partition in &result.partitions {
        println!(
            "Received sum for partition {}: {:.2}",
            partition.partition, partition.sum
        );
    }
    for failure in &result.failures {
        println!(
            "No sum for partition {} from {}: {}",
            failure.partition, failure.worker, failure.error
        );
    }

    println!();
    println!("Total sum: {:.2}", result.total_sum);
    println!("Total number of terms: {}", result.terms_seen);
    println!("Exponentiation (t): {}", result.exponent);
    if !result.is_complete() {
        println!(
            "Warning: result is incomplete, {} of {} terms are missing",
            result.missing_terms(),
            result.total_terms
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Worker { listen } => run_workers(listen).await,
        Commands::Coordinate {
            exponent,
            terms,
            workers,
            timeout_ms,
        } => coordinate(exponent, terms, workers, timeout_ms).await,
    }
}
