// Synthetic workload command

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::output::{print_field, print_table_header, print_table_row, OutputFormat};
use anyhow::{ensure, Context, Result};
use autoscale_executor::{AdaptiveExecutor, ExecutorConfig, ShutdownReport};
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Args)]
pub struct RunArgs {
    /// Maximum concurrency
    #[arg(long, env = "EXECUTOR_POOL_SIZE")]
    pub pool_size: Option<usize>,

    /// Slow-task threshold in milliseconds; 0 or negative disables adaptation
    #[arg(long, env = "EXECUTOR_TASK_TIMEOUT_MS", allow_negative_numbers = true)]
    pub task_timeout_ms: Option<i64>,

    /// Number of tasks to submit
    #[arg(long, default_value_t = 100)]
    pub tasks: usize,

    /// Fraction of tasks that run past the threshold
    #[arg(long, default_value_t = 0.2)]
    pub slow_ratio: f64,

    /// Duration of a slow task in milliseconds
    #[arg(long, default_value_t = 300)]
    pub slow_ms: u64,

    /// Duration of a fast task in milliseconds
    #[arg(long, default_value_t = 10)]
    pub fast_ms: u64,

    /// Seed for the slow/fast mix
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Result of a workload run
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub tasks_submitted: usize,
    pub tasks_completed: usize,
    pub max_pool_size: usize,
    pub final_pool_size: usize,
    pub min_pool_size: usize,
    pub peak_pool_size: usize,
    pub elapsed_ms: u128,
    pub shutdown: ShutdownReport,
}

/// Smallest and largest effective size seen during a run
struct SizeRange {
    min: usize,
    max: usize,
}

impl SizeRange {
    fn new(initial: usize) -> Self {
        Self {
            min: initial,
            max: initial,
        }
    }

    fn observe(&mut self, size: usize) {
        self.min = self.min.min(size);
        self.max = self.max.max(size);
    }
}

fn resolve_config(args: &RunArgs) -> Result<ExecutorConfig> {
    let mut config = ExecutorConfig::from_env();
    if let Some(pool_size) = args.pool_size {
        config = config.with_pool_size(pool_size);
    }
    if let Some(timeout_ms) = args.task_timeout_ms {
        config = config.with_task_timeout_ms(timeout_ms);
    }
    config.validate().context("invalid executor configuration")?;
    Ok(config)
}

pub async fn run(args: RunArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&args.slow_ratio),
        "--slow-ratio must be between 0 and 1, got {}",
        args.slow_ratio
    );

    let config = resolve_config(&args)?;
    let executor = AdaptiveExecutor::new(config).context("failed to start executor")?;
    let completed = Arc::new(AtomicUsize::new(0));
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut sizes = SizeRange::new(executor.current_pool_size());

    info!(
        pool_size = executor.max_pool_size(),
        tasks = args.tasks,
        slow_ratio = args.slow_ratio,
        "Starting workload"
    );

    let started = Instant::now();
    for i in 0..args.tasks {
        let slow = rng.gen_bool(args.slow_ratio);
        let duration = Duration::from_millis(if slow { args.slow_ms } else { args.fast_ms });
        let completed = Arc::clone(&completed);

        executor
            .submit(async move {
                tokio::time::sleep(duration).await;
                completed.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .with_context(|| format!("failed to submit task {i}"))?;

        let size = executor.current_pool_size();
        sizes.observe(size);
        debug!(task = i, slow, pool_size = size, "Submitted task");
    }

    let shutdown = executor.drain_and_shutdown().await;
    sizes.observe(executor.current_pool_size());

    let summary = RunSummary {
        tasks_submitted: args.tasks,
        tasks_completed: completed.load(Ordering::SeqCst),
        max_pool_size: executor.max_pool_size(),
        final_pool_size: executor.current_pool_size(),
        min_pool_size: sizes.min,
        peak_pool_size: sizes.max,
        elapsed_ms: started.elapsed().as_millis(),
        shutdown,
    };

    if format.is_text() {
        print_summary(&summary, quiet);
    } else {
        format.print_value(&summary)?;
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, quiet: bool) {
    print_field(
        "Tasks",
        &format!("{}/{}", summary.tasks_completed, summary.tasks_submitted),
    );
    print_field("Elapsed", &format!("{}ms", summary.elapsed_ms));
    if quiet {
        return;
    }

    println!();
    print_table_header(&[("POOL", 8), ("MIN", 6), ("PEAK", 6), ("FINAL", 6)]);
    print_table_row(&[
        (&summary.max_pool_size.to_string(), 8),
        (&summary.min_pool_size.to_string(), 6),
        (&summary.peak_pool_size.to_string(), 6),
        (&summary.final_pool_size.to_string(), 6),
    ]);
    println!();

    let shutdown = &summary.shutdown;
    print_field(
        "Shutdown",
        if shutdown.graceful {
            "graceful"
        } else {
            "forced"
        },
    );
    if !shutdown.graceful {
        print_field("Cancelled", &shutdown.cancelled_running.to_string());
        print_field("Dropped", &shutdown.dropped_queued.to_string());
    }
}
