//! Operator binary: run the worker, clean up old records, inspect the
//! queue, and exercise the full pipeline against the bundled in-memory
//! provider.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use conveyor_core::{
    Dispatched, Dispatcher, EventBus, Job, JobError, JobRegistry, MemoryProvider, QueueConfig,
    QueueManager, QueueProvider, Scheduler, Worker,
};

/// Demo job: logs a greeting. Fails every fourth seed so failure capture is
/// visible in the output.
#[derive(Debug, Serialize, Deserialize)]
struct Greet {
    n: u64,
}

#[async_trait]
impl Job for Greet {
    const NAME: &'static str = "demo.greet";
    const QUEUEABLE: bool = true;

    async fn run(self) -> Result<(), JobError> {
        if self.n % 4 == 3 {
            return Err(JobError::new(format!("greeting {} refused", self.n)));
        }
        tracing::info!(n = self.n, "hello from the queue");
        Ok(())
    }
}

/// Demo job for `enqueue`: announces a message, honoring queue and delay
/// overrides carried on the job itself.
#[derive(Debug, Serialize, Deserialize)]
struct Announce {
    message: String,
    queue: String,
    delay_secs: i64,
}

#[async_trait]
impl Job for Announce {
    const NAME: &'static str = "demo.announce";
    const QUEUEABLE: bool = true;

    async fn run(self) -> Result<(), JobError> {
        tracing::info!(message = %self.message, "announcement");
        Ok(())
    }

    fn queue(&self) -> &str {
        &self.queue
    }

    fn delay(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.delay_secs)
    }
}

#[derive(Parser)]
#[command(name = "conveyor", version, about = "Background job queue runner")]
struct Cli {
    /// JSON config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worker once against a queue.
    Run {
        #[arg(default_value = "default")]
        queue: String,

        /// Batch size override.
        #[arg(long)]
        count: Option<usize>,

        /// Seed this many demo jobs before running.
        #[arg(long, default_value_t = 0)]
        seed: usize,
    },

    /// Seed demo jobs and let the scheduler drain them.
    Demo {
        #[arg(long, default_value_t = 8)]
        jobs: usize,
    },

    /// Enqueue one demo job and run it.
    Enqueue {
        #[arg(long, default_value = "default")]
        queue: String,

        #[arg(long, default_value = "hello")]
        message: String,

        /// Hold the job back this many seconds.
        #[arg(long, default_value_t = 0)]
        delay_secs: i64,
    },

    /// Delete terminal records older than the retention window.
    Cleanup {
        /// Retention override in seconds.
        #[arg(long)]
        older_than_secs: Option<i64>,
    },

    /// Show record counts by status.
    Status,
}

struct App {
    config: QueueConfig,
    provider: Arc<MemoryProvider>,
    dispatcher: Arc<Dispatcher>,
    worker: Arc<Worker>,
}

impl App {
    fn build(config: QueueConfig) -> anyhow::Result<Self> {
        let provider = Arc::new(
            MemoryProvider::new().with_lock_duration(config.lock_duration()),
        );

        let manager = Arc::new(QueueManager::new(config.default_connection.clone()));
        manager.add_provider(config.default_connection.clone(), provider.clone());

        let mut registry = JobRegistry::new();
        registry.register::<Greet>()?;
        registry.register::<Announce>()?;

        let events = EventBus::new();
        let dispatcher = Arc::new(Dispatcher::new(manager, events.clone()));
        let worker = Arc::new(Worker::new(provider.clone(), Arc::new(registry), events));

        Ok(Self {
            config,
            provider,
            dispatcher,
            worker,
        })
    }

    async fn seed(&self, jobs: usize) -> anyhow::Result<()> {
        for n in 0..jobs as u64 {
            self.dispatcher.dispatch(Greet { n }).await?;
        }
        Ok(())
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<QueueConfig> {
    let Some(path) = path else {
        return Ok(QueueConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let app = App::build(config)?;

    match cli.command {
        Commands::Run { queue, count, seed } => {
            app.seed(seed).await?;
            let batch = count.unwrap_or(app.config.batch_size);
            let summary = app.worker.run(Some(&queue), batch).await?;
            println!(
                "processed {} job(s): {} completed, {} failed",
                summary.processed(),
                summary.completed(),
                summary.failed()
            );
            for report in &summary.reports {
                println!("  {} {} -> {:?}", report.id, report.job, report.outcome);
            }
        }

        Commands::Demo { jobs } => {
            app.seed(jobs).await?;

            let scheduler = Arc::new(Scheduler::new(
                app.worker.clone(),
                app.provider.clone(),
                None,
                app.config.batch_size.min(3),
            ));
            let handle = scheduler.spawn(std::time::Duration::from_millis(200));

            while app.provider.pending_count(None).await? > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            handle.shutdown_and_join().await;

            let counts = app.provider.counts(None).await?;
            println!(
                "drained: {} completed, {} failed",
                counts.completed, counts.failed
            );
        }

        Commands::Enqueue {
            queue,
            message,
            delay_secs,
        } => {
            let dispatched = app
                .dispatcher
                .dispatch(Announce {
                    message,
                    queue: queue.clone(),
                    delay_secs,
                })
                .await?;
            if let Dispatched::Queued(id) = dispatched {
                println!("queued {id} on '{queue}'");
            }

            // The bundled store is process-local, so execute here too; a
            // delayed job is simply reported as still pending.
            let summary = app.worker.run(Some(&queue), 1).await?;
            if summary.processed() == 0 {
                let pending = app.provider.pending_count(Some(&queue)).await?;
                println!("not yet eligible; {pending} pending");
            } else {
                println!("ran {} job(s)", summary.processed());
            }
        }

        Commands::Cleanup { older_than_secs } => {
            let retention = older_than_secs
                .map(chrono::Duration::seconds)
                .unwrap_or_else(|| app.config.retention());
            let removed = app.provider.cleanup(retention).await?;
            println!("removed {removed} record(s)");
        }

        Commands::Status => {
            let counts = app.provider.counts(None).await?;
            println!("pending:   {}", counts.pending);
            println!("running:   {}", counts.running);
            println!("failed:    {}", counts.failed);
            println!("completed: {}", counts.completed);
        }
    }

    Ok(())
}
