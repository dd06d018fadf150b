use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use logkeeper::{
    config::LogkeeperConfig,
    db::DbPool,
    events::EventBus,
    jobs::{CleanupOldLogData, JobContext, JobQueue, SubmitOutcome},
    observability,
    retention::{self, RetentionPolicy},
    status::HttpTaskStatusClient,
};
use tokio_util::sync::CancellationToken;

/// CLI arguments for logkeeper
#[derive(Parser, Debug)]
#[command(version, about = "CI log retention and garbage collection", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (defaults to ./logkeeper.toml if it exists,
    /// otherwise built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run database migrations and exit
    Migrate,
    /// List tests currently eligible for retention deletion
    Eligible,
    /// Run a single retention sweep and exit
    Sweep {
        /// Report what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the periodic retention sweep until interrupted
    Worker,
    /// Reconcile builds against their task status
    Cleanup {
        /// Build and task to reconcile, as BUILD:TASK (repeatable)
        #[arg(long = "job", value_name = "BUILD:TASK", required = true, value_parser = parse_job_spec)]
        jobs: Vec<(String, String)>,
        /// Correlation id distinguishing re-submissions (defaults to a random UUID)
        #[arg(long)]
        correlation_id: Option<String>,
    },
}

fn parse_job_spec(value: &str) -> Result<(String, String), String> {
    match value.split_once(':') {
        Some((build, task)) if !build.is_empty() && !task.is_empty() => {
            Ok((build.to_string(), task.to_string()))
        }
        _ => Err(format!("expected BUILD:TASK, got '{value}'")),
    }
}

const DEFAULT_CONFIG_FILE: &str = "logkeeper.toml";

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("Failed to initialize tracing: {e}");
        std::process::exit(1);
    }

    match args.command {
        Command::Migrate => run_migrate(&config).await,
        Command::Eligible => run_eligible(&config).await,
        Command::Sweep { dry_run } => run_sweep(&config, dry_run).await,
        Command::Worker => run_worker(config).await,
        Command::Cleanup {
            jobs,
            correlation_id,
        } => run_cleanup(&config, jobs, correlation_id).await,
    }
}

fn load_config(explicit_path: Option<&std::path::Path>) -> LogkeeperConfig {
    let path = match explicit_path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return LogkeeperConfig::default();
            }
            default
        }
    };

    match LogkeeperConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Connect to the configured store, running migrations when enabled.
async fn connect(config: &LogkeeperConfig) -> Arc<DbPool> {
    if config.database.is_none() {
        eprintln!("Error: Database is not configured. Add a [database] section.");
        std::process::exit(1);
    }

    let pool = match DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    if config.database.run_migrations()
        && let Err(e) = pool.run_migrations().await
    {
        tracing::error!(error = %e, "Database migrations failed");
        eprintln!("Error: Database migrations failed: {e}");
        std::process::exit(1);
    }

    Arc::new(pool)
}

/// Run database migrations and exit.
///
/// Exits with code 0 on success, 1 on failure.
async fn run_migrate(config: &LogkeeperConfig) {
    if config.database.is_none() {
        eprintln!("Error: Database is not configured. Nothing to migrate.");
        std::process::exit(1);
    }

    match DbPool::from_config(&config.database).await {
        Ok(pool) => match pool.run_migrations().await {
            Ok(()) => tracing::info!("Database migrations completed successfully"),
            Err(e) => {
                tracing::error!(error = %e, "Database migrations failed");
                eprintln!("Error: Database migrations failed: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_eligible(config: &LogkeeperConfig) {
    let db = connect(config).await;
    let policy = RetentionPolicy::from_config(&config.retention);

    let tests = match policy.select_eligible(&db).await {
        Ok(tests) => tests,
        Err(e) => {
            eprintln!("Error: Failed to select eligible tests: {e}");
            std::process::exit(1);
        }
    };

    for test in &tests {
        println!("{}\t{}\t{}", test.id, test.build_id, test.started.to_rfc3339());
    }
    tracing::info!(
        eligible = tests.len(),
        cutoff_days = config.retention.cutoff_days,
        "Listed eligible tests"
    );
}

async fn run_sweep(config: &LogkeeperConfig, dry_run: bool) {
    let db = connect(config).await;
    let policy = RetentionPolicy::from_config(&config.retention);
    let mut safety = config.retention.safety.clone();
    safety.dry_run |= dry_run;

    match retention::run_sweep(&db, &policy, &safety).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: Failed to serialize sweep result: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Retention sweep failed");
            eprintln!("Error: Retention sweep failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_worker(config: LogkeeperConfig) {
    if !config.retention.enabled {
        eprintln!(
            "Error: Retention is disabled.\n\
             Set [retention] enabled = true in your config file."
        );
        std::process::exit(1);
    }

    let db = connect(&config).await;
    let events = Arc::new(EventBus::new());
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    retention::start_retention_worker(db.clone(), config.retention, events, shutdown).await;
    db.close().await;
}

async fn run_cleanup(
    config: &LogkeeperConfig,
    jobs: Vec<(String, String)>,
    correlation_id: Option<String>,
) {
    let db = connect(config).await;
    let client = match HttpTaskStatusClient::new(&config.task_status) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: Failed to create task status client: {e}");
            std::process::exit(1);
        }
    };

    let ctx = JobContext::new(db, Arc::new(client), Arc::new(EventBus::new()))
        .with_success_status(config.task_status.success_status.clone());
    let queue = JobQueue::new(Arc::new(ctx), config.jobs.clone());

    let correlation_id = correlation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    for (build_id, task_id) in jobs {
        let job = CleanupOldLogData::new(&build_id, &task_id, &correlation_id);
        if queue.submit(job) == SubmitOutcome::Duplicate {
            tracing::warn!(build_id = %build_id, task_id = %task_id, "Skipping duplicate job");
        }
    }

    let cancel = queue.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, cancelling jobs");
            cancel.cancel();
        }
    });

    let records = queue.run_pending().await;
    let mut failed = false;
    for record in &records {
        failed |= record.report.has_errors;
        match serde_json::to_string(&record.report) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(job_id = %record.job_id, error = %e, "Failed to serialize report"),
        }
    }

    if failed {
        std::process::exit(1);
    }
}
