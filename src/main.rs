//! Thin CLI entry point. Scheduling-in-time is external: each subcommand
//! runs one invocation of a pipeline stage and exits; an external
//! scheduler (cron, a worker loop) is expected to invoke `dispatch` and
//! `schedule-exports` periodically and to run `upload` for every job
//! `schedule-exports` reports.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ichnaea_export::config::Settings;
use ichnaea_export::model::api_key::PostgresApiKeyRepo;
use ichnaea_export::model::user::PostgresUserRepo;
use ichnaea_export::registry::Registry;
use ichnaea_export::store::{RedisStore, Store};
use ichnaea_export::{dispatcher, scheduler, uploader, Error, JobContext};

#[derive(Parser)]
#[command(name = "ichnaea-export", about = "Geolocation ingest-and-export pipeline")]
struct Cli {
    #[arg(long, env = "ICHNAEA_CONFIG", default_value = "ichnaea.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drain the ingress queue once and fan reports out to every export queue.
    Dispatch,
    /// List every export-queue partition whose batch is currently ready.
    ScheduleExports,
    /// Run one upload job for a single export-queue partition.
    Upload {
        queue: String,
        partition: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config).map_err(|err| Error::Config {
        message: err.to_string(),
    })?;

    let store: Arc<dyn Store> = Arc::new(RedisStore::connect(&settings.redis_url).await?);
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect(&settings.database_url)
        .await?;
    let registry = Arc::new(Registry::from_settings(&settings, store.clone()));
    let users = Arc::new(PostgresUserRepo::new(pool.clone()));
    let api_keys = Arc::new(PostgresApiKeyRepo::new(pool));

    let needs_s3 = registry
        .iter()
        .any(|queue| matches!(queue.kind, ichnaea_export::export_queue::ExportQueueKind::S3));
    let mut ctx = JobContext::new(store, registry, users, api_keys, settings.ingress_queue.clone());
    if needs_s3 {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        ctx = ctx.with_s3_client(aws_sdk_s3::Client::new(&aws_config));
    }

    match cli.command {
        Command::Dispatch => {
            let mut needs_rearm = dispatcher::run(&ctx).await.map_err(Error::from)?;
            while needs_rearm {
                tracing::info!("ingress queue still ready, re-arming dispatcher");
                needs_rearm = dispatcher::run(&ctx).await.map_err(Error::from)?;
            }
        }
        Command::ScheduleExports => {
            for job in scheduler::ready_jobs(&ctx).await.map_err(Error::from)? {
                println!("{} {}", job.queue_name, job.partition_key);
            }
        }
        Command::Upload { queue, partition } => {
            let needs_rearm = uploader::run(&ctx, &queue, &partition).await.map_err(Error::from)?;
            if needs_rearm {
                tracing::info!(queue, partition, "partition ready again after upload, re-arming");
            }
        }
    }

    Ok(())
}
