//! # Lynks worker CLI
//!
//! Operational commands for the background workers.
//!
//! ```bash
//! # Validate a recurrence and show when it fires next
//! lynks-worker preview "every monday, friday 09:00" --tz Europe/Amsterdam --count 3
//!
//! # List persisted schedules
//! lynks-worker schedules --worker reminder
//!
//! # Sweep stale scrape partitions now
//! lynks-worker cleanup
//! ```
//!
//! Configuration is read from `<config_dir>/worker.yaml`, created with defaults on first use.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use lynks_worker::{
    actor::{discussion::DISCUSSION_WORKER, reminder::REMINDER_WORKER, temp_cleanup::sweep_temp_dirs},
    adapter::schedule::ScheduleStoreFactory,
    config::WorkerConfig,
    domain::command::{WorkerCli, WorkerCliCommand, preview_rows, schedule_rows}
};
use tabled::Table;
use tracing_subscriber::EnvFilter;

/// Workers whose schedules are persisted
const SCHEDULED_WORKERS: [&str; 2] = [REMINDER_WORKER, DISCUSSION_WORKER];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lynks_worker=info")))
        .init();

    let cli = WorkerCli::parse();

    match cli.command {
        WorkerCliCommand::Preview { spec, tz, count } => {
            let rows = preview_rows(&spec, &tz, Utc::now(), count)?;
            println!("{}", Table::new(rows));
        }
        WorkerCliCommand::Schedules { worker, store } => {
            let config = WorkerConfig::load()?;
            let store_type = store.unwrap_or(config.schedule_store);
            let store = ScheduleStoreFactory::create(store_type, Some(config.database_path.as_path()))
                .with_context(|| format!("Failed to open the {} schedule store", store_type.as_str()))?;

            let workers: Vec<&str> = match &worker {
                Some(worker) => vec![worker.as_str()],
                None => SCHEDULED_WORKERS.to_vec()
            };
            let rows = schedule_rows(store.as_ref(), &workers).await?;
            if rows.is_empty() {
                println!("No schedules found");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        WorkerCliCommand::Cleanup => {
            let config = WorkerConfig::load()?;
            let cutoff = Utc::now() - chrono::Duration::days(config.temp_file_max_age_days as i64);
            let removed = sweep_temp_dirs(&config.temp_path, cutoff).await?;
            for dir in &removed {
                println!("removed {}", dir.display());
            }
            println!("{} stale temp directories removed", removed.len());
        }
    }

    Ok(())
}
