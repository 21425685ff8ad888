//! Command line interface of the worker binary

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tabled::Tabled;

use crate::{
    adapter::schedule::ScheduleStoreType,
    domain::{
        error::WorkerError,
        schedule::{format_fire_time, preview_schedule}
    },
    port::schedule::ScheduleStore
};

/// Main CLI application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct WorkerCli {
    #[command(subcommand)]
    pub command: WorkerCliCommand
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum WorkerCliCommand {
    /// Validate a recurrence and show its next fire times
    Preview {
        /// Recurrence, e.g. "every monday, friday 09:00"
        spec:  String,
        /// IANA timezone the recurrence is read in
        #[arg(long, default_value = "UTC")]
        tz:    String,
        /// Number of fire times to show
        #[arg(long, default_value_t = 5)]
        count: usize
    },
    /// List persisted schedules
    Schedules {
        /// Only show schedules of this worker
        #[arg(long)]
        worker: Option<String>,
        /// Storage backend to read, defaults to the configured one
        #[arg(long)]
        store:  Option<ScheduleStoreType>
    },
    /// Run one temp directory sweep now
    Cleanup
}

#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct FireTimeRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Fires at")]
    pub fire:  String
}

#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ScheduleRow {
    #[tabled(rename = "Worker")]
    pub worker:   String,
    #[tabled(rename = "Key")]
    pub key:      String,
    #[tabled(rename = "Last run")]
    pub last_run: String
}

/// Rows of the `preview` command
pub fn preview_rows(spec: &str, tz: &str, now: DateTime<Utc>, count: usize) -> Result<Vec<FireTimeRow>, WorkerError> {
    let fires = preview_schedule(spec, tz, now, count)?;
    Ok(fires.iter().enumerate().map(|(i, fire)| FireTimeRow { index: i + 1, fire: format_fire_time(fire) }).collect())
}

/// Rows of the `schedules` command, in worker then key order
pub async fn schedule_rows(store: &dyn ScheduleStore, workers: &[&str]) -> Result<Vec<ScheduleRow>, WorkerError> {
    let mut rows = Vec::new();
    for worker in workers {
        let mut records = store.load_all(worker).await?;
        records.sort_by(|a, b| a.key.cmp(&b.key));
        rows.extend(records.into_iter().map(|record| ScheduleRow {
            worker:   record.worker,
            key:      record.key,
            last_run: record
                .last_run
                .and_then(DateTime::from_timestamp_millis)
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string())
        }));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{adapter::schedule::InMemoryScheduleStore, port::schedule::ScheduleRecord};

    #[test]
    fn test_cli_parses_preview_with_defaults() {
        let cli = WorkerCli::parse_from(["lynks-worker", "preview", "every day 09:00"]);
        match cli.command {
            WorkerCliCommand::Preview { spec, tz, count } => {
                assert_eq!(spec, "every day 09:00");
                assert_eq!(tz, "UTC");
                assert_eq!(count, 5);
            }
            other => panic!("unexpected command: {:?}", other)
        }

        let cli = WorkerCli::parse_from(["lynks-worker", "schedules", "--worker", "reminder", "--store", "inmemory"]);
        assert!(matches!(
            cli.command,
            WorkerCliCommand::Schedules { worker: Some(_), store: Some(ScheduleStoreType::InMemory) }
        ));
        assert!(WorkerCli::try_parse_from(["lynks-worker"]).is_err());
    }

    #[test]
    fn test_preview_rows() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let rows = preview_rows("every day 09:00", "Europe/Amsterdam", now, 2).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].fire, "Thu 02 May 2024 at 09:00");
        assert!(preview_rows("every day 09:00", "Atlantis", now, 2).is_err());
    }

    #[tokio::test]
    async fn test_schedule_rows() {
        let store = InMemoryScheduleStore::new();
        let records = [("reminder", "r2", None), ("reminder", "r1", None), ("discussion", "l1", Some(0))];
        for (worker, key, last_run) in records {
            let record = ScheduleRecord {
                worker: worker.into(),
                key: key.into(),
                payload: serde_json::Value::Null,
                last_run
            };
            store.save(record).await.unwrap();
        }

        let rows = schedule_rows(&store, &["reminder", "discussion"]).await.unwrap();
        let keys: Vec<&str> = rows.iter().map(|row| row.key.as_str()).collect();
        assert_eq!(keys, vec!["r1", "r2", "l1"]);
        assert_eq!(rows[0].last_run, "-");
        assert_eq!(rows[2].last_run, "1970-01-01 00:00:00 UTC");
    }
}
