// One sampling cycle: fetch -> aggregate -> append history -> rebuild every artifact -> publish.
// Scheduled mode repeats the cycle on a cron expression or a fixed interval.

use crate::aggregator::{self, iso_timestamp};
use crate::archive;
use crate::artifacts::ArtifactWriter;
use crate::config::{AppConfig, ScheduleConfig};
use crate::fetcher::{FetchOutcome, StatusFetcher};
use crate::health_repo::HealthRepo;
use crate::history_repo::{HistoryError, HistoryRepo};
use crate::lock::{CycleLock, LockError};
use crate::models::{HistoryRow, SampleRecord};
use crate::publisher::{self, GitPublisher};
use crate::registry::Registry;
use crate::series;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const DATA_ALL: &str = "data_all.json";
pub const DATA_RECENT: &str = "data_24h.json";
pub const HOST_HEALTH: &str = "pi_health.json";

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// Nothing was fetched or written.
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Lock(#[from] LockError),
    /// Stored history could not be read. No artifact is written from a partial view.
    #[error("history unreadable: {0}")]
    History(#[source] HistoryError),
}

impl CycleError {
    pub fn is_config(&self) -> bool {
        matches!(self, CycleError::Config(_))
    }
}

/// Collaborators for a cycle. Built once, shared by every cycle of the process.
pub struct CycleDeps {
    pub registry: Registry,
    pub fetcher: StatusFetcher,
    pub history: HistoryRepo,
    pub writer: ArtifactWriter,
    /// None when the host-health sidecar is disabled.
    pub health: Option<HealthRepo>,
    /// None when publishing is disabled.
    pub publisher: Option<GitPublisher>,
}

pub struct CycleConfig {
    pub base_urls: Vec<String>,
    pub window_hours: u32,
    pub archive_cutoff_year: Option<i32>,
    pub lock_path: PathBuf,
    pub lock_stale_after: Duration,
}

/// Everything a cycle did, for logging and tests.
#[derive(Debug)]
pub struct CycleReport {
    pub record: SampleRecord,
    pub upstreams: Vec<FetchOutcome>,
    pub history_rows: usize,
    pub history_persisted: bool,
    pub written: Vec<PathBuf>,
    pub failed: Vec<String>,
    pub published: bool,
}

impl CycleReport {
    /// True when no upstream produced any mount, so every tracked source read 0.
    pub fn is_degraded(&self) -> bool {
        self.upstreams.iter().all(|u| u.strategy.is_none())
    }
}

pub fn build(config: &AppConfig) -> Result<(CycleDeps, CycleConfig), CycleError> {
    let fetcher = StatusFetcher::new(&config.upstream)
        .map_err(|e| CycleError::Config(format!("HTTP client: {}", e)))?;
    let deps = CycleDeps {
        registry: Registry::from_config(&config.sources),
        fetcher,
        history: HistoryRepo::new(&config.output.history_file),
        writer: ArtifactWriter::new(&config.output.data_dir),
        health: config.health.enabled.then(HealthRepo::new),
        publisher: config
            .publishing
            .enabled
            .then(|| GitPublisher::new(&config.publishing.repo_root)),
    };
    let cycle_config = CycleConfig {
        base_urls: config.upstream.base_urls.clone(),
        window_hours: config.output.window_hours,
        archive_cutoff_year: config.output.archive_cutoff_year,
        lock_path: config.output.lock_path(),
        lock_stale_after: Duration::from_secs(config.output.lock_stale_secs),
    };
    Ok((deps, cycle_config))
}

/// Runs one cycle stamped `now`. Configuration problems, a held lock and unreadable history
/// are errors; upstream and per-file failures degrade the output and are reported.
pub async fn run_cycle(
    deps: &CycleDeps,
    config: &CycleConfig,
    now: DateTime<Utc>,
) -> Result<CycleReport, CycleError> {
    if deps.registry.is_empty() {
        return Err(CycleError::Config("no tracked sources configured".into()));
    }
    if config.base_urls.is_empty() {
        return Err(CycleError::Config("no upstream servers configured".into()));
    }
    let _lock = CycleLock::acquire(&config.lock_path, config.lock_stale_after)?;

    let (mounts, upstreams) = deps.fetcher.fetch_all(&config.base_urls).await;
    for u in &upstreams {
        info!(
            base_url = %u.base_url,
            strategy = u.strategy_name(),
            mounts = u.mounts.len(),
            failures = u.failures.len(),
            "upstream fetched"
        );
    }

    let record = aggregator::aggregate(&mounts, &deps.registry, now);
    info!(total = record.total, "sample taken");
    for r in &record.readings {
        info!(
            label = %r.label,
            listeners = r.listeners,
            peak = ?r.listener_peak,
            history = r.include_in_history,
            "source"
        );
    }

    let names = deps.registry.series_names();
    let columns = deps.registry.column_order();
    let mut failed = Vec::new();
    let (rows, history_persisted) =
        append_history(&deps.history, record.to_row(), &columns, &mut failed)?;

    let generated_at = iso_timestamp(now);
    let mut written = Vec::new();
    if history_persisted {
        written.push(deps.history.path().to_path_buf());
    }

    let all = series::build(&rows, &names);
    let full = match config.archive_cutoff_year {
        Some(year) => series::filter_by_year(&all, year),
        None => all.clone(),
    };
    let recent = series::window(&all, series::window_cutoff(now, config.window_hours));
    for (file, body) in [(DATA_ALL, full), (DATA_RECENT, recent)] {
        match deps.writer.write_json(file, &series::payload(&generated_at, body)) {
            Ok(path) => written.push(path),
            Err(e) => {
                warn!(error = %e, "artifact skipped");
                failed.push(e.to_string());
            }
        }
    }

    let archives = archive::write_archives(&rows, &names, &deps.writer, &generated_at);
    written.extend(archives.written);
    failed.extend(archives.failed);

    if let Some(health) = &deps.health {
        match write_health(health, &deps.writer, &generated_at).await {
            Ok(path) => written.push(path),
            Err(e) => {
                warn!(error = %e, "host health skipped");
                failed.push(e.to_string());
            }
        }
    }

    let mut published = false;
    if let Some(git) = &deps.publisher {
        match git
            .publish(&written, &publisher::commit_message(&record.timestamp_iso))
            .await
        {
            Ok(()) => published = true,
            Err(e) => warn!(error = %e, "publish failed"),
        }
    }

    info!(
        rows = rows.len(),
        written = written.len(),
        failed = failed.len(),
        "cycle complete"
    );
    Ok(CycleReport {
        record,
        upstreams,
        history_rows: rows.len(),
        history_persisted,
        written,
        failed,
        published,
    })
}

/// Loads, appends and persists. A read failure aborts the cycle before any output; if only
/// the rewrite fails the cycle continues with the rows in memory.
fn append_history(
    history: &HistoryRepo,
    row: HistoryRow,
    columns: &[String],
    failed: &mut Vec<String>,
) -> Result<(Vec<HistoryRow>, bool), CycleError> {
    let mut ledger = history.load_ledger().map_err(CycleError::History)?;
    ledger.rows.push(row);
    let persisted = match history.persist(&ledger, columns) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "history not persisted");
            failed.push(e.to_string());
            false
        }
    };
    Ok((ledger.rows, persisted))
}

async fn write_health(
    health: &HealthRepo,
    writer: &ArtifactWriter,
    generated_at: &str,
) -> anyhow::Result<PathBuf> {
    let snapshot = health.collect(generated_at.to_string()).await?;
    Ok(writer.write_json(HOST_HEALTH, &snapshot)?)
}

/// When to run the next cycle.
enum Trigger {
    Cron(cron::Schedule),
    Every(Duration),
}

impl Trigger {
    fn from_config(schedule: &ScheduleConfig) -> Result<Self, CycleError> {
        if let Some(expr) = &schedule.cron {
            let parsed = cron::Schedule::from_str(expr)
                .map_err(|e| CycleError::Config(format!("schedule.cron {:?}: {}", expr, e)))?;
            return Ok(Trigger::Cron(parsed));
        }
        match schedule.interval_secs {
            Some(secs) if secs > 0 => Ok(Trigger::Every(Duration::from_secs(secs))),
            _ => Err(CycleError::Config("no schedule configured".into())),
        }
    }

    /// Delay until the next run. Uses local time for cron.
    fn next_delay(&self) -> Option<Duration> {
        match self {
            Trigger::Cron(schedule) => {
                let now = chrono::Local::now();
                let next = schedule.after(&now).next()?;
                Some((next - now).to_std().unwrap_or(Duration::from_secs(1)))
            }
            Trigger::Every(d) => Some(*d),
        }
    }
}

/// Runs cycles on the configured schedule until `shutdown_rx` fires. Interval schedules run
/// the first cycle immediately. A cycle is never interrupted once started.
#[instrument(skip_all, name = "scheduler")]
pub async fn run_scheduled(
    deps: &CycleDeps,
    config: &CycleConfig,
    schedule: &ScheduleConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), CycleError> {
    let trigger = Trigger::from_config(schedule)?;
    let mut delay = match trigger {
        Trigger::Every(_) => Duration::ZERO,
        Trigger::Cron(_) => trigger
            .next_delay()
            .ok_or_else(|| CycleError::Config("cron schedule has no upcoming run".into()))?,
    };

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                match run_cycle(deps, config, Utc::now()).await {
                    Ok(report) if report.is_degraded() => {
                        warn!("cycle completed without upstream data");
                    }
                    Ok(_) => {}
                    Err(e) if e.is_config() => return Err(e),
                    Err(e) => warn!(error = %e, "cycle failed"),
                }
                let Some(next) = trigger.next_delay() else {
                    warn!("schedule has no upcoming run; stopping");
                    return Ok(());
                };
                delay = next;
            }
            _ = &mut shutdown_rx => {
                tracing::debug!("Scheduler shutting down");
                return Ok(());
            }
        }
    }
}
