use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// One hundred years of hours.
pub const MAX_WINDOW_HOURS: u32 = 24 * 366 * 100;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Icecast base URLs, fetched in order.
    #[serde(default = "default_base_urls")]
    pub base_urls: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_json_path")]
    pub json_path: String,
    #[serde(default = "default_html_path")]
    pub html_path: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_urls: default_base_urls(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            json_path: default_json_path(),
            html_path: default_html_path(),
        }
    }
}

fn default_base_urls() -> Vec<String> {
    vec!["http://127.0.0.1:8000".into()]
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_user_agent() -> String {
    "NopherosListenerScraper/2.0".into()
}

fn default_json_path() -> String {
    "/status-json.xsl".into()
}

fn default_html_path() -> String {
    "/status.xsl".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub mountpoint: String,
    pub label: String,
    #[serde(default = "default_true")]
    pub include_in_total: bool,
    #[serde(default = "default_true")]
    pub include_in_history: bool,
}

fn default_true() -> bool {
    true
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            id: "tower1".into(),
            mountpoint: "/tower1".into(),
            label: "Tower 1".into(),
            include_in_total: true,
            include_in_history: true,
        },
        SourceConfig {
            id: "tower2".into(),
            mountpoint: "/tower2".into(),
            label: "Tower 2".into(),
            include_in_total: true,
            include_in_history: true,
        },
    ]
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    /// Size of the recent-window artifact.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    /// Drop points before this UTC year from the full-history artifact.
    #[serde(default)]
    pub archive_cutoff_year: Option<i32>,
    /// Defaults to `<data_dir>/.cycle.lock`.
    #[serde(default)]
    pub lock_file: Option<PathBuf>,
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_file: default_history_file(),
            window_hours: default_window_hours(),
            archive_cutoff_year: None,
            lock_file: None,
            lock_stale_secs: default_lock_stale_secs(),
        }
    }
}

impl OutputConfig {
    pub fn lock_path(&self) -> PathBuf {
        self.lock_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(".cycle.lock"))
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("scraper/history.csv")
}

fn default_window_hours() -> u32 {
    24
}

fn default_lock_stale_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Git work tree the artifacts live in.
    #[serde(default = "default_repo_root")]
    pub repo_root: PathBuf,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repo_root: default_repo_root(),
        }
    }
}

fn default_repo_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// Unset: run one cycle and exit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    /// Cron expression, local time (e.g. "0 */15 * * * *").
    #[serde(default)]
    pub cron: Option<String>,
    /// Fixed interval when `cron` is not set.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl ScheduleConfig {
    pub fn is_scheduled(&self) -> bool {
        self.cron.is_some() || self.interval_secs.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            sources: default_sources(),
            output: OutputConfig::default(),
            publishing: PublishingConfig::default(),
            health: HealthConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (or `config.toml` when present), then applies env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::parse_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::parse_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("config file {}: {}", path.display(), e))?;
        Ok(toml::from_str(&s)?)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the environment-style overrides. `lookup` abstracts `std::env::var`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(urls) = lookup("ICECAST_BASE_URL") {
            self.upstream.base_urls = split_list(&urls);
        }
        if let Some(labels) = lookup("LISTENER_LABELS") {
            let labels = split_list(&labels);
            anyhow::ensure!(
                labels.len() == self.sources.len(),
                "LISTENER_LABELS has {} labels but {} sources are configured",
                labels.len(),
                self.sources.len()
            );
            for (source, label) in self.sources.iter_mut().zip(labels) {
                source.label = label;
            }
        }
        if let Some(hours) = lookup("WINDOW_HOURS") {
            self.output.window_hours = hours
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("WINDOW_HOURS must be an integer: {}", e))?;
        }
        if let Some(year) = lookup("ARCHIVE_CUTOFF_YEAR") {
            let year = year.trim();
            self.output.archive_cutoff_year = if year.is_empty() {
                None
            } else {
                Some(year.parse().map_err(|e| {
                    anyhow::anyhow!("ARCHIVE_CUTOFF_YEAR must be a year: {}", e)
                })?)
            };
        }
        if lookup("SKIP_GIT").as_deref() == Some("1") {
            self.publishing.enabled = false;
        }
        if let Some(flag) = lookup("ENABLE_PI_HEALTH") {
            self.health.enabled = flag == "1";
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.upstream.base_urls.is_empty(),
            "upstream.base_urls must list at least one server"
        );
        for raw in &self.upstream.base_urls {
            let parsed = url::Url::parse(raw)
                .map_err(|e| anyhow::anyhow!("upstream.base_urls: invalid URL {:?}: {}", raw, e))?;
            anyhow::ensure!(
                matches!(parsed.scheme(), "http" | "https"),
                "upstream.base_urls: {:?} must be http or https",
                raw
            );
        }
        anyhow::ensure!(
            self.upstream.timeout_secs > 0,
            "upstream.timeout_secs must be > 0, got {}",
            self.upstream.timeout_secs
        );
        anyhow::ensure!(
            !self.sources.is_empty(),
            "sources must configure at least one tracked mount"
        );
        let mut seen = std::collections::HashSet::new();
        for s in &self.sources {
            let label = s.label.trim();
            anyhow::ensure!(!label.is_empty(), "sources.label must be non-empty ({})", s.id);
            anyhow::ensure!(
                !matches!(label, "Total" | "timestamp_iso" | "timestamp_ms"),
                "sources.label {:?} is a reserved column name",
                label
            );
            anyhow::ensure!(
                seen.insert(label.to_string()),
                "sources.label {:?} is used more than once",
                label
            );
            anyhow::ensure!(
                s.mountpoint.starts_with('/'),
                "sources.mountpoint must start with '/', got {:?}",
                s.mountpoint
            );
        }
        anyhow::ensure!(
            (1..=MAX_WINDOW_HOURS).contains(&self.output.window_hours),
            "output.window_hours must be between 1 and {}, got {}",
            MAX_WINDOW_HOURS,
            self.output.window_hours
        );
        if let Some(year) = self.output.archive_cutoff_year {
            anyhow::ensure!(
                (1970..=9999).contains(&year),
                "output.archive_cutoff_year must be between 1970 and 9999, got {}",
                year
            );
        }
        if let Some(expr) = &self.schedule.cron {
            <cron::Schedule as std::str::FromStr>::from_str(expr)
                .map_err(|e| anyhow::anyhow!("schedule.cron {:?} is invalid: {}", expr, e))?;
        }
        if let Some(secs) = self.schedule.interval_secs {
            anyhow::ensure!(secs > 0, "schedule.interval_secs must be > 0, got {}", secs);
        }
        Ok(())
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}
