// Upstream status fetcher: JSON endpoint first, HTML page as fallback.
// Never fails a cycle; the worst case is an empty mount map with the reasons recorded.

use crate::config::UpstreamConfig;
use crate::models::MountMap;
use crate::status_parser::{self, ContentKind};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} returned undecodable JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of fetching one upstream server.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub base_url: String,
    pub mounts: MountMap,
    /// Which document produced `mounts`; None when both attempts came up empty.
    pub strategy: Option<ContentKind>,
    /// Soft failures, in the order they happened.
    pub failures: Vec<String>,
}

impl FetchOutcome {
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.map_or("none", |k| k.as_str())
    }
}

pub struct StatusFetcher {
    client: Client,
    json_path: String,
    html_path: String,
}

impl StatusFetcher {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            json_path: config.json_path.clone(),
            html_path: config.html_path.clone(),
        })
    }

    /// Fetches each server in turn and merges their mounts (later servers win on collisions).
    pub async fn fetch_all(&self, base_urls: &[String]) -> (MountMap, Vec<FetchOutcome>) {
        let mut merged = MountMap::new();
        let mut outcomes = Vec::with_capacity(base_urls.len());
        for base in base_urls {
            let outcome = self.fetch(base).await;
            merged.extend(outcome.mounts.clone());
            outcomes.push(outcome);
        }
        (merged, outcomes)
    }

    #[instrument(skip(self), fields(operation = "fetch_status"))]
    pub async fn fetch(&self, base_url: &str) -> FetchOutcome {
        let mut failures = Vec::new();

        match self.fetch_json(base_url).await {
            Ok(mounts) if !mounts.is_empty() => {
                return FetchOutcome {
                    base_url: base_url.to_string(),
                    mounts,
                    strategy: Some(ContentKind::Json),
                    failures,
                };
            }
            Ok(_) => {
                warn!("JSON status listed no mounts; trying HTML status page");
                failures.push("json: no mounts".to_string());
            }
            Err(e) => {
                warn!(error = %e, "JSON status failed; trying HTML status page");
                failures.push(format!("json: {}", e));
            }
        }

        match self.fetch_html(base_url).await {
            Ok(mounts) if !mounts.is_empty() => {
                return FetchOutcome {
                    base_url: base_url.to_string(),
                    mounts,
                    strategy: Some(ContentKind::Html),
                    failures,
                };
            }
            Ok(_) => failures.push("html: no mounts".to_string()),
            Err(e) => failures.push(format!("html: {}", e)),
        }

        warn!(
            failures = ?failures,
            "no mounts from upstream; tracked sources will read 0 listeners"
        );
        FetchOutcome {
            base_url: base_url.to_string(),
            mounts: MountMap::new(),
            strategy: None,
            failures,
        }
    }

    async fn fetch_json(&self, base_url: &str) -> Result<MountMap, FetchError> {
        let url = endpoint(base_url, &self.json_path);
        let (content_type, body) = self.get(&url).await?;
        if !content_type.to_lowercase().contains("json") {
            warn!(content_type = %content_type, "unexpected content type for JSON status; parsing anyway");
        }
        status_parser::parse_status_bytes(&body).map_err(|source| FetchError::Decode { url, source })
    }

    async fn fetch_html(&self, base_url: &str) -> Result<MountMap, FetchError> {
        let url = endpoint(base_url, &self.html_path);
        let (_, body) = self.get(&url).await?;
        Ok(status_parser::parse(ContentKind::Html, &body))
    }

    /// GET returning (content type, body). Non-2xx is an error.
    async fn get(&self, url: &str) -> Result<(String, Vec<u8>), FetchError> {
        let http = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().await.map_err(http)?;
        Ok((content_type, body.to_vec()))
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
