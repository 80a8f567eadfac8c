// Icecast status parsing: raw status documents -> mountpoint metrics.
// Parsers never fail on malformed content; they return whatever they could recognize.

mod html;
mod json;

pub use html::{AGGREGATE_MOUNT, parse_status_html};
pub use json::{SourceSkip, parse_source, parse_status_bytes, parse_status_json};

/// Which status document a mount map came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Html,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Json => "json",
            ContentKind::Html => "html",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses `body` with the parser for `kind`. Undecodable JSON yields an empty map.
pub fn parse(kind: ContentKind, body: &[u8]) -> crate::models::MountMap {
    match kind {
        ContentKind::Json => parse_status_bytes(body).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "status JSON did not decode");
            Default::default()
        }),
        ContentKind::Html => parse_status_html(&String::from_utf8_lossy(body)),
    }
}
