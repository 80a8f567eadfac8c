// status.xsl fallback: scan <table>s whose headers name a mount column and a listeners column.

use crate::models::{MountMap, MountMetric};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Synthetic mount reported when only a page-wide listener count is found.
pub const AGGREGATE_MOUNT: &str = "_total";

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static HEADER: LazyLock<Selector> = LazyLock::new(|| selector("th"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td, th"));
static AGGREGATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)listeners?(?::|\s)\s*(\d+)").expect("aggregate listener pattern is valid")
});

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector is valid")
}

/// Column positions for one candidate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    mount: usize,
    listeners: usize,
    peak: Option<usize>,
}

impl Columns {
    /// Needs a header containing "mount" and one equal to "listeners" (case-insensitive).
    fn from_headers(headers: &[String]) -> Option<Self> {
        let mut mount = None;
        let mut listeners = None;
        let mut peak = None;
        for (i, h) in headers.iter().enumerate() {
            let h = h.to_lowercase();
            if h.contains("mount") {
                mount.get_or_insert(i);
            } else if h == "listeners" {
                listeners.get_or_insert(i);
            } else if h.contains("peak") {
                peak.get_or_insert(i);
            }
        }
        Some(Self {
            mount: mount?,
            listeners: listeners?,
            peak,
        })
    }

    fn span(&self) -> usize {
        self.mount.max(self.listeners) + 1
    }
}

/// Parses an HTML status page. Falls back to a single `_total` mount when no table matches.
pub fn parse_status_html(html: &str) -> MountMap {
    let doc = Html::parse_document(html);
    let mut mounts = MountMap::new();

    for table in doc.select(&TABLE) {
        let headers: Vec<String> = table.select(&HEADER).map(cell_text).collect();
        let Some(cols) = Columns::from_headers(&headers) else {
            continue;
        };
        for tr in table.select(&ROW) {
            if let Some(metric) = parse_row(tr, cols, &headers) {
                mounts.insert(metric.mountpoint.clone(), metric);
            }
        }
    }

    if mounts.is_empty()
        && let Some(total) = aggregate_listeners(&doc)
    {
        tracing::debug!(listeners = total, "no status table matched; using page-wide count");
        mounts.insert(
            AGGREGATE_MOUNT.to_string(),
            MountMetric::from_counts(AGGREGATE_MOUNT, total, None),
        );
    }
    mounts
}

/// Data cells may be `<td>` or `<th>`; the header row itself is recognized by its text.
fn parse_row(tr: ElementRef<'_>, cols: Columns, headers: &[String]) -> Option<MountMetric> {
    let cells: Vec<String> = tr.select(&CELL).map(cell_text).collect();
    if cells.len() < cols.span() || cells == headers {
        return None;
    }

    let mount = cells[cols.mount].as_str();
    if mount.is_empty() || mount.eq_ignore_ascii_case("mount point") {
        return None;
    }
    let mountpoint = if mount.starts_with('/') {
        mount.to_string()
    } else {
        format!("/{}", mount)
    };

    let listeners = digits(&cells[cols.listeners]).unwrap_or(0);
    let peak = cols
        .peak
        .and_then(|i| cells.get(i))
        .and_then(|c| digits(c));
    Some(MountMetric::from_counts(mountpoint, listeners, peak))
}

/// Text of an element with each text node trimmed, joined without separators.
fn cell_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect()
}

/// Strips everything but ASCII digits, then parses. Empty -> None.
fn digits(cell: &str) -> Option<u64> {
    let only: String = cell.chars().filter(char::is_ascii_digit).collect();
    only.parse().ok()
}

fn aggregate_listeners(doc: &Html) -> Option<u64> {
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    AGGREGATE
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(h: &[&str]) -> Vec<String> {
        h.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn columns_require_mount_and_exact_listeners_header() {
        let cols = Columns::from_headers(&headers(&["Mount Point", "Listeners", "Peak"])).unwrap();
        assert_eq!(cols.mount, 0);
        assert_eq!(cols.listeners, 1);
        assert_eq!(cols.peak, Some(2));

        assert!(Columns::from_headers(&headers(&["Mount Point", "Current Listeners"])).is_none());
        assert!(Columns::from_headers(&headers(&["Stream", "Listeners"])).is_none());
    }

    #[test]
    fn columns_take_the_first_mount_header() {
        let cols =
            Columns::from_headers(&headers(&["Mount", "Listeners", "Mount type"])).unwrap();
        assert_eq!(cols.mount, 0);
        assert_eq!(cols.span(), 2);
    }

    #[test]
    fn digits_filters_before_parsing() {
        assert_eq!(digits("1,024 "), Some(1024));
        assert_eq!(digits("n/a"), None);
        assert_eq!(digits(""), None);
    }
}
