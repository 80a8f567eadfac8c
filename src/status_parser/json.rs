// status-json.xsl: { "icestats": { "source": <object | array | absent> } }

use crate::models::{MountMap, MountMetric};
use serde_json::Value;
use url::Url;

/// Why a `source` entry contributed no metric.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceSkip {
    #[error("source entry is not an object")]
    NotAnObject,
    #[error("source entry has neither a listenurl path nor a mount field")]
    NoMountpoint,
}

/// Decodes a raw body, then parses it. Only a JSON syntax error is an error.
pub fn parse_status_bytes(body: &[u8]) -> Result<MountMap, serde_json::Error> {
    let doc: Value = serde_json::from_slice(body)?;
    Ok(parse_status_json(&doc))
}

/// Parses a decoded status document. Duplicate mountpoints: the later entry wins.
pub fn parse_status_json(doc: &Value) -> MountMap {
    let mut mounts = MountMap::new();
    let sources = match doc.get("icestats").and_then(|s| s.get("source")) {
        Some(Value::Array(list)) => list.as_slice(),
        Some(single @ Value::Object(_)) => std::slice::from_ref(single),
        Some(Value::Null) | None => return mounts,
        Some(other) => {
            tracing::debug!(kind = json_kind(other), "icestats.source has unexpected type");
            return mounts;
        }
    };

    for (idx, source) in sources.iter().enumerate() {
        match parse_source(source) {
            Ok(metric) => {
                mounts.insert(metric.mountpoint.clone(), metric);
            }
            Err(reason) => tracing::debug!(index = idx, %reason, "skipping status source"),
        }
    }
    mounts
}

/// Parses one `source` object.
pub fn parse_source(source: &Value) -> Result<MountMetric, SourceSkip> {
    let obj = source.as_object().ok_or(SourceSkip::NotAnObject)?;

    let mountpoint = obj
        .get("listenurl")
        .and_then(Value::as_str)
        .and_then(listenurl_path)
        .or_else(|| non_empty_str(obj.get("mount")))
        .ok_or(SourceSkip::NoMountpoint)?;

    Ok(MountMetric {
        mountpoint,
        listeners: lenient_u64(obj.get("listeners")).unwrap_or(0),
        listener_peak: lenient_u64(obj.get("listener_peak")),
        title: non_empty_str(obj.get("title"))
            .or_else(|| non_empty_str(obj.get("yp_currently_playing"))),
        description: non_empty_str(obj.get("server_description")),
        bitrate: lenient_u64(obj.get("bitrate")),
        genre: non_empty_str(obj.get("genre")),
        stream_start: non_empty_str(obj.get("stream_start_iso8601")),
        connected: lenient_u64(obj.get("connected")),
    })
}

/// Path component of a listen URL; relative URLs resolve against a dummy host.
fn listenurl_path(raw: &str) -> Option<String> {
    let parsed = match Url::parse(raw) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse("http://localhost/").ok()?.join(raw).ok()?
        }
        Err(_) => return None,
    };
    let path = parsed.path();
    (!path.is_empty() && path != "/").then(|| path.to_string())
}

/// Integers, integral-looking strings and non-negative floats (truncated). Anything else is absent.
pub(crate) fn lenient_u64(v: Option<&Value>) -> Option<u64> {
    match v? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_u64_coerces_strings_and_rejects_garbage() {
        assert_eq!(lenient_u64(Some(&json!("7"))), Some(7));
        assert_eq!(lenient_u64(Some(&json!(" 12 "))), Some(12));
        assert_eq!(lenient_u64(Some(&json!(3.9))), Some(3));
        assert_eq!(lenient_u64(Some(&json!(-1))), None);
        assert_eq!(lenient_u64(Some(&json!("n/a"))), None);
        assert_eq!(lenient_u64(Some(&json!(null))), None);
        assert_eq!(lenient_u64(None), None);
    }

    #[test]
    fn listenurl_path_handles_absolute_relative_and_bare_host() {
        assert_eq!(
            listenurl_path("http://radio.example:8000/tower1").as_deref(),
            Some("/tower1")
        );
        assert_eq!(listenurl_path("/tower2").as_deref(), Some("/tower2"));
        assert_eq!(listenurl_path("http://radio.example:8000"), None);
    }
}
