//! Defensive extraction from untyped task payloads.
//!
//! Task `params` and worker `result` documents are producer-defined JSON; the
//! core only reads a handful of fields from them. Every accessor here is
//! fallible and swallows malformed sub-fields rather than failing the whole
//! completion.

use serde_json::Value;

use crate::types::DbId;

/// Output artifact location, from the result document first, then the task
/// params as a fallback (some executors echo it there).
pub fn output_location(result: &Value, params: &Value) -> Option<String> {
    non_empty_str(result, "output_location")
        .or_else(|| non_empty_str(result, "location"))
        .or_else(|| non_empty_str(params, "output_location"))
}

/// Thumbnail URL hint from the result document.
pub fn thumbnail_url(result: &Value) -> Option<String> {
    non_empty_str(result, "thumbnail_url")
}

/// Container-link hint: "attach the generation to shot N".
///
/// Accepts a JSON number or a numeric string; anything else is treated as
/// absent. The referenced shot is validated separately by the pipeline.
pub fn shot_link(result: &Value, params: &Value) -> Option<DbId> {
    id_field(result, "shot_id").or_else(|| id_field(params, "shot_id"))
}

/// Credit cost declared on the task params. Only positive finite numbers
/// count; a missing or malformed field means no debit is recorded.
pub fn credits_cost(params: &Value) -> Option<f64> {
    let cost = params.get("credits_cost")?.as_f64()?;
    (cost.is_finite() && cost > 0.0).then_some(cost)
}

/// Rewrite transient local-network URLs to their canonical relative form.
///
/// Executors running next to the blob store report locations like
/// `http://192.168.1.40:8188/files/out/clip.mp4`; the host part is
/// meaningless outside that network, so it is stripped and the path kept
/// relative. Public URLs and already-relative paths pass through unchanged.
pub fn normalize_location(raw: &str) -> String {
    let Some(rest) = raw
        .strip_prefix("http://")
        .or_else(|| raw.strip_prefix("https://"))
    else {
        return raw.trim_start_matches('/').to_string();
    };

    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, path),
        None => (rest, ""),
    };

    let host = authority
        .split_once(':')
        .map_or(authority, |(host, _port)| host);

    if is_private_host(host) {
        path.to_string()
    } else {
        raw.to_string()
    }
}

/// Loopback and RFC 1918 hosts.
fn is_private_host(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }
    if host.starts_with("127.") || host.starts_with("10.") || host.starts_with("192.168.") {
        return true;
    }
    // 172.16.0.0/12
    if let Some(rest) = host.strip_prefix("172.") {
        if let Some((second, _)) = rest.split_once('.') {
            if let Ok(n) = second.parse::<u8>() {
                return (16..=31).contains(&n);
            }
        }
    }
    false
}

fn non_empty_str(doc: &Value, key: &str) -> Option<String> {
    let s = doc.get(key)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn id_field(doc: &Value, key: &str) -> Option<DbId> {
    match doc.get(key)? {
        Value::Number(n) => n.as_i64().filter(|id| *id > 0),
        Value::String(s) => s.trim().parse::<DbId>().ok().filter(|id| *id > 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_location_prefers_result() {
        let result = json!({"output_location": "files/out/a.mp4"});
        let params = json!({"output_location": "files/out/b.mp4"});
        assert_eq!(
            output_location(&result, &params).as_deref(),
            Some("files/out/a.mp4")
        );
    }

    #[test]
    fn output_location_falls_back_to_params() {
        let result = json!({"seed": 42});
        let params = json!({"output_location": "files/out/b.mp4"});
        assert_eq!(
            output_location(&result, &params).as_deref(),
            Some("files/out/b.mp4")
        );
    }

    #[test]
    fn output_location_ignores_blank_and_non_string() {
        assert_eq!(output_location(&json!({"output_location": "  "}), &json!({})), None);
        assert_eq!(output_location(&json!({"output_location": 7}), &json!({})), None);
        assert_eq!(output_location(&Value::Null, &Value::Null), None);
    }

    #[test]
    fn shot_link_accepts_number_and_numeric_string() {
        assert_eq!(shot_link(&json!({"shot_id": 12}), &json!({})), Some(12));
        assert_eq!(shot_link(&json!({}), &json!({"shot_id": "34"})), Some(34));
    }

    #[test]
    fn shot_link_drops_malformed_values() {
        assert_eq!(shot_link(&json!({"shot_id": "abc"}), &json!({})), None);
        assert_eq!(shot_link(&json!({"shot_id": -3}), &json!({})), None);
        assert_eq!(shot_link(&json!({"shot_id": {"id": 5}}), &json!({})), None);
        assert_eq!(shot_link(&json!({}), &json!({})), None);
    }

    #[test]
    fn credits_cost_requires_positive_finite_number() {
        assert_eq!(credits_cost(&json!({"credits_cost": 1.5})), Some(1.5));
        assert_eq!(credits_cost(&json!({"credits_cost": 0})), None);
        assert_eq!(credits_cost(&json!({"credits_cost": -2})), None);
        assert_eq!(credits_cost(&json!({"credits_cost": "2"})), None);
        assert_eq!(credits_cost(&json!({})), None);
    }

    #[test]
    fn normalize_strips_private_hosts() {
        assert_eq!(
            normalize_location("http://192.168.1.40:8188/files/out/clip.mp4"),
            "files/out/clip.mp4"
        );
        assert_eq!(
            normalize_location("http://localhost/files/a.png"),
            "files/a.png"
        );
        assert_eq!(
            normalize_location("http://10.0.0.5/files/a.png"),
            "files/a.png"
        );
        assert_eq!(
            normalize_location("http://172.20.1.2/files/a.png"),
            "files/a.png"
        );
    }

    #[test]
    fn normalize_keeps_public_urls() {
        let url = "https://cdn.example.com/files/a.png";
        assert_eq!(normalize_location(url), url);
        // 172.x outside the /12 private block is public.
        let url = "http://172.32.0.1/files/a.png";
        assert_eq!(normalize_location(url), url);
    }

    #[test]
    fn normalize_passes_relative_paths_through() {
        assert_eq!(normalize_location("files/out/a.mp4"), "files/out/a.mp4");
        assert_eq!(normalize_location("/files/out/a.mp4"), "files/out/a.mp4");
    }
}
