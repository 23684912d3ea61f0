//! Normalization of raw exiftool output.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Tags never worth storing: embedded previews and derived binary blobs.
const EXCLUDED_FIELDS: [&str; 9] = [
    "EXIF:ThumbnailImage",
    "EXIF:ThumbnailTIFF",
    "EXIF:PreviewImage",
    "EXIF:JpgFromRaw",
    "EXIF:OtherImage",
    "ICC_Profile:ProfileCMMType",
    "File:Directory",
    "File:FileName",
    "SourceFile",
];

/// Parse an EXIF-style date string into the catalog's (fractional unix,
/// YYYYMMDD) pair.
///
/// Accepts `YYYY:MM:DD HH:MM:SS`, the `-`-separated and `T` forms, optionally
/// suffixed with `Z` or `±HH:MM`. Offset-free values are taken as UTC. The
/// all-zero sentinel some cameras write parses to nothing. The YYYYMMDD side
/// keeps the date as written, before any offset conversion.
pub fn parse_exif_date(date_str: Option<&str>) -> (Option<f64>, Option<i64>) {
    let Some(raw) = date_str else {
        return (None, None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "0000:00:00 00:00:00" {
        return (None, None);
    }

    // With explicit offset
    for fmt in [
        "%Y:%m:%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%:z",
    ] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return (Some(dt.timestamp() as f64), Some(date_int_of(&dt.date_naive())));
        }
    }

    // Trailing Z or no offset: UTC
    let naive_part = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    for fmt in ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_part, fmt) {
            let dt = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
            return (Some(dt.timestamp() as f64), Some(date_int_of(&naive.date())));
        }
    }

    (None, None)
}

fn date_int_of(date: &chrono::NaiveDate) -> i64 {
    use chrono::Datelike;
    date.year() as i64 * 10000 + date.month() as i64 * 100 + date.day() as i64
}

/// First non-null string value among `keys`.
pub fn first_string(metadata: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        metadata.get(*key).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

/// First value among `keys` coercible to a float. exiftool runs with `-n`,
/// but some tags still arrive as strings.
pub fn first_f64(metadata: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        metadata.get(*key).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    })
}

/// First value among `keys` coercible to an integer.
pub fn first_i64(metadata: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| {
        metadata.get(*key).and_then(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    })
}

/// Sorted, comma-joined set of group-0 prefixes present in the output.
pub fn metadata_families(metadata: &Map<String, Value>) -> String {
    let families: BTreeSet<&str> = metadata
        .keys()
        .filter_map(|key| key.split_once(':').map(|(family, _)| family))
        .collect();
    families.into_iter().collect::<Vec<_>>().join(",")
}

/// Shallow filtered copy of the output, safe to store as JSON text: the
/// static denylist, plus any value carrying inline binary data.
pub fn filtered_metadata_json(metadata: &Map<String, Value>) -> String {
    let filtered: Map<String, Value> = metadata
        .iter()
        .filter(|(key, value)| {
            if EXCLUDED_FIELDS.contains(&key.as_str()) {
                return false;
            }
            if let Value::String(s) = value {
                if s.starts_with("base64:") || s.starts_with("(Binary data") {
                    return false;
                }
            }
            true
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    serde_json::to_string(&filtered).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn exif_date_basic() {
        let (unix, date) = parse_exif_date(Some("2023:05:14 14:30:52"));
        assert_eq!(date, Some(20230514));
        // 2023-05-14T14:30:52Z
        assert_eq!(unix, Some(1684074652.0));
    }

    #[test]
    fn exif_date_with_offset_keeps_literal_date() {
        let (unix_utc, _) = parse_exif_date(Some("2023:05:14 00:30:52Z"));
        let (unix_offset, date) = parse_exif_date(Some("2023:05:14 00:30:52+02:00"));
        assert_eq!(date, Some(20230514));
        assert_eq!(unix_offset, unix_utc.map(|u| u - 7200.0));
    }

    #[test]
    fn exif_date_iso_forms() {
        assert_eq!(parse_exif_date(Some("2023-05-14 14:30:52")).1, Some(20230514));
        assert_eq!(parse_exif_date(Some("2023-05-14T14:30:52")).1, Some(20230514));
        assert_eq!(parse_exif_date(Some("2023-05-14T14:30:52Z")).1, Some(20230514));
    }

    #[test]
    fn exif_date_rejects_sentinel_and_garbage() {
        assert_eq!(parse_exif_date(Some("0000:00:00 00:00:00")), (None, None));
        assert_eq!(parse_exif_date(Some("not a date")), (None, None));
        assert_eq!(parse_exif_date(Some("")), (None, None));
        assert_eq!(parse_exif_date(None), (None, None));
    }

    #[test]
    fn first_value_respects_priority() {
        let meta = map(&[
            ("XMP:Make", json!("Fallback")),
            ("EXIF:Make", json!("Sony")),
        ]);
        assert_eq!(
            first_string(&meta, &["EXIF:Make", "QuickTime:Make", "XMP:Make"]),
            Some("Sony".to_string())
        );
    }

    #[test]
    fn numeric_coercion_from_strings() {
        let meta = map(&[
            ("EXIF:ImageWidth", json!("4240")),
            ("QuickTime:Duration", json!(12.5)),
        ]);
        assert_eq!(first_i64(&meta, &["EXIF:ImageWidth"]), Some(4240));
        assert_eq!(first_f64(&meta, &["QuickTime:Duration"]), Some(12.5));
    }

    #[test]
    fn families_are_sorted_and_unique() {
        let meta = map(&[
            ("QuickTime:Duration", json!(1)),
            ("EXIF:Make", json!("a")),
            ("EXIF:Model", json!("b")),
            ("File:MIMEType", json!("image/jpeg")),
        ]);
        assert_eq!(metadata_families(&meta), "EXIF,File,QuickTime");
    }

    #[test]
    fn json_filter_drops_binary_and_denylisted() {
        let meta = map(&[
            ("SourceFile", json!("/a/b.jpg")),
            ("File:FileName", json!("b.jpg")),
            ("EXIF:PreviewImage", json!("(Binary data 12345 bytes)")),
            ("EXIF:Thumbnail", json!("base64:AAAA")),
            ("EXIF:Make", json!("Sony")),
        ]);
        let filtered = filtered_metadata_json(&meta);
        let parsed: Map<String, Value> = serde_json::from_str(&filtered).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["EXIF:Make"], json!("Sony"));
    }
}
