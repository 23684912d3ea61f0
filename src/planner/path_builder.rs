//! Target path construction: canonical folders, buckets, annotations, and
//! collision renaming.

use sha2::{Digest, Sha256};
use std::collections::HashSet;

const SEPARATORS: &[char] = &['-', '_', ' '];

/// Result of checking a filename against its target folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateResult {
    pub filename: String,
    pub is_duplicate: bool,
    pub source_hash: Option<String>,
}

/// Canonical target folder `yyyy/yyyy_mm/yyyymmdd[-annotation]`.
pub fn build_target_folder(resolved_date: i64, annotation: Option<&str>) -> String {
    let year = resolved_date / 10000;
    let month = (resolved_date / 100) % 100;

    match annotation {
        Some(a) if !a.is_empty() => format!("{year}/{year}_{month:02}/{resolved_date}-{a}"),
        _ => format!("{year}/{year}_{month:02}/{resolved_date}"),
    }
}

/// Bucket target preserving the original structure:
/// `_mixed_dates/<source folder>` or `_non_media/<source folder>`.
pub fn build_bucket_path(bucket: &str, source_folder: &str) -> String {
    if source_folder.is_empty() {
        format!("_{bucket}")
    } else {
        format!("_{bucket}/{source_folder}")
    }
}

/// Extract the annotation from a folder name given the resolved date.
///
/// A date token equal to the resolved date (`YYYYMMDD`, `YYYY_MM_DD`, or
/// `YYYY-MM-DD`) is stripped wherever it sits, along with adjacent
/// separators; the remainder, capped at `max_length` characters, is the
/// annotation. A name that is nothing but the date has none.
pub fn extract_annotation(
    folder_name: &str,
    resolved_date: i64,
    max_length: usize,
) -> Option<String> {
    let year = resolved_date / 10000;
    let month = (resolved_date / 100) % 100;
    let day = resolved_date % 100;

    let tokens = [
        format!("{year}_{month:02}_{day:02}"),
        format!("{year}-{month:02}-{day:02}"),
        format!("{resolved_date}"),
    ];

    let mut remainder = folder_name.to_string();
    if let Some((idx, token_len)) = tokens
        .iter()
        .find_map(|t| folder_name.find(t.as_str()).map(|idx| (idx, t.len())))
    {
        let prefix = folder_name[..idx].trim_end_matches(SEPARATORS);
        let suffix = folder_name[idx + token_len..].trim_start_matches(SEPARATORS);
        remainder = match (prefix.is_empty(), suffix.is_empty()) {
            (true, true) => return None,
            (false, true) => prefix.to_string(),
            (true, false) => suffix.to_string(),
            (false, false) => format!("{prefix}_{suffix}"),
        };
    }

    let trimmed = remainder.trim_matches(SEPARATORS);
    if trimmed.is_empty() || tokens.iter().any(|t| t == trimmed) {
        return None;
    }

    // Cap by characters, never splitting a multi-byte sequence.
    Some(trimmed.chars().take(max_length).collect())
}

/// Resolve a filename against the names already claimed in its target
/// folder. A collision renames the newcomer to
/// `pot_dupe_<hash6>_<original>`, where the hash covers the newcomer's
/// source folder path; content comparison is a later stage's job.
pub fn resolve_filename_duplicate(
    filename: &str,
    source_folder: &str,
    existing: &HashSet<String>,
) -> DuplicateResult {
    if !existing.contains(filename) {
        return DuplicateResult {
            filename: filename.to_string(),
            is_duplicate: false,
            source_hash: None,
        };
    }

    let hash = short_hash(source_folder, 6);
    DuplicateResult {
        filename: format!("pot_dupe_{hash}_{filename}"),
        is_duplicate: true,
        source_hash: Some(hash),
    }
}

/// First `length` hex characters of SHA-256 over `text`.
pub fn short_hash(text: &str, length: usize) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hex = format!("{digest:x}");
    hex[..length.min(hex.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_folder_shapes() {
        assert_eq!(build_target_folder(20230514, None), "2023/2023_05/20230514");
        assert_eq!(
            build_target_folder(20230514, Some("a7iv")),
            "2023/2023_05/20230514-a7iv"
        );
        assert_eq!(build_target_folder(20231201, None), "2023/2023_12/20231201");
    }

    #[test]
    fn bucket_paths_preserve_structure() {
        assert_eq!(
            build_bucket_path("mixed_dates", "photos/vacation"),
            "_mixed_dates/photos/vacation"
        );
        assert_eq!(build_bucket_path("non_media", ""), "_non_media");
    }

    #[test]
    fn annotation_from_leading_date() {
        assert_eq!(
            extract_annotation("2023_05_14_a7iv", 20230514, 10),
            Some("a7iv".to_string())
        );
        assert_eq!(
            extract_annotation("20230514-sunset", 20230514, 10),
            Some("sunset".to_string())
        );
    }

    #[test]
    fn annotation_from_trailing_and_embedded_dates() {
        assert_eq!(
            extract_annotation("sunset-20230514", 20230514, 10),
            Some("sunset".to_string())
        );
        assert_eq!(
            extract_annotation("trip_20230514_italy", 20230514, 10),
            Some("trip_italy".to_string())
        );
    }

    #[test]
    fn date_only_name_has_no_annotation() {
        assert_eq!(extract_annotation("20230514", 20230514, 10), None);
        assert_eq!(extract_annotation("2023-05-14", 20230514, 10), None);
        assert_eq!(extract_annotation("2023_05_14", 20230514, 10), None);
    }

    #[test]
    fn name_without_the_date_is_used_whole() {
        assert_eq!(
            extract_annotation("wedding", 20230514, 10),
            Some("wedding".to_string())
        );
    }

    #[test]
    fn annotation_is_capped_at_character_boundaries() {
        assert_eq!(
            extract_annotation("20230514-very_long_annotation", 20230514, 10),
            Some("very_long_".to_string())
        );
        // Multi-byte characters are counted, not split.
        assert_eq!(
            extract_annotation("20230514-żółć_photos", 20230514, 4),
            Some("żółć".to_string())
        );
    }

    #[test]
    fn duplicate_rename_uses_source_folder_hash() {
        let mut existing = HashSet::new();
        existing.insert("IMG.jpg".to_string());

        let kept = resolve_filename_duplicate("IMG.jpg", "a", &HashSet::new());
        assert!(!kept.is_duplicate);
        assert_eq!(kept.filename, "IMG.jpg");

        let renamed = resolve_filename_duplicate("IMG.jpg", "b", &existing);
        assert!(renamed.is_duplicate);
        let expected_hash = short_hash("b", 6);
        assert_eq!(renamed.filename, format!("pot_dupe_{expected_hash}_IMG.jpg"));
        assert_eq!(renamed.source_hash.as_deref(), Some(expected_hash.as_str()));
    }

    #[test]
    fn short_hash_is_deterministic_hex() {
        let h = short_hash("b", 6);
        assert_eq!(h.len(), 6);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, short_hash("b", 6));
        assert_ne!(h, short_hash("a", 6));
    }
}
