//! Path-based date patterns.
//!
//! Three independent signals are derived from a file's relative path:
//!
//! - hierarchy: consecutive `yyyy/mm/dd` directory components
//! - folder: a bounded `YYYY[-_]?MM[-_]?DD` substring in one directory name
//! - filename: the same bounded pattern in the filename
//!
//! The bounded pattern must start and end at a string edge or a separator
//! (`-`, `_`, or a boundary `.`), which rejects `v20230514` and
//! `photo20230514.jpg` while accepting `IMG_20230514.jpg`. Every candidate is
//! then checked against the real calendar, leap years included.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// One extracted date with the literal text it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    pub date: i64,
    pub source: String,
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[-_.])((?:19|20)\d{2})[-_]?(0[1-9]|1[0-2])[-_]?(0[1-9]|[12]\d|3[01])(?:[-_.]|$)")
            .expect("date pattern is valid")
    })
}

pub fn is_valid_date(year: i64, month: i64, day: i64) -> bool {
    if !(1900..=2099).contains(&year) {
        return false;
    }
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32).is_some()
}

pub fn to_date_int(year: i64, month: i64, day: i64) -> i64 {
    year * 10000 + month * 100 + day
}

/// Date from consecutive `yyyy/mm/dd` directory components. The deepest
/// valid triple wins; the filename is never part of a triple.
pub fn extract_hierarchy_date(directory_path: &str) -> Option<DateMatch> {
    if directory_path.is_empty() {
        return None;
    }
    let parts: Vec<&str> = directory_path.split('/').collect();
    if parts.len() < 3 {
        return None;
    }

    for start in (0..=parts.len() - 3).rev() {
        let (year_str, month_str, day_str) = (parts[start], parts[start + 1], parts[start + 2]);
        let (Some(year), Some(month), Some(day)) = (
            fixed_width_number(year_str, 4),
            fixed_width_number(month_str, 2),
            fixed_width_number(day_str, 2),
        ) else {
            continue;
        };
        if is_valid_date(year, month, day) {
            return Some(DateMatch {
                date: to_date_int(year, month, day),
                source: format!("{year_str}/{month_str}/{day_str}"),
            });
        }
    }
    None
}

/// Date from a single directory name anywhere along the path; the deepest
/// name with a valid bounded date wins. The source is the full matching name.
pub fn extract_folder_date(directory_path: &str) -> Option<DateMatch> {
    if directory_path.is_empty() {
        return None;
    }
    for folder in directory_path.split('/').rev() {
        if let Some(date) = bounded_date(folder) {
            return Some(DateMatch {
                date,
                source: folder.to_string(),
            });
        }
    }
    None
}

/// Date from the filename (extension included); the leftmost valid candidate
/// wins. The source is the full filename.
pub fn extract_filename_date(filename: &str) -> Option<DateMatch> {
    bounded_date(filename).map(|date| DateMatch {
        date,
        source: filename.to_string(),
    })
}

/// First calendar-valid bounded date in `text`, scanning left to right.
fn bounded_date(text: &str) -> Option<i64> {
    for captures in date_pattern().captures_iter(text) {
        let year: i64 = captures[1].parse().ok()?;
        let month: i64 = captures[2].parse().ok()?;
        let day: i64 = captures[3].parse().ok()?;
        if is_valid_date(year, month, day) {
            return Some(to_date_int(year, month, day));
        }
    }
    None
}

fn fixed_width_number(text: &str, width: usize) -> Option<i64> {
    if text.len() != width || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
