//! Date resolution rules for files and folders.

use chrono::{DateTime, Datelike, Utc};

use crate::config::PlannerConfig;
use crate::planner::analyzer::FolderDateAnalysis;

/// A file's own resolved date, before folder consensus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDateResult {
    pub date: Option<i64>,
    pub source: &'static str,
}

/// Where a folder's files should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderResolution {
    pub bucket: Option<&'static str>,
    pub resolved_date: Option<i64>,
    pub source: &'static str,
}

/// Resolve one file's date by fixed priority: folder-name date, filename
/// date, EXIF original date, filesystem mtime. The hierarchy signal is
/// recorded in the catalog but deliberately takes no part here.
pub fn resolve_file_date(
    date_path_folder: Option<i64>,
    date_path_filename: Option<i64>,
    date_exif: Option<i64>,
    fs_modified_unix: Option<f64>,
) -> FileDateResult {
    if let Some(date) = date_path_folder {
        return FileDateResult {
            date: Some(date),
            source: "path_folder",
        };
    }
    if let Some(date) = date_path_filename {
        return FileDateResult {
            date: Some(date),
            source: "path_filename",
        };
    }
    if let Some(date) = date_exif {
        return FileDateResult {
            date: Some(date),
            source: "exif",
        };
    }
    if let Some(unix) = fs_modified_unix {
        return FileDateResult {
            date: Some(unix_to_date_int(unix)),
            source: "fs_modified",
        };
    }
    FileDateResult {
        date: None,
        source: "none",
    }
}

/// Calendar date (UTC) of a unix timestamp as YYYYMMDD.
pub fn unix_to_date_int(unix: f64) -> i64 {
    let dt = DateTime::<Utc>::from_timestamp(unix as i64, 0).unwrap_or_default();
    dt.year() as i64 * 10000 + dt.month() as i64 * 100 + dt.day() as i64
}

/// A folder with a path-derived date skips statistics entirely.
pub fn resolve_folder_with_path_date(path_date: i64) -> FolderResolution {
    FolderResolution {
        bucket: None,
        resolved_date: Some(path_date),
        source: "path_folder",
    }
}

/// Consensus rules over a folder's date statistics, applied in order:
/// no images, low coverage, wide spread, high prevalence, unanimity,
/// no consensus.
pub fn resolve_folder(analysis: &FolderDateAnalysis, config: &PlannerConfig) -> FolderResolution {
    if analysis.image_files == 0 {
        return FolderResolution {
            bucket: Some("non_media"),
            resolved_date: None,
            source: "no_images",
        };
    }

    if analysis.date_coverage_pct < config.min_coverage {
        return FolderResolution {
            bucket: Some("mixed_dates"),
            resolved_date: None,
            source: "low_coverage",
        };
    }

    if analysis.date_span_months >= config.max_date_span_months {
        return FolderResolution {
            bucket: Some("mixed_dates"),
            resolved_date: None,
            source: "wide_spread",
        };
    }

    if analysis.prevalent_date_pct >= config.min_prevalence {
        return FolderResolution {
            bucket: None,
            resolved_date: analysis.prevalent_date,
            source: "metadata_prevalent",
        };
    }

    if analysis.unique_date_count == 1 && analysis.prevalent_date.is_some() {
        return FolderResolution {
            bucket: None,
            resolved_date: analysis.prevalent_date,
            source: "metadata_unanimous",
        };
    }

    FolderResolution {
        bucket: Some("mixed_dates"),
        resolved_date: None,
        source: "no_consensus",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::analyzer::{analyze_folder, FileDateSample};

    fn dated_images(dates: &[i64]) -> Vec<FileDateSample> {
        dates
            .iter()
            .map(|&d| FileDateSample {
                date: Some(d),
                is_image: true,
            })
            .collect()
    }

    fn undated_images(count: usize) -> Vec<FileDateSample> {
        (0..count)
            .map(|_| FileDateSample {
                date: None,
                is_image: true,
            })
            .collect()
    }

    #[test]
    fn file_date_priority_order() {
        let r = resolve_file_date(Some(20230514), Some(20230601), Some(20230701), Some(0.0));
        assert_eq!(r.date, Some(20230514));
        assert_eq!(r.source, "path_folder");

        let r = resolve_file_date(None, Some(20230601), Some(20230701), Some(0.0));
        assert_eq!(r.date, Some(20230601));
        assert_eq!(r.source, "path_filename");

        let r = resolve_file_date(None, None, Some(20230701), Some(0.0));
        assert_eq!(r.date, Some(20230701));
        assert_eq!(r.source, "exif");

        let r = resolve_file_date(None, None, None, Some(1684074652.0));
        assert_eq!(r.date, Some(20230514));
        assert_eq!(r.source, "fs_modified");

        let r = resolve_file_date(None, None, None, None);
        assert_eq!(r.date, None);
        assert_eq!(r.source, "none");
    }

    #[test]
    fn folder_without_images_buckets_non_media() {
        let samples = [FileDateSample {
            date: None,
            is_image: false,
        }];
        let r = resolve_folder(&analyze_folder(&samples), &PlannerConfig::default());
        assert_eq!(r.bucket, Some("non_media"));
        assert_eq!(r.source, "no_images");
        assert_eq!(r.resolved_date, None);
    }

    #[test]
    fn low_coverage_buckets_mixed_dates() {
        // 10 of 100 images dated, all agreeing: coverage wins over agreement.
        let mut samples = dated_images(&[20230514; 10]);
        samples.extend(undated_images(90));
        let r = resolve_folder(&analyze_folder(&samples), &PlannerConfig::default());
        assert_eq!(r.bucket, Some("mixed_dates"));
        assert_eq!(r.source, "low_coverage");
    }

    #[test]
    fn wide_spread_buckets_mixed_dates() {
        let samples = dated_images(&[20230101, 20230601]);
        let r = resolve_folder(&analyze_folder(&samples), &PlannerConfig::default());
        assert_eq!(r.bucket, Some("mixed_dates"));
        assert_eq!(r.source, "wide_spread");
    }

    #[test]
    fn span_threshold_is_inclusive() {
        // Exactly 3 months with default max_date_span_months = 3 buckets.
        let samples = dated_images(&[20230101, 20230401]);
        let r = resolve_folder(&analyze_folder(&samples), &PlannerConfig::default());
        assert_eq!(r.source, "wide_spread");

        // 2 months with unanimous-enough dates resolves.
        let samples = dated_images(&[20230101, 20230101, 20230101, 20230101, 20230301]);
        let r = resolve_folder(&analyze_folder(&samples), &PlannerConfig::default());
        assert_eq!(r.bucket, None);
        assert_eq!(r.source, "metadata_prevalent");
    }

    #[test]
    fn high_prevalence_resolves() {
        let mut dates = vec![20230514; 8];
        dates.extend([20230515, 20230516]);
        let r = resolve_folder(&analyze_folder(&dated_images(&dates)), &PlannerConfig::default());
        assert_eq!(r.bucket, None);
        assert_eq!(r.resolved_date, Some(20230514));
        assert_eq!(r.source, "metadata_prevalent");
    }

    #[test]
    fn unanimous_single_date_resolves() {
        let r = resolve_folder(
            &analyze_folder(&dated_images(&[20230514])),
            &PlannerConfig::default(),
        );
        assert_eq!(r.resolved_date, Some(20230514));
        // A single date is also 100% prevalent, so the prevalence rule fires
        // first.
        assert_eq!(r.source, "metadata_prevalent");
    }

    #[test]
    fn split_dates_without_consensus_bucket() {
        let samples = dated_images(&[20230514, 20230514, 20230601, 20230601, 20230615]);
        let r = resolve_folder(&analyze_folder(&samples), &PlannerConfig::default());
        assert_eq!(r.bucket, Some("mixed_dates"));
        assert_eq!(r.source, "no_consensus");
    }

    #[test]
    fn unix_conversion_is_utc() {
        assert_eq!(unix_to_date_int(1684074652.0), 20230514);
        assert_eq!(unix_to_date_int(0.0), 19700101);
    }
}
