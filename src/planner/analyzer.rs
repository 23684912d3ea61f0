//! Folder date statistics.
//!
//! Consensus rules operate on images only; a folder full of sidecars and
//! text files says nothing about when its photos were taken. Classification
//! here is structural (by extension), broader than the set the metadata
//! extractor can read.

/// Statistical analysis of the dates within one folder.
#[derive(Debug, Clone, Default)]
pub struct FolderDateAnalysis {
    pub total_files: u64,
    pub image_files: u64,
    pub images_with_date: u64,

    /// images_with_date / image_files, 0.0 when the folder has no images.
    pub date_coverage_pct: f64,

    pub prevalent_date: Option<i64>,
    pub prevalent_date_count: u64,
    /// prevalent_date_count / images_with_date, 0.0 when nothing is dated.
    pub prevalent_date_pct: f64,

    pub min_date: Option<i64>,
    pub max_date: Option<i64>,
    /// Calendar months between min and max; zero within one month.
    pub date_span_months: i64,

    pub unique_date_count: u64,
}

/// Per-file input to the analysis.
#[derive(Debug, Clone, Copy)]
pub struct FileDateSample {
    pub date: Option<i64>,
    pub is_image: bool,
}

pub fn is_image_extension(extension: Option<&str>, image_extensions: &[String]) -> bool {
    match extension {
        Some(ext) => image_extensions.iter().any(|e| e == ext),
        None => false,
    }
}

pub fn analyze_folder(samples: &[FileDateSample]) -> FolderDateAnalysis {
    let total_files = samples.len() as u64;
    let image_files = samples.iter().filter(|s| s.is_image).count() as u64;

    let image_dates: Vec<i64> = samples
        .iter()
        .filter(|s| s.is_image)
        .filter_map(|s| s.date)
        .collect();
    let images_with_date = image_dates.len() as u64;

    let date_coverage_pct = if image_files > 0 {
        images_with_date as f64 / image_files as f64
    } else {
        0.0
    };

    if image_dates.is_empty() {
        return FolderDateAnalysis {
            total_files,
            image_files,
            date_coverage_pct,
            ..FolderDateAnalysis::default()
        };
    }

    let mut date_counts: std::collections::BTreeMap<i64, u64> = std::collections::BTreeMap::new();
    for date in &image_dates {
        *date_counts.entry(*date).or_insert(0) += 1;
    }

    // BTreeMap iteration makes the tie-break deterministic (earliest date).
    let (&prevalent_date, &prevalent_date_count) = date_counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .expect("image_dates is non-empty");

    let min_date = *date_counts.keys().next().expect("non-empty");
    let max_date = *date_counts.keys().next_back().expect("non-empty");

    FolderDateAnalysis {
        total_files,
        image_files,
        images_with_date,
        date_coverage_pct,
        prevalent_date: Some(prevalent_date),
        prevalent_date_count,
        prevalent_date_pct: prevalent_date_count as f64 / images_with_date as f64,
        min_date: Some(min_date),
        max_date: Some(max_date),
        date_span_months: month_span(min_date, max_date),
        unique_date_count: date_counts.len() as u64,
    }
}

/// `(max.year − min.year) × 12 + (max.month − min.month)`.
pub fn month_span(min_date: i64, max_date: i64) -> i64 {
    let min_year = min_date / 10000;
    let min_month = (min_date / 100) % 100;
    let max_year = max_date / 10000;
    let max_month = (max_date / 100) % 100;
    (max_year - min_year) * 12 + (max_month - min_month)
}
