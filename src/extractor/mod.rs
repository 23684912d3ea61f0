//! Stage 3: metadata extraction through exiftool.
//!
//! Selected files are handed to the external tool in batches; every selected
//! file ends up with exactly one `file_metadata` row recording success, a
//! skip reason (undersized file), or an extraction error. Nothing here ever
//! fails the stage because of one bad file.

pub mod exiftool;
pub mod parser;
pub mod strategies;

use anyhow::{Context, Result};
use rusqlite::params;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::ExtractorConfig;
use crate::db::{now_pair, Database};
use exiftool::{ExiftoolResult, ExiftoolRunner};
use strategies::Strategy;

/// Statistics from one extraction run.
#[derive(Debug, Default, Clone)]
pub struct ExtractorStats {
    pub total_files: u64,
    pub files_extracted: u64,
    pub files_with_date_original: u64,
    pub files_with_gps: u64,
    pub files_failed: u64,
    pub files_skipped: u64,
}

/// Aggregate counts over all `file_metadata` rows, for `--stats`.
#[derive(Debug, Default, Clone)]
pub struct StoredExtractionStats {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    pub skipped: u64,
    pub with_date: u64,
    pub with_gps: u64,
}

struct FileTarget {
    id: i64,
    absolute_path: String,
    size: u64,
}

/// One pending `file_metadata` row. Exactly one of `extraction_error` and
/// `skip_reason` may be set; both absent means success.
#[derive(Default)]
struct MetadataRow {
    file_id: i64,
    date_original_unix: Option<f64>,
    date_original: Option<i64>,
    date_digitized_unix: Option<f64>,
    date_digitized: Option<i64>,
    date_modify_unix: Option<f64>,
    date_modify: Option<i64>,
    make: Option<String>,
    model: Option<String>,
    lens_model: Option<String>,
    image_width: Option<i64>,
    image_height: Option<i64>,
    orientation: Option<i64>,
    duration_seconds: Option<f64>,
    video_frame_rate: Option<f64>,
    gps_latitude: Option<f64>,
    gps_longitude: Option<f64>,
    gps_altitude: Option<f64>,
    mime_type: Option<String>,
    metadata_families: Option<String>,
    metadata_json: Option<String>,
    extraction_error: Option<String>,
    skip_reason: Option<String>,
}

pub struct MetadataExtractor<'a> {
    db: &'a Database,
    config: ExtractorConfig,
    runner: ExiftoolRunner,
    cancel: Arc<AtomicBool>,
}

impl<'a> MetadataExtractor<'a> {
    /// Probes exiftool up front; a missing tool is fatal before any work.
    pub fn new(db: &'a Database, config: ExtractorConfig, cancel: Arc<AtomicBool>) -> Result<Self> {
        let runner = ExiftoolRunner::new(Duration::from_secs(config.batch_timeout_seconds))?;
        Ok(Self {
            db,
            config,
            runner,
            cancel,
        })
    }

    pub fn tool_version(&self) -> &str {
        &self.runner.version
    }

    /// Extract metadata for every file the strategy selects, in batches.
    /// Interruption between batches leaves only whole batches committed.
    pub fn extract_all(&self, strategy: Strategy, limit: Option<usize>) -> Result<ExtractorStats> {
        let mut stats = ExtractorStats::default();
        let file_ids = strategy.file_ids(&self.db.conn, limit)?;

        info!(
            strategy = strategy.name(),
            files = file_ids.len(),
            "starting metadata extraction"
        );

        for batch_ids in file_ids.chunks(self.config.batch_size.max(1)) {
            if self.cancel.load(Ordering::SeqCst) {
                info!("metadata extraction interrupted between batches");
                break;
            }
            self.process_batch(batch_ids, &mut stats)?;
            info!(
                processed = stats.total_files,
                extracted = stats.files_extracted,
                failed = stats.files_failed,
                "metadata extraction progress"
            );
        }

        Ok(stats)
    }

    fn process_batch(&self, file_ids: &[i64], stats: &mut ExtractorStats) -> Result<()> {
        let targets = self.fetch_targets(file_ids)?;
        if targets.is_empty() {
            return Ok(());
        }

        // Size gate first; undersized files never reach the tool.
        let mut rows = Vec::with_capacity(targets.len());
        let mut to_extract = Vec::new();
        for target in targets {
            stats.total_files += 1;
            if target.size < self.config.min_file_size_bytes {
                stats.files_skipped += 1;
                rows.push(MetadataRow {
                    file_id: target.id,
                    skip_reason: Some(format!("file_too_small:{}_bytes", target.size)),
                    ..MetadataRow::default()
                });
            } else {
                to_extract.push(target);
            }
        }

        if !to_extract.is_empty() {
            let paths: Vec<String> = to_extract.iter().map(|t| t.absolute_path.clone()).collect();
            let results = self.runner.extract_batch(&paths);
            let mut by_path: std::collections::HashMap<&str, &ExiftoolResult> = results
                .iter()
                .map(|r| (r.source_file.as_str(), r))
                .collect();

            for target in &to_extract {
                let row = match by_path.remove(target.absolute_path.as_str()) {
                    Some(result) => self.build_row(target.id, result),
                    None => MetadataRow {
                        file_id: target.id,
                        extraction_error: Some("No exiftool result".to_string()),
                        ..MetadataRow::default()
                    },
                };
                if row.extraction_error.is_some() {
                    stats.files_failed += 1;
                } else {
                    stats.files_extracted += 1;
                    if row.date_original.is_some() {
                        stats.files_with_date_original += 1;
                    }
                    if row.gps_latitude.is_some() {
                        stats.files_with_gps += 1;
                    }
                }
                rows.push(row);
            }
        }

        self.insert_rows(&rows)
    }

    /// Absolute paths come from joining the session root back onto the
    /// relative inventory paths.
    fn fetch_targets(&self, file_ids: &[i64]) -> Result<Vec<FileTarget>> {
        let placeholders = vec!["?"; file_ids.len()].join(",");
        let sql = format!(
            "SELECT f.id, f.source_path, f.size, s.source_root
             FROM files f
             JOIN scan_sessions s ON f.scan_session_id = s.id
             WHERE f.id IN ({placeholders})
             ORDER BY f.id"
        );
        let mut stmt = self.db.conn.prepare(&sql)?;
        let targets = stmt
            .query_map(rusqlite::params_from_iter(file_ids), |row| {
                let relative: String = row.get(1)?;
                let root: String = row.get(3)?;
                Ok(FileTarget {
                    id: row.get(0)?,
                    absolute_path: format!("{root}/{relative}"),
                    size: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    fn build_row(&self, file_id: i64, result: &ExiftoolResult) -> MetadataRow {
        if let Some(error) = &result.error {
            return MetadataRow {
                file_id,
                extraction_error: Some(error.clone()),
                ..MetadataRow::default()
            };
        }

        let meta = &result.metadata;
        let date_original = parser::parse_exif_date(
            parser::first_string(
                meta,
                &[
                    "EXIF:DateTimeOriginal",
                    "QuickTime:CreateDate",
                    "XMP:DateTimeOriginal",
                ],
            )
            .as_deref(),
        );
        let date_digitized = parser::parse_exif_date(
            parser::first_string(
                meta,
                &[
                    "EXIF:DateTimeDigitized",
                    "QuickTime:MediaCreateDate",
                    "XMP:CreateDate",
                ],
            )
            .as_deref(),
        );
        let date_modify = parser::parse_exif_date(
            parser::first_string(
                meta,
                &["EXIF:ModifyDate", "QuickTime:ModifyDate", "XMP:ModifyDate"],
            )
            .as_deref(),
        );

        MetadataRow {
            file_id,
            date_original_unix: date_original.0,
            date_original: date_original.1,
            date_digitized_unix: date_digitized.0,
            date_digitized: date_digitized.1,
            date_modify_unix: date_modify.0,
            date_modify: date_modify.1,
            make: parser::first_string(meta, &["EXIF:Make", "QuickTime:Make", "XMP:Make"]),
            model: parser::first_string(meta, &["EXIF:Model", "QuickTime:Model", "XMP:Model"]),
            lens_model: parser::first_string(meta, &["EXIF:LensModel", "EXIF:Lens", "XMP:Lens"]),
            image_width: parser::first_i64(
                meta,
                &["EXIF:ImageWidth", "EXIF:ExifImageWidth", "QuickTime:ImageWidth"],
            ),
            image_height: parser::first_i64(
                meta,
                &[
                    "EXIF:ImageHeight",
                    "EXIF:ExifImageHeight",
                    "QuickTime:ImageHeight",
                ],
            ),
            orientation: parser::first_i64(meta, &["EXIF:Orientation"]),
            duration_seconds: parser::first_f64(meta, &["QuickTime:Duration", "Matroska:Duration"]),
            video_frame_rate: parser::first_f64(
                meta,
                &["QuickTime:VideoFrameRate", "Matroska:FrameRate"],
            ),
            gps_latitude: parser::first_f64(meta, &["EXIF:GPSLatitude", "Composite:GPSLatitude"]),
            gps_longitude: parser::first_f64(
                meta,
                &["EXIF:GPSLongitude", "Composite:GPSLongitude"],
            ),
            gps_altitude: parser::first_f64(meta, &["EXIF:GPSAltitude"]),
            mime_type: parser::first_string(meta, &["File:MIMEType"]),
            metadata_families: Some(parser::metadata_families(meta)),
            metadata_json: Some(parser::filtered_metadata_json(meta)),
            extraction_error: None,
            skip_reason: None,
        }
    }

    /// One transaction per batch: a processed file has a row, or the whole
    /// batch has none.
    fn insert_rows(&self, rows: &[MetadataRow]) -> Result<()> {
        let tx = self
            .db
            .conn
            .unchecked_transaction()
            .context("Failed to begin metadata transaction")?;
        let (now_unix, now_int) = now_pair();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO file_metadata (
                     file_id, date_original_unix, date_original,
                     date_digitized_unix, date_digitized, date_modify_unix, date_modify,
                     make, model, lens_model,
                     image_width, image_height, orientation,
                     duration_seconds, video_frame_rate,
                     gps_latitude, gps_longitude, gps_altitude,
                     mime_type, metadata_families, metadata_json,
                     extracted_at_unix, extracted_at, extractor_version,
                     extraction_error, skip_reason
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.file_id,
                    row.date_original_unix,
                    row.date_original,
                    row.date_digitized_unix,
                    row.date_digitized,
                    row.date_modify_unix,
                    row.date_modify,
                    row.make,
                    row.model,
                    row.lens_model,
                    row.image_width,
                    row.image_height,
                    row.orientation,
                    row.duration_seconds,
                    row.video_frame_rate,
                    row.gps_latitude,
                    row.gps_longitude,
                    row.gps_altitude,
                    row.mime_type,
                    row.metadata_families,
                    row.metadata_json,
                    now_unix,
                    now_int,
                    self.runner.version,
                    row.extraction_error,
                    row.skip_reason,
                ])?;
            }
        }
        tx.commit().context("Failed to commit metadata batch")
    }
}

/// Read-only extraction statistics for the `--stats` flag; needs no tool.
pub fn stored_stats(db: &Database) -> Result<StoredExtractionStats> {
    db.conn
        .query_row(
            "SELECT
                 COUNT(*),
                 SUM(CASE WHEN extraction_error IS NULL AND skip_reason IS NULL
                     THEN 1 ELSE 0 END),
                 SUM(CASE WHEN extraction_error IS NOT NULL THEN 1 ELSE 0 END),
                 SUM(CASE WHEN skip_reason IS NOT NULL THEN 1 ELSE 0 END),
                 SUM(CASE WHEN date_original IS NOT NULL THEN 1 ELSE 0 END),
                 SUM(CASE WHEN gps_latitude IS NOT NULL THEN 1 ELSE 0 END)
             FROM file_metadata",
            [],
            |row| {
                Ok(StoredExtractionStats {
                    total: row.get::<_, i64>(0)? as u64,
                    success: row.get::<_, Option<i64>>(1)?.unwrap_or(0) as u64,
                    errors: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u64,
                    skipped: row.get::<_, Option<i64>>(3)?.unwrap_or(0) as u64,
                    with_date: row.get::<_, Option<i64>>(4)?.unwrap_or(0) as u64,
                    with_gps: row.get::<_, Option<i64>>(5)?.unwrap_or(0) as u64,
                })
            },
        )
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skip_and_error_rows_stay_mutually_exclusive() {
        let skip = MetadataRow {
            file_id: 1,
            skip_reason: Some("file_too_small:512_bytes".to_string()),
            ..MetadataRow::default()
        };
        assert!(skip.extraction_error.is_none());

        let error = MetadataRow {
            file_id: 2,
            extraction_error: Some("boom".to_string()),
            ..MetadataRow::default()
        };
        assert!(error.skip_reason.is_none());
    }

    #[test]
    fn stored_stats_counts_outcomes() {
        let db = Database::open_in_memory().unwrap();
        let session = db.create_session("/test", "uuid").unwrap();
        for (i, (error, skip, date)) in [
            (None::<&str>, None::<&str>, Some(20230514i64)),
            (Some("bad file"), None, None),
            (None, Some("file_too_small:100_bytes"), None),
        ]
        .iter()
        .enumerate()
        {
            db.conn
                .execute(
                    "INSERT INTO files (scan_session_id, source_path, directory_path,
                     filename_full, filename_base, size, scanned_at_unix, scanned_at)
                     VALUES (?, ?, '', 'f', 'f', 1, 1.0, 1)",
                    params![session, format!("f{i}.jpg")],
                )
                .unwrap();
            let file_id = db.conn.last_insert_rowid();
            db.conn
                .execute(
                    "INSERT INTO file_metadata (file_id, date_original, extraction_error,
                     skip_reason, extracted_at_unix, extracted_at)
                     VALUES (?, ?, ?, ?, 1.0, 1)",
                    params![file_id, date, error, skip],
                )
                .unwrap();
        }

        let stats = stored_stats(&db).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.with_date, 1);
    }

    #[test]
    fn successful_result_populates_priority_columns() {
        // build_row needs no database or tool; exercise it through a fake
        // runner result.
        let mut metadata = serde_json::Map::new();
        metadata.insert("SourceFile".into(), json!("/x/a.jpg"));
        metadata.insert("EXIF:DateTimeOriginal".into(), json!("2023:05:14 10:00:00"));
        metadata.insert("EXIF:Make".into(), json!("Sony"));
        metadata.insert("EXIF:Model".into(), json!("ILCE-7M4"));
        metadata.insert("EXIF:ImageWidth".into(), json!(7008));
        metadata.insert("Composite:GPSLatitude".into(), json!(-33.856785));
        metadata.insert("File:MIMEType".into(), json!("image/jpeg"));

        let result = ExiftoolResult {
            source_file: "/x/a.jpg".to_string(),
            metadata,
            error: None,
        };

        let db = Database::open_in_memory().unwrap();
        let extractor = MetadataExtractor {
            db: &db,
            config: ExtractorConfig::default(),
            runner: ExiftoolRunner::fake("12.76"),
            cancel: Arc::new(AtomicBool::new(false)),
        };

        let row = extractor.build_row(7, &result);
        assert_eq!(row.file_id, 7);
        assert_eq!(row.date_original, Some(20230514));
        assert_eq!(row.make.as_deref(), Some("Sony"));
        assert_eq!(row.image_width, Some(7008));
        assert_eq!(row.gps_latitude, Some(-33.856785));
        assert_eq!(row.metadata_families.as_deref(), Some("Composite,EXIF,File"));
        assert!(row.extraction_error.is_none());
        assert!(row.skip_reason.is_none());
    }
}
