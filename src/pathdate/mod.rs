//! Stage 2: path-based date signals.
//!
//! For every file the three strategies in [`patterns`] run independently and
//! their results land in the `date_path_*` columns, each with the literal
//! matched text. Conflicts between signals are left for the planner; this
//! stage only records what the path says.

pub mod patterns;

use anyhow::Result;
use rusqlite::params;
use tracing::info;

use crate::db::{now_pair, Database};
use patterns::{extract_filename_date, extract_folder_date, extract_hierarchy_date, DateMatch};

/// Statistics from a path-date extraction run.
#[derive(Debug, Default, Clone)]
pub struct PathDateStats {
    pub total_files: u64,
    pub files_with_hierarchy: u64,
    pub files_with_folder: u64,
    pub files_with_filename: u64,
    pub files_with_any: u64,
}

pub struct PathDateExtractor<'a> {
    db: &'a Database,
    batch_size: usize,
}

struct FileUpdate {
    id: i64,
    hierarchy: Option<DateMatch>,
    folder: Option<DateMatch>,
    filename: Option<DateMatch>,
}

impl<'a> PathDateExtractor<'a> {
    pub fn new(db: &'a Database, batch_size: usize) -> Self {
        Self {
            db,
            batch_size: batch_size.max(1),
        }
    }

    /// Derive date signals for all files that have none recorded yet, or for
    /// everything when `reprocess` is set. Rerunning writes identical values
    /// for identical paths.
    pub fn extract_all(&self, reprocess: bool) -> Result<PathDateStats> {
        let mut stats = PathDateStats::default();
        let mut offset = 0usize;

        loop {
            let files = self.fetch_batch(reprocess, offset)?;
            if files.is_empty() {
                break;
            }

            let updates: Vec<FileUpdate> = files
                .into_iter()
                .map(|(id, directory_path, filename)| {
                    let update = FileUpdate {
                        id,
                        hierarchy: extract_hierarchy_date(&directory_path),
                        folder: extract_folder_date(&directory_path),
                        filename: extract_filename_date(&filename),
                    };
                    stats.total_files += 1;
                    if update.hierarchy.is_some() {
                        stats.files_with_hierarchy += 1;
                    }
                    if update.folder.is_some() {
                        stats.files_with_folder += 1;
                    }
                    if update.filename.is_some() {
                        stats.files_with_filename += 1;
                    }
                    if update.hierarchy.is_some()
                        || update.folder.is_some()
                        || update.filename.is_some()
                    {
                        stats.files_with_any += 1;
                    }
                    update
                })
                .collect();

            self.apply_batch(&updates)?;

            if reprocess {
                offset += self.batch_size;
            }

            info!(
                processed = stats.total_files,
                with_any_signal = stats.files_with_any,
                "path date extraction progress"
            );
        }

        Ok(stats)
    }

    fn fetch_batch(&self, reprocess: bool, offset: usize) -> Result<Vec<(i64, String, String)>> {
        // In incremental mode processed rows drop out of the filter, so the
        // next batch always starts at the front; reprocess mode pages by
        // offset instead.
        let (sql, params): (&str, Vec<i64>) = if reprocess {
            (
                "SELECT id, directory_path, filename_full FROM files
                 ORDER BY id LIMIT ? OFFSET ?",
                vec![self.batch_size as i64, offset as i64],
            )
        } else {
            (
                "SELECT id, directory_path, filename_full FROM files
                 WHERE path_dates_extracted_at_unix IS NULL
                 ORDER BY id LIMIT ?",
                vec![self.batch_size as i64],
            )
        };

        let mut stmt = self.db.conn.prepare(sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn apply_batch(&self, updates: &[FileUpdate]) -> Result<()> {
        let tx = self.db.conn.unchecked_transaction()?;
        let (now_unix, now_int) = now_pair();
        {
            let mut stmt = tx.prepare(
                "UPDATE files SET
                     date_path_hierarchy = ?, date_path_hierarchy_source = ?,
                     date_path_folder = ?, date_path_folder_source = ?,
                     date_path_filename = ?, date_path_filename_source = ?,
                     path_dates_extracted_at_unix = ?, path_dates_extracted_at = ?
                 WHERE id = ?",
            )?;
            for update in updates {
                stmt.execute(params![
                    update.hierarchy.as_ref().map(|m| m.date),
                    update.hierarchy.as_ref().map(|m| m.source.as_str()),
                    update.folder.as_ref().map(|m| m.date),
                    update.folder.as_ref().map(|m| m.source.as_str()),
                    update.filename.as_ref().map(|m| m.date),
                    update.filename.as_ref().map(|m| m.source.as_str()),
                    now_unix,
                    now_int,
                    update.id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
