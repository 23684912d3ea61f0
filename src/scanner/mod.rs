//! Stage 1: filesystem inventory.
//!
//! Walks one source root and records every regular file in the catalog.
//! Resumability comes from the commit discipline: one write transaction per
//! directory, covering the directory's file rows, the session counters, and
//! the directory's completion row. After an interruption the catalog holds a
//! clean prefix of completed directories and nothing else.

pub mod filesystem;
pub mod progress;
pub mod uuid;

use anyhow::{anyhow, Context, Result};
use rusqlite::params;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

use crate::config::ScannerConfig;
use crate::db::{now_pair, Database};
use filesystem::{DirectoryBatch, WalkControl, WalkOptions};
use progress::{ProgressReporter, ScanStats};

/// How a scan run ended.
#[derive(Debug)]
pub enum ScanOutcome {
    Completed(ScanStats),
    Interrupted(ScanStats),
}

pub struct Scanner<'a> {
    db: &'a Database,
    config: ScannerConfig,
    cancel: Arc<AtomicBool>,
}

impl<'a> Scanner<'a> {
    pub fn new(db: &'a Database, config: ScannerConfig, cancel: Arc<AtomicBool>) -> Self {
        Self { db, config, cancel }
    }

    /// Scan `source_root`, either fresh (replacing any previous session for
    /// the root) or resuming a `running`/`interrupted` one.
    ///
    /// `drive_uuid` must already be resolved; the oracle runs before any
    /// catalog mutation.
    pub fn scan(&self, source_root: &Path, drive_uuid: &str, resume: bool) -> Result<ScanOutcome> {
        let source_root = source_root
            .canonicalize()
            .with_context(|| format!("Source root not accessible: {}", source_root.display()))?;
        let root_str = source_root.to_string_lossy().into_owned();

        let mut progress = ProgressReporter::new(
            self.config.progress_interval,
            self.config.stats_update_interval,
        );

        let (session_id, completed_dirs, mut stats) = if resume {
            let session = self
                .db
                .find_resumable_session(&root_str)?
                .ok_or_else(|| anyhow!("No interrupted scan found for {root_str}"))?;
            let completed = self.db.completed_directories(session.id)?;
            let stats = ScanStats {
                files_scanned: session.files_scanned as u64,
                directories_scanned: session.directories_scanned as u64,
                total_bytes: session.total_bytes as u64,
                ..ScanStats::default()
            };
            progress.report_resume(stats.files_scanned, stats.directories_scanned);
            (session.id, completed, stats)
        } else {
            let session_id = self.db.create_session(&root_str, drive_uuid)?;
            (session_id, Default::default(), ScanStats::default())
        };

        println!("Starting scan of {root_str}");
        println!("Drive UUID: {drive_uuid}");

        let walk_options = WalkOptions {
            max_path_length: self.config.max_path_length,
            retry_io_errors: self.config.retry_io_errors,
        };

        let walk_result = filesystem::walk_directory(
            &source_root,
            &completed_dirs,
            &walk_options,
            &mut |batch| {
                if self.cancel.load(Ordering::SeqCst) {
                    return Ok(WalkControl::Stop);
                }
                self.commit_directory(session_id, &batch, &mut stats)?;
                progress.report_if_needed(&stats, &batch.directory_path);
                Ok(WalkControl::Continue)
            },
        );

        match walk_result {
            Ok(true) => {
                self.db.mark_session_completed(
                    session_id,
                    stats.files_scanned,
                    stats.directories_scanned,
                    stats.total_bytes,
                )?;
                progress.report_completion(&stats);
                Ok(ScanOutcome::Completed(stats))
            }
            Ok(false) => {
                self.db.mark_session_interrupted(
                    session_id,
                    stats.files_scanned,
                    stats.directories_scanned,
                    stats.total_bytes,
                )?;
                progress.report_interruption(&stats);
                Ok(ScanOutcome::Interrupted(stats))
            }
            Err(e) => {
                error!(error = %e, "scan failed, marking session");
                // Prior per-directory commits stay intact; only the session
                // status changes.
                let _ = self.db.mark_session_failed(session_id, &format!("{e:#}"));
                Err(e)
            }
        }
    }

    /// One transaction per directory: drop any partial rows from an earlier
    /// interrupted visit, insert this listing, bump counters, record
    /// completion, commit.
    fn commit_directory(
        &self,
        session_id: i64,
        batch: &DirectoryBatch,
        stats: &mut ScanStats,
    ) -> Result<()> {
        let tx = self
            .db
            .conn
            .unchecked_transaction()
            .context("Failed to begin catalog transaction")?;

        tx.execute(
            "DELETE FROM files WHERE scan_session_id = ? AND directory_path = ?",
            params![session_id, batch.directory_path],
        )?;

        let (now_unix, now_int) = now_pair();
        let batch_bytes: u64 = batch.files.iter().map(|f| f.size).sum();

        {
            let mut insert = tx.prepare(
                "INSERT INTO files (
                     scan_session_id, source_path, directory_path,
                     filename_full, filename_base, extension, size,
                     fs_modified_at_unix, fs_modified_at,
                     fs_changed_at_unix, fs_changed_at,
                     fs_created_at_unix, fs_created_at,
                     fs_accessed_at_unix, fs_accessed_at,
                     scanned_at_unix, scanned_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for file in &batch.files {
                insert.execute(params![
                    session_id,
                    file.relative_path,
                    file.directory_path,
                    file.parsed_filename.full,
                    file.parsed_filename.base,
                    file.parsed_filename.extension,
                    file.size as i64,
                    file.modified.map(|p| p.0),
                    file.modified.map(|p| p.1),
                    file.changed.map(|p| p.0),
                    file.changed.map(|p| p.1),
                    file.created.map(|p| p.0),
                    file.created.map(|p| p.1),
                    file.accessed.map(|p| p.0),
                    file.accessed.map(|p| p.1),
                    now_unix,
                    now_int,
                ])?;
            }
        }

        stats.files_scanned += batch.files.len() as u64;
        stats.directories_scanned += 1;
        stats.total_bytes += batch_bytes;

        tx.execute(
            "UPDATE scan_sessions
             SET files_scanned = ?, directories_scanned = ?, total_bytes = ?
             WHERE id = ?",
            params![
                stats.files_scanned as i64,
                stats.directories_scanned as i64,
                stats.total_bytes as i64,
                session_id
            ],
        )?;

        tx.execute(
            "INSERT OR REPLACE INTO completed_directories
             (scan_session_id, directory_path, file_count, total_bytes,
              completed_at_unix, completed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                session_id,
                batch.directory_path,
                batch.files.len() as i64,
                batch_bytes as i64,
                now_unix,
                now_int
            ],
        )?;

        tx.commit().context("Failed to commit directory")?;
        Ok(())
    }
}
