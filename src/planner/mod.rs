//! Stage 4: placement planning.
//!
//! Folder-centric date resolution over the inventory and metadata left by
//! the earlier stages. Folders are processed shallowest-first so a child can
//! inherit its parent's date; every file gets a target path under the
//! canonical `yyyy/yyyy_mm/yyyymmdd[-annotation]` layout or inside a bucket.
//! The whole run is one transaction: a session has either a complete plan or
//! none.

pub mod analyzer;
pub mod path_builder;
pub mod resolver;
pub mod sidecar;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::config::PlannerConfig;
use crate::db::{now_pair, Database};
use analyzer::{analyze_folder, is_image_extension, FileDateSample, FolderDateAnalysis};
use path_builder::{
    build_bucket_path, build_target_folder, extract_annotation, resolve_filename_duplicate,
};
use resolver::{resolve_file_date, resolve_folder, resolve_folder_with_path_date, FolderResolution};
use sidecar::{detect_sidecar, SiblingFile};

/// Summary of one planning run.
#[derive(Debug, Default, Clone)]
pub struct PlannerStats {
    pub folders_planned: u64,
    pub files_planned: u64,
    pub folders_by_source: BTreeMap<String, u64>,
    pub potential_duplicates: u64,
    pub sidecars: u64,
}

/// One file row as the planner sees it.
struct PlanInput {
    id: i64,
    source_path: String,
    filename_full: String,
    filename_base: String,
    extension: Option<String>,
    date_path_folder: Option<i64>,
    date_path_folder_source: Option<String>,
    date_path_filename: Option<i64>,
    fs_modified_at_unix: Option<f64>,
    date_original: Option<i64>,
}

/// What later folders need to know about an already-planned one.
struct PlannedFolder {
    id: i64,
    resolved_date: Option<i64>,
    target_folder: String,
}

pub struct Planner<'a> {
    db: &'a Database,
    config: PlannerConfig,
    /// Image and video extensions together; sidecars pair with either, while
    /// date statistics stay image-only.
    sidecar_media_extensions: Vec<String>,
    cancel: Arc<AtomicBool>,
}

impl<'a> Planner<'a> {
    pub fn new(db: &'a Database, config: PlannerConfig, cancel: Arc<AtomicBool>) -> Self {
        let mut sidecar_media_extensions = config.image_extensions.clone();
        for ext in &config.video_extensions {
            if !sidecar_media_extensions.contains(ext) {
                sidecar_media_extensions.push(ext.clone());
            }
        }
        Self {
            db,
            config,
            sidecar_media_extensions,
            cancel,
        }
    }

    /// Build the complete plan for one session, replacing any previous one.
    /// Interruption rolls the whole run back.
    pub fn plan(&self, session_id: i64) -> Result<PlannerStats> {
        let tx = self
            .db
            .conn
            .unchecked_transaction()
            .context("Failed to begin planning transaction")?;

        // file_plan rows go with their folder_plan via cascade.
        tx.execute(
            "DELETE FROM folder_plan WHERE scan_session_id = ?",
            [session_id],
        )?;

        let folders = self.session_folders(&tx, session_id)?;
        info!(folders = folders.len(), "planning session {session_id}");

        let mut stats = PlannerStats::default();
        let mut planned: HashMap<String, PlannedFolder> = HashMap::new();
        let mut claimed_names: HashMap<String, HashSet<String>> = HashMap::new();

        for folder in &folders {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(anyhow!("planning interrupted; no plan was written"));
            }
            self.plan_folder(
                &tx,
                session_id,
                folder,
                &mut planned,
                &mut claimed_names,
                &mut stats,
            )?;
        }

        tx.commit().context("Failed to commit plan")?;
        Ok(stats)
    }

    /// Distinct folders of the session, ascending depth then byte order, so
    /// every ancestor is planned before its descendants.
    fn session_folders(&self, conn: &Connection, session_id: i64) -> Result<Vec<String>> {
        let mut stmt =
            conn.prepare("SELECT DISTINCT directory_path FROM files WHERE scan_session_id = ?")?;
        let mut folders = stmt
            .query_map([session_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        folders.sort_by(|a, b| {
            let depth_a = a.matches('/').count() + usize::from(!a.is_empty());
            let depth_b = b.matches('/').count() + usize::from(!b.is_empty());
            depth_a.cmp(&depth_b).then_with(|| a.cmp(b))
        });
        Ok(folders)
    }

    fn plan_folder(
        &self,
        conn: &Connection,
        session_id: i64,
        folder: &str,
        planned: &mut HashMap<String, PlannedFolder>,
        claimed_names: &mut HashMap<String, HashSet<String>>,
        stats: &mut PlannerStats,
    ) -> Result<()> {
        let files = self.folder_files(conn, session_id, folder)?;
        if files.is_empty() {
            return Ok(());
        }

        let file_dates: Vec<resolver::FileDateResult> = files
            .iter()
            .map(|f| {
                resolve_file_date(
                    f.date_path_folder,
                    f.date_path_filename,
                    f.date_original,
                    f.fs_modified_at_unix,
                )
            })
            .collect();

        let samples: Vec<FileDateSample> = files
            .iter()
            .zip(&file_dates)
            .map(|(f, d)| FileDateSample {
                date: d.date,
                is_image: is_image_extension(f.extension.as_deref(), &self.config.image_extensions),
            })
            .collect();
        let analysis = analyze_folder(&samples);

        // A path-derived date beats any statistics. The first file carrying
        // one also names the folder the annotation comes from.
        let path_date = files
            .iter()
            .find(|f| f.date_path_folder.is_some())
            .map(|f| {
                (
                    f.date_path_folder.expect("filtered on is_some"),
                    f.date_path_folder_source.clone().unwrap_or_default(),
                )
            });

        let mut resolution = match &path_date {
            Some((date, _)) => resolve_folder_with_path_date(*date),
            None => resolve_folder(&analysis, &self.config),
        };

        let annotation_seed = match &path_date {
            Some((_, source)) => source.clone(),
            None => folder.rsplit('/').next().unwrap_or(folder).to_string(),
        };

        let mut annotation = None;
        let mut target_folder = match (resolution.bucket, resolution.resolved_date) {
            (Some(bucket), _) => build_bucket_path(bucket, folder),
            (None, Some(date)) => {
                annotation =
                    extract_annotation(&annotation_seed, date, self.config.max_annotation_length);
                build_target_folder(date, annotation.as_deref())
            }
            (None, None) => unreachable!("resolution always has a bucket or a date"),
        };

        // Inheritance: anything short of a path-derived date yields to a
        // dated ancestor, preserving the subtree below it.
        let mut inherited_from = None;
        let mut is_subfolder = false;
        if resolution.source != "path_folder" {
            if let Some((ancestor_path, ancestor)) = nearest_planned_ancestor(folder, planned) {
                if let Some(parent_date) = ancestor.resolved_date {
                    resolution = FolderResolution {
                        bucket: None,
                        resolved_date: Some(parent_date),
                        source: "inherited",
                    };
                    annotation = None;
                    target_folder = format!(
                        "{}/{}",
                        ancestor.target_folder,
                        subtree_path(folder, &ancestor_path)
                    );
                    inherited_from = Some(ancestor.id);
                    is_subfolder = true;
                }
            }
        }

        let folder_plan_id = self.insert_folder_plan(
            conn,
            session_id,
            folder,
            &resolution,
            &target_folder,
            annotation.as_deref(),
            &analysis,
            inherited_from,
            is_subfolder,
        )?;

        planned.insert(
            folder.to_string(),
            PlannedFolder {
                id: folder_plan_id,
                resolved_date: resolution.resolved_date,
                target_folder: target_folder.clone(),
            },
        );

        stats.folders_planned += 1;
        *stats
            .folders_by_source
            .entry(resolution.source.to_string())
            .or_insert(0) += 1;

        let siblings: Vec<SiblingFile> = files
            .iter()
            .map(|f| SiblingFile {
                filename_base: f.filename_base.clone(),
                extension: f.extension.clone(),
            })
            .collect();

        let existing = claimed_names.entry(target_folder.clone()).or_default();
        let (now_unix, now_int) = now_pair();
        let mut insert = conn.prepare_cached(
            "INSERT INTO file_plan (
                 file_id, folder_plan_id, source_path, source_filename,
                 file_resolved_date, file_date_source,
                 target_folder, target_path, target_filename,
                 is_potential_duplicate, duplicate_source_hash, is_sidecar,
                 resolution_reason, planned_at_unix, planned_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;

        for (file, file_date) in files.iter().zip(&file_dates) {
            let is_sidecar = detect_sidecar(
                &file.filename_base,
                file.extension.as_deref(),
                &siblings,
                &self.config.sidecar_extensions,
                &self.sidecar_media_extensions,
            );

            let dup = resolve_filename_duplicate(&file.filename_full, folder, existing);
            existing.insert(dup.filename.clone());

            let target_path = format!("{target_folder}/{}", dup.filename);
            let reason = format!(
                "folder resolved by {}; file date from {}",
                resolution.source, file_date.source
            );

            insert.execute(params![
                file.id,
                folder_plan_id,
                file.source_path,
                file.filename_full,
                file_date.date,
                file_date.source,
                target_folder,
                target_path,
                dup.filename,
                dup.is_duplicate,
                dup.source_hash,
                is_sidecar,
                reason,
                now_unix,
                now_int,
            ])?;

            stats.files_planned += 1;
            if dup.is_duplicate {
                stats.potential_duplicates += 1;
            }
            if is_sidecar {
                stats.sidecars += 1;
            }
        }

        Ok(())
    }

    /// Files of one folder in byte order, with their EXIF original date when
    /// a metadata row exists.
    fn folder_files(
        &self,
        conn: &Connection,
        session_id: i64,
        folder: &str,
    ) -> Result<Vec<PlanInput>> {
        let mut stmt = conn.prepare_cached(
            "SELECT f.id, f.source_path, f.filename_full, f.filename_base, f.extension,
                    f.date_path_folder, f.date_path_folder_source,
                    f.date_path_filename, f.fs_modified_at_unix,
                    fm.date_original
             FROM files f
             LEFT JOIN file_metadata fm ON fm.file_id = f.id
             WHERE f.scan_session_id = ? AND f.directory_path = ?
             ORDER BY f.source_path",
        )?;
        let files = stmt
            .query_map(params![session_id, folder], |row| {
                Ok(PlanInput {
                    id: row.get(0)?,
                    source_path: row.get(1)?,
                    filename_full: row.get(2)?,
                    filename_base: row.get(3)?,
                    extension: row.get(4)?,
                    date_path_folder: row.get(5)?,
                    date_path_folder_source: row.get(6)?,
                    date_path_filename: row.get(7)?,
                    fs_modified_at_unix: row.get(8)?,
                    date_original: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_folder_plan(
        &self,
        conn: &Connection,
        session_id: i64,
        folder: &str,
        resolution: &FolderResolution,
        target_folder: &str,
        annotation: Option<&str>,
        analysis: &FolderDateAnalysis,
        inherited_from: Option<i64>,
        is_subfolder: bool,
    ) -> Result<i64> {
        let (now_unix, now_int) = now_pair();
        conn.execute(
            "INSERT INTO folder_plan (
                 scan_session_id, source_folder, resolved_date, resolved_date_source,
                 target_folder, bucket, annotation,
                 total_file_count, image_file_count, images_with_date_count,
                 date_coverage_pct, prevalent_date, prevalent_date_count,
                 prevalent_date_pct, unique_date_count, min_date, max_date,
                 date_span_months,
                 inherited_from_folder_id, is_subfolder,
                 config_min_coverage, config_min_prevalence, config_max_span_months,
                 planned_at_unix, planned_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                session_id,
                folder,
                resolution.resolved_date,
                resolution.source,
                target_folder,
                resolution.bucket,
                annotation,
                analysis.total_files as i64,
                analysis.image_files as i64,
                analysis.images_with_date as i64,
                analysis.date_coverage_pct,
                analysis.prevalent_date,
                analysis.prevalent_date_count as i64,
                analysis.prevalent_date_pct,
                analysis.unique_date_count as i64,
                analysis.min_date,
                analysis.max_date,
                analysis.date_span_months,
                inherited_from,
                is_subfolder,
                self.config.min_coverage,
                self.config.min_prevalence,
                self.config.max_date_span_months,
                now_unix,
                now_int,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

/// Walk up from `folder` to the nearest ancestor that has a plan row. Only
/// folders containing files get rows, so intermediate file-less directories
/// are stepped over.
fn nearest_planned_ancestor<'p>(
    folder: &str,
    planned: &'p HashMap<String, PlannedFolder>,
) -> Option<(String, &'p PlannedFolder)> {
    let mut current = folder;
    loop {
        let parent = match current.rfind('/') {
            Some(idx) => &current[..idx],
            None if !current.is_empty() => "",
            None => return None,
        };
        if let Some(entry) = planned.get(parent) {
            return Some((parent.to_string(), entry));
        }
        if parent.is_empty() {
            return None;
        }
        current = parent;
    }
}

/// Relative path from `ancestor` down to `folder`.
fn subtree_path<'f>(folder: &'f str, ancestor: &str) -> &'f str {
    if ancestor.is_empty() {
        folder
    } else {
        folder
            .strip_prefix(ancestor)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(folder)
    }
}

/// Aggregate plan counts for `plan --stats`.
#[derive(Debug, Default, Clone)]
pub struct StoredPlanStats {
    pub folders: u64,
    pub files: u64,
    pub folders_by_source: BTreeMap<String, u64>,
    pub folders_by_bucket: BTreeMap<String, u64>,
    pub potential_duplicates: u64,
    pub sidecars: u64,
}

pub fn stored_stats(db: &Database, session_id: i64) -> Result<StoredPlanStats> {
    let mut stats = StoredPlanStats::default();

    let mut stmt = db.conn.prepare(
        "SELECT resolved_date_source, bucket, COUNT(*) FROM folder_plan
         WHERE scan_session_id = ?
         GROUP BY resolved_date_source, bucket",
    )?;
    let rows = stmt.query_map([session_id], |row| {
        Ok((
            row.get::<_, Option<String>>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (source, bucket, count) = row?;
        stats.folders += count as u64;
        if let Some(source) = source {
            *stats.folders_by_source.entry(source).or_insert(0) += count as u64;
        }
        if let Some(bucket) = bucket {
            *stats.folders_by_bucket.entry(bucket).or_insert(0) += count as u64;
        }
    }

    let (files, dupes, sidecars) = db.conn.query_row(
        "SELECT COUNT(*),
                SUM(CASE WHEN fp.is_potential_duplicate THEN 1 ELSE 0 END),
                SUM(CASE WHEN fp.is_sidecar THEN 1 ELSE 0 END)
         FROM file_plan fp
         JOIN folder_plan fo ON fo.id = fp.folder_plan_id
         WHERE fo.scan_session_id = ?",
        [session_id],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            ))
        },
    )?;
    stats.files = files as u64;
    stats.potential_duplicates = dupes as u64;
    stats.sidecars = sidecars as u64;

    Ok(stats)
}
