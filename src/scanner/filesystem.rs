//! Filesystem traversal for the inventory scan.
//!
//! The walk is depth-first with children visited in byte-wise ascending name
//! order, so two scans of the same tree always see files in the same order.
//! Each directory is surfaced to the caller as one [`DirectoryBatch`]; the
//! scanner turns every batch into exactly one catalog transaction.

use anyhow::Result;
use std::collections::HashSet;
use std::fs::{self, DirEntry, Metadata};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::db::ParsedFilename;

/// Filesystem facts recorded for one regular file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub relative_path: String,
    pub directory_path: String,
    pub parsed_filename: ParsedFilename,
    pub size: u64,
    pub modified: Option<(f64, i64)>,
    pub changed: Option<(f64, i64)>,
    pub created: Option<(f64, i64)>,
    pub accessed: Option<(f64, i64)>,
}

/// All files directly inside one directory, ready to commit.
#[derive(Debug)]
pub struct DirectoryBatch {
    pub directory_path: String,
    pub files: Vec<FileInfo>,
}

/// Whether the walk should keep going after a batch was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    Stop,
}

#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub max_path_length: usize,
    pub retry_io_errors: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_path_length: 4096,
            retry_io_errors: true,
        }
    }
}

/// Split a filename into base and extension.
///
/// The extension is the substring after the last dot, lowercased. A name with
/// no dot, a trailing dot, or only a leading dot (dotfiles) has no extension.
pub fn parse_filename(filename: &str) -> ParsedFilename {
    match filename.rfind('.') {
        Some(0) | None => ParsedFilename {
            full: filename.to_string(),
            base: filename.to_string(),
            extension: None,
        },
        Some(idx) if idx == filename.len() - 1 => ParsedFilename {
            full: filename.to_string(),
            base: filename.trim_end_matches('.').to_string(),
            extension: None,
        },
        Some(idx) => ParsedFilename {
            full: filename.to_string(),
            base: filename[..idx].to_string(),
            extension: Some(filename[idx + 1..].to_lowercase()),
        },
    }
}

/// Walk `root` depth-first, delivering one batch per directory.
///
/// Directories whose relative path is in `completed` are not re-listed for
/// files, but their subdirectories are still visited; each directory carries
/// its own completion row. Returns `true` when the walk ran to the end,
/// `false` when the visitor stopped it.
pub fn walk_directory(
    root: &Path,
    completed: &HashSet<String>,
    options: &WalkOptions,
    visit: &mut dyn FnMut(DirectoryBatch) -> Result<WalkControl>,
) -> Result<bool> {
    let control = walk_recursive(root, root, completed, options, visit)?;
    Ok(control == WalkControl::Continue)
}

fn walk_recursive(
    current: &Path,
    root: &Path,
    completed: &HashSet<String>,
    options: &WalkOptions,
    visit: &mut dyn FnMut(DirectoryBatch) -> Result<WalkControl>,
) -> Result<WalkControl> {
    let relative_dir = relative_path(current, root);
    let (files, subdirs) = list_directory(current, root, relative_dir.as_str(), completed, options);

    if !completed.contains(&relative_dir) {
        let control = visit(DirectoryBatch {
            directory_path: relative_dir.clone(),
            files,
        })?;
        if control == WalkControl::Stop {
            return Ok(WalkControl::Stop);
        }
    } else {
        debug!(directory = %relative_dir, "skipping completed directory");
    }

    for subdir in subdirs {
        if walk_recursive(&subdir, root, completed, options, visit)? == WalkControl::Stop {
            return Ok(WalkControl::Stop);
        }
    }

    Ok(WalkControl::Continue)
}

/// One pass over the directory listing, partitioned into files and subdirs,
/// both in byte-ascending name order. When the directory is already completed
/// the file side is skipped entirely.
fn list_directory(
    directory: &Path,
    root: &Path,
    relative_dir: &str,
    completed: &HashSet<String>,
    options: &WalkOptions,
) -> (Vec<FileInfo>, Vec<PathBuf>) {
    let mut entries: Vec<DirEntry> = match fs::read_dir(directory) {
        Ok(iter) => iter
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(e) => {
                    warn!(directory = %directory.display(), error = %e,
                          "unreadable directory entry, skipping");
                    None
                }
            })
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!(directory = %directory.display(), "permission denied listing directory");
            return (Vec::new(), Vec::new());
        }
        Err(e) => {
            warn!(directory = %directory.display(), error = %e, "error listing directory");
            return (Vec::new(), Vec::new());
        }
    };
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let skip_files = completed.contains(relative_dir);
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in entries {
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e,
                      "cannot determine entry type, skipping");
                continue;
            }
        };

        // Symlinks are never followed and never recorded.
        if file_type.is_symlink() {
            continue;
        }

        if file_type.is_dir() {
            subdirs.push(entry.path());
            continue;
        }
        if !file_type.is_file() || skip_files {
            continue;
        }

        if entry.path().as_os_str().len() > options.max_path_length {
            warn!(path = %entry.path().display(), "path too long, skipping");
            continue;
        }

        if let Some(info) = process_entry(&entry, root, options) {
            files.push(info);
        }
    }

    (files, subdirs)
}

fn process_entry(entry: &DirEntry, root: &Path, options: &WalkOptions) -> Option<FileInfo> {
    // DirEntry::metadata reads through the directory handle and does not
    // traverse symlinks; on Linux this avoids a second path resolution.
    let metadata = match stat_entry(entry, options) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %entry.path().display(), "file disappeared during scan");
            return None;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!(path = %entry.path().display(), "permission denied");
            return None;
        }
        Err(e) => {
            warn!(path = %entry.path().display(), error = %e, "error reading file, skipping");
            return None;
        }
    };

    let path = entry.path();
    let filename = entry.file_name().to_string_lossy().into_owned();
    let relative = relative_path(&path, root);
    let directory = path
        .parent()
        .map(|p| relative_path(p, root))
        .unwrap_or_default();

    Some(FileInfo {
        relative_path: relative,
        directory_path: directory,
        parsed_filename: parse_filename(&filename),
        size: metadata.len(),
        modified: system_time_pair(metadata.modified().ok()),
        changed: changed_time_pair(&metadata),
        created: system_time_pair(metadata.created().ok()),
        accessed: system_time_pair(metadata.accessed().ok()),
    })
}

fn stat_entry(entry: &DirEntry, options: &WalkOptions) -> std::io::Result<Metadata> {
    match entry.metadata() {
        Ok(m) => Ok(m),
        Err(e)
            if options.retry_io_errors
                && e.kind() != std::io::ErrorKind::NotFound
                && e.kind() != std::io::ErrorKind::PermissionDenied =>
        {
            debug!(path = %entry.path().display(), error = %e, "transient stat error, retrying");
            entry.metadata()
        }
        Err(e) => Err(e),
    }
}

fn relative_path(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => String::new(),
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

fn system_time_pair(time: Option<SystemTime>) -> Option<(f64, i64)> {
    let secs = time?.duration_since(UNIX_EPOCH).ok()?.as_secs_f64();
    Some((secs, secs as i64))
}

#[cfg(unix)]
fn changed_time_pair(metadata: &Metadata) -> Option<(f64, i64)> {
    use std::os::unix::fs::MetadataExt;
    let secs = metadata.ctime() as f64 + metadata.ctime_nsec() as f64 / 1_000_000_000.0;
    Some((secs, metadata.ctime()))
}

#[cfg(not(unix))]
fn changed_time_pair(_metadata: &Metadata) -> Option<(f64, i64)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn collect_batches(root: &Path, completed: &HashSet<String>) -> Vec<DirectoryBatch> {
        let mut batches = Vec::new();
        walk_directory(root, completed, &WalkOptions::default(), &mut |batch| {
            batches.push(batch);
            Ok(WalkControl::Continue)
        })
        .unwrap();
        batches
    }

    #[test]
    fn parse_filename_basic() {
        let parsed = parse_filename("IMG_001.ARW");
        assert_eq!(parsed.base, "IMG_001");
        assert_eq!(parsed.extension.as_deref(), Some("arw"));
    }

    #[test]
    fn parse_filename_multi_dot_keeps_all_but_last() {
        let parsed = parse_filename("archive.tar.gz");
        assert_eq!(parsed.base, "archive.tar");
        assert_eq!(parsed.extension.as_deref(), Some("gz"));
    }

    #[test]
    fn parse_filename_dotfile_has_no_extension() {
        let parsed = parse_filename(".gitignore");
        assert_eq!(parsed.base, ".gitignore");
        assert_eq!(parsed.extension, None);
    }

    #[test]
    fn parse_filename_trailing_dot() {
        let parsed = parse_filename("file.");
        assert_eq!(parsed.base, "file");
        assert_eq!(parsed.extension, None);
    }

    #[test]
    fn parse_filename_no_dot() {
        let parsed = parse_filename("README");
        assert_eq!(parsed.base, "README");
        assert_eq!(parsed.extension, None);
    }

    #[test]
    fn walk_yields_one_batch_per_directory() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("b.jpg")).unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/c.jpg")).unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let batches = collect_batches(dir.path(), &HashSet::new());

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].directory_path, "");
        // Byte-ascending order within the root listing.
        let names: Vec<&str> = batches[0]
            .files
            .iter()
            .map(|f| f.parsed_filename.full.as_str())
            .collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);

        // Empty directories still produce a (file-less) batch.
        let empty = batches
            .iter()
            .find(|b| b.directory_path == "empty")
            .unwrap();
        assert!(empty.files.is_empty());

        let sub = batches.iter().find(|b| b.directory_path == "sub").unwrap();
        assert_eq!(sub.files.len(), 1);
        assert_eq!(sub.files[0].relative_path, "sub/c.jpg");
        assert_eq!(sub.files[0].directory_path, "sub");
    }

    #[test]
    fn hidden_files_are_included() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join(".hidden.jpg")).unwrap();

        let batches = collect_batches(dir.path(), &HashSet::new());
        assert_eq!(batches[0].files.len(), 1);
        assert_eq!(batches[0].files[0].parsed_filename.full, ".hidden.jpg");
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_recorded() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("real.jpg")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.jpg"), dir.path().join("link.jpg"))
            .unwrap();

        let batches = collect_batches(dir.path(), &HashSet::new());
        assert_eq!(batches[0].files.len(), 1);
        assert_eq!(batches[0].files[0].parsed_filename.full, "real.jpg");
    }

    #[test]
    fn completed_directory_skips_files_but_visits_children() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("top.jpg")).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub/inner.jpg")).unwrap();

        let mut completed = HashSet::new();
        completed.insert(String::new()); // root already committed

        let batches = collect_batches(dir.path(), &completed);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].directory_path, "sub");
    }

    #[test]
    fn visitor_can_stop_the_walk() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();

        let mut seen = 0;
        let finished = walk_directory(
            dir.path(),
            &HashSet::new(),
            &WalkOptions::default(),
            &mut |_batch| {
                seen += 1;
                Ok(if seen == 2 {
                    WalkControl::Stop
                } else {
                    WalkControl::Continue
                })
            },
        )
        .unwrap();

        assert!(!finished);
        assert_eq!(seen, 2);
    }
}
