//! File selection strategies for metadata extraction.
//!
//! The set is closed: `full` takes every supported file without a
//! `file_metadata` row, `selective` narrows to files that got no folder or
//! filename date from the path stage (the files whose placement actually
//! depends on embedded metadata). Exclusion of already-extracted files is
//! what makes reruns resume for free.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Image formats exiftool is asked about.
pub const IMAGE_EXTENSIONS: [&str; 10] = [
    "arw", "jpg", "jpeg", "nef", "dng", "tif", "tiff", "heic", "cr2", "srw",
];

/// Video formats exiftool is asked about.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "m4v", "mov", "mkv", "avi"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Full,
    Selective,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Full => "full",
            Strategy::Selective => "selective",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "full" => Ok(Strategy::Full),
            "selective" => Ok(Strategy::Selective),
            other => Err(anyhow!(
                "Unknown strategy: {other}. Available: full, selective"
            )),
        }
    }

    /// Ordered list of file ids this strategy selects.
    pub fn file_ids(&self, conn: &Connection, limit: Option<usize>) -> Result<Vec<i64>> {
        let placeholders = vec!["?"; IMAGE_EXTENSIONS.len() + VIDEO_EXTENSIONS.len()].join(",");
        let extra_filter = match self {
            Strategy::Full => "",
            Strategy::Selective => {
                "AND f.date_path_folder IS NULL
                 AND f.date_path_filename IS NULL"
            }
        };
        let limit_clause = match limit {
            Some(n) => format!(" LIMIT {n}"),
            None => String::new(),
        };

        let sql = format!(
            "SELECT f.id FROM files f
             WHERE f.extension IN ({placeholders})
               {extra_filter}
               AND f.id NOT IN (SELECT file_id FROM file_metadata)
             ORDER BY f.id{limit_clause}"
        );

        let extensions = IMAGE_EXTENSIONS.iter().chain(VIDEO_EXTENSIONS.iter());
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(extensions), |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use rusqlite::params;

    fn seed(db: &Database) -> i64 {
        db.create_session("/test", "uuid").unwrap()
    }

    fn insert_file(
        db: &Database,
        session: i64,
        path: &str,
        extension: Option<&str>,
        folder_date: Option<i64>,
    ) -> i64 {
        db.conn
            .execute(
                "INSERT INTO files (scan_session_id, source_path, directory_path,
                 filename_full, filename_base, extension, size,
                 date_path_folder, scanned_at_unix, scanned_at)
                 VALUES (?, ?, '', ?, ?, ?, 100000, ?, 1.0, 1)",
                params![session, path, path, path, extension, folder_date],
            )
            .unwrap();
        db.conn.last_insert_rowid()
    }

    #[test]
    fn full_selects_supported_without_metadata() {
        let db = Database::open_in_memory().unwrap();
        let session = seed(&db);
        let a = insert_file(&db, session, "a.jpg", Some("jpg"), None);
        let b = insert_file(&db, session, "b.mov", Some("mov"), None);
        insert_file(&db, session, "c.txt", Some("txt"), None);
        insert_file(&db, session, "d", None, None);

        let ids = Strategy::Full.file_ids(&db.conn, None).unwrap();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn full_excludes_already_extracted() {
        let db = Database::open_in_memory().unwrap();
        let session = seed(&db);
        let a = insert_file(&db, session, "a.jpg", Some("jpg"), None);
        let b = insert_file(&db, session, "b.jpg", Some("jpg"), None);
        db.conn
            .execute(
                "INSERT INTO file_metadata (file_id, extracted_at_unix, extracted_at)
                 VALUES (?, 1.0, 1)",
                [a],
            )
            .unwrap();

        let ids = Strategy::Full.file_ids(&db.conn, None).unwrap();
        assert_eq!(ids, vec![b]);
    }

    #[test]
    fn selective_skips_files_with_path_dates() {
        let db = Database::open_in_memory().unwrap();
        let session = seed(&db);
        insert_file(&db, session, "dated.jpg", Some("jpg"), Some(20230514));
        let undated = insert_file(&db, session, "undated.jpg", Some("jpg"), None);

        let ids = Strategy::Selective.file_ids(&db.conn, None).unwrap();
        assert_eq!(ids, vec![undated]);
    }

    #[test]
    fn limit_caps_selection() {
        let db = Database::open_in_memory().unwrap();
        let session = seed(&db);
        for i in 0..5 {
            insert_file(&db, session, &format!("f{i}.jpg"), Some("jpg"), None);
        }
        let ids = Strategy::Full.file_ids(&db.conn, Some(3)).unwrap();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!(Strategy::parse("full").unwrap(), Strategy::Full);
        assert_eq!(Strategy::parse("selective").unwrap(), Strategy::Selective);
        assert!(Strategy::parse("bogus").is_err());
    }
}
