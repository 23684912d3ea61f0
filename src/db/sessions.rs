//! Scan-session lifecycle queries.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};

use super::{now_pair, Database, ScanSession, ScanStatus};

impl Database {
    /// Create a new `running` session for `source_root`, replacing any
    /// previous session for the same root. The delete cascades to files and
    /// completed directories.
    pub fn create_session(&self, source_root: &str, drive_uuid: &str) -> Result<i64> {
        let (now_unix, now_int) = now_pair();
        self.conn.execute(
            "DELETE FROM scan_sessions WHERE source_root = ?",
            [source_root],
        )?;
        self.conn.execute(
            "INSERT INTO scan_sessions
             (source_root, source_drive_uuid, started_at_unix, started_at, status)
             VALUES (?, ?, ?, ?, ?)",
            params![
                source_root,
                drive_uuid,
                now_unix,
                now_int,
                ScanStatus::Running.as_str()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Find the resumable (`running` or `interrupted`) session for a root.
    pub fn find_resumable_session(&self, source_root: &str) -> Result<Option<ScanSession>> {
        self.conn
            .query_row(
                "SELECT id, source_root, source_drive_uuid, started_at_unix, status,
                        error_message, files_scanned, directories_scanned, total_bytes
                 FROM scan_sessions
                 WHERE source_root = ? AND status IN ('running', 'interrupted')",
                [source_root],
                row_to_session,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Most recently started resumable session, for `scan --resume` with no root.
    pub fn find_latest_resumable_session(&self) -> Result<Option<ScanSession>> {
        self.conn
            .query_row(
                "SELECT id, source_root, source_drive_uuid, started_at_unix, status,
                        error_message, files_scanned, directories_scanned, total_bytes
                 FROM scan_sessions
                 WHERE status IN ('running', 'interrupted')
                 ORDER BY started_at_unix DESC
                 LIMIT 1",
                [],
                row_to_session,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Session for a specific root regardless of status.
    pub fn find_session_by_root(&self, source_root: &str) -> Result<Option<ScanSession>> {
        self.conn
            .query_row(
                "SELECT id, source_root, source_drive_uuid, started_at_unix, status,
                        error_message, files_scanned, directories_scanned, total_bytes
                 FROM scan_sessions
                 WHERE source_root = ?",
                [source_root],
                row_to_session,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Most recently started session of any status (default `plan` target).
    pub fn find_latest_session(&self) -> Result<Option<ScanSession>> {
        self.conn
            .query_row(
                "SELECT id, source_root, source_drive_uuid, started_at_unix, status,
                        error_message, files_scanned, directories_scanned, total_bytes
                 FROM scan_sessions
                 ORDER BY started_at_unix DESC
                 LIMIT 1",
                [],
                row_to_session,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All sessions, newest first, for `scan --status`.
    pub fn list_sessions(&self) -> Result<Vec<ScanSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_root, source_drive_uuid, started_at_unix, status,
                    error_message, files_scanned, directories_scanned, total_bytes
             FROM scan_sessions
             ORDER BY started_at_unix DESC",
        )?;
        let sessions = stmt
            .query_map([], row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Relative paths of directories already committed for a session.
    pub fn completed_directories(&self, session_id: i64) -> Result<std::collections::HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT directory_path FROM completed_directories WHERE scan_session_id = ?",
        )?;
        let dirs = stmt
            .query_map([session_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(dirs)
    }

    pub fn mark_session_completed(
        &self,
        session_id: i64,
        files: u64,
        directories: u64,
        bytes: u64,
    ) -> Result<()> {
        self.finish_session(session_id, ScanStatus::Completed, None, files, directories, bytes)
    }

    pub fn mark_session_interrupted(
        &self,
        session_id: i64,
        files: u64,
        directories: u64,
        bytes: u64,
    ) -> Result<()> {
        self.finish_session(
            session_id,
            ScanStatus::Interrupted,
            None,
            files,
            directories,
            bytes,
        )
    }

    pub fn mark_session_failed(&self, session_id: i64, error: &str) -> Result<()> {
        let (now_unix, now_int) = now_pair();
        self.conn.execute(
            "UPDATE scan_sessions
             SET status = ?, error_message = ?, completed_at_unix = ?, completed_at = ?
             WHERE id = ?",
            params![
                ScanStatus::Failed.as_str(),
                error,
                now_unix,
                now_int,
                session_id
            ],
        )?;
        Ok(())
    }

    fn finish_session(
        &self,
        session_id: i64,
        status: ScanStatus,
        error: Option<&str>,
        files: u64,
        directories: u64,
        bytes: u64,
    ) -> Result<()> {
        let (now_unix, now_int) = now_pair();
        self.conn.execute(
            "UPDATE scan_sessions
             SET status = ?, error_message = ?, completed_at_unix = ?, completed_at = ?,
                 files_scanned = ?, directories_scanned = ?, total_bytes = ?
             WHERE id = ?",
            params![
                status.as_str(),
                error,
                now_unix,
                now_int,
                files as i64,
                directories as i64,
                bytes as i64,
                session_id
            ],
        )?;
        Ok(())
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanSession> {
    let status_str: String = row.get(4)?;
    Ok(ScanSession {
        id: row.get(0)?,
        source_root: row.get(1)?,
        source_drive_uuid: row.get(2)?,
        started_at_unix: row.get(3)?,
        status: ScanStatus::parse(&status_str).unwrap_or(ScanStatus::Failed),
        error_message: row.get(5)?,
        files_scanned: row.get(6)?,
        directories_scanned: row.get(7)?,
        total_bytes: row.get(8)?,
    })
}
