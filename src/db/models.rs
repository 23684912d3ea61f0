//! Row types shared across the pipeline stages.

use std::fmt;

/// Status of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
            ScanStatus::Interrupted => "interrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ScanStatus::Running),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            "interrupted" => Some(ScanStatus::Interrupted),
            _ => None,
        }
    }

    /// Whether a session in this state can be picked up by `scan --resume`.
    pub fn is_resumable(&self) -> bool {
        matches!(self, ScanStatus::Running | ScanStatus::Interrupted)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scan session row.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: i64,
    pub source_root: String,
    pub source_drive_uuid: String,
    pub started_at_unix: f64,
    pub status: ScanStatus,
    pub error_message: Option<String>,
    pub files_scanned: i64,
    pub directories_scanned: i64,
    pub total_bytes: i64,
}

/// Parsed components of a filename.
///
/// The extension is everything after the last dot, lowercased; dotfiles and
/// trailing-dot names have no extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub full: String,
    pub base: String,
    pub extension: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            ScanStatus::Running,
            ScanStatus::Completed,
            ScanStatus::Failed,
            ScanStatus::Interrupted,
        ] {
            assert_eq!(ScanStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ScanStatus::parse("bogus"), None);
    }

    #[test]
    fn resumable_states() {
        assert!(ScanStatus::Running.is_resumable());
        assert!(ScanStatus::Interrupted.is_resumable());
        assert!(!ScanStatus::Completed.is_resumable());
        assert!(!ScanStatus::Failed.is_resumable());
    }
}
