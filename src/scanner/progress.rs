//! Progress reporting for long scans.

use std::time::{Duration, Instant};

/// Running counters for a scan, carried across resumes.
#[derive(Debug, Clone)]
pub struct ScanStats {
    pub files_scanned: u64,
    pub directories_scanned: u64,
    pub total_bytes: u64,
    pub start_time: Instant,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self {
            files_scanned: 0,
            directories_scanned: 0,
            total_bytes: 0,
            start_time: Instant::now(),
        }
    }
}

impl ScanStats {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Prints a status line every `interval` files, plus a "scanning" indicator
/// when no line has appeared for `stall_after` (large directories otherwise
/// look like a hang).
pub struct ProgressReporter {
    interval: u64,
    stall_after: Duration,
    last_report_count: u64,
    last_report_time: Instant,
}

impl ProgressReporter {
    pub fn new(interval: u64, stall_after_secs: u64) -> Self {
        Self {
            interval: interval.max(1),
            stall_after: Duration::from_secs(stall_after_secs.max(1)),
            last_report_count: 0,
            last_report_time: Instant::now(),
        }
    }

    pub fn report_if_needed(&mut self, stats: &ScanStats, current_directory: &str) {
        let due_by_count = stats.files_scanned - self.last_report_count >= self.interval;
        let due_by_stall = self.last_report_time.elapsed() >= self.stall_after;
        if due_by_count || due_by_stall {
            self.print_progress(stats, current_directory);
            self.last_report_count = stats.files_scanned;
            self.last_report_time = Instant::now();
        }
    }

    pub fn report_resume(&self, files: u64, directories: u64) {
        println!("Previous progress: {files} files in {directories} directories");
        println!("Skipping {directories} completed directories...");
    }

    pub fn report_completion(&self, stats: &ScanStats) {
        println!(
            "\nScan complete: {} files in {} directories ({})",
            stats.files_scanned,
            stats.directories_scanned,
            format_duration(stats.elapsed())
        );
        println!("Total size: {}", format_bytes(stats.total_bytes));
    }

    pub fn report_interruption(&self, stats: &ScanStats) {
        println!(
            "\nScan interrupted. Progress saved. Run with --resume to continue.\n\
             Scanned: {} files in {} directories",
            stats.files_scanned, stats.directories_scanned
        );
    }

    fn print_progress(&self, stats: &ScanStats, current_directory: &str) {
        let display_dir = if current_directory.is_empty() {
            "/"
        } else {
            current_directory
        };
        eprintln!("[{} files] Scanning: {display_dir}/", stats.files_scanned);
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

pub fn format_bytes(size: u64) -> String {
    let mut size_f = size as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size_f < 1024.0 {
            return format!("{size_f:.2} {unit}");
        }
        size_f /= 1024.0;
    }
    format!("{size_f:.2} PB")
}
