//! exiftool subprocess wrapper.
//!
//! Invocation contract: `exiftool -json -struct -G0 -n -c "%.6f" <paths…>`,
//! output one JSON array with group-0 tag prefixes, numeric values, and GPS
//! as signed decimal degrees. The version is probed once with `-ver`; a
//! missing binary is fatal for the whole stage.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const EXIFTOOL_BIN: &str = "exiftool";
const EXIFTOOL_ARGS: [&str; 6] = ["-json", "-struct", "-G0", "-n", "-c", "%.6f"];

/// Result for one input file: parsed tags or a per-file error.
#[derive(Debug, Clone)]
pub struct ExiftoolResult {
    pub source_file: String,
    pub metadata: serde_json::Map<String, Value>,
    pub error: Option<String>,
}

impl ExiftoolResult {
    fn failed(source_file: &str, error: impl Into<String>) -> Self {
        Self {
            source_file: source_file.to_string(),
            metadata: serde_json::Map::new(),
            error: Some(error.into()),
        }
    }
}

pub struct ExiftoolRunner {
    pub version: String,
    batch_timeout: Duration,
}

impl ExiftoolRunner {
    /// Probe the tool and capture its version. Fails with one actionable
    /// message when the binary is absent.
    pub fn new(batch_timeout: Duration) -> Result<Self> {
        let output = Command::new(EXIFTOOL_BIN)
            .arg("-ver")
            .output()
            .map_err(|_| {
                anyhow!(
                    "exiftool is required but not found.\n\
                     Please install exiftool: https://exiftool.org/install.html"
                )
            })?;
        if !output.status.success() {
            return Err(anyhow!("exiftool -ver failed; broken installation?"));
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            version,
            batch_timeout,
        })
    }

    #[cfg(test)]
    pub(crate) fn fake(version: &str) -> Self {
        Self {
            version: version.to_string(),
            batch_timeout: Duration::from_secs(1),
        }
    }

    /// Extract metadata for a batch of absolute paths, one subprocess for the
    /// whole group. A batch-level failure (crash, timeout after one retry,
    /// unparseable output) drops to single-file invocations so every file
    /// still gets its own outcome.
    pub fn extract_batch(&self, paths: &[String]) -> Vec<ExiftoolResult> {
        if paths.is_empty() {
            return Vec::new();
        }

        match self.run_once_with_retry(paths) {
            Ok(results) => results,
            Err(batch_error) => {
                warn!(error = %batch_error, files = paths.len(),
                      "batch extraction failed, falling back to single files");
                paths
                    .iter()
                    .map(|path| match self.run_json(std::slice::from_ref(path)) {
                        Ok(mut values) => match values.pop() {
                            Some(metadata) => ExiftoolResult {
                                source_file: path.clone(),
                                metadata,
                                error: None,
                            },
                            None => ExiftoolResult::failed(path, "No output from exiftool"),
                        },
                        Err(e) => ExiftoolResult::failed(path, format!("{e:#}")),
                    })
                    .collect()
            }
        }
    }

    fn run_once_with_retry(&self, paths: &[String]) -> Result<Vec<ExiftoolResult>> {
        let values = match self.run_json(paths) {
            Ok(values) => values,
            Err(first) => {
                debug!(error = %first, "batch attempt failed, retrying once");
                self.run_json(paths)?
            }
        };

        let mut by_source: std::collections::HashMap<String, serde_json::Map<String, Value>> =
            values
                .into_iter()
                .filter_map(|m| {
                    let source = m.get("SourceFile")?.as_str()?.to_string();
                    Some((source, m))
                })
                .collect();

        Ok(paths
            .iter()
            .map(|path| match by_source.remove(path) {
                Some(metadata) => ExiftoolResult {
                    source_file: path.clone(),
                    metadata,
                    error: None,
                },
                None => ExiftoolResult::failed(path, "No exiftool result"),
            })
            .collect())
    }

    /// One subprocess run under the batch deadline. exiftool exits 1 when
    /// some files had errors; that still produces usable JSON.
    fn run_json(&self, paths: &[String]) -> Result<Vec<serde_json::Map<String, Value>>> {
        let mut child = Command::new(EXIFTOOL_BIN)
            .args(EXIFTOOL_ARGS)
            .args(paths)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to spawn exiftool: {e}"))?;

        // Drain the pipes on threads; a large batch overflows the pipe
        // buffer long before the child exits.
        let mut stdout_pipe = child.stdout.take().expect("stdout is piped");
        let mut stderr_pipe = child.stderr.take().expect("stderr is piped");
        let stdout_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf);
            buf
        });
        let stderr_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf);
            buf
        });

        let deadline = Instant::now() + self.batch_timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_thread.join();
                    let _ = stderr_thread.join();
                    return Err(anyhow!(
                        "exiftool batch exceeded {}s deadline",
                        self.batch_timeout.as_secs()
                    ));
                }
                None => std::thread::sleep(Duration::from_millis(50)),
            }
        };

        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        match status.code() {
            Some(0) | Some(1) => {}
            _ => {
                return Err(anyhow!(
                    "exiftool exited abnormally: {}",
                    String::from_utf8_lossy(&stderr).trim()
                ));
            }
        }

        let text = String::from_utf8_lossy(&stdout);
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let parsed: Vec<serde_json::Map<String, Value>> =
            serde_json::from_str(text.as_ref()).map_err(|e| anyhow!("JSON parse error: {e}"))?;
        Ok(parsed)
    }
}
