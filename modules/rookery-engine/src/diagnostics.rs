//! Injectable diagnostic sink.
//!
//! Page-dump-to-disk is a capability the caller hands to the driver, not
//! implicit file I/O inside the engine, so the engine stays side-effect-free
//! and testable in isolation.

use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, warn};

pub trait DiagnosticSink: Send + Sync {
    /// Called once per successful page fetch with the raw decoded tree,
    /// before extraction.
    fn page_snapshot(&self, page_no: u32, raw: &Value) {
        let _ = (page_no, raw);
    }

    /// Free-form diagnostic note (e.g. "page parsed but nothing matched").
    fn note(&self, message: &str) {
        let _ = message;
    }
}

/// Default sink: discards everything.
pub struct NoopSink;

impl DiagnosticSink for NoopSink {}

/// Writes each page's raw tree as pretty JSON into a directory, for
/// inspecting what the platform actually served when a recognizer misses.
pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl DiagnosticSink for DirSink {
    fn page_snapshot(&self, page_no: u32, raw: &Value) {
        let path = self.dir.join(format!("page_{page_no:03}.json"));
        match serde_json::to_string_pretty(raw) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!(path = %path.display(), error = %e, "Failed to write page snapshot");
                } else {
                    debug!(path = %path.display(), "Wrote page snapshot");
                }
            }
            Err(e) => warn!(page_no, error = %e, "Failed to serialize page snapshot"),
        }
    }

    fn note(&self, message: &str) {
        debug!(message, "Diagnostic note");
    }
}
