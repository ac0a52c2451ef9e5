//! Human-readable build transcript.
//!
//! Every notable orchestrator event is appended to `RALPH_LITE_LOG.md` in the build
//! directory as `## [YYYY-mm-dd HH:MM:SS] EVENT` followed by free-form details.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const JOURNAL_FILE: &str = "RALPH_LITE_LOG.md";

#[derive(Debug, Clone)]
pub struct BuildJournal {
    path: PathBuf,
}

impl BuildJournal {
    pub fn new(build_dir: &Path) -> Self {
        Self {
            path: build_dir.join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event entry.
    pub fn record(&self, event: &str, details: &str) -> Result<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!("\n## [{}] {}\n{}\n", timestamp, event, details);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;
        file.write_all(entry.as_bytes())
            .with_context(|| format!("Failed to append to journal: {}", self.path.display()))
    }

    /// Like `record`, but a write failure is logged instead of returned.
    pub fn note(&self, event: &str, details: &str) {
        if let Err(e) = self.record(event, details) {
            tracing::warn!(error = %e, event, "Journal write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_appends_entries() {
        let dir = tempdir().unwrap();
        let journal = BuildJournal::new(dir.path());
        journal.record("PHASE 1 START", "Interview phase").unwrap();
        journal.record("Question answered", "Q: a\nA: b").unwrap();

        let content = std::fs::read_to_string(journal.path()).unwrap();
        let first = content.find("PHASE 1 START").unwrap();
        let second = content.find("Question answered").unwrap();
        assert!(first < second);
        assert!(content.contains("\nInterview phase\n"));
        assert_eq!(content.matches("\n## [").count(), 2);
    }

    #[test]
    fn test_note_swallows_errors() {
        let dir = tempdir().unwrap();
        let journal = BuildJournal::new(&dir.path().join("missing-dir"));
        journal.note("EVENT", "details");
        assert!(!journal.path().exists());
    }
}
