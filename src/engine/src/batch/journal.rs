//! Append-only journal of failed images.
//!
//! Opened lazily on the first failure of a run; the filename is fixed at
//! construction so the path can be embedded in the returned error. The
//! worker never deletes the journal; its lifecycle belongs to the caller.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use airlift_core::Result;

use crate::schema::MirrorErrorRecord;

/// The note written for every cascaded bundle skip. Also matched by
/// operators grepping the journal, so the wording is load-bearing.
pub fn skipping_message(reference: &str) -> String {
    format!(
        "skipping image {reference} because it belongs to an operator bundle whose related image failed"
    )
}

/// Per-run failure journal.
pub struct FailureJournal {
    path: PathBuf,
    file: Option<File>,
}

impl FailureJournal {
    /// Decide the journal path under `root`; nothing is written until the
    /// first record.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let filename = format!(
            "mirroring_errors_{}.txt",
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        );
        Self {
            path: root.into().join(filename),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether anything has been written yet.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Append one failure, followed by a skip note per cascaded bundle.
    pub fn record_failure(&mut self, record: &MirrorErrorRecord) -> Result<()> {
        let file = self.open()?;
        writeln!(
            file,
            "error mirroring image {} ({}): {}",
            record.image.source, record.image.kind, record.cause
        )?;
        for reference in &record.cascaded_skips {
            writeln!(file, "{}", skipping_message(reference))?;
        }
        file.flush()?;
        Ok(())
    }

    /// Append a standalone skip note for an image dropped by the cascade.
    pub fn note_skip(&mut self, reference: &str) -> Result<()> {
        let file = self.open()?;
        writeln!(file, "{}", skipping_message(reference))?;
        file.flush()?;
        Ok(())
    }

    fn open(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        // The option was just filled.
        Ok(self.file.as_mut().expect("journal file is open"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CopyImageSchema, ImageKind};
    use tempfile::TempDir;

    fn record(cascades: Vec<String>) -> MirrorErrorRecord {
        MirrorErrorRecord {
            image: CopyImageSchema {
                source: "docker://registry.example.com/ns/related:1".to_string(),
                destination: "docker://dest.example.com/ns/related:1".to_string(),
                origin: "docker://registry.example.com/ns/related:1".to_string(),
                kind: ImageKind::OperatorRelatedImage,
            },
            cause: "registry error (unauthorized): unauthorized".to_string(),
            cascaded_skips: cascades,
        }
    }

    #[test]
    fn test_nothing_written_before_first_failure() {
        let tmp = TempDir::new().unwrap();
        let journal = FailureJournal::new(tmp.path());
        assert!(!journal.is_open());
        assert!(!journal.path().exists());
    }

    #[test]
    fn test_records_are_appended() {
        let tmp = TempDir::new().unwrap();
        let mut journal = FailureJournal::new(tmp.path());

        journal.record_failure(&record(vec![])).unwrap();
        journal.record_failure(&record(vec![])).unwrap();
        assert!(journal.is_open());

        let content = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("error mirroring image"));
        assert!(content.contains("unauthorized"));
    }

    #[test]
    fn test_cascade_notes_follow_the_failure() {
        let tmp = TempDir::new().unwrap();
        let mut journal = FailureJournal::new(tmp.path());

        journal
            .record_failure(&record(vec!["registry.example.com/ns/bundle:1".to_string()]))
            .unwrap();

        let content = std::fs::read_to_string(journal.path()).unwrap();
        assert!(content.contains(&skipping_message("registry.example.com/ns/bundle:1")));
    }

    #[test]
    fn test_standalone_skip_note() {
        let tmp = TempDir::new().unwrap();
        let mut journal = FailureJournal::new(tmp.path());
        journal.note_skip("registry.example.com/ns/bundle:1").unwrap();

        let content = std::fs::read_to_string(journal.path()).unwrap();
        assert!(content.starts_with("skipping image registry.example.com/ns/bundle:1"));
    }

    #[test]
    fn test_filename_carries_timestamp() {
        let tmp = TempDir::new().unwrap();
        let journal = FailureJournal::new(tmp.path());
        let name = journal.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("mirroring_errors_"));
        assert!(name.ends_with(".txt"));
    }
}
