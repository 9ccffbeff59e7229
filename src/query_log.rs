//! Append-only JSONL audit log of every query.
//!
//! One JSON object per line. Each entry is written with a single `write_all`
//! on a file opened in append mode, so an interrupted process leaves at most
//! a truncated final line and never interleaves two entries. The next append
//! terminates such a line first, and readers skip truncated records.

use crate::error::{Result, ScreenragError};
use crate::retrieval::{Outcome, RetrievedChunk};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Evidence reference stored with a log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedChunk {
    pub film: String,
    pub heading: String,
    /// Similarity rounded to 4 decimals.
    pub similarity: f32,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub query: String,
    pub outcome: Outcome,
    /// Best neighbour similarity, `null` when the index returned none.
    pub top_similarity: Option<f32>,
    /// Retrieved chunks in similarity-descending order.
    pub chunks_retrieved: Vec<LoggedChunk>,
    /// Final (or partial, when aborted) answer; `null` when rejected.
    pub answer: Option<String>,
}

impl LogEntry {
    /// Build an entry stamped with the current local time.
    pub fn new(
        query: &str,
        outcome: Outcome,
        top_similarity: Option<f32>,
        chunks: &[RetrievedChunk],
        answer: Option<String>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            query: query.to_string(),
            outcome,
            top_similarity,
            chunks_retrieved: chunks
                .iter()
                .map(|c| LoggedChunk {
                    film: c.film.clone(),
                    heading: c.heading.clone(),
                    similarity: round4(c.similarity),
                })
                .collect(),
            answer,
        }
    }
}

fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

/// Counts of logged queries by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub total: usize,
    pub answered: usize,
    pub rejected_no_chunks: usize,
    pub rejected_low_similarity: usize,
    pub aborted: usize,
}

impl LogSummary {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        for entry in entries {
            match entry.outcome {
                Outcome::Answered => summary.answered += 1,
                Outcome::RejectedNoChunks => summary.rejected_no_chunks += 1,
                Outcome::RejectedLowSimilarity => summary.rejected_low_similarity += 1,
                Outcome::Aborted => summary.aborted += 1,
            }
        }
        summary
    }

    /// All gate rejections.
    pub fn rejected(&self) -> usize {
        self.rejected_no_chunks + self.rejected_low_similarity
    }
}

/// The query log file.
#[derive(Debug, Clone)]
pub struct QueryLog {
    path: PathBuf,
}

impl QueryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line.
    #[instrument(skip_all, fields(outcome = %entry.outcome))]
    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        if has_unterminated_line(&mut file)? {
            warn!("{} ends with a truncated record", self.path.display());
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes())?;

        debug!("Logged query to {}", self.path.display());
        Ok(())
    }

    /// Read every entry. A missing log file reads as empty.
    ///
    /// Records cut short by an interrupted write are skipped with a warning;
    /// any other malformed line is an error.
    pub fn read_entries(&self) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) if e.is_eof() => {
                    warn!("Skipping truncated record at {} line {}", self.path.display(), i + 1);
                }
                Err(e) => {
                    return Err(ScreenragError::QueryLog(format!(
                        "{} line {}: {}",
                        self.path.display(),
                        i + 1,
                        e
                    )))
                }
            }
        }
        Ok(entries)
    }

    /// Summarize the log by outcome.
    pub fn summary(&self) -> Result<LogSummary> {
        Ok(LogSummary::from_entries(&self.read_entries()?))
    }
}

/// Whether the file is non-empty and its last byte is not a newline.
fn has_unterminated_line(file: &mut File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn retrieved(similarity: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: "3".to_string(),
            text: "HAN: Here's where the fun begins.".to_string(),
            film: "A New Hope".to_string(),
            scene_id: 40,
            heading: "INT. MILLENNIUM FALCON - COCKPIT".to_string(),
            similarity,
        }
    }

    #[test]
    fn test_entry_rounds_chunk_similarity() {
        let entry = LogEntry::new(
            "Who flies the Falcon?",
            Outcome::Answered,
            Some(0.812_345),
            &[retrieved(0.812_345)],
            Some("Han Solo.".to_string()),
        );
        assert_eq!(entry.chunks_retrieved[0].similarity, 0.8123);
        assert_eq!(entry.top_similarity, Some(0.812_345));
    }

    #[test]
    fn test_rejected_entry_serializes_nulls() {
        let entry = LogEntry::new("Who is Thrawn?", Outcome::RejectedNoChunks, None, &[], None);
        let value: serde_json::Value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["outcome"], "rejected_no_chunks");
        assert!(value["top_similarity"].is_null());
        assert!(value["answer"].is_null());
        assert_eq!(value["chunks_retrieved"], serde_json::json!([]));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_append_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let log = QueryLog::new(dir.path().join("logs").join("query_log.jsonl"));

        assert_ok!(log.append(&LogEntry::new(
            "multi\nline query",
            Outcome::Answered,
            Some(0.9),
            &[retrieved(0.9)],
            Some("Line one.\nLine two.".to_string()),
        )));
        assert_ok!(log.append(&LogEntry::new(
            "Who is Thrawn?",
            Outcome::RejectedLowSimilarity,
            Some(0.3),
            &[retrieved(0.3)],
            None,
        )));

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));

        let entries = log.read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].query, "multi\nline query");
        assert_eq!(entries[1].outcome, Outcome::RejectedLowSimilarity);
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let log = QueryLog::new(dir.path().join("query_log.jsonl"));
        assert_eq!(log.summary().unwrap(), LogSummary::default());

        for outcome in [
            Outcome::Answered,
            Outcome::Answered,
            Outcome::RejectedNoChunks,
            Outcome::RejectedLowSimilarity,
            Outcome::Aborted,
        ] {
            log.append(&LogEntry::new("q", outcome, None, &[], None)).unwrap();
        }

        let summary = log.summary().unwrap();
        assert_eq!(summary.total, 5);
        assert_eq!(summary.answered, 2);
        assert_eq!(summary.rejected(), 2);
        assert_eq!(summary.aborted, 1);
    }

    #[test]
    fn test_append_after_interrupted_write() {
        let dir = tempfile::tempdir().unwrap();
        let log = QueryLog::new(dir.path().join("query_log.jsonl"));

        assert_ok!(log.append(&LogEntry::new("Who shot first?", Outcome::Answered, Some(0.7), &[], None)));
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(br#"{"timestamp":"2026"#).unwrap();
        drop(file);
        assert_ok!(log.append(&LogEntry::new("Who is Thrawn?", Outcome::RejectedNoChunks, None, &[], None)));

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 3);

        let entries = log.read_entries().unwrap();
        let queries: Vec<&str> = entries.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["Who shot first?", "Who is Thrawn?"]);
        assert_eq!(log.summary().unwrap().total, 2);
    }

    #[test]
    fn test_truncated_final_line_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let log = QueryLog::new(dir.path().join("query_log.jsonl"));

        assert_ok!(log.append(&LogEntry::new("Who shot first?", Outcome::Answered, None, &[], None)));
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        file.write_all(br#"{"timestamp":"2026-10-16T10:00:00+02:00","query":"Where"#).unwrap();
        drop(file);

        let entries = log.read_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].query, "Who shot first?");
    }

    #[test]
    fn test_malformed_line_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query_log.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let result = QueryLog::new(&path).read_entries();
        assert!(matches!(result, Err(ScreenragError::QueryLog(_))));
    }
}
