//! Structured output writer supporting JSON Lines and human-readable modes.
//!
//! Results go to stdout, one line per record, so a verification run can be
//! piped while still in progress. Errors go to stderr.

use serde::Serialize;

use crate::core::{ReconcileMode, ReconcileSummary, Resolution, Verdict};

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Structured output writer that supports both human-readable and JSON output
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputMode,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            mode: if json { OutputMode::Json } else { OutputMode::Human },
        }
    }

    /// Render one verdict as a single line
    pub fn format_verdict(&self, verdict: &Verdict) -> String {
        match self.mode {
            OutputMode::Json => to_json_line(verdict),
            OutputMode::Human => match (&verdict.status, &verdict.detail) {
                (Some(status), None) => format!("{}\t{}", verdict.path, status),
                (Some(status), Some(detail)) => {
                    format!("{}\t{}\t{}", verdict.path, status, sanitize_error(detail))
                }
                (None, detail) => format!(
                    "{}\tinconclusive\t{}",
                    verdict.path,
                    sanitize_error(detail.as_deref().unwrap_or(""))
                ),
            },
        }
    }

    pub fn verdict(&self, verdict: &Verdict) {
        println!("{}", self.format_verdict(verdict));
    }

    /// Render a summary of a finished run
    pub fn format_summary(&self, mode: ReconcileMode, summary: &ReconcileSummary) -> String {
        match self.mode {
            OutputMode::Json => to_json_line(&SummaryRecord {
                record: "summary",
                mode,
                summary,
            }),
            OutputMode::Human => match mode {
                ReconcileMode::Storage => format!(
                    "{} file(s): {} in storage, {} missing, {} inconclusive",
                    summary.total,
                    summary.exists_in_storage,
                    summary.missing_in_storage,
                    summary.inconclusive
                ),
                ReconcileMode::Checksum => format!(
                    "{} file(s): {} verified, {} absent",
                    summary.total, summary.checksum_verified, summary.checksum_absent
                ),
            },
        }
    }

    pub fn summary(&self, mode: ReconcileMode, summary: &ReconcileSummary) {
        println!("{}", self.format_summary(mode, summary));
    }

    /// Render a resolution: one JSON object, or a labelled block of lines
    pub fn format_resolution(&self, resolution: &Resolution) -> String {
        match self.mode {
            OutputMode::Json => to_json_line(resolution),
            OutputMode::Human => {
                let mut lines = vec![format!("root: {}", resolution.root)];
                if !resolution.folders.is_empty() {
                    lines.push(format!("folders: {}", resolution.folders.join(", ")));
                }
                lines.push(format!("accessions: {}", resolution.accessions.join(", ")));
                if !resolution.schemas.is_empty() {
                    lines.push(format!("schemas: {}", resolution.schemas.join(", ")));
                }
                lines.push(format!("files ({}):", resolution.files.len()));
                lines.extend(resolution.files.iter().map(|f| format!("  {}", f.path)));
                lines.join("\n")
            }
        }
    }

    pub fn resolution(&self, resolution: &Resolution) {
        println!("{}", self.format_resolution(resolution));
    }

    /// Print a plain list under a key (folders of a user and the like)
    pub fn list(&self, key: &str, items: &[String]) {
        match self.mode {
            OutputMode::Json => {
                let mut record = serde_json::Map::new();
                record.insert(key.to_string(), serde_json::json!(items));
                println!("{}", to_json_line(&record));
            }
            OutputMode::Human => {
                for item in items {
                    println!("{}", item);
                }
            }
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        match self.mode {
            OutputMode::Json => {
                let record = serde_json::json!({ "record": "error", "error": sanitize_error(msg) });
                eprintln!("{}", to_json_line(&record));
            }
            OutputMode::Human => {
                eprintln!("Error: {}", sanitize_error(msg));
            }
        }
    }
}

#[derive(Serialize)]
struct SummaryRecord<'a> {
    record: &'static str,
    mode: ReconcileMode,
    #[serde(flatten)]
    summary: &'a ReconcileSummary,
}

fn to_json_line<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FileRef, Root, VerdictStatus};

    #[test]
    fn test_sanitize_error_mixed() {
        assert_eq!(
            sanitize_error("  error:\n  detail\t  info  \n"),
            "error: detail info"
        );
        assert_eq!(sanitize_error(""), "");
    }

    #[test]
    fn test_human_verdict_lines() {
        let writer = OutputWriter::new(false);
        assert_eq!(
            writer.format_verdict(&Verdict::new("x.bam", VerdictStatus::ExistsInStorage)),
            "x.bam\texists-in-storage"
        );
        assert_eq!(
            writer.format_verdict(&Verdict::inconclusive("y.bam", "connection\nreset")),
            "y.bam\tinconclusive\tconnection reset"
        );
    }

    #[test]
    fn test_json_verdict_line() {
        let writer = OutputWriter::new(true);
        let line = writer.format_verdict(&Verdict::new("x.bam", VerdictStatus::MissingInStorage));
        assert_eq!(line, r#"{"path":"x.bam","status":"MissingInStorage"}"#);
    }

    #[test]
    fn test_json_summary_is_flat() {
        let writer = OutputWriter::new(true);
        let mut summary = ReconcileSummary::default();
        summary.record(&Verdict::new("a", VerdictStatus::ChecksumVerified));

        let line = writer.format_summary(ReconcileMode::Checksum, &summary);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["record"], "summary");
        assert_eq!(value["mode"], "checksum");
        assert_eq!(value["checksum_verified"], 1);
    }

    #[test]
    fn test_human_resolution() {
        let writer = OutputWriter::new(false);
        let resolution = Resolution {
            root: Root::Accession("a1".to_string()),
            folders: Vec::new(),
            accessions: vec!["a1".to_string()],
            schemas: Vec::new(),
            files: vec![FileRef::new("x.bam")],
            errors: Vec::new(),
        };

        assert_eq!(
            writer.format_resolution(&resolution),
            "root: accession a1\naccessions: a1\nfiles (1):\n  x.bam"
        );
    }

    #[test]
    fn test_json_resolution_tags_root() {
        let writer = OutputWriter::new(true);
        let resolution = Resolution {
            root: Root::User("u1".to_string()),
            folders: vec!["f1".to_string()],
            accessions: Vec::new(),
            schemas: Vec::new(),
            files: Vec::new(),
            errors: Vec::new(),
        };

        let value: serde_json::Value =
            serde_json::from_str(&writer.format_resolution(&resolution)).unwrap();
        assert_eq!(value["root"]["kind"], "user");
        assert_eq!(value["root"]["id"], "u1");
    }
}
