//! Structured run reports.
//!
//! Every run carries a report from creation to its terminal state. Stages
//! append severity-tagged entries in execution order; the report is never
//! null and never truncated, so a FAILED run keeps the diagnostics from the
//! stages that did complete.

use serde::{Deserialize, Serialize};

/// Severity of one report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One severity-tagged line of a run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub severity: Severity,
    pub message: String,
}

/// Stage-concatenable run report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.entries.push(ReportEntry {
            severity,
            message: message.into(),
        });
    }

    /// Append another report's entries after this one's, preserving order.
    pub fn extend(&mut self, other: RunReport) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any entry is an error.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_keep_append_order() {
        let mut report = RunReport::new();
        report.info("first");
        report.warning("second");
        report.error("third");
        let messages: Vec<&str> = report.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn extend_concatenates_in_stage_order() {
        let mut load_report = RunReport::new();
        load_report.info("loaded 50 people");
        let mut select_report = RunReport::new();
        select_report.info("panel found");

        let mut combined = RunReport::new();
        combined.extend(load_report);
        combined.extend(select_report);
        assert_eq!(combined.entries.len(), 2);
        assert_eq!(combined.entries[0].message, "loaded 50 people");
        assert_eq!(combined.entries[1].message, "panel found");
    }

    #[test]
    fn has_errors_detects_error_entries() {
        let mut report = RunReport::new();
        report.info("ok");
        assert!(!report.has_errors());
        report.error("boom");
        assert!(report.has_errors());
    }

    #[test]
    fn serializes_with_severity_tags() {
        let mut report = RunReport::new();
        report.warning("two people share an address");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["entries"][0]["severity"], "warning");
    }
}
