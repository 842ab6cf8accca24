// Per-run publish results

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Skipped,
    Failed(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "uploaded"),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub outcome: Outcome,
}

/// Outcomes in manifest declaration order, then match order within a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    entries: Vec<ReportEntry>,
}

impl PublishReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, local_path: PathBuf, remote_key: String, outcome: Outcome) {
        self.entries.push(ReportEntry {
            local_path,
            remote_key,
            outcome,
        });
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Success))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}
