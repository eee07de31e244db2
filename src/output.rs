use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::batch::{ProgressEvent, ProgressSink};
use crate::domain::{BatchReport, CategoryFailure, CategoryId, Record};
use crate::store::SnapshotPaths;

#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary<'a> {
    pub records: usize,
    pub completed: &'a BTreeMap<CategoryId, usize>,
    pub failures: &'a BTreeMap<CategoryId, CategoryFailure>,
    pub started_at: &'a str,
    pub finished_at: &'a str,
    pub goods: Option<usize>,
    pub skipped_rows: Option<usize>,
    pub snapshot: Option<SnapshotPaths>,
}

impl<'a> FetchSummary<'a> {
    pub fn new(report: &'a BatchReport) -> Self {
        Self {
            records: report.records.len(),
            completed: &report.record_counts,
            failures: &report.failures,
            started_at: &report.started_at,
            finished_at: &report.finished_at,
            goods: None,
            skipped_rows: None,
            snapshot: None,
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &FetchSummary<'_>) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_records(records: &[Record]) -> io::Result<()> {
        Self::print_json(&records)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
