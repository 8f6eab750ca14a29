use crate::error::{PupilError, Result};
use crate::types::{BehavioralTrial, TaskCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Header words that mark a behavioral column as timing-related.
///
/// The behavioral table describes trial timing with onset/duration style
/// column names. Run-file variables are matched against a different list
/// (see `readers::VARIABLE_TIMING_WORDS`), since eye-tracker exports name
/// their timing data after events and messages instead.
pub const HEADER_TIMING_WORDS: &[&str] = &["time", "start", "end", "duration", "onset"];

/// Columns every row needs to be placed in a run
const KEY_COLUMNS: [&str; 5] = ["sub", "ses", "task", "run", "trial"];

/// The behavioral trial table as loaded from CSV
#[derive(Debug, Clone, Default)]
pub struct BehavioralTable {
    pub headers: Vec<String>,
    pub rows: Vec<BehavioralTrial>,
    /// Rows left out because a key cell could not be parsed
    pub skipped_rows: usize,
}

impl BehavioralTable {
    /// Load the table. A missing file is fatal for the whole batch, so it
    /// gets its own error variant.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PupilError::FileNotFound(path.display().to_string()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(path)?;
        Self::from_reader(&mut reader)
    }

    /// Parse the table. A missing key column fails the whole table; a row
    /// whose key cells do not parse (e.g. `trial` = `NA`) is skipped with a
    /// warning.
    pub fn from_reader<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<Self> {
        let header_record = reader.headers()?.clone();
        let headers: Vec<String> = header_record.iter().map(str::to_string).collect();
        if let Some(missing) = KEY_COLUMNS
            .iter()
            .find(|key| !headers.iter().any(|h| h == *key))
        {
            return Err(PupilError::BehavioralParse(format!(
                "missing column '{}'",
                missing
            )));
        }

        let mut rows = Vec::new();
        let mut skipped_rows = 0;
        for (i, record) in reader.records().enumerate() {
            // Line 1 is the header
            let line = i + 2;
            let parsed = match record {
                Ok(record) => record
                    .deserialize::<BehavioralTrial>(Some(&header_record))
                    .map_err(|e| e.to_string()),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => Err(e.to_string()),
            };
            match parsed {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    log::warn!("Skipping behavioral line {}: {}", line, reason);
                    skipped_rows += 1;
                }
            }
        }
        log::info!(
            "Loaded {} behavioral trials ({} skipped)",
            rows.len(),
            skipped_rows
        );
        Ok(Self {
            headers,
            rows,
            skipped_rows,
        })
    }

    /// Rows of one subject, e.g. "BAP178"
    pub fn for_subject(&self, subject_label: &str) -> Vec<BehavioralTrial> {
        self.rows
            .iter()
            .filter(|row| row.sub == subject_label)
            .cloned()
            .collect()
    }

    /// Column names that look like trial timing information
    pub fn timing_columns(&self) -> Vec<String> {
        self.headers
            .iter()
            .filter(|h| {
                let lower = h.to_lowercase();
                HEADER_TIMING_WORDS.iter().any(|w| lower.contains(w))
            })
            .cloned()
            .collect()
    }
}

/// Rows of one task, session and run, in table order.
pub fn rows_for_run(
    rows: &[BehavioralTrial],
    task: TaskCode,
    session: u32,
    run: u32,
) -> Vec<BehavioralTrial> {
    rows.iter()
        .filter(|row| {
            row.task == task.behavioral_task() && row.ses == session && row.run == run
        })
        .cloned()
        .collect()
}

/// Trial counts of one subject, grouped a few ways
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BehavioralSummary {
    pub subject: String,
    pub total_trials: usize,
    pub by_task: BTreeMap<String, usize>,
    pub by_session: BTreeMap<u32, usize>,
    pub by_run: BTreeMap<u32, usize>,
    pub timing_columns: Vec<String>,
    /// Unparseable rows in the whole table, any subject
    pub skipped_rows: usize,
}

pub fn summarize(table: &BehavioralTable, subject_label: &str) -> BehavioralSummary {
    let rows = table.for_subject(subject_label);
    let mut summary = BehavioralSummary {
        subject: subject_label.to_string(),
        total_trials: rows.len(),
        timing_columns: table.timing_columns(),
        skipped_rows: table.skipped_rows,
        ..BehavioralSummary::default()
    };
    for row in &rows {
        *summary.by_task.entry(row.task.clone()).or_insert(0) += 1;
        *summary.by_session.entry(row.ses).or_insert(0) += 1;
        *summary.by_run.entry(row.run).or_insert(0) += 1;
    }
    summary
}
