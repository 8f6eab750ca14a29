use super::{RunSignalReader, SignalFields, VariableInfo};
use crate::error::{PupilError, Result};
use crate::types::RunSignal;
use std::path::{Path, PathBuf};

/// CSV Run File Reader
///
/// One row per sample; the sample and timestamp arrays are the columns
/// named by [`SignalFields`]. Empty cells and `NA`/`NaN` read as NaN,
/// which decimation treats as dropout.
pub struct CsvSignalReader {
    path: PathBuf,
    fields: SignalFields,
    headers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl CsvSignalReader {
    pub fn new(path: &Path, fields: SignalFields) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut columns = vec![Vec::new(); headers.len()];

        for (i, record) in reader.records().enumerate() {
            let record = record?;
            for (col, cell) in record.iter().enumerate().take(headers.len()) {
                let value = parse_cell(cell).ok_or_else(|| {
                    PupilError::malformed(
                        path.display().to_string(),
                        format!("line {}, column '{}': '{}' is not a number", i + 2, headers[col], cell),
                    )
                })?;
                columns[col].push(value);
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            fields,
            headers,
            columns,
        })
    }

    /// Column named `name`, or failing that its last dotted segment.
    fn column(&self, name: &str) -> Result<&[f64]> {
        let short = name.rsplit('.').next().unwrap_or(name);
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| h == short))
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| {
                PupilError::malformed(
                    self.path.display().to_string(),
                    format!(
                        "column '{}' not found (columns: {})",
                        name,
                        self.headers.join(", ")
                    ),
                )
            })
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    match cell {
        "" | "NA" | "NaN" | "nan" => Some(f64::NAN),
        other => other.parse::<f64>().ok(),
    }
}

impl RunSignalReader for CsvSignalReader {
    fn read_signal(&self, sample_rate: u32) -> Result<RunSignal> {
        let samples = self.column(&self.fields.sample)?.to_vec();
        let timestamps = self.column(&self.fields.timestamp)?.to_vec();
        RunSignal::new(samples, timestamps, sample_rate)
    }

    fn variables(&self) -> Vec<VariableInfo> {
        self.headers
            .iter()
            .zip(&self.columns)
            .map(|(name, values)| VariableInfo::new(name, vec![values.len(), 1], "double"))
            .collect()
    }

    fn format_name(&self) -> &str {
        "CSV"
    }
}
