//! Run signal readers
//!
//! A run file yields two parallel arrays: pupil samples and their
//! timestamps. Each supported container format implements
//! [`RunSignalReader`]; [`SignalReaderFactory`] picks one by extension.

use crate::error::{PupilError, Result};
use crate::types::RunSignal;
use serde::Serialize;
use std::path::Path;

pub mod csv_reader;
pub mod mat5;
pub mod mat_reader;

pub use csv_reader::CsvSignalReader;
pub use mat_reader::MatSignalReader;

/// Words that mark a run-file variable as timing-related.
///
/// Behavioral CSV headers use their own list,
/// [`crate::behavioral::HEADER_TIMING_WORDS`].
pub const VARIABLE_TIMING_WORDS: &[&str] = &["time", "event", "message", "trial"];

/// Names of the two arrays a run file must provide.
///
/// Names are dotted paths into a MAT file's struct hierarchy, e.g.
/// `S.output.sample`. CSV readers match a header equal to the full path
/// or to its last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFields {
    pub sample: String,
    pub timestamp: String,
}

impl Default for SignalFields {
    fn default() -> Self {
        Self {
            sample: "S.output.sample".to_string(),
            timestamp: "S.output.smp_timestamp".to_string(),
        }
    }
}

/// Description of one variable (or column) found in a run file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    pub dims: Vec<usize>,
    pub class: String,
    pub len: usize,
    pub timing_related: bool,
}

impl VariableInfo {
    pub fn new(name: &str, dims: Vec<usize>, class: &str) -> Self {
        let len = dims.iter().product();
        let lower = name.to_lowercase();
        Self {
            name: name.to_string(),
            dims,
            class: class.to_string(),
            len,
            timing_related: VARIABLE_TIMING_WORDS.iter().any(|w| lower.contains(w)),
        }
    }
}

/// Trait every run-file format implements
pub trait RunSignalReader {
    /// Load the sample and timestamp arrays, tagged with `sample_rate`.
    fn read_signal(&self, sample_rate: u32) -> Result<RunSignal>;

    /// Every variable the file exposes, for structure inspection
    fn variables(&self) -> Vec<VariableInfo>;

    /// Get the file format name (e.g., "MAT", "CSV")
    fn format_name(&self) -> &str;
}

/// Factory for creating signal readers based on file extension
pub struct SignalReaderFactory;

impl SignalReaderFactory {
    pub fn create_reader(path: &Path, fields: &SignalFields) -> Result<Box<dyn RunSignalReader>> {
        if !path.exists() {
            return Err(PupilError::FileNotFound(path.display().to_string()));
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match extension.to_lowercase().as_str() {
            "mat" => Ok(Box::new(MatSignalReader::new(path, fields.clone())?)),
            "csv" => Ok(Box::new(CsvSignalReader::new(path, fields.clone())?)),
            _ => Err(PupilError::UnsupportedFileType(format!(
                "Unsupported file extension '{}'. Supported: {}",
                extension,
                Self::supported_extensions().join(", ")
            ))),
        }
    }

    pub fn supported_extensions() -> Vec<&'static str> {
        vec!["mat", "csv"]
    }

    pub fn is_supported(path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            Self::supported_extensions().contains(&ext.to_lowercase().as_str())
        } else {
            false
        }
    }
}

/// What a run file contains, as reported by `inspect`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileStructure {
    pub path: String,
    pub format: String,
    pub variables: Vec<VariableInfo>,
}

impl FileStructure {
    pub fn timing_variables(&self) -> impl Iterator<Item = &VariableInfo> {
        self.variables.iter().filter(|v| v.timing_related)
    }
}

pub fn inspect_file(path: &Path, fields: &SignalFields) -> Result<FileStructure> {
    let reader = SignalReaderFactory::create_reader(path, fields)?;
    Ok(FileStructure {
        path: path.display().to_string(),
        format: reader.format_name().to_string(),
        variables: reader.variables(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        assert!(SignalReaderFactory::is_supported(Path::new("run.mat")));
        assert!(SignalReaderFactory::is_supported(Path::new("run.CSV")));
        assert!(!SignalReaderFactory::is_supported(Path::new("run.edf")));
        assert!(!SignalReaderFactory::is_supported(Path::new("run")));
    }

    #[test]
    fn test_create_reader_errors() {
        let missing = SignalReaderFactory::create_reader(
            Path::new("/nonexistent_dir_12345/run.mat"),
            &SignalFields::default(),
        );
        assert!(matches!(missing, Err(PupilError::FileNotFound(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.edf");
        std::fs::write(&path, "").unwrap();
        let unsupported = SignalReaderFactory::create_reader(&path, &SignalFields::default());
        assert!(matches!(unsupported, Err(PupilError::UnsupportedFileType(_))));
    }

    #[test]
    fn test_variable_info_flags_timing_names() {
        let info = VariableInfo::new("smp_timestamp", vec![1, 40], "double");
        assert!(info.timing_related);
        assert_eq!(info.len, 40);
        assert!(!VariableInfo::new("sample", vec![1, 40], "double").timing_related);
    }

    #[test]
    fn test_inspect_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.mat");
        std::fs::write(
            &path,
            mat_reader::tests::mat_v5(&[("sample", &[1.0, 2.0]), ("event_time", &[0.5])]),
        )
        .unwrap();

        let structure = inspect_file(&path, &SignalFields::default()).unwrap();
        assert_eq!(structure.format, "MAT");
        assert_eq!(structure.variables.len(), 2);
        let timing: Vec<&str> = structure.timing_variables().map(|v| v.name.as_str()).collect();
        assert_eq!(timing, vec!["event_time"]);
    }
}
