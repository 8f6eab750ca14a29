use thiserror::Error;

#[derive(Error, Debug)]
pub enum PupilError {
    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Malformed run file {path}: {reason}")]
    MalformedSignal { path: String, reason: String },

    #[error("Failed to parse behavioral table: {0}")]
    BehavioralParse(String),

    #[error("No behavioral data for subject {0}")]
    NoBehavioralData(String),

    #[error("Invalid sampling rates: {0}")]
    InvalidRate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PupilError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        PupilError::MalformedSignal {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PupilError>;
