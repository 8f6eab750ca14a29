use crate::error::{PupilError, Result};
use crate::readers::SignalFields;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters of a flat-file build.
///
/// Every field has a default so a JSON config file only needs the values
/// it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the per-run eye-tracking files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Behavioral trial table (CSV)
    #[serde(default = "default_behavioral_csv")]
    pub behavioral_csv: PathBuf,

    /// Directory the flat CSV files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Sampling rate of the recorded signal (Hz)
    #[serde(default = "default_original_rate")]
    pub original_rate: u32,

    /// Sampling rate of the flat files (Hz); must divide `original_rate`
    #[serde(default = "default_target_rate")]
    pub target_rate: u32,

    /// Order of the anti-aliasing filter
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,

    /// Letters preceding the numeric subject id, e.g. "BAP" in BAP178
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Glob (relative to `data_dir`) selecting run files
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Dotted path of the pupil sample array in run files
    #[serde(default = "default_sample_field")]
    pub sample_field: String,

    /// Dotted path of the timestamp array in run files
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_behavioral_csv() -> PathBuf {
    PathBuf::from("bap_trial_data_grip_type1.csv")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_original_rate() -> u32 {
    2000
}
fn default_target_rate() -> u32 {
    250
}
fn default_filter_order() -> usize {
    8
}
fn default_subject_prefix() -> String {
    "BAP".to_string()
}
fn default_file_pattern() -> String {
    "subject*_*_session*_run*_eyetrack_cleaned.*".to_string()
}
fn default_sample_field() -> String {
    "S.output.sample".to_string()
}
fn default_timestamp_field() -> String {
    "S.output.smp_timestamp".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            behavioral_csv: default_behavioral_csv(),
            output_dir: default_output_dir(),
            original_rate: default_original_rate(),
            target_rate: default_target_rate(),
            filter_order: default_filter_order(),
            subject_prefix: default_subject_prefix(),
            file_pattern: default_file_pattern(),
            sample_field: default_sample_field(),
            timestamp_field: default_timestamp_field(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PupilError::FileNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| {
            PupilError::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Check the parameters that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<()> {
        crate::downsample::decimation_factor(self.original_rate, self.target_rate)?;
        if self.filter_order == 0 {
            return Err(PupilError::InvalidConfig(
                "filter_order must be at least 1".to_string(),
            ));
        }
        if self.subject_prefix.is_empty() {
            return Err(PupilError::InvalidConfig(
                "subject_prefix must not be empty".to_string(),
            ));
        }
        if self.sample_field.is_empty() || self.timestamp_field.is_empty() {
            return Err(PupilError::InvalidConfig(
                "sample_field and timestamp_field must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn signal_fields(&self) -> SignalFields {
        SignalFields {
            sample: self.sample_field.clone(),
            timestamp: self.timestamp_field.clone(),
        }
    }

    /// Full subject label as it appears in the behavioral `sub` column.
    pub fn subject_label(&self, subject_id: &str) -> String {
        format!("{}{}", self.subject_prefix, subject_id)
    }
}
