use crate::error::{PupilError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Oddball-detection task of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskCode {
    /// Auditory detection task
    Adt,
    /// Visual detection task
    Vdt,
}

impl TaskCode {
    pub const ALL: [TaskCode; 2] = [TaskCode::Adt, TaskCode::Vdt];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCode::Adt => "ADT",
            TaskCode::Vdt => "VDT",
        }
    }

    /// Token used for this task in run file names
    pub fn file_token(&self) -> &'static str {
        match self {
            TaskCode::Adt => "Aoddball",
            TaskCode::Vdt => "Voddball",
        }
    }

    /// Value of the `task` column in the behavioral table
    pub fn behavioral_task(&self) -> &'static str {
        match self {
            TaskCode::Adt => "aud",
            TaskCode::Vdt => "vis",
        }
    }

    /// Map a file-name token to a task, ignoring case.
    pub fn from_file_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|task| task.file_token().eq_ignore_ascii_case(token))
    }

    /// Parse a task code ("ADT"/"VDT") or a behavioral task value ("aud"/"vis").
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|task| {
            task.as_str().eq_ignore_ascii_case(value)
                || task.behavioral_task().eq_ignore_ascii_case(value)
        })
    }
}

impl fmt::Display for TaskCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positional phase of a sample within its trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseLabel {
    Baseline,
    Fixation,
    Squeeze,
    Blank,
    Response,
}

impl PhaseLabel {
    pub const ALL: [PhaseLabel; 5] = [
        PhaseLabel::Baseline,
        PhaseLabel::Fixation,
        PhaseLabel::Squeeze,
        PhaseLabel::Blank,
        PhaseLabel::Response,
    ];

    /// 1-based index written to the `duration_index` column
    pub fn duration_index(&self) -> u8 {
        match self {
            PhaseLabel::Baseline => 1,
            PhaseLabel::Fixation => 2,
            PhaseLabel::Squeeze => 3,
            PhaseLabel::Blank => 4,
            PhaseLabel::Response => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseLabel::Baseline => "baseline",
            PhaseLabel::Fixation => "fixation",
            PhaseLabel::Squeeze => "squeeze",
            PhaseLabel::Blank => "blank",
            PhaseLabel::Response => "response",
        }
    }
}

impl fmt::Display for PhaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the behavioral trial table.
///
/// Key columns are typed. Measure columns are kept as the text found in the
/// CSV so they reach the flat file unchanged; an empty string means missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralTrial {
    pub sub: String,
    #[serde(deserialize_with = "deserialize_index")]
    pub ses: u32,
    pub task: String,
    #[serde(deserialize_with = "deserialize_index")]
    pub run: u32,
    #[serde(deserialize_with = "deserialize_index")]
    pub trial: u32,
    #[serde(default)]
    pub mvc: String,
    #[serde(default, rename = "stimLev")]
    pub stim_lev: String,
    #[serde(default, rename = "isOddball")]
    pub is_oddball: String,
    #[serde(default, rename = "isStrength")]
    pub is_strength: String,
    #[serde(default)]
    pub iscorr: String,
    #[serde(default)]
    pub resp1: String,
    #[serde(default, rename = "resp1RT")]
    pub resp1_rt: String,
    #[serde(default)]
    pub resp2: String,
    #[serde(default, rename = "resp2RT")]
    pub resp2_rt: String,
    #[serde(default)]
    pub auc_rel_mvc: String,
    #[serde(default)]
    pub resp1_isdiff: String,
}

/// Accepts "3", " 3 " and "3.0"; rejects negative or fractional values.
fn deserialize_index<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u32>() {
        return Ok(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 => {
            Ok(value as u32)
        }
        _ => Err(serde::de::Error::custom(format!(
            "expected a non-negative integer index, got '{}'",
            raw
        ))),
    }
}

/// A run's pupil samples with their timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct RunSignal {
    pub samples: Vec<f64>,
    pub timestamps: Vec<f64>,
    /// Sampling rate in Hz
    pub sample_rate: u32,
}

impl RunSignal {
    pub fn new(samples: Vec<f64>, timestamps: Vec<f64>, sample_rate: u32) -> Result<Self> {
        if samples.len() != timestamps.len() {
            return Err(PupilError::InvalidConfig(format!(
                "sample and timestamp arrays differ in length ({} vs {})",
                samples.len(),
                timestamps.len()
            )));
        }
        Ok(Self {
            samples,
            timestamps,
            sample_rate,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A run file found in the data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFile {
    pub path: PathBuf,
    /// Numeric part of the subject code, e.g. "178"
    pub subject_id: String,
    pub task: TaskCode,
    pub session: u32,
    pub run: u32,
}

impl RunFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_code_tokens() {
        assert_eq!(TaskCode::from_file_token("Aoddball"), Some(TaskCode::Adt));
        assert_eq!(TaskCode::from_file_token("voddball"), Some(TaskCode::Vdt));
        assert_eq!(TaskCode::from_file_token("Goddball"), None);
        assert_eq!(TaskCode::Adt.behavioral_task(), "aud");
        assert_eq!(TaskCode::Vdt.to_string(), "VDT");
    }

    #[test]
    fn test_task_code_parse() {
        assert_eq!(TaskCode::parse("adt"), Some(TaskCode::Adt));
        assert_eq!(TaskCode::parse("vis"), Some(TaskCode::Vdt));
        assert_eq!(TaskCode::parse("xyz"), None);
    }

    #[test]
    fn test_phase_label_indices() {
        let indices: Vec<u8> = PhaseLabel::ALL.iter().map(|p| p.duration_index()).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert_eq!(PhaseLabel::Squeeze.to_string(), "squeeze");
    }

    #[test]
    fn test_run_signal_rejects_length_mismatch() {
        assert!(RunSignal::new(vec![1.0, 2.0], vec![0.0], 2000).is_err());
        let signal = RunSignal::new(vec![1.0], vec![0.0], 2000).unwrap();
        assert_eq!(signal.len(), 1);
    }

    #[test]
    fn test_behavioral_trial_from_csv() {
        let data = "sub,ses,task,run,trial,stimLev,extra\nBAP178,2,aud,1.0,3,0.5,ignored\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<BehavioralTrial> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].run, 1);
        assert_eq!(rows[0].trial, 3);
        assert_eq!(rows[0].stim_lev, "0.5");
        assert_eq!(rows[0].mvc, "");
    }

    #[test]
    fn test_behavioral_trial_rejects_fractional_index() {
        let data = "sub,ses,task,run,trial\nBAP178,2,aud,1.5,3\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let row: std::result::Result<BehavioralTrial, _> = reader.deserialize().next().unwrap();
        assert!(row.is_err());
    }
}
