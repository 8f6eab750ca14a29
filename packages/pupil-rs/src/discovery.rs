//! Run file discovery.
//!
//! Run files are named
//! `subject{PREFIX}{ID}_{TASK}_session{S}_run{R}_eyetrack_cleaned.{ext}`,
//! e.g. `subjectBAP178_Aoddball_session2_run1_eyetrack_cleaned.mat`.

use crate::config::PipelineConfig;
use crate::error::{PupilError, Result};
use crate::readers::SignalReaderFactory;
use crate::types::{RunFile, TaskCode};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Runs of one subject, split by task and ordered by (session, run)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectRuns {
    pub subject_id: String,
    pub adt: Vec<RunFile>,
    pub vdt: Vec<RunFile>,
}

impl SubjectRuns {
    pub fn runs(&self, task: TaskCode) -> &[RunFile] {
        match task {
            TaskCode::Adt => &self.adt,
            TaskCode::Vdt => &self.vdt,
        }
    }

    fn runs_mut(&mut self, task: TaskCode) -> &mut Vec<RunFile> {
        match task {
            TaskCode::Adt => &mut self.adt,
            TaskCode::Vdt => &mut self.vdt,
        }
    }
}

/// Parses run file names for one subject prefix
pub struct RunFileParser {
    pattern: Regex,
}

impl RunFileParser {
    pub fn new(subject_prefix: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"^subject{}(\d+)_([A-Za-z]+)_session(\d+)_run(\d+)",
            regex::escape(subject_prefix)
        ))
        .map_err(|e| PupilError::InvalidConfig(format!("subject prefix: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Parse a path; `None` for names that do not match or name an
    /// unknown task.
    pub fn parse(&self, path: &Path) -> Option<RunFile> {
        let name = path.file_name()?.to_str()?;
        let caps = self.pattern.captures(name)?;
        let task_token = caps.get(2)?.as_str();
        let Some(task) = TaskCode::from_file_token(task_token) else {
            log::debug!("Skipping {}: unknown task '{}'", name, task_token);
            return None;
        };
        Some(RunFile {
            path: path.to_path_buf(),
            subject_id: caps.get(1)?.as_str().to_string(),
            task,
            session: caps.get(3)?.as_str().parse().ok()?,
            run: caps.get(4)?.as_str().parse().ok()?,
        })
    }
}

/// Scan the data directory and group run files by subject id.
pub fn discover_subjects(config: &PipelineConfig) -> Result<BTreeMap<String, SubjectRuns>> {
    if !config.data_dir.is_dir() {
        return Err(PupilError::FileNotFound(format!(
            "data directory {}",
            config.data_dir.display()
        )));
    }
    let parser = RunFileParser::new(&config.subject_prefix)?;
    let pattern = config.data_dir.join(&config.file_pattern);
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern)
        .map_err(|e| PupilError::InvalidConfig(format!("file pattern '{}': {}", pattern, e)))?;

    let mut subjects: BTreeMap<String, SubjectRuns> = BTreeMap::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                log::warn!("glob error: {}", e);
                continue;
            }
        };
        if !path.is_file() || !SignalReaderFactory::is_supported(&path) {
            continue;
        }
        let Some(run) = parser.parse(&path) else {
            log::debug!("Ignoring {}", path.display());
            continue;
        };
        let entry = subjects
            .entry(run.subject_id.clone())
            .or_insert_with(|| SubjectRuns {
                subject_id: run.subject_id.clone(),
                ..SubjectRuns::default()
            });
        entry.runs_mut(run.task).push(run);
    }

    for runs in subjects.values_mut() {
        for task in TaskCode::ALL {
            runs.runs_mut(task)
                .sort_by(|a, b| (a.session, a.run, &a.path).cmp(&(b.session, b.run, &b.path)));
        }
    }

    log::info!(
        "Discovered {} subject(s) in {}",
        subjects.len(),
        config.data_dir.display()
    );
    Ok(subjects)
}
