//! Flat-file build for one subject.
//!
//! Runs are handled one at a time: load, decimate, segment, append rows to
//! the task's output, drop. A failing run is recorded in the report and the
//! build moves on to the next one. A task whose output cannot be written is
//! marked failed; the other task still gets its file.

use crate::behavioral::{rows_for_run, BehavioralTable};
use crate::config::PipelineConfig;
use crate::discovery::SubjectRuns;
use crate::downsample::downsample_run;
use crate::error::{PupilError, Result};
use crate::flat::{assemble_rows, output_file_name, FlatCsvWriter};
use crate::readers::SignalReaderFactory;
use crate::segment::{segment_run, Segmentation};
use crate::types::{BehavioralTrial, PhaseLabel, RunFile, RunSignal, TaskCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Processed,
    /// No behavioral rows for the run
    Skipped,
    /// The run file could not be read
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub file: String,
    pub session: u32,
    pub run: u32,
    pub status: RunStatus,
    pub behavioral_trials: usize,
    pub raw_samples: usize,
    pub downsampled_samples: usize,
    pub samples_per_trial: usize,
    pub trials_written: usize,
    pub samples_written: usize,
    pub message: Option<String>,
}

impl RunReport {
    fn new(run: &RunFile, status: RunStatus) -> Self {
        Self {
            file: run.file_name(),
            session: run.session,
            run: run.run,
            status,
            behavioral_trials: 0,
            raw_samples: 0,
            downsampled_samples: 0,
            samples_per_trial: 0,
            trials_written: 0,
            samples_written: 0,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task: TaskCode,
    pub behavioral_trials: usize,
    pub output_file: Option<PathBuf>,
    pub runs: Vec<RunReport>,
    pub trials_written: usize,
    pub samples_written: usize,
    pub phase_counts: BTreeMap<PhaseLabel, usize>,
    pub warnings: Vec<String>,
    /// Set when the output file could not be written
    pub error: Option<String>,
}

impl TaskReport {
    fn new(task: TaskCode, behavioral_trials: usize) -> Self {
        Self {
            task,
            behavioral_trials,
            output_file: None,
            runs: Vec::new(),
            trials_written: 0,
            samples_written: 0,
            phase_counts: PhaseLabel::ALL.into_iter().map(|p| (p, 0)).collect(),
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Share of written samples carrying `phase`, in percent
    pub fn phase_percentage(&self, phase: PhaseLabel) -> f64 {
        if self.samples_written == 0 {
            return 0.0;
        }
        let count = self.phase_counts.get(&phase).copied().unwrap_or(0);
        count as f64 * 100.0 / self.samples_written as f64
    }

    fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }

    fn fail(&mut self, path: &std::path::Path, error: PupilError) {
        let message = format!("Could not write {}: {}", path.display(), error);
        log::error!("{}", message);
        self.error = Some(message);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectReport {
    pub subject: String,
    pub behavioral_trials: usize,
    pub original_rate: u32,
    pub target_rate: u32,
    /// Behavioral table rows that could not be parsed
    pub behavioral_rows_skipped: usize,
    pub tasks: Vec<TaskReport>,
}

impl SubjectReport {
    pub fn files_written(&self) -> Vec<&PathBuf> {
        self.tasks.iter().filter_map(|t| t.output_file.as_ref()).collect()
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.error.is_some())
    }

    /// True when any task failed or any run was skipped or failed
    pub fn is_incomplete(&self) -> bool {
        self.failed_tasks().next().is_some()
            || self
                .tasks
                .iter()
                .flat_map(|t| &t.runs)
                .any(|r| r.status != RunStatus::Processed)
    }
}

/// Load the behavioral table and build every task's flat file for a subject.
pub fn process_subject(
    config: &PipelineConfig,
    subject_id: &str,
    runs: &SubjectRuns,
) -> Result<SubjectReport> {
    config.validate()?;
    let table = BehavioralTable::load(&config.behavioral_csv)?;
    process_subject_with_table(config, &table, subject_id, runs)
}

pub fn process_subject_with_table(
    config: &PipelineConfig,
    table: &BehavioralTable,
    subject_id: &str,
    runs: &SubjectRuns,
) -> Result<SubjectReport> {
    config.validate()?;
    let label = config.subject_label(subject_id);
    let subject_rows = table.for_subject(&label);
    if subject_rows.is_empty() {
        return Err(PupilError::NoBehavioralData(label));
    }
    log::info!("Processing {} ({} behavioral trials)", label, subject_rows.len());

    std::fs::create_dir_all(&config.output_dir)?;

    let mut tasks = Vec::with_capacity(TaskCode::ALL.len());
    for task in TaskCode::ALL {
        tasks.push(process_task(config, &label, task, &subject_rows, runs.runs(task)));
    }

    Ok(SubjectReport {
        subject: label,
        behavioral_trials: subject_rows.len(),
        original_rate: config.original_rate,
        target_rate: config.target_rate,
        behavioral_rows_skipped: table.skipped_rows,
        tasks,
    })
}

fn process_task(
    config: &PipelineConfig,
    label: &str,
    task: TaskCode,
    subject_rows: &[BehavioralTrial],
    run_files: &[RunFile],
) -> TaskReport {
    let task_trials = subject_rows
        .iter()
        .filter(|r| r.task == task.behavioral_task())
        .count();
    let mut report = TaskReport::new(task, task_trials);

    if run_files.is_empty() {
        log::info!("No {} files found for {}", task, label);
        return report;
    }
    log::info!(
        "Processing {}: {} file(s), {} behavioral trials",
        task,
        run_files.len(),
        task_trials
    );

    let output_path = config
        .output_dir
        .join(output_file_name(label, task, config.target_rate));
    let mut writer: Option<FlatCsvWriter> = None;

    for run_file in run_files {
        log::info!(
            "  session {}, run {}: {}",
            run_file.session,
            run_file.run,
            run_file.file_name()
        );

        let run_rows = rows_for_run(subject_rows, task, run_file.session, run_file.run);
        if run_rows.is_empty() {
            let mut run_report = RunReport::new(run_file, RunStatus::Skipped);
            let message = format!(
                "No behavioral data for {} session {}, run {}",
                task, run_file.session, run_file.run
            );
            run_report.message = Some(message.clone());
            report.warn(message);
            report.runs.push(run_report);
            continue;
        }

        let (raw_len, signal, segmentation) = match load_and_segment(config, run_file, &run_rows) {
            Ok(loaded) => loaded,
            Err(e) => {
                let mut run_report = RunReport::new(run_file, RunStatus::Failed);
                run_report.behavioral_trials = run_rows.len();
                let message = format!("Error processing {}: {}", run_file.file_name(), e);
                run_report.message = Some(e.to_string());
                report.warn(message);
                report.runs.push(run_report);
                continue;
            }
        };

        for skipped in &segmentation.skipped {
            report.warnings.push(format!(
                "{} session {}, run {}: {}",
                task, run_file.session, run_file.run, skipped
            ));
        }

        let rows = assemble_rows(
            &signal,
            &segmentation,
            &run_rows,
            run_file.session,
            run_file.run,
        );
        for row in &rows {
            *report.phase_counts.entry(row.phase).or_insert(0) += 1;
        }

        if !rows.is_empty() {
            let written = match writer.as_mut() {
                Some(out) => out.append(&rows),
                None => FlatCsvWriter::create(&output_path).and_then(|mut out| {
                    let appended = out.append(&rows);
                    writer = Some(out);
                    appended
                }),
            };
            if let Err(e) = written {
                if let Some(out) = writer.take() {
                    out.discard();
                }
                let mut run_report = RunReport::new(run_file, RunStatus::Failed);
                run_report.behavioral_trials = run_rows.len();
                run_report.message = Some(e.to_string());
                report.runs.push(run_report);
                report.fail(&output_path, e);
                return report;
            }
        }

        let mut run_report = RunReport::new(run_file, RunStatus::Processed);
        run_report.behavioral_trials = run_rows.len();
        run_report.raw_samples = raw_len;
        run_report.downsampled_samples = signal.len();
        run_report.samples_per_trial = segmentation.samples_per_trial;
        run_report.trials_written = segmentation.segments.len();
        run_report.samples_written = rows.len();
        report.trials_written += run_report.trials_written;
        report.samples_written += run_report.samples_written;
        report.runs.push(run_report);
    }

    match writer {
        Some(out) => {
            let rows = out.rows_written();
            match out.finish() {
                Ok(path) => {
                    log::info!(
                        "Saved {} ({} trials, {} rows)",
                        path.display(),
                        report.trials_written,
                        rows
                    );
                    report.output_file = Some(path);
                }
                Err(e) => report.fail(&output_path, e),
            }
        }
        None => log::warn!("No data to save for {} {}", label, task),
    }

    report
}

/// Read one run, decimate it and cut it into trials.
/// Returns the raw length alongside the decimated signal.
fn load_and_segment(
    config: &PipelineConfig,
    run_file: &RunFile,
    run_rows: &[BehavioralTrial],
) -> Result<(usize, RunSignal, Segmentation)> {
    let reader = SignalReaderFactory::create_reader(&run_file.path, &config.signal_fields())?;
    let raw = reader.read_signal(config.original_rate)?;
    log::debug!(
        "    original data: {} samples at {} Hz",
        raw.len(),
        raw.sample_rate
    );

    let signal = downsample_run(&raw, config.target_rate, config.filter_order)?;
    let raw_len = raw.len();
    drop(raw);
    log::debug!(
        "    downsampled data: {} samples at {} Hz",
        signal.len(),
        signal.sample_rate
    );

    let segmentation = segment_run(signal.len(), run_rows);
    log::debug!(
        "    estimated {} samples per trial",
        segmentation.samples_per_trial
    );
    Ok((raw_len, signal, segmentation))
}
