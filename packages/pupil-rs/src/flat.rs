//! Flat-file rows and CSV output.

use crate::error::{PupilError, Result};
use crate::segment::{mask_dropouts, Segmentation};
use crate::types::{BehavioralTrial, PhaseLabel, RunSignal, TaskCode};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output columns, in order
pub const FLAT_COLUMNS: [&str; 23] = [
    "pupil",
    "time",
    "trial_index",
    "run_index",
    "session_index",
    "duration_index",
    "trial_label",
    "sub",
    "mvc",
    "ses",
    "task",
    "run",
    "trial",
    "stimLev",
    "isOddball",
    "isStrength",
    "iscorr",
    "resp1",
    "resp1RT",
    "resp2",
    "resp2RT",
    "auc_rel_mvc",
    "resp1_isdiff",
];

/// One output sample joined with its trial's behavioral row
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow<'a> {
    /// `None` marks sensor dropout
    pub pupil: Option<f64>,
    pub time: f64,
    pub trial_index: u32,
    pub run_index: u32,
    pub session_index: u32,
    pub phase: PhaseLabel,
    pub behavior: &'a BehavioralTrial,
}

impl FlatRow<'_> {
    fn record(&self) -> [String; 23] {
        let b = self.behavior;
        [
            self.pupil.map(|v| v.to_string()).unwrap_or_default(),
            self.time.to_string(),
            self.trial_index.to_string(),
            self.run_index.to_string(),
            self.session_index.to_string(),
            self.phase.duration_index().to_string(),
            self.phase.as_str().to_string(),
            b.sub.clone(),
            b.mvc.clone(),
            b.ses.to_string(),
            b.task.clone(),
            b.run.to_string(),
            b.trial.to_string(),
            b.stim_lev.clone(),
            b.is_oddball.clone(),
            b.is_strength.clone(),
            b.iscorr.clone(),
            b.resp1.clone(),
            b.resp1_rt.clone(),
            b.resp2.clone(),
            b.resp2_rt.clone(),
            b.auc_rel_mvc.clone(),
            b.resp1_isdiff.clone(),
        ]
    }
}

/// Emit one row per sample of every phase of every segment.
///
/// `trials` must be the same slice the segmentation was computed from.
pub fn assemble_rows<'a>(
    signal: &RunSignal,
    segmentation: &Segmentation,
    trials: &'a [BehavioralTrial],
    session: u32,
    run: u32,
) -> Vec<FlatRow<'a>> {
    let values = mask_dropouts(&signal.samples);
    let mut rows = Vec::with_capacity(segmentation.segments.iter().map(|s| s.len()).sum());
    for segment in &segmentation.segments {
        let behavior = &trials[segment.row];
        for phase in segment.phases() {
            for i in phase.range() {
                rows.push(FlatRow {
                    pupil: values[i],
                    time: signal.timestamps[i],
                    trial_index: segment.trial,
                    run_index: run,
                    session_index: session,
                    phase: phase.label,
                    behavior,
                });
            }
        }
    }
    rows
}

/// `{subject}_{task}_DS{rate}.csv`, e.g. `BAP178_ADT_DS250.csv`
pub fn output_file_name(subject_label: &str, task: TaskCode, target_rate: u32) -> String {
    format!("{}_{}_DS{}.csv", subject_label, task, target_rate)
}

pub fn write_rows<W: Write>(writer: W, rows: &[FlatRow<'_>]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(FLAT_COLUMNS)?;
    for row in rows {
        csv_writer.write_record(row.record())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Flat CSV for one (subject, task), filled run by run.
///
/// Rows go to `<name>.partial` and the file is renamed into place by
/// [`FlatCsvWriter::finish`], so an interrupted build never leaves a
/// truncated output under the final name.
pub struct FlatCsvWriter {
    path: PathBuf,
    partial: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
    rows_written: usize,
}

impl FlatCsvWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let mut partial = path.as_os_str().to_owned();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        let mut writer = csv::Writer::from_writer(BufWriter::new(File::create(&partial)?));
        if let Err(e) = writer.write_record(FLAT_COLUMNS) {
            drop(writer);
            remove_partial(&partial);
            return Err(e.into());
        }
        Ok(Self {
            path: path.to_path_buf(),
            partial,
            writer,
            rows_written: 0,
        })
    }

    pub fn append(&mut self, rows: &[FlatRow<'_>]) -> Result<()> {
        for row in rows {
            self.writer.write_record(row.record())?;
        }
        self.rows_written += rows.len();
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and move the file to its final name. On failure the partial
    /// file is removed.
    pub fn finish(self) -> Result<PathBuf> {
        let Self {
            path,
            partial,
            mut writer,
            ..
        } = self;
        let flushed = writer.flush();
        drop(writer);
        let moved = flushed
            .map_err(PupilError::from)
            .and_then(|()| std::fs::rename(&partial, &path).map_err(PupilError::from));
        match moved {
            Ok(()) => Ok(path),
            Err(e) => {
                remove_partial(&partial);
                Err(e)
            }
        }
    }

    /// Abandon the file and remove what was written so far.
    pub fn discard(self) {
        let Self {
            partial, writer, ..
        } = self;
        drop(writer);
        remove_partial(&partial);
    }
}

fn remove_partial(partial: &Path) {
    if let Err(e) = std::fs::remove_file(partial) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {}", partial.display(), e);
        }
    }
}
