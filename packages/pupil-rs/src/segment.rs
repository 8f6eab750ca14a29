//! Trial segmentation of a downsampled run.
//!
//! Trial boundaries are not recorded in the run files. A run holding T
//! behavioral trials is cut into T equal slices, and each slice into five
//! phases at 20% steps of its length.

use crate::types::{BehavioralTrial, PhaseLabel};
use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// Relative phase edges at 20%, 40%, 60% and 80% of a trial of `duration`
/// samples. Integer arithmetic gives the exact floor.
pub fn phase_bounds(duration: usize) -> [usize; 4] {
    [
        duration / 5,
        duration * 2 / 5,
        duration * 3 / 5,
        duration * 4 / 5,
    ]
}

/// One phase of a trial, as an absolute sample range of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseSpan {
    pub label: PhaseLabel,
    pub start: usize,
    pub end: usize,
}

impl PhaseSpan {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Slice of a run assigned to one behavioral trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialSegment {
    /// Position of the trial in the run's behavioral rows
    pub row: usize,
    /// Behavioral trial number (1-based)
    pub trial: u32,
    pub start: usize,
    pub end: usize,
}

impl TrialSegment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The five phases in order; zero-length phases are kept.
    pub fn phases(&self) -> [PhaseSpan; 5] {
        let [p1, p2, p3, p4] = phase_bounds(self.len());
        let edges = [0, p1, p2, p3, p4, self.len()];
        let mut spans = [PhaseSpan {
            label: PhaseLabel::Baseline,
            start: self.start,
            end: self.start,
        }; 5];
        for (i, label) in PhaseLabel::ALL.into_iter().enumerate() {
            spans[i] = PhaseSpan {
                label,
                start: self.start + edges[i],
                end: self.start + edges[i + 1],
            };
        }
        spans
    }
}

/// A trial left out because its slice starts past the end of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTrial {
    pub trial: u32,
    pub start: usize,
    pub available: usize,
}

impl fmt::Display for SkippedTrial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trial {} starts beyond data range (start {}, {} samples available)",
            self.trial, self.start, self.available
        )
    }
}

/// Result of cutting one run into trials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Segmentation {
    pub samples_per_trial: usize,
    pub segments: Vec<TrialSegment>,
    pub skipped: Vec<SkippedTrial>,
}

/// Assign each behavioral trial its slice of a run of `signal_len` samples.
///
/// With T rows, trial number `i` covers `[(i-1)*L/T, i*L/T)` (integer
/// division), clamped to the run. The trial numbered T also takes the
/// rounding remainder, so trials `1..=T` cover the run exactly.
pub fn segment_run(signal_len: usize, trials: &[BehavioralTrial]) -> Segmentation {
    let total = trials.len();
    if total == 0 {
        return Segmentation::default();
    }
    let samples_per_trial = signal_len / total;

    let mut segmentation = Segmentation {
        samples_per_trial,
        ..Segmentation::default()
    };

    for (row, beh) in trials.iter().enumerate() {
        let number = beh.trial as usize;
        let start = number.saturating_sub(1).saturating_mul(samples_per_trial);
        if start >= signal_len {
            let skipped = SkippedTrial {
                trial: beh.trial,
                start,
                available: signal_len,
            };
            log::warn!("{}", skipped);
            segmentation.skipped.push(skipped);
            continue;
        }
        let end = if number == total {
            signal_len
        } else {
            number.saturating_mul(samples_per_trial).min(signal_len)
        };
        segmentation.segments.push(TrialSegment {
            row,
            trial: beh.trial,
            start,
            end,
        });
    }

    segmentation
}

/// Per-sample missing markers for the flat file. Exact zeros are sensor
/// dropout; NaN marks a decimation window that held a raw dropout.
pub fn mask_dropouts(samples: &[f64]) -> Vec<Option<f64>> {
    samples
        .iter()
        .map(|&v| if v == 0.0 || !v.is_finite() { None } else { Some(v) })
        .collect()
}
