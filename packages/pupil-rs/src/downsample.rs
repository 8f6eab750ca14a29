//! Integer-factor decimation of run signals.

use crate::error::{PupilError, Result};
use crate::filters::{ChebyshevFilter, DECIMATION_RIPPLE_DB};
use crate::types::RunSignal;

/// Fraction of the new Nyquist frequency kept by the anti-aliasing filter
const CUTOFF_FRACTION: f64 = 0.8;

/// Integer decimation factor between two rates.
///
/// Rejects a zero target, a target above the original rate, and any pair
/// whose ratio is not a whole number.
pub fn decimation_factor(original_rate: u32, target_rate: u32) -> Result<usize> {
    if original_rate == 0 || target_rate == 0 {
        return Err(PupilError::InvalidRate(format!(
            "rates must be positive (original {} Hz, target {} Hz)",
            original_rate, target_rate
        )));
    }
    if target_rate > original_rate {
        return Err(PupilError::InvalidRate(format!(
            "target rate {} Hz exceeds original rate {} Hz",
            target_rate, original_rate
        )));
    }
    if original_rate % target_rate != 0 {
        return Err(PupilError::InvalidRate(format!(
            "target rate {} Hz does not divide original rate {} Hz",
            target_rate, original_rate
        )));
    }
    Ok((original_rate / target_rate) as usize)
}

/// Raw samples that carry no measurement: exact zeros (sensor dropout) and
/// non-finite values.
pub fn dropout_mask(samples: &[f64]) -> Vec<bool> {
    samples.iter().map(|&v| v == 0.0 || !v.is_finite()).collect()
}

/// Replace masked samples by a straight line between the nearest valid
/// neighbours. Gaps at either end hold the nearest valid value; a signal
/// with no valid sample becomes all zeros.
fn bridge_dropouts(samples: &[f64], mask: &[bool]) -> Vec<f64> {
    let n = samples.len();
    let mut out = samples.to_vec();
    let mut last_valid: Option<usize> = None;
    let mut i = 0;
    while i < n {
        if !mask[i] {
            last_valid = Some(i);
            i += 1;
            continue;
        }
        let gap_start = i;
        while i < n && mask[i] {
            i += 1;
        }
        let next_valid = (i < n).then_some(i);
        match (last_valid, next_valid) {
            (Some(a), Some(b)) => {
                let (va, vb) = (samples[a], samples[b]);
                for (j, slot) in out.iter_mut().enumerate().take(b).skip(gap_start) {
                    let t = (j - a) as f64 / (b - a) as f64;
                    *slot = va + t * (vb - va);
                }
            }
            (Some(a), None) => out[gap_start..].fill(samples[a]),
            (None, Some(b)) => out[gap_start..b].fill(samples[b]),
            (None, None) => out.fill(0.0),
        }
    }
    out
}

/// Low-pass filter (zero phase) and keep every factor-th sample.
///
/// Equal rates return the input unchanged. The output holds
/// `ceil(len / factor)` samples taken at indices `0, factor, 2*factor, ...`.
///
/// Dropouts (see [`dropout_mask`]) are bridged before filtering so they
/// cannot ring into their neighbours. Output sample `k` is NaN when any raw
/// sample in `[k*factor, (k+1)*factor)` was a dropout.
pub fn decimate(
    data: &[f64],
    original_rate: u32,
    target_rate: u32,
    order: usize,
) -> Result<Vec<f64>> {
    let factor = decimation_factor(original_rate, target_rate)?;
    if factor == 1 {
        return Ok(data.to_vec());
    }

    let mask = dropout_mask(data);
    let dropouts = mask.iter().filter(|&&m| m).count();
    let bridged;
    let input = if dropouts > 0 {
        log::debug!("Bridging {} dropout samples before filtering", dropouts);
        bridged = bridge_dropouts(data, &mask);
        bridged.as_slice()
    } else {
        data
    };

    let cutoff = CUTOFF_FRACTION / factor as f64;
    let mut filter = ChebyshevFilter::lowpass(cutoff, order, DECIMATION_RIPPLE_DB)
        .map_err(PupilError::InvalidConfig)?;
    let filtered = filter.filtfilt(input);

    Ok(filtered
        .into_iter()
        .step_by(factor)
        .enumerate()
        .map(|(k, value)| {
            let start = k * factor;
            let end = (start + factor).min(mask.len());
            if mask[start..end].iter().any(|&m| m) {
                f64::NAN
            } else {
                value
            }
        })
        .collect())
}

/// Decimate a whole run. Samples are filtered; timestamps are picked at the
/// same indices so they stay exact.
pub fn downsample_run(signal: &RunSignal, target_rate: u32, order: usize) -> Result<RunSignal> {
    let factor = decimation_factor(signal.sample_rate, target_rate)?;
    let samples = decimate(&signal.samples, signal.sample_rate, target_rate, order)?;
    let timestamps: Vec<f64> = signal.timestamps.iter().step_by(factor).copied().collect();
    log::debug!(
        "Decimated {} samples at {} Hz to {} at {} Hz (factor {})",
        signal.len(),
        signal.sample_rate,
        samples.len(),
        target_rate,
        factor
    );
    RunSignal::new(samples, timestamps, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimation_factor() {
        assert_eq!(decimation_factor(2000, 250).unwrap(), 8);
        assert_eq!(decimation_factor(2000, 2000).unwrap(), 1);
        assert!(decimation_factor(2000, 300).is_err());
        assert!(decimation_factor(2000, 0).is_err());
        assert!(decimation_factor(250, 2000).is_err());
        assert!(decimation_factor(0, 0).is_err());
    }

    #[test]
    fn test_equal_rates_return_input() {
        let data = vec![1.0, 0.0, 3.5, -2.0];
        assert_eq!(decimate(&data, 250, 250, 8).unwrap(), data);
    }

    #[test]
    fn test_output_length() {
        for len in [0usize, 1, 7, 8, 9, 1000, 1003] {
            let data = vec![1.0; len];
            let out = decimate(&data, 2000, 250, 8).unwrap();
            assert_eq!(out.len(), (len + 7) / 8, "len {}", len);
            let floor = len / 8;
            assert!(out.len() >= floor && out.len() <= floor + 1);
        }
    }

    #[test]
    fn test_rejects_non_integer_factor() {
        let data = vec![1.0; 100];
        assert!(matches!(
            decimate(&data, 2000, 300, 8),
            Err(PupilError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_constant_signal_survives() {
        let data = vec![3200.0; 4000];
        let out = decimate(&data, 2000, 250, 8).unwrap();
        assert_eq!(out.len(), 500);
        for v in out {
            assert!((v - 3200.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_downsample_run_picks_timestamps() {
        let samples = vec![5.0; 20];
        let timestamps: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let signal = RunSignal::new(samples, timestamps, 2000).unwrap();
        let out = downsample_run(&signal, 250, 8).unwrap();
        assert_eq!(out.sample_rate, 250);
        assert_eq!(out.timestamps, vec![0.0, 4.0, 8.0]);
        assert_eq!(out.samples.len(), 3);
    }

    #[test]
    fn test_dropout_mask() {
        let mask = dropout_mask(&[1.0, 0.0, f64::NAN, -0.0, f64::INFINITY, 2.5]);
        assert_eq!(mask, vec![false, true, true, true, true, false]);
    }

    #[test]
    fn test_bridge_dropouts() {
        let data = [0.0, 2.0, 0.0, 0.0, 8.0, f64::NAN];
        let mask = dropout_mask(&data);
        assert_eq!(bridge_dropouts(&data, &mask), vec![2.0, 2.0, 4.0, 6.0, 8.0, 8.0]);
        assert_eq!(bridge_dropouts(&[0.0, 0.0], &[true, true]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_zero_block_becomes_missing_without_ringing() {
        let mut data = vec![3000.0; 4000];
        data[2000..2040].fill(0.0);
        let out = decimate(&data, 2000, 250, 8).unwrap();
        assert_eq!(out.len(), 500);
        for (k, v) in out.iter().enumerate() {
            if (250..255).contains(&k) {
                assert!(v.is_nan(), "sample {} should be missing", k);
            } else {
                assert!((v - 3000.0).abs() < 1e-3, "sample {} = {}", k, v);
            }
        }
    }

    #[test]
    fn test_isolated_zero_masks_its_window() {
        let mut data = vec![3000.0; 4000];
        data[1003] = 0.0;
        let out = decimate(&data, 2000, 250, 8).unwrap();
        assert!(out[125].is_nan());
        assert_eq!(out.iter().filter(|v| v.is_nan()).count(), 1);
    }

    #[test]
    fn test_single_nan_does_not_poison_run() {
        let mut data = vec![3000.0; 4000];
        data[3990] = f64::NAN;
        let out = decimate(&data, 2000, 250, 8).unwrap();
        let missing: Vec<usize> = (0..out.len()).filter(|&k| out[k].is_nan()).collect();
        assert_eq!(missing, vec![498]);
        assert!((out[497] - 3000.0).abs() < 1e-3);
        assert!((out[499] - 3000.0).abs() < 1e-3);
    }

    #[test]
    fn test_all_dropouts() {
        let out = decimate(&[0.0; 80], 2000, 250, 8).unwrap();
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
