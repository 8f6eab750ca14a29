//! Anti-aliasing filters
//!
//! IIR low-pass filters built from second-order sections (biquads), with a
//! forward-backward pass for zero-phase filtering of whole runs.

use std::f64::consts::PI;

/// Passband ripple of the Chebyshev type I decimation filter (dB)
pub const DECIMATION_RIPPLE_DB: f64 = 0.05;

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Gain of the section at DC (z = 1)
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }
}

/// State for a single biquad section (Direct Form II Transposed)
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

#[derive(Debug, Clone)]
struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    #[inline]
    fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }

    /// Load the state the section would settle in after a long constant
    /// input `x`, so filtering starts without a step transient.
    fn settle(&mut self, x: f64) -> f64 {
        let c = self.coeffs;
        let y = c.dc_gain() * x;
        self.state = BiquadState {
            z1: y - c.b0 * x,
            z2: c.b2 * x - c.a2 * y,
        };
        y
    }

    fn reset(&mut self) {
        self.state = BiquadState::default();
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
    gain: f64,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>, gain: f64) -> Self {
        Self {
            sections: sections.into_iter().map(BiquadFilter::new).collect(),
            gain,
        }
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn coefficients(&self) -> Vec<BiquadCoeffs> {
        self.sections.iter().map(|s| s.coeffs).collect()
    }

    /// Overall gain at DC
    pub fn dc_gain(&self) -> f64 {
        self.sections
            .iter()
            .fold(self.gain, |acc, s| acc * s.coeffs.dc_gain())
    }

    /// Process a single sample through all sections
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut output = input * self.gain;
        for section in &mut self.sections {
            output = section.process(output);
        }
        output
    }

    /// Process a signal and return a new array (original unchanged)
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        signal.iter().map(|&s| self.process(s)).collect()
    }

    /// Reset all section states
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    fn settle(&mut self, x: f64) {
        let mut level = x * self.gain;
        for section in &mut self.sections {
            level = section.settle(level);
        }
    }

    /// Number of samples mirrored at each end before zero-phase filtering
    pub fn default_padlen(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Zero-phase filtering: forward pass, then backward pass.
    ///
    /// The signal is extended at both ends by odd reflection and each pass
    /// starts from the steady state of its first sample, so edges do not
    /// ring. The padding shrinks for signals shorter than the default.
    pub fn filtfilt(&mut self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        let padlen = self.default_padlen().min(n - 1);
        let mut extended = odd_extend(signal, padlen);

        self.reset();
        self.settle(extended[0]);
        for sample in extended.iter_mut() {
            *sample = self.process(*sample);
        }

        extended.reverse();
        self.reset();
        self.settle(extended[0]);
        for sample in extended.iter_mut() {
            *sample = self.process(*sample);
        }
        extended.reverse();
        self.reset();

        extended[padlen..padlen + n].to_vec()
    }
}

/// Extend `signal` by `padlen` samples at each end, reflecting about the
/// end points. Requires `padlen < signal.len()`.
fn odd_extend(signal: &[f64], padlen: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];
    let mut out = Vec::with_capacity(n + 2 * padlen);
    out.extend((1..=padlen).rev().map(|i| 2.0 * first - signal[i]));
    out.extend_from_slice(signal);
    out.extend((1..=padlen).map(|i| 2.0 * last - signal[n - 1 - i]));
    out
}

/// Chebyshev type I filter designer
pub struct ChebyshevFilter;

impl ChebyshevFilter {
    /// Design a Chebyshev type I lowpass filter.
    ///
    /// # Arguments
    /// * `cutoff` - Passband edge as a fraction of Nyquist (0 < cutoff < 1)
    /// * `order` - Filter order
    /// * `ripple_db` - Passband ripple in dB
    ///
    /// Each section is normalised to unity gain at DC, so the passband
    /// ripples between 1 and `10^(ripple_db/20)`.
    pub fn lowpass(cutoff: f64, order: usize, ripple_db: f64) -> Result<SosFilter, String> {
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(format!(
                "Cutoff ({}) must lie strictly between 0 and Nyquist",
                cutoff
            ));
        }
        if order == 0 {
            return Err("Filter order must be at least 1".to_string());
        }
        if ripple_db <= 0.0 {
            return Err(format!("Passband ripple ({} dB) must be positive", ripple_db));
        }

        let warped = Self::prewarp(cutoff);
        let epsilon = (10f64.powf(ripple_db / 10.0) - 1.0).sqrt();
        let mu = (1.0 / epsilon).asinh() / order as f64;
        let (sinh_mu, cosh_mu) = (mu.sinh(), mu.cosh());

        let mut sections = Vec::with_capacity((order + 1) / 2);
        for k in 0..order / 2 {
            let theta = PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64);
            let re = sinh_mu * theta.sin();
            let im = cosh_mu * theta.cos();
            // s^2 + a1*s + a0 after scaling the prototype to the warped cutoff
            let a1 = 2.0 * re * warped;
            let a0 = (re * re + im * im) * warped * warped;
            sections.push(Self::bilinear_second_order(a1, a0));
        }
        if order % 2 == 1 {
            sections.push(Self::bilinear_first_order(sinh_mu * warped));
        }

        Ok(SosFilter::new(sections, 1.0))
    }

    /// Prewarp a Nyquist-relative frequency for the bilinear transform
    fn prewarp(cutoff: f64) -> f64 {
        (PI * cutoff / 2.0).tan()
    }

    /// H(s) = a0 / (s^2 + a1*s + a0)
    fn bilinear_second_order(a1: f64, a0: f64) -> BiquadCoeffs {
        let denom = 1.0 + a1 + a0;
        BiquadCoeffs {
            b0: a0 / denom,
            b1: 2.0 * a0 / denom,
            b2: a0 / denom,
            a1: 2.0 * (a0 - 1.0) / denom,
            a2: (1.0 - a1 + a0) / denom,
        }
    }

    /// H(s) = p / (s + p)
    fn bilinear_first_order(p: f64) -> BiquadCoeffs {
        let denom = 1.0 + p;
        BiquadCoeffs {
            b0: p / denom,
            b1: p / denom,
            b2: 0.0,
            a1: (p - 1.0) / denom,
            a2: 0.0,
        }
    }
}
