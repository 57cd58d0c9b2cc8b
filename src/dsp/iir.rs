//! Causal direct-form IIR filter with up/down resampling and continuity
//! across calls (spec.md §4.2, C2). Used only when an alternative
//! downsampling path is explicitly configured as IIR (Chebyshev); the
//! core's default resampling path is FIR.

use std::collections::VecDeque;

use crate::core::{ConfigError, ConfigResult, Timestamp};
use crate::dsp::common::{gcd, PhaseDecimator, Upsampler};

/// `{a, b, up, down}`. No symmetry requirement, unlike `FilterSpec`.
#[derive(Debug, Clone)]
pub struct IirSpec {
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub up: usize,
    pub down: usize,
}

impl IirSpec {
    pub fn new(a: Vec<f64>, b: Vec<f64>, up: usize, down: usize) -> ConfigResult<Self> {
        if up < 1 || down < 1 {
            return Err(ConfigError::InvalidFilter {
                reason: "up and down must be >= 1".into(),
            });
        }
        if a.is_empty() || b.is_empty() {
            return Err(ConfigError::InvalidFilter {
                reason: "a and b must be non-empty".into(),
            });
        }
        if a[0] == 0.0 {
            return Err(ConfigError::InvalidFilter {
                reason: "a[0] (feedback normalization tap) must be non-zero".into(),
            });
        }
        let g = gcd(up, down);
        Ok(Self { a, b, up: up / g, down: down / g })
    }
}

/// `y[n] = (Σ b[k]·x[n-k] − Σ_{l>=1} a[l]·y[n-l]) / a[0]`, carrying an
/// input tail of `|b|-1` and output tail of `|a|-1` across calls.
#[derive(Debug, Clone)]
struct DirectFormRecursion {
    a: Vec<f64>,
    b: Vec<f64>,
    x_tail: VecDeque<f64>,
    y_tail: VecDeque<f64>,
}

impl DirectFormRecursion {
    fn new(a: Vec<f64>, b: Vec<f64>) -> Self {
        let x_tail = std::iter::repeat(0.0).take(b.len() - 1).collect();
        let y_tail = std::iter::repeat(0.0).take(a.len() - 1).collect();
        Self { a, b, x_tail, y_tail }
    }

    fn push(&mut self, u: &[f64]) -> Vec<f64> {
        if u.is_empty() {
            return Vec::new();
        }
        let mut x_hist: VecDeque<f64> = self.x_tail.clone();
        let mut y_hist: VecDeque<f64> = self.y_tail.clone();
        let mut out = Vec::with_capacity(u.len());

        for &xn in u {
            x_hist.push_back(xn);
            let mut acc = 0.0;
            for (k, &bk) in self.b.iter().enumerate() {
                let idx = x_hist.len() - 1 - k;
                acc += bk * x_hist[idx];
            }
            for (l, &al) in self.a.iter().enumerate().skip(1) {
                let idx = y_hist.len() - l;
                acc -= al * y_hist[idx];
            }
            let yn = acc / self.a[0];
            out.push(yn);
            y_hist.push_back(yn);
            while x_hist.len() > self.b.len() - 1 {
                x_hist.pop_front();
            }
            while y_hist.len() > self.a.len() - 1 {
                y_hist.pop_front();
            }
        }

        self.x_tail = x_hist;
        self.y_tail = y_hist;
        out
    }
}

/// C2: the IIR filter engine, exposing the same contract as `FirFilter`.
#[derive(Debug, Clone)]
pub struct IirFilter {
    spec: IirSpec,
    up: Upsampler,
    recursion: DirectFormRecursion,
    down: PhaseDecimator,
    out_count_before: usize,
}

impl IirFilter {
    pub fn new(spec: IirSpec) -> Self {
        let recursion = DirectFormRecursion::new(spec.a.clone(), spec.b.clone());
        let up = Upsampler::new(spec.up);
        let down = PhaseDecimator::new(spec.down);
        Self { spec, up, recursion, down, out_count_before: 0 }
    }

    pub fn spec(&self) -> &IirSpec {
        &self.spec
    }

    pub fn process(&mut self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let upsampled = self.up.push(x);
        let filtered = self.recursion.push(&upsampled);
        self.down.decimate(&filtered)
    }

    pub fn processed_length(&self, n_in: usize) -> usize {
        let up_len = self.up.len_for(n_in);
        self.down.predict(up_len)
    }

    pub fn process_timed(&mut self, t: &[Timestamp], x: &[f64]) -> (Vec<Timestamp>, Vec<f64>) {
        debug_assert_eq!(t.len(), x.len());
        let out = self.process(x);
        let ratio_down = self.spec.down as f64 / self.spec.up as f64;
        let base = self.out_count_before;
        let times = (0..out.len())
            .map(|i| {
                let pos = (base + i) as f64 * ratio_down;
                let idx = (pos.round() as usize).min(t.len().saturating_sub(1));
                t[idx]
            })
            .collect();
        self.out_count_before += out.len();
        (times, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_spec() -> IirSpec {
        IirSpec::new(vec![1.0], vec![1.0], 1, 1).unwrap()
    }

    #[test]
    fn identity_filter_passes_through() {
        let mut f = IirFilter::new(identity_spec());
        assert_eq!(f.process(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn rejects_zero_leading_a() {
        assert!(IirSpec::new(vec![0.0, 1.0], vec![1.0], 1, 1).is_err());
    }

    #[test]
    fn continuity_across_call_boundaries() {
        // a first-order leaky integrator: y[n] = x[n] + 0.5*y[n-1]
        let spec_whole = IirSpec::new(vec![1.0, -0.5], vec![1.0], 1, 1).unwrap();
        let spec_chunked = IirSpec::new(vec![1.0, -0.5], vec![1.0], 1, 1).unwrap();
        let x: Vec<f64> = (0..40).map(|i| (i as f64 * 0.17).sin()).collect();

        let mut whole = IirFilter::new(spec_whole);
        let one_shot = whole.process(&x);

        let mut chunked = IirFilter::new(spec_chunked);
        let mut pieces = Vec::new();
        for chunk in x.chunks(6) {
            pieces.extend(chunked.process(chunk));
        }
        for (a, b) in one_shot.iter().zip(pieces.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
