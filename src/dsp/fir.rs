//! Symmetric linear-phase FIR filter with integer up/down resampling
//! and continuity across calls (spec.md §4.1, C1).

use std::collections::VecDeque;

use crate::core::{ConfigError, ConfigResult, Timestamp};
use crate::dsp::common::{gcd, PhaseDecimator, Upsampler};

/// `{b, up, down}` as specified in spec.md §3. `up`/`down` are reduced
/// by their GCD on construction.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub b: Vec<f64>,
    pub up: usize,
    pub down: usize,
}

impl FilterSpec {
    pub fn new(b: Vec<f64>, up: usize, down: usize, sym_tol: f64) -> ConfigResult<Self> {
        if up < 1 || down < 1 {
            return Err(ConfigError::InvalidFilter {
                reason: "up and down must be >= 1".into(),
            });
        }
        if b.len() % 2 == 0 {
            return Err(ConfigError::InvalidFilter {
                reason: format!("tap count {} must be odd", b.len()),
            });
        }
        let n = b.len();
        for k in 0..n / 2 {
            if (b[k] - b[n - 1 - k]).abs() > sym_tol {
                return Err(ConfigError::InvalidFilter {
                    reason: format!("tap {k} not symmetric within {sym_tol}"),
                });
            }
        }
        let g = gcd(up, down);
        Ok(Self { b, up: up / g, down: down / g })
    }
}

/// Streaming transform implemented by both filter engines (spec.md §9:
/// "two concrete types that implement a common capability", no runtime
/// polymorphism in the hot convolution loop).
pub trait StreamingFilter {
    fn process(&mut self, x: &[f64]) -> Vec<f64>;
    fn processed_length(&self, n_in: usize) -> usize;
    fn process_timed(&mut self, t: &[Timestamp], x: &[f64]) -> (Vec<Timestamp>, Vec<f64>);
}

/// Symmetric convolution against `b`, carrying a tail of `|b|-1`
/// previous (already-upsampled) samples so the result is identical to
/// convolving the whole concatenated stream in one call.
#[derive(Debug, Clone)]
struct SymmetricConvolver {
    b: Vec<f64>,
    tail: VecDeque<f64>,
}

impl SymmetricConvolver {
    fn new(b: Vec<f64>) -> Self {
        let tail_len = b.len() - 1;
        Self { b, tail: std::iter::repeat(0.0).take(tail_len).collect() }
    }

    fn push(&mut self, u: &[f64]) -> Vec<f64> {
        if u.is_empty() {
            return Vec::new();
        }
        let taps = self.b.len();
        let c = taps / 2;
        let mut ext: Vec<f64> = self.tail.iter().cloned().collect();
        ext.extend_from_slice(u);
        let mut out = Vec::with_capacity(u.len());
        for n in 0..u.len() {
            let mut acc = self.b[c] * ext[n + c];
            for k in 0..c {
                acc += self.b[k] * (ext[n + k] + ext[n + taps - 1 - k]);
            }
            out.push(acc);
        }
        let tail_len = taps - 1;
        let total = ext.len();
        self.tail = ext[total - tail_len..].iter().cloned().collect();
        out
    }
}

/// C1: the FIR filter engine.
#[derive(Debug, Clone)]
pub struct FirFilter {
    spec: FilterSpec,
    up: Upsampler,
    conv: SymmetricConvolver,
    down: PhaseDecimator,
    out_count_before: usize,
}

impl FirFilter {
    pub fn new(spec: FilterSpec) -> Self {
        let conv = SymmetricConvolver::new(spec.b.clone());
        let up = Upsampler::new(spec.up);
        let down = PhaseDecimator::new(spec.down);
        Self { spec, up, conv, down, out_count_before: 0 }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }
}

impl StreamingFilter for FirFilter {
    fn process(&mut self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let upsampled = self.up.push(x);
        let convolved = self.conv.push(&upsampled);
        self.down.decimate(&convolved)
    }

    fn processed_length(&self, n_in: usize) -> usize {
        let up_len = self.up.len_for(n_in);
        self.down.predict(up_len)
    }

    fn process_timed(&mut self, t: &[Timestamp], x: &[f64]) -> (Vec<Timestamp>, Vec<f64>) {
        debug_assert_eq!(t.len(), x.len());
        let out = self.process(x);
        // Times are decimated in lock-step at the overall up/down ratio,
        // with no interpolation: pick the input timestamp nearest each
        // output sample's position.
        let ratio_down = self.spec.down as f64 / self.spec.up as f64;
        let mut times = Vec::with_capacity(out.len());
        let base = self.out_count_before;
        for i in 0..out.len() {
            let pos = (base + i) as f64 * ratio_down;
            let idx = (pos.round() as usize).min(t.len().saturating_sub(1));
            times.push(t[idx]);
        }
        self.out_count_before += out.len();
        (times, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough_spec() -> FilterSpec {
        FilterSpec::new(vec![1.0], 1, 1, 1e-12).unwrap()
    }

    #[test]
    fn rejects_even_length_taps() {
        let err = FilterSpec::new(vec![1.0, 2.0], 1, 1, 1e-9);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_asymmetric_taps() {
        let err = FilterSpec::new(vec![1.0, 2.0, 3.0], 1, 1, 1e-9);
        assert!(err.is_err());
    }

    #[test]
    fn reduces_up_down_by_gcd() {
        let spec = FilterSpec::new(vec![1.0], 4, 6, 1e-9).unwrap();
        assert_eq!((spec.up, spec.down), (2, 3));
    }

    #[test]
    fn passthrough_filter_is_identity() {
        let mut f = FirFilter::new(passthrough_spec());
        let out = f.process(&[1.0, 2.0, 3.0]);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn continuity_across_call_boundaries() {
        let b = vec![0.1, 0.2, 0.4, 0.2, 0.1];
        let spec_whole = FilterSpec::new(b.clone(), 1, 1, 1e-9).unwrap();
        let spec_chunked = FilterSpec::new(b, 1, 1, 1e-9).unwrap();
        let x: Vec<f64> = (0..50).map(|i| (i as f64 * 0.3).sin()).collect();

        let mut whole = FirFilter::new(spec_whole);
        let one_shot = whole.process(&x);

        let mut chunked = FirFilter::new(spec_chunked);
        let mut pieces = Vec::new();
        for chunk in x.chunks(7) {
            pieces.extend(chunked.process(chunk));
        }
        assert_eq!(one_shot.len(), pieces.len());
        for (a, b) in one_shot.iter().zip(pieces.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn processed_length_matches_actual_output() {
        let b = vec![1.0, 2.0, 1.0];
        let spec = FilterSpec::new(b, 3, 5, 1e-9).unwrap();
        let mut f = FirFilter::new(spec);
        for chunk_len in [1usize, 4, 11, 2, 30] {
            let x: Vec<f64> = (0..chunk_len).map(|i| i as f64).collect();
            let predicted = f.processed_length(chunk_len);
            let actual = f.process(&x);
            assert_eq!(predicted, actual.len());
        }
    }

    #[test]
    fn empty_input_leaves_state_unchanged() {
        let mut f = FirFilter::new(passthrough_spec());
        assert!(f.process(&[]).is_empty());
        assert_eq!(f.process(&[5.0]), vec![5.0]);
    }
}
