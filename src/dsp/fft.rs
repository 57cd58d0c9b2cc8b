//! FFT + data-processing kit (spec.md §4.4, C4): amplitude/complex FFT,
//! STFT/spectrogram with Hamming window and one-sided PSD conversion,
//! and Billauer's peak finder.
//!
//! Grounded in the teacher's use of a fixed-size, `init`-once transform
//! (generalized from `SamiPerttu-fundsp`'s FFT usage pattern); the
//! teacher itself has no FFT, so this introduces `realfft`/`rustfft`/
//! `num-complex` as new, genuinely-fetchable crates (see DESIGN.md).

use num_complex::Complex64;
use realfft::RealFftPlanner;
use std::sync::Arc;

use crate::core::{ConfigError, ConfigResult};
use crate::dsp::common::hamming;

/// Fixed-size real FFT, configured once via `new(n)` and reused for
/// every transform (spec.md: "configured once via init(N) then reused").
pub struct FftKit {
    n: usize,
    planner_fwd: Arc<dyn realfft::RealToComplex<f64>>,
}

impl FftKit {
    pub fn new(n: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let planner_fwd = planner.plan_fft_forward(n);
        Self { n, planner_fwd }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    fn fit(&self, x: &[f64]) -> Vec<f64> {
        let mut buf = vec![0.0; self.n];
        let take = x.len().min(self.n);
        buf[..take].copy_from_slice(&x[..take]);
        buf
    }

    fn forward(&self, x: &[f64]) -> Vec<Complex64> {
        let mut input = self.fit(x);
        let mut spectrum = self.planner_fwd.make_output_vec();
        self.planner_fwd.process(&mut input, &mut spectrum).expect("fft size mismatch");
        spectrum
    }

    /// One-sided amplitude spectrum `|X|/N·2`; upper half zeroed.
    pub fn amplitude_fft(&self, x: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
        let spectrum = self.forward(x);
        let freqs = self.freq_axis(fs);
        let amp = spectrum
            .iter()
            .enumerate()
            .map(|(k, c)| if k * 2 <= self.n { c.norm() / self.n as f64 * 2.0 } else { 0.0 })
            .collect();
        (freqs, amp)
    }

    /// One-sided complex spectrum, same zeroing convention as
    /// `amplitude_fft`.
    pub fn complex_fft(&self, x: &[f64], fs: f64) -> (Vec<f64>, Vec<Complex64>) {
        let mut spectrum = self.forward(x);
        for (k, c) in spectrum.iter_mut().enumerate() {
            if k * 2 > self.n {
                *c = Complex64::new(0.0, 0.0);
            }
        }
        (self.freq_axis(fs), spectrum)
    }

    /// Inverse transform of a complex half-spectrum back to the time
    /// domain.
    pub fn inverse_fft(&self, spectrum: &[Complex64], fs: f64) -> (Vec<f64>, Vec<f64>) {
        let mut planner = RealFftPlanner::<f64>::new();
        let inv = planner.plan_fft_inverse(self.n);
        let mut scratch = inv.make_input_vec();
        let take = spectrum.len().min(scratch.len());
        scratch[..take].copy_from_slice(&spectrum[..take]);
        let mut out = inv.make_output_vec();
        inv.process(&mut scratch, &mut out).expect("ifft size mismatch");
        for v in out.iter_mut() {
            *v /= self.n as f64;
        }
        let dt = 1.0 / fs;
        let t = (0..out.len()).map(|i| i as f64 * dt).collect();
        (t, out)
    }

    fn freq_axis(&self, fs: f64) -> Vec<f64> {
        let bins = self.n / 2 + 1;
        (0..bins).map(|k| k as f64 * fs / self.n as f64).collect()
    }

    /// STFT/spectrogram (spec.md §4.4): Hamming-windowed pages advancing
    /// by `(1-overlap)*N_step`, one-sided PSD conversion with DC/Nyquist
    /// halving.
    pub fn spectrogram(
        &self,
        x: &[f64],
        n_step: usize,
        overlap: f64,
        fs: f64,
    ) -> ConfigResult<(Vec<f64>, Vec<f64>, Vec<Vec<f64>>)> {
        if !(0.0..1.0).contains(&overlap) {
            return Err(ConfigError::OverlapOutOfRange { overlap });
        }
        let advance = spectrogram_advance(n_step, overlap);
        let window = hamming(n_step);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let k = 2.0 / (fs * window_power);

        let n_pages = num_spectrogram_timesteps(x.len(), overlap, n_step);
        let mut pages = Vec::with_capacity(n_pages);
        let mut t_centers = Vec::with_capacity(n_pages);

        let mut start = 0usize;
        for _ in 0..n_pages {
            let end = (start + n_step).min(x.len());
            let mut page = vec![0.0; n_step];
            for (i, s) in x[start..end].iter().enumerate() {
                page[i] = s * window[i];
            }
            let spectrum = self.forward(&page);
            let bins = self.n / 2 + 1;
            let mut psd = vec![0.0; bins];
            for (bin, c) in spectrum.iter().take(bins).enumerate() {
                let mut v = c.norm_sqr() * k;
                if bin == 0 || bin == bins - 1 {
                    v *= 0.5;
                }
                psd[bin] = v;
            }
            pages.push(psd);
            let center = start as f64 + n_step as f64 / 2.0;
            t_centers.push(center / fs);
            start += advance;
        }

        let freqs = self.freq_axis(fs);
        Ok((freqs, t_centers, pages))
    }
}

/// Sample stride between consecutive spectrogram pages; shared by
/// `spectrogram` and its predictors so a page's time extent can be
/// recovered without re-deriving the rounding.
pub fn spectrogram_advance(n_step: usize, overlap: f64) -> usize {
    (((1.0 - overlap) * n_step as f64).round() as usize).max(1)
}

/// Pure predictor for `spectrogram`'s page count, used for
/// preallocation (spec.md §4.4, testable property 6).
pub fn num_spectrogram_timesteps(n_in: usize, overlap: f64, n_step: usize) -> usize {
    if n_in < n_step || n_step == 0 {
        return 0;
    }
    let advance = spectrogram_advance(n_step, overlap);
    (n_in - n_step) / advance + 1
}

/// Billauer's left-neighbor-delta peak finder (spec.md §4.4).
/// `delta` must be non-negative.
pub fn find_peaks(x: &[f64], delta: f64) -> ConfigResult<(Vec<usize>, Vec<usize>)> {
    if delta < 0.0 {
        return Err(ConfigError::DeltaNegative { delta });
    }
    let mut maxima = Vec::new();
    let mut minima = Vec::new();
    if x.is_empty() {
        return Ok((maxima, minima));
    }

    let mut min_val = x[0];
    let mut max_val = x[0];
    let mut min_pos = 0;
    let mut max_pos = 0;
    let mut looking_for_max = true;

    for (i, &v) in x.iter().enumerate() {
        if v > max_val {
            max_val = v;
            max_pos = i;
        }
        if v < min_val {
            min_val = v;
            min_pos = i;
        }

        if looking_for_max {
            if v < max_val - delta {
                maxima.push(max_pos);
                min_val = v;
                min_pos = i;
                looking_for_max = false;
            }
        } else if v > min_val + delta {
            minima.push(min_pos);
            max_val = v;
            max_pos = i;
            looking_for_max = true;
        }
    }

    Ok((maxima, minima))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrogram_frame_count_matches_predictor() {
        let kit = FftKit::new(64);
        let x: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.05).sin()).collect();
        let (_, _, pages) = kit.spectrogram(&x, 64, 0.5, 8000.0).unwrap();
        assert_eq!(pages.len(), num_spectrogram_timesteps(x.len(), 0.5, 64));
    }

    #[test]
    fn overlap_out_of_range_is_rejected() {
        let kit = FftKit::new(64);
        let x = vec![0.0; 128];
        assert!(kit.spectrogram(&x, 64, 1.0, 8000.0).is_err());
    }

    #[test]
    fn peak_finder_rejects_negative_delta() {
        assert!(find_peaks(&[1.0, 2.0, 1.0], -1.0).is_err());
    }

    #[test]
    fn peak_finder_finds_single_max() {
        let x = vec![0.0, 1.0, 3.0, 1.0, 0.0, -1.0, 0.0];
        let (maxima, minima) = find_peaks(&x, 0.5).unwrap();
        assert_eq!(maxima, vec![2]);
        assert_eq!(minima, vec![5]);
    }

    #[test]
    fn amplitude_fft_of_dc_signal_peaks_at_bin_zero() {
        let kit = FftKit::new(32);
        let x = vec![1.0; 32];
        let (freqs, amp) = kit.amplitude_fft(&x, 1000.0);
        assert_eq!(freqs[0], 0.0);
        assert!(amp[0] > amp[1]);
    }
}
