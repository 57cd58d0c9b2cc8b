//! Filter designer (spec.md §4.3, C3): Hamming-windowed sinc low-pass
//! design, plus the C3a transition-width -> order solver.
//!
//! The teacher has no equivalent of this; the crates used here
//! (`splines` for the monotone cubic-spline interpolant, `levenberg-marquardt`
//! + `nalgebra` for the 1-D LM minimize) are new additions grounded in
//! spec.md §9's note that the source's Alglib dependency may be
//! substituted by "any equivalent numeric library" satisfying the same
//! mathematical contract. See DESIGN.md.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{Dyn, Owned, Vector1, U1};
use splines::{Interpolation, Key, Spline};

use crate::core::{ConfigError, ConfigResult};
use crate::dsp::common::{is_even, next_larger_even, next_smaller_even};
use crate::dsp::fft::FftKit;

/// `design_lowpass_from_order` (spec.md §4.3): Hamming-windowed sinc,
/// DC-gain normalized to 1.
pub fn design_lowpass_from_order(order: usize, fc: f64) -> ConfigResult<Vec<f64>> {
    if !is_even(order) {
        return Err(ConfigError::OrderParity { order });
    }
    if !(0.0..=1.0).contains(&fc) || fc == 0.0 {
        return Err(ConfigError::FcOutOfRange { fc });
    }
    let fc_ideal = fc - 3.3 / (order as f64 + 1.0);
    if !(fc_ideal > 0.0 && fc_ideal <= 1.0) {
        return Err(ConfigError::OrderTooLargeForCutoff {
            order,
            fc,
            max: next_smaller_even(3.3 / fc - 1.0),
        });
    }

    let n = order + 1;
    let m = order as f64 / 2.0;
    let window = crate::dsp::common::hamming(n);

    let mut b: Vec<f64> = (0..n)
        .map(|i| {
            let k = i as f64 - m;
            let sinc = if k == 0.0 {
                fc_ideal
            } else {
                (std::f64::consts::PI * fc_ideal * k).sin() / (std::f64::consts::PI * k)
            };
            sinc * window[i]
        })
        .collect();

    let dc: f64 = b.iter().sum();
    if dc != 0.0 {
        for v in b.iter_mut() {
            *v /= dc;
        }
    }
    Ok(b)
}

/// Evaluate `|H(f)|` of a FIR filter on a dense frequency grid via a
/// zero-padded FFT (numerator from `b`, denominator = 1, per spec.md
/// §4.3 step (ii)).
fn magnitude_response(b: &[f64], fs: f64, step_hz: f64) -> (Vec<f64>, Vec<f64>) {
    let n_fft = (fs / step_hz).next_power_of_two().max(b.len().next_power_of_two());
    let kit = FftKit::new(n_fft);
    kit.amplitude_fft(b, fs)
}

/// Monotone cubic-spline interpolant of a monotone-decreasing magnitude
/// response, then binary search for the frequency where `|H(f)| =
/// target` (spec.md §4.3 steps iii-iv).
fn frequency_at_level(freqs: &[f64], mags: &[f64], target: f64) -> Option<f64> {
    let keys: Vec<Key<f64, f64>> = freqs
        .iter()
        .zip(mags.iter())
        .map(|(&f, &m)| Key::new(f, m, Interpolation::CatmullRom))
        .collect();
    if keys.len() < 4 {
        return None;
    }
    let spline = Spline::from_vec(keys);

    let mut lo = freqs[0];
    let mut hi = *freqs.last().unwrap();
    // mags is monotone decreasing past the passband; binary search for
    // the crossing.
    for _ in 0..60 {
        let mid = (lo + hi) / 2.0;
        let v = spline.clamped_sample(mid)?;
        if v > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some((lo + hi) / 2.0)
}

/// `transition_width(order, fc_norm, fs)`: measured gap between the
/// real cutoff `fc` and the frequency where the response first drops
/// below 0.975, normalized by `fs`.
pub fn transition_width(order: usize, fc_norm: f64, fs: f64) -> ConfigResult<f64> {
    let b = design_lowpass_from_order(order, fc_norm)?;
    let (freqs, mags) = magnitude_response(&b, fs, 20.0);
    let fc_hz = fc_norm * fs / 2.0;
    let crossing = frequency_at_level(&freqs, &mags, 0.975).unwrap_or(fc_hz);
    Ok(((fc_hz - crossing) / fs).abs())
}

struct TransitionWidthProblem {
    order: f64,
    fc_norm: f64,
    fs: f64,
    target: f64,
}

impl LeastSquaresProblem<f64, U1, U1> for TransitionWidthProblem {
    type ParameterStorage = Owned<f64, U1>;
    type ResidualStorage = Owned<f64, U1>;
    type JacobianStorage = Owned<f64, U1, U1>;

    fn set_params(&mut self, params: &Vector1<f64>) {
        self.order = params[0];
    }

    fn params(&self) -> Vector1<f64> {
        Vector1::new(self.order)
    }

    fn residuals(&self) -> Option<Vector1<f64>> {
        let order = next_larger_even(self.order.max(2.0));
        let measured = transition_width(order, self.fc_norm, self.fs).unwrap_or(1.0);
        Some(Vector1::new(measured - self.target))
    }

    fn jacobian(&self) -> Option<nalgebra::OMatrix<f64, U1, U1>> {
        let h = 2.0;
        let order_lo = next_larger_even((self.order - h).max(2.0));
        let order_hi = next_larger_even(self.order + h);
        let lo = transition_width(order_lo, self.fc_norm, self.fs).unwrap_or(1.0);
        let hi = transition_width(order_hi, self.fc_norm, self.fs).unwrap_or(1.0);
        Some(nalgebra::OMatrix::<f64, U1, U1>::new(
            (hi - lo) / (order_hi as f64 - order_lo as f64).max(1.0),
        ))
    }
}

/// C3a: Levenberg-Marquardt search for the smallest even order whose
/// measured transition width matches `delta_f`, bounded by
/// `[nextLargerEven(3.3/fc_norm - 1) + 2, order_max]`.
pub fn solve_order_for_transition(
    delta_f: f64,
    fc_norm: f64,
    fs: f64,
    order_start: usize,
    order_max: usize,
) -> ConfigResult<usize> {
    if !(0.0..=1.0).contains(&fc_norm) || fc_norm == 0.0 {
        return Err(ConfigError::FcOutOfRange { fc: fc_norm });
    }
    let lower_bound = next_larger_even(3.3 / fc_norm - 1.0) + 2;
    if lower_bound > order_max {
        return Err(ConfigError::SamplingTooLow { fs, delta_f });
    }

    let problem = TransitionWidthProblem {
        order: order_start.clamp(lower_bound, order_max) as f64,
        fc_norm,
        fs,
        target: delta_f,
    };
    let (result, report) = LevenbergMarquardt::new().minimize(problem);
    if !report.termination.was_successful() {
        return Err(ConfigError::SamplingTooLow { fs, delta_f });
    }
    let order = next_larger_even(result.order).clamp(lower_bound, order_max);
    Ok(order)
}

/// `design_lowpass_from_transition` (spec.md §4.3): runs the solver then
/// calls `design_lowpass_from_order`.
pub fn design_lowpass_from_transition(
    delta_f: f64,
    fc: f64,
    fs: f64,
    order_start: usize,
    order_max: usize,
) -> ConfigResult<Vec<f64>> {
    let order = solve_order_for_transition(delta_f, fc, fs, order_start, order_max)?;
    design_lowpass_from_order(order, fc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_gain_is_normalized() {
        let b = design_lowpass_from_order(40, 0.3).unwrap();
        let sum: f64 = b.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn odd_order_is_rejected() {
        assert!(design_lowpass_from_order(41, 0.3).is_err());
    }

    #[test]
    fn fc_out_of_range_is_rejected() {
        assert!(design_lowpass_from_order(40, 0.0).is_err());
        assert!(design_lowpass_from_order(40, 1.5).is_err());
    }
}
