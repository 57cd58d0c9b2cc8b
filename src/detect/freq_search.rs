//! Frequency-search stage (spec.md §4.6, C6): a worker that consumes
//! timestamped PCM samples and emits timestamped peak-frequency frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use std::time::Duration;

use crate::core::{ComponentLogger, DetectError, DetectResult, LogContext, Timestamp, WorkQueue};
use crate::dsp::common::normalize_to_max;
use crate::dsp::fft::{find_peaks, FftKit};
use crate::types::PeakFrame;

#[derive(Debug, Clone)]
pub struct FreqSearchParams {
    pub sample_length_ms: f64,
    pub freq_resolution_n: usize,
    pub fs: f64,
    pub max_num_peaks: usize,
    pub overlap: f64,
    pub delta: f64,
}

impl FreqSearchParams {
    fn n_step(&self) -> usize {
        (self.sample_length_ms * 1e-3 * self.fs).round() as usize
    }
}

/// Per-stage state machine from spec.md §4.7, reused verbatim by C6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageState {
    Idle,
    Running,
}

pub struct FreqSearchStage {
    params: RwLock<Option<FreqSearchParams>>,
    state: Mutex<StageState>,
    input: Arc<WorkQueue<(Timestamp, f64)>>,
    output: Mutex<VecDeque<PeakFrame>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    fatal: Arc<AtomicBool>,
}

impl FreqSearchStage {
    pub fn new(high_water: usize) -> Self {
        Self {
            params: RwLock::new(None),
            state: Mutex::new(StageState::Idle),
            input: Arc::new(WorkQueue::new("freq_search.input", high_water)),
            output: Mutex::new(VecDeque::new()),
            worker: Mutex::new(None),
            fatal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_params(&self, params: FreqSearchParams) -> DetectResult<()> {
        let mut state = self.state.lock().unwrap();
        if *state == StageState::Running {
            return Err(DetectError::InUse);
        }
        *self.params.write().unwrap() = Some(params);
        Ok(())
    }

    /// `put(t_calc, t_ref, signal)`. Never blocks beyond a brief mutex.
    pub fn put(&self, t: &[Timestamp], signal: &[f64]) {
        debug_assert_eq!(t.len(), signal.len());
        self.input.push_all(t.iter().cloned().zip(signal.iter().cloned()));
    }

    pub fn take_peaks(&self) -> Vec<PeakFrame> {
        self.output.lock().unwrap().drain(..).collect()
    }

    /// Spawns the worker thread; transitions Idle -> Running.
    pub fn start(
        self: &Arc<Self>,
        on_runtime_error: impl Fn(DetectError) + Send + 'static,
    ) -> DetectResult<()> {
        let params = self
            .params
            .read()
            .unwrap()
            .clone()
            .ok_or(DetectError::NotInitialized)?;
        {
            let mut state = self.state.lock().unwrap();
            if *state == StageState::Running {
                return Err(DetectError::InUse);
            }
            *state = StageState::Running;
        }

        let this = Arc::clone(self);
        let n_step = params.n_step();
        let kit = FftKit::new(params.freq_resolution_n);
        let handle = std::thread::spawn(move || {
            this.worker_loop(params, n_step, kit, on_runtime_error);
        });
        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn worker_loop(
        &self,
        params: FreqSearchParams,
        n_step: usize,
        kit: FftKit,
        on_runtime_error: impl Fn(DetectError),
    ) {
        self.info("worker started");
        loop {
            if !self.input.wait_until(n_step) {
                break;
            }
            if self.input.is_interrupted() {
                break;
            }
            let items = self.input.drain_front(n_step);
            let times: Vec<Timestamp> = items.iter().map(|(t, _)| *t).collect();
            let signal: Vec<f64> = items.iter().map(|(_, x)| *x).collect();

            match kit.spectrogram(&signal, n_step, params.overlap, params.fs) {
                Ok((freqs, t_centers, pages)) => {
                    // Each call feeds exactly one window's worth of new
                    // samples (`n_step`), so however many pages the STFT
                    // reports, the real-world cadence between them is
                    // `n_step / fs`: that is what the tone-assembler's
                    // downstream event-merging needs to line up against.
                    let hop = Duration::from_secs_f64(n_step as f64 / params.fs);
                    for (page, t_off) in pages.into_iter().zip(t_centers.into_iter()) {
                        let frame = self.process_page(&freqs, page, t_off, hop, &params, &times);
                        self.output.lock().unwrap().push_back(frame);
                    }
                }
                Err(e) => {
                    // Transient error (spec.md §7): logged, frame dropped, worker continues.
                    self.warn(&format!("dropping frame: {e}"));
                }
            }
        }
        *self.state.lock().unwrap() = StageState::Idle;
        self.info("worker stopped");
        let _ = &on_runtime_error;
    }

    fn process_page(
        &self,
        freqs: &[f64],
        mut page: Vec<f64>,
        t_off: f64,
        hop: Duration,
        params: &FreqSearchParams,
        times: &[Timestamp],
    ) -> PeakFrame {
        normalize_to_max(&mut page);
        let raw = page.clone();
        let (maxima, _minima) = find_peaks(&page, params.delta).unwrap_or_default();

        let t_calc = times
            .first()
            .copied()
            .unwrap_or_else(Timestamp::now)
            .advance(Duration::from_secs_f64(t_off));

        if maxima.len() > params.max_num_peaks {
            return PeakFrame { t_calc, hop, peaks: Vec::new(), levels: Vec::new() };
        }

        let peaks: Vec<f64> = maxima.iter().map(|&i| freqs[i]).collect();
        let levels: Vec<f64> = maxima.iter().map(|&i| raw[i]).collect();
        PeakFrame { t_calc, hop, peaks, levels }
    }

    pub fn interrupt(&self) {
        self.input.interrupt();
    }

    pub fn join(&self) {
        if let Some(h) = self.worker.lock().unwrap().take() {
            let _ = h.join();
        }
    }
}

impl ComponentLogger for FreqSearchStage {
    fn log_context(&self) -> LogContext {
        LogContext::new("FreqSearchStage", "C6")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FreqSearchParams {
        FreqSearchParams {
            sample_length_ms: 10.0,
            freq_resolution_n: 256,
            fs: 8000.0,
            max_num_peaks: 5,
            overlap: 0.0,
            delta: 0.1,
        }
    }

    #[test]
    fn rejects_use_before_params() {
        let stage = Arc::new(FreqSearchStage::new(1000));
        assert!(matches!(stage.start(|_| {}), Err(DetectError::NotInitialized)));
    }

    #[test]
    fn set_params_rejected_while_running() {
        let stage = Arc::new(FreqSearchStage::new(1000));
        stage.set_params(params()).unwrap();
        stage.start(|_| {}).unwrap();
        let err = stage.set_params(params());
        stage.interrupt();
        stage.join();
        assert!(matches!(err, Err(DetectError::InUse)));
    }

    #[test]
    fn emits_peak_frames_for_a_clean_tone() {
        let stage = Arc::new(FreqSearchStage::new(10_000));
        stage.set_params(params()).unwrap();
        stage.start(|_| {}).unwrap();

        let n = 80usize;
        let fs = 8000.0;
        let freq = 1270.0;
        let t: Vec<Timestamp> = (0..n).map(|_| Timestamp::now()).collect();
        let x: Vec<f64> = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / fs).sin())
            .collect();
        stage.put(&t, &x);

        std::thread::sleep(std::time::Duration::from_millis(100));
        let frames = stage.take_peaks();
        stage.interrupt();
        stage.join();
        assert!(!frames.is_empty());
    }
}
