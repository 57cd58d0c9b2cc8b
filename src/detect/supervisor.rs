//! Pipeline supervisor (spec.md §4.9, C9): wires the stages, applies
//! admission-time parameters, propagates fatal errors, enforces the
//! alarm blacklist/whitelist and shuts the pipeline down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::capture::AudioCapture;
use crate::core::{ComponentLogger, DetectError, DetectResult, LogContext};
use crate::detect::freq_search::{FreqSearchParams, FreqSearchStage};
use crate::detect::recording_buffer::{RecordingBuffer, RecordingBufferParams};
use crate::detect::tone_assembler::{ToneAssemblerParams, ToneAssemblerStage};
use crate::detect::tone_table::{match_tone, ToneTableEntry};
use crate::dsp::downsampler::FullDownsampler;
use crate::notify::{FoundSequence, NotificationSink};
use crate::sink::AudioSinkPlugin;
use crate::types::ToneEvent;

pub struct SupervisorParams {
    pub tone_table: Vec<ToneTableEntry>,
    pub tone_match_tolerance_hz: f64,
    pub min_distance_repetition: Duration,
    pub record_time_upper: Duration,
    pub whitelist: Vec<Vec<usize>>,
    pub default_recording: bool,
}

struct BlacklistEntry {
    t: Instant,
    code: Vec<usize>,
}

/// C9. Owns the worker threads for C6/C7 plus the polling thread that
/// drives capture -> C5 -> (C6, C8) and joins the final notification.
pub struct PipelineSupervisor {
    params: SupervisorParams,
    freq_search: Arc<FreqSearchStage>,
    tone_assembler: Arc<ToneAssemblerStage>,
    downsampler: Arc<FullDownsampler>,
    recording: Mutex<RecordingBuffer>,
    blacklist: Mutex<Vec<BlacklistEntry>>,
    running: Arc<AtomicBool>,
}

impl PipelineSupervisor {
    pub fn new(
        params: SupervisorParams,
        freq_search_params: FreqSearchParams,
        tone_assembler_params: ToneAssemblerParams,
        downsampler: FullDownsampler,
        recording_params: RecordingBufferParams,
        rec_fs: f64,
        high_water: usize,
    ) -> DetectResult<Self> {
        let freq_search = Arc::new(FreqSearchStage::new(high_water));
        freq_search.set_params(freq_search_params)?;

        let tone_assembler = Arc::new(ToneAssemblerStage::new(high_water));
        tone_assembler.set_params(tone_assembler_params)?;

        Ok(Self {
            params,
            freq_search,
            tone_assembler,
            downsampler: Arc::new(downsampler),
            recording: Mutex::new(RecordingBuffer::new(recording_params, rec_fs)),
            blacklist: Mutex::new(Vec::new()),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Runs the pipeline to completion reading from `capture`, calling
    /// `notify` for each admitted sequence. Returns when `capture`
    /// yields an empty chunk (end of stream) or a fatal device error.
    pub fn run(
        &self,
        mut capture: impl AudioCapture,
        sink: &dyn AudioSinkPlugin,
        notify: &dyn NotificationSink,
    ) -> DetectResult<()> {
        self.running.store(true, Ordering::SeqCst);
        self.freq_search.start(|_| {})?;
        self.tone_assembler.start()?;
        capture.start()?;
        self.info("pipeline running");

        let result = self.drive_loop(&mut capture, sink, notify);

        capture.stop().ok();
        if result.is_ok() {
            // End of stream, not a fatal error: give the C6/C7 workers a
            // bounded window to finish consuming what's already queued
            // before tearing them down, so the stream's last sequence
            // isn't silently dropped by an immediate interrupt.
            self.drain_remaining(sink, notify);
        }
        self.freq_search.interrupt();
        self.tone_assembler.interrupt();
        self.freq_search.join();
        self.tone_assembler.join();
        self.running.store(false, Ordering::SeqCst);
        self.info("pipeline stopped");
        result
    }

    fn drive_loop(
        &self,
        capture: &mut dyn AudioCapture,
        sink: &dyn AudioSinkPlugin,
        notify: &dyn NotificationSink,
    ) -> DetectResult<()> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Ok(());
            }
            let (t, x) = match capture.next_chunk() {
                Ok((t, x)) => (t, x),
                Err(e) if matches!(e, DetectError::NoInputDevice | DetectError::DeviceUnavailable { .. }) => {
                    self.error(&format!("capture device fatal: {e}"));
                    return Err(e);
                }
                Err(e) => {
                    self.warn(&format!("transient capture error: {e}"));
                    continue;
                }
            };
            if x.is_empty() {
                return Ok(());
            }

            let x64: Vec<f64> = x.iter().map(|&s| s as f64).collect();
            let ((t_proc, x_proc), (t_rec, x_rec)) = self.downsampler.process(&t, &x64);

            let x_rec32: Vec<f32> = x_rec.iter().map(|&v| v as f32).collect();
            self.recording.lock().unwrap().push(&t_rec, &x_rec32);

            self.freq_search.put(&t_proc, &x_proc);

            for frame in self.freq_search.take_peaks() {
                for (freq, level) in frame.peaks.iter().zip(frame.levels.iter()) {
                    if let Some(tone_index) =
                        match_tone(*freq, &self.params.tone_table, self.params.tone_match_tolerance_hz)
                    {
                        self.tone_assembler.put(ToneEvent {
                            tone_index,
                            t: frame.t_calc,
                            t_calc_end: frame.t_calc.calc + frame.hop,
                            frequency: *freq,
                            abs_level: *level,
                        });
                    }
                }
            }

            for seq in self.tone_assembler.take_sequences() {
                self.admit_sequence(seq, sink, notify);
            }
        }
    }

    fn admit_sequence(
        &self,
        seq: crate::types::Sequence,
        sink: &dyn AudioSinkPlugin,
        notify: &dyn NotificationSink,
    ) {
        self.prune_blacklist();
        let code = seq.code();

        if !self.passes_whitelist(&code) {
            self.record_blacklist(&code, seq.t_calc_start);
            return;
        }
        if self.is_recent_repetition(&code, seq.t_calc_start) {
            self.record_blacklist(&code, seq.t_calc_start);
            return;
        }

        let found = FoundSequence { t_ref_start: seq.t_ref_start, code: code.clone() };
        notify.on_found_sequence(&found);

        let excerpt = self.recording.lock().unwrap().excerpt_for(&seq);
        notify.on_recorded_data(&found, &excerpt);
        let path = crate::sink::default_path(std::path::Path::new("."), seq.t_ref_start, &code);
        if let Err(e) = sink.save(&path, &excerpt.samples, excerpt.fs as u32, true) {
            self.warn(&format!("recording save failed: {e}"));
        }

        self.record_blacklist(&code, seq.t_calc_start);
    }

    fn passes_whitelist(&self, code: &[usize]) -> bool {
        if self.params.default_recording {
            return true;
        }
        self.params.whitelist.iter().any(|w| w == code)
    }

    fn is_recent_repetition(&self, code: &[usize], t: Instant) -> bool {
        self.blacklist
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.code == code && t.saturating_duration_since(e.t) <= self.params.min_distance_repetition)
    }

    fn record_blacklist(&self, code: &[usize], t: Instant) {
        self.blacklist.lock().unwrap().push(BlacklistEntry { t, code: code.to_vec() });
    }

    fn prune_blacklist(&self) {
        // spec.md §4.9: pruned on each admission, older than
        // max(min_distance_repetition, record_time_upper) * 2.
        let max_age = self.params.min_distance_repetition.max(self.params.record_time_upper) * 2;
        let now = Instant::now();
        self.blacklist
            .lock()
            .unwrap()
            .retain(|e| now.saturating_duration_since(e.t) <= max_age);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl ComponentLogger for PipelineSupervisor {
    fn log_context(&self) -> LogContext {
        LogContext::new("PipelineSupervisor", "C9")
    }
}

