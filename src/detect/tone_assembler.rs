//! Tone-assembler stage (spec.md §4.7, C7): groups tone events into
//! candidate five-tone sequences, validates durations/periods/levels,
//! applies special-tone rewriting and near-duplicate suppression.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::core::{ComponentLogger, DetectError, DetectResult, LogContext, WorkQueue};
use crate::detect::tone_table::{LONG_ZERO_INDEX, REPETITION_INDEX};
use crate::types::{Sequence, ToneEvent, ToneRecord};

#[derive(Debug, Clone)]
pub struct ToneAssemblerParams {
    pub code_length: usize,
    pub excess_time: Duration,
    pub dt_max_twice: Duration,
    pub min_length: Duration,
    pub max_length: Duration,
    pub max_tone_level_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageState {
    Idle,
    Running,
}

pub struct ToneAssemblerStage {
    params: RwLock<Option<ToneAssemblerParams>>,
    state: Mutex<StageState>,
    input: Arc<WorkQueue<ToneEvent>>,
    output: Mutex<VecDeque<Sequence>>,
    last_emitted: Mutex<Option<(Vec<usize>, Instant)>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ToneAssemblerStage {
    pub fn new(high_water: usize) -> Self {
        Self {
            params: RwLock::new(None),
            state: Mutex::new(StageState::Idle),
            input: Arc::new(WorkQueue::new("tone_assembler.input", high_water)),
            output: Mutex::new(VecDeque::new()),
            last_emitted: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn set_params(&self, params: ToneAssemblerParams) -> DetectResult<()> {
        let mut state = self.state.lock().unwrap();
        if *state == StageState::Running {
            return Err(DetectError::InUse);
        }
        *self.params.write().unwrap() = Some(params);
        Ok(())
    }

    pub fn put(&self, event: ToneEvent) {
        self.input.push(event);
    }

    pub fn take_sequences(&self) -> Vec<Sequence> {
        self.output.lock().unwrap().drain(..).collect()
    }

    pub fn start(self: &Arc<Self>) -> DetectResult<()> {
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
        let handle = std::thread::spawn(move || this.worker_loop(params));
        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn worker_loop(&self, params: ToneAssemblerParams) {
        self.info("worker started");
        let mut buffer: Vec<ToneEvent> = Vec::new();
        loop {
            if !self.input.wait_until(1) {
                break;
            }
            if self.input.is_interrupted() {
                break;
            }
            let new_events = self.input.drain_all();
            // Re-condense against the buffer's own tail too: a tone's
            // frames can straddle two `drain_all` batches, and without
            // this the second batch would start a spurious new event.
            let mut to_condense = Vec::with_capacity(new_events.len() + 1);
            if let Some(tail) = buffer.pop() {
                to_condense.push(tail);
            }
            to_condense.extend(new_events);
            buffer.extend(condense_overlapping(to_condense));

            // Analysis is forward-only (spec.md §9 open question): once a
            // window has been judged, newly arrived events never
            // retroactively change it.
            while buffer.len() >= params.code_length {
                let window = &buffer[..params.code_length];
                if let Some(seq) = analyze_window(window, &params) {
                    self.emit_if_not_duplicate(seq, &params);
                }
                buffer.remove(0);
            }
        }
        *self.state.lock().unwrap() = StageState::Idle;
        self.info("worker stopped");
    }

    fn emit_if_not_duplicate(&self, seq: Sequence, params: &ToneAssemblerParams) {
        let code = seq.code();
        let mut last = self.last_emitted.lock().unwrap();
        let is_duplicate = match last.as_ref() {
            Some((prev_code, prev_t)) => {
                *prev_code == code && seq.t_calc_start.duration_since(*prev_t) <= params.dt_max_twice
            }
            None => false,
        };
        if is_duplicate {
            self.debug("dropped near-duplicate sequence");
            return;
        }
        *last = Some((code, seq.t_calc_start));
        drop(last);
        self.output.lock().unwrap().push_back(seq);
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

impl ComponentLogger for ToneAssemblerStage {
    fn log_context(&self) -> LogContext {
        LogContext::new("ToneAssemblerStage", "C7")
    }
}

/// Merge same-tone-index events whose raw time spans overlap into a
/// single event, before the duration test (spec.md §4.7, "Tone
/// classification").
fn condense_overlapping(mut events: Vec<ToneEvent>) -> Vec<ToneEvent> {
    events.sort_by_key(|e| e.t.calc);
    let mut out: Vec<ToneEvent> = Vec::with_capacity(events.len());
    for e in events {
        if let Some(last) = out.last_mut() {
            if last.tone_index == e.tone_index && e.t.calc <= last.t_calc_end {
                last.t_calc_end = last.t_calc_end.max(e.t_calc_end);
                last.abs_level = last.abs_level.max(e.abs_level);
                continue;
            }
        }
        out.push(e);
    }
    out
}

/// A fixed-size (`code_length`) slice is the analysis window; this
/// function is pure and returns a sequence only when every event in
/// the window survives the length, period and amplitude gates.
fn analyze_window(window: &[ToneEvent], params: &ToneAssemblerParams) -> Option<Sequence> {
    let mut events = window.to_vec();
    events.sort_by_key(|e| e.t.calc);

    let n = events.len();
    let mut lengths = Vec::with_capacity(n);
    let mut periods = Vec::with_capacity(n);
    for (i, e) in events.iter().enumerate() {
        let length = e.t_calc_end.saturating_duration_since(e.t.calc) + params.excess_time;
        let period = if i + 1 < n {
            let gap = events[i + 1].t.calc.saturating_duration_since(e.t.calc);
            length.max(gap)
        } else {
            length
        };
        lengths.push(length);
        periods.push(period);
    }

    let in_band = |d: Duration| d > params.min_length && d < params.max_length;

    if !lengths.iter().all(|&l| in_band(l)) {
        return None;
    }
    for (i, &p) in periods.iter().enumerate() {
        let is_last = i + 1 == n;
        if !is_last && !in_band(p) {
            return None;
        }
    }

    let base_level = events[0].abs_level;
    for e in events.iter().skip(1) {
        let ratio = e.abs_level / base_level;
        if ratio < 1.0 / params.max_tone_level_ratio || ratio > params.max_tone_level_ratio {
            return None;
        }
    }

    let mut tones: Vec<ToneRecord> = Vec::with_capacity(n);
    for (i, e) in events.iter().enumerate() {
        let mut idx = e.tone_index;
        if idx == LONG_ZERO_INDEX {
            idx = 0;
        } else if idx == REPETITION_INDEX {
            match tones.last() {
                Some(prev) => idx = prev.tone_index,
                None => return None,
            }
        }
        tones.push(ToneRecord {
            t: e.t,
            tone_index: idx,
            length: lengths[i],
            period: periods[i],
            frequency: e.frequency,
            abs_level: e.abs_level,
        });
    }

    Some(Sequence {
        t_ref_start: tones[0].t.ref_utc_ns,
        t_calc_start: tones[0].t.calc,
        tones,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Timestamp;

    fn params() -> ToneAssemblerParams {
        ToneAssemblerParams {
            code_length: 5,
            excess_time: Duration::from_millis(0),
            dt_max_twice: Duration::from_millis(200),
            min_length: Duration::from_millis(50),
            max_length: Duration::from_millis(200),
            max_tone_level_ratio: 2.0,
        }
    }

    fn make_events(indices: &[usize], start: Instant) -> Vec<ToneEvent> {
        indices
            .iter()
            .enumerate()
            .map(|(i, &idx)| {
                let t0 = start + Duration::from_millis(70 * i as u64);
                ToneEvent {
                    tone_index: idx,
                    t: Timestamp::new(t0, 0),
                    t_calc_end: t0 + Duration::from_millis(70),
                    frequency: 1000.0,
                    abs_level: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn s1_clean_code_is_emitted() {
        let events = make_events(&[1, 2, 3, 4, 5], Instant::now());
        let seq = analyze_window(&events, &params()).expect("sequence");
        assert_eq!(seq.code(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn s3_long_zero_is_rewritten() {
        let events = make_events(&[LONG_ZERO_INDEX, 2, 3, 4, 5], Instant::now());
        let seq = analyze_window(&events, &params()).expect("sequence");
        assert_eq!(seq.code()[0], 0);
    }

    #[test]
    fn s2_repetition_copies_preceding_tone() {
        let events = make_events(&[1, 6, REPETITION_INDEX, 4, 5], Instant::now());
        let seq = analyze_window(&events, &params()).expect("sequence");
        assert_eq!(seq.code(), vec![1, 6, 6, 4, 5]);
    }

    #[test]
    fn repetition_as_first_tone_discards_sequence() {
        let events = make_events(&[REPETITION_INDEX, 2, 3, 4, 5], Instant::now());
        assert!(analyze_window(&events, &params()).is_none());
    }

    #[test]
    fn s4_amplitude_gate_rejects_sequence() {
        let mut events = make_events(&[1, 2, 3, 4, 5], Instant::now());
        events[2].abs_level = 0.5 / params().max_tone_level_ratio - 0.01;
        assert!(analyze_window(&events, &params()).is_none());
    }

    #[test]
    fn s6_too_short_tones_are_rejected() {
        let indices = [1, 2, 3, 4, 5];
        let start = Instant::now();
        let events: Vec<ToneEvent> = indices
            .iter()
            .enumerate()
            .map(|(i, &idx)| {
                let t0 = start + Duration::from_millis(30 * i as u64);
                ToneEvent {
                    tone_index: idx,
                    t: Timestamp::new(t0, 0),
                    t_calc_end: t0 + Duration::from_millis(30),
                    frequency: 1000.0,
                    abs_level: 1.0,
                }
            })
            .collect();
        assert!(analyze_window(&events, &params()).is_none());
    }
}
