//! Full downsampler (spec.md §4.5, C5): drives two FIR chains, a
//! *processing* stream and a *recording* stream, reusing one chain's
//! output as the other's input when the down factors divide evenly.

use std::sync::RwLock;

use crate::core::{DetectError, DetectResult, Timestamp};
use crate::dsp::fir::{FilterSpec, FirFilter, StreamingFilter};

enum Strategy {
    /// `down_rec % down_proc == 0`: stage A produces the proc stream,
    /// stage B chains from A's output for the rec stream.
    ChainProcToRec { stage_a: FirFilter, stage_b: FirFilter },
    /// `down_proc % down_rec == 0`: stage A produces the rec stream,
    /// stage B chains from A's output for the proc stream.
    ChainRecToProc { stage_a: FirFilter, stage_b: FirFilter },
    /// Down factors share no useful relationship: two independent
    /// filters, either bypassing filtering when its own `down == 1`.
    Independent { proc: FirFilter, rec: FirFilter },
}

pub struct ProcessedLengths {
    pub proc: usize,
    pub rec: usize,
}

struct Params {
    strategy: Strategy,
}

/// C5. Parameter mutation is guarded by a writer lock; `process`
/// acquires a reader lock (spec.md §4.5).
pub struct FullDownsampler {
    params: RwLock<Params>,
}

impl FullDownsampler {
    pub fn new(proc_spec: FilterSpec, rec_spec: FilterSpec) -> DetectResult<Self> {
        let strategy = Self::pick_strategy(proc_spec, rec_spec)?;
        Ok(Self { params: RwLock::new(Params { strategy }) })
    }

    fn pick_strategy(proc_spec: FilterSpec, rec_spec: FilterSpec) -> DetectResult<Strategy> {
        let (down_proc, down_rec) = (proc_spec.down, rec_spec.down);
        if down_proc > 1 && down_rec > 1 && down_rec % down_proc == 0 {
            let stage_a = FirFilter::new(proc_spec);
            let ratio = down_rec / down_proc;
            let stage_b_spec = FilterSpec::new(rec_spec.b.clone(), 1, ratio, 1e-9)
                .map_err(|e| DetectError::with_context("C5 chain B spec", e))?;
            let stage_b = FirFilter::new(stage_b_spec);
            Ok(Strategy::ChainProcToRec { stage_a, stage_b })
        } else if down_proc > 1 && down_rec > 1 && down_proc % down_rec == 0 {
            let stage_a = FirFilter::new(rec_spec);
            let ratio = down_proc / down_rec;
            let stage_b_spec = FilterSpec::new(proc_spec.b.clone(), 1, ratio, 1e-9)
                .map_err(|e| DetectError::with_context("C5 chain B spec", e))?;
            let stage_b = FirFilter::new(stage_b_spec);
            Ok(Strategy::ChainRecToProc { stage_a, stage_b })
        } else {
            Ok(Strategy::Independent {
                proc: FirFilter::new(proc_spec),
                rec: FirFilter::new(rec_spec),
            })
        }
    }

    /// Pure predictor for preallocation (testable property 2).
    pub fn processed_lengths(&self, n_in: usize) -> ProcessedLengths {
        let params = self.params.read().unwrap();
        match &params.strategy {
            Strategy::ChainProcToRec { stage_a, stage_b } => {
                let proc = stage_a.processed_length(n_in);
                let rec = stage_b.processed_length(proc);
                ProcessedLengths { proc, rec }
            }
            Strategy::ChainRecToProc { stage_a, stage_b } => {
                let rec = stage_a.processed_length(n_in);
                let proc = stage_b.processed_length(rec);
                ProcessedLengths { proc, rec }
            }
            Strategy::Independent { proc, rec } => ProcessedLengths {
                proc: proc.processed_length(n_in),
                rec: rec.processed_length(n_in),
            },
        }
    }

    /// Process one chunk, yielding exactly the lengths reported in
    /// advance by `processed_lengths`.
    pub fn process(
        &self,
        t: &[Timestamp],
        x: &[f64],
    ) -> ((Vec<Timestamp>, Vec<f64>), (Vec<Timestamp>, Vec<f64>)) {
        let mut params = self.params.write().unwrap();
        match &mut params.strategy {
            Strategy::ChainProcToRec { stage_a, stage_b } => {
                let (t_proc, x_proc) = stage_a.process_timed(t, x);
                let (t_rec, x_rec) = stage_b.process_timed(&t_proc, &x_proc);
                ((t_proc, x_proc), (t_rec, x_rec))
            }
            Strategy::ChainRecToProc { stage_a, stage_b } => {
                let (t_rec, x_rec) = stage_a.process_timed(t, x);
                let (t_proc, x_proc) = stage_b.process_timed(&t_rec, &x_rec);
                ((t_proc, x_proc), (t_rec, x_rec))
            }
            Strategy::Independent { proc, rec } => {
                let p = proc.process_timed(t, x);
                let r = rec.process_timed(t, x);
                (p, r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn ts(i: u64) -> Timestamp {
        Timestamp::new(Instant::now(), i)
    }

    fn lowpass_spec(down: usize) -> FilterSpec {
        FilterSpec::new(vec![0.05, 0.1, 0.3, 0.3, 0.1, 0.05, 0.1], 1, down, 1e-9).unwrap()
    }

    #[test]
    fn chained_strategy_matches_predictor() {
        let ds = FullDownsampler::new(lowpass_spec(2), lowpass_spec(6)).unwrap();
        let x: Vec<f64> = (0..97).map(|i| i as f64).collect();
        let t: Vec<Timestamp> = (0..97).map(|i| ts(i as u64)).collect();
        let predicted = ds.processed_lengths(x.len());
        let ((_, xp), (_, xr)) = ds.process(&t, &x);
        assert_eq!(xp.len(), predicted.proc);
        assert_eq!(xr.len(), predicted.rec);
    }

    #[test]
    fn continuity_across_chunking_s7() {
        let ds_whole = FullDownsampler::new(lowpass_spec(3), lowpass_spec(9)).unwrap();
        let ds_chunked = FullDownsampler::new(lowpass_spec(3), lowpass_spec(9)).unwrap();
        let x: Vec<f64> = (0..480).map(|i| ((i as f64) * 0.037).sin()).collect();
        let t: Vec<Timestamp> = (0..480).map(|i| ts(i as u64)).collect();

        let (_, (_, rec_whole)) = ds_whole.process(&t, &x);

        let mut rec_chunked = Vec::new();
        for (tc, xc) in t.chunks(23).zip(x.chunks(23)) {
            let (_, (_, r)) = ds_chunked.process(tc, xc);
            rec_chunked.extend(r);
        }

        assert_eq!(rec_whole.len(), rec_chunked.len());
        for (a, b) in rec_whole.iter().zip(rec_chunked.iter()) {
            assert!((a - b).abs() < 1e-7);
        }
    }
}
