//! Audio capture collaborator (spec.md §6): external to the core, the
//! core only depends on this trait. `alsa`-backed and synthetic
//! (in-memory) implementations are provided for the example binary and
//! tests respectively.

use crate::core::{ComponentLogger, DetectError, DetectResult, LogContext, Timestamp};

/// The standard sampling rates a capture device may report, largest
/// first (spec.md §6: "max standard sampling rate" enumerator).
pub const STANDARD_SAMPLING_RATES: [u32; 6] = [96_000, 88_200, 48_000, 44_100, 22_050, 11_025];

pub fn max_standard_rate(supported: &[u32]) -> Option<u32> {
    STANDARD_SAMPLING_RATES.iter().copied().find(|r| supported.contains(r))
}

pub trait AudioCapture: Send {
    fn start(&mut self) -> DetectResult<()>;
    fn stop(&mut self) -> DetectResult<()>;
    fn is_running(&self) -> bool;

    /// Blocks until the next chunk is available from the device
    /// (or a device error occurs); returns `(t_calc, t_ref, samples)`.
    fn next_chunk(&mut self) -> DetectResult<(Vec<Timestamp>, Vec<f32>)>;
}

/// In-memory capture source used by tests and S1-S7 scenario fixtures:
/// plays back a precomputed signal in caller-controlled chunk sizes,
/// mirroring the teacher's synthetic-producer test doubles.
pub struct SyntheticCapture {
    samples: Vec<f32>,
    chunk_size: usize,
    cursor: usize,
    fs: f64,
    running: bool,
}

impl SyntheticCapture {
    pub fn new(samples: Vec<f32>, chunk_size: usize, fs: f64) -> Self {
        Self { samples, chunk_size, cursor: 0, fs, running: false }
    }
}

impl AudioCapture for SyntheticCapture {
    fn start(&mut self) -> DetectResult<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> DetectResult<()> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn next_chunk(&mut self) -> DetectResult<(Vec<Timestamp>, Vec<f32>)> {
        if !self.running {
            return Err(DetectError::NotInitialized);
        }
        if self.cursor >= self.samples.len() {
            return Ok((Vec::new(), Vec::new()));
        }
        let end = (self.cursor + self.chunk_size).min(self.samples.len());
        let chunk = self.samples[self.cursor..end].to_vec();
        let dt = std::time::Duration::from_secs_f64(1.0 / self.fs);
        let base = Timestamp::now();
        let times: Vec<Timestamp> = (0..chunk.len()).map(|i| base.advance(dt * i as u32)).collect();
        self.cursor = end;
        Ok((times, chunk))
    }
}

impl ComponentLogger for SyntheticCapture {
    fn log_context(&self) -> LogContext {
        LogContext::new("SyntheticCapture", "memory")
    }
}
