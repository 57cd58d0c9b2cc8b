//! Audio sink plugin collaborator (spec.md §6): the core treats the
//! file format as the plugin's choice. `WavSink` gives the recording
//! buffer a concrete default, grounded in the teacher's dependency on
//! `hound` for WAV output.

use std::path::{Path, PathBuf};

use crate::core::{DetectError, DetectResult};

pub trait AudioSinkPlugin: Send + Sync {
    fn save(&self, path: &Path, samples: &[f32], fs: u32, amplify: bool) -> DetectResult<()>;
    fn file_extension(&self) -> &'static str;
}

pub struct WavSink;

impl AudioSinkPlugin for WavSink {
    fn save(&self, path: &Path, samples: &[f32], fs: u32, amplify: bool) -> DetectResult<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: fs,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| DetectError::with_context("creating wav writer", e))?;

        let peak = samples.iter().fold(0.0_f32, |m, &s| m.max(s.abs()));
        let gain = if amplify && peak > 0.0 { 1.0 / peak } else { 1.0 };

        for &s in samples {
            writer
                .write_sample(s * gain)
                .map_err(|e| DetectError::with_context("writing wav sample", e))?;
        }
        writer
            .finalize()
            .map_err(|e| DetectError::with_context("finalizing wav file", e))?;
        Ok(())
    }

    fn file_extension(&self) -> &'static str {
        "wav"
    }
}

pub fn default_path(dir: &Path, t_ref_start: u64, code: &[usize]) -> PathBuf {
    let digits: String = code.iter().map(|d| d.to_string()).collect();
    dir.join(format!("{t_ref_start}_{digits}.wav"))
}
