pub mod common;
pub mod designer;
pub mod downsampler;
pub mod fft;
pub mod fir;
pub mod iir;

pub use designer::{design_lowpass_from_order, design_lowpass_from_transition};
pub use downsampler::{FullDownsampler, ProcessedLengths};
pub use fft::{find_peaks, num_spectrogram_timesteps, FftKit};
pub use fir::{FilterSpec, FirFilter, StreamingFilter};
pub use iir::{IirFilter, IirSpec};
