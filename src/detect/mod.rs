pub mod freq_search;
pub mod recording_buffer;
pub mod supervisor;
pub mod tone_assembler;
pub mod tone_table;

pub use freq_search::{FreqSearchParams, FreqSearchStage};
pub use recording_buffer::{RecordingBuffer, RecordingBufferParams};
pub use supervisor::{PipelineSupervisor, SupervisorParams};
pub use tone_assembler::{ToneAssemblerParams, ToneAssemblerStage};
pub use tone_table::{default_table, match_tone, ToneTableEntry};
