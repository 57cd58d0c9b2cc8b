use std::error::Error as StdError;
use thiserror::Error;

pub type DetectResult<T> = Result<T, DetectError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors (spec.md §7): reported synchronously from the
/// admission call that introduced them. The pipeline never starts if one
/// of these is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{message}")]
    Message { message: String },
    #[error("filter spec invalid: {reason}")]
    InvalidFilter { reason: String },
    #[error("cutoff frequency {fc} out of range (0, 1]")]
    FcOutOfRange { fc: f64 },
    #[error("filter order {order} must be even")]
    OrderParity { order: usize },
    #[error("sampling rate {fs} too low for requested transition width {delta_f}")]
    SamplingTooLow { fs: f64, delta_f: f64 },
    #[error("order {order} too large for cutoff {fc} (max {max})")]
    OrderTooLargeForCutoff { order: usize, fc: f64, max: usize },
    #[error("overlap {overlap} out of range [0, 1)")]
    OverlapOutOfRange { overlap: f64 },
    #[error("peak-finder delta {delta} must be >= 0")]
    DeltaNegative { delta: f64 },
    #[error("search_freqs[] must not be empty")]
    SearchFreqsEmpty,
    #[error("whitelist configured but no alarm messages are known")]
    WhitelistWithoutAlarmMessages,
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ConfigError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Context {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Everything a running worker can surface once admission has succeeded:
/// device errors, worker-fatal errors and the defensive data-shape checks
/// from spec.md §7. No variant here is retried inside the core.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("{message}")]
    Message { message: String },
    #[error("no input device available")]
    NoInputDevice,
    #[error("capture device unavailable: {reason}")]
    DeviceUnavailable { reason: String },
    #[error("stage used before parameters were set")]
    NotInitialized,
    #[error("parameters cannot change while the stage is running")]
    InUse,
    #[error("wrong input element type for this stage (defensive check)")]
    WrongInputType,
    #[error("dedup state has wrong cardinality (defensive check)")]
    InvalidLastCodeSize,
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl DetectError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn with_context(
        context: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        DetectError::Context {
            context: context.into(),
            source: source.into().into(),
        }
    }

    /// True for the defensive data-shape checks that spec.md §7 marks as
    /// programming errors (fatal, never retried).
    pub fn is_defensive(&self) -> bool {
        matches!(self, DetectError::WrongInputType | DetectError::InvalidLastCodeSize)
    }
}
