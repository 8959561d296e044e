//! Error taxonomy for the filter engine
//!
//! Every variant aborts the current run; none are retried internally. Retry
//! policy, if any, belongs to an external batch-orchestration collaborator.

use thiserror::Error;

/// Errors raised while acquiring a device context or executing a run
#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable graphics device could be obtained. Fatal at construction.
    #[error("no graphics device context available: {reason}")]
    ContextUnavailable {
        /// Adapter or device acquisition diagnostic
        reason: String,
    },

    /// A fragment or vertex stage failed to compile.
    #[error("shader compilation failed: {diagnostic}")]
    ShaderCompile {
        /// Device diagnostic text, preserved verbatim
        diagnostic: String,
    },

    /// A compiled stage pair failed to link into a pipeline.
    #[error("program link failed: {diagnostic}")]
    ProgramLink {
        /// Device diagnostic text, preserved verbatim
        diagnostic: String,
    },

    /// A render target failed its completeness check at construction.
    #[error("render target incomplete: {diagnostic}")]
    FramebufferIncomplete {
        /// Device diagnostic text, preserved verbatim
        diagnostic: String,
    },

    /// The source pixel data is unusable. Raised before any device allocation.
    #[error("source image unusable: {0}")]
    ImageDecode(String),

    /// Reading the final frame back from the device failed.
    #[error("device read-back failed: {0}")]
    Readback(String),
}
