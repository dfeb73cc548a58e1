/// Convenience result type used across shadowmix.
pub type ShadowResult<T> = Result<T, ShadowError>;

/// Top-level error taxonomy used by pipeline APIs.
///
/// Per-frame compositing problems are not part of this taxonomy: the compositor degrades to a
/// simpler copy and logs instead of returning an error.
#[derive(thiserror::Error, Debug)]
pub enum ShadowError {
    /// Fatal to the current session; recoverable by running setup again.
    #[error("setup error: {0}")]
    Setup(String),

    /// A render call could not produce a frame. The previous output stays valid.
    #[error("render error: {0}")]
    Render(String),

    /// A composition request exposed a number of source tracks other than one.
    #[error("unsupported source count: expected exactly 1 source track, got {count}")]
    SourceCount {
        /// Number of required source tracks on the rejected request.
        count: usize,
    },

    /// A composition request was cancelled during teardown. Expected, not a failure.
    #[error("request cancelled")]
    Cancelled,

    /// The mix manager was torn down; only a fresh setup may follow.
    #[error("mix manager has been torn down")]
    TornDown,

    /// Invalid configuration or descriptor data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShadowError {
    /// Build a [`ShadowError::Setup`] value.
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    /// Build a [`ShadowError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`ShadowError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Return `true` for outcomes that are part of normal teardown.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
