//! Error taxonomy of the engine.
//!
//! Policy: recover locally, never propagate across the signal boundary.
//! Faults raised inside a subscriber's dispatch are caught at the dispatch
//! site and logged; user-visible failures are limited to the return value of
//! the `add_provider` family and the boundary constructors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A caller handed the engine something unusable: an out-of-range
    /// quantity at the boundary, or an unknown provider class name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The settings store contained text that does not parse as the
    /// requested enum. The reader substitutes the default.
    #[error("bad value for settings key {key:?}: {value:?}")]
    BadValue { key: String, value: String },

    /// A provider callback panicked during dispatch. Caught at the dispatch
    /// site; iteration continues with the remaining subscribers.
    #[error("provider callback faulted: {0}")]
    ProviderFault(String),

    /// A stream was torn down while a dispatch was in flight. Subsequent
    /// emissions are dropped silently.
    #[error("stream cancelled while dispatch was in flight")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<pinpoint_types::QuantityError> for Error {
    fn from(err: pinpoint_types::QuantityError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
