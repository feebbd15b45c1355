//! Error types shared by the ring substrate and the operators.
//!
//! - [`FlowError`] travels through `on_error` and is what subscribers observe.
//! - [`WaitError`] aborts a consumer wait; it never reaches a subscriber.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// # Errors delivered through the operator protocol.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    /// Error produced by a source and propagated as-is.
    #[error("upstream error: {0}")]
    Upstream(Arc<dyn StdError + Send + Sync>),

    /// A user supplied function (supplier, accumulator, predicate) failed.
    #[error("{operator} failed: {message}")]
    Computation {
        /// Name of the operator whose function failed.
        operator: &'static str,
        /// Failure message, or the panic payload when it was a string.
        message: String,
    },

    /// A user function produced an empty value where one is required.
    #[error("{0}")]
    NullValue(&'static str),

    /// The reactive delivery contract was broken by a caller.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The subscription was cancelled.
    #[error("subscription cancelled")]
    Cancelled,

    /// The consuming thread was interrupted while waiting.
    #[error("interrupted")]
    Interrupted,

    /// A failure raised while handling `suppressed`; both are kept.
    #[error("{error}")]
    Suppressed {
        /// The new failure.
        error: Box<FlowError>,
        /// The failure that was being handled when `error` occurred.
        #[source]
        suppressed: Box<FlowError>,
    },
}

impl FlowError {
    /// Wraps any error as an upstream error.
    pub fn upstream<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        FlowError::Upstream(Arc::new(err))
    }

    /// Builds a computation error for `operator` with a plain message.
    pub fn computation(operator: &'static str, message: impl Into<String>) -> Self {
        FlowError::Computation {
            operator,
            message: message.into(),
        }
    }

    /// Attaches `suppressed` to `self` as its secondary cause.
    pub fn with_suppressed(self, suppressed: FlowError) -> Self {
        FlowError::Suppressed {
            error: Box::new(self),
            suppressed: Box::new(suppressed),
        }
    }

    /// Returns the suppressed cause, if any.
    pub fn suppressed(&self) -> Option<&FlowError> {
        match self {
            FlowError::Suppressed { suppressed, .. } => Some(suppressed),
            _ => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use eddy::FlowError;
    ///
    /// assert_eq!(FlowError::Cancelled.as_label(), "flow_cancelled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FlowError::Upstream(_) => "flow_upstream",
            FlowError::Computation { .. } => "flow_computation",
            FlowError::NullValue(_) => "flow_null_value",
            FlowError::Protocol(_) => "flow_protocol",
            FlowError::Cancelled => "flow_cancelled",
            FlowError::Interrupted => "flow_interrupted",
            FlowError::Suppressed { .. } => "flow_suppressed",
        }
    }

    pub(crate) fn from_panic(operator: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panicked".to_string()
        };
        FlowError::Computation { operator, message }
    }
}

/// # Reasons a consumer stopped waiting without reaching its sequence.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The barrier was alerted.
    #[error("sequence barrier alerted")]
    Alerted,

    /// The waiting consumer was interrupted.
    #[error("wait interrupted")]
    Interrupted,
}

impl WaitError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitError::Alerted => "wait_alerted",
            WaitError::Interrupted => "wait_interrupted",
        }
    }
}

impl From<WaitError> for FlowError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Alerted => FlowError::Cancelled,
            WaitError::Interrupted => FlowError::Interrupted,
        }
    }
}
