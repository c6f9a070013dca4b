use std::time::Duration;

/// Failures while delivering a batch to the Carbon endpoint.
///
/// Never fatal: the tick's batch is dropped and the next tick proceeds.
///
/// # Examples
///
/// ```rust
/// use oxcarbon_agent::error::TransmissionError;
///
/// let err = TransmissionError::NoAddress("carbon.invalid".to_string());
/// assert!(err.to_string().contains("carbon.invalid"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TransmissionError {
    /// Host name resolution failed.
    #[error("Transmit: cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Resolution succeeded but returned no addresses.
    #[error("Transmit: no address found for {0}")]
    NoAddress(String),

    /// Socket-level failure while connecting or writing.
    #[error("Transmit: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The whole transmission did not finish in time.
    #[error("Transmit: timed out after {0:?}")]
    Timeout(Duration),
}

/// Convenience `Result` alias for transmission operations.
pub type Result<T> = std::result::Result<T, TransmissionError>;
