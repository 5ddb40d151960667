//! Error types for the card protocol and the dump workflow

use thiserror::Error;

/// Transport-level failure reported by the card channel
#[derive(Debug, Error)]
#[error("card transport failure: {0}")]
pub struct ChannelError(String);

impl ChannelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors from a single command exchange or record operation
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Card returned fewer than the two status-word bytes
    #[error("response shorter than the two status bytes")]
    ShortResponse,

    /// Card answered with a non-success status word
    #[error("card returned status {0:04X}")]
    Status(u16),

    /// Requested read length is not positive
    #[error("record length {0} cannot be read")]
    InvalidLength(usize),

    /// Signature block is not the 128 bytes the card must produce
    #[error("signature has {0} bytes, expected 128")]
    SignatureLengthMismatch(usize),

    /// Application selection answered with data where none is allowed
    #[error("unexpected data in application select response: {0}")]
    UnexpectedSelectResponse(String),

    /// Failure in the underlying card channel
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Errors from a whole dump session
#[derive(Debug, Error)]
pub enum DumpError {
    /// A record operation failed; carries the record's symbolic name
    #[error("error processing record {name}")]
    Record {
        name: &'static str,
        #[source]
        source: ProtocolError,
    },

    /// Selecting the tachograph application failed
    #[error("error selecting tachograph application")]
    SelectApplication(#[source] ProtocolError),

    /// Derived filename field holds characters outside [A-Za-z0-9]
    #[error("card number contains disallowed characters: {0:?}")]
    InvalidCardNumber(String),

    /// Target dump file could not be created
    #[error("cannot create dump file {path}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing the dump buffer failed
    #[error("failed to write dump data")]
    Write(#[source] std::io::Error),

    /// Fewer bytes reached the file than the buffer holds
    #[error("wrote {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },
}
