use censorscope_types::BadPayload;

/// Failure modes of [`crate::ChainSource`] calls.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// Network or IO blip. Retried with backoff inside the source; the
    /// engine only ever observes it as a delay, except for nonce lookups
    /// where it reads as "sender not ready".
    #[error("transient source failure: {0:#}")]
    Transient(#[source] anyhow::Error),

    /// Lost subscription or an otherwise unrecoverable upstream failure.
    /// Shuts the engine down so the supervisor can restart from persisted
    /// state.
    #[error("fatal source failure: {0:#}")]
    Fatal(#[source] anyhow::Error),

    /// Malformed upstream payload. The offending block or transaction is
    /// dropped and processing continues.
    #[error(transparent)]
    BadPayload(#[from] BadPayload),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}
