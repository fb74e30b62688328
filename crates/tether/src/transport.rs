//! # Transport Abstraction
//!
//! A minimal, blocking interface for moving bytes to the foreign runtime and
//! back.
//!
//! ## Philosophy
//!
//! - **Byte-oriented**: the transport knows nothing about frames or values.
//! - **Request-response**: one call is one round trip. The calling thread blocks
//!   until the reply arrives or the transport gives up.
//! - **No retries**: a foreign call may have side effects, so a transport must
//!   never resend a payload on its own.

use std::fmt;

/// Errors that occur below the protocol, in the channel itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// Generic I/O or internal transport failure.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A mechanism to send a byte buffer and receive the reply.
///
/// Object-safe, so bridges hold it as `Arc<dyn Transport>`.
pub trait Transport: Send + Sync + 'static {
    /// Sends a payload and blocks until the reply bytes arrive.
    ///
    /// # Invariants
    /// - Returns the raw reply bytes on success.
    /// - Returns `Err` if the channel fails; never retries.
    /// - Does not interpret the payload.
    fn call(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn call(&self, payload: &[u8]) -> Result<Vec<u8>> {
        (**self).call(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TransportError::ConnectionLost("inbox closed".into()).to_string(), "Connection lost: inbox closed");
        assert_eq!(TransportError::Io("malformed frame".into()).to_string(), "I/O error: malformed frame");
    }
}
