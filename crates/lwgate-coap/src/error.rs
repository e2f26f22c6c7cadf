use std::net::SocketAddr;

use thiserror::Error;

/// Top-level error type for the `lwgate-coap` crate.
///
/// Every way a single CoAP exchange can fail before a response status is
/// known. A response that *was* received, whatever its code, is not an
/// error at this layer -- callers decide what a 4.xx or 5.xx means.
#[derive(Debug, Error)]
pub enum Error {
    // ── Context setup ───────────────────────────────────────────────
    /// The local UDP socket could not be bound.
    #[error("Failed to bind CoAP socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The server host did not resolve to any socket address.
    #[error("Cannot resolve CoAP server {target}: {reason}")]
    Resolve { target: String, reason: String },

    /// Server URI could not be composed from host and port.
    #[error("Invalid CoAP URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    // ── Transport ───────────────────────────────────────────────────
    /// Socket send/receive failure.
    #[error("CoAP socket error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be serialized into a CoAP message.
    #[error("Failed to encode CoAP request: {0}")]
    Encode(String),

    /// No acknowledgement after the whole retransmission budget.
    #[error("No response from {peer} after {attempts} transmissions")]
    Timeout { peer: SocketAddr, attempts: u32 },

    /// The request was acknowledged but the separate response never came.
    #[error("Request to {peer} was acknowledged but no response arrived within {waited_secs}s")]
    NoResponse { peer: SocketAddr, waited_secs: u64 },

    /// The server answered with a Reset message.
    #[error("Request rejected with CoAP reset by {peer}")]
    Reset { peer: SocketAddr },

    // ── Data ────────────────────────────────────────────────────────
    /// A correlated reply was not a valid response.
    #[error("Malformed CoAP response: {reason}")]
    Malformed { reason: String },

    /// The messaging context shut down while the exchange was in flight.
    #[error("CoAP messaging context closed")]
    ContextClosed,
}

impl Error {
    /// Returns `true` if the server never produced a usable answer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::NoResponse { .. })
    }

    /// Returns `true` if the failure happened before anything was sent.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::Bind { .. } | Self::Resolve { .. } | Self::InvalidUri(_)
        )
    }
}
