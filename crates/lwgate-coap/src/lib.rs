//! Async CoAP client for talking to one LwM2M server.
//!
//! This crate owns the wire side of the gateway:
//!
//! - **[`CoapClient`]** performs one confirmable request/response
//!   [`exchange()`](CoapClient::exchange) at a time per caller, over a single
//!   lazily-bound UDP socket shared by every concurrent exchange.
//!
//! - **Reliability** follows RFC 7252: confirmable retransmission with
//!   exponential back-off ([`TransportConfig`]), message-ID correlation for
//!   ACK/RST, token correlation for separate responses, and ACKs for
//!   duplicate confirmable responses.
//!
//! - **[`ExchangeRequest`] / [`ExchangeResult`]** are the only types callers
//!   see. Any response the server produced, 2.xx or not, is an
//!   `ExchangeResult`; [`Error`] is reserved for exchanges with no usable
//!   response.
//!
//! With the `test-util` feature, [`testing::MockCoapServer`] provides a
//! loopback server for integration tests.

pub mod client;
mod context;
pub mod error;
pub mod message;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::CoapClient;
pub use error::Error;
pub use message::{ExchangeRequest, ExchangeResult, Method, ResponseStatus, StatusClass};
pub use transport::TransportConfig;
