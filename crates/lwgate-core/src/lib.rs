//! LwM2M device session between the CoAP transport and the HTTP/CLI front
//! ends.
//!
//! - **[`Session`]** owns the [`SessionConfig`] and the shared
//!   [`CoapClient`](lwgate_coap::CoapClient). It implements the three device
//!   operations: [`register()`](Session::register),
//!   [`execute_command()`](Session::execute_command) and
//!   [`device_info()`](Session::device_info).
//!
//! - **[`Gateway`]** is the facade the transport listener calls. It parses
//!   raw request bodies, forwards to the session, and normalizes every result
//!   into a [`Reply`] carrying an [`Outcome`] and a JSON body.
//!
//! - **Tables** ([`lwm2m`]) map abstract names to LwM2M paths:
//!   [`Resource`] for reads, [`DeviceCommand`] for executes.

pub mod command;
pub mod config;
pub mod error;
pub mod gateway;
pub mod info;
pub mod lwm2m;
pub mod registration;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::CommandOutcome;
pub use config::SessionConfig;
pub use error::{CommandError, GatewayError, RegistrationError};
pub use gateway::{Gateway, Outcome, Reply};
pub use info::{DeviceInfo, Reading};
pub use lwm2m::{DeviceCommand, REGISTRATION_PATH, Resource};
pub use registration::{RegisterOptions, Registration};
pub use session::Session;
