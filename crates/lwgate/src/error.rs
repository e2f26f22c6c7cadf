//! CLI error types with miette diagnostics.
//!
//! Maps config, registration and command failures into user-facing errors
//! with actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use lwgate_config::ConfigError;
use lwgate_core::{CommandError, DeviceCommand, RegistrationError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    /// EX_CONFIG from sysexits.h.
    pub const CONFIG: i32 = 78;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device session ───────────────────────────────────────────────

    #[error("Could not reach LwM2M server")]
    #[diagnostic(
        code(lwgate::connection_failed),
        help(
            "Check that the LwM2M server is running and reachable over UDP.\n\
             Override the target with --server / --server-port, or the local port with --bind-port."
        )
    )]
    ConnectionFailed {
        #[source]
        source: lwgate_coap::Error,
    },

    #[error("Could not set up the local CoAP endpoint")]
    #[diagnostic(
        code(lwgate::setup),
        help("Check that --server resolves and that --bind-port is free (0 picks an ephemeral port).")
    )]
    Setup {
        #[source]
        source: lwgate_coap::Error,
    },

    #[error("LwM2M server did not respond")]
    #[diagnostic(
        code(lwgate::timeout),
        help("The request was retransmitted until the budget ran out. Is the server address correct?")
    )]
    Timeout {
        #[source]
        source: lwgate_coap::Error,
    },

    #[error("Server rejected {operation}: {status}")]
    #[diagnostic(code(lwgate::rejected), help("Server payload: {payload}"))]
    Rejected {
        operation: String,
        status: String,
        payload: String,
    },

    #[error("Unknown command '{name}'")]
    #[diagnostic(code(lwgate::unknown_command), help("Available commands: {available}"))]
    UnknownCommand { name: String, available: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lwgate::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(lwgate::config),
        help("Inspect the resolved configuration with: lwgate config show")
    )]
    Config(#[from] ConfigError),

    // ── HTTP listener ────────────────────────────────────────────────

    #[error("Failed to listen on {addr}")]
    #[diagnostic(
        code(lwgate::listen),
        help("Pick another address with --listen or set http.port in the config file.")
    )]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(lwgate::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::UnknownCommand { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::Config(_) | Self::Setup { .. } => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Core errors → CliError ───────────────────────────────────────────

impl From<lwgate_coap::Error> for CliError {
    fn from(source: lwgate_coap::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { source }
        } else if source.is_setup() {
            Self::Setup { source }
        } else {
            Self::ConnectionFailed { source }
        }
    }
}

impl From<RegistrationError> for CliError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Transport(e) => e.into(),
            RegistrationError::Rejected { status, payload } => Self::Rejected {
                operation: "registration".into(),
                status: status.to_string(),
                payload,
            },
        }
    }
}

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Unknown { name } => Self::UnknownCommand {
                name,
                available: available_commands(),
            },
            CommandError::Transport(e) => e.into(),
            CommandError::Rejected {
                command,
                status,
                payload,
            } => Self::Rejected {
                operation: format!("command '{command}'"),
                status: status.to_string(),
                payload,
            },
        }
    }
}

fn available_commands() -> String {
    DeviceCommand::names().join(", ")
}
