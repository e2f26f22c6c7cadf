//! CLI configuration -- thin wrapper around `lwgate_config`.
//!
//! Adds the `GlobalOpts` flag overrides (--server, --endpoint, ...) on top
//! of the file and environment layers.

use lwgate_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use lwgate_config::{Config, config_path, load_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Load the layered config and apply flag overrides (flag > env > file).
pub fn resolve(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut config = load_config(global.config.as_deref())?;

    if let Some(ref server) = global.server {
        config.server.host.clone_from(server);
    }
    if let Some(port) = global.server_port {
        config.server.port = port;
    }
    if let Some(ref endpoint) = global.endpoint {
        if endpoint.trim().is_empty() {
            return Err(CliError::Validation {
                field: "--endpoint".into(),
                reason: "must not be empty".into(),
            });
        }
        config.device.endpoint.clone_from(endpoint);
    }
    if let Some(port) = global.bind_port {
        config.coap.bind_port = port;
    }

    Ok(config)
}

/// Resolve straight to the core session configuration.
pub fn session_config(global: &GlobalOpts) -> Result<(Config, SessionConfig), CliError> {
    let config = resolve(global)?;
    let session = config.session_config()?;
    Ok((config, session))
}
