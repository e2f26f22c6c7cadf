// ── Command dispatcher ──
//
// Maps a command name to its execute resource and POSTs to it once.
// Unknown names fail before any network I/O.

use lwgate_coap::{ExchangeRequest, ResponseStatus};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::CommandError;
use crate::lwm2m::DeviceCommand;
use crate::session::Session;

/// A command the server accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: DeviceCommand,
    pub status: ResponseStatus,
    pub payload: String,
}

impl CommandOutcome {
    pub fn to_json(&self) -> Value {
        json!({
            "result": "executed",
            "code": self.status.name(),
            "payload": self.payload,
        })
    }
}

impl Session {
    /// Execute a command by name (`reboot`, `factory_reset`, `firmware_update`).
    pub async fn execute_command(&self, name: &str) -> Result<CommandOutcome, CommandError> {
        let command = DeviceCommand::lookup(name).ok_or_else(|| CommandError::Unknown {
            name: name.to_owned(),
        })?;
        self.execute(command).await
    }

    /// Execute a command already resolved from the table.
    pub async fn execute(&self, command: DeviceCommand) -> Result<CommandOutcome, CommandError> {
        debug!(command = command.name(), path = command.path(), "executing command");

        let result = self
            .client()
            .exchange(&ExchangeRequest::post(command.path()))
            .await?;
        let payload = result.payload_text();

        if !result.is_success() {
            warn!(command = command.name(), status = %result.status, "command rejected");
            return Err(CommandError::Rejected {
                command: command.name(),
                status: result.status,
                payload,
            });
        }

        Ok(CommandOutcome {
            command,
            status: result.status,
            payload,
        })
    }
}
