//! Command dispatch: bridges CLI args -> device session -> JSON on stdout.

pub mod config_cmd;
pub mod device;
pub mod serve;

use serde_json::Value;

use lwgate_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, session_config) = config::session_config(global)?;
    let session = Session::new(session_config)?;

    match cmd {
        Command::Serve(args) => serve::handle(session, &cfg, args).await,
        Command::Register(args) => device::register(&session, args).await,
        Command::Exec(args) => device::exec(&session, args).await,
        Command::Info => device::info(&session).await,
        Command::Config(_) => unreachable!("config is handled before dispatch"),
    }
}

/// Pretty-print a JSON document to stdout.
pub fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
