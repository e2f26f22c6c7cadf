//! Clap derive structures for the `lwgate` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lwgate -- HTTP gateway for an LwM2M device
#[derive(Debug, Parser)]
#[command(
    name = "lwgate",
    version,
    about = "Expose an LwM2M device session over HTTP",
    long_about = "Registers an endpoint with an LwM2M server over CoAP and relays\n\
        register, command and device-info requests from a small HTTP API.\n\n\
        Run `lwgate serve` for the listener, or use the one-shot subcommands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "LWGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// LwM2M server host (overrides config)
    #[arg(long, short = 's', global = true)]
    pub server: Option<String>,

    /// LwM2M server port (overrides config)
    #[arg(long, global = true)]
    pub server_port: Option<u16>,

    /// Endpoint client name (overrides config)
    #[arg(long, short = 'e', global = true)]
    pub endpoint: Option<String>,

    /// Local CoAP port, 0 for ephemeral (overrides config)
    #[arg(long, global = true)]
    pub bind_port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP listener (POST /reg, POST /cmd, GET /info)
    Serve(ServeArgs),

    /// Register the endpoint with the LwM2M server once
    Register(RegisterArgs),

    /// Execute a device command (reboot, factory_reset, firmware_update)
    Exec(ExecArgs),

    /// Read the device info snapshot
    Info,

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Listen address, e.g. 0.0.0.0:8080 (overrides config)
    #[arg(long, short = 'l')]
    pub listen: Option<String>,

    /// Deadline in seconds for register and command requests
    #[arg(long)]
    pub request_timeout: Option<u64>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// Supported object IDs, comma separated (sent as lwm2m=...)
    #[arg(long, short = 'o', value_delimiter = ',')]
    pub objects: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Command name
    pub command: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration as TOML
    Show,

    /// Print the config file path
    Path,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn objects_are_comma_separated() {
        let cli = Cli::try_parse_from(["lwgate", "register", "--objects", "3,5,6"]);
        let Ok(Cli {
            command: Command::Register(args),
            ..
        }) = cli
        else {
            panic!("expected register command");
        };
        assert_eq!(args.objects, vec!["3", "5", "6"]);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["lwgate", "info", "--server", "10.0.0.1", "-vv"]);
        let Ok(cli) = cli else {
            panic!("expected info to parse");
        };
        assert_eq!(cli.global.server.as_deref(), Some("10.0.0.1"));
        assert_eq!(cli.global.verbose, 2);
    }
}
