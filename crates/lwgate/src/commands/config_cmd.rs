//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // Resolved view: defaults, file, environment, then flags
        ConfigCommand::Show => {
            let cfg = config::resolve(global)?;
            print!("{}", cfg.to_toml()?);
            Ok(())
        }

        ConfigCommand::Path => {
            let path = global.config.clone().unwrap_or_else(config::config_path);
            println!("{}", path.display());
            Ok(())
        }
    }
}
