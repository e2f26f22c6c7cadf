//! One-shot device operations: register, exec, info.

use lwgate_core::{RegisterOptions, Session};
use tracing::info;

use crate::cli::{ExecArgs, RegisterArgs};
use crate::error::CliError;

use super::print_json;

pub async fn register(session: &Session, args: RegisterArgs) -> Result<(), CliError> {
    let options = RegisterOptions::with_objects(args.objects);
    let registration = session.register(&options).await?;
    print_json(&registration.to_json())
}

pub async fn exec(session: &Session, args: ExecArgs) -> Result<(), CliError> {
    let outcome = session.execute_command(&args.command).await?;
    print_json(&outcome.to_json())
}

pub async fn info(session: &Session) -> Result<(), CliError> {
    let snapshot = session.device_info().await;
    info!(
        available = snapshot.available_count(),
        total = snapshot.fields().len(),
        "device info read"
    );
    print_json(&serde_json::to_value(&snapshot)?)
}
