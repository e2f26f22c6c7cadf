//! `lwgate serve` -- run the HTTP listener until Ctrl-C.

use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use lwgate_config::Config;
use lwgate_core::{Gateway, Session};

use crate::cli::ServeArgs;
use crate::error::CliError;
use crate::server;

pub async fn handle(session: Session, cfg: &Config, args: ServeArgs) -> Result<(), CliError> {
    let addr = match args.listen {
        Some(listen) if listen.trim().is_empty() => {
            return Err(CliError::Validation {
                field: "--listen".into(),
                reason: "must not be empty".into(),
            });
        }
        Some(listen) => listen,
        None => cfg.listen_addr(),
    };

    let deadline = match args.request_timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => cfg.request_timeout(),
    };

    let server_uri = session.config().server_uri();
    let endpoint = session.config().endpoint.clone();

    let mut gateway = Gateway::new(session);
    if let Some(deadline) = deadline {
        gateway = gateway.with_deadline(deadline);
    }

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| CliError::Listen {
            addr: addr.clone(),
            source,
        })?;
    let local = listener.local_addr()?;

    info!(
        listen = %local,
        server = %server_uri,
        endpoint = %endpoint,
        deadline_secs = deadline.map(|d| d.as_secs()),
        "gateway listening"
    );

    server::serve(listener, gateway, shutdown_signal()).await?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
