//! HTTP listener.
//!
//! Three routes, each a thin adapter over the [`Gateway`] facade:
//!
//! - `POST /reg` registers the endpoint
//! - `POST /cmd` executes `{"command": "..."}`
//! - `GET /info` returns the device info snapshot

use std::future::Future;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use lwgate_core::{Gateway, Outcome, Reply};

/// Build the router with request tracing.
pub fn router(gateway: Gateway) -> Router {
    Router::new()
        .route("/reg", post(register))
        .route("/cmd", post(command))
        .route("/info", get(info))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    gateway: Gateway,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown)
        .await
}

/// HTTP status for a facade outcome.
pub fn status_for(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::Ok => StatusCode::OK,
        Outcome::ClientError => StatusCode::BAD_REQUEST,
        Outcome::Failure => StatusCode::INTERNAL_SERVER_ERROR,
        Outcome::TimedOut => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn respond(reply: Reply) -> Response {
    (status_for(reply.outcome), Json(reply.body)).into_response()
}

// ── Handlers ─────────────────────────────────────────────────────────

/// POST /reg
async fn register(State(gateway): State<Gateway>, body: Bytes) -> Response {
    respond(gateway.handle_register(&body).await)
}

/// POST /cmd
async fn command(State(gateway): State<Gateway>, body: Bytes) -> Response {
    respond(gateway.handle_command(&body).await)
}

/// GET /info
async fn info(State(gateway): State<Gateway>) -> Response {
    respond(gateway.handle_info().await)
}
