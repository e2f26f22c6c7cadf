// ── Gateway facade ──
//
// The surface the transport listener calls. Parses raw request bodies,
// forwards to the session, and turns every result into a `Reply`. Holds no
// protocol logic of its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::command::CommandOutcome;
use crate::error::GatewayError;
use crate::registration::{RegisterOptions, Registration};
use crate::session::Session;

// ── Outcome / Reply ──────────────────────────────────────────────

/// Uniform classification of a facade call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// The request itself was unusable (bad body, unknown command).
    ClientError,
    /// The device operation failed (transport or server rejection).
    Failure,
    /// The outer deadline elapsed first.
    TimedOut,
}

/// What the listener sends back: an outcome plus a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub outcome: Outcome,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            outcome: Outcome::Ok,
            body,
        }
    }

    /// `{"error": "<cause>"}` with the error's outcome.
    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            outcome: err.outcome(),
            body: json!({ "error": err.to_string() }),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────

/// Facade over one [`Session`]. Cheaply cloneable.
#[derive(Debug, Clone)]
pub struct Gateway {
    session: Arc<Session>,
    deadline: Option<Duration>,
}

impl Gateway {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
            deadline: None,
        }
    }

    /// Bound register and command calls by `deadline`. Info reads are never
    /// cut short.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    // ── Handlers ─────────────────────────────────────────────────

    /// Register the endpoint. The body may carry `{"objects": [...]}`.
    pub async fn handle_register(&self, body: &[u8]) -> Reply {
        match self.register(body).await {
            Ok(registration) => Reply::ok(registration.to_json()),
            Err(e) => {
                warn!(error = %e, "register request failed");
                Reply::from_error(&e)
            }
        }
    }

    /// Execute `{"command": "<name>"}`.
    pub async fn handle_command(&self, body: &[u8]) -> Reply {
        match self.command(body).await {
            Ok(outcome) => Reply::ok(outcome.to_json()),
            Err(e) => {
                warn!(error = %e, "command request failed");
                Reply::from_error(&e)
            }
        }
    }

    /// Device info snapshot. Always `Ok`; unavailable fields are `null`.
    pub async fn handle_info(&self) -> Reply {
        let info = self.session.device_info().await;
        match serde_json::to_value(&info) {
            Ok(body) => Reply::ok(body),
            Err(e) => Reply {
                outcome: Outcome::Failure,
                body: json!({ "error": e.to_string() }),
            },
        }
    }

    // ── Typed operations ─────────────────────────────────────────

    /// Parse the body and register.
    pub async fn register(&self, body: &[u8]) -> Result<Registration, GatewayError> {
        let options = parse_register_options(body)?;
        debug!(objects = ?options.objects, "register request");
        self.within_deadline(self.session.register(&options)).await
    }

    /// Parse the body and execute the named command.
    pub async fn command(&self, body: &[u8]) -> Result<CommandOutcome, GatewayError> {
        let name = parse_command(body)?;
        debug!(command = %name, "command request");
        self.within_deadline(self.session.execute_command(&name)).await
    }

    async fn within_deadline<T, E>(
        &self,
        operation: impl Future<Output = Result<T, E>>,
    ) -> Result<T, GatewayError>
    where
        GatewayError: From<E>,
    {
        let Some(limit) = self.deadline else {
            return Ok(operation.await?);
        };
        match tokio::time::timeout(limit, operation).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GatewayError::DeadlineExceeded { timeout: limit }),
        }
    }
}

// ── Body parsing ─────────────────────────────────────────────────

/// Registration options from a request body.
///
/// Empty, unparseable or non-object bodies mean "no options", as does an
/// `objects` field that is not an array. Array entries must be strings or
/// integers.
pub fn parse_register_options(body: &[u8]) -> Result<RegisterOptions, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RegisterOptions::default());
    }
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "ignoring unparseable register body");
            return Ok(RegisterOptions::default());
        }
    };
    let Value::Object(map) = value else {
        debug!("ignoring non-object register body");
        return Ok(RegisterOptions::default());
    };

    let objects = match map.get("objects") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(object_id)
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            debug!(kind = json_kind(other), "ignoring non-array \"objects\"");
            Vec::new()
        }
    };
    Ok(RegisterOptions { objects })
}

fn object_id(item: &Value) -> Result<String, GatewayError> {
    match item {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        other => Err(GatewayError::InvalidBody {
            reason: format!(
                "\"objects\" entries must be strings or integers, got {}",
                json_kind(other)
            ),
        }),
    }
}

/// The command name from a request body.
pub fn parse_command(body: &[u8]) -> Result<String, GatewayError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| GatewayError::InvalidBody {
        reason: e.to_string(),
    })?;
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(GatewayError::InvalidBody {
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            });
        }
    };

    match map.get("command") {
        None | Some(Value::Null) => Err(GatewayError::MissingCommand),
        Some(Value::String(name)) if name.is_empty() => Err(GatewayError::MissingCommand),
        Some(Value::String(name)) => Ok(name.clone()),
        Some(other) => Err(GatewayError::InvalidBody {
            reason: format!("\"command\" must be a string, got {}", json_kind(other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn register_body_fallbacks() {
        for body in [&b""[..], b"  \n", b"not json", b"[1,2]", b"\"x\"", b"{}"] {
            assert_eq!(
                parse_register_options(body).unwrap(),
                RegisterOptions::default(),
                "body {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn register_objects_accept_strings_and_integers() {
        let options = parse_register_options(br#"{"objects": ["3", 5, "6"]}"#).unwrap();
        assert_eq!(options.objects, vec!["3", "5", "6"]);
    }

    #[test]
    fn register_non_array_objects_are_ignored() {
        for body in [
            &br#"{"objects": "3,5"}"#[..],
            br#"{"objects": 3}"#,
            br#"{"objects": {"3": true}}"#,
        ] {
            assert_eq!(parse_register_options(body).unwrap(), RegisterOptions::default());
        }
    }

    #[test]
    fn register_object_entries_reject_other_shapes() {
        for body in [&br#"{"objects": [3.5]}"#[..], br#"{"objects": [{"id": 3}]}"#] {
            let err = parse_register_options(body).unwrap_err();
            assert_eq!(err.outcome(), Outcome::ClientError);
        }
    }

    #[test]
    fn command_body() {
        assert_eq!(parse_command(br#"{"command": "reboot"}"#).unwrap(), "reboot");
    }

    #[test]
    fn command_missing_or_empty() {
        for body in [&b"{}"[..], br#"{"command": null}"#, br#"{"command": ""}"#] {
            assert!(matches!(
                parse_command(body),
                Err(GatewayError::MissingCommand)
            ));
        }
    }

    #[test]
    fn command_invalid_bodies() {
        for body in [&b""[..], b"nope", b"[]", br#"{"command": 7}"#] {
            let err = parse_command(body).unwrap_err();
            assert!(matches!(err, GatewayError::InvalidBody { .. }), "got {err:?}");
            assert_eq!(err.outcome(), Outcome::ClientError);
        }
    }

    #[test]
    fn error_reply_shape() {
        let reply = Reply::from_error(&GatewayError::MissingCommand);
        assert_eq!(reply.outcome, Outcome::ClientError);
        assert_eq!(reply.body, json!({ "error": "Missing command parameter" }));
    }
}
