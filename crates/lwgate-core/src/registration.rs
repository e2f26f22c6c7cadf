// ── Registration operation ──

use lwgate_coap::{ExchangeRequest, ResponseStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::RegistrationError;
use crate::lwm2m::REGISTRATION_PATH;
use crate::session::Session;

/// Caller-supplied registration options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOptions {
    /// Supported object identifiers, sent in caller order as `lwm2m=`.
    #[serde(default)]
    pub objects: Vec<String>,
}

impl RegisterOptions {
    pub fn with_objects<I, S>(objects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            objects: objects.into_iter().map(Into::into).collect(),
        }
    }
}

/// A successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub status: ResponseStatus,
    /// Registration handle assigned by the server, e.g. `/rd/5a3f`.
    pub location: Option<String>,
    pub payload: String,
}

impl Registration {
    /// Success body returned to callers. `location` is empty when the server
    /// sent none.
    pub fn to_json(&self) -> Value {
        json!({
            "result": "registered",
            "code": self.status.name(),
            "location": self.location.as_deref().unwrap_or(""),
            "payload": self.payload,
        })
    }
}

/// Registration query parameters, in wire order.
pub fn registration_query(config: &SessionConfig, options: &RegisterOptions) -> Vec<String> {
    let mut query = vec![
        format!("ep={}", config.endpoint),
        format!("lt={}", config.lifetime_secs),
        format!("b={}", config.binding),
    ];
    if !options.objects.is_empty() {
        query.push(format!("lwm2m={}", options.objects.join(",")));
    }
    query
}

impl Session {
    /// Register this endpoint with the LwM2M server.
    pub async fn register(&self, options: &RegisterOptions) -> Result<Registration, RegistrationError> {
        let request = ExchangeRequest::post(REGISTRATION_PATH)
            .with_query(registration_query(self.config(), options));

        let result = self.client().exchange(&request).await?;
        let payload = result.payload_text();

        if !result.is_success() {
            warn!(
                endpoint = %self.config().endpoint,
                status = %result.status,
                "registration rejected"
            );
            return Err(RegistrationError::Rejected {
                status: result.status,
                payload,
            });
        }

        info!(
            endpoint = %self.config().endpoint,
            server = %self.config().server_uri(),
            location = result.location_path.as_deref().unwrap_or(""),
            "registered"
        );
        Ok(Registration {
            status: result.status,
            location: result.location_path,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn query_without_objects() {
        let query = registration_query(&SessionConfig::default(), &RegisterOptions::default());
        assert_eq!(query, vec!["ep=raspi5", "lt=86400", "b=U"]);
    }

    #[test]
    fn query_appends_objects_in_order() {
        let options = RegisterOptions::with_objects(["5", "3", "6"]);
        let query = registration_query(&SessionConfig::default(), &options);
        assert_eq!(query, vec!["ep=raspi5", "lt=86400", "b=U", "lwm2m=5,3,6"]);
    }

    #[test]
    fn query_uses_configured_lifetime_and_binding() {
        let config = SessionConfig {
            endpoint: "node-7".into(),
            lifetime_secs: 300,
            binding: "UQ".into(),
            ..SessionConfig::default()
        };
        let query = registration_query(&config, &RegisterOptions::default());
        assert_eq!(query, vec!["ep=node-7", "lt=300", "b=UQ"]);
    }
}
