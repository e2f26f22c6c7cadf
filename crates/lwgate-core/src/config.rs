// ── Session configuration ──
//
// Describes which LwM2M server to talk to and as whom. Built once by the
// binary (from `lwgate-config`) and handed to `Session::new`; core never
// reads files or environment variables.

use std::time::Duration;

use lwgate_coap::TransportConfig;
use lwgate_coap::transport::{DEFAULT_ACK_TIMEOUT, DEFAULT_EXCHANGE_LIFETIME, DEFAULT_MAX_RETRANSMIT};

/// Registration lifetime sent as `lt=` when nothing else is configured.
pub const DEFAULT_LIFETIME_SECS: u32 = 86_400;
/// Binding mode sent as `b=` when nothing else is configured.
pub const DEFAULT_BINDING: &str = "U";

/// Immutable configuration for one device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// LwM2M server host name or IP literal.
    pub server_host: String,
    pub server_port: u16,
    /// Endpoint client name registered with the server (`ep=`).
    pub endpoint: String,
    /// Local UDP port for the CoAP context. `0` = ephemeral.
    pub bind_port: u16,
    pub lifetime_secs: u32,
    pub binding: String,
    pub ack_timeout: Duration,
    pub max_retransmit: u32,
    pub exchange_lifetime: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".into(),
            server_port: 5683,
            endpoint: "raspi5".into(),
            bind_port: 56830,
            lifetime_secs: DEFAULT_LIFETIME_SECS,
            binding: DEFAULT_BINDING.into(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retransmit: DEFAULT_MAX_RETRANSMIT,
            exchange_lifetime: DEFAULT_EXCHANGE_LIFETIME,
        }
    }
}

impl SessionConfig {
    /// Transport settings for the session's CoAP client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            bind_port: self.bind_port,
            ack_timeout: self.ack_timeout,
            max_retransmit: self.max_retransmit,
            exchange_lifetime: self.exchange_lifetime,
            ..TransportConfig::default()
        }
    }

    /// `coap://host:port`, for logs and diagnostics.
    pub fn server_uri(&self) -> String {
        if self.server_host.contains(':') && !self.server_host.starts_with('[') {
            format!("coap://[{}]:{}", self.server_host, self.server_port)
        } else {
            format!("coap://{}:{}", self.server_host, self.server_port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.server_uri(), "coap://127.0.0.1:5683");
        assert_eq!(cfg.endpoint, "raspi5");
        assert_eq!(cfg.bind_port, 56830);
        assert_eq!(cfg.lifetime_secs, 86_400);
        assert_eq!(cfg.binding, "U");
    }

    #[test]
    fn transport_carries_timing() {
        let cfg = SessionConfig {
            bind_port: 0,
            ack_timeout: Duration::from_millis(50),
            max_retransmit: 1,
            ..SessionConfig::default()
        };
        let transport = cfg.transport();
        assert_eq!(transport.bind_port, 0);
        assert_eq!(transport.ack_timeout, Duration::from_millis(50));
        assert_eq!(transport.max_transmissions(), 2);
    }

    #[test]
    fn server_uri_brackets_ipv6() {
        let cfg = SessionConfig {
            server_host: "::1".into(),
            ..SessionConfig::default()
        };
        assert_eq!(cfg.server_uri(), "coap://[::1]:5683");
    }
}
