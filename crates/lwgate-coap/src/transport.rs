// Shared transport configuration for the CoAP messaging context.
//
// Retransmission parameters follow RFC 7252 §4.8. The context owns the
// only UDP socket, so every exchange shares these settings.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

/// Default ACK_TIMEOUT.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);
/// Default MAX_RETRANSMIT.
pub const DEFAULT_MAX_RETRANSMIT: u32 = 4;
/// Default EXCHANGE_LIFETIME (247s with the default parameters).
pub const DEFAULT_EXCHANGE_LIFETIME: Duration = Duration::from_secs(247);
/// Largest datagram the context accepts: a full IPv4 UDP payload.
pub const DEFAULT_MAX_DATAGRAM: usize = 65_507;

/// Shared transport configuration for the client messaging context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Local UDP port to bind. `0` picks an ephemeral port.
    pub bind_port: u16,
    /// Initial wait for an acknowledgement; doubled on each retransmission.
    pub ack_timeout: Duration,
    /// Retransmissions after the first transmission.
    pub max_retransmit: u32,
    /// How long to wait for a separate response after an empty ACK.
    pub exchange_lifetime: Duration,
    /// Datagrams longer than this fail their exchange as malformed.
    pub max_datagram: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_port: 0,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retransmit: DEFAULT_MAX_RETRANSMIT,
            exchange_lifetime: DEFAULT_EXCHANGE_LIFETIME,
            max_datagram: DEFAULT_MAX_DATAGRAM,
        }
    }
}

impl TransportConfig {
    /// Config bound to a specific local port, RFC defaults otherwise.
    pub fn with_bind_port(bind_port: u16) -> Self {
        Self {
            bind_port,
            ..Self::default()
        }
    }

    /// Local address to bind, matching the address family of `peer`.
    pub fn bind_addr_for(&self, peer: &SocketAddr) -> SocketAddr {
        match peer {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.bind_port)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, self.bind_port)),
        }
    }

    /// Wait before transmission number `attempt` (0-based) is retried.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.ack_timeout.saturating_mul(1u32 << attempt.min(16))
    }

    /// Total transmissions allowed for one confirmable request.
    pub fn max_transmissions(&self) -> u32 {
        self.max_retransmit.saturating_add(1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_rfc_7252() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.ack_timeout, Duration::from_secs(2));
        assert_eq!(cfg.max_retransmit, 4);
        assert_eq!(cfg.max_transmissions(), 5);
    }

    #[test]
    fn backoff_doubles() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.backoff(0), Duration::from_secs(2));
        assert_eq!(cfg.backoff(1), Duration::from_secs(4));
        assert_eq!(cfg.backoff(3), Duration::from_secs(16));
    }

    #[test]
    fn bind_addr_matches_peer_family() {
        let cfg = TransportConfig::with_bind_port(56830);
        let v4: SocketAddr = "192.0.2.1:5683".parse().unwrap();
        let v6: SocketAddr = "[2001:db8::1]:5683".parse().unwrap();
        assert_eq!(cfg.bind_addr_for(&v4).to_string(), "0.0.0.0:56830");
        assert_eq!(cfg.bind_addr_for(&v6).to_string(), "[::]:56830");
    }
}
