// ── Device session ──
//
// Owns the configuration and the CoAP client for one endpoint. The three
// device operations live in `registration`, `command` and `info` as further
// `impl Session` blocks.

use lwgate_coap::CoapClient;

use crate::config::SessionConfig;

/// One endpoint talking to one LwM2M server.
///
/// Cheap to share behind an `Arc`: every operation takes `&self`, and the
/// CoAP client multiplexes concurrent exchanges over its single socket.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    client: CoapClient,
}

impl Session {
    /// Build a session. Does not touch the network; the CoAP socket is
    /// bound on the first exchange.
    pub fn new(config: SessionConfig) -> Result<Self, lwgate_coap::Error> {
        let client = CoapClient::new(
            config.server_host.clone(),
            config.server_port,
            config.transport(),
        )?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn client(&self) -> &CoapClient {
        &self.client
    }
}
