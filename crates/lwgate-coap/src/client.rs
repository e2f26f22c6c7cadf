// CoAP exchange client
//
// Wraps the shared messaging context with server addressing and lazy
// socket setup. Every LwM2M operation above this layer goes through
// `CoapClient::exchange`.

use std::net::SocketAddr;

use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::context::Context;
use crate::error::Error;
use crate::message::{ExchangeRequest, ExchangeResult};
use crate::transport::TransportConfig;

/// Client for one LwM2M server.
///
/// The underlying UDP context is created on the first exchange and then
/// shared by every subsequent (and concurrent) exchange until the client is
/// dropped. A failed bind is not cached: the next exchange tries again.
pub struct CoapClient {
    host: String,
    port: u16,
    base_uri: Url,
    transport: TransportConfig,
    context: OnceCell<Context>,
}

impl CoapClient {
    /// Create a client for `coap://{host}:{port}`. Does not touch the network.
    pub fn new(host: impl Into<String>, port: u16, transport: TransportConfig) -> Result<Self, Error> {
        let host = host.into();
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        let base_uri = Url::parse(&format!("coap://{authority}"))?;

        Ok(Self {
            host,
            port,
            base_uri,
            transport,
            context: OnceCell::new(),
        })
    }

    /// Create a client for a known socket address (tests, literal IPs).
    pub fn for_addr(addr: SocketAddr, transport: TransportConfig) -> Result<Self, Error> {
        Self::new(addr.ip().to_string(), addr.port(), transport)
    }

    /// The server host as configured.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Transport settings shared by all exchanges.
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Local address of the messaging context, once it has been opened.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.context.get().and_then(|ctx| ctx.local_addr().ok())
    }

    // ── URI builder ──────────────────────────────────────────────────

    /// Full target URI for a request: `coap://host:port/path?query`.
    pub fn target_uri(&self, request: &ExchangeRequest) -> Url {
        let mut uri = self.base_uri.clone();
        let path = request.path_segments().collect::<Vec<_>>().join("/");
        uri.set_path(&format!("/{path}"));
        if !request.query.is_empty() {
            uri.set_query(Some(&request.query.join("&")));
        }
        uri
    }

    // ── Exchange ─────────────────────────────────────────────────────

    /// Perform one request/response exchange against the server.
    ///
    /// Returns whatever response the server produced, success or not.
    /// Errors are reserved for exchanges that produced no usable response.
    pub async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeResult, Error> {
        debug!(method = %request.method, uri = %self.target_uri(request), "CoAP exchange");

        let context = self.context().await?;
        let result = context.exchange(request).await?;

        debug!(
            method = %request.method,
            path = %request.path,
            status = %result.status,
            bytes = result.payload.len(),
            "CoAP exchange complete"
        );
        Ok(result)
    }

    async fn context(&self) -> Result<&Context, Error> {
        self.context
            .get_or_try_init(|| async {
                let peer = self.resolve().await?;
                Context::open(peer, self.transport.clone()).await
            })
            .await
    }

    async fn resolve(&self) -> Result<SocketAddr, Error> {
        let target = format!("{}:{}", self.host, self.port);
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::Resolve {
                target: target.clone(),
                reason: e.to_string(),
            })?;
        addrs.next().ok_or_else(|| Error::Resolve {
            target,
            reason: "no addresses returned".into(),
        })
    }
}

impl std::fmt::Debug for CoapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoapClient")
            .field("server", &self.base_uri.as_str())
            .field("transport", &self.transport)
            .field("open", &self.context.initialized())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::message::{Method, ResponseStatus};
    use crate::testing::{MockCoapServer, MockReply};

    fn fast_transport() -> TransportConfig {
        TransportConfig {
            ack_timeout: Duration::from_millis(100),
            max_retransmit: 2,
            exchange_lifetime: Duration::from_secs(2),
            ..TransportConfig::default()
        }
    }

    async fn setup() -> (MockCoapServer, CoapClient) {
        let server = MockCoapServer::start().await;
        let client = CoapClient::for_addr(server.addr(), fast_transport()).unwrap();
        (server, client)
    }

    // ── URI composition ─────────────────────────────────────────────

    #[test]
    fn target_uri_includes_path_and_query() {
        let client = CoapClient::new("192.0.2.10", 5683, TransportConfig::default()).unwrap();
        let req = ExchangeRequest::post("/rd").with_query(vec!["ep=dev".into(), "b=U".into()]);
        assert_eq!(
            client.target_uri(&req).as_str(),
            "coap://192.0.2.10:5683/rd?ep=dev&b=U"
        );
    }

    #[test]
    fn target_uri_brackets_ipv6() {
        let client = CoapClient::new("2001:db8::1", 5683, TransportConfig::default()).unwrap();
        let uri = client.target_uri(&ExchangeRequest::get("/3/0"));
        assert_eq!(uri.as_str(), "coap://[2001:db8::1]:5683/3/0");
    }

    // ── Exchanges ───────────────────────────────────────────────────

    #[tokio::test]
    async fn piggybacked_response() {
        let (server, client) = setup().await;
        server.mock(Method::Get, "/3/0/9", MockReply::content("65536"));

        let result = client.exchange(&ExchangeRequest::get("/3/0/9")).await.unwrap();

        assert_eq!(result.status, ResponseStatus::CONTENT);
        assert_eq!(result.payload_text(), "65536");
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn separate_response_after_empty_ack() {
        let (server, client) = setup().await;
        server.mock(
            Method::Post,
            "/3/0/4",
            MockReply::status(ResponseStatus::CHANGED)
                .separate()
                .delay(Duration::from_millis(250)),
        );

        let result = client.exchange(&ExchangeRequest::post("/3/0/4")).await.unwrap();

        assert_eq!(result.status, ResponseStatus::CHANGED);
        // The ACK stopped retransmission even though the response took
        // longer than the initial ACK timeout.
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn error_status_is_a_result_not_an_error() {
        let (server, client) = setup().await;

        let result = client.exchange(&ExchangeRequest::get("/9/9")).await.unwrap();

        assert_eq!(result.status, ResponseStatus::NOT_FOUND);
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn retransmits_then_times_out() {
        let (server, client) = setup().await;
        server.mock(Method::Get, "/4/0", MockReply::silent());

        let err = client.exchange(&ExchangeRequest::get("/4/0")).await.unwrap_err();

        assert!(matches!(err, Error::Timeout { attempts: 3, .. }), "got {err:?}");
        let seen = server.requests();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|r| r.message_id == seen[0].message_id));
    }

    #[tokio::test]
    async fn reset_fails_the_exchange() {
        let (server, client) = setup().await;
        server.mock(Method::Post, "/5/0/2", MockReply::reset());

        let err = client.exchange(&ExchangeRequest::post("/5/0/2")).await.unwrap_err();

        assert!(matches!(err, Error::Reset { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn large_response_arrives_whole() {
        let (server, client) = setup().await;
        let body = "x".repeat(1200);
        server.mock(Method::Get, "/3/0", MockReply::content(&body));

        let result = client.exchange(&ExchangeRequest::get("/3/0")).await.unwrap();

        assert_eq!(result.payload_text().len(), 1200);
        assert_eq!(result.payload_text(), body);
    }

    #[tokio::test]
    async fn oversized_response_is_malformed() {
        let server = MockCoapServer::start().await;
        let transport = TransportConfig {
            max_datagram: 512,
            ..fast_transport()
        };
        let client = CoapClient::for_addr(server.addr(), transport).unwrap();
        server.mock(Method::Get, "/4/0", MockReply::content(&"x".repeat(1200)));

        let err = client.exchange(&ExchangeRequest::get("/4/0")).await.unwrap_err();

        assert!(matches!(err, Error::Malformed { .. }), "got {err:?}");
        assert!(err.to_string().contains("512"), "got {err}");
    }

    #[tokio::test]
    async fn mismatched_token_is_malformed() {
        let (server, client) = setup().await;
        server.mock(
            Method::Get,
            "/3/0/9",
            MockReply::content("8192").token(&[0xde, 0xad]),
        );

        let err = client.exchange(&ExchangeRequest::get("/3/0/9")).await.unwrap_err();

        assert!(matches!(err, Error::Malformed { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn huge_ack_timeout_does_not_overflow() {
        let server = MockCoapServer::start().await;
        let transport = TransportConfig {
            ack_timeout: Duration::MAX,
            ..fast_transport()
        };
        let client = CoapClient::for_addr(server.addr(), transport).unwrap();
        server.mock(Method::Get, "/3/0/9", MockReply::content("8192"));

        let result = client.exchange(&ExchangeRequest::get("/3/0/9")).await.unwrap();

        assert_eq!(result.payload_text(), "8192");
    }

    #[tokio::test]
    async fn location_path_is_reported() {
        let (server, client) = setup().await;
        server.mock(
            Method::Post,
            "/rd",
            MockReply::status(ResponseStatus::CREATED).location(&["rd", "0a1b"]),
        );

        let result = client.exchange(&ExchangeRequest::post("/rd")).await.unwrap();

        assert_eq!(result.location_path.as_deref(), Some("/rd/0a1b"));
    }

    #[tokio::test]
    async fn concurrent_exchanges_do_not_cross() {
        let (server, client) = setup().await;
        server.mock(
            Method::Get,
            "/3/0/10",
            MockReply::content("free").delay(Duration::from_millis(30)),
        );
        server.mock(Method::Get, "/3/0/9", MockReply::content("total"));
        server.mock(
            Method::Get,
            "/6/0",
            MockReply::content("location").separate().delay(Duration::from_millis(10)),
        );

        let free = ExchangeRequest::get("/3/0/10");
        let total = ExchangeRequest::get("/3/0/9");
        let location = ExchangeRequest::get("/6/0");
        let (a, b, c) = tokio::join!(
            client.exchange(&free),
            client.exchange(&total),
            client.exchange(&location),
        );

        assert_eq!(a.unwrap().payload_text(), "free");
        assert_eq!(b.unwrap().payload_text(), "total");
        assert_eq!(c.unwrap().payload_text(), "location");
    }

    #[tokio::test]
    async fn context_is_reused() {
        let (server, client) = setup().await;
        assert!(client.local_addr().is_none());

        client.exchange(&ExchangeRequest::get("/3/0")).await.unwrap();
        let first = client.local_addr().unwrap();
        client.exchange(&ExchangeRequest::get("/3/0")).await.unwrap();

        assert_eq!(client.local_addr().unwrap(), first);
        let sources: Vec<_> = server.requests().iter().map(|r| r.source).collect();
        assert!(sources.iter().all(|s| s.port() == first.port()));
    }

    #[tokio::test]
    async fn query_and_payload_reach_the_server() {
        let (server, client) = setup().await;
        let req = ExchangeRequest::post("/rd")
            .with_query(vec!["ep=node".into(), "lt=60".into()])
            .with_payload(b"</3/0>".to_vec());

        client.exchange(&req).await.unwrap();

        let seen = server.requests();
        assert_eq!(seen[0].path, "/rd");
        assert_eq!(seen[0].query, vec!["ep=node", "lt=60"]);
        assert_eq!(seen[0].payload, b"</3/0>".to_vec());
    }
}
