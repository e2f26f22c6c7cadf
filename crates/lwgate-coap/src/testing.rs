//! In-process CoAP server for tests.
//!
//! `MockCoapServer` binds a loopback UDP socket, records every confirmable
//! request it receives (retransmissions included) and answers according to
//! per-route [`MockReply`] rules. Unmatched requests get a piggy-backed
//! `4.04 NOT_FOUND`.
//!
//! ```ignore
//! let server = MockCoapServer::start().await;
//! server.mock(Method::Get, "/3/0/9", MockReply::content("65536"));
//! let client = CoapClient::for_addr(server.addr(), TransportConfig::default())?;
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::message::{Method, ResponseStatus};

// ── Recorded requests ───────────────────────────────────────────────

/// A request as seen on the wire by the mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    /// Uri-Path options joined as `/a/b/c`.
    pub path: String,
    pub query: Vec<String>,
    pub payload: Vec<u8>,
    pub message_id: u16,
    pub token: Vec<u8>,
    pub source: SocketAddr,
}

// ── Reply rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Piggybacked,
    Separate,
    Reset,
    Silent,
}

/// How the mock answers a matched request.
#[derive(Debug, Clone)]
pub struct MockReply {
    status: ResponseStatus,
    payload: Vec<u8>,
    location: Vec<String>,
    delivery: Delivery,
    delay: Duration,
    token: Option<Vec<u8>>,
}

impl MockReply {
    /// Piggy-backed response with the given status and no payload.
    pub fn status(status: ResponseStatus) -> Self {
        Self {
            status,
            payload: Vec::new(),
            location: Vec::new(),
            delivery: Delivery::Piggybacked,
            delay: Duration::ZERO,
            token: None,
        }
    }

    /// `2.05 CONTENT` with a text payload.
    pub fn content(body: &str) -> Self {
        Self::status(ResponseStatus::CONTENT).payload(body.as_bytes())
    }

    /// Answer with a Reset message.
    pub fn reset() -> Self {
        Self {
            delivery: Delivery::Reset,
            ..Self::status(ResponseStatus::CONTENT)
        }
    }

    /// Never answer.
    pub fn silent() -> Self {
        Self {
            delivery: Delivery::Silent,
            ..Self::status(ResponseStatus::CONTENT)
        }
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Location-Path segments to attach.
    pub fn location(mut self, segments: &[&str]) -> Self {
        self.location = segments.iter().map(|s| (*s).to_owned()).collect();
        self
    }

    /// Send an empty ACK first, then the response as a separate message.
    pub fn separate(mut self) -> Self {
        self.delivery = Delivery::Separate;
        self
    }

    /// Answer with this token instead of echoing the request's.
    pub fn token(mut self, token: &[u8]) -> Self {
        self.token = Some(token.to_vec());
        self
    }

    /// Delay the response (for separate replies, the delay follows the ACK).
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

// ── Server ──────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
    routes: Mutex<HashMap<(Method, String), MockReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Loopback CoAP server driven by [`MockReply`] rules.
pub struct MockCoapServer {
    addr: SocketAddr,
    state: Arc<State>,
    task: JoinHandle<()>,
}

impl MockCoapServer {
    /// Bind `127.0.0.1:0` and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the loopback socket cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("bind mock CoAP socket");
        let addr = socket.local_addr().expect("mock CoAP local address");
        let state = Arc::new(State::default());
        let task = tokio::spawn(serve(Arc::new(socket), Arc::clone(&state)));
        Self { addr, state, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Install (or replace) the reply for `method path`.
    pub fn mock(&self, method: Method, path: &str, reply: MockReply) {
        self.state
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((method, path.to_owned()), reply);
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for one method and path.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

impl Drop for MockCoapServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(socket: Arc<UdpSocket>, state: Arc<State>) {
    let mut buf = vec![0u8; 2048];
    let next_message_id = Arc::new(AtomicU16::new(0x4000));

    loop {
        let Ok((len, source)) = socket.recv_from(&mut buf).await else {
            continue;
        };
        let Some(datagram) = buf.get(..len) else {
            continue;
        };
        let Ok(packet) = Packet::from_bytes(datagram) else {
            continue;
        };
        let Some(request) = record(&packet, source) else {
            // ACKs for our own separate responses, or stray messages.
            continue;
        };

        let reply = state
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(request.method, request.path.clone()))
            .cloned()
            .unwrap_or_else(|| MockReply::status(ResponseStatus::NOT_FOUND));

        state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        tokio::spawn(respond(
            Arc::clone(&socket),
            request,
            reply,
            Arc::clone(&next_message_id),
        ));
    }
}

fn record(packet: &Packet, source: SocketAddr) -> Option<RecordedRequest> {
    let method = match packet.header.code {
        MessageClass::Request(RequestType::Get) => Method::Get,
        MessageClass::Request(RequestType::Post) => Method::Post,
        _ => return None,
    };
    let strings = |option| -> Vec<String> {
        packet
            .get_option(option)
            .map(|values| {
                values
                    .iter()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    };
    let path = strings(CoapOption::UriPath)
        .iter()
        .fold(String::new(), |acc, seg| acc + "/" + seg);

    Some(RecordedRequest {
        method,
        path,
        query: strings(CoapOption::UriQuery),
        payload: packet.payload.clone(),
        message_id: packet.header.message_id,
        token: packet.get_token().to_vec(),
        source,
    })
}

async fn respond(
    socket: Arc<UdpSocket>,
    request: RecordedRequest,
    reply: MockReply,
    next_message_id: Arc<AtomicU16>,
) {
    match reply.delivery {
        Delivery::Silent => {}
        Delivery::Reset => {
            let rst = empty(MessageType::Reset, request.message_id);
            send(&socket, &rst, request.source).await;
        }
        Delivery::Piggybacked => {
            tokio::time::sleep(reply.delay).await;
            let mut response = response(&reply, &request);
            response.header.set_type(MessageType::Acknowledgement);
            response.header.message_id = request.message_id;
            send(&socket, &response, request.source).await;
        }
        Delivery::Separate => {
            let ack = empty(MessageType::Acknowledgement, request.message_id);
            send(&socket, &ack, request.source).await;
            tokio::time::sleep(reply.delay).await;
            let mut response = response(&reply, &request);
            response.header.set_type(MessageType::Confirmable);
            response.header.message_id = next_message_id.fetch_add(1, Ordering::Relaxed);
            send(&socket, &response, request.source).await;
        }
    }
}

fn response(reply: &MockReply, request: &RecordedRequest) -> Packet {
    let mut packet = Packet::new();
    packet.header.code = MessageClass::from(reply.status.code());
    packet.set_token(reply.token.clone().unwrap_or_else(|| request.token.clone()));
    for segment in &reply.location {
        packet.add_option(CoapOption::LocationPath, segment.as_bytes().to_vec());
    }
    packet.payload.clone_from(&reply.payload);
    packet
}

fn empty(kind: MessageType, message_id: u16) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(kind);
    packet.header.code = MessageClass::Empty;
    packet.header.message_id = message_id;
    packet
}

async fn send(socket: &UdpSocket, packet: &Packet, to: SocketAddr) {
    if let Ok(bytes) = packet.to_bytes() {
        let _ = socket.send_to(&bytes, to).await;
    }
}
