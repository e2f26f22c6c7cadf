// ── Client messaging context ──
//
// One UDP socket, one receiver task, many concurrent exchanges. Each
// in-flight exchange registers a waiter under its message ID (for ACK/RST)
// and its token (for separate responses); the receiver task routes every
// inbound datagram to at most one waiter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

use coap_lite::{MessageClass, MessageType, Packet};
use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::message::{ExchangeRequest, ExchangeResult};
use crate::transport::TransportConfig;

/// Inbound message for one exchange, or why it could not be accepted.
type Inbound = Result<Packet, Error>;
type Waiter = mpsc::UnboundedSender<Inbound>;

/// Largest UDP payload; the receive buffer never truncates a datagram.
const RECV_BUFFER: usize = 65_535;

/// State shared between exchanges and the receiver task.
struct Shared {
    socket: UdpSocket,
    peer: SocketAddr,
    by_message_id: DashMap<u16, Waiter>,
    by_token: DashMap<Vec<u8>, u16>,
}

/// A bound client context talking to exactly one server.
pub(crate) struct Context {
    shared: Arc<Shared>,
    transport: TransportConfig,
    next_message_id: AtomicU16,
    next_token: AtomicU64,
    cancel: CancellationToken,
    receiver: JoinHandle<()>,
}

impl Context {
    /// Bind the local socket and start the receiver task.
    pub(crate) async fn open(peer: SocketAddr, transport: TransportConfig) -> Result<Self, Error> {
        let local = transport.bind_addr_for(&peer);
        let socket = UdpSocket::bind(local).await.map_err(|source| Error::Bind {
            port: transport.bind_port,
            source,
        })?;
        debug!(local = %socket.local_addr()?, %peer, "CoAP context bound");

        let shared = Arc::new(Shared {
            socket,
            peer,
            by_message_id: DashMap::new(),
            by_token: DashMap::new(),
        });

        let cancel = CancellationToken::new();
        let receiver = tokio::spawn(receive_task(
            Arc::clone(&shared),
            transport.max_datagram,
            cancel.clone(),
        ));

        // Random starting points keep IDs from colliding with a previous
        // process bound to the same port.
        let seed = uuid::Uuid::new_v4().into_bytes();
        let [m0, m1, t0, t1, t2, t3, t4, t5, t6, t7, ..] = seed;

        Ok(Self {
            shared,
            transport,
            next_message_id: AtomicU16::new(u16::from_be_bytes([m0, m1])),
            next_token: AtomicU64::new(u64::from_be_bytes([t0, t1, t2, t3, t4, t5, t6, t7])),
            cancel,
            receiver,
        })
    }

    pub(crate) fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.shared.socket.local_addr()?)
    }

    /// Run one confirmable request/response exchange.
    pub(crate) async fn exchange(&self, request: &ExchangeRequest) -> Result<ExchangeResult, Error> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        let token = self
            .next_token
            .fetch_add(1, Ordering::Relaxed)
            .to_be_bytes()
            .to_vec();

        let bytes = request
            .to_packet(message_id, token.clone())
            .to_bytes()
            .map_err(|e| Error::Encode(e.to_string()))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _pending = Pending::register(&self.shared, message_id, token.clone(), tx);

        let peer = self.shared.peer;
        let attempts = self.transport.max_transmissions();
        let mut acknowledged = false;

        for attempt in 0..attempts {
            if attempt > 0 {
                debug!(message_id, attempt, "retransmitting CoAP request");
            }
            self.shared.socket.send_to(&bytes, peer).await?;

            // `timeout` saturates to a far-future deadline for huge waits.
            let wait = self.transport.backoff(attempt);
            let reply = match tokio::time::timeout(wait, rx.recv()).await {
                Ok(Some(reply)) => reply?,
                Ok(None) => return Err(Error::ContextClosed),
                Err(_) => continue,
            };
            match classify(&reply) {
                Reply::Response => {
                    check_token(&reply, &token)?;
                    return ExchangeResult::from_packet(&reply);
                }
                Reply::EmptyAck => {
                    acknowledged = true;
                    break;
                }
                Reply::Reset => return Err(Error::Reset { peer }),
                Reply::Other => {
                    return Err(Error::Malformed {
                        reason: format!(
                            "unexpected {:?} message with code {}",
                            reply.header.get_type(),
                            u8::from(reply.header.code)
                        ),
                    });
                }
            }
        }

        if !acknowledged {
            return Err(Error::Timeout { peer, attempts });
        }

        trace!(message_id, "empty ACK received, awaiting separate response");
        let lifetime = self.transport.exchange_lifetime;
        let separate = async {
            while let Some(reply) = rx.recv().await {
                let reply = reply?;
                match classify(&reply) {
                    Reply::Response => return Ok(reply),
                    Reply::Reset => return Err(Error::Reset { peer }),
                    // Duplicate ACKs for our retransmissions.
                    Reply::EmptyAck | Reply::Other => {}
                }
            }
            Err(Error::ContextClosed)
        };

        match tokio::time::timeout(lifetime, separate).await {
            Ok(reply) => ExchangeResult::from_packet(&reply?),
            Err(_) => Err(Error::NoResponse {
                peer,
                waited_secs: lifetime.as_secs(),
            }),
        }
    }
}

/// A piggy-backed response must echo the request token.
fn check_token(reply: &Packet, token: &[u8]) -> Result<(), Error> {
    if reply.get_token() == token {
        Ok(())
    } else {
        Err(Error::Malformed {
            reason: format!(
                "response token {:02x?} does not match request token {token:02x?}",
                reply.get_token()
            ),
        })
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.receiver.abort();
    }
}

// ── Waiter registration ─────────────────────────────────────────────

/// Removes an exchange's waiters when it completes or is cancelled.
struct Pending<'a> {
    shared: &'a Shared,
    message_id: u16,
    token: Vec<u8>,
}

impl<'a> Pending<'a> {
    fn register(shared: &'a Shared, message_id: u16, token: Vec<u8>, waiter: Waiter) -> Self {
        shared.by_message_id.insert(message_id, waiter);
        shared.by_token.insert(token.clone(), message_id);
        Self {
            shared,
            message_id,
            token,
        }
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.shared.by_token.remove(&self.token);
        self.shared.by_message_id.remove(&self.message_id);
    }
}

// ── Inbound routing ─────────────────────────────────────────────────

enum Reply {
    Response,
    EmptyAck,
    Reset,
    Other,
}

fn classify(packet: &Packet) -> Reply {
    match (packet.header.get_type(), packet.header.code) {
        (MessageType::Reset, _) => Reply::Reset,
        (MessageType::Acknowledgement, MessageClass::Empty) => Reply::EmptyAck,
        (_, MessageClass::Response(_)) => Reply::Response,
        _ => Reply::Other,
    }
}

async fn receive_task(shared: Arc<Shared>, max_datagram: usize, cancel: CancellationToken) {
    let mut buf = vec![0u8; RECV_BUFFER];

    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = shared.socket.recv_from(&mut buf) => received,
        };

        let (len, from) = match received {
            Ok(r) => r,
            Err(e) => {
                // ICMP port-unreachable surfaces here on some platforms.
                debug!(error = %e, "CoAP receive failed");
                continue;
            }
        };

        if from != shared.peer {
            trace!(%from, "ignoring datagram from unexpected peer");
            continue;
        }

        let Some(datagram) = buf.get(..len) else {
            continue;
        };
        let packet = match Packet::from_bytes(datagram) {
            Ok(p) => p,
            Err(e) => {
                warn!(%from, error = %e, "dropping undecodable CoAP datagram");
                continue;
            }
        };

        let oversized = (len > max_datagram).then_some(len);
        if let Some(len) = oversized {
            warn!(%from, len, limit = max_datagram, "CoAP datagram exceeds size limit");
        }

        route(&shared, packet, oversized, max_datagram).await;
    }
}

/// Hand `packet` to its waiter, or an error if the datagram was too large.
fn deliver(waiter: &Waiter, packet: Packet, oversized: Option<usize>, limit: usize) {
    let inbound = match oversized {
        None => Ok(packet),
        Some(len) => Err(Error::Malformed {
            reason: format!("datagram of {len} bytes exceeds the {limit}-byte limit"),
        }),
    };
    let _ = waiter.send(inbound);
}

async fn route(shared: &Shared, packet: Packet, oversized: Option<usize>, limit: usize) {
    let message_id = packet.header.message_id;

    match packet.header.get_type() {
        MessageType::Acknowledgement | MessageType::Reset => {
            if let Some(waiter) = shared.by_message_id.get(&message_id) {
                deliver(&waiter, packet, oversized, limit);
            } else {
                trace!(message_id, "late or unknown acknowledgement");
            }
        }
        kind @ (MessageType::Confirmable | MessageType::NonConfirmable) => {
            let confirmable = kind == MessageType::Confirmable;
            let owner = shared
                .by_token
                .get(packet.get_token())
                .map(|entry| *entry.value());
            let waiter = owner.and_then(|id| shared.by_message_id.get(&id).map(|w| w.clone()));

            if confirmable {
                // ACK anything we recognise (including duplicates of an
                // already-delivered response); reset the rest.
                let reply_type = if waiter.is_some() || is_response(&packet) {
                    MessageType::Acknowledgement
                } else {
                    MessageType::Reset
                };
                send_empty(shared, reply_type, message_id).await;
            }

            match waiter {
                Some(waiter) => deliver(&waiter, packet, oversized, limit),
                None => trace!(message_id, "no exchange waiting for token"),
            }
        }
    }
}

fn is_response(packet: &Packet) -> bool {
    matches!(packet.header.code, MessageClass::Response(_))
}

async fn send_empty(shared: &Shared, kind: MessageType, message_id: u16) {
    let mut reply = Packet::new();
    reply.header.set_type(kind);
    reply.header.code = MessageClass::Empty;
    reply.header.message_id = message_id;

    match reply.to_bytes() {
        Ok(bytes) => {
            if let Err(e) = shared.socket.send_to(&bytes, shared.peer).await {
                debug!(error = %e, message_id, "failed to send empty {kind:?}");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode empty message"),
    }
}
