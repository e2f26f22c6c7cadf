// Exchange request/result types and their CoAP wire mapping.
//
// Callers never touch `coap_lite::Packet` directly: they build an
// `ExchangeRequest` and receive an `ExchangeResult`. This module owns the
// translation in both directions.

use std::fmt;

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType};

use crate::error::Error;

// ── Method ──────────────────────────────────────────────────────────

/// Request method. The gateway only ever reads or executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }

    fn request_type(self) -> RequestType {
        match self {
            Self::Get => RequestType::Get,
            Self::Post => RequestType::Post,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ExchangeRequest ─────────────────────────────────────────────────

/// One logical CoAP request, built fresh for every exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub method: Method,
    /// LwM2M path such as `/3/0/4` or `/rd`.
    pub path: String,
    /// Ordered `key=value` query parameters.
    pub query: Vec<String>,
    pub payload: Vec<u8>,
}

impl ExchangeRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            payload: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn with_query(mut self, query: Vec<String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Non-empty path segments, in order.
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Encode as a confirmable CoAP message.
    pub(crate) fn to_packet(&self, message_id: u16, token: Vec<u8>) -> Packet {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Confirmable);
        packet.header.code = MessageClass::Request(self.method.request_type());
        packet.header.message_id = message_id;
        packet.set_token(token);
        for segment in self.path_segments() {
            packet.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
        }
        for param in &self.query {
            packet.add_option(CoapOption::UriQuery, param.as_bytes().to_vec());
        }
        packet.payload.clone_from(&self.payload);
        packet
    }
}

// ── ResponseStatus ──────────────────────────────────────────────────

/// Broad category of a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
}

/// A CoAP response code (`c.dd`), restricted to the response classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseStatus(u8);

impl ResponseStatus {
    pub const CREATED: Self = Self(0x41);
    pub const DELETED: Self = Self(0x42);
    pub const VALID: Self = Self(0x43);
    pub const CHANGED: Self = Self(0x44);
    pub const CONTENT: Self = Self(0x45);
    pub const BAD_REQUEST: Self = Self(0x80);
    pub const UNAUTHORIZED: Self = Self(0x81);
    pub const FORBIDDEN: Self = Self(0x83);
    pub const NOT_FOUND: Self = Self(0x84);
    pub const METHOD_NOT_ALLOWED: Self = Self(0x85);
    pub const INTERNAL_SERVER_ERROR: Self = Self(0xA0);
    pub const SERVICE_UNAVAILABLE: Self = Self(0xA3);

    /// Wrap a raw code byte. Returns `None` for requests, empty and
    /// reserved classes.
    pub fn from_code(code: u8) -> Option<Self> {
        match code >> 5 {
            2 | 4 | 5 => Some(Self(code)),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn class(self) -> StatusClass {
        match self.0 >> 5 {
            2 => StatusClass::Success,
            4 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    pub fn is_success(self) -> bool {
        self.class() == StatusClass::Success
    }

    /// Registry name (`CREATED`, `NOT_FOUND`, ...), or the dotted code
    /// for unassigned values.
    pub fn name(self) -> String {
        let known = match self.0 {
            0x41 => "CREATED",
            0x42 => "DELETED",
            0x43 => "VALID",
            0x44 => "CHANGED",
            0x45 => "CONTENT",
            0x5F => "CONTINUE",
            0x80 => "BAD_REQUEST",
            0x81 => "UNAUTHORIZED",
            0x82 => "BAD_OPTION",
            0x83 => "FORBIDDEN",
            0x84 => "NOT_FOUND",
            0x85 => "METHOD_NOT_ALLOWED",
            0x86 => "NOT_ACCEPTABLE",
            0x88 => "REQUEST_ENTITY_INCOMPLETE",
            0x89 => "CONFLICT",
            0x8C => "PRECONDITION_FAILED",
            0x8D => "REQUEST_ENTITY_TOO_LARGE",
            0x8F => "UNSUPPORTED_CONTENT_FORMAT",
            0x96 => "UNPROCESSABLE_ENTITY",
            0x9D => "TOO_MANY_REQUESTS",
            0xA0 => "INTERNAL_SERVER_ERROR",
            0xA1 => "NOT_IMPLEMENTED",
            0xA2 => "BAD_GATEWAY",
            0xA3 => "SERVICE_UNAVAILABLE",
            0xA4 => "GATEWAY_TIMEOUT",
            0xA5 => "PROXYING_NOT_SUPPORTED",
            0xA8 => "HOP_LIMIT_REACHED",
            _ => return self.dotted(),
        };
        known.to_owned()
    }

    /// `c.dd` notation, e.g. `2.05`.
    pub fn dotted(self) -> String {
        format!("{}.{:02}", self.0 >> 5, self.0 & 0x1F)
    }
}

impl fmt::Debug for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.dotted(), self.name())
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dotted(), self.name())
    }
}

// ── ExchangeResult ──────────────────────────────────────────────────

/// Outcome of a completed exchange. Consumed immediately by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResult {
    pub status: ResponseStatus,
    pub payload: Vec<u8>,
    /// `Location-Path` segments joined as `/a/b`, when the server set any.
    pub location_path: Option<String>,
}

impl ExchangeResult {
    /// Decode a response message.
    pub(crate) fn from_packet(packet: &Packet) -> Result<Self, Error> {
        let code = u8::from(packet.header.code);
        let status = ResponseStatus::from_code(code).ok_or_else(|| Error::Malformed {
            reason: format!("code {}.{:02} is not a response", code >> 5, code & 0x1F),
        })?;

        let location_path = packet.get_option(CoapOption::LocationPath).map(|segments| {
            segments.iter().fold(String::new(), |mut path, segment| {
                path.push('/');
                path.push_str(&String::from_utf8_lossy(segment));
                path
            })
        });

        Ok(Self {
            status,
            payload: packet.payload.clone(),
            location_path,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Payload as text. Invalid UTF-8 sequences become U+FFFD rather than
    /// failing the read.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
