// ── Device info aggregator ──
//
// Seven independent reads issued together. A failed read degrades only its
// own field to `Unavailable`; the snapshot itself always succeeds.

use lwgate_coap::ExchangeRequest;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::lwm2m::Resource;
use crate::session::Session;

/// One field of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Reading {
    Available(String),
    #[default]
    Unavailable,
}

impl Reading {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable => None,
        }
    }
}

impl From<Option<String>> for Reading {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Unavailable, Self::Available)
    }
}

/// Serialized as the value string, or `null` when unavailable.
impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_deref().serialize(serializer)
    }
}

/// Point-in-time device information. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceInfo {
    pub identity: Reading,
    pub memory_free: Reading,
    pub memory_total: Reading,
    pub network: Reading,
    pub firmware_state: Reading,
    pub firmware_update_result: Reading,
    pub location: Reading,
}

impl DeviceInfo {
    /// Fields in snapshot order, keyed by their serialized name.
    pub fn fields(&self) -> [(&'static str, &Reading); 7] {
        [
            ("identity", &self.identity),
            ("memory_free", &self.memory_free),
            ("memory_total", &self.memory_total),
            ("network", &self.network),
            ("firmware_state", &self.firmware_state),
            ("firmware_update_result", &self.firmware_update_result),
            ("location", &self.location),
        ]
    }

    pub fn available_count(&self) -> usize {
        self.fields().iter().filter(|(_, r)| r.is_available()).count()
    }
}

impl Session {
    /// Read every snapshot resource concurrently.
    pub async fn device_info(&self) -> DeviceInfo {
        let (
            identity,
            memory_free,
            memory_total,
            network,
            firmware_state,
            firmware_update_result,
            location,
        ) = tokio::join!(
            self.read(Resource::DeviceIdentity),
            self.read(Resource::MemoryFree),
            self.read(Resource::MemoryTotal),
            self.read(Resource::Network),
            self.read(Resource::FirmwareState),
            self.read(Resource::FirmwareResult),
            self.read(Resource::Location),
        );

        let info = DeviceInfo {
            identity,
            memory_free,
            memory_total,
            network,
            firmware_state,
            firmware_update_result,
            location,
        };
        debug!(available = info.available_count(), "device info collected");
        info
    }

    /// Read one resource. Any failure becomes `Unavailable`.
    pub async fn read(&self, resource: Resource) -> Reading {
        match self.client().exchange(&ExchangeRequest::get(resource.path())).await {
            Ok(result) if result.is_success() => Reading::Available(result.payload_text()),
            Ok(result) => {
                warn!(%resource, status = %result.status, "resource read rejected");
                Reading::Unavailable
            }
            Err(e) => {
                warn!(%resource, error = %e, "resource read failed");
                Reading::Unavailable
            }
        }
    }
}
