// ── LwM2M path tables ──
//
// The fixed vocabulary the gateway knows about. Names come from strum
// (snake_case), paths from `path()`. Neither table changes at runtime.

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Registration interface path on the LwM2M server.
pub const REGISTRATION_PATH: &str = "/rd";

/// Readable resources, by logical name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Device object instance.
    DeviceIdentity,
    /// Battery level.
    Power,
    MemoryFree,
    MemoryTotal,
    /// Connectivity monitoring object instance.
    Network,
    FirmwareState,
    FirmwareResult,
    /// Location object instance.
    Location,
}

impl Resource {
    pub const fn path(self) -> &'static str {
        match self {
            Self::DeviceIdentity => "/3/0",
            Self::Power => "/3/0/7",
            Self::MemoryFree => "/3/0/10",
            Self::MemoryTotal => "/3/0/9",
            Self::Network => "/4/0",
            Self::FirmwareState => "/5/0/3",
            Self::FirmwareResult => "/5/0/5",
            Self::Location => "/6/0",
        }
    }
}

/// Executable device commands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceCommand {
    Reboot,
    FactoryReset,
    FirmwareUpdate,
}

impl DeviceCommand {
    /// Resource executed by this command.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Reboot => "/3/0/4",
            Self::FactoryReset => "/3/0/5",
            Self::FirmwareUpdate => "/5/0/2",
        }
    }

    /// Exact, case-sensitive lookup by name.
    pub fn lookup(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Every command name, in table order.
    pub fn names() -> Vec<&'static str> {
        Self::iter().map(Self::name).collect()
    }
}
