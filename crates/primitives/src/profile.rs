//! Profile services and the per-device policy values they keep.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Profile services whose connection policy is reset on unbond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum Profile {
    HidHost,
    A2dp,
    A2dpSink,
    Headset,
    HeadsetClient,
    PbapClient,
    LeAudio,
    CsipSetCoordinator,
    VolumeControl,
    HapClient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum ConnectionPolicy {
    #[default]
    Unknown,
    Forbidden,
    Allowed,
}

/// Permission-gated data a remote device may access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum AccessKind {
    Phonebook,
    Message,
    Sim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum AccessPermission {
    #[default]
    Unknown,
    Allowed,
    Rejected,
}
