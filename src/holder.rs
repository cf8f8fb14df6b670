//! Holders: directed relationships between two devices.

use serde::{Deserialize, Serialize};
use strum_macros::EnumDiscriminants;

use crate::sid::Sid;

/// Kind-specific data of a holder.
///
/// Like the device kind set this is closed; kind-specific fields are rare, so
/// most variants carry none.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, EnumDiscriminants)]
#[serde(rename_all = "kebab-case")]
#[strum_discriminants(name(HolderKind), derive(strum_macros::Display, PartialOrd, Ord, Hash))]
pub enum HolderPayload {
    /// The target is a subdevice of the source, e.g. a partition of a disk or
    /// a logical volume of a volume group.
    Subdevice,

    /// The target uses the source, e.g. a volume group uses a physical
    /// volume.
    User,
}

/// One directed relationship between two devices of the same graph.
///
/// The endpoint sids are stored in the holder so that it stays meaningful on
/// its own, e.g. in a persisted record. Within a graph the endpoints are
/// authoritative; the sids are kept in sync by construction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Holder {
    source_sid: Sid,
    target_sid: Sid,
    payload: HolderPayload,
}

impl Holder {
    pub fn new(source_sid: Sid, target_sid: Sid, payload: HolderPayload) -> Self {
        Self {
            source_sid,
            target_sid,
            payload,
        }
    }

    pub fn source_sid(&self) -> Sid {
        self.source_sid
    }

    pub fn target_sid(&self) -> Sid {
        self.target_sid
    }

    pub fn kind(&self) -> HolderKind {
        HolderKind::from(&self.payload)
    }

    pub fn payload(&self) -> &HolderPayload {
        &self.payload
    }
}
