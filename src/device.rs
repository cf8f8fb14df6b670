//! Devices and their closed kind set.

use serde::{Deserialize, Serialize};
use strum_macros::EnumDiscriminants;
use uuid::Uuid;

use crate::{devicegraph::check::CheckIssue, sid::Sid};

/// Partition table type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "lowercase")]
pub enum PtType {
    Gpt,
    Msdos,
}

/// Partition id as stored in the partition table.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionIdType {
    #[strum(serialize = "0x83")]
    Linux,
    #[strum(serialize = "0x82")]
    Swap,
    #[strum(serialize = "0x8E")]
    Lvm,
    #[strum(serialize = "0xFD")]
    Raid,
    #[strum(serialize = "0xEF")]
    Esp,
}

/// Software RAID level.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RaidLevel {
    Raid0,
    Raid1,
    Raid5,
    Raid6,
    Raid10,
}

/// Filesystem type.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "lowercase")]
pub enum FsType {
    Ext4,
    Xfs,
    Btrfs,
    Swap,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub name: String,
    pub size: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    pub pt_type: PtType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub size: u64,
    pub id_type: PartitionIdType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MdRaid {
    pub name: String,
    pub level: RaidLevel,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LvmVg {
    pub vg_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LvmLv {
    pub name: String,
    pub size: u64,
}

/// A LUKS-style encryption layer sitting on top of a block device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Encryption {
    pub name: String,
}

/// A filesystem, possibly mounted at several mount points.
///
/// Swap is modeled as a filesystem that is always "mounted" at the `swap`
/// pseudo mount point.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Filesystem {
    pub fs_type: FsType,
    pub label: Option<String>,
    pub uuid: Option<Uuid>,
    pub mount_points: Vec<String>,
}

/// Kind-specific data of a device.
///
/// The kind set is closed on purpose: every dispatch point in the crate
/// matches exhaustively, so adding a kind here forces every consumer to be
/// updated at compile time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, EnumDiscriminants)]
#[serde(rename_all = "kebab-case")]
#[strum_discriminants(name(DeviceKind), derive(strum_macros::Display, PartialOrd, Ord, Hash))]
pub enum DevicePayload {
    Disk(Disk),
    PartitionTable(PartitionTable),
    Partition(Partition),
    MdRaid(MdRaid),
    LvmVg(LvmVg),
    LvmLv(LvmLv),
    Encryption(Encryption),
    Filesystem(Filesystem),
}

/// One storage object: a sid plus kind-specific data.
///
/// The sid never changes once the device exists; everything in the payload is
/// fair game for staging edits.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Device {
    sid: Sid,
    payload: DevicePayload,
}

impl Device {
    pub fn new(sid: Sid, payload: DevicePayload) -> Self {
        Self { sid, payload }
    }

    pub fn sid(&self) -> Sid {
        self.sid
    }

    pub fn kind(&self) -> DeviceKind {
        DeviceKind::from(&self.payload)
    }

    pub fn payload(&self) -> &DevicePayload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut DevicePayload {
        &mut self.payload
    }

    /// Returns the block device name, for the kinds that have one.
    ///
    /// Only these kinds participate in name lookup and duplicate-name
    /// checking; partition tables, volume groups and filesystems have no
    /// intrinsic device name.
    pub fn name(&self) -> Option<&str> {
        match &self.payload {
            DevicePayload::Disk(disk) => Some(&disk.name),
            DevicePayload::Partition(partition) => Some(&partition.name),
            DevicePayload::MdRaid(raid) => Some(&raid.name),
            DevicePayload::LvmLv(lv) => Some(&lv.name),
            DevicePayload::Encryption(encryption) => Some(&encryption.name),
            DevicePayload::PartitionTable(_)
            | DevicePayload::LvmVg(_)
            | DevicePayload::Filesystem(_) => None,
        }
    }

    /// Returns a short human-readable name suitable for logs and graphs.
    pub fn display_name(&self) -> String {
        match &self.payload {
            DevicePayload::Disk(disk) => disk.name.clone(),
            DevicePayload::PartitionTable(pt) => pt.pt_type.to_string(),
            DevicePayload::Partition(partition) => partition.name.clone(),
            DevicePayload::MdRaid(raid) => raid.name.clone(),
            DevicePayload::LvmVg(vg) => vg.vg_name.clone(),
            DevicePayload::LvmLv(lv) => lv.name.clone(),
            DevicePayload::Encryption(encryption) => encryption.name.clone(),
            DevicePayload::Filesystem(fs) => fs.fs_type.to_string(),
        }
    }

    /// Kind-specific invariant check, reported through `DeviceGraph::check()`.
    pub fn check(&self) -> Vec<CheckIssue> {
        let missing_name = match &self.payload {
            DevicePayload::Disk(disk) => disk.name.is_empty(),
            DevicePayload::Partition(partition) => partition.name.is_empty(),
            DevicePayload::MdRaid(raid) => raid.name.is_empty(),
            DevicePayload::LvmVg(vg) => vg.vg_name.is_empty(),
            DevicePayload::LvmLv(lv) => lv.name.is_empty(),
            DevicePayload::Encryption(encryption) => encryption.name.is_empty(),
            DevicePayload::PartitionTable(_) | DevicePayload::Filesystem(_) => false,
        };

        if missing_name {
            vec![CheckIssue::MissingName {
                sid: self.sid,
                kind: self.kind(),
            }]
        } else {
            vec![]
        }
    }

    /// Whether the mutable attributes of this device differ from `other`.
    ///
    /// Used on a (lhs, rhs) pair with the same sid to decide whether a diff
    /// emits a Modify action. The sid itself is not compared.
    pub fn differs_from(&self, other: &Device) -> bool {
        self.payload != other.payload
    }
}
