//! Actions: the atomic steps a commit executes.
//!
//! Every action names the device it operates on by sid, never by handle, so
//! an action stays meaningful against both the probed and the staging graph.

use serde::{Deserialize, Serialize};

use crate::{
    device::{DeviceKind, DevicePayload},
    devicegraph::DeviceGraph,
    sid::Sid,
};

/// The pseudo mount point used for swap filesystems.
///
/// Swap space is never part of the mount hierarchy, so mount-order
/// constraints skip it by construction.
pub const SWAP_MOUNT_POINT: &str = "swap";

/// What one action does.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    Create,
    Delete,
    Modify,
    Format,
    SetLabel,
    SetType,
    Resize,
    Mount { mount_point: String },
    Unmount { mount_point: String },
    AddToFstab { mount_point: String },
    RemoveFromFstab { mount_point: String },
    FormatEncryption,
    OpenEncryption,

    /// A synchronization point with no effect of its own, e.g. the join after
    /// a filesystem's mount fan-out.
    Nop,
}

/// The coarse classification of an action kind, driving the dependency rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    Create,
    Modify,
    Delete,
    Nop,
}

impl ActionKind {
    pub fn class(&self) -> ActionClass {
        match self {
            ActionKind::Create | ActionKind::Format | ActionKind::FormatEncryption => {
                ActionClass::Create
            }
            ActionKind::Modify
            | ActionKind::SetLabel
            | ActionKind::SetType
            | ActionKind::Resize
            | ActionKind::Mount { .. }
            | ActionKind::AddToFstab { .. }
            | ActionKind::OpenEncryption => ActionClass::Modify,
            ActionKind::Delete
            | ActionKind::Unmount { .. }
            | ActionKind::RemoveFromFstab { .. } => ActionClass::Delete,
            ActionKind::Nop => ActionClass::Nop,
        }
    }

    /// The mount point this action refers to, for the kinds that have one.
    pub fn mount_point(&self) -> Option<&str> {
        match self {
            ActionKind::Mount { mount_point }
            | ActionKind::Unmount { mount_point }
            | ActionKind::AddToFstab { mount_point }
            | ActionKind::RemoveFromFstab { mount_point } => Some(mount_point),
            _ => None,
        }
    }
}

/// One step of a commit plan.
///
/// `first` and `last` mark the entry and exit of the per-device action chain;
/// inter-device dependencies attach there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub sid: Sid,
    pub first: bool,
    pub last: bool,
}

impl Action {
    /// A free-standing action is both first and last of its chain; chaining
    /// clears the inner flags.
    pub fn new(kind: ActionKind, sid: Sid) -> Self {
        Self {
            kind,
            sid,
            first: true,
            last: true,
        }
    }

    pub fn class(&self) -> ActionClass {
        self.kind.class()
    }

    /// Renders the action as a human-readable sentence.
    ///
    /// The device is resolved from the graph that has it: the rhs for
    /// create-class actions, the lhs for delete-class ones, and preferably
    /// the rhs otherwise. A device missing from both graphs degrades to the
    /// bare sid instead of failing; describe() is used in logs and error
    /// texts where failing would mask the real problem.
    pub fn describe(&self, lhs: &DeviceGraph, rhs: &DeviceGraph) -> String {
        let device = match self.class() {
            ActionClass::Create => rhs.find_device(self.sid).ok(),
            ActionClass::Delete => lhs.find_device(self.sid).ok(),
            ActionClass::Modify | ActionClass::Nop => rhs
                .find_device(self.sid)
                .ok()
                .or_else(|| lhs.find_device(self.sid).ok()),
        };

        let device = match device {
            Some(device) => device,
            None => return format!("sid {}", self.sid),
        };
        let name = device.display_name();

        match &self.kind {
            ActionKind::Create => format!("create {} {}", device_word(device.kind()), name),
            ActionKind::Delete => format!("delete {} {}", device_word(device.kind()), name),
            ActionKind::Modify => {
                // A rename is the most common modification and worth calling
                // out explicitly.
                match lhs.find_device(self.sid) {
                    Ok(old) if old.display_name() != name => {
                        format!("rename {} to {}", old.display_name(), name)
                    }
                    _ => format!("modify {}", name),
                }
            }
            ActionKind::Format => match device.payload() {
                DevicePayload::Filesystem(fs) => {
                    format!("create {} on its block device", fs.fs_type)
                }
                _ => format!("format {}", name),
            },
            ActionKind::SetLabel => match device.payload() {
                DevicePayload::Filesystem(fs) => match &fs.label {
                    Some(label) => format!("set label '{}' of {}", label, name),
                    None => format!("clear label of {}", name),
                },
                _ => format!("set label of {}", name),
            },
            ActionKind::SetType => match device.payload() {
                DevicePayload::Partition(partition) => {
                    format!("set id {} of partition {}", partition.id_type, name)
                }
                _ => format!("set type of {}", name),
            },
            ActionKind::Resize => format!("resize {}", name),
            ActionKind::Mount { mount_point } => format!("mount {} at {}", name, mount_point),
            ActionKind::Unmount { mount_point } => format!("unmount {} at {}", name, mount_point),
            ActionKind::AddToFstab { mount_point } => {
                format!("add {} entry for {} to fstab", mount_point, name)
            }
            ActionKind::RemoveFromFstab { mount_point } => {
                format!("remove {} entry for {} from fstab", mount_point, name)
            }
            ActionKind::FormatEncryption => format!("create encryption layer {}", name),
            ActionKind::OpenEncryption => format!("open encryption layer {}", name),
            ActionKind::Nop => format!("synchronization point for {}", name),
        }
    }
}

fn device_word(kind: DeviceKind) -> &'static str {
    match kind {
        DeviceKind::Disk => "disk",
        DeviceKind::PartitionTable => "partition table",
        DeviceKind::Partition => "partition",
        DeviceKind::MdRaid => "RAID",
        DeviceKind::LvmVg => "volume group",
        DeviceKind::LvmLv => "logical volume",
        DeviceKind::Encryption => "encryption layer",
        DeviceKind::Filesystem => "filesystem",
    }
}
