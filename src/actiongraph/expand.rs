//! Expansion of a single device difference into its action chain.
//!
//! Most kinds expand to a single Create or Delete. Kinds with setup steps
//! expand to a chain, and filesystems with several mount points fan out into
//! one mount branch per mount point, joined by a Nop so the chain still has a
//! single exit for dependencies to attach to.

use crate::{
    action::{Action, ActionKind, SWAP_MOUNT_POINT},
    device::{Device, DevicePayload, Filesystem, FsType},
    sid::Sid,
};

use super::ActionGraph;

pub(super) fn add_create_actions(actiongraph: &mut ActionGraph<'_>, device: &Device) {
    let sid = device.sid();
    match device.payload() {
        DevicePayload::Partition(_) => {
            actiongraph.add_chain(vec![
                Action::new(ActionKind::Create, sid),
                Action::new(ActionKind::SetType, sid),
            ]);
        }
        DevicePayload::Encryption(_) => {
            actiongraph.add_chain(vec![
                Action::new(ActionKind::FormatEncryption, sid),
                Action::new(ActionKind::OpenEncryption, sid),
            ]);
        }
        DevicePayload::Filesystem(fs) => {
            add_filesystem_create_actions(actiongraph, sid, fs);
        }
        DevicePayload::Disk(_)
        | DevicePayload::PartitionTable(_)
        | DevicePayload::MdRaid(_)
        | DevicePayload::LvmVg(_)
        | DevicePayload::LvmLv(_) => {
            actiongraph.add_chain(vec![Action::new(ActionKind::Create, sid)]);
        }
    }
}

pub(super) fn add_delete_actions(actiongraph: &mut ActionGraph<'_>, device: &Device) {
    let sid = device.sid();
    match device.payload() {
        DevicePayload::Filesystem(fs) => {
            add_filesystem_delete_actions(actiongraph, sid, fs);
        }
        _ => {
            actiongraph.add_chain(vec![Action::new(ActionKind::Delete, sid)]);
        }
    }
}

fn add_filesystem_create_actions(actiongraph: &mut ActionGraph<'_>, sid: Sid, fs: &Filesystem) {
    let mount_points = effective_mount_points(fs);

    let mut head = vec![Action::new(ActionKind::Format, sid)];
    if fs.label.is_some() {
        head.push(Action::new(ActionKind::SetLabel, sid));
    }

    if mount_points.is_empty() {
        actiongraph.add_chain(head);
        return;
    }

    let mut head_handles = Vec::with_capacity(head.len());
    for (index, mut action) in head.into_iter().enumerate() {
        action.first = index == 0;
        action.last = false;
        head_handles.push(actiongraph.add_action(action));
    }
    for pair in head_handles.windows(2) {
        actiongraph.add_edge(pair[0], pair[1]);
    }
    let tail = head_handles[head_handles.len() - 1];

    let mut nop = Action::new(ActionKind::Nop, sid);
    nop.first = false;
    let nop_handle = actiongraph.add_action(nop);

    for mount_point in mount_points {
        let mut mount = Action::new(
            ActionKind::Mount {
                mount_point: mount_point.clone(),
            },
            sid,
        );
        mount.first = false;
        mount.last = false;
        let mount_handle = actiongraph.add_action(mount);

        let mut fstab = Action::new(ActionKind::AddToFstab { mount_point }, sid);
        fstab.first = false;
        fstab.last = false;
        let fstab_handle = actiongraph.add_action(fstab);

        actiongraph.add_edge(tail, mount_handle);
        actiongraph.add_edge(mount_handle, fstab_handle);
        actiongraph.add_edge(fstab_handle, nop_handle);
    }
}

fn add_filesystem_delete_actions(actiongraph: &mut ActionGraph<'_>, sid: Sid, fs: &Filesystem) {
    let mount_points = effective_mount_points(fs);

    if mount_points.is_empty() {
        actiongraph.add_chain(vec![Action::new(ActionKind::Delete, sid)]);
        return;
    }

    let mut delete = Action::new(ActionKind::Delete, sid);
    delete.first = false;
    let delete_handle = actiongraph.add_action(delete);

    for mount_point in mount_points {
        let mut fstab = Action::new(
            ActionKind::RemoveFromFstab {
                mount_point: mount_point.clone(),
            },
            sid,
        );
        fstab.last = false;
        let fstab_handle = actiongraph.add_action(fstab);

        let mut unmount = Action::new(ActionKind::Unmount { mount_point }, sid);
        unmount.first = false;
        unmount.last = false;
        let unmount_handle = actiongraph.add_action(unmount);

        actiongraph.add_edge(fstab_handle, unmount_handle);
        actiongraph.add_edge(unmount_handle, delete_handle);
    }
}

/// Swap is treated as mounted at the pseudo mount point so that its fstab
/// handling expands like any other filesystem.
fn effective_mount_points(fs: &Filesystem) -> Vec<String> {
    if fs.fs_type == FsType::Swap {
        vec![SWAP_MOUNT_POINT.to_string()]
    } else {
        fs.mount_points.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::{Encryption, Partition, PartitionIdType},
        devicegraph::DeviceGraph,
        sid::SidAllocator,
    };

    fn plan<'a>(lhs: &'a DeviceGraph, rhs: &'a DeviceGraph) -> ActionGraph<'a> {
        ActionGraph::calculate(lhs, rhs).unwrap()
    }

    fn kinds_of(actiongraph: &ActionGraph<'_>, sid: Sid) -> Vec<ActionKind> {
        actiongraph
            .actions_in_order()
            .iter()
            .filter(|action| action.sid == sid)
            .map(|action| action.kind.clone())
            .collect()
    }

    fn filesystem(fs_type: FsType, label: Option<&str>, mount_points: &[&str]) -> Filesystem {
        Filesystem {
            fs_type,
            label: label.map(str::to_string),
            uuid: None,
            mount_points: mount_points.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_partition_create_expands_to_create_and_set_type() {
        let mut allocator = SidAllocator::new();
        let lhs = DeviceGraph::new();
        let mut rhs = DeviceGraph::new();
        let handle = rhs.add_device(
            &mut allocator,
            DevicePayload::Partition(Partition {
                name: "/dev/sda1".to_string(),
                size: 1024,
                id_type: PartitionIdType::Lvm,
            }),
        );
        let sid = rhs.device(handle).unwrap().sid();

        let actiongraph = plan(&lhs, &rhs);
        assert_eq!(
            kinds_of(&actiongraph, sid),
            vec![ActionKind::Create, ActionKind::SetType]
        );
    }

    #[test]
    fn test_encryption_create_expands_to_format_and_open() {
        let mut allocator = SidAllocator::new();
        let lhs = DeviceGraph::new();
        let mut rhs = DeviceGraph::new();
        let handle = rhs.add_device(
            &mut allocator,
            DevicePayload::Encryption(Encryption {
                name: "/dev/mapper/cr-data".to_string(),
            }),
        );
        let sid = rhs.device(handle).unwrap().sid();

        let actiongraph = plan(&lhs, &rhs);
        assert_eq!(
            kinds_of(&actiongraph, sid),
            vec![ActionKind::FormatEncryption, ActionKind::OpenEncryption]
        );
    }

    #[test]
    fn test_filesystem_create_fans_out_per_mount_point() {
        let mut allocator = SidAllocator::new();
        let lhs = DeviceGraph::new();
        let mut rhs = DeviceGraph::new();
        let handle = rhs.add_device(
            &mut allocator,
            DevicePayload::Filesystem(filesystem(
                FsType::Btrfs,
                Some("DATA"),
                &["/data", "/backup"],
            )),
        );
        let sid = rhs.device(handle).unwrap().sid();

        let actiongraph = plan(&lhs, &rhs);
        let kinds = kinds_of(&actiongraph, sid);

        // Format first, label next, Nop last; one mount and one fstab entry
        // per mount point in between.
        assert_eq!(kinds[0], ActionKind::Format);
        assert_eq!(kinds[1], ActionKind::SetLabel);
        assert_eq!(kinds[kinds.len() - 1], ActionKind::Nop);
        assert_eq!(kinds.len(), 7);
        for mount_point in ["/data", "/backup"] {
            assert!(kinds.contains(&ActionKind::Mount {
                mount_point: mount_point.to_string()
            }));
            assert!(kinds.contains(&ActionKind::AddToFstab {
                mount_point: mount_point.to_string()
            }));
        }

        // The mount of each branch precedes its fstab entry.
        let position = |kind: &ActionKind| kinds.iter().position(|k| k == kind).unwrap();
        for mount_point in ["/data", "/backup"] {
            assert!(
                position(&ActionKind::Mount {
                    mount_point: mount_point.to_string()
                }) < position(&ActionKind::AddToFstab {
                    mount_point: mount_point.to_string()
                })
            );
        }
    }

    #[test]
    fn test_filesystem_without_mount_points_has_no_fan_out() {
        let mut allocator = SidAllocator::new();
        let lhs = DeviceGraph::new();
        let mut rhs = DeviceGraph::new();
        let handle = rhs.add_device(
            &mut allocator,
            DevicePayload::Filesystem(filesystem(FsType::Xfs, None, &[])),
        );
        let sid = rhs.device(handle).unwrap().sid();

        let actiongraph = plan(&lhs, &rhs);
        assert_eq!(kinds_of(&actiongraph, sid), vec![ActionKind::Format]);
    }

    #[test]
    fn test_swap_filesystem_uses_the_pseudo_mount_point() {
        let mut allocator = SidAllocator::new();
        let lhs = DeviceGraph::new();
        let mut rhs = DeviceGraph::new();
        let handle = rhs.add_device(
            &mut allocator,
            DevicePayload::Filesystem(filesystem(FsType::Swap, None, &[])),
        );
        let sid = rhs.device(handle).unwrap().sid();

        let actiongraph = plan(&lhs, &rhs);
        let kinds = kinds_of(&actiongraph, sid);
        assert!(kinds.contains(&ActionKind::Mount {
            mount_point: SWAP_MOUNT_POINT.to_string()
        }));
        assert!(kinds.contains(&ActionKind::AddToFstab {
            mount_point: SWAP_MOUNT_POINT.to_string()
        }));
    }

    #[test]
    fn test_filesystem_delete_unmounts_and_cleans_fstab_first() {
        let mut allocator = SidAllocator::new();
        let mut lhs = DeviceGraph::new();
        let handle = lhs.add_device(
            &mut allocator,
            DevicePayload::Filesystem(filesystem(FsType::Ext4, None, &["/home"])),
        );
        let sid = lhs.device(handle).unwrap().sid();
        let rhs = DeviceGraph::new();

        let actiongraph = plan(&lhs, &rhs);
        assert_eq!(
            kinds_of(&actiongraph, sid),
            vec![
                ActionKind::RemoveFromFstab {
                    mount_point: "/home".to_string()
                },
                ActionKind::Unmount {
                    mount_point: "/home".to_string()
                },
                ActionKind::Delete,
            ]
        );
    }
}
