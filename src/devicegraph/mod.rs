//! The device graph: one configuration snapshot of the storage stack.
//!
//! Nodes are [`Device`]s, directed edges are [`Holder`]s. Edges point from
//! holder to held, e.g. from a disk to its partition table and from the
//! partition table to each partition, so "children" are the things built on
//! top of a device and "parents" are the things it sits on.
//!
//! The graph exclusively owns its devices and holders. Handles stay valid
//! when *other* nodes are removed; later algorithms rely on caching handles
//! across mutations.

pub mod check;
pub mod persist;

use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use petgraph::{
    stable_graph::{DefaultIx, EdgeIndex, NodeIndex, StableDiGraph},
    visit::{Bfs, IntoEdgeReferences, Reversed},
    Direction,
};

use crate::{
    device::{Device, DevicePayload},
    error::DeviceGraphError,
    holder::{Holder, HolderPayload},
    sid::{Sid, SidAllocator},
};

/// Stable handle to a device in one specific graph.
///
/// Handles do not survive a graph copy; only sids do. Never resolve a handle
/// against a graph other than the one that produced it.
pub type DeviceHandle = NodeIndex<DefaultIx>;

/// Stable handle to a holder in one specific graph.
pub type HolderHandle = EdgeIndex<DefaultIx>;

type DevicePetgraph = StableDiGraph<Device, Holder>;

#[derive(Debug, Clone, Default)]
pub struct DeviceGraph {
    graph: DevicePetgraph,
}

impl DeviceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn num_devices(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_holders(&self) -> usize {
        self.graph.edge_count()
    }

    /// Adds a new device, assigning it the next sid from the allocator.
    pub fn add_device(
        &mut self,
        allocator: &mut SidAllocator,
        payload: DevicePayload,
    ) -> DeviceHandle {
        self.insert_device(Device::new(allocator.next_sid(), payload))
    }

    /// Inserts a device that already carries a sid, e.g. from a prober or a
    /// persisted record.
    ///
    /// Sid uniqueness is not enforced here; `check()` reports duplicates so
    /// the caller can decide policy.
    pub fn insert_device(&mut self, device: Device) -> DeviceHandle {
        trace!(
            "adding device '{}' with sid {}",
            device.display_name(),
            device.sid()
        );
        self.graph.add_node(device)
    }

    /// Adds a holder between two devices of this graph.
    ///
    /// At most one holder of a given kind may connect an ordered pair of
    /// devices; holders of different kinds between the same pair are fine.
    pub fn add_holder(
        &mut self,
        source: DeviceHandle,
        target: DeviceHandle,
        payload: HolderPayload,
    ) -> Result<HolderHandle, DeviceGraphError> {
        let source_sid = self.device(source)?.sid();
        let target_sid = self.device(target)?.sid();

        let holder = Holder::new(source_sid, target_sid, payload);
        for existing in self.graph.edges_connecting(source, target) {
            if existing.weight().kind() == holder.kind() {
                return Err(DeviceGraphError::HolderAlreadyExists {
                    source_sid,
                    target_sid,
                    kind: holder.kind(),
                });
            }
        }

        trace!(
            "adding holder of kind '{}' from sid {} to sid {}",
            holder.kind(),
            source_sid,
            target_sid
        );
        Ok(self.graph.add_edge(source, target, holder))
    }

    /// Removes a device together with every holder touching it.
    ///
    /// Handles to other devices stay valid.
    pub fn remove_device(&mut self, handle: DeviceHandle) -> Result<Device, DeviceGraphError> {
        let device = self
            .graph
            .remove_node(handle)
            .ok_or(DeviceGraphError::InvalidHandle)?;
        trace!(
            "removed device '{}' with sid {}",
            device.display_name(),
            device.sid()
        );
        Ok(device)
    }

    /// Removes a single holder.
    pub fn remove_holder(&mut self, handle: HolderHandle) -> Result<Holder, DeviceGraphError> {
        self.graph
            .remove_edge(handle)
            .ok_or(DeviceGraphError::InvalidHandle)
    }

    pub fn device(&self, handle: DeviceHandle) -> Result<&Device, DeviceGraphError> {
        self.graph
            .node_weight(handle)
            .ok_or(DeviceGraphError::InvalidHandle)
    }

    pub fn device_mut(&mut self, handle: DeviceHandle) -> Result<&mut Device, DeviceGraphError> {
        self.graph
            .node_weight_mut(handle)
            .ok_or(DeviceGraphError::InvalidHandle)
    }

    pub fn find_handle(&self, sid: Sid) -> Result<DeviceHandle, DeviceGraphError> {
        self.graph
            .node_indices()
            .find(|handle| self.graph[*handle].sid() == sid)
            .ok_or(DeviceGraphError::DeviceNotFound(sid))
    }

    pub fn find_device(&self, sid: Sid) -> Result<&Device, DeviceGraphError> {
        let handle = self.find_handle(sid)?;
        Ok(&self.graph[handle])
    }

    pub fn find_device_mut(&mut self, sid: Sid) -> Result<&mut Device, DeviceGraphError> {
        let handle = self.find_handle(sid)?;
        Ok(&mut self.graph[handle])
    }

    /// Name lookup scans block-device-kind nodes only.
    pub fn find_handle_by_name(&self, name: &str) -> Result<DeviceHandle, DeviceGraphError> {
        self.graph
            .node_indices()
            .find(|handle| self.graph[*handle].name() == Some(name))
            .ok_or_else(|| DeviceGraphError::DeviceNotFoundByName(name.to_string()))
    }

    pub fn find_device_by_name(&self, name: &str) -> Result<&Device, DeviceGraphError> {
        let handle = self.find_handle_by_name(name)?;
        Ok(&self.graph[handle])
    }

    /// Direct existence query; no error path involved.
    pub fn device_exists(&self, sid: Sid) -> bool {
        self.graph
            .node_indices()
            .any(|handle| self.graph[handle].sid() == sid)
    }

    pub fn find_holder(
        &self,
        source_sid: Sid,
        target_sid: Sid,
    ) -> Result<&Holder, DeviceGraphError> {
        self.graph
            .edge_references()
            .find(|edge| {
                edge.weight().source_sid() == source_sid && edge.weight().target_sid() == target_sid
            })
            .map(|edge| edge.weight())
            .ok_or(DeviceGraphError::HolderNotFound(source_sid, target_sid))
    }

    pub fn num_children(&self, handle: DeviceHandle) -> usize {
        self.graph
            .neighbors_directed(handle, Direction::Outgoing)
            .count()
    }

    pub fn num_parents(&self, handle: DeviceHandle) -> usize {
        self.graph
            .neighbors_directed(handle, Direction::Incoming)
            .count()
    }

    /// Returns the single child, failing when there is not exactly one.
    pub fn child(&self, handle: DeviceHandle) -> Result<DeviceHandle, DeviceGraphError> {
        let children = self.children(handle)?;
        if children.len() != 1 {
            return Err(DeviceGraphError::WrongNumberOfChildren {
                sid: self.device(handle)?.sid(),
                found: children.len(),
                expected: 1,
            });
        }
        Ok(children[0])
    }

    /// Returns the single parent, failing when there is not exactly one.
    pub fn parent(&self, handle: DeviceHandle) -> Result<DeviceHandle, DeviceGraphError> {
        let parents = self.parents(handle)?;
        if parents.len() != 1 {
            return Err(DeviceGraphError::WrongNumberOfParents {
                sid: self.device(handle)?.sid(),
                found: parents.len(),
                expected: 1,
            });
        }
        Ok(parents[0])
    }

    pub fn children(&self, handle: DeviceHandle) -> Result<Vec<DeviceHandle>, DeviceGraphError> {
        self.ensure_handle(handle)?;
        let mut result: Vec<DeviceHandle> = self
            .graph
            .neighbors_directed(handle, Direction::Outgoing)
            .collect();
        self.sort_by_sid(&mut result);
        Ok(result)
    }

    pub fn parents(&self, handle: DeviceHandle) -> Result<Vec<DeviceHandle>, DeviceGraphError> {
        self.ensure_handle(handle)?;
        let mut result: Vec<DeviceHandle> = self
            .graph
            .neighbors_directed(handle, Direction::Incoming)
            .collect();
        self.sort_by_sid(&mut result);
        Ok(result)
    }

    /// Nodes reachable by one incoming edge and then one outgoing edge.
    pub fn siblings(
        &self,
        handle: DeviceHandle,
        include_self: bool,
    ) -> Result<Vec<DeviceHandle>, DeviceGraphError> {
        self.ensure_handle(handle)?;
        let mut seen = BTreeSet::new();
        for parent in self.graph.neighbors_directed(handle, Direction::Incoming) {
            for child in self.graph.neighbors_directed(parent, Direction::Outgoing) {
                if include_self || child != handle {
                    seen.insert(child);
                }
            }
        }
        let mut result: Vec<DeviceHandle> = seen.into_iter().collect();
        self.sort_by_sid(&mut result);
        Ok(result)
    }

    /// Breadth-first closure over outgoing edges.
    pub fn descendants(
        &self,
        handle: DeviceHandle,
        include_self: bool,
    ) -> Result<Vec<DeviceHandle>, DeviceGraphError> {
        self.ensure_handle(handle)?;
        let mut result = Vec::new();
        let mut bfs = Bfs::new(&self.graph, handle);
        while let Some(visited) = bfs.next(&self.graph) {
            result.push(visited);
        }
        if !include_self {
            result.retain(|visited| *visited != handle);
        }
        self.sort_by_sid(&mut result);
        Ok(result)
    }

    /// Breadth-first closure over incoming edges.
    pub fn ancestors(
        &self,
        handle: DeviceHandle,
        include_self: bool,
    ) -> Result<Vec<DeviceHandle>, DeviceGraphError> {
        self.ensure_handle(handle)?;
        let reversed = Reversed(&self.graph);
        let mut result = Vec::new();
        let mut bfs = Bfs::new(reversed, handle);
        while let Some(visited) = bfs.next(reversed) {
            result.push(visited);
        }
        if !include_self {
            result.retain(|visited| *visited != handle);
        }
        self.sort_by_sid(&mut result);
        Ok(result)
    }

    /// Reachable nodes with no outgoing edges.
    pub fn leaves(
        &self,
        handle: DeviceHandle,
        include_self: bool,
    ) -> Result<Vec<DeviceHandle>, DeviceGraphError> {
        let mut result = self.descendants(handle, include_self)?;
        result.retain(|visited| self.num_children(*visited) == 0);
        Ok(result)
    }

    /// Reachable nodes with no incoming edges, against the reverse graph.
    pub fn roots(
        &self,
        handle: DeviceHandle,
        include_self: bool,
    ) -> Result<Vec<DeviceHandle>, DeviceGraphError> {
        let mut result = self.ancestors(handle, include_self)?;
        result.retain(|visited| self.num_parents(*visited) == 0);
        Ok(result)
    }

    /// Deep copy. Every device and holder is cloned kind-preserving, sids are
    /// preserved, and the two graphs are fully independent afterwards.
    ///
    /// This is how a staging graph is derived from a probed graph before
    /// being edited.
    pub fn copy(&self) -> DeviceGraph {
        DeviceGraph {
            graph: self.graph.clone(),
        }
    }

    pub fn device_sids(&self) -> BTreeSet<Sid> {
        self.devices().map(|device| device.sid()).collect()
    }

    pub fn holder_sid_pairs(&self) -> BTreeSet<(Sid, Sid, HolderPayload)> {
        self.holders()
            .map(|holder| {
                (
                    holder.source_sid(),
                    holder.target_sid(),
                    holder.payload().clone(),
                )
            })
            .collect()
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.graph.node_weights()
    }

    pub fn holders(&self) -> impl Iterator<Item = &Holder> {
        self.graph.edge_weights()
    }

    pub fn handles(&self) -> impl Iterator<Item = DeviceHandle> + '_ {
        self.graph.node_indices()
    }

    pub fn devices_with_handles(&self) -> impl Iterator<Item = (DeviceHandle, &Device)> {
        self.graph
            .node_indices()
            .map(move |handle| (handle, &self.graph[handle]))
    }

    pub(crate) fn petgraph(&self) -> &DevicePetgraph {
        &self.graph
    }

    fn ensure_handle(&self, handle: DeviceHandle) -> Result<(), DeviceGraphError> {
        if self.graph.contains_node(handle) {
            Ok(())
        } else {
            Err(DeviceGraphError::InvalidHandle)
        }
    }

    fn sort_by_sid(&self, handles: &mut [DeviceHandle]) {
        handles.sort_by_key(|handle| self.graph[*handle].sid());
    }
}

/// Structural equality: same sids, same attributes, same holders.
impl PartialEq for DeviceGraph {
    fn eq(&self, other: &Self) -> bool {
        if self.num_devices() != other.num_devices() || self.num_holders() != other.num_holders() {
            return false;
        }

        let mine: BTreeMap<Sid, &Device> = self.devices().map(|d| (d.sid(), d)).collect();
        let theirs: BTreeMap<Sid, &Device> = other.devices().map(|d| (d.sid(), d)).collect();

        mine == theirs && self.holder_sid_pairs() == other.holder_sid_pairs()
    }
}

impl Eq for DeviceGraph {}
