//! Saving and loading device graphs as YAML.
//!
//! The on-disk record is a flat list of devices and a flat list of holders,
//! both referring to devices by sid. Handles are never persisted; they are
//! rebuilt on load.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    device::Device,
    error::{DeviceGraphError, PersistError},
    holder::Holder,
    sid::{Sid, SidAllocator},
};

use super::{DeviceGraph, DeviceHandle};

#[derive(Serialize, Deserialize, Debug)]
struct GraphRecord {
    devices: Vec<Device>,
    holders: Vec<Holder>,
}

impl DeviceGraph {
    /// Writes the graph to a writer as YAML.
    ///
    /// Devices and holders are sorted by sid so the output is deterministic
    /// and diffs cleanly.
    pub fn save<W: Write>(&self, writer: W) -> Result<(), PersistError> {
        let mut devices: Vec<Device> = self.devices().cloned().collect();
        devices.sort_by_key(|device| device.sid());

        let mut holders: Vec<Holder> = self.holders().cloned().collect();
        holders.sort_by_key(|holder| (holder.source_sid(), holder.target_sid()));

        let record = GraphRecord { devices, holders };
        serde_yaml::to_writer(writer, &record)?;
        Ok(())
    }

    /// Reads a graph from a reader, reserving every loaded sid in the
    /// allocator so later allocations stay unique.
    pub fn load<R: Read>(reader: R, allocator: &mut SidAllocator) -> Result<Self, PersistError> {
        let record: GraphRecord = serde_yaml::from_reader(reader)?;
        debug!(
            "loading device graph with {} devices and {} holders",
            record.devices.len(),
            record.holders.len()
        );

        let mut graph = DeviceGraph::new();
        let mut handles: BTreeMap<Sid, DeviceHandle> = BTreeMap::new();
        for device in record.devices {
            allocator.reserve(device.sid());
            let sid = device.sid();
            let handle = graph.insert_device(device);
            handles.insert(sid, handle);
        }

        for holder in record.holders {
            let source = resolve(&handles, holder.source_sid())?;
            let target = resolve(&handles, holder.target_sid())?;
            graph.add_holder(source, target, holder.payload().clone())?;
        }

        Ok(graph)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistError> {
        let file = File::create(path)?;
        self.save(BufWriter::new(file))
    }

    pub fn load_from_path<P: AsRef<Path>>(
        path: P,
        allocator: &mut SidAllocator,
    ) -> Result<Self, PersistError> {
        let file = File::open(path)?;
        Self::load(BufReader::new(file), allocator)
    }
}

fn resolve(
    handles: &BTreeMap<Sid, DeviceHandle>,
    sid: Sid,
) -> Result<DeviceHandle, DeviceGraphError> {
    handles
        .get(&sid)
        .copied()
        .ok_or(DeviceGraphError::DeviceNotFound(sid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        device::{DevicePayload, Disk, Partition, PartitionIdType},
        holder::HolderPayload,
    };

    fn sample_graph(allocator: &mut SidAllocator) -> DeviceGraph {
        let mut graph = DeviceGraph::new();
        let sda = graph.add_device(
            allocator,
            DevicePayload::Disk(Disk {
                name: "/dev/sda".to_string(),
                size: 16 * 1024 * 1024 * 1024,
            }),
        );
        let sda1 = graph.add_device(
            allocator,
            DevicePayload::Partition(Partition {
                name: "/dev/sda1".to_string(),
                size: 8 * 1024 * 1024 * 1024,
                id_type: PartitionIdType::Linux,
            }),
        );
        graph.add_holder(sda, sda1, HolderPayload::Subdevice).unwrap();
        graph
    }

    #[test]
    fn test_round_trip() {
        let mut allocator = SidAllocator::new();
        let graph = sample_graph(&mut allocator);

        let mut buffer = Vec::new();
        graph.save(&mut buffer).unwrap();

        // Device payloads land on disk in YAML tag form.
        let yaml = String::from_utf8(buffer.clone()).unwrap();
        assert!(yaml.contains("payload: !disk"));
        assert!(yaml.contains("payload: !partition"));

        let mut fresh = SidAllocator::new();
        let loaded = DeviceGraph::load(buffer.as_slice(), &mut fresh).unwrap();
        assert_eq!(graph, loaded);

        // Loaded sids are reserved, so the next allocation does not collide.
        let next = fresh.next_sid();
        assert!(!loaded.device_exists(next));
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut allocator = SidAllocator::new();
        let graph = sample_graph(&mut allocator);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devicegraph.yaml");
        graph.save_to_path(&path).unwrap();

        let mut fresh = SidAllocator::new();
        let loaded = DeviceGraph::load_from_path(&path, &mut fresh).unwrap();
        assert_eq!(graph, loaded);
    }

    #[test]
    fn test_dangling_holder_is_rejected() {
        // serde_yaml renders the payload enum as a YAML tag.
        let yaml = "\
devices:
- sid: 42
  payload: !disk
    name: /dev/sda
    size: 1024
holders:
- source_sid: 42
  target_sid: 43
  payload: subdevice
";
        let mut allocator = SidAllocator::new();
        let result = DeviceGraph::load(yaml.as_bytes(), &mut allocator);
        assert!(matches!(
            result,
            Err(PersistError::Graph(DeviceGraphError::DeviceNotFound(Sid(
                43
            ))))
        ));
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        let mut allocator = SidAllocator::new();
        let result = DeviceGraph::load("devices: 3".as_bytes(), &mut allocator);
        assert!(matches!(result, Err(PersistError::Format(_))));
    }
}
