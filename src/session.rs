//! The session: one probed graph, one staging graph, one sid allocator.
//!
//! The probed graph reflects the system as found, the staging graph is the
//! freely editable target. Compiling a plan borrows both graphs, so the
//! borrow checker rules out editing a graph while a plan derived from it is
//! still alive.

use log::{debug, info};

use crate::{
    actiongraph::{ActionGraph, ActionGraphOptions},
    commit::{ActionCommitter, CommitCallbacks},
    device::DevicePayload,
    devicegraph::{DeviceGraph, DeviceHandle},
    error::{CommitError, PlanningError, ProbeError},
    probe::{verify_probed, Prober},
    sid::SidAllocator,
};

#[derive(Debug, Default)]
pub struct Session {
    allocator: SidAllocator,
    probed: DeviceGraph,
    staging: DeviceGraph,
}

impl Session {
    /// A session starting from nothing, e.g. for planning on blank disks.
    pub fn new() -> Self {
        Self::default()
    }

    /// A session starting from an already probed graph, e.g. one loaded from
    /// a file. The graph is verified like a freshly probed one.
    pub fn with_probed(probed: DeviceGraph, allocator: SidAllocator) -> Result<Self, ProbeError> {
        verify_probed(&probed)?;
        let staging = probed.copy();
        Ok(Self {
            allocator,
            probed,
            staging,
        })
    }

    /// Probes the system and resets staging to the probed state.
    pub fn probe(&mut self, prober: &mut dyn Prober) -> Result<(), ProbeError> {
        let probed = prober
            .probe(&mut self.allocator)
            .map_err(ProbeError::Prober)?;
        verify_probed(&probed)?;

        info!("probed {} devices", probed.num_devices());
        self.staging = probed.copy();
        self.probed = probed;
        Ok(())
    }

    pub fn probed(&self) -> &DeviceGraph {
        &self.probed
    }

    pub fn staging(&self) -> &DeviceGraph {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut DeviceGraph {
        &mut self.staging
    }

    pub fn allocator_mut(&mut self) -> &mut SidAllocator {
        &mut self.allocator
    }

    /// Adds a new device to staging with a fresh sid.
    pub fn add_to_staging(&mut self, payload: DevicePayload) -> DeviceHandle {
        self.staging.add_device(&mut self.allocator, payload)
    }

    /// Throws away all staged edits.
    pub fn discard_staging(&mut self) {
        debug!("discarding staging device graph");
        self.staging = self.probed.copy();
    }

    /// Compiles the plan that turns the probed graph into the staging graph.
    pub fn calculate_actiongraph(&self) -> Result<ActionGraph<'_>, PlanningError> {
        ActionGraph::calculate(&self.probed, &self.staging)
    }

    /// Compiles and executes the plan. On success the staging graph becomes
    /// the new probed graph.
    pub fn commit(
        &mut self,
        committer: &mut dyn ActionCommitter,
        callbacks: &mut dyn CommitCallbacks,
        options: &ActionGraphOptions,
    ) -> Result<(), CommitError> {
        let actiongraph =
            ActionGraph::calculate_with_options(&self.probed, &self.staging, options)?;
        actiongraph.commit(committer, callbacks)?;
        drop(actiongraph);

        self.probed = self.staging.copy();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    use crate::{
        action::ActionKind,
        commit::NullCommitCallbacks,
        device::{Device, Disk},
        sid::Sid,
    };

    fn disk_payload(name: &str) -> DevicePayload {
        DevicePayload::Disk(Disk {
            name: name.to_string(),
            size: 1024,
        })
    }

    struct FixedProber {
        graph: Option<DeviceGraph>,
    }

    impl Prober for FixedProber {
        fn probe(&mut self, _allocator: &mut SidAllocator) -> anyhow::Result<DeviceGraph> {
            self.graph.take().ok_or_else(|| anyhow!("nothing to probe"))
        }
    }

    /// Counts executed actions.
    #[derive(Default)]
    struct CountingCommitter {
        count: usize,
    }

    impl ActionCommitter for CountingCommitter {
        fn commit_action(
            &mut self,
            _action: &crate::action::Action,
            _lhs: &DeviceGraph,
            _rhs: &DeviceGraph,
        ) -> anyhow::Result<()> {
            self.count += 1;
            Ok(())
        }
    }

    #[test]
    fn test_probe_resets_staging() {
        let mut allocator = SidAllocator::new();
        let mut graph = DeviceGraph::new();
        graph.add_device(&mut allocator, disk_payload("/dev/sda"));

        let mut session = Session::new();
        let mut prober = FixedProber { graph: Some(graph) };
        session.probe(&mut prober).unwrap();

        assert_eq!(session.probed(), session.staging());
        assert_eq!(session.probed().num_devices(), 1);
    }

    #[test]
    fn test_probe_rejects_inconsistent_graph() {
        let mut graph = DeviceGraph::new();
        graph.insert_device(Device::new(Sid(42), disk_payload("/dev/sda")));
        graph.insert_device(Device::new(Sid(42), disk_payload("/dev/sdb")));

        let mut session = Session::new();
        let mut prober = FixedProber { graph: Some(graph) };
        assert!(matches!(
            session.probe(&mut prober),
            Err(ProbeError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_prober_failure_is_reported() {
        let mut session = Session::new();
        let mut prober = FixedProber { graph: None };
        assert!(matches!(
            session.probe(&mut prober),
            Err(ProbeError::Prober(_))
        ));
    }

    #[test]
    fn test_discard_staging() {
        let mut session = Session::new();
        session.add_to_staging(disk_payload("/dev/sda"));
        assert_ne!(session.probed(), session.staging());

        session.discard_staging();
        assert_eq!(session.probed(), session.staging());
        assert!(session.staging().is_empty());
    }

    #[test]
    fn test_staged_devices_get_fresh_sids() {
        let mut allocator = SidAllocator::new();
        let mut graph = DeviceGraph::new();
        graph.add_device(&mut allocator, disk_payload("/dev/sda"));

        let mut session = Session::with_probed(graph, allocator).unwrap();
        let handle = session.add_to_staging(disk_payload("/dev/sdb"));
        let sid = session.staging().device(handle).unwrap().sid();

        assert!(!session.probed().device_exists(sid));
    }

    #[test]
    fn test_commit_promotes_staging_to_probed() {
        let mut session = Session::new();
        session.add_to_staging(disk_payload("/dev/sda"));

        let actiongraph = session.calculate_actiongraph().unwrap();
        assert_eq!(actiongraph.num_actions(), 1);
        assert_eq!(actiongraph.actions_in_order()[0].kind, ActionKind::Create);
        drop(actiongraph);

        let mut committer = CountingCommitter::default();
        session
            .commit(
                &mut committer,
                &mut NullCommitCallbacks,
                &ActionGraphOptions::default(),
            )
            .unwrap();

        assert_eq!(committer.count, 1);
        assert_eq!(session.probed(), session.staging());

        // A second commit has nothing left to do.
        let mut committer = CountingCommitter::default();
        session
            .commit(
                &mut committer,
                &mut NullCommitCallbacks,
                &ActionGraphOptions::default(),
            )
            .unwrap();
        assert_eq!(committer.count, 0);
    }
}
