//! The action graph: the compiled commit plan.
//!
//! Compilation diffs two device graphs by sid, expands every difference into
//! per-device action chains, links the chains with dependency edges and
//! finally topologically sorts the result into a commit order. The two device
//! graphs are borrowed for the lifetime of the plan, so neither can be
//! mutated while the plan is alive.

mod expand;
mod reduce;

use std::collections::BTreeSet;

use log::debug;
use petgraph::{
    algo::toposort,
    stable_graph::{DefaultIx, NodeIndex, StableDiGraph},
    visit::{EdgeRef, IntoEdgeReferences},
};

use crate::{
    action::{Action, ActionClass, ActionKind},
    devicegraph::DeviceGraph,
    error::PlanningError,
    sid::Sid,
};

/// Stable handle to an action in one specific action graph.
pub type ActionHandle = NodeIndex<DefaultIx>;

type ActionPetgraph = StableDiGraph<Action, ()>;

/// Tuning knobs for the plan compilation.
#[derive(Debug, Clone, Default)]
pub struct ActionGraphOptions {
    /// Remove dependency edges implied by transitivity. The commit order is
    /// unaffected; this only declutters visualizations of large plans.
    pub reduce: bool,
}

pub struct ActionGraph<'a> {
    lhs: &'a DeviceGraph,
    rhs: &'a DeviceGraph,
    graph: ActionPetgraph,
    order: Vec<ActionHandle>,
}

impl<'a> ActionGraph<'a> {
    /// Compiles the plan that transforms `lhs` into `rhs`.
    pub fn calculate(
        lhs: &'a DeviceGraph,
        rhs: &'a DeviceGraph,
    ) -> Result<ActionGraph<'a>, PlanningError> {
        Self::calculate_with_options(lhs, rhs, &ActionGraphOptions::default())
    }

    pub fn calculate_with_options(
        lhs: &'a DeviceGraph,
        rhs: &'a DeviceGraph,
        options: &ActionGraphOptions,
    ) -> Result<ActionGraph<'a>, PlanningError> {
        let mut actiongraph = ActionGraph {
            lhs,
            rhs,
            graph: ActionPetgraph::default(),
            order: Vec::new(),
        };

        actiongraph.get_actions()?;
        actiongraph.add_dependencies()?;

        if options.reduce {
            let before = actiongraph.graph.edge_count();
            reduce::transitive_reduction(&mut actiongraph.graph);
            debug!(
                "transitive reduction removed {} of {} dependencies",
                before - actiongraph.graph.edge_count(),
                before
            );
        }

        actiongraph.get_order()?;

        debug!(
            "compiled plan with {} actions and {} dependencies",
            actiongraph.graph.node_count(),
            actiongraph.graph.edge_count()
        );
        Ok(actiongraph)
    }

    /// Diffs the two graphs by sid and expands every difference into actions.
    fn get_actions(&mut self) -> Result<(), PlanningError> {
        let lhs_sids = self.lhs.device_sids();
        let rhs_sids = self.rhs.device_sids();

        for sid in rhs_sids.difference(&lhs_sids) {
            let device = self.rhs.find_device(*sid)?.clone();
            expand::add_create_actions(self, &device);
        }

        for sid in lhs_sids.difference(&rhs_sids) {
            let device = self.lhs.find_device(*sid)?.clone();
            expand::add_delete_actions(self, &device);
        }

        for sid in lhs_sids.intersection(&rhs_sids) {
            let lhs_device = self.lhs.find_device(*sid)?;
            let rhs_device = self.rhs.find_device(*sid)?;
            if lhs_device.differs_from(rhs_device) {
                self.add_action(Action::new(ActionKind::Modify, *sid));
            }
        }

        Ok(())
    }

    /// Links the per-device chains with inter-device dependency edges.
    fn add_dependencies(&mut self) -> Result<(), PlanningError> {
        let handles: Vec<ActionHandle> = self.graph.node_indices().collect();

        for handle in handles {
            let action = &self.graph[handle];
            let (class, first, last) = (action.class(), action.first, action.last);
            match class {
                ActionClass::Create if first => self.add_create_dependencies(handle)?,
                ActionClass::Delete if last => self.add_delete_dependencies(handle)?,
                _ => {}
            }
        }

        self.add_mount_dependencies();

        Ok(())
    }

    /// A create chain starts after its parents exist.
    ///
    /// For each rhs parent, that is either the parent's own create chain or,
    /// when the parent already exists, the delete chains of the lhs children
    /// making room on it.
    fn add_create_dependencies(&mut self, handle: ActionHandle) -> Result<(), PlanningError> {
        let sid = self.graph[handle].sid;
        let (lhs, rhs) = (self.lhs, self.rhs);
        let mut new_edges = Vec::new();

        let rhs_handle = rhs.find_handle(sid)?;
        for parent_handle in rhs.parents(rhs_handle)? {
            let parent_sid = rhs.device(parent_handle)?.sid();

            if !lhs.device_exists(parent_sid) {
                for source in self.actions_with_sid(parent_sid, false, true) {
                    new_edges.push((source, handle));
                }
            } else {
                let lhs_parent = lhs.find_handle(parent_sid)?;
                for child_handle in lhs.children(lhs_parent)? {
                    let child_sid = lhs.device(child_handle)?.sid();
                    if rhs.device_exists(child_sid) {
                        continue;
                    }
                    for source in self.actions_with_sid(child_sid, false, true) {
                        if self.graph[source].class() == ActionClass::Delete {
                            new_edges.push((source, handle));
                        }
                    }
                }
            }
        }

        for (source, target) in new_edges {
            self.add_edge(source, target);
        }
        Ok(())
    }

    /// A delete chain finishes before the delete chains of its lhs parents
    /// start; the stack is torn down top to bottom.
    fn add_delete_dependencies(&mut self, handle: ActionHandle) -> Result<(), PlanningError> {
        let sid = self.graph[handle].sid;
        let lhs = self.lhs;
        let mut new_edges = Vec::new();

        let lhs_handle = lhs.find_handle(sid)?;
        for parent_handle in lhs.parents(lhs_handle)? {
            let parent_sid = lhs.device(parent_handle)?.sid();
            for target in self.actions_with_sid(parent_sid, true, false) {
                if self.graph[target].class() == ActionClass::Delete {
                    new_edges.push((handle, target));
                }
            }
        }

        for (source, target) in new_edges {
            self.add_edge(source, target);
        }
        Ok(())
    }

    /// Mounts happen in mount path order, unmounts in reverse. The swap
    /// pseudo mount point takes part in neither.
    fn add_mount_dependencies(&mut self) {
        let mut mounts: Vec<(String, ActionHandle)> = Vec::new();
        let mut unmounts: Vec<(String, ActionHandle)> = Vec::new();

        for handle in self.graph.node_indices() {
            let action = &self.graph[handle];
            match &action.kind {
                ActionKind::Mount { mount_point } if mount_point != crate::action::SWAP_MOUNT_POINT => {
                    mounts.push((mount_point.clone(), handle));
                }
                ActionKind::Unmount { mount_point }
                    if mount_point != crate::action::SWAP_MOUNT_POINT =>
                {
                    unmounts.push((mount_point.clone(), handle));
                }
                _ => {}
            }
        }

        mounts.sort_by(|a, b| a.0.cmp(&b.0));
        for pair in mounts.windows(2) {
            self.add_edge(pair[0].1, pair[1].1);
        }

        unmounts.sort_by(|a, b| b.0.cmp(&a.0));
        for pair in unmounts.windows(2) {
            self.add_edge(pair[0].1, pair[1].1);
        }
    }

    /// Topologically sorts the actions into the commit order.
    fn get_order(&mut self) -> Result<(), PlanningError> {
        match toposort(&self.graph, None) {
            Ok(order) => {
                self.order = order;
                Ok(())
            }
            Err(cycle) => Err(PlanningError::NotADag(self.graph[cycle.node_id()].sid)),
        }
    }

    pub(crate) fn add_action(&mut self, action: Action) -> ActionHandle {
        self.graph.add_node(action)
    }

    pub(crate) fn add_edge(&mut self, source: ActionHandle, target: ActionHandle) {
        // update_edge keeps the graph free of parallel dependencies.
        self.graph.update_edge(source, target, ());
    }

    /// Adds a linear chain of actions for one device, wiring consecutive
    /// actions and setting the first/last markers.
    pub(crate) fn add_chain(&mut self, actions: Vec<Action>) -> Vec<ActionHandle> {
        let count = actions.len();
        let mut handles = Vec::with_capacity(count);

        for (index, mut action) in actions.into_iter().enumerate() {
            action.first = index == 0;
            action.last = index == count - 1;
            handles.push(self.add_action(action));
        }

        for pair in handles.windows(2) {
            self.add_edge(pair[0], pair[1]);
        }

        handles
    }

    /// All actions operating on `sid`, optionally narrowed to the chain entry
    /// or exit.
    pub(crate) fn actions_with_sid(
        &self,
        sid: Sid,
        only_first: bool,
        only_last: bool,
    ) -> Vec<ActionHandle> {
        self.graph
            .node_indices()
            .filter(|handle| {
                let action = &self.graph[*handle];
                action.sid == sid
                    && (!only_first || action.first)
                    && (!only_last || action.last)
            })
            .collect()
    }

    /// The actions in commit order.
    pub fn actions_in_order(&self) -> Vec<&Action> {
        self.order.iter().map(|handle| &self.graph[*handle]).collect()
    }

    pub fn handles_in_order(&self) -> &[ActionHandle] {
        &self.order
    }

    pub fn action(&self, handle: ActionHandle) -> Option<&Action> {
        self.graph.node_weight(handle)
    }

    pub fn num_actions(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Every dependency edge as a (before, after) handle pair.
    pub fn dependencies(&self) -> Vec<(ActionHandle, ActionHandle)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.target()))
            .collect()
    }

    pub fn actions_with_handles(&self) -> impl Iterator<Item = (ActionHandle, &Action)> {
        self.graph
            .node_indices()
            .map(move |handle| (handle, &self.graph[handle]))
    }

    pub fn lhs(&self) -> &DeviceGraph {
        self.lhs
    }

    pub fn rhs(&self) -> &DeviceGraph {
        self.rhs
    }

    /// The sids touched by any action, in ascending order.
    pub fn touched_sids(&self) -> BTreeSet<Sid> {
        self.graph
            .node_weights()
            .map(|action| action.sid)
            .collect()
    }
}

/// Convenience for tests and logs: whether `before` is ordered before
/// `after` in the commit order.
#[cfg(test)]
pub(crate) fn ordered_before(
    actiongraph: &ActionGraph<'_>,
    before: ActionHandle,
    after: ActionHandle,
) -> bool {
    let position = |handle| {
        actiongraph
            .handles_in_order()
            .iter()
            .position(|other| *other == handle)
    };
    match (position(before), position(after)) {
        (Some(b), Some(a)) => b < a,
        _ => false,
    }
}
