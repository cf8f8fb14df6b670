//! Transitive reduction of the dependency edges.
//!
//! An edge (a, b) is redundant when b is still reachable from a through some
//! other successor. Removing redundant edges changes no ordering constraint,
//! it only declutters the graph, so reduction is an opt-in cosmetic step.

use petgraph::{
    stable_graph::{NodeIndex, StableDiGraph},
    visit::{Dfs, EdgeRef, IntoEdgeReferences},
    Direction,
};

use crate::action::Action;

type ActionPetgraph = StableDiGraph<Action, ()>;

pub(super) fn transitive_reduction(graph: &mut ActionPetgraph) {
    let edges: Vec<(petgraph::stable_graph::EdgeIndex, NodeIndex, NodeIndex)> = graph
        .edge_references()
        .map(|edge| (edge.id(), edge.source(), edge.target()))
        .collect();

    // Reachability is tested against the intact graph; removing edges while
    // testing would make the result depend on iteration order.
    let mut redundant = Vec::new();
    for (edge_id, source, target) in &edges {
        let indirect = graph
            .neighbors_directed(*source, Direction::Outgoing)
            .filter(|successor| successor != target)
            .any(|successor| reaches(graph, successor, *target));
        if indirect {
            redundant.push(*edge_id);
        }
    }

    for edge_id in redundant {
        graph.remove_edge(edge_id);
    }
}

fn reaches(graph: &ActionPetgraph, from: NodeIndex, to: NodeIndex) -> bool {
    let mut dfs = Dfs::new(graph, from);
    while let Some(visited) = dfs.next(graph) {
        if visited == to {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{action::ActionKind, sid::Sid};

    fn node(graph: &mut ActionPetgraph, sid: u64) -> NodeIndex {
        graph.add_node(Action::new(ActionKind::Create, Sid(sid)))
    }

    #[test]
    fn test_shortcut_edge_is_removed() {
        let mut graph = ActionPetgraph::default();
        let a = node(&mut graph, 1);
        let b = node(&mut graph, 2);
        let c = node(&mut graph, 3);
        graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());
        graph.add_edge(a, c, ());

        transitive_reduction(&mut graph);

        assert_eq!(graph.edge_count(), 2);
        assert!(graph.find_edge(a, b).is_some());
        assert!(graph.find_edge(b, c).is_some());
        assert!(graph.find_edge(a, c).is_none());
    }

    #[test]
    fn test_chain_is_untouched() {
        let mut graph = ActionPetgraph::default();
        let a = node(&mut graph, 1);
        let b = node(&mut graph, 2);
        let c = node(&mut graph, 3);
        graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());

        transitive_reduction(&mut graph);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_diamond_keeps_both_branches() {
        let mut graph = ActionPetgraph::default();
        let a = node(&mut graph, 1);
        let b = node(&mut graph, 2);
        let c = node(&mut graph, 3);
        let d = node(&mut graph, 4);
        graph.add_edge(a, b, ());
        graph.add_edge(a, c, ());
        graph.add_edge(b, d, ());
        graph.add_edge(c, d, ());

        transitive_reduction(&mut graph);
        assert_eq!(graph.edge_count(), 4);
    }
}
