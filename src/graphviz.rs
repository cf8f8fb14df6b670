//! Graphviz rendering of device graphs and action graphs.
//!
//! The output is plain DOT text; callers feed it to `dot` themselves. The
//! color scheme groups devices by storage layer and actions by class so big
//! graphs stay readable.

use std::fmt::Write;

use crate::{
    action::ActionClass,
    actiongraph::ActionGraph,
    device::DeviceKind,
    devicegraph::DeviceGraph,
    holder::HolderKind,
};

/// Renders a device graph as DOT.
///
/// With `details` every node label carries the sid.
pub fn device_graph_dot(graph: &DeviceGraph, details: bool) -> String {
    let mut out = String::new();
    out.push_str("digraph devicegraph {\n");
    out.push_str("    node [shape=rectangle, style=filled, fontname=\"Arial\"];\n");

    for device in graph.devices() {
        let mut label = device.display_name();
        if details {
            let _ = write!(label, "\\nsid:{}", device.sid());
        }
        let (color, fillcolor) = device_colors(device.kind());
        let _ = writeln!(
            out,
            "    \"{}\" [label=\"{}\", color=\"{}\", fillcolor=\"{}\"];",
            device.sid(),
            escape(&label),
            color,
            fillcolor
        );
    }

    for holder in graph.holders() {
        let style = match holder.kind() {
            HolderKind::Subdevice => "solid",
            HolderKind::User => "dotted",
        };
        let _ = writeln!(
            out,
            "    \"{}\" -> \"{}\" [style={}];",
            holder.source_sid(),
            holder.target_sid(),
            style
        );
    }

    out.push_str("}\n");
    out
}

/// Renders an action graph as DOT, in commit order where one exists.
///
/// With `details` every node label carries the sid and the chain entry and
/// exit markers.
pub fn action_graph_dot(actiongraph: &ActionGraph<'_>, details: bool) -> String {
    let mut out = String::new();
    out.push_str("digraph actiongraph {\n");
    out.push_str("    node [shape=rectangle, style=filled, fontname=\"Arial\"];\n");

    for (handle, action) in actiongraph.actions_with_handles() {
        let mut label = action.describe(actiongraph.lhs(), actiongraph.rhs());
        if details {
            let _ = write!(label, "\\nsid:{}", action.sid);
            if action.first {
                label.push_str(" [f]");
            }
            if action.last {
                label.push_str(" [l]");
            }
        }
        let (color, fillcolor) = action_colors(action.class());
        let _ = writeln!(
            out,
            "    \"{}\" [label=\"{}\", color=\"{}\", fillcolor=\"{}\"];",
            handle.index(),
            escape(&label),
            color,
            fillcolor
        );
    }

    for (source, target) in actiongraph.dependencies() {
        let _ = writeln!(out, "    \"{}\" -> \"{}\";", source.index(), target.index());
    }

    out.push_str("}\n");
    out
}

fn device_colors(kind: DeviceKind) -> (&'static str, &'static str) {
    match kind {
        DeviceKind::Disk | DeviceKind::PartitionTable => ("#ff0000", "#ffaaaa"),
        DeviceKind::Partition | DeviceKind::MdRaid => ("#cc33cc", "#eeaaee"),
        DeviceKind::LvmVg => ("#0000ff", "#aaaaff"),
        DeviceKind::LvmLv | DeviceKind::Encryption => ("#6622dd", "#bb99ff"),
        DeviceKind::Filesystem => ("#008800", "#99ee99"),
    }
}

fn action_colors(class: ActionClass) -> (&'static str, &'static str) {
    match class {
        ActionClass::Nop => ("#000000", "#cccccc"),
        ActionClass::Create => ("#00ff00", "#ccffcc"),
        ActionClass::Modify => ("#0000ff", "#ccccff"),
        ActionClass::Delete => ("#ff0000", "#ffcccc"),
    }
}

fn escape(label: &str) -> String {
    label.replace('"', "\\\"")
}
