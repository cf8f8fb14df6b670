//! A library for planning storage stack changes.
//!
//! The model is two device graphs and a compiler between them: the probed
//! graph describes the storage stack as found on the system, the staging
//! graph describes the desired stack, and the action graph is the compiled,
//! dependency-ordered plan that transforms the former into the latter.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── sid.rs              storage ids and their allocation
//! ├── device.rs           devices and their closed kind set
//! ├── holder.rs           directed relationships between devices
//! ├── devicegraph/
//! │   ├── mod.rs          the device graph and its traversals
//! │   ├── check.rs        consistency checking
//! │   └── persist.rs      YAML save and load
//! ├── action.rs           the atomic steps of a plan
//! ├── actiongraph/
//! │   ├── mod.rs          diff, link and order the plan
//! │   ├── expand.rs       per-kind action chain expansion
//! │   └── reduce.rs       transitive reduction of dependencies
//! ├── commit.rs           executing a plan
//! ├── probe.rs            obtaining the probed graph
//! ├── session.rs          probed graph, staging graph, allocator
//! ├── graphviz.rs         DOT rendering of both graph types
//! └── error.rs            error types
//! ```
//!
//! The library is single-threaded by design; a [`Session`] and the graphs it
//! owns must stay on one thread.

pub mod action;
pub mod actiongraph;
pub mod commit;
pub mod device;
pub mod devicegraph;
pub mod error;
pub mod graphviz;
pub mod holder;
pub mod probe;
pub mod session;
pub mod sid;


pub use action::{Action, ActionClass, ActionKind, SWAP_MOUNT_POINT};
pub use actiongraph::{ActionGraph, ActionGraphOptions, ActionHandle};
pub use commit::{
    ActionCommitter, CommitCallbacks, CommitDecision, LoggingCommitter, NullCommitCallbacks,
};
pub use device::{Device, DeviceKind, DevicePayload};
pub use devicegraph::{
    check::{CheckIssue, Severity},
    DeviceGraph, DeviceHandle, HolderHandle,
};
pub use error::{CommitError, DeviceGraphError, PersistError, PlanningError, ProbeError};
pub use holder::{Holder, HolderKind, HolderPayload};
pub use probe::Prober;
pub use session::Session;
pub use sid::{Sid, SidAllocator};
