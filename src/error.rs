//! Error types.
//!
//! Lookup failures and planning failures are always surfaced to the immediate
//! caller. Structural diagnostics are not errors at all; they are collected by
//! `DeviceGraph::check()` as a list of [`CheckIssue`]s so callers can decide
//! policy.
//!
//! [`CheckIssue`]: crate::devicegraph::check::CheckIssue

use thiserror::Error;

use crate::{devicegraph::check::CheckIssue, holder::HolderKind, sid::Sid};

/// Hard failures of device graph operations.
///
/// All of these signal API misuse or a genuinely inconsistent graph; none of
/// them is worth retrying.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceGraphError {
    #[error("device not found, sid = {0}")]
    DeviceNotFound(Sid),

    #[error("device not found, name = '{0}'")]
    DeviceNotFoundByName(String),

    #[error("holder not found, source sid = {0}, target sid = {1}")]
    HolderNotFound(Sid, Sid),

    #[error("holder of kind '{kind}' already exists, source sid = {source_sid}, target sid = {target_sid}")]
    HolderAlreadyExists {
        source_sid: Sid,
        target_sid: Sid,
        kind: HolderKind,
    },

    #[error("device handle is no longer valid")]
    InvalidHandle,

    #[error("device with sid = {sid} has {found} parents, expected {expected}")]
    WrongNumberOfParents {
        sid: Sid,
        found: usize,
        expected: usize,
    },

    #[error("device with sid = {sid} has {found} children, expected {expected}")]
    WrongNumberOfChildren {
        sid: Sid,
        found: usize,
        expected: usize,
    },
}

/// Failures of the action graph compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    /// The action graph contains a dependency cycle, so no commit order
    /// exists. This indicates a logically unsatisfiable plan, not a missing
    /// object; the sid names one device on the cycle.
    #[error("action graph not a DAG, cycle involves sid = {0}")]
    NotADag(Sid),

    #[error(transparent)]
    Graph(#[from] DeviceGraphError),
}

/// Failures while committing a plan.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    /// An action failed and the callbacks decided to abort; the whole commit
    /// unwinds.
    #[error("commit aborted, action '{text}' failed")]
    Aborted {
        text: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failures while probing the system.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("prober failed")]
    Prober(#[source] anyhow::Error),

    /// The probed graph has a logic-fatal consistency issue; cosmetic issues
    /// are logged as warnings instead.
    #[error("probed device graph is inconsistent: {0}")]
    Inconsistent(CheckIssue),
}

/// Failures while saving or loading a device graph.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to access device graph file")]
    Io(#[from] std::io::Error),

    #[error("malformed device graph file")]
    Format(#[from] serde_yaml::Error),

    #[error(transparent)]
    Graph(#[from] DeviceGraphError),
}
