//! Consistency checking of a device graph.
//!
//! `check()` never fails and never mutates; it collects every issue it can
//! find and leaves policy to the caller. Probing treats logic-fatal issues as
//! errors and merely logs the cosmetic ones.

use std::collections::BTreeMap;

use petgraph::algo::is_cyclic_directed;
use thiserror::Error;

use crate::{device::DeviceKind, sid::Sid};

use super::DeviceGraph;

/// How bad a [`CheckIssue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Cosmetic or recoverable; safe to proceed.
    Warning,

    /// Logic-fatal; algorithms on this graph may misbehave.
    Error,
}

/// One consistency issue found in a device graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckIssue {
    #[error("device graph has a cycle")]
    Cycle,

    #[error("sid {0} is used by more than one device")]
    DuplicateSid(Sid),

    #[error("device name '{0}' is used by more than one block device")]
    DuplicateName(String),

    #[error("{kind} with sid = {sid} has no name")]
    MissingName { sid: Sid, kind: DeviceKind },
}

impl CheckIssue {
    pub fn severity(&self) -> Severity {
        match self {
            CheckIssue::Cycle | CheckIssue::DuplicateSid(_) => Severity::Error,
            CheckIssue::DuplicateName(_) | CheckIssue::MissingName { .. } => Severity::Warning,
        }
    }
}

impl DeviceGraph {
    /// Checks the whole graph and returns every issue found.
    pub fn check(&self) -> Vec<CheckIssue> {
        let mut issues = Vec::new();

        if is_cyclic_directed(self.petgraph()) {
            issues.push(CheckIssue::Cycle);
        }

        let mut sid_counts: BTreeMap<Sid, usize> = BTreeMap::new();
        let mut name_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for device in self.devices() {
            *sid_counts.entry(device.sid()).or_default() += 1;
            if let Some(name) = device.name() {
                *name_counts.entry(name).or_default() += 1;
            }
        }

        for (sid, count) in sid_counts {
            if count > 1 {
                issues.push(CheckIssue::DuplicateSid(sid));
            }
        }

        for (name, count) in name_counts {
            if count > 1 {
                issues.push(CheckIssue::DuplicateName(name.to_string()));
            }
        }

        for device in self.devices() {
            issues.extend(device.check());
        }

        issues
    }
}
