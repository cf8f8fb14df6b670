//! Executing a compiled plan.
//!
//! The walk over the commit order is fixed; what varies is who executes each
//! action and who observes progress. Both seams are traits so tests can plug
//! in recorders and failure injectors.

use log::{debug, info};

use crate::{
    action::Action,
    actiongraph::ActionGraph,
    devicegraph::DeviceGraph,
    error::CommitError,
};

/// What to do after a failed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitDecision {
    Continue,
    Abort,
}

/// Progress observer of a commit.
///
/// The default implementations ignore everything and abort on the first
/// error, which is the right behavior for non-interactive callers.
pub trait CommitCallbacks {
    fn begin(&mut self, _num_actions: usize) {}

    fn end(&mut self) {}

    fn begin_action(&mut self, _text: &str) {}

    fn end_action(&mut self, _text: &str) {}

    fn error(&mut self, _text: &str, _error: &anyhow::Error) -> CommitDecision {
        CommitDecision::Abort
    }
}

/// Callbacks that do nothing at all.
#[derive(Debug, Default)]
pub struct NullCommitCallbacks;

impl CommitCallbacks for NullCommitCallbacks {}

/// Executes a single action against the system.
pub trait ActionCommitter {
    fn commit_action(
        &mut self,
        action: &Action,
        lhs: &DeviceGraph,
        rhs: &DeviceGraph,
    ) -> anyhow::Result<()>;
}

/// A committer that only logs what it would do. Useful for dry runs.
#[derive(Debug, Default)]
pub struct LoggingCommitter;

impl ActionCommitter for LoggingCommitter {
    fn commit_action(
        &mut self,
        action: &Action,
        lhs: &DeviceGraph,
        rhs: &DeviceGraph,
    ) -> anyhow::Result<()> {
        info!("{}", action.describe(lhs, rhs));
        Ok(())
    }
}

impl ActionGraph<'_> {
    /// Walks the commit order and executes every action.
    ///
    /// On a failed action the callbacks decide between skipping the action
    /// and aborting the whole commit.
    pub fn commit(
        &self,
        committer: &mut dyn ActionCommitter,
        callbacks: &mut dyn CommitCallbacks,
    ) -> Result<(), CommitError> {
        callbacks.begin(self.num_actions());

        for action in self.actions_in_order() {
            let text = action.describe(self.lhs(), self.rhs());
            debug!("committing action '{}'", text);
            callbacks.begin_action(&text);

            match committer.commit_action(action, self.lhs(), self.rhs()) {
                Ok(()) => callbacks.end_action(&text),
                Err(error) => match callbacks.error(&text, &error) {
                    CommitDecision::Continue => callbacks.end_action(&text),
                    CommitDecision::Abort => {
                        return Err(CommitError::Aborted {
                            text,
                            source: error,
                        });
                    }
                },
            }
        }

        callbacks.end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    use crate::{
        device::{DevicePayload, Disk},
        sid::SidAllocator,
    };

    /// Records every executed action text, failing on request.
    #[derive(Default)]
    struct RecordingCommitter {
        executed: Vec<String>,
        fail_on: Option<String>,
    }

    impl ActionCommitter for RecordingCommitter {
        fn commit_action(
            &mut self,
            action: &Action,
            lhs: &DeviceGraph,
            rhs: &DeviceGraph,
        ) -> anyhow::Result<()> {
            let text = action.describe(lhs, rhs);
            if self.fail_on.as_deref() == Some(text.as_str()) {
                return Err(anyhow!("injected failure"));
            }
            self.executed.push(text);
            Ok(())
        }
    }

    #[derive(Default)]
    struct ContinueOnError {
        errors: Vec<String>,
    }

    impl CommitCallbacks for ContinueOnError {
        fn error(&mut self, text: &str, _error: &anyhow::Error) -> CommitDecision {
            self.errors.push(text.to_string());
            CommitDecision::Continue
        }
    }

    fn two_disk_target() -> (DeviceGraph, DeviceGraph) {
        let mut allocator = SidAllocator::new();
        let lhs = DeviceGraph::new();
        let mut rhs = DeviceGraph::new();
        for name in ["/dev/sda", "/dev/sdb"] {
            rhs.add_device(
                &mut allocator,
                DevicePayload::Disk(Disk {
                    name: name.to_string(),
                    size: 1024,
                }),
            );
        }
        (lhs, rhs)
    }

    #[test]
    fn test_commit_executes_every_action_in_order() {
        let (lhs, rhs) = two_disk_target();
        let actiongraph = ActionGraph::calculate(&lhs, &rhs).unwrap();

        let mut committer = RecordingCommitter::default();
        actiongraph
            .commit(&mut committer, &mut NullCommitCallbacks)
            .unwrap();

        assert_eq!(committer.executed.len(), 2);
        assert!(committer.executed.contains(&"create disk /dev/sda".to_string()));
        assert!(committer.executed.contains(&"create disk /dev/sdb".to_string()));
    }

    #[test]
    fn test_commit_aborts_on_failure_by_default() {
        let (lhs, rhs) = two_disk_target();
        let actiongraph = ActionGraph::calculate(&lhs, &rhs).unwrap();

        let mut committer = RecordingCommitter {
            fail_on: Some("create disk /dev/sda".to_string()),
            ..Default::default()
        };
        let result = actiongraph.commit(&mut committer, &mut NullCommitCallbacks);

        match result {
            Err(CommitError::Aborted { text, .. }) => {
                assert_eq!(text, "create disk /dev/sda");
            }
            other => panic!("expected abort, got {:?}", other),
        }
    }

    #[test]
    fn test_commit_can_continue_past_failures() {
        let (lhs, rhs) = two_disk_target();
        let actiongraph = ActionGraph::calculate(&lhs, &rhs).unwrap();

        let mut committer = RecordingCommitter {
            fail_on: Some("create disk /dev/sda".to_string()),
            ..Default::default()
        };
        let mut callbacks = ContinueOnError::default();
        actiongraph.commit(&mut committer, &mut callbacks).unwrap();

        assert_eq!(callbacks.errors, vec!["create disk /dev/sda".to_string()]);
        assert_eq!(committer.executed, vec!["create disk /dev/sdb".to_string()]);
    }

    #[test]
    fn test_logging_committer_is_a_dry_run() {
        let (lhs, rhs) = two_disk_target();
        let actiongraph = ActionGraph::calculate(&lhs, &rhs).unwrap();

        actiongraph
            .commit(&mut LoggingCommitter, &mut NullCommitCallbacks)
            .unwrap();
    }
}
