//! Configuration for host behavior.

/// What a host sends when the termination signal cancels an execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CancelReply {
    /// Stop silently; the caller sees no terminal response for that execution.
    #[default]
    Silent,

    /// Send an error terminal carrying [`RemoteError::cancelled`](crate::RemoteError::cancelled).
    Terminal,
}

/// Configuration for a [`MessageHost`](crate::MessageHost).
#[derive(Clone, Debug)]
pub struct HostConfig {
    /// Reply sent when an execution is cancelled.
    pub cancel_reply: CancelReply,

    /// Prefix for the names of spawned dispatch and execution tasks.
    pub task_name: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            cancel_reply: CancelReply::Silent,
            task_name: "postwire-host".to_string(),
        }
    }
}

impl HostConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cancellation reply.
    pub fn with_cancel_reply(mut self, cancel_reply: CancelReply) -> Self {
        self.cancel_reply = cancel_reply;
        self
    }

    /// Set the task name prefix.
    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = task_name.into();
        self
    }

    /// Cancelled executions end with an explicit error terminal.
    pub fn explicit_cancel() -> Self {
        Self::default().with_cancel_reply(CancelReply::Terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cancel_is_silent() {
        let config = HostConfig::default();
        assert_eq!(config.cancel_reply, CancelReply::Silent);
        assert_eq!(config.task_name, "postwire-host");
    }

    #[test]
    fn test_builder_setters() {
        let config = HostConfig::new()
            .with_cancel_reply(CancelReply::Terminal)
            .with_task_name("worker");
        assert_eq!(config.cancel_reply, CancelReply::Terminal);
        assert_eq!(config.task_name, "worker");
        assert_eq!(
            HostConfig::explicit_cancel().cancel_reply,
            CancelReply::Terminal
        );
    }
}
