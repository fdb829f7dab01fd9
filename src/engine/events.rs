use crate::execution_id::ExecutionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an execution ended in the `Failed` state.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    LaunchFailure,
    NonZeroExit,
    TimedOut,
    Cancelled,
    Wait,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEventKind {
    Created,
    Started { pid: Option<u32> },
    Succeeded,
    Failed { reason: FailureReason },
}

impl ExecutionEventKind {
    /// `Succeeded` and `Failed` close an execution; nothing follows them.
    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { .. })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecutionEvent {
    pub execution_id: ExecutionId,
    pub kind: ExecutionEventKind,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn now(execution_id: &ExecutionId, kind: ExecutionEventKind) -> Self {
        Self {
            execution_id: execution_id.clone(),
            kind,
            timestamp: Utc::now(),
        }
    }
}

pub fn execution_created(execution_id: &ExecutionId) -> ExecutionEvent {
    ExecutionEvent::now(execution_id, ExecutionEventKind::Created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_rfc3339_timestamp() {
        let id = ExecutionId::new();
        let event = ExecutionEvent::now(&id, ExecutionEventKind::Started { pid: Some(42) });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"]["type"], "started");
        assert_eq!(json["kind"]["pid"], 42);
        let stamp = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok(), "{stamp}");
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(!ExecutionEventKind::Created.is_terminal());
        assert!(!ExecutionEventKind::Started { pid: None }.is_terminal());
        assert!(ExecutionEventKind::Succeeded.is_terminal());
        assert!(ExecutionEventKind::Failed {
            reason: FailureReason::TimedOut
        }
        .is_terminal());
    }
}
