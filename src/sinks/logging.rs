use crate::engine::events::{ExecutionEvent, ExecutionEventKind};
use crate::sinks::EventSink;

/// Mirrors execution events into the `tracing` log and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit(&mut self, event: ExecutionEvent) {
        let id = &event.execution_id;
        match event.kind {
            ExecutionEventKind::Created => tracing::debug!(%id, "execution created"),
            ExecutionEventKind::Started { pid } => {
                tracing::debug!(%id, pid = ?pid, "tool process started")
            }
            ExecutionEventKind::Succeeded => tracing::info!(%id, "tool succeeded"),
            ExecutionEventKind::Failed { reason } => {
                tracing::warn!(%id, reason = ?reason, "tool failed")
            }
        }
    }
}
