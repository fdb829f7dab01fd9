use crate::engine::events::ExecutionEvent;
#[cfg(test)]
use crate::engine::events::ExecutionEventKind;
use crate::sinks::EventSink;

/// An in-memory event sink that keeps every event of one execution.
///
/// Used by the HTTP bridge to return the event trail next to the result.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Vec<ExecutionEvent>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    #[cfg(test)]
    pub fn events(&self) -> &[ExecutionEvent] {
        &self.events
    }

    /// Number of `Succeeded`/`Failed` events seen so far.
    #[cfg(test)]
    pub fn terminal_count(&self) -> usize {
        self.events.iter().filter(|e| e.kind.is_terminal()).count()
    }

    #[cfg(test)]
    pub fn kinds(&self) -> Vec<ExecutionEventKind> {
        self.events.iter().map(|e| e.kind.clone()).collect()
    }

    pub fn into_events(self) -> Vec<ExecutionEvent> {
        self.events
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&mut self, event: ExecutionEvent) {
        self.events.push(event);
    }
}
