//! Destinations for execution lifecycle events.

pub mod collecting;
pub mod logging;

use crate::engine::events::ExecutionEvent;

pub use collecting::CollectingEventSink;
pub use logging::LoggingEventSink;

/// Receives every event of an execution, in emission order.
pub trait EventSink: Send {
    fn emit(&mut self, event: ExecutionEvent);
}
