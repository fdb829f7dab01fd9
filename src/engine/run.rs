use tokio_util::sync::CancellationToken;

use crate::process::{Execution, ExecutionRequest, ProcessRunner};
use crate::sinks::{CollectingEventSink, EventSink, LoggingEventSink};

/// Forwards each event to the log and keeps a copy.
struct Recording {
    collected: CollectingEventSink,
}

impl EventSink for Recording {
    fn emit(&mut self, event: crate::engine::events::ExecutionEvent) {
        LoggingEventSink.emit(event.clone());
        self.collected.emit(event);
    }
}

/// Run one request and return the execution together with its event trail.
///
/// The sink is owned by this function so the returned future stays `Send`
/// for the HTTP handlers.
pub async fn run_execution(
    runner: &ProcessRunner,
    request: &ExecutionRequest,
    cancel: &CancellationToken,
) -> (Execution, CollectingEventSink) {
    let mut sink = Recording {
        collected: CollectingEventSink::new(),
    };

    let execution = runner.execute(request, cancel, &mut sink).await;

    (execution, sink.collected)
}
