use std::time::Duration;
use tracing::trace;

// Counters are emitted as trace events; the Prometheus recorder renders
// whatever the process registers.

pub fn inc_requests(route: &'static str) {
    trace!(target = "wizard.metrics", route = route, "requests_total_inc");
}

pub fn finalize_elapsed(elapsed: Duration) {
    trace!(
        target = "wizard.metrics",
        elapsed_ms = elapsed.as_millis() as u64,
        "photo_finalize_elapsed"
    );
}

pub fn submission_outcome(mode: &'static str, ok: bool, elapsed: Duration) {
    trace!(
        target = "wizard.metrics",
        mode = mode,
        ok = ok,
        elapsed_ms = elapsed.as_millis() as u64,
        "submission_outcome"
    );
}
