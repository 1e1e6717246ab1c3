use tracing::trace;

// Counters are emitted as trace events; a subscriber layer can aggregate them.

pub fn remote_call(call: &str) {
    trace!(target = "ebay_sync.metrics", call = call, "trading_calls_total_inc");
}

pub fn reconcile_outcome(entity: &'static str, outcome: &'static str) {
    trace!(
        target = "ebay_sync.metrics",
        entity = entity,
        outcome = outcome,
        "reconcile_total_inc"
    );
}
