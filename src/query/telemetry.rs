use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters.
#[derive(Default)]
pub struct Metrics {
    pub aggregations_total: AtomicU64,
    pub aggregations_slow_total: AtomicU64,
    pub documents_out_total: AtomicU64,
    pub inserts_total: AtomicU64,
    pub duplicate_rejects_total: AtomicU64,
}

pub(crate) static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::default);

pub(crate) fn record_inserts(n: usize) {
    METRICS
        .inserts_total
        .fetch_add(crate::utils::num::usize_to_u64(n), Ordering::Relaxed);
}

pub(crate) fn record_duplicate_reject() {
    METRICS.duplicate_rejects_total.fetch_add(1, Ordering::Relaxed);
}

/// A finished aggregation as seen by the counters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AggregationRun<'a> {
    pub collection: &'a str,
    pub stages: usize,
    pub docs_out: u64,
    pub duration_ms: u64,
}

/// Records a finished aggregation against the caller's slow threshold. Returns whether
/// it counted as slow.
pub(crate) fn record_aggregation(run: AggregationRun<'_>, slow_pipeline_ms: u64) -> bool {
    let AggregationRun { collection, stages, docs_out, duration_ms } = run;
    let m = &*METRICS;
    m.aggregations_total.fetch_add(1, Ordering::Relaxed);
    m.documents_out_total.fetch_add(docs_out, Ordering::Relaxed);
    let slow = duration_ms >= slow_pipeline_ms;
    if slow {
        m.aggregations_slow_total.fetch_add(1, Ordering::Relaxed);
        log::warn!(
            target: "aggrelite::metrics",
            "slow aggregation on {collection}: {stages} stages, {docs_out} docs, {duration_ms} ms"
        );
    }
    slow
}

/// Counters as `name value` lines in Prometheus text format.
#[must_use]
pub fn metrics_text() -> String {
    let m = &*METRICS;
    format!(
        "aggrelite_aggregations_total {}\n\
         aggrelite_aggregations_slow_total {}\n\
         aggrelite_documents_out_total {}\n\
         aggrelite_inserts_total {}\n\
         aggrelite_duplicate_rejects_total {}\n",
        m.aggregations_total.load(Ordering::Relaxed),
        m.aggregations_slow_total.load(Ordering::Relaxed),
        m.documents_out_total.load(Ordering::Relaxed),
        m.inserts_total.load(Ordering::Relaxed),
        m.duplicate_rejects_total.load(Ordering::Relaxed),
    )
}
