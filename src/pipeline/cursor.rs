use bson::Document as BsonDocument;
use serde::Serialize;
use std::time::Instant;

use super::exec::DocStream;
use crate::telemetry::{self, AggregationRun};
use crate::utils::devlog;
use crate::utils::num::{u128_to_u64_saturating, usize_to_u64};

/// Output of an aggregation. Documents are produced on demand; the completion record
/// (a developer bench line plus telemetry counters) is written once, when the stream
/// runs dry or the cursor is dropped.
pub struct Cursor {
    inner: DocStream,
    collection: String,
    stages: usize,
    started: Instant,
    produced: usize,
    cap: Option<usize>,
    slow_pipeline_ms: u64,
    finished: bool,
}

/// Completion record written as one JSON line to the developer trace.
#[derive(Serialize)]
struct BenchRecord<'a> {
    bench: &'static str,
    collection: &'a str,
    stages: usize,
    result_count: u64,
    exhausted: bool,
    slow: bool,
    duration_ms: u64,
}

impl Cursor {
    pub(crate) fn new(inner: DocStream, collection: &str, stages: usize) -> Self {
        Self {
            inner,
            collection: collection.to_owned(),
            stages,
            started: Instant::now(),
            produced: 0,
            cap: None,
            slow_pipeline_ms: u64::MAX,
            finished: false,
        }
    }

    /// Stops after `cap` documents.
    #[must_use]
    pub(crate) fn with_cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cap;
        self
    }

    /// Counts the run as slow when it takes at least `ms` milliseconds.
    #[must_use]
    pub(crate) fn with_slow_threshold(mut self, ms: u64) -> Self {
        self.slow_pipeline_ms = ms;
        self
    }

    /// Drains the remaining documents.
    #[must_use]
    pub fn to_vec(self) -> Vec<BsonDocument> {
        self.collect()
    }

    #[must_use]
    pub fn produced(&self) -> usize {
        self.produced
    }

    fn finish(&mut self, exhausted: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        let duration_ms = u128_to_u64_saturating(self.started.elapsed().as_millis());
        let docs_out = usize_to_u64(self.produced);
        let run = AggregationRun { collection: &self.collection, stages: self.stages, docs_out, duration_ms };
        let slow = telemetry::record_aggregation(run, self.slow_pipeline_ms);
        devlog::emit_json(&BenchRecord {
            bench: "aggregate",
            collection: &self.collection,
            stages: self.stages,
            result_count: docs_out,
            exhausted,
            slow,
            duration_ms,
        });
    }
}

impl Iterator for Cursor {
    type Item = BsonDocument;

    fn next(&mut self) -> Option<BsonDocument> {
        if self.finished {
            return None;
        }
        if self.cap.is_some_and(|cap| self.produced >= cap) {
            let truncated = self.inner.next().is_some();
            if truncated {
                log::warn!(
                    "aggregation on {} truncated at {} documents (max_result_docs)",
                    self.collection,
                    self.produced
                );
            }
            self.finish(!truncated);
            return None;
        }
        match self.inner.next() {
            Some(doc) => {
                self.produced += 1;
                Some(doc)
            }
            None => {
                self.finish(true);
                None
            }
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.finish(false);
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("collection", &self.collection)
            .field("stages", &self.stages)
            .field("produced", &self.produced)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
