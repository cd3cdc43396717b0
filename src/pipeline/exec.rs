use bson::Document as BsonDocument;
use std::collections::HashMap;
use std::sync::Arc;

use super::core::Pipeline;
use super::lookup::ForeignIndex;
use super::types::Stage;
use super::{group, project, sort, unwind};
use crate::document::Document;
use crate::query::eval_filter;

/// Lazily produced documents flowing between stages.
pub type DocStream = Box<dyn Iterator<Item = BsonDocument> + Send>;

/// Collection snapshots available to lookup stages, by collection name.
pub type Snapshots = HashMap<String, Vec<Arc<Document>>>;

/// Runs `f` over the whole upstream, but only once the first document is requested.
struct Deferred<F> {
    pending: Option<(DocStream, F)>,
    ready: std::vec::IntoIter<BsonDocument>,
}

impl<F> Iterator for Deferred<F>
where
    F: FnOnce(Vec<BsonDocument>) -> Vec<BsonDocument>,
{
    type Item = BsonDocument;

    fn next(&mut self) -> Option<BsonDocument> {
        if let Some((upstream, f)) = self.pending.take() {
            self.ready = f(upstream.collect()).into_iter();
        }
        self.ready.next()
    }
}

pub(crate) fn deferred<F>(upstream: DocStream, f: F) -> DocStream
where
    F: FnOnce(Vec<BsonDocument>) -> Vec<BsonDocument> + Send + 'static,
{
    Box::new(Deferred { pending: Some((upstream, f)), ready: Vec::new().into_iter() })
}

impl Pipeline {
    /// Chains the stages over `source` in order. Nothing is read until the returned
    /// stream is pulled; group and sort drain their upstream on the first pull.
    /// Lookups against a collection absent from `foreign` join nothing.
    #[must_use]
    pub fn execute(&self, source: DocStream, foreign: &Snapshots) -> DocStream {
        let mut stream = source;
        for (index, stage) in self.stages().iter().enumerate() {
            log::debug!("stage {index}: {}", stage.kind());
            stream = match stage.clone() {
                Stage::Filter(filter) => Box::new(stream.filter(move |d| eval_filter(d, &filter))),
                Stage::Group(spec) => deferred(stream, move |docs| group::run(docs, &spec)),
                Stage::Lookup(spec) => {
                    let target = foreign.get(&spec.from).cloned().unwrap_or_default();
                    let joined = ForeignIndex::build(target, &spec);
                    Box::new(stream.map(move |d| joined.attach(d, &spec)))
                }
                Stage::Unwind(spec) => Box::new(stream.flat_map(move |d| unwind::expand(d, &spec))),
                Stage::Project(spec) => Box::new(stream.map(move |d| project::apply(d, &spec))),
                Stage::Sort(keys) => deferred(stream, move |docs| sort::sort(docs, &keys)),
                Stage::Limit(n) => match crate::utils::num::i64_to_usize(n) {
                    Some(n) if n > 0 => Box::new(stream.take(n)),
                    _ => Box::new(std::iter::empty()),
                },
                Stage::Skip(n) => Box::new(stream.skip(crate::utils::num::u64_to_usize_saturating(n))),
            };
        }
        stream
    }

    /// Convenience for running over in-memory documents.
    #[must_use]
    pub fn run(&self, docs: Vec<BsonDocument>, foreign: &Snapshots) -> Vec<BsonDocument> {
        self.execute(Box::new(docs.into_iter()), foreign).collect()
    }
}
