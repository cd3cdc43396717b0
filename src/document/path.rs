use bson::{Bson, Document as BsonDocument};
use std::fmt;

pub const MAX_PATH_DEPTH: usize = 32;

/// A validated dot-separated field path such as `customer.address.city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a plain dotted path (no leading `$`).
    ///
    /// # Errors
    /// Returns a description of the problem for empty paths, empty segments, segments
    /// starting with `$`, or paths deeper than `MAX_PATH_DEPTH`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("field path must not be empty".into());
        }
        let segments: Vec<String> = raw.split('.').map(str::to_owned).collect();
        if segments.len() > MAX_PATH_DEPTH {
            return Err(format!("field path '{raw}' exceeds {MAX_PATH_DEPTH} segments"));
        }
        for seg in &segments {
            if seg.is_empty() {
                return Err(format!("field path '{raw}' has an empty segment"));
            }
            if seg.starts_with('$') {
                return Err(format!("field path '{raw}' has a segment starting with '$'"));
            }
        }
        Ok(Self { raw: raw.to_owned(), segments })
    }

    /// Parses a field reference of the form `$a.b`. A missing `$` is tolerated.
    ///
    /// # Errors
    /// Same as [`FieldPath::parse`].
    pub fn from_ref(reference: &str) -> Result<Self, String> {
        Self::parse(reference.strip_prefix('$').unwrap_or(reference))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolves `path` against `doc`. `None` means the field is missing.
///
/// Arrays met on the way fan out: each document element resolves the rest of the path
/// and the gathered values come back as an array. Scalars in the middle of a path
/// resolve to missing.
#[must_use]
pub fn resolve(doc: &BsonDocument, path: &FieldPath) -> Option<Bson> {
    resolve_in_doc(doc, path.segments(), false)
}

/// Like [`resolve`], but a fan-out that gathers no values is missing rather than an
/// empty array. Filters use this so `$exists` and null equality see through arrays.
#[must_use]
pub fn resolve_present(doc: &BsonDocument, path: &FieldPath) -> Option<Bson> {
    resolve_in_doc(doc, path.segments(), true)
}

fn resolve_in_doc(doc: &BsonDocument, segs: &[String], drop_empty: bool) -> Option<Bson> {
    let (head, rest) = segs.split_first()?;
    let value = doc.get(head)?;
    if rest.is_empty() {
        return Some(value.clone());
    }
    match value {
        Bson::Document(inner) => resolve_in_doc(inner, rest, drop_empty),
        Bson::Array(items) => {
            let gathered: Vec<Bson> = items
                .iter()
                .filter_map(|item| match item {
                    Bson::Document(inner) => resolve_in_doc(inner, rest, drop_empty),
                    _ => None,
                })
                .collect();
            if drop_empty && gathered.is_empty() {
                None
            } else {
                Some(Bson::Array(gathered))
            }
        }
        _ => None,
    }
}

/// Resolves `path` through nested documents only; arrays are not traversed.
#[must_use]
pub fn resolve_strict<'a>(doc: &'a BsonDocument, path: &FieldPath) -> Option<&'a Bson> {
    let (last, parents) = path.segments().split_last()?;
    let mut cur = doc;
    for seg in parents {
        match cur.get(seg) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    cur.get(last)
}

/// Writes `value` at `path`, replacing non-document intermediates with empty documents.
pub fn set_path(doc: &mut BsonDocument, path: &FieldPath, value: Bson) {
    set_in(doc, path.segments(), value);
}

fn set_in(doc: &mut BsonDocument, segs: &[String], value: Bson) {
    let Some((head, rest)) = segs.split_first() else {
        return;
    };
    if rest.is_empty() {
        doc.insert(head.clone(), value);
        return;
    }
    if let Some(Bson::Document(child)) = doc.get_mut(head) {
        set_in(child, rest, value);
    } else {
        let mut child = BsonDocument::new();
        set_in(&mut child, rest, value);
        doc.insert(head.clone(), Bson::Document(child));
    }
}

/// Copies the value at `path` from `src` into `out`, keeping the shape around it.
/// Arrays of documents are rebuilt element by element with only the copied field;
/// non-document elements are dropped. Nothing is written when the top-level field
/// is missing or is a scalar with more path to go.
pub fn copy_path(src: &BsonDocument, out: &mut BsonDocument, path: &FieldPath) {
    copy_in(src, out, path.segments());
}

fn copy_in(src: &BsonDocument, out: &mut BsonDocument, segs: &[String]) {
    let Some((head, rest)) = segs.split_first() else {
        return;
    };
    let Some(value) = src.get(head) else {
        return;
    };
    if rest.is_empty() {
        out.insert(head.clone(), value.clone());
        return;
    }
    let existing = out.get_mut(head).map(|v| std::mem::replace(v, Bson::Null));
    let merged = match value {
        Bson::Document(inner) => {
            let mut child = match existing {
                Some(Bson::Document(d)) => d,
                _ => BsonDocument::new(),
            };
            copy_in(inner, &mut child, rest);
            Bson::Document(child)
        }
        Bson::Array(items) => {
            let mut prior = match existing {
                Some(Bson::Array(a)) => a.into_iter(),
                _ => Vec::new().into_iter(),
            };
            Bson::Array(
                items
                    .iter()
                    .filter_map(|item| {
                        let Bson::Document(inner) = item else {
                            return None;
                        };
                        let mut child = match prior.next() {
                            Some(Bson::Document(d)) => d,
                            _ => BsonDocument::new(),
                        };
                        copy_in(inner, &mut child, rest);
                        Some(Bson::Document(child))
                    })
                    .collect(),
            )
        }
        _ => match existing {
            Some(v) => v,
            None => return,
        },
    };
    out.insert(head.clone(), merged);
}

/// Removes the value at `path`. Returns whether anything was removed.
pub fn remove_path(doc: &mut BsonDocument, path: &FieldPath) -> bool {
    let Some((last, parents)) = path.segments().split_last() else {
        return false;
    };
    let mut cur = doc;
    for seg in parents {
        match cur.get_mut(seg) {
            Some(Bson::Document(d)) => cur = d,
            _ => return false,
        }
    }
    cur.remove(last).is_some()
}
