use std::collections::HashSet;

use super::types::{GroupSpec, ProjectField, ProjectSpec, Stage};
use crate::errors::DbError;
use crate::query::{MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS, SortSpec};

/// A validated, ordered list of stages. Construction is the only place structural
/// problems surface; execution never fails.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// # Errors
    /// `InvalidStage` for the first stage that cannot run: an empty or oversized sort,
    /// a malformed group output name, a project without fields or with conflicting
    /// paths, or a lookup without a source collection.
    pub fn new(stages: Vec<Stage>) -> Result<Self, DbError> {
        for (index, stage) in stages.iter().enumerate() {
            let checked = match stage {
                Stage::Sort(keys) => check_sort(keys),
                Stage::Group(spec) => check_group(spec),
                Stage::Project(spec) => check_project(spec),
                Stage::Lookup(spec) if spec.from.is_empty() => Err("'from' must name a collection".into()),
                _ => Ok(()),
            };
            checked.map_err(|reason| DbError::stage(index, stage.kind().to_string(), reason))?;
        }
        Ok(Self { stages })
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Names of the collections joined by lookup stages, in stage order.
    pub fn lookup_sources(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().filter_map(|s| match s {
            Stage::Lookup(spec) => Some(spec.from.as_str()),
            _ => None,
        })
    }
}

fn check_sort(keys: &[SortSpec]) -> Result<(), String> {
    if keys.is_empty() {
        return Err("at least one sort key is required".into());
    }
    if keys.len() > MAX_SORT_FIELDS {
        return Err(format!("at most {MAX_SORT_FIELDS} sort keys are allowed, got {}", keys.len()));
    }
    Ok(())
}

fn check_group(spec: &GroupSpec) -> Result<(), String> {
    let mut seen = HashSet::new();
    for (name, _) in &spec.fields {
        if name.is_empty() || name.contains('.') || name.starts_with('$') {
            return Err(format!("invalid output field name {name:?}"));
        }
        if name == "_id" {
            return Err("'_id' is reserved for the group key".into());
        }
        if !seen.insert(name.as_str()) {
            return Err(format!("duplicate output field {name:?}"));
        }
    }
    Ok(())
}

fn check_project(spec: &ProjectSpec) -> Result<(), String> {
    if spec.fields.is_empty() {
        return Err("at least one field is required".into());
    }
    if spec.fields.len() > MAX_PROJECTION_FIELDS {
        return Err(format!("at most {MAX_PROJECTION_FIELDS} fields are allowed"));
    }
    for (i, (path, field)) in spec.fields.iter().enumerate() {
        if !spec.include_all && *field == ProjectField::Exclude && path.as_str() != "_id" {
            return Err(format!("cannot exclude {path} while including fields"));
        }
        for (other, _) in &spec.fields[..i] {
            let (a, b) = (path.segments(), other.segments());
            let shared = a.len().min(b.len());
            if a[..shared] == b[..shared] {
                return Err(format!("path collision between {other} and {path}"));
            }
        }
    }
    Ok(())
}
