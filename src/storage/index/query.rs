use std::cmp::Ordering;

use crate::common::types::{DocId, Score};
use crate::query::executor::result::DataValue;
use crate::storage::index::Segment;

/// Document predicates understood by the searcher.
///
/// Every leaf clause that matches contributes 1.0 (times any enclosing boost)
/// to the document's score.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    /// Field equals value; NULL never matches
    Term { field: String, value: DataValue },
    Range {
        field: String,
        lower: Option<DataValue>,
        upper: Option<DataValue>,
        include_lower: bool,
        include_upper: bool,
    },
    /// Field is not NULL
    Exists { field: String },
    /// All `must` match, no `must_not` matches; without `must`, at least one `should` matches
    Bool {
        must: Vec<Query>,
        should: Vec<Query>,
        must_not: Vec<Query>,
    },
    Boost { query: Box<Query>, boost: Score },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Query::Term { field: field.into(), value: value.into() }
    }

    /// Inclusive range; either bound may be open
    pub fn range(field: impl Into<String>, lower: Option<DataValue>, upper: Option<DataValue>) -> Self {
        Query::Range {
            field: field.into(),
            lower,
            upper,
            include_lower: true,
            include_upper: true,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists { field: field.into() }
    }

    pub fn boost(self, boost: Score) -> Self {
        Query::Boost { query: Box::new(self), boost }
    }

    /// Score of `doc` if it matches, `None` otherwise. Deletions are not checked here.
    pub fn score(&self, segment: &Segment, doc: DocId) -> Option<Score> {
        match self {
            Query::MatchAll => Some(1.0),
            Query::Term { field, value } => {
                let stored = segment.value(field, doc);
                (!stored.is_null() && stored.partial_cmp(value) == Some(Ordering::Equal)).then_some(1.0)
            }
            Query::Range { field, lower, upper, include_lower, include_upper } => {
                let stored = segment.value(field, doc);
                if stored.is_null() {
                    return None;
                }
                let above_lower = lower.as_ref().is_none_or(|l| match stored.partial_cmp(l) {
                    Some(Ordering::Greater) => true,
                    Some(Ordering::Equal) => *include_lower,
                    _ => false,
                });
                let below_upper = upper.as_ref().is_none_or(|u| match stored.partial_cmp(u) {
                    Some(Ordering::Less) => true,
                    Some(Ordering::Equal) => *include_upper,
                    _ => false,
                });
                (above_lower && below_upper).then_some(1.0)
            }
            Query::Exists { field } => (!segment.value(field, doc).is_null()).then_some(1.0),
            Query::Bool { must, should, must_not } => {
                if must.is_empty() && should.is_empty() {
                    return None;
                }
                if must_not.iter().any(|q| q.score(segment, doc).is_some()) {
                    return None;
                }
                let mut total = 0.0;
                for q in must {
                    total += q.score(segment, doc)?;
                }
                let mut any_should = false;
                for q in should {
                    if let Some(s) = q.score(segment, doc) {
                        total += s;
                        any_should = true;
                    }
                }
                if must.is_empty() && !any_should {
                    return None;
                }
                Some(total)
            }
            Query::Boost { query, boost } => query.score(segment, doc).map(|s| s * boost),
        }
    }
}
