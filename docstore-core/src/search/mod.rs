//! Search adapter
//!
//! A search streams every document of a namespace snapshot through a
//! filter program, collecting zero or more projected values per key.

pub mod jq;

pub use jq::JqFilter;

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A filter program mapping one document to zero or more results
pub trait SearchFilter: Send + Sync {
    fn apply(&self, document: &Value) -> StoreResult<Vec<Value>>;

    /// Outputs for each document, in order. Filters with a costly setup
    /// override this to prepare once per search.
    fn apply_all(&self, documents: &[Value]) -> StoreResult<Vec<Vec<Value>>> {
        documents.iter().map(|document| self.apply(document)).collect()
    }
}

/// One projected result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    pub value: Value,
}

/// Run `filter` over a decoded snapshot.
///
/// Hits are ordered by key, then by the order the filter produced them.
/// The first evaluation error aborts the search.
pub fn run_filter<F>(filter: &F, snapshot: Vec<(String, Value)>) -> StoreResult<Vec<SearchHit>>
where
    F: SearchFilter + ?Sized,
{
    let mut snapshot = snapshot;
    snapshot.sort_by(|a, b| a.0.cmp(&b.0));
    let (keys, documents): (Vec<String>, Vec<Value>) = snapshot.into_iter().unzip();

    let outputs = filter.apply_all(&documents)?;
    let hits = keys
        .into_iter()
        .zip(outputs)
        .flat_map(|(key, values)| {
            values.into_iter().map(move |value| SearchHit {
                key: key.clone(),
                value,
            })
        })
        .collect();
    Ok(hits)
}
