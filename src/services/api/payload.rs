//! Normalization of list payloads
//!
//! List endpoints answer either with a bare JSON array or with a paginated
//! envelope `{ "count": .., "next": .., "previous": .., "results": [..] }`.
//! Both are decoded here, at the network boundary, into a plain `Vec<T>`.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::BackendError;

/// Either wire shape of a list response
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Bare(Vec<T>),
    Paginated {
        results: Vec<T>,
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
    },
}

impl<T> ListPayload<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListPayload::Bare(items) => items,
            ListPayload::Paginated { results, .. } => results,
        }
    }

    /// Link to the following page, if the backend reported one
    pub fn next_page(&self) -> Option<&str> {
        match self {
            ListPayload::Bare(_) => None,
            ListPayload::Paginated { next, .. } => next.as_deref(),
        }
    }

    /// Total item count as reported by a paginated envelope
    pub fn total(&self) -> Option<u64> {
        match self {
            ListPayload::Bare(items) => Some(items.len() as u64),
            ListPayload::Paginated { count, .. } => *count,
        }
    }
}

/// Decode a list response body into its items
pub fn decode_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, BackendError> {
    decode_list_page(body).map(ListPayload::into_vec)
}

/// Decode a list response body, keeping pagination details
pub fn decode_list_page<T: DeserializeOwned>(body: &str) -> Result<ListPayload<T>, BackendError> {
    serde_json::from_str::<ListPayload<T>>(body)
        .map_err(|e| BackendError::Decode(format!("unrecognized list payload: {}", e)))
}
