//! Organisation search.
//!
//! A request goes through three steps: [`compose_query`] turns it into an
//! index-agnostic [`SearchQuery`], the [`SearchIndex`](crate::index::SearchIndex)
//! executes it, and [`search_inner`] hydrates the hits from the store, dropping
//! any the store no longer knows about.

pub use error::SearchError;
mod facade;
mod query;
mod request;
mod result;

use error::Result;
pub use facade::search_inner;
pub use query::{NONE_SENTINEL, SearchQuery, SearchQueryBuilder, TextMatch, compose_query};
pub use request::{ALL_CATEGORIES, ALL_KEYWORDS, KeywordRef, LookupRequest, SearchRequest};
pub use result::{Distance, OrganisationSummary, SearchResult, summaries_to_json};

mod error {
    use thiserror::Error;

    use crate::{index::IndexError, store::StoreError};

    #[derive(Error, Debug)]
    pub enum SearchError {
        /// Malformed client input.
        #[error("Invalid '{field}': {message}")]
        InvalidParameter {
            field: &'static str,
            message: String,
        },
        #[error("Search index unavailable: {0}")]
        IndexUnavailable(#[from] IndexError),
        #[error("Store unavailable: {0}")]
        StoreUnavailable(#[from] StoreError),
    }

    impl SearchError {
        pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
            Self::InvalidParameter {
                field,
                message: message.into(),
            }
        }

        pub fn is_client_error(&self) -> bool {
            matches!(self, Self::InvalidParameter { .. })
        }

        /// HTTP status the error maps to at the boundary.
        pub fn status_code(&self) -> u16 {
            if self.is_client_error() { 400 } else { 500 }
        }

        /// Field-level error body, `{"<field>": ["<message>"]}`, for client errors.
        pub fn field_errors(&self) -> Option<serde_json::Value> {
            match self {
                Self::InvalidParameter { field, message } => {
                    let mut body = serde_json::Map::new();
                    body.insert((*field).to_string(), serde_json::json!([message]));
                    Some(serde_json::Value::Object(body))
                }
                _ => None,
            }
        }
    }

    pub type Result<T> = std::result::Result<T, SearchError>;
}
