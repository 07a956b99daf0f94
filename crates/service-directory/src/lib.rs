//! Service directory search.
//!
//! Finds organisations offering services by fuzzy free text, country, keyword and
//! category filters and distance from a point, then hydrates the matches from the
//! relational store. The search index is allowed to run ahead of the store: hits the
//! store no longer knows about are dropped (and logged) instead of failing the
//! request.
//!
//! # Quick Start
//!
//! ```rust
//! use service_directory::{GeoPoint, SearchRequest, ServiceDirectory};
//! use service_directory::data::{TestDataConfig, create_test_data};
//!
//! let dir = create_test_data(&TestDataConfig::cape_town())?;
//! let directory = ServiceDirectory::open(dir.path())?;
//!
//! // Adderley Street, outside Cape Town station
//! let origin: GeoPoint = "-33.921387,18.424101".parse()?;
//! let results = directory.search(
//!     &SearchRequest::default()
//!         .with_search_term("hospital")
//!         .with_location(origin),
//! )?;
//! assert_eq!(results[0].organisation.name, "Netcare Christiaan Barnard Memorial Hospital");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Query parameters straight from an HTTP request go through
//! [`SearchRequest::from_query_pairs`] (or [`ServiceDirectory::search_query_pairs`]);
//! malformed values come back as a [`SearchError::InvalidParameter`] naming the field.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod error;
mod index;
mod search;
mod store;

pub use self::core::{HomePageCategory, SearchResults, ServiceDirectory, ServiceDirectoryBuilder};

pub use config::{Fuzziness, MAX_FUZZY_DISTANCE, SearchConfig, SearchConfigBuilder};
pub use index::{
    INDEX_NAME, IndexError, IndexHit, OrganisationDocument, OrganisationIndex, SearchIndex,
    index_path_in,
};
pub use search::{
    ALL_CATEGORIES, ALL_KEYWORDS, Distance, KeywordRef, LookupRequest, NONE_SENTINEL,
    OrganisationSummary, SearchError, SearchQuery, SearchQueryBuilder, SearchRequest,
    SearchResult, TextMatch, compose_query, search_inner, summaries_to_json,
};
pub use service_directory_data as data;
pub use service_directory_data::{
    Category, Country, DirectoryData, GeoPoint, GeoPointError, Keyword, Organisation,
};
pub use store::{OrganisationStore, StoreError};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the service directory.
///
/// Call this once at the start of your application; later calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// ```rust
/// use service_directory::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), service_directory::error::DirectoryError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::DirectoryError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TestDataConfig, create_test_data};

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        setup_test_env();
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }

    #[test]
    fn test_directory_creation() {
        setup_test_env();

        let dir = create_test_data(&TestDataConfig::cape_town()).unwrap();
        let directory = ServiceDirectory::builder()
            .data_dir(dir.path())
            .in_memory_index(true)
            .build();
        assert!(directory.is_ok(), "Should be able to create directory with test data");
    }

    #[test]
    fn test_missing_tables_fail_to_open() {
        setup_test_env();

        let dir = tempfile::TempDir::new().unwrap();
        let err = ServiceDirectory::open(dir.path()).unwrap_err();
        assert!(matches!(err, error::DirectoryError::DataError(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_query_pairs_client_error() {
        setup_test_env();

        let dir = create_test_data(&TestDataConfig::cape_town()).unwrap();
        let directory = ServiceDirectory::builder()
            .data_dir(dir.path())
            .in_memory_index(true)
            .build()
            .unwrap();
        let err = directory
            .search_query_pairs([("location", "not-a-point")])
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
