//! Relational store collaborator.
//!
//! The search facade only needs a handful of reads from the store: batch loading
//! hydrated organisations and resolving the sets used by the query sentinels.

use ahash::AHashSet;
use service_directory_data::{DirectoryData, Organisation};
use tracing::{debug, instrument};

pub use error::StoreError;
pub(crate) use error::Result;

pub trait OrganisationStore {
    /// Load records for `ids`, aligned with the input. Unknown ids come back as `None`.
    fn load_organisations(&self, ids: &[u64]) -> Result<Vec<Option<Organisation>>>;

    /// Every known category id.
    fn category_ids(&self) -> Result<Vec<u64>>;

    /// Ids of the keywords flagged for browse (home page) visibility.
    fn browse_keyword_ids(&self) -> Result<Vec<u64>>;

    /// Ids of the keywords whose name is one of `names`, ignoring case. Unknown names
    /// resolve to nothing.
    fn keyword_ids_named(&self, names: &[String]) -> Result<Vec<u64>>;
}

impl OrganisationStore for DirectoryData {
    #[instrument(name = "Load organisations", skip_all, level = "debug", fields(num_ids = ids.len()))]
    fn load_organisations(&self, ids: &[u64]) -> Result<Vec<Option<Organisation>>> {
        Ok(ids.iter().map(|&id| self.organisation(id)).collect())
    }

    fn category_ids(&self) -> Result<Vec<u64>> {
        Ok(self.categories().map(|category| category.id).collect())
    }

    fn browse_keyword_ids(&self) -> Result<Vec<u64>> {
        Ok(self
            .keywords()
            .filter(|keyword| keyword.show_on_home_page)
            .map(|keyword| keyword.id)
            .collect())
    }

    fn keyword_ids_named(&self, names: &[String]) -> Result<Vec<u64>> {
        let wanted: AHashSet<String> = names
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect();
        let ids: Vec<u64> = self
            .keywords()
            .filter(|keyword| wanted.contains(&keyword.name.to_lowercase()))
            .map(|keyword| keyword.id)
            .collect();
        debug!(names = ?names, resolved = ids.len(), "Resolved keyword names");
        Ok(ids)
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum StoreError {
        #[error("Data error: {0}")]
        Data(#[from] service_directory_data::DataError),
        #[error("Store unavailable: {0}")]
        Unavailable(String),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, StoreError>;
}
