//! The main [`ServiceDirectory`] interface.
//!
//! A directory pairs the relational store snapshot ([`DirectoryData`]) with the
//! organisation search index built from it, and exposes the read operations of the
//! public API: search, lookup, organisation detail, keyword listing and the home
//! page grouping.
//!
//! ```no_run
//! use service_directory::{SearchRequest, ServiceDirectory};
//!
//! let directory = ServiceDirectory::open("./sd_data")?;
//! let results = directory.search(&SearchRequest::default().with_search_term("trauma"))?;
//! for result in &results {
//!     println!("{} {:?}", result.organisation.name, result.distance);
//! }
//! # Ok::<(), service_directory::error::DirectoryError>(())
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;
use service_directory_data::{DirectoryData, Keyword, Organisation};
use tracing::{info, instrument};

use crate::{
    config::SearchConfig,
    error::DirectoryError,
    index::{OrganisationIndex, index_path_in},
    search::{LookupRequest, SearchRequest, SearchResult, search_inner},
};

pub type SearchResults = Vec<SearchResult>;

/// A home page category with its home page keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomePageCategory {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Store snapshot, search index and the default search configuration.
#[derive(Debug, Clone)]
pub struct ServiceDirectory {
    data: DirectoryData,
    index: OrganisationIndex,
    config: SearchConfig,
}

impl ServiceDirectory {
    /// Load the tables in `data_dir` and open (or build) the index stored beside them.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        ServiceDirectoryBuilder::new().data_dir(data_dir).build()
    }

    /// Pair an already loaded store with an already built index. The two are not
    /// required to agree; searches tolerate an index that is ahead of the store.
    pub fn from_components(data: DirectoryData, index: OrganisationIndex) -> Self {
        Self {
            data,
            index,
            config: SearchConfig::default(),
        }
    }

    pub fn builder() -> ServiceDirectoryBuilder {
        ServiceDirectoryBuilder::new()
    }

    #[must_use]
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults, DirectoryError> {
        self.search_with_config(request, &self.config)
    }

    pub fn search_with_config(
        &self,
        request: &SearchRequest,
        config: &SearchConfig,
    ) -> Result<SearchResults, DirectoryError> {
        Ok(search_inner(request, &self.index, &self.data, config)?)
    }

    /// Parse decoded query parameters and search. Malformed parameters surface as
    /// a client error (`status_code() == 400`).
    pub fn search_query_pairs<I, K, V>(&self, pairs: I) -> Result<SearchResults, DirectoryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let request = SearchRequest::from_query_pairs(pairs)?;
        self.search(&request)
    }

    /// Keyword and/or "near" lookup: a text search ordered by distance when a point is given.
    pub fn lookup(&self, request: &LookupRequest) -> Result<SearchResults, DirectoryError> {
        self.search(&SearchRequest::from(request.clone()))
    }

    /// Organisation detail.
    pub fn organisation(&self, id: u64) -> Option<Organisation> {
        self.data.organisation(id)
    }

    /// Keywords, optionally restricted to those in any of the named categories.
    pub fn keywords<S: AsRef<str>>(&self, category_names: &[S]) -> Vec<Keyword> {
        if category_names.is_empty() {
            return self.data.keywords().cloned().collect();
        }
        let category_ids: Vec<u64> = self
            .data
            .categories()
            .filter(|category| {
                category_names
                    .iter()
                    .any(|name| name.as_ref() == category.name)
            })
            .map(|category| category.id)
            .collect();

        self.data
            .keywords()
            .filter(|keyword| keyword.categories.iter().any(|id| category_ids.contains(id)))
            .cloned()
            .collect()
    }

    /// Categories flagged for the home page with their home page keywords.
    /// Categories left without keywords are omitted.
    pub fn home_page_categories(&self) -> Vec<HomePageCategory> {
        let mut keywords_by_category: BTreeMap<u64, Vec<String>> = BTreeMap::new();
        for keyword in self.data.keywords().filter(|k| k.show_on_home_page) {
            for category_id in &keyword.categories {
                keywords_by_category
                    .entry(*category_id)
                    .or_default()
                    .push(keyword.name.clone());
            }
        }

        self.data
            .categories()
            .filter(|category| category.show_on_home_page)
            .filter_map(|category| {
                let keywords = keywords_by_category.remove(&category.id)?;
                Some(HomePageCategory {
                    name: category.name.clone(),
                    keywords,
                })
            })
            .collect()
    }

    /// Rebuild the search index from the current store contents.
    pub fn rebuild_index(&mut self) -> Result<(), DirectoryError> {
        info!("Rebuilding organisation index");
        self.index.rebuild(&self.data)?;
        Ok(())
    }

    pub fn is_index_up_to_date(&self) -> Result<bool, DirectoryError> {
        self.index.is_up_to_date(&self.data).map_err(From::from)
    }

    pub fn data(&self) -> &DirectoryData {
        &self.data
    }

    pub fn index(&self) -> &OrganisationIndex {
        &self.index
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

/// Builder for creating a [`ServiceDirectory`] with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectoryBuilder {
    data_dir: Option<PathBuf>,
    force_rebuild: bool,
    in_memory_index: bool,
    search_config: SearchConfig,
}

impl ServiceDirectoryBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding the CSV tables; defaults to the global data directory.
    #[must_use]
    pub fn data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.data_dir = Some(data_dir.as_ref().to_path_buf());
        self
    }

    /// Force rebuilding of the on-disk index.
    #[must_use]
    pub fn force_rebuild(mut self, rebuild: bool) -> Self {
        self.force_rebuild = rebuild;
        self
    }

    /// Keep the index in RAM instead of beside the data.
    #[must_use]
    pub fn in_memory_index(mut self, in_memory: bool) -> Self {
        self.in_memory_index = in_memory;
        self
    }

    #[must_use]
    pub fn search_config(mut self, config: SearchConfig) -> Self {
        self.search_config = config;
        self
    }

    /// Build the `ServiceDirectory`.
    #[instrument(name = "Initialize ServiceDirectory", skip_all, level = "info")]
    pub fn build(self) -> Result<ServiceDirectory, DirectoryError> {
        let t_init = std::time::Instant::now();
        let data_dir = self
            .data_dir
            .unwrap_or_else(|| service_directory_data::get_data_dir().to_path_buf());

        let data = DirectoryData::load(&data_dir)?;
        let index = if self.in_memory_index {
            OrganisationIndex::in_memory(&data, &self.search_config)?
        } else {
            OrganisationIndex::open_or_build(
                &index_path_in(&data_dir),
                &data,
                self.force_rebuild,
                &self.search_config,
            )?
        };

        info!(
            elapsed_seconds = ?t_init.elapsed(),
            data_dir = %data_dir.display(),
            "ServiceDirectory initialization complete"
        );
        Ok(ServiceDirectory {
            data,
            index,
            config: self.search_config,
        })
    }
}
