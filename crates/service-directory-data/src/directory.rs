//! The relational store, materialised in memory.
//!
//! [`DirectoryData`] is built once from the CSV tables and then only read. Ordered maps
//! keep iteration deterministic (ascending id), which the search index relies on when
//! it is rebuilt from scratch.

use std::{collections::BTreeMap, path::Path};

use ahash::AHashMap;
use tracing::{debug, info, instrument, warn};

use crate::{
    Result,
    model::{Category, Country, Keyword, Organisation},
    raw::{
        self, DirectoryFrames,
        rows::{self, OrganisationRow},
    },
};

#[derive(Debug, Clone, Default)]
pub struct DirectoryData {
    countries: BTreeMap<u64, Country>,
    categories: BTreeMap<u64, Category>,
    keywords: BTreeMap<u64, Keyword>,
    organisations: BTreeMap<u64, OrganisationRow>,
    organisation_categories: AHashMap<u64, Vec<u64>>,
    organisation_keywords: AHashMap<u64, Vec<u64>>,
}

impl DirectoryData {
    /// Load from the tables in the global data directory.
    pub fn new() -> Result<Self> {
        Self::load(crate::get_data_dir())
    }

    pub fn load(data_dir: &Path) -> Result<Self> {
        let frames = raw::read_tables(data_dir)?;
        Self::from_frames(&frames)
    }

    #[instrument(name = "Build directory", skip_all, level = "info")]
    pub fn from_frames(frames: &DirectoryFrames) -> Result<Self> {
        let countries: BTreeMap<u64, Country> = rows::countries(&frames.countries)?
            .into_iter()
            .map(|country| (country.id, country))
            .collect();
        let categories: BTreeMap<u64, Category> = rows::categories(&frames.categories)?
            .into_iter()
            .map(|category| (category.id, category))
            .collect();

        let mut keyword_categories: AHashMap<u64, Vec<u64>> = AHashMap::new();
        for (keyword_id, category_id) in
            rows::links(&frames.keyword_categories, "keyword_id", "category_id")?
        {
            if !categories.contains_key(&category_id) {
                warn!(keyword_id, category_id, "Keyword linked to unknown category, skipping");
                continue;
            }
            keyword_categories
                .entry(keyword_id)
                .or_default()
                .push(category_id);
        }

        let keywords: BTreeMap<u64, Keyword> = rows::keywords(&frames.keywords)?
            .into_iter()
            .map(|row| {
                let mut linked = keyword_categories.remove(&row.id).unwrap_or_default();
                linked.sort_unstable();
                linked.dedup();
                let keyword = Keyword {
                    id: row.id,
                    name: row.name,
                    show_on_home_page: row.show_on_home_page,
                    categories: linked,
                };
                (keyword.id, keyword)
            })
            .collect();

        let mut organisations = BTreeMap::new();
        for row in rows::organisations(&frames.organisations)? {
            if !countries.contains_key(&row.country_id) {
                warn!(
                    organisation_id = row.id,
                    country_id = row.country_id,
                    "Organisation references unknown country, skipping"
                );
                continue;
            }
            organisations.insert(row.id, row);
        }

        let organisation_categories = group_links(
            rows::links(&frames.organisation_categories, "organisation_id", "category_id")?,
            |org, category| organisations.contains_key(&org) && categories.contains_key(&category),
            "category",
        );
        let organisation_keywords = group_links(
            rows::links(&frames.organisation_keywords, "organisation_id", "keyword_id")?,
            |org, keyword| organisations.contains_key(&org) && keywords.contains_key(&keyword),
            "keyword",
        );

        info!(
            organisations = organisations.len(),
            countries = countries.len(),
            categories = categories.len(),
            keywords = keywords.len(),
            "Directory loaded"
        );

        Ok(Self {
            countries,
            categories,
            keywords,
            organisations,
            organisation_categories,
            organisation_keywords,
        })
    }

    pub fn len(&self) -> usize {
        self.organisations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.organisations.is_empty()
    }

    /// Organisation ids in ascending order.
    pub fn organisation_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.organisations.keys().copied()
    }

    /// Fully hydrated organisation, or `None` when the id is unknown.
    pub fn organisation(&self, id: u64) -> Option<Organisation> {
        let row = self.organisations.get(&id)?;
        let country = self.countries.get(&row.country_id)?.clone();

        let categories = self
            .organisation_categories
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|category_id| self.categories.get(category_id).cloned())
            .collect();
        let keywords = self
            .organisation_keywords
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|keyword_id| self.keywords.get(keyword_id).cloned())
            .collect();

        Some(Organisation {
            id: row.id,
            name: row.name.clone(),
            about: row.about.clone(),
            address: row.address.clone(),
            telephone: row.telephone.clone(),
            emergency_telephone: row.emergency_telephone.clone(),
            email: row.email.clone(),
            web: row.web.clone(),
            verified_as: row.verified_as.clone(),
            age_range_min: row.age_range_min,
            age_range_max: row.age_range_max,
            opening_hours: row.opening_hours.clone(),
            facility_code: row.facility_code.clone(),
            location: row.location,
            country,
            categories,
            keywords,
        })
    }

    pub fn organisations(&self) -> impl Iterator<Item = Organisation> + '_ {
        self.organisation_ids()
            .filter_map(|id| self.organisation(id))
    }

    pub fn countries(&self) -> impl Iterator<Item = &Country> {
        self.countries.values()
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.values()
    }
}

/// Group `(owner, target)` pairs by owner, dropping dangling pairs and duplicates.
fn group_links(
    pairs: Vec<(u64, u64)>,
    known: impl Fn(u64, u64) -> bool,
    kind: &'static str,
) -> AHashMap<u64, Vec<u64>> {
    let mut grouped: AHashMap<u64, Vec<u64>> = AHashMap::new();
    let mut skipped = 0usize;
    for (owner, target) in pairs {
        if !known(owner, target) {
            skipped += 1;
            continue;
        }
        grouped.entry(owner).or_default().push(target);
    }
    for targets in grouped.values_mut() {
        targets.sort_unstable();
        targets.dedup();
    }
    if skipped > 0 {
        warn!(kind, skipped, "Dropped links to unknown records");
    } else {
        debug!(kind, owners = grouped.len(), "Grouped links");
    }
    grouped
}
