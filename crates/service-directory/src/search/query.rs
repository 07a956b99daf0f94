use std::collections::BTreeSet;

use service_directory_data::GeoPoint;
use tracing::{debug, instrument};

use super::{Result, request::SearchRequest};
use crate::{
    config::{Fuzziness, SearchConfig},
    store::OrganisationStore,
};

/// Literal search term some clients send when they mean "no term".
pub const NONE_SENTINEL: &str = "None";

/// Fuzzy full-text match against the indexed document text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub text: String,
    pub fuzziness: Fuzziness,
    pub transpositions: bool,
    pub exact_boost: f32,
}

/// Index-agnostic description of a search, produced by [`compose_query`].
///
/// Filters are AND-combined; a set-valued filter matches when any member matches.
/// An empty set is kept as-is and matches nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    text: Option<TextMatch>,
    country: Option<String>,
    keyword_ids: Option<BTreeSet<u64>>,
    category_ids: Option<BTreeSet<u64>>,
    distance_from: Option<GeoPoint>,
    within_km: Option<f64>,
    order_by_distance: bool,
    limit: usize,
}

impl SearchQuery {
    pub fn builder() -> SearchQueryBuilder {
        SearchQueryBuilder::default()
    }

    pub fn text(&self) -> Option<&TextMatch> {
        self.text.as_ref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn keyword_ids(&self) -> Option<&BTreeSet<u64>> {
        self.keyword_ids.as_ref()
    }

    pub fn category_ids(&self) -> Option<&BTreeSet<u64>> {
        self.category_ids.as_ref()
    }

    pub fn distance_from(&self) -> Option<GeoPoint> {
        self.distance_from
    }

    /// Radius in kilometres; only ever set together with [`Self::distance_from`].
    pub fn within_km(&self) -> Option<f64> {
        self.within_km
    }

    pub fn order_by_distance(&self) -> bool {
        self.order_by_distance
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// True when nothing restricts or orders the result set.
    pub fn is_match_all(&self) -> bool {
        self.text.is_none()
            && self.country.is_none()
            && self.keyword_ids.is_none()
            && self.category_ids.is_none()
            && self.distance_from.is_none()
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        SearchQueryBuilder::default().build()
    }
}

#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    query: SearchQuery,
}

impl Default for SearchQueryBuilder {
    fn default() -> Self {
        Self {
            query: SearchQuery {
                text: None,
                country: None,
                keyword_ids: None,
                category_ids: None,
                distance_from: None,
                within_km: None,
                order_by_distance: false,
                limit: SearchConfig::default().limit,
            },
        }
    }
}

impl SearchQueryBuilder {
    pub fn match_text(mut self, text: impl Into<String>, config: &SearchConfig) -> Self {
        self.query.text = Some(TextMatch {
            text: text.into(),
            fuzziness: config.fuzziness,
            transpositions: config.fuzzy_transpositions,
            exact_boost: config.exact_term_boost,
        });
        self
    }

    pub fn filter_country(mut self, country: impl Into<String>) -> Self {
        self.query.country = Some(country.into());
        self
    }

    pub fn filter_keywords(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.query.keyword_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn filter_categories(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.query.category_ids = Some(ids.into_iter().collect());
        self
    }

    /// Compute distances from `origin` and order results nearest first.
    pub fn order_by_distance_from(mut self, origin: GeoPoint) -> Self {
        self.query.distance_from = Some(origin);
        self.query.order_by_distance = true;
        self
    }

    /// Keep only results within `radius_km` of the origin. Ignored without an origin.
    pub fn within_radius(mut self, radius_km: f64) -> Self {
        self.query.within_km = Some(radius_km);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = limit.max(1);
        self
    }

    pub fn build(mut self) -> SearchQuery {
        if self.query.distance_from.is_none() {
            self.query.within_km = None;
        }
        self.query
    }
}

/// Translate a validated request into a [`SearchQuery`], resolving the keyword and
/// category sentinels through the store.
#[instrument(name = "Compose query", skip_all, level = "debug")]
pub fn compose_query(
    request: &SearchRequest,
    store: &dyn OrganisationStore,
    config: &SearchConfig,
) -> Result<SearchQuery> {
    let mut builder = SearchQuery::builder();

    if let Some(term) = request.search_term.as_deref().map(str::trim) {
        if term == NONE_SENTINEL {
            debug!("Search term is the literal 'None', treating as absent");
        } else if !term.is_empty() {
            builder = builder.match_text(term, config);
        }
    }

    if let Some(country) = request
        .country
        .as_deref()
        .map(str::trim)
        .filter(|country| !country.is_empty())
    {
        builder = builder.filter_country(country);
    }

    if request.all_keywords {
        builder = builder.filter_keywords(store.browse_keyword_ids()?);
    } else if !request.keywords.is_empty() {
        let (ids, names) = request.keyword_ids_and_names();
        let resolved = if names.is_empty() {
            Vec::new()
        } else {
            store.keyword_ids_named(&names)?
        };
        builder = builder.filter_keywords(ids.into_iter().chain(resolved));
    }

    if request.all_categories {
        builder = builder.filter_categories(store.category_ids()?);
    } else if !request.categories.is_empty() {
        builder = builder.filter_categories(request.categories.iter().copied());
    }

    if let Some(location) = request.location {
        builder = builder.order_by_distance_from(location);
        if let Some(radius) = request.radius_km {
            builder = builder.within_radius(radius);
        }
    } else if request.radius_km.is_some() {
        debug!(radius_km = request.radius_km, "Radius given without location, ignoring");
    }

    let query = builder.limit(config.limit).build();
    debug!(?query, "Composed search query");
    Ok(query)
}
