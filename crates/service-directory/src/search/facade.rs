use tracing::{debug, info, instrument, warn};

use super::{
    Result,
    query::compose_query,
    request::SearchRequest,
    result::{Distance, SearchResult},
};
use crate::{
    config::SearchConfig,
    index::{IndexHit, SearchIndex},
    store::OrganisationStore,
};

/// Run a search end to end: compose, execute, hydrate.
///
/// Hits the store no longer knows about are dropped rather than failing the request,
/// so a stale index degrades to fewer results. Index and store failures are fatal.
#[instrument(name = "Search", skip_all, level = "info", fields(search_term = request.search_term.as_deref()))]
pub fn search_inner(
    request: &SearchRequest,
    index: &dyn SearchIndex,
    store: &dyn OrganisationStore,
    config: &SearchConfig,
) -> Result<Vec<SearchResult>> {
    let query = compose_query(request, store, config)?;
    let hits = index.execute(&query)?;

    if hits.is_empty() {
        info!("Search index returned no results");
        return Ok(Vec::new());
    }

    let results = hydrate(&hits, store)?;
    if results.is_empty() {
        warn!(
            num_hits = hits.len(),
            "No search results could be loaded from the store, the search index is stale"
        );
    }
    debug!(num_hits = hits.len(), num_results = results.len(), "Search complete");
    Ok(results)
}

#[instrument(name = "Hydrate hits", skip_all, level = "debug", fields(num_hits = hits.len()))]
fn hydrate(hits: &[IndexHit], store: &dyn OrganisationStore) -> Result<Vec<SearchResult>> {
    let ids: Vec<u64> = hits.iter().map(|hit| hit.id).collect();
    let organisations = store.load_organisations(&ids)?;

    Ok(hits
        .iter()
        .zip(organisations)
        .filter_map(|(hit, organisation)| match organisation {
            Some(organisation) => Some(SearchResult {
                organisation,
                distance: hit.distance_km.and_then(Distance::from_km),
            }),
            None => {
                warn!(
                    organisation_id = hit.id,
                    "Search index refers to an organisation missing from the store, skipping"
                );
                None
            }
        })
        .collect())
}
