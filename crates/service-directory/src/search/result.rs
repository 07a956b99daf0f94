use std::fmt;

use service_directory_data::Organisation;
use serde::{Serialize, Serializer};

/// A finite distance in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Distance(f64);

impl Distance {
    /// `None` for the index's "unknown distance" sentinels (infinite or NaN).
    pub fn from_km(km: f64) -> Option<Self> {
        km.is_finite().then_some(Self(km))
    }

    pub fn km(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}km", self.0)
    }
}

/// Serialized in its display form, e.g. `"0.54km"`.
impl Serialize for Distance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One hydrated search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub organisation: Organisation,
    pub distance: Option<Distance>,
}

impl SearchResult {
    pub fn summary(&self) -> OrganisationSummary {
        OrganisationSummary::from(self)
    }
}

/// The list view of a result as rendered by the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganisationSummary {
    pub id: u64,
    pub name: String,
    pub address: String,
    pub keywords: Vec<String>,
    pub distance: Option<String>,
}

impl From<&SearchResult> for OrganisationSummary {
    fn from(result: &SearchResult) -> Self {
        let organisation = &result.organisation;
        Self {
            id: organisation.id,
            name: organisation.name.clone(),
            address: organisation.address.clone(),
            keywords: organisation.keyword_names().map(str::to_string).collect(),
            distance: result.distance.map(|distance| distance.to_string()),
        }
    }
}

/// Render results as the JSON array returned by the search endpoint.
pub fn summaries_to_json(results: &[SearchResult]) -> serde_json::Result<String> {
    let summaries: Vec<OrganisationSummary> =
        results.iter().map(SearchResult::summary).collect();
    serde_json::to_string(&summaries)
}
