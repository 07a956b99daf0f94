//! Search parameters as they arrive at the HTTP boundary.
//!
//! Parsing works on already-decoded `(name, value)` query pairs. Repeated
//! parameters are allowed; for single-valued ones the last occurrence wins.

use service_directory_data::GeoPoint;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{Result, SearchError};

/// Keyword value meaning "every browse-visible keyword".
pub const ALL_KEYWORDS: &str = "all_keywords";
/// Category value meaning "every category".
pub const ALL_CATEGORIES: &str = "all";

/// A keyword filter value: numeric values are ids, anything else is a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeywordRef {
    Id(u64),
    Name(String),
}

impl KeywordRef {
    fn parse(raw: &str) -> Self {
        raw.parse()
            .map_or_else(|_| Self::Name(raw.to_string()), Self::Id)
    }
}

/// Validated search parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Raw free text; blank values and `"None"` are treated as absent when composing.
    pub search_term: Option<String>,
    pub location: Option<GeoPoint>,
    pub radius_km: Option<f64>,
    /// ISO code or country name.
    pub country: Option<String>,
    pub categories: Vec<u64>,
    pub all_categories: bool,
    pub keywords: Vec<KeywordRef>,
    pub all_keywords: bool,
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|part| !part.is_empty())
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(SearchError::invalid(field, format!("'{value}' is not a valid boolean"))),
    }
}

fn parse_location(field: &'static str, value: &str) -> Result<GeoPoint> {
    value
        .parse()
        .map_err(|e| SearchError::invalid(field, format!("{e}")))
}

fn parse_radius(value: &str) -> Result<f64> {
    let radius: f64 = value
        .trim()
        .parse()
        .map_err(|_| SearchError::invalid("radius", format!("'{value}' is not a number")))?;
    if !radius.is_finite() || radius < 0.0 {
        return Err(SearchError::invalid(
            "radius",
            "radius must be a non-negative number of kilometres",
        ));
    }
    Ok(radius)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl SearchRequest {
    /// Parse decoded query parameters. Unknown parameters are ignored.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::default();
        for (name, value) in pairs {
            let value = value.as_ref();
            match name.as_ref() {
                "search_term" => request.search_term = Some(value.to_string()),
                "location" => {
                    request.location = match non_blank(value) {
                        Some(raw) => Some(parse_location("location", &raw)?),
                        None => None,
                    };
                }
                "radius" => {
                    request.radius_km = match non_blank(value) {
                        Some(raw) => Some(parse_radius(&raw)?),
                        None => None,
                    };
                }
                "country" => request.country = non_blank(value),
                "categories" => {
                    for part in split_list(value) {
                        if part == ALL_CATEGORIES {
                            request.all_categories = true;
                            continue;
                        }
                        let id = part.parse().map_err(|_| {
                            SearchError::invalid(
                                "categories",
                                format!("'{part}' is not a category id"),
                            )
                        })?;
                        request.categories.push(id);
                    }
                }
                "all_categories" => {
                    request.all_categories |= parse_flag("all_categories", value)?;
                }
                "keywords" => {
                    for part in split_list(value) {
                        if part == ALL_KEYWORDS {
                            request.all_keywords = true;
                        } else {
                            request.keywords.push(KeywordRef::parse(part));
                        }
                    }
                }
                "exact_location" => trace!("Ignoring exact_location parameter"),
                other => trace!(parameter = other, "Ignoring unknown query parameter"),
            }
        }
        Ok(request)
    }

    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_categories(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.categories.extend(ids);
        self
    }

    pub fn with_all_categories(mut self) -> Self {
        self.all_categories = true;
        self
    }

    pub fn with_keyword(mut self, keyword: KeywordRef) -> Self {
        self.keywords.push(keyword);
        self
    }

    pub fn with_all_keywords(mut self) -> Self {
        self.all_keywords = true;
        self
    }

    /// Split the keyword filter into ids and names still to be resolved.
    pub fn keyword_ids_and_names(&self) -> (Vec<u64>, Vec<String>) {
        let mut ids = Vec::new();
        let mut names = Vec::new();
        for keyword in &self.keywords {
            match keyword {
                KeywordRef::Id(id) => ids.push(*id),
                KeywordRef::Name(name) => names.push(name.clone()),
            }
        }
        (ids, names)
    }
}

/// The simpler keyword + "near" lookup endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub keyword: Option<String>,
    pub near: Option<GeoPoint>,
}

impl LookupRequest {
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::default();
        for (name, value) in pairs {
            let value = value.as_ref();
            match name.as_ref() {
                "keyword" => request.keyword = non_blank(value),
                "near" => {
                    request.near = match non_blank(value) {
                        Some(raw) => Some(parse_location("near", &raw)?),
                        None => None,
                    };
                }
                other => trace!(parameter = other, "Ignoring unknown query parameter"),
            }
        }
        Ok(request)
    }
}

impl From<LookupRequest> for SearchRequest {
    fn from(lookup: LookupRequest) -> Self {
        Self {
            search_term: lookup.keyword,
            location: lookup.near,
            ..Self::default()
        }
    }
}
