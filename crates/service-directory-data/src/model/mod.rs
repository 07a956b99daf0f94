//! Domain records owned by the relational store.
//!
//! The search layer only ever reads these. An [`Organisation`] is the fully
//! hydrated form: its country, categories and keywords are resolved rather than
//! left as foreign keys.

mod geo;

pub use geo::{EARTH_RADIUS_KM, GeoPoint, GeoPointError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub id: u64,
    pub name: String,
    pub iso_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub show_on_home_page: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: u64,
    pub name: String,
    pub show_on_home_page: bool,
    /// Ids of the categories this keyword belongs to, ascending.
    pub categories: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organisation {
    pub id: u64,
    pub name: String,
    pub about: String,
    pub address: String,
    pub telephone: String,
    pub emergency_telephone: String,
    pub email: String,
    pub web: String,
    pub verified_as: String,
    pub age_range_min: Option<u16>,
    pub age_range_max: Option<u16>,
    pub opening_hours: String,
    pub facility_code: String,
    /// Organisations without a point are still searchable, they just never
    /// satisfy distance filters.
    pub location: Option<GeoPoint>,
    pub country: Country,
    pub categories: Vec<Category>,
    pub keywords: Vec<Keyword>,
}

impl Organisation {
    pub fn keyword_names(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|keyword| keyword.name.as_str())
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|category| category.name.as_str())
    }
}
