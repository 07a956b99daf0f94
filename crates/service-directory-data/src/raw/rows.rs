use itertools::izip;
use polars::prelude::*;

use crate::{
    DataError, Result,
    model::{Category, Country, GeoPoint},
};

/// An organisation as stored: relations are still foreign keys.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrganisationRow {
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
    pub location: Option<GeoPoint>,
    pub country_id: u64,
}

/// A keyword before its category links are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeywordRow {
    pub id: u64,
    pub name: String,
    pub show_on_home_page: bool,
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().trim().to_string()
}

pub(crate) fn countries(df: &DataFrame) -> Result<Vec<Country>> {
    Ok(izip!(
        df.column("id")?.u64()?,
        df.column("name")?.str()?,
        df.column("iso_code")?.str()?
    )
    .filter_map(|(id, name, iso_code)| {
        Some(Country {
            id: id?,
            name: text(name),
            iso_code: text(iso_code),
        })
    })
    .collect())
}

pub(crate) fn categories(df: &DataFrame) -> Result<Vec<Category>> {
    Ok(izip!(
        df.column("id")?.u64()?,
        df.column("name")?.str()?,
        df.column("show_on_home_page")?.bool()?
    )
    .filter_map(|(id, name, show_on_home_page)| {
        Some(Category {
            id: id?,
            name: text(name),
            show_on_home_page: show_on_home_page.unwrap_or(false),
        })
    })
    .collect())
}

pub(crate) fn keywords(df: &DataFrame) -> Result<Vec<KeywordRow>> {
    Ok(izip!(
        df.column("id")?.u64()?,
        df.column("name")?.str()?,
        df.column("show_on_home_page")?.bool()?
    )
    .filter_map(|(id, name, show_on_home_page)| {
        Some(KeywordRow {
            id: id?,
            name: text(name),
            show_on_home_page: show_on_home_page.unwrap_or(false),
        })
    })
    .collect())
}

/// Two-column link table as `(left, right)` pairs, rows with a null side dropped.
pub(crate) fn links(df: &DataFrame, left: &str, right: &str) -> Result<Vec<(u64, u64)>> {
    Ok(izip!(df.column(left)?.u64()?, df.column(right)?.u64()?)
        .filter_map(|(l, r)| Some((l?, r?)))
        .collect())
}

fn str_column<'a>(df: &'a DataFrame, name: &str) -> Result<Vec<Option<&'a str>>> {
    Ok(df.column(name)?.str()?.into_iter().collect())
}

fn location(id: u64, latitude: Option<f64>, longitude: Option<f64>) -> Result<Option<GeoPoint>> {
    match (latitude, longitude) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => Ok(Some(GeoPoint::try_new(lat, lng)?)),
        _ => Err(DataError::InvalidRecord {
            table: super::ORGANISATIONS_CSV,
            id,
            reason: "latitude and longitude must both be set or both be empty".to_string(),
        }),
    }
}

pub(crate) fn organisations(df: &DataFrame) -> Result<Vec<OrganisationRow>> {
    // izip! gets unwieldy past a handful of columns, so collect each one up front.
    let ids: Vec<Option<u64>> = df.column("id")?.u64()?.into_iter().collect();
    let strings = |name| str_column(df, name);
    let names = strings("name")?;
    let about = strings("about")?;
    let address = strings("address")?;
    let telephone = strings("telephone")?;
    let emergency_telephone = strings("emergency_telephone")?;
    let email = strings("email")?;
    let web = strings("web")?;
    let verified_as = strings("verified_as")?;
    let opening_hours = strings("opening_hours")?;
    let facility_code = strings("facility_code")?;
    let age_range_min: Vec<Option<u16>> =
        df.column("age_range_min")?.u16()?.into_iter().collect();
    let age_range_max: Vec<Option<u16>> =
        df.column("age_range_max")?.u16()?.into_iter().collect();
    let latitudes: Vec<Option<f64>> = df.column("latitude")?.f64()?.into_iter().collect();
    let longitudes: Vec<Option<f64>> = df.column("longitude")?.f64()?.into_iter().collect();
    let country_ids: Vec<Option<u64>> = df.column("country_id")?.u64()?.into_iter().collect();

    let mut rows = Vec::with_capacity(ids.len());
    for (idx, id) in ids.into_iter().enumerate() {
        let Some(id) = id else { continue };
        let country_id = country_ids[idx].ok_or_else(|| DataError::InvalidRecord {
            table: super::ORGANISATIONS_CSV,
            id,
            reason: "missing country_id".to_string(),
        })?;
        let name = text(names[idx]);
        if name.is_empty() {
            return Err(DataError::InvalidRecord {
                table: super::ORGANISATIONS_CSV,
                id,
                reason: "missing name".to_string(),
            });
        }
        rows.push(OrganisationRow {
            id,
            name,
            about: text(about[idx]),
            address: text(address[idx]),
            telephone: text(telephone[idx]),
            emergency_telephone: text(emergency_telephone[idx]),
            email: text(email[idx]),
            web: text(web[idx]),
            verified_as: text(verified_as[idx]),
            age_range_min: age_range_min[idx],
            age_range_max: age_range_max[idx],
            opening_hours: text(opening_hours[idx]),
            facility_code: text(facility_code[idx]),
            location: location(id, latitudes[idx], longitudes[idx])?,
            country_id,
        });
    }
    Ok(rows)
}
