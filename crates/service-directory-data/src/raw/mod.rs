//! CSV tables backing the directory.
//!
//! Each table lives in its own file inside the data directory and is read with an
//! explicit schema so that ids always come back as `u64` regardless of what the
//! file looks like.

use std::path::Path;

use polars::prelude::*;
use tracing::{debug, instrument};

use crate::{DataError, Result};

pub(crate) mod rows;

pub const COUNTRIES_CSV: &str = "countries.csv";
pub const CATEGORIES_CSV: &str = "categories.csv";
pub const KEYWORDS_CSV: &str = "keywords.csv";
pub const KEYWORD_CATEGORIES_CSV: &str = "keyword_categories.csv";
pub const ORGANISATIONS_CSV: &str = "organisations.csv";
pub const ORGANISATION_CATEGORIES_CSV: &str = "organisation_categories.csv";
pub const ORGANISATION_KEYWORDS_CSV: &str = "organisation_keywords.csv";

pub const ALL_TABLES: [&str; 7] = [
    COUNTRIES_CSV,
    CATEGORIES_CSV,
    KEYWORDS_CSV,
    KEYWORD_CATEGORIES_CSV,
    ORGANISATIONS_CSV,
    ORGANISATION_CATEGORIES_CSV,
    ORGANISATION_KEYWORDS_CSV,
];

const COUNTRIES_SCHEMA: [(PlSmallStr, DataType); 3] = [
    (PlSmallStr::from_static("id"), DataType::UInt64),
    (PlSmallStr::from_static("name"), DataType::String),
    (PlSmallStr::from_static("iso_code"), DataType::String),
];

const CATEGORIES_SCHEMA: [(PlSmallStr, DataType); 3] = [
    (PlSmallStr::from_static("id"), DataType::UInt64),
    (PlSmallStr::from_static("name"), DataType::String),
    (PlSmallStr::from_static("show_on_home_page"), DataType::Boolean),
];

const KEYWORDS_SCHEMA: [(PlSmallStr, DataType); 3] = CATEGORIES_SCHEMA;

const KEYWORD_CATEGORIES_SCHEMA: [(PlSmallStr, DataType); 2] = [
    (PlSmallStr::from_static("keyword_id"), DataType::UInt64),
    (PlSmallStr::from_static("category_id"), DataType::UInt64),
];

const ORGANISATIONS_SCHEMA: [(PlSmallStr, DataType); 16] = [
    (PlSmallStr::from_static("id"), DataType::UInt64),
    (PlSmallStr::from_static("name"), DataType::String),
    (PlSmallStr::from_static("about"), DataType::String),
    (PlSmallStr::from_static("address"), DataType::String),
    (PlSmallStr::from_static("telephone"), DataType::String),
    (PlSmallStr::from_static("emergency_telephone"), DataType::String),
    (PlSmallStr::from_static("email"), DataType::String),
    (PlSmallStr::from_static("web"), DataType::String),
    (PlSmallStr::from_static("verified_as"), DataType::String),
    (PlSmallStr::from_static("age_range_min"), DataType::UInt16),
    (PlSmallStr::from_static("age_range_max"), DataType::UInt16),
    (PlSmallStr::from_static("opening_hours"), DataType::String),
    (PlSmallStr::from_static("facility_code"), DataType::String),
    (PlSmallStr::from_static("latitude"), DataType::Float64),
    (PlSmallStr::from_static("longitude"), DataType::Float64),
    (PlSmallStr::from_static("country_id"), DataType::UInt64),
];

const ORGANISATION_CATEGORIES_SCHEMA: [(PlSmallStr, DataType); 2] = [
    (PlSmallStr::from_static("organisation_id"), DataType::UInt64),
    (PlSmallStr::from_static("category_id"), DataType::UInt64),
];

const ORGANISATION_KEYWORDS_SCHEMA: [(PlSmallStr, DataType); 2] = [
    (PlSmallStr::from_static("organisation_id"), DataType::UInt64),
    (PlSmallStr::from_static("keyword_id"), DataType::UInt64),
];

fn schema_for(table: &str) -> Option<Schema> {
    let schema = match table {
        COUNTRIES_CSV => Schema::from_iter(COUNTRIES_SCHEMA),
        CATEGORIES_CSV => Schema::from_iter(CATEGORIES_SCHEMA),
        KEYWORDS_CSV => Schema::from_iter(KEYWORDS_SCHEMA),
        KEYWORD_CATEGORIES_CSV => Schema::from_iter(KEYWORD_CATEGORIES_SCHEMA),
        ORGANISATIONS_CSV => Schema::from_iter(ORGANISATIONS_SCHEMA),
        ORGANISATION_CATEGORIES_CSV => Schema::from_iter(ORGANISATION_CATEGORIES_SCHEMA),
        ORGANISATION_KEYWORDS_CSV => Schema::from_iter(ORGANISATION_KEYWORDS_SCHEMA),
        _ => return None,
    };
    Some(schema)
}

/// Lazily scan one of the [`ALL_TABLES`] from `data_dir`.
pub fn scan_table(data_dir: &Path, table: &'static str) -> Result<LazyFrame> {
    let schema =
        schema_for(table).ok_or_else(|| DataError::RequiredFileNotFound(table.to_string()))?;
    let path = data_dir.join(table);
    if !path.exists() {
        return Err(DataError::RequiredFileNotFound(path.display().to_string()));
    }
    Ok(LazyCsvReader::new(path)
        .with_has_header(true)
        .with_schema(Some(schema.into()))
        .finish()?)
}

/// All seven tables, collected, in [`ALL_TABLES`] order.
#[instrument(name = "Read directory tables", skip_all, level = "info", fields(data_dir = %data_dir.display()))]
pub fn read_tables(data_dir: &Path) -> Result<DirectoryFrames> {
    let collect = |table| -> Result<DataFrame> {
        let df = scan_table(data_dir, table)?.collect()?;
        debug!(table, rows = df.height(), "Read table");
        Ok(df)
    };

    Ok(DirectoryFrames {
        countries: collect(COUNTRIES_CSV)?,
        categories: collect(CATEGORIES_CSV)?,
        keywords: collect(KEYWORDS_CSV)?,
        keyword_categories: collect(KEYWORD_CATEGORIES_CSV)?,
        organisations: collect(ORGANISATIONS_CSV)?,
        organisation_categories: collect(ORGANISATION_CATEGORIES_CSV)?,
        organisation_keywords: collect(ORGANISATION_KEYWORDS_CSV)?,
    })
}

/// The raw directory tables, one frame per CSV file.
#[derive(Debug, Clone)]
pub struct DirectoryFrames {
    pub countries: DataFrame,
    pub categories: DataFrame,
    pub keywords: DataFrame,
    pub keyword_categories: DataFrame,
    pub organisations: DataFrame,
    pub organisation_categories: DataFrame,
    pub organisation_keywords: DataFrame,
}
