use std::{fs::File, io::Write, path::Path};

use tempfile::TempDir;
use tracing::info;

use crate::{
    Result,
    model::{Category, Country, Keyword},
    raw::{
        CATEGORIES_CSV, COUNTRIES_CSV, KEYWORD_CATEGORIES_CSV, KEYWORDS_CSV,
        ORGANISATION_CATEGORIES_CSV, ORGANISATION_KEYWORDS_CSV, ORGANISATIONS_CSV,
    },
};

/// An organisation as written to the fixture tables.
#[derive(Debug, Clone)]
pub struct TestOrganisation {
    pub id: u64,
    pub name: String,
    pub address: String,
    /// `(latitude, longitude)`; `None` writes both columns empty.
    pub location: Option<(f64, f64)>,
    pub country_id: u64,
    pub categories: Vec<u64>,
    pub keywords: Vec<u64>,
}

/// Configuration for test data generation
#[derive(Debug, Clone, Default)]
pub struct TestDataConfig {
    pub countries: Vec<Country>,
    pub categories: Vec<Category>,
    pub keywords: Vec<Keyword>,
    pub organisations: Vec<TestOrganisation>,
}

fn keyword(id: u64, name: &str, show_on_home_page: bool, categories: &[u64]) -> Keyword {
    Keyword {
        id,
        name: name.to_string(),
        show_on_home_page,
        categories: categories.to_vec(),
    }
}

fn category(id: u64, name: &str, show_on_home_page: bool) -> Category {
    Category {
        id,
        name: name.to_string(),
        show_on_home_page,
    }
}

impl TestDataConfig {
    /// Three hospitals around Cape Town, all in one category, tagged with seven keywords.
    pub fn cape_town() -> Self {
        let organisation = |id, name: &str, address: &str, location, keywords: &[u64]| {
            TestOrganisation {
                id,
                name: name.to_string(),
                address: address.to_string(),
                location: Some(location),
                country_id: 1,
                categories: vec![1],
                keywords: keywords.to_vec(),
            }
        };

        Self {
            countries: vec![Country {
                id: 1,
                name: "South Africa".to_string(),
                iso_code: "ZA".to_string(),
            }],
            categories: vec![category(1, "Test Category", true)],
            keywords: vec![
                keyword(1, "test", false, &[1]),
                keyword(2, "heart", true, &[1]),
                keyword(3, "transplant", false, &[1]),
                keyword(4, "trauma", true, &[1]),
                keyword(5, "hiv", false, &[1]),
                keyword(6, "aids", false, &[1]),
                keyword(7, "accident", false, &[1]),
            ],
            organisations: vec![
                organisation(
                    1,
                    "Netcare Christiaan Barnard Memorial Hospital",
                    "181 Longmarket Street, Cape Town",
                    (-33.921859, 18.418231),
                    &[1, 2, 3, 4],
                ),
                organisation(
                    2,
                    "Kingsbury Hospital Claremont",
                    "Wilderness Road, Claremont",
                    (-33.986375, 18.469060),
                    &[1, 5, 6],
                ),
                organisation(
                    3,
                    "Constantiaberg Medi Clinic",
                    "Burnham Road, Plumstead",
                    (-34.026629, 18.461260),
                    &[1, 4, 7],
                ),
            ],
        }
    }

    /// Four categories and four keywords with mixed home-page flags, no organisations.
    pub fn home_page() -> Self {
        Self {
            countries: Vec::new(),
            categories: vec![
                category(1, "Test Category 1", true),
                category(2, "Test Category 2", true),
                category(3, "Test Category 3", true),
                category(4, "Test Category 4", false),
            ],
            keywords: vec![
                keyword(1, "test1", true, &[1]),
                keyword(2, "test2", false, &[2]),
                keyword(3, "test3", true, &[3, 4]),
                keyword(4, "test4", true, &[4]),
            ],
            organisations: Vec::new(),
        }
    }

    /// Adds "Praekelt Clinic" (id 4): same country, category and `test` keyword, no location.
    #[must_use]
    pub fn with_unlocated_clinic(mut self) -> Self {
        self.organisations.push(TestOrganisation {
            id: 4,
            name: "Praekelt Clinic".to_string(),
            address: String::new(),
            location: None,
            country_id: 1,
            categories: vec![1],
            keywords: vec![1],
        });
        self
    }

    /// Drops the given organisations (and their links) from the tables.
    #[must_use]
    pub fn without_organisations(mut self, ids: &[u64]) -> Self {
        self.organisations.retain(|org| !ids.contains(&org.id));
        self
    }
}

/// Create the seven directory tables in a fresh temporary directory.
pub fn create_test_data(config: &TestDataConfig) -> Result<TempDir> {
    let dir = TempDir::new()?;
    write_test_data(dir.path(), config)?;
    Ok(dir)
}

/// Write the seven directory tables into `dir`, replacing any existing files.
pub fn write_test_data(dir: &Path, config: &TestDataConfig) -> Result<()> {
    info!(
        dir = %dir.display(),
        organisations = config.organisations.len(),
        keywords = config.keywords.len(),
        "Writing test data"
    );
    std::fs::create_dir_all(dir)?;

    write_csv(
        dir,
        COUNTRIES_CSV,
        "id,name,iso_code",
        config
            .countries
            .iter()
            .map(|c| vec![c.id.to_string(), c.name.clone(), c.iso_code.clone()]),
    )?;
    write_csv(
        dir,
        CATEGORIES_CSV,
        "id,name,show_on_home_page",
        config.categories.iter().map(|c| {
            vec![
                c.id.to_string(),
                c.name.clone(),
                c.show_on_home_page.to_string(),
            ]
        }),
    )?;
    write_csv(
        dir,
        KEYWORDS_CSV,
        "id,name,show_on_home_page",
        config.keywords.iter().map(|k| {
            vec![
                k.id.to_string(),
                k.name.clone(),
                k.show_on_home_page.to_string(),
            ]
        }),
    )?;
    write_csv(
        dir,
        KEYWORD_CATEGORIES_CSV,
        "keyword_id,category_id",
        config.keywords.iter().flat_map(|k| {
            k.categories
                .iter()
                .map(move |category_id| vec![k.id.to_string(), category_id.to_string()])
        }),
    )?;
    write_csv(
        dir,
        ORGANISATIONS_CSV,
        "id,name,about,address,telephone,emergency_telephone,email,web,verified_as,\
         age_range_min,age_range_max,opening_hours,facility_code,latitude,longitude,country_id",
        config.organisations.iter().map(|org| {
            let (latitude, longitude) = org
                .location
                .map(|(lat, lng)| (lat.to_string(), lng.to_string()))
                .unwrap_or_default();
            let mut record = vec![org.id.to_string(), org.name.clone()];
            record.extend([String::new(), org.address.clone()]);
            record.extend(std::iter::repeat_n(String::new(), 9));
            record.extend([latitude, longitude, org.country_id.to_string()]);
            record
        }),
    )?;
    write_csv(
        dir,
        ORGANISATION_CATEGORIES_CSV,
        "organisation_id,category_id",
        config.organisations.iter().flat_map(|org| {
            org.categories
                .iter()
                .map(move |id| vec![org.id.to_string(), id.to_string()])
        }),
    )?;
    write_csv(
        dir,
        ORGANISATION_KEYWORDS_CSV,
        "organisation_id,keyword_id",
        config.organisations.iter().flat_map(|org| {
            org.keywords
                .iter()
                .map(move |id| vec![org.id.to_string(), id.to_string()])
        }),
    )?;
    Ok(())
}

fn write_csv(
    dir: &Path,
    table: &str,
    header: &str,
    records: impl Iterator<Item = Vec<String>>,
) -> Result<()> {
    let mut file = File::create(dir.join(table))?;
    writeln!(file, "{header}")?;
    for record in records {
        let line = record
            .iter()
            .map(|field| escape(field))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(())
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
