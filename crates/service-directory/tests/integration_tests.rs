//! Integration tests for the service directory search API
//!
//! These run against the public API with the Cape Town fixture: three hospitals,
//! seven keywords and one category, all in South Africa.

use service_directory::{
    DirectoryData, GeoPoint, IndexError, IndexHit, LookupRequest, OrganisationIndex,
    SearchConfig, SearchConfigBuilder, SearchError, SearchIndex, SearchQuery, SearchRequest,
    ServiceDirectory, StoreError, search_inner, summaries_to_json,
    data::{TestDataConfig, create_test_data},
    error::DirectoryError,
};

const CBMH: &str = "Netcare Christiaan Barnard Memorial Hospital";
const KHC: &str = "Kingsbury Hospital Claremont";
const CMC: &str = "Constantiaberg Medi Clinic";

/// Adderley Street outside Cape Town station.
const ADDERLEY_STREET: &str = "-33.921387,18.424101";
/// Off the West Coast, 144.53km from the nearest hospital.
const FAR_POINT: &str = "-32.921387,17.424101";

fn setup_test_env() {
    let _ = service_directory::init_logging(tracing::Level::WARN);
}

fn load(config: &TestDataConfig) -> DirectoryData {
    let dir = create_test_data(config).expect("Should write test data");
    DirectoryData::load(dir.path()).expect("Should load test data")
}

fn directory(config: &TestDataConfig) -> ServiceDirectory {
    setup_test_env();
    let data = load(config);
    let index = OrganisationIndex::in_memory(&data, &SearchConfig::default())
        .expect("Should build index");
    ServiceDirectory::from_components(data, index)
}

fn cape_town() -> ServiceDirectory {
    directory(&TestDataConfig::cape_town())
}

fn search(directory: &ServiceDirectory, pairs: &[(&str, &str)]) -> Vec<String> {
    directory
        .search_query_pairs(pairs.iter().copied())
        .expect("Search should work")
        .into_iter()
        .map(|result| result.organisation.name)
        .collect()
}

#[test]
fn test_without_parameters_returns_everything() {
    assert_eq!(search(&cape_town(), &[]).len(), 3);
}

#[test]
fn test_search_term() {
    let directory = cape_town();
    for (term, expected) in [
        ("test", 3),
        ("heart", 1),
        ("transplant", 1),
        ("trauma", 2),
        ("hiv", 1),
        ("aids", 1),
        ("accident", 1),
    ] {
        assert_eq!(
            search(&directory, &[("search_term", term)]).len(),
            expected,
            "search_term={term}"
        );
    }
}

#[test]
fn test_none_search_term_is_ignored() {
    assert_eq!(search(&cape_town(), &[("search_term", "None")]).len(), 3);
}

#[test]
fn test_fuzzy_matching() {
    let directory = cape_town();

    // keyword and category name
    assert_eq!(search(&directory, &[("search_term", "testt")]).len(), 3);
    // keyword name
    assert_eq!(search(&directory, &[("search_term", "aid")]), vec![KHC]);
    // category name
    assert_eq!(search(&directory, &[("search_term", "category")]).len(), 3);
    // organisation name
    assert_eq!(search(&directory, &[("search_term", "med")]), vec![CMC]);
    assert_eq!(search(&directory, &[("search_term", "hospice")]).len(), 2);
}

#[test]
fn test_location_orders_nearest_first() {
    let results = cape_town()
        .search_query_pairs([("location", ADDERLEY_STREET)])
        .unwrap();

    let names: Vec<&str> = results
        .iter()
        .map(|r| r.organisation.name.as_str())
        .collect();
    assert_eq!(names, vec![CBMH, KHC, CMC]);

    let distances: Vec<f64> = results.iter().map(|r| r.distance.unwrap().km()).collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(results[0].distance.unwrap().to_string(), "0.54km");

    let keywords: Vec<&str> = results[0].organisation.keyword_names().collect();
    assert_eq!(keywords, vec!["test", "heart", "transplant", "trauma"]);
}

#[test]
fn test_search_term_and_location() {
    let names = search(
        &cape_town(),
        &[("search_term", "trauma"), ("location", ADDERLEY_STREET)],
    );
    assert_eq!(names, vec![CBMH, CMC]);
}

#[test]
fn test_radius() {
    let directory = cape_town();
    let radius_search = |term: Option<&str>, radius: &str, location: &str| {
        let mut pairs = vec![
            ("radius", radius),
            ("exact_location", "True"),
            ("location", location),
        ];
        if let Some(term) = term {
            pairs.push(("search_term", term));
        }
        search(&directory, &pairs)
    };

    assert_eq!(radius_search(None, "100", ADDERLEY_STREET).len(), 3);
    assert_eq!(radius_search(None, "150", FAR_POINT), vec![CBMH]);
    assert!(radius_search(Some("Netcare"), "100", FAR_POINT).is_empty());
    assert_eq!(radius_search(Some("testt"), "1000", FAR_POINT).len(), 3);
    assert_eq!(radius_search(Some("testt"), "154", FAR_POINT), vec![CBMH, KHC]);
    assert_eq!(radius_search(Some("Hospital"), "1000", FAR_POINT).len(), 2);
    assert_eq!(radius_search(Some("test"), "1000", FAR_POINT).len(), 3);
    assert_eq!(radius_search(Some("Hospital"), "150", FAR_POINT), vec![CBMH]);
}

#[test]
fn test_radius_without_location_is_ignored() {
    assert_eq!(search(&cape_town(), &[("radius", "1")]).len(), 3);
}

#[test]
fn test_organisation_without_location_is_last() {
    let directory = directory(&TestDataConfig::cape_town().with_unlocated_clinic());
    let results = directory
        .search_query_pairs([("location", ADDERLEY_STREET)])
        .unwrap();

    let names: Vec<&str> = results
        .iter()
        .map(|r| r.organisation.name.as_str())
        .collect();
    assert_eq!(names, vec![CBMH, KHC, CMC, "Praekelt Clinic"]);
    assert!(results[3].distance.is_none());

    let json: serde_json::Value =
        serde_json::from_str(&summaries_to_json(&results).unwrap()).unwrap();
    assert!(json[3]["distance"].is_null());
    assert_eq!(json[0]["distance"], "0.54km");
}

#[test]
fn test_country_filter() {
    let directory = cape_town();
    assert_eq!(search(&directory, &[("country", "ZA")]).len(), 3);
    assert_eq!(search(&directory, &[("country", "South Africa")]).len(), 3);
    assert!(search(&directory, &[("country", "KE")]).is_empty());
}

#[test]
fn test_keyword_filters() {
    let directory = cape_town();
    assert_eq!(search(&directory, &[("keywords", "hiv")]), vec![KHC]);
    assert_eq!(search(&directory, &[("keywords", "2,accident")]), vec![CBMH, CMC]);
    assert!(search(&directory, &[("keywords", "no-such-keyword")]).is_empty());
    // heart and trauma are the browse-visible keywords
    assert_eq!(
        search(&directory, &[("keywords", "hiv"), ("keywords", "all_keywords")]),
        vec![CBMH, CMC]
    );
}

#[test]
fn test_all_categories() {
    let directory = cape_town();
    assert_eq!(search(&directory, &[("all_categories", "true")]).len(), 3);
    assert_eq!(search(&directory, &[("categories", "all")]).len(), 3);
    assert_eq!(
        search(&directory, &[("categories", "999"), ("all_categories", "1")]).len(),
        3
    );
    assert!(search(&directory, &[("categories", "999")]).is_empty());
}

#[test]
fn test_invalid_parameters_are_client_errors() {
    let directory = cape_town();
    for (name, value) in [
        ("location", "-33.9"),
        ("location", "-95,18"),
        ("radius", "-5"),
        ("categories", "one"),
        ("all_categories", "perhaps"),
    ] {
        let err = directory
            .search_query_pairs([("location", ADDERLEY_STREET), (name, value)])
            .unwrap_err();
        assert_eq!(err.status_code(), 400, "{name}={value}");
        let DirectoryError::SearchError(search_error) = err else {
            panic!("expected a search error for {name}={value}");
        };
        let body = search_error.field_errors().unwrap();
        assert!(body.get(name).is_some(), "{name}={value}: {body}");
    }
}

#[test]
fn test_limit() {
    let directory = cape_town();
    let config = SearchConfigBuilder::new().limit(2).build();
    let request = SearchRequest::default().with_location(ADDERLEY_STREET.parse().unwrap());
    let results = directory.search_with_config(&request, &config).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].organisation.name, KHC);
}

#[test]
fn test_idempotent() {
    let directory = cape_town();
    let request = SearchRequest::default()
        .with_search_term("hospital")
        .with_location(FAR_POINT.parse().unwrap());
    let first = directory.search(&request).unwrap();
    let second = directory.search(&request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_stale_index_drops_missing_organisation() {
    setup_test_env();
    let full = load(&TestDataConfig::cape_town());
    let index = OrganisationIndex::in_memory(&full, &SearchConfig::default()).unwrap();
    let store = load(&TestDataConfig::cape_town().without_organisations(&[2]));
    let directory = ServiceDirectory::from_components(store, index);

    assert!(!directory.is_index_up_to_date().unwrap());
    let names = search(&directory, &[("location", ADDERLEY_STREET)]);
    assert_eq!(names, vec![CBMH, CMC]);
    assert_eq!(search(&directory, &[("search_term", "hiv")]).len(), 0);
}

#[test]
fn test_rebuild_index_catches_up() {
    setup_test_env();
    let full = load(&TestDataConfig::cape_town());
    let index = OrganisationIndex::in_memory(&full, &SearchConfig::default()).unwrap();
    let store = load(&TestDataConfig::cape_town().with_unlocated_clinic());
    let mut directory = ServiceDirectory::from_components(store, index);

    assert_eq!(search(&directory, &[]).len(), 3);
    directory.rebuild_index().unwrap();
    assert!(directory.is_index_up_to_date().unwrap());
    assert_eq!(search(&directory, &[]).len(), 4);
}

#[test]
fn test_empty_index_returns_nothing() {
    let directory = directory(&TestDataConfig::cape_town().without_organisations(&[1, 2, 3]));
    assert!(search(&directory, &[]).is_empty());
    assert!(search(&directory, &[("location", ADDERLEY_STREET)]).is_empty());
}

#[test]
fn test_lookup() {
    let directory = cape_town();
    let lookup =
        LookupRequest::from_query_pairs([("keyword", "trauma"), ("near", ADDERLEY_STREET)])
            .unwrap();
    let names: Vec<String> = directory
        .lookup(&lookup)
        .unwrap()
        .into_iter()
        .map(|r| r.organisation.name)
        .collect();
    assert_eq!(names, vec![CBMH, CMC]);
}

#[test]
fn test_on_disk_directory_reuses_index() {
    setup_test_env();
    let dir = create_test_data(&TestDataConfig::cape_town()).unwrap();

    let first = ServiceDirectory::open(dir.path()).unwrap();
    assert!(first.is_index_up_to_date().unwrap());
    drop(first);

    let second = ServiceDirectory::builder()
        .data_dir(dir.path())
        .force_rebuild(true)
        .build()
        .unwrap();
    assert_eq!(search(&second, &[("search_term", "heart")]), vec![CBMH]);
}

struct UnreachableIndex;

impl SearchIndex for UnreachableIndex {
    fn execute(&self, _query: &SearchQuery) -> Result<Vec<IndexHit>, IndexError> {
        Err(IndexError::Io(std::io::Error::other("index host unreachable")))
    }
}

#[test]
fn test_index_failure_is_server_error() {
    setup_test_env();
    let store = load(&TestDataConfig::cape_town());
    let err = search_inner(
        &SearchRequest::default(),
        &UnreachableIndex,
        &store,
        &SearchConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SearchError::IndexUnavailable(_)));
    assert_eq!(err.status_code(), 500);
}

#[test]
fn test_store_error_maps_to_server_error() {
    let err = SearchError::from(StoreError::Unavailable("connection reset".to_string()));
    assert_eq!(DirectoryError::from(err).status_code(), 500);
}

#[test]
fn test_distance_from_far_point() {
    let far: GeoPoint = FAR_POINT.parse().unwrap();
    let results = cape_town()
        .search(&SearchRequest::default().with_location(far))
        .unwrap();
    assert_eq!(results[0].distance.unwrap().to_string(), "144.53km");
}
