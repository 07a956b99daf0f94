//! Full-text and geo search over organisations.
//!
//! [`SearchIndex`] is the contract the search facade depends on. [`OrganisationIndex`]
//! implements it on tantivy: one document per organisation carrying an analysed
//! `text` field plus exact-match fields for country, keyword ids and category ids.
//! Coordinates are stored, not indexed; distance ordering and the radius filter run
//! over the matched candidates after retrieval.

use std::path::{Path, PathBuf};

pub use error::IndexError;
pub(crate) use error::Result;
use itertools::Itertools;
use service_directory_data::{DirectoryData, GeoPoint, Organisation};
use tantivy::{
    Index, IndexWriter, TantivyDocument, Term,
    collector::TopDocs,
    query::{
        AllQuery, BooleanQuery, BoostQuery, EmptyQuery, FuzzyTermQuery, Occur, Query, TermQuery,
        TermSetQuery,
    },
    schema::{
        FAST, Field, INDEXED, IndexRecordOption, STORED, Schema, SchemaBuilder,
        TextFieldIndexing, TextOptions, Value,
    },
    tokenizer::TokenStream,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    config::SearchConfig,
    search::{SearchQuery, TextMatch},
};

pub const INDEX_NAME: &str = "organisations";

/// One ranked match. `distance_km` is set whenever the query has a distance origin;
/// organisations without a location get `f64::INFINITY`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub id: u64,
    pub distance_km: Option<f64>,
}

pub trait SearchIndex {
    /// Execute `query`, returning at most `query.limit()` hits in rank order.
    fn execute(&self, query: &SearchQuery) -> Result<Vec<IndexHit>>;
}

/// The searchable projection of an [`Organisation`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrganisationDocument {
    pub id: u64,
    /// Name, address, category names and keyword names.
    pub text: String,
    /// Lowercased ISO code and country name.
    pub country: Vec<String>,
    pub category_ids: Vec<u64>,
    pub keyword_ids: Vec<u64>,
    pub location: Option<GeoPoint>,
}

impl From<&Organisation> for OrganisationDocument {
    fn from(organisation: &Organisation) -> Self {
        let text = [organisation.name.as_str(), organisation.address.as_str()]
            .into_iter()
            .chain(organisation.category_names())
            .chain(organisation.keyword_names())
            .filter(|part| !part.is_empty())
            .join("\n");

        let country = [&organisation.country.iso_code, &organisation.country.name]
            .into_iter()
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .unique()
            .collect();

        Self {
            id: organisation.id,
            text,
            country,
            category_ids: organisation.categories.iter().map(|c| c.id).collect(),
            keyword_ids: organisation.keywords.iter().map(|k| k.id).collect(),
            location: organisation.location,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OrganisationFields {
    id: Field,
    text: Field,
    country: Field,
    category_ids: Field,
    keyword_ids: Field,
    latitude: Field,
    longitude: Field,
}

impl OrganisationFields {
    fn schema() -> Schema {
        let mut schema_builder = SchemaBuilder::new();

        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer("en_stem")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default().set_indexing_options(text_indexing);

        // Exact matching, values are lowercased before indexing
        let code_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("raw")
                .set_index_option(IndexRecordOption::Basic),
        );

        schema_builder.add_u64_field("id", STORED | INDEXED | FAST);
        schema_builder.add_text_field("text", text_options);
        schema_builder.add_text_field("country", code_options);
        schema_builder.add_u64_field("category_ids", INDEXED);
        schema_builder.add_u64_field("keyword_ids", INDEXED);
        schema_builder.add_f64_field("latitude", STORED);
        schema_builder.add_f64_field("longitude", STORED);
        schema_builder.build()
    }

    fn from_schema(schema: &Schema) -> Result<Self> {
        Ok(Self {
            id: schema.get_field("id")?,
            text: schema.get_field("text")?,
            country: schema.get_field("country")?,
            category_ids: schema.get_field("category_ids")?,
            keyword_ids: schema.get_field("keyword_ids")?,
            latitude: schema.get_field("latitude")?,
            longitude: schema.get_field("longitude")?,
        })
    }

    fn document(&self, doc: &OrganisationDocument) -> TantivyDocument {
        let mut tantivy_doc = TantivyDocument::default();
        tantivy_doc.add_u64(self.id, doc.id);
        tantivy_doc.add_text(self.text, &doc.text);
        for country in &doc.country {
            tantivy_doc.add_text(self.country, country);
        }
        for &category_id in &doc.category_ids {
            tantivy_doc.add_u64(self.category_ids, category_id);
        }
        for &keyword_id in &doc.keyword_ids {
            tantivy_doc.add_u64(self.keyword_ids, keyword_id);
        }
        if let Some(location) = doc.location {
            tantivy_doc.add_f64(self.latitude, location.latitude());
            tantivy_doc.add_f64(self.longitude, location.longitude());
        }
        tantivy_doc
    }
}

/// Tantivy-backed organisation index, in RAM or on disk.
#[derive(Clone)]
pub struct OrganisationIndex {
    index: Index,
    fields: OrganisationFields,
    writer_memory_bytes: usize,
}

impl std::fmt::Debug for OrganisationIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganisationIndex")
            .field("num_docs", &self.num_docs().ok())
            .finish_non_exhaustive()
    }
}

pub fn index_path_in(data_dir: &Path) -> PathBuf {
    data_dir.join("tantivy_indexes").join(INDEX_NAME)
}

impl OrganisationIndex {
    /// Build a fresh index in RAM.
    #[instrument(name = "Create in-memory index", skip_all, fields(num_organisations = data.len()))]
    pub fn in_memory(data: &DirectoryData, config: &SearchConfig) -> Result<Self> {
        let index = Index::create_in_ram(OrganisationFields::schema());
        let mut this = Self::from_index(index, config)?;
        this.rebuild(data)?;
        Ok(this)
    }

    /// Load the index at `index_path` if its document count matches the store,
    /// otherwise (or when `overwrite`) build it from scratch.
    #[instrument(name = "Create Index", skip_all, fields(path = %index_path.display(), overwrite = overwrite))]
    pub fn open_or_build(
        index_path: &Path,
        data: &DirectoryData,
        overwrite: bool,
        config: &SearchConfig,
    ) -> Result<Self> {
        info!(path = ?index_path, "Using organisation index path.");

        if overwrite && index_path.exists() {
            info!(path = ?index_path, "Overwriting existing index directory.");
            std::fs::remove_dir_all(index_path)?;
        }
        std::fs::create_dir_all(index_path)?;

        if index_path.join("meta.json").exists() {
            info!(path = ?index_path, "Index meta.json found. Attempting to load existing index.");
            match Index::open_in_dir(index_path)
                .map_err(IndexError::from)
                .and_then(|index| Self::from_index(index, config))
            {
                Ok(existing) => {
                    if existing.is_up_to_date(data)? {
                        info!(path = ?index_path, num_docs = data.len(), "Index is up-to-date. Loaded existing index.");
                        return Ok(existing);
                    }
                    info!(
                        path = ?index_path,
                        actual_doc_count = existing.num_docs()?,
                        expected_doc_count = data.len(),
                        "Index out of date (doc count mismatch). Re-indexing."
                    );
                }
                Err(e) => {
                    warn!(path = ?index_path, error = ?e, "Failed to open existing index, will re-index.");
                }
            }
            safely_recreate_dir(index_path)?;
        } else {
            info!(path = ?index_path, "No existing index found (meta.json missing). Will create new index.");
        }

        let index = Index::create_in_dir(index_path, OrganisationFields::schema())?;
        let mut this = Self::from_index(index, config)?;
        this.rebuild(data)?;
        Ok(this)
    }

    fn from_index(index: Index, config: &SearchConfig) -> Result<Self> {
        let fields = OrganisationFields::from_schema(&index.schema())?;
        Ok(Self {
            index,
            fields,
            writer_memory_bytes: config.writer_memory_bytes,
        })
    }

    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.index.reader()?.searcher().num_docs())
    }

    /// The stored document count equals the store's organisation count.
    pub fn is_up_to_date(&self, data: &DirectoryData) -> Result<bool> {
        Ok(usize::try_from(self.num_docs()?).is_ok_and(|n| n == data.len()))
    }

    /// Replace every document with the current contents of `data`.
    #[instrument(name = "Rebuild index", skip_all, level = "info", fields(num_organisations = data.len()))]
    pub fn rebuild(&mut self, data: &DirectoryData) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer_with_num_threads(1, self.writer_memory_bytes)?;
        writer.delete_all_documents()?;

        if data.is_empty() {
            warn!("No organisations to index. Index will be empty.");
        }
        for organisation in data.organisations() {
            let document = OrganisationDocument::from(&organisation);
            trace!(organisation_id = document.id, "Indexing organisation");
            writer.add_document(self.fields.document(&document))?;
        }
        writer.commit()?;
        info!(num_docs = data.len(), "Index creation complete");
        Ok(())
    }

    /// Analyse `text` the way the `text` field was analysed at index time.
    fn analyse(&self, text: &str) -> Result<Vec<String>> {
        let mut analyzer = self.index.tokenizer_for_field(self.fields.text)?;
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        Ok(tokens.into_iter().unique().collect())
    }

    /// Match-query semantics: any analysed token may match, exactly (boosted) or
    /// within the fuzzy edit distance. `None` when the text has no tokens.
    fn text_query(&self, text: &TextMatch) -> Result<Option<Box<dyn Query>>> {
        let tokens = self.analyse(&text.text)?;
        if tokens.is_empty() {
            return Ok(None);
        }

        let mut token_clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for token in tokens {
            let term = Term::from_field_text(self.fields.text, &token);
            let exact = TermQuery::new(term.clone(), IndexRecordOption::WithFreqs);
            token_clauses.push((
                Occur::Should,
                Box::new(BoostQuery::new(Box::new(exact), text.exact_boost)),
            ));

            let distance = text.fuzziness.edits_for(&token);
            if distance > 0 {
                token_clauses.push((
                    Occur::Should,
                    Box::new(FuzzyTermQuery::new(term, distance, text.transpositions)),
                ));
            }
        }
        Ok(Some(Box::new(BooleanQuery::new(token_clauses))))
    }

    fn id_set_query(field: Field, ids: impl IntoIterator<Item = u64>) -> Box<dyn Query> {
        let terms: Vec<Term> = ids
            .into_iter()
            .map(|id| Term::from_field_u64(field, id))
            .collect();
        Box::new(TermSetQuery::new(terms))
    }

    /// Translate a [`SearchQuery`] into a single tantivy query.
    #[instrument(name = "Build Base Query", skip_all, level = "trace")]
    fn build_query(&self, query: &SearchQuery) -> Result<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let Some(text) = query.text() {
            match self.text_query(text)? {
                Some(text_query) => clauses.push((Occur::Must, text_query)),
                None => {
                    debug!(text = %text.text, "Search text has no indexable tokens");
                    return Ok(Box::new(EmptyQuery));
                }
            }
        }

        if let Some(country) = query.country() {
            let term = Term::from_field_text(self.fields.country, &country.trim().to_lowercase());
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        for (field, ids) in [
            (self.fields.keyword_ids, query.keyword_ids()),
            (self.fields.category_ids, query.category_ids()),
        ] {
            match ids {
                Some(ids) if ids.is_empty() => return Ok(Box::new(EmptyQuery)),
                Some(ids) => {
                    clauses.push((Occur::Must, Self::id_set_query(field, ids.iter().copied())));
                }
                None => {}
            }
        }

        if clauses.is_empty() {
            return Ok(Box::new(AllQuery));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    fn stored_location(&self, doc: &TantivyDocument) -> Option<GeoPoint> {
        let latitude = doc.get_first(self.fields.latitude).and_then(|v| v.as_f64())?;
        let longitude = doc.get_first(self.fields.longitude).and_then(|v| v.as_f64())?;
        GeoPoint::try_new(latitude, longitude).ok()
    }
}

impl SearchIndex for OrganisationIndex {
    #[instrument(name = "Search organisation index", skip_all, level = "debug", fields(limit = query.limit(), by_distance = query.order_by_distance()))]
    fn execute(&self, query: &SearchQuery) -> Result<Vec<IndexHit>> {
        let tantivy_query = self.build_query(query)?;
        trace!(?tantivy_query, "Final query constructed");

        let searcher = self.index.reader()?.searcher();
        let origin = query.distance_from();
        // Distance ordering needs every candidate, not just the best scored ones
        let fetch = match origin {
            Some(_) => usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX),
            None => query.limit(),
        };

        let t_search = std::time::Instant::now();
        let top_docs = searcher.search(&*tantivy_query, &TopDocs::with_limit(fetch.max(1)))?;
        debug!(
            num_results = top_docs.len(),
            search_execution_seconds = t_search.elapsed().as_secs_f32(),
            "Tantivy search execution complete"
        );

        let mut hits = Vec::with_capacity(top_docs.len());
        for (_score, doc_address) in top_docs {
            let doc = searcher.doc::<TantivyDocument>(doc_address)?;
            let id = doc
                .get_first(self.fields.id)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| anyhow::anyhow!("Failed to get id from document: {doc:?}"))?;
            let distance_km = origin.map(|origin| {
                self.stored_location(&doc)
                    .map_or(f64::INFINITY, |location| origin.distance_km(&location))
            });
            hits.push(IndexHit { id, distance_km });
        }

        if origin.is_some() {
            if let Some(radius) = query.within_km() {
                hits.retain(|hit| hit.distance_km.is_some_and(|d| d <= radius));
            }
            if query.order_by_distance() {
                // Stable, so equal distances keep their relevance order
                hits.sort_by(|a, b| {
                    let a = a.distance_km.unwrap_or(f64::INFINITY);
                    let b = b.distance_km.unwrap_or(f64::INFINITY);
                    a.total_cmp(&b)
                });
            }
        }
        hits.truncate(query.limit());
        Ok(hits)
    }
}

fn safely_recreate_dir(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }
    std::fs::create_dir_all(path)?;
    Ok(())
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Fuzziness, SearchConfigBuilder};
    use service_directory_data::{TestDataConfig, create_test_data};

    fn data(config: &TestDataConfig) -> DirectoryData {
        let dir = create_test_data(config).unwrap();
        DirectoryData::load(dir.path()).unwrap()
    }

    fn cape_town_index() -> OrganisationIndex {
        OrganisationIndex::in_memory(&data(&TestDataConfig::cape_town()), &SearchConfig::default())
            .unwrap()
    }

    fn text(term: &str) -> SearchQuery {
        SearchQuery::builder()
            .match_text(term, &SearchConfig::default())
            .build()
    }

    fn ids(hits: &[IndexHit]) -> Vec<u64> {
        let mut ids: Vec<u64> = hits.iter().map(|hit| hit.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_document_projection() {
        let data = data(&TestDataConfig::cape_town());
        let doc = OrganisationDocument::from(&data.organisation(2).unwrap());
        assert_eq!(
            doc.text,
            "Kingsbury Hospital Claremont\nWilderness Road, Claremont\nTest Category\ntest\nhiv\naids"
        );
        assert_eq!(doc.country, vec!["za", "south africa"]);
        assert_eq!(doc.category_ids, vec![1]);
        assert_eq!(doc.keyword_ids, vec![1, 5, 6]);
    }

    #[test]
    fn test_match_all() {
        let index = cape_town_index();
        let hits = index.execute(&SearchQuery::default()).unwrap();
        assert_eq!(ids(&hits), vec![1, 2, 3]);
        assert!(hits.iter().all(|hit| hit.distance_km.is_none()));
    }

    #[test]
    fn test_keyword_text_matches() {
        let index = cape_town_index();
        for (term, expected) in [
            ("test", vec![1, 2, 3]),
            ("heart", vec![1]),
            ("transplant", vec![1]),
            ("trauma", vec![1, 3]),
            ("hiv", vec![2]),
            ("aids", vec![2]),
            ("accident", vec![3]),
            ("category", vec![1, 2, 3]),
        ] {
            assert_eq!(ids(&index.execute(&text(term)).unwrap()), expected, "term {term}");
        }
    }

    #[test]
    fn test_fuzzy_matches() {
        let index = cape_town_index();
        assert_eq!(ids(&index.execute(&text("testt")).unwrap()), vec![1, 2, 3]);
        assert_eq!(ids(&index.execute(&text("aid")).unwrap()), vec![2]);
        assert_eq!(ids(&index.execute(&text("med")).unwrap()), vec![3]);
        assert_eq!(ids(&index.execute(&text("hospice")).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_exact_config_disables_fuzzy() {
        let index = cape_town_index();
        let query = SearchQuery::builder()
            .match_text("testt", &SearchConfigBuilder::new().fuzziness(Fuzziness::Fixed(0)).build())
            .build();
        assert!(index.execute(&query).unwrap().is_empty());
    }

    #[test]
    fn test_text_without_tokens_matches_nothing() {
        assert!(cape_town_index().execute(&text("!!!")).unwrap().is_empty());
    }

    #[test]
    fn test_country_filter_accepts_code_or_name() {
        let index = cape_town_index();
        for country in ["ZA", "za", "South Africa"] {
            let query = SearchQuery::builder().filter_country(country).build();
            assert_eq!(index.execute(&query).unwrap().len(), 3, "country {country}");
        }
        let query = SearchQuery::builder().filter_country("NL").build();
        assert!(index.execute(&query).unwrap().is_empty());
    }

    #[test]
    fn test_set_filters() {
        let index = cape_town_index();
        let query = SearchQuery::builder().filter_keywords([2, 7]).build();
        assert_eq!(ids(&index.execute(&query).unwrap()), vec![1, 3]);

        let query = SearchQuery::builder()
            .filter_keywords([4])
            .filter_categories([1])
            .match_text("clinic", &SearchConfig::default())
            .build();
        assert_eq!(ids(&index.execute(&query).unwrap()), vec![3]);

        let query = SearchQuery::builder().filter_categories([]).build();
        assert!(index.execute(&query).unwrap().is_empty());
    }

    #[test]
    fn test_distance_ordering_and_radius() {
        let index = cape_town_index();
        let adderley = GeoPoint::try_new(-33.921387, 18.424101).unwrap();
        let query = SearchQuery::builder().order_by_distance_from(adderley).build();
        let hits = index.execute(&query).unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        let distances: Vec<f64> = hits.iter().map(|h| h.distance_km.unwrap()).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert!((distances[0] - 0.544).abs() < 0.01);

        let far = GeoPoint::try_new(-32.921387, 17.424101).unwrap();
        let query = SearchQuery::builder()
            .order_by_distance_from(far)
            .within_radius(150.0)
            .build();
        let hits = index.execute(&query).unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_radius_bound_is_inclusive() {
        let index = cape_town_index();
        let origin = GeoPoint::try_new(-33.921387, 18.424101).unwrap();
        let exact = origin.distance_km(&GeoPoint::try_new(-33.986375, 18.469060).unwrap());
        let query = SearchQuery::builder()
            .order_by_distance_from(origin)
            .within_radius(exact)
            .build();
        assert_eq!(ids(&index.execute(&query).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_unlocated_sorts_last_with_infinite_distance() {
        let data = data(&TestDataConfig::cape_town().with_unlocated_clinic());
        let index = OrganisationIndex::in_memory(&data, &SearchConfig::default()).unwrap();
        let origin = GeoPoint::try_new(-33.921387, 18.424101).unwrap();
        let hits = index
            .execute(&SearchQuery::builder().order_by_distance_from(origin).build())
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(hits[3].distance_km, Some(f64::INFINITY));

        let within = SearchQuery::builder()
            .order_by_distance_from(origin)
            .within_radius(10_000.0)
            .build();
        assert_eq!(index.execute(&within).unwrap().len(), 3);
    }

    #[test]
    fn test_limit_applies_after_distance_sort() {
        let index = cape_town_index();
        let cmc = GeoPoint::try_new(-34.026629, 18.461260).unwrap();
        let query = SearchQuery::builder()
            .order_by_distance_from(cmc)
            .limit(1)
            .build();
        let hits = index.execute(&query).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 3);
    }

    #[test]
    fn test_on_disk_index_is_reused_until_stale() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = index_path_in(dir.path());
        let full = data(&TestDataConfig::cape_town());
        let config = SearchConfig::default();

        let index = OrganisationIndex::open_or_build(&path, &full, false, &config).unwrap();
        assert_eq!(index.num_docs().unwrap(), 3);
        assert!(path.join("meta.json").exists());
        drop(index);

        let reopened = OrganisationIndex::open_or_build(&path, &full, false, &config).unwrap();
        assert!(reopened.is_up_to_date(&full).unwrap());
        drop(reopened);

        let smaller = data(&TestDataConfig::cape_town().without_organisations(&[2]));
        let rebuilt = OrganisationIndex::open_or_build(&path, &smaller, false, &config).unwrap();
        assert_eq!(rebuilt.num_docs().unwrap(), 2);
        assert!(!rebuilt.is_up_to_date(&full).unwrap());
    }

    #[test]
    fn test_rebuild_replaces_documents() {
        let mut index = cape_town_index();
        let empty = data(&TestDataConfig::cape_town().without_organisations(&[1, 2, 3]));
        index.rebuild(&empty).unwrap();
        assert_eq!(index.num_docs().unwrap(), 0);
        assert!(index.execute(&SearchQuery::default()).unwrap().is_empty());
    }
}
