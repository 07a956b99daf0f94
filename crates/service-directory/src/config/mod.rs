use serde::{Deserialize, Serialize};

/// Maximum edit distance the fuzzy matcher supports.
pub const MAX_FUZZY_DISTANCE: u8 = 2;

/// How many edits a query token may be away from an indexed term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Fuzziness {
    /// Scales with token length: exact for 1-2 characters, one edit for 3-5, two above.
    #[default]
    Auto,
    /// A fixed distance, clamped to [`MAX_FUZZY_DISTANCE`].
    Fixed(u8),
}

impl Fuzziness {
    /// Edit distance allowed for `token`.
    pub fn edits_for(self, token: &str) -> u8 {
        match self {
            Self::Auto => match token.chars().count() {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
            Self::Fixed(distance) => distance.min(MAX_FUZZY_DISTANCE),
        }
    }
}

/// Tunables for query composition and the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum number of results a search returns.
    pub limit: usize,
    pub fuzziness: Fuzziness,
    /// Count a swap of two adjacent characters as a single edit.
    pub fuzzy_transpositions: bool,
    /// Boost applied to exact token matches over fuzzy ones.
    pub exact_term_boost: f32,
    /// Memory budget handed to the index writer on rebuild.
    pub writer_memory_bytes: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 20,
            fuzziness: Fuzziness::Auto,
            fuzzy_transpositions: true,
            exact_term_boost: 2.0,
            writer_memory_bytes: 50_000_000,
        }
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Exact token matching only, no typo tolerance.
    pub fn exact() -> Self {
        Self::new().fuzziness(Fuzziness::Fixed(0))
    }

    /// Set the maximum number of results to return (at least one)
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = limit.max(1);
        self
    }

    pub fn fuzziness(mut self, fuzziness: Fuzziness) -> Self {
        self.config.fuzziness = match fuzziness {
            Fuzziness::Fixed(distance) => Fuzziness::Fixed(distance.min(MAX_FUZZY_DISTANCE)),
            auto @ Fuzziness::Auto => auto,
        };
        self
    }

    pub fn fuzzy_transpositions(mut self, enabled: bool) -> Self {
        self.config.fuzzy_transpositions = enabled;
        self
    }

    /// Boost for exact token matches; negative or non-finite values fall back to 1.0
    pub fn exact_term_boost(mut self, boost: f32) -> Self {
        self.config.exact_term_boost = if boost.is_finite() && boost >= 0.0 {
            boost
        } else {
            1.0
        };
        self
    }

    /// Memory budget for the index writer, floored at tantivy's 15 MB minimum
    pub fn writer_memory(mut self, bytes: usize) -> Self {
        self.config.writer_memory_bytes = bytes.max(15_000_000);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SearchConfig {
        self.config
    }
}
