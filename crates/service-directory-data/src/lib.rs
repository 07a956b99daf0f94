use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tracing::warn;

pub mod directory;
mod error;
pub mod model;
pub mod raw;
pub mod test_data;

#[cfg(test)]
static TEST_DATA_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
    tempfile::TempDir::new().expect("Failed to create global temporary test data directory")
});

pub const DATA_DIR_DEFAULT: &str = "./sd_data";

#[cfg(test)]
fn resolve_data_dir() -> PathBuf {
    let temp_dir = TEST_DATA_DIR.path().to_path_buf();
    warn!(temp_dir = ?temp_dir, "Using temporary data directory for tests");
    temp_dir
}

#[cfg(not(test))]
fn resolve_data_dir() -> PathBuf {
    let dir = std::env::var("DATA_DIR").unwrap_or_else(|_| DATA_DIR_DEFAULT.to_string());
    if dir == DATA_DIR_DEFAULT {
        warn!(dir, "DATA_DIR not set, using default data directory");
    }
    PathBuf::from(dir)
}

/// Global data directory: a temporary directory under test, otherwise `$DATA_DIR`
/// falling back to [`DATA_DIR_DEFAULT`].
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(resolve_data_dir);

pub fn get_data_dir() -> &'static Path {
    DATA_DIR.as_path()
}

pub use directory::DirectoryData;
pub use error::{DataError, Result};
pub use model::{Category, Country, GeoPoint, GeoPointError, Keyword, Organisation};
pub use test_data::{TestDataConfig, create_test_data, write_test_data};
