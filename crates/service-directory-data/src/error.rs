use polars::prelude::PolarsError;
use thiserror::Error;

use crate::model::GeoPointError;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Invalid coordinates: {0}")]
    Coordinates(#[from] GeoPointError),
    #[error("Invalid record in '{table}' (id {id}): {reason}")]
    InvalidRecord {
        table: &'static str,
        id: u64,
        reason: String,
    },
    #[error("Required table '{0}' not found in the data directory")]
    RequiredFileNotFound(String),
}
