use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Search error: {0}")]
    SearchError(#[from] crate::search::SearchError),
    #[error("Index error: {0}")]
    IndexError(#[from] crate::index::IndexError),
    #[error("Store error: {0}")]
    StoreError(#[from] crate::store::StoreError),
    #[error("Data error: {0}")]
    DataError(#[from] service_directory_data::DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DirectoryError {
    /// HTTP status the error maps to at the boundary: 400 for malformed search
    /// parameters, 500 for everything else.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SearchError(e) => e.status_code(),
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
