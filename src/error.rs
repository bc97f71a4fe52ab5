use thiserror::Error;

/// Any failure that ends a conversion run.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Source(#[from] crate::ingest::SourceError),
    #[error(transparent)]
    Staging(#[from] crate::staging::StagingError),
    #[error(transparent)]
    Gtfs(#[from] crate::gtfs::Error),
    /// Impossible to open or walk an input
    #[error("impossible to read input")]
    IO(#[from] std::io::Error),
    #[error("impossible to read archive")]
    Zip(#[from] zip::result::ZipError),
}
