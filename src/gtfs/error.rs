use thiserror::Error;

/// An error that can occur when writing GTFS data.
#[derive(Error, Debug)]
pub enum Error {
    /// A file references an Id that is not present
    #[error("The id {0} is not known")]
    ReferenceError(String),
    /// Two rows of the same file share an Id
    #[error("duplicate id {id} in {file_name}")]
    DuplicateId { file_name: &'static str, id: String },
    /// Generic Input/Output error while writing a file
    #[error("impossible to write file")]
    IO(#[from] std::io::Error),
    /// Impossible to write a CSV file
    #[error("impossible to write csv file '{file_name}'")]
    CSVError {
        /// File name that could not be written as CSV
        file_name: &'static str,
        /// The initial error by the csv library
        #[source]
        source: csv::Error,
    },
    /// Error when trying to zip the GTFS archive
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}
