use thiserror::Error;

/// A single record that could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The line ends before the last mandatory field
    #[error("{code} record too short: needs {needed} characters, found {found}")]
    Truncated {
        code: &'static str,
        needed: usize,
        found: usize,
    },
    /// A field does not hold a value of its expected type
    #[error("{code} record has malformed {field}: {value:?}")]
    Malformed {
        code: &'static str,
        field: &'static str,
        value: String,
    },
}

/// A decode failure located in its source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{scope}:{line}: {error}")]
pub struct LineError {
    pub scope: String,
    pub line: usize,
    #[source]
    pub error: DecodeError,
}

/// The first line of a source does not announce a supported ATCO-CIF file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("source is empty")]
    Empty,
    #[error("rail CIF files are not supported, only ATCO-CIF")]
    RailCif,
    #[error("not an ATCO-CIF file")]
    NotCif,
    #[error("unsupported ATCO-CIF version {0:?}, only 05 is handled")]
    UnsupportedVersion(String),
}
