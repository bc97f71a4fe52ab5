//! ATCO-CIF record decoding.

pub mod error;
pub mod fields;
pub mod records;

pub use error::{DecodeError, HeaderError, LineError};
pub use fields::{ClockTime, DateField};
pub use records::{decode, Direction, Header, Record, Transaction};
