pub mod error;
pub mod feed;
pub mod structs;

pub use error::Error;
pub use feed::Feed;
