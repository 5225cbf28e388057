//! Core errors, results and file loading shared by the topology operator crates.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod load;
pub mod result;

pub use error::Error;
pub use load::{load_toml, load_yaml_documents, parse_toml, parse_yaml_documents, read_to_string};
pub use result::{Result, ResultExt};
