//! WDB typed databases: a `WPD` section container. Reserved `!` sections
//! carry the string pool, word types, field names and version; every other
//! section is one record named by its section name.

pub mod layout;
pub mod reader;
pub mod value;
pub mod words;
pub mod writer;

pub use layout::Layout;
pub use reader::{parse, parse_bytes};
pub use value::{WdbEntry, WdbFile, WdbRecord, WdbSection, WdbValue};
pub use writer::{to_bytes, validate, write};

use crate::error::Result;

pub fn to_json_string(file: &WdbFile) -> Result<String> {
    Ok(serde_json::to_string_pretty(file)?)
}

pub fn from_json_string(text: &str) -> Result<WdbFile> {
    Ok(serde_json::from_str(text)?)
}
