use serde::{Deserialize, Serialize};
use std::fmt;

/// One typed value. Record cells take their variant from the word type and
/// field name they are stored under; header entries from their key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WdbValue {
    Int(i32),
    Uint(u32),
    Float(f32),
    String(String),
    Bool(bool),
    IntArray(Vec<i32>),
    UintArray(Vec<u32>),
    StringArray(Vec<String>),
    /// A record word of a type this crate does not know, kept verbatim.
    Unknown { tag: u16, raw: Vec<u8> },
}

impl WdbValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            WdbValue::Int(_) => "int",
            WdbValue::Uint(_) => "uint",
            WdbValue::Float(_) => "float",
            WdbValue::String(_) => "string",
            WdbValue::Bool(_) => "bool",
            WdbValue::IntArray(_) => "int-array",
            WdbValue::UintArray(_) => "uint-array",
            WdbValue::StringArray(_) => "string-array",
            WdbValue::Unknown { .. } => "unknown",
        }
    }

    /// Same variant, and for unknown words the same type code.
    pub fn same_kind(&self, other: &WdbValue) -> bool {
        match (self, other) {
            (WdbValue::Unknown { tag: a, .. }, WdbValue::Unknown { tag: b, .. }) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Display for WdbValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WdbValue::Int(v) => write!(f, "{v}"),
            WdbValue::Uint(v) => write!(f, "{v}"),
            WdbValue::Float(v) => write!(f, "{v}"),
            WdbValue::String(s) => write!(f, "{s:?}"),
            WdbValue::Bool(b) => write!(f, "{b}"),
            WdbValue::IntArray(v) => write!(f, "{v:?}"),
            WdbValue::UintArray(v) => write!(f, "{v:?}"),
            WdbValue::StringArray(v) => write!(f, "{v:?}"),
            WdbValue::Unknown { tag, raw } => write!(f, "<type {tag}: {}>", hex::encode(raw)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WdbEntry {
    pub key: String,
    pub value: WdbValue,
}

impl WdbEntry {
    pub fn new(key: impl Into<String>, value: WdbValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

pub type WdbSection = Vec<WdbEntry>;
pub type WdbRecord = Vec<WdbEntry>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WdbFile {
    pub name: String,
    pub header: WdbSection,
    pub records: Vec<WdbRecord>,
}
