//! Game-variant selectors, one per engine.
//!
//! Each engine recognizes a fixed set of raw codes; anything else is an
//! invalid-argument error, never a silent default.

use crate::error::{NovaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// WhiteBin archive variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveGame {
    #[serde(rename = "ff131")]
    Ff131,
    #[serde(rename = "ff132")]
    Ff132,
}

/// WDB database variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DbGame {
    #[serde(rename = "ff13")]
    Ff13,
    #[serde(rename = "ff132")]
    Ff132,
}

/// ZTR text resource variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextGame {
    #[serde(rename = "ff131")]
    Ff131,
    #[serde(rename = "ff132")]
    Ff132,
    #[serde(rename = "ff133")]
    Ff133,
}

fn out_of_range(engine: &str, raw: impl fmt::Display) -> NovaError {
    NovaError::InvalidArgument(format!("unrecognized {engine} game code: {raw}"))
}

impl TryFrom<i32> for ArchiveGame {
    type Error = NovaError;
    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(ArchiveGame::Ff131),
            1 => Ok(ArchiveGame::Ff132),
            _ => Err(out_of_range("archive", raw)),
        }
    }
}

impl TryFrom<i32> for DbGame {
    type Error = NovaError;
    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(DbGame::Ff13),
            1 => Ok(DbGame::Ff132),
            _ => Err(out_of_range("database", raw)),
        }
    }
}

impl TryFrom<i32> for TextGame {
    type Error = NovaError;
    fn try_from(raw: i32) -> Result<Self> {
        match raw {
            0 => Ok(TextGame::Ff131),
            1 => Ok(TextGame::Ff132),
            2 => Ok(TextGame::Ff133),
            _ => Err(out_of_range("text resource", raw)),
        }
    }
}

impl FromStr for ArchiveGame {
    type Err = NovaError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ff131" | "ff13" | "0" => Ok(ArchiveGame::Ff131),
            "ff132" | "1" => Ok(ArchiveGame::Ff132),
            _ => Err(out_of_range("archive", s)),
        }
    }
}

impl FromStr for DbGame {
    type Err = NovaError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ff13" | "ff131" | "0" => Ok(DbGame::Ff13),
            "ff132" | "1" => Ok(DbGame::Ff132),
            _ => Err(out_of_range("database", s)),
        }
    }
}

impl FromStr for TextGame {
    type Err = NovaError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ff131" | "ff13" | "0" => Ok(TextGame::Ff131),
            "ff132" | "1" => Ok(TextGame::Ff132),
            "ff133" | "lr" | "2" => Ok(TextGame::Ff133),
            _ => Err(out_of_range("text resource", s)),
        }
    }
}

impl fmt::Display for ArchiveGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArchiveGame::Ff131 => "ff131",
            ArchiveGame::Ff132 => "ff132",
        })
    }
}

impl fmt::Display for DbGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DbGame::Ff13 => "ff13",
            DbGame::Ff132 => "ff132",
        })
    }
}

impl fmt::Display for TextGame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TextGame::Ff131 => "ff131",
            TextGame::Ff132 => "ff132",
            TextGame::Ff133 => "ff133",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn raw_codes_per_engine() {
        assert_eq!(ArchiveGame::try_from(1).unwrap(), ArchiveGame::Ff132);
        assert_eq!(DbGame::try_from(0).unwrap(), DbGame::Ff13);
        assert_eq!(TextGame::try_from(2).unwrap(), TextGame::Ff133);

        // archive and database know two variants, text resources three
        assert_eq!(
            ArchiveGame::try_from(2).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            DbGame::try_from(-1).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert!(TextGame::try_from(3).is_err());
    }

    #[test]
    fn names_parse_back() {
        for g in [TextGame::Ff131, TextGame::Ff132, TextGame::Ff133] {
            assert_eq!(g.to_string().parse::<TextGame>().unwrap(), g);
        }
        assert!("ff14".parse::<DbGame>().is_err());
    }
}
