use crate::error::{NovaError, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Codepage switch for ZTR text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextEncoding {
    /// Pick from the file name's language suffix, falling back to `Lj`.
    #[default]
    Auto,
    Ch,
    Kr,
    Lj,
}

impl TextEncoding {
    /// Resolves `Auto` against `file`; explicit switches pass through.
    pub fn resolve(self, file: Option<&Path>) -> TextEncoding {
        if self != TextEncoding::Auto {
            return self;
        }
        let stem = file
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if stem.ends_with("_c") || stem.ends_with("_ch") {
            TextEncoding::Ch
        } else if stem.ends_with("_k") || stem.ends_with("_kr") {
            TextEncoding::Kr
        } else {
            TextEncoding::Lj
        }
    }

    pub fn table(self) -> &'static Encoding {
        match self {
            TextEncoding::Ch => encoding_rs::BIG5,
            TextEncoding::Kr => encoding_rs::EUC_KR,
            TextEncoding::Auto | TextEncoding::Lj => encoding_rs::SHIFT_JIS,
        }
    }
}

impl FromStr for TextEncoding {
    type Err = NovaError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AUTO" => Ok(TextEncoding::Auto),
            "CH" => Ok(TextEncoding::Ch),
            "KR" => Ok(TextEncoding::Kr),
            "LJ" => Ok(TextEncoding::Lj),
            _ => Err(NovaError::InvalidArgument(format!(
                "unrecognized encoding switch: {s}"
            ))),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TextEncoding::Auto => "AUTO",
            TextEncoding::Ch => "CH",
            TextEncoding::Kr => "KR",
            TextEncoding::Lj => "LJ",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_reads_the_language_suffix() {
        let auto = TextEncoding::Auto;
        assert_eq!(auto.resolve(Some(Path::new("txtres_c.ztr"))), TextEncoding::Ch);
        assert_eq!(auto.resolve(Some(Path::new("x/TXTRES_KR.ztr"))), TextEncoding::Kr);
        assert_eq!(auto.resolve(Some(Path::new("txtres_us.ztr"))), TextEncoding::Lj);
        assert_eq!(auto.resolve(None), TextEncoding::Lj);
        assert_eq!(
            TextEncoding::Kr.resolve(Some(Path::new("a_c.ztr"))),
            TextEncoding::Kr
        );
    }

    #[test]
    fn switches_parse_case_insensitively() {
        assert_eq!("lj".parse::<TextEncoding>().unwrap(), TextEncoding::Lj);
        assert_eq!("AUTO".parse::<TextEncoding>().unwrap(), TextEncoding::Auto);
        assert_eq!("utf8".parse::<TextEncoding>().unwrap_err().code(), 6);
    }
}
