//! ZTR text resources: id/text string tables stored as dictionary-compressed
//! chunks, with control codes rendered as `{Tag}` names.

pub mod codepage;
pub mod dict;
pub mod dump;
pub mod format;
pub mod keys;
pub mod text;

pub use codepage::TextEncoding;
pub use dump::SEPARATOR;

use crate::error::{NovaError, Result};
use crate::game::TextGame;
use crate::util::files::{StagedFile, commit_all};
use encoding_rs::Encoding;
use keys::KeySet;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Once;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZtrEntry {
    pub id: String,
    pub text: String,
}

/// A control tag and the bytes it stands for, as upper-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZtrKeyMapping {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZtrResultData {
    pub entries: Vec<ZtrEntry>,
    pub mappings: Vec<ZtrKeyMapping>,
}

/// Compression applied when packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Action {
    /// Empty dictionaries.
    #[default]
    X,
    C,
    C2,
}

impl FromStr for Action {
    type Err = NovaError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "X" => Ok(Action::X),
            "C" => Ok(Action::C),
            "C2" => Ok(Action::C2),
            _ => Err(NovaError::InvalidArgument(format!(
                "unrecognized action switch: {s}"
            ))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZtrOptions {
    pub encoding: TextEncoding,
    pub action: Action,
}

/// Everything that varies by game and language, chosen once per operation.
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    pub game: TextGame,
    pub encoding: TextEncoding,
    pub keys: &'static KeySet,
    pub codepage: &'static Encoding,
    /// `85 xx` Latin characters are only used by the Japanese codepage.
    pub latin_ext: bool,
}

impl Dialect {
    pub fn new(game: TextGame, encoding: TextEncoding, file: Option<&Path>) -> Self {
        let encoding = encoding.resolve(file);
        Dialect {
            game,
            encoding,
            keys: KeySet::for_game(game),
            codepage: encoding.table(),
            latin_ext: encoding == TextEncoding::Lj,
        }
    }
}

/// Builds the control-code tables. Safe to call any number of times.
pub fn init() {
    static READY: Once = Once::new();
    READY.call_once(|| {
        let tags: usize = [TextGame::Ff131, TextGame::Ff132, TextGame::Ff133]
            .into_iter()
            .map(|g| KeySet::for_game(g).tag_count())
            .sum();
        tracing::debug!("ZTR tables ready ({tags} control tags across games)");
    });
}

fn decode(bytes: &[u8], dialect: &Dialect) -> Result<ZtrResultData> {
    init();
    let raw = format::read(bytes)?;
    let mut seen = text::SeenTags::default();
    let entries = raw
        .lines
        .into_iter()
        .map(|(id, line)| ZtrEntry {
            text: text::decode_line(&line, dialect, &mut seen),
            id,
        })
        .collect::<Vec<_>>();
    let mappings = seen
        .into_vec()
        .into_iter()
        .map(|(key, bytes)| ZtrKeyMapping {
            key,
            value: hex::encode_upper(bytes),
        })
        .collect();
    tracing::debug!(
        "decoded {} entries ({:?}, {} {})",
        entries.len(),
        raw.scheme,
        dialect.game,
        dialect.encoding
    );
    Ok(ZtrResultData { entries, mappings })
}

/// Caller mappings as tag definitions; keys gain braces if they lack them.
fn extra_tags(mappings: &[ZtrKeyMapping]) -> Result<HashMap<String, Vec<u8>>> {
    let mut out = HashMap::with_capacity(mappings.len());
    for m in mappings {
        let key = if m.key.starts_with('{') && m.key.ends_with('}') {
            m.key.clone()
        } else {
            format!("{{{}}}", m.key)
        };
        let bytes = hex::decode(m.value.replace(' ', ""))
            .ok()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                NovaError::InvalidArgument(format!(
                    "mapping {} has non-hex value {:?}",
                    m.key, m.value
                ))
            })?;
        if out.insert(key, bytes).is_some() {
            return Err(NovaError::InvalidArgument(format!(
                "duplicate mapping key {}",
                m.key
            )));
        }
    }
    Ok(out)
}

fn encode(data: &ZtrResultData, dialect: &Dialect, action: Action) -> Result<Vec<u8>> {
    init();
    let extra = extra_tags(&data.mappings)?;
    let mut ids = HashSet::with_capacity(data.entries.len());
    let mut lines = Vec::with_capacity(data.entries.len());
    for e in &data.entries {
        if !ids.insert(e.id.as_str()) {
            return Err(NovaError::InvalidArgument(format!("duplicate entry id {}", e.id)));
        }
        let line = text::encode_line(&e.text, dialect, &extra)
            .map_err(|err| match err {
                NovaError::Encoding(m) => NovaError::Encoding(format!("entry {}: {m}", e.id)),
                other => other,
            })?;
        lines.push((e.id.clone(), line));
    }
    format::write(&lines, action)
}

/// Decodes a resource already in memory; `Auto` falls back to `Lj`.
pub fn parse_from_memory(
    bytes: &[u8],
    game: TextGame,
    encoding: TextEncoding,
) -> Result<ZtrResultData> {
    decode(bytes, &Dialect::new(game, encoding, None))
}

/// Encodes to bytes without touching the filesystem; `Auto` falls back to `Lj`.
pub fn pack_to_memory(
    data: &ZtrResultData,
    game: TextGame,
    options: ZtrOptions,
) -> Result<Vec<u8>> {
    encode(data, &Dialect::new(game, options.encoding, None), options.action)
}

pub fn extract_data(path: &Path, game: TextGame, encoding: TextEncoding) -> Result<ZtrResultData> {
    let bytes = fs::read(path)?;
    let data = decode(&bytes, &Dialect::new(game, encoding, Some(path)))?;
    tracing::info!("extracted {} entries from {}", data.entries.len(), path.display());
    Ok(data)
}

/// Decodes `path` into `<stem>.txt` beside it.
pub fn extract(path: &Path, game: TextGame, encoding: TextEncoding) -> Result<PathBuf> {
    let data = extract_data(path, game, encoding)?;
    let out = path.with_extension("txt");
    dump_data(&data, &out)?;
    Ok(out)
}

pub fn dump_data(data: &ZtrResultData, out: &Path) -> Result<()> {
    let text = dump::render(&data.entries);
    commit_all(vec![StagedFile::new(out)?.write_all(text.as_bytes())?], false)?;
    tracing::info!("wrote {} entries to {}", data.entries.len(), out.display());
    Ok(())
}

pub fn pack_data(
    data: &ZtrResultData,
    out: &Path,
    game: TextGame,
    options: ZtrOptions,
) -> Result<()> {
    let dialect = Dialect::new(game, options.encoding, Some(out));
    let bytes = encode(data, &dialect, options.action)?;
    commit_all(vec![StagedFile::new(out)?.write_all(&bytes)?], false)?;
    tracing::info!(
        "packed {} entries into {} ({} bytes, action {})",
        data.entries.len(),
        out.display(),
        bytes.len(),
        options.action
    );
    Ok(())
}

/// Packs a text dump into `<stem>.ztr` beside it.
pub fn convert(txt: &Path, game: TextGame, options: ZtrOptions) -> Result<PathBuf> {
    let entries = dump::parse(&fs::read_to_string(txt)?)?;
    let out = txt.with_extension("ztr");
    let data = ZtrResultData {
        entries,
        mappings: Vec::new(),
    };
    pack_data(&data, &out, game, options)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(entries: &[(&str, &str)]) -> ZtrResultData {
        ZtrResultData {
            entries: entries
                .iter()
                .map(|(id, text)| ZtrEntry {
                    id: id.to_string(),
                    text: text.to_string(),
                })
                .collect(),
            mappings: Vec::new(),
        }
    }

    #[test]
    fn switches_parse() {
        assert_eq!("c2".parse::<Action>().unwrap(), Action::C2);
        assert_eq!("Q".parse::<Action>().unwrap_err().code(), 6);
        assert_eq!(ZtrOptions::default().action, Action::X);
    }

    #[test]
    fn decoded_tags_are_reported_as_mappings() {
        let input = data(&[("a", "{Btn A} to jump"), ("b", "{Color Gold}x{Btn A}")]);
        let bytes = pack_to_memory(&input, TextGame::Ff132, ZtrOptions::default()).unwrap();
        let back = parse_from_memory(&bytes, TextGame::Ff132, TextEncoding::Auto).unwrap();
        assert_eq!(back.entries, input.entries);
        let keys: Vec<_> = back.mappings.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, ["{Btn A}", "{Color Gold}"]);
        assert_eq!(back.mappings[0].value, "F140");

        // reporting the same mappings back in is a no-op
        let again = ZtrResultData {
            mappings: back.mappings.clone(),
            ..input
        };
        let bytes = pack_to_memory(&again, TextGame::Ff132, ZtrOptions::default()).unwrap();
        assert_eq!(
            parse_from_memory(&bytes, TextGame::Ff132, TextEncoding::Auto).unwrap(),
            back
        );
    }

    #[test]
    fn bad_mappings_and_ids_are_rejected() {
        let mut d = data(&[("a", "x")]);
        d.mappings = vec![ZtrKeyMapping {
            key: "{V}".into(),
            value: "zz".into(),
        }];
        let opts = ZtrOptions::default();
        assert_eq!(pack_to_memory(&d, TextGame::Ff131, opts).unwrap_err().code(), 6);
        d.mappings = vec![
            ZtrKeyMapping {
                key: "V".into(),
                value: "FA41".into(),
            },
            ZtrKeyMapping {
                key: "{V}".into(),
                value: "FA42".into(),
            },
        ];
        assert_eq!(pack_to_memory(&d, TextGame::Ff131, opts).unwrap_err().code(), 6);

        let dup = data(&[("a", "x"), ("a", "y")]);
        assert_eq!(pack_to_memory(&dup, TextGame::Ff131, opts).unwrap_err().code(), 6);
    }

    #[test]
    fn encoding_errors_name_the_entry() {
        let d = data(&[("greet", "안녕")]);
        let opts = ZtrOptions {
            encoding: TextEncoding::Ch,
            action: Action::C,
        };
        let err = pack_to_memory(&d, TextGame::Ff133, opts).unwrap_err();
        assert_eq!(err.code(), 4);
        assert!(err.to_string().contains("greet"));
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
        let d = data(&[("x", "{Icon Gil}")]);
        let bytes = pack_to_memory(&d, TextGame::Ff131, ZtrOptions::default()).unwrap();
        init();
        assert_eq!(
            parse_from_memory(&bytes, TextGame::Ff131, TextEncoding::Lj)
                .unwrap()
                .entries,
            d.entries
        );
    }
}
