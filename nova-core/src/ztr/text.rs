//! Line bytes <-> display text.

use super::Dialect;
use super::keys::LATIN_LEAD;
use crate::error::{NovaError, Result};
use std::collections::HashMap;

/// Control tags met while decoding, in first-seen order.
#[derive(Debug, Default)]
pub struct SeenTags {
    order: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
}

impl SeenTags {
    fn note(&mut self, tag: &str, bytes: &[u8]) {
        if !self.index.contains_key(tag) {
            self.index.insert(tag.to_string(), self.order.len());
            self.order.push((tag.to_string(), bytes.to_vec()));
        }
    }

    pub fn into_vec(self) -> Vec<(String, Vec<u8>)> {
        self.order
    }
}

fn placeholder(b: u8) -> String {
    format!("{{{}}}", hex::encode_upper([b]))
}

/// Bytes one codepage character starting with `lead` occupies, if `lead` can start one.
fn char_width(d: &Dialect, lead: u8) -> Option<usize> {
    if d.codepage == encoding_rs::SHIFT_JIS {
        match lead {
            0x81..=0x9F | 0xE0..=0xFC => Some(2),
            0xA1..=0xDF => Some(1),
            _ => None,
        }
    } else {
        match lead {
            0x81..=0xFE => Some(2),
            _ => None,
        }
    }
}

pub fn decode_line(bytes: &[u8], d: &Dialect, seen: &mut SeenTags) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(tag) = d.keys.single(b) {
            seen.note(tag, &bytes[i..=i]);
            out.push_str(tag);
            i += 1;
            continue;
        }
        if let Some(&next) = bytes.get(i + 1) {
            if let Some(tag) = d.keys.pair(b, next) {
                seen.note(tag, &bytes[i..i + 2]);
                out.push_str(tag);
                i += 2;
                continue;
            }
            if d.latin_ext && b == LATIN_LEAD {
                if let Some(c) = d.keys.latin(next) {
                    out.push(c);
                    i += 2;
                    continue;
                }
            }
        }
        match b {
            b'\t' | b'\n' | 0x20..=0x7E => {
                out.push(b as char);
                i += 1;
            }
            0x00..=0x7F => {
                out.push_str(&placeholder(b));
                i += 1;
            }
            _ => {
                let decoded = char_width(d, b)
                    .and_then(|w| bytes.get(i..i + w))
                    .and_then(|s| {
                        d.codepage
                            .decode_without_bom_handling_and_without_replacement(s)
                            .map(|text| (text.into_owned(), s.len()))
                    });
                match decoded {
                    Some((text, used)) => {
                        out.push_str(&text);
                        i += used;
                    }
                    None => {
                        tracing::warn!(
                            "byte {b:#04x} at {i} has no {} mapping, kept as {}",
                            d.codepage.name(),
                            placeholder(b)
                        );
                        out.push_str(&placeholder(b));
                        i += 1;
                    }
                }
            }
        }
    }
    out
}

fn raw_tag(tag: &str) -> Option<u8> {
    let hex = tag.strip_prefix('{')?.strip_suffix('}')?;
    if hex.len() != 2 {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// Encodes display text; `extra` holds caller-supplied tag definitions.
pub fn encode_line(text: &str, d: &Dialect, extra: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if c == '{' {
            if let Some(end) = rest.find('}') {
                let tag = &rest[..=end];
                let known = d
                    .keys
                    .bytes_for(tag)
                    .or_else(|| extra.get(tag).map(Vec::as_slice));
                if let Some(bytes) = known {
                    out.extend_from_slice(bytes);
                    rest = &rest[end + 1..];
                    continue;
                }
                if let Some(b) = raw_tag(tag) {
                    out.push(b);
                    rest = &rest[end + 1..];
                    continue;
                }
            }
        }
        rest = &rest[c.len_utf8()..];
        if c.is_ascii() {
            out.push(c as u8);
            continue;
        }
        if d.latin_ext {
            if let Some(trail) = d.keys.latin_trail(c) {
                out.extend_from_slice(&[LATIN_LEAD, trail]);
                continue;
            }
        }
        let mut buf = [0u8; 4];
        let (bytes, _, unmappable) = d.codepage.encode(c.encode_utf8(&mut buf));
        if unmappable {
            return Err(NovaError::Encoding(format!(
                "character {c:?} (U+{:04X}) has no {} encoding",
                c as u32,
                d.codepage.name()
            )));
        }
        out.extend_from_slice(&bytes);
    }
    if out.last() == Some(&0) || out.windows(2).any(|w| w == [0, 0]) {
        return Err(NovaError::InvalidArgument(format!(
            "text {text:?} would contain the line terminator"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::TextGame;
    use crate::ztr::TextEncoding;

    fn dialect(game: TextGame, enc: TextEncoding) -> Dialect {
        Dialect::new(game, enc, None)
    }

    #[test]
    fn tags_and_plain_text_round_trip() {
        let d = dialect(TextGame::Ff131, TextEncoding::Lj);
        let line = [
            &b"Press "[..],
            &[0xF1, 0x40],
            b" now",
            b"@r",
            &[0xF9, 0x40],
            b"ok",
            &[0x02],
        ]
        .concat();
        let mut seen = SeenTags::default();
        let text = decode_line(&line, &d, &mut seen);
        assert_eq!(text, "Press {Btn A} now{Text NewLine}{Color White}ok{Italic}");
        let tags: Vec<_> = seen.into_vec().into_iter().map(|(t, _)| t).collect();
        assert_eq!(tags, ["{Btn A}", "{Text NewLine}", "{Color White}", "{Italic}"]);
        assert_eq!(encode_line(&text, &d, &HashMap::new()).unwrap(), line);
    }

    #[test]
    fn japanese_and_latin_extensions() {
        let d = dialect(TextGame::Ff132, TextEncoding::Lj);
        let bytes = encode_line("ライトニング café", &d, &HashMap::new()).unwrap();
        assert!(bytes.ends_with(&[b'c', b'a', b'f', 0x85, 0xC8]));
        let text = decode_line(&bytes, &d, &mut SeenTags::default());
        assert_eq!(text, "ライトニング café");
    }

    #[test]
    fn korean_needs_its_codepage() {
        let kr = dialect(TextGame::Ff133, TextEncoding::Kr);
        let bytes = encode_line("안녕", &kr, &HashMap::new()).unwrap();
        assert_eq!(decode_line(&bytes, &kr, &mut SeenTags::default()), "안녕");

        let lj = dialect(TextGame::Ff133, TextEncoding::Lj);
        let err = encode_line("안녕", &lj, &HashMap::new()).unwrap_err();
        assert_eq!(err.code(), 4);
    }

    #[test]
    fn unmappable_bytes_become_placeholders() {
        let d = dialect(TextGame::Ff131, TextEncoding::Lj);
        let line = [b'a', 0x80, 0x07, b'b'];
        let text = decode_line(&line, &d, &mut SeenTags::default());
        assert_eq!(text, "a{80}{07}b");
        assert_eq!(encode_line(&text, &d, &HashMap::new()).unwrap(), line);
    }

    #[test]
    fn extra_tags_and_literal_braces() {
        let d = dialect(TextGame::Ff131, TextEncoding::Lj);
        let extra = HashMap::from([("{Var Name}".to_string(), vec![0xFA, 0x41])]);
        assert_eq!(
            encode_line("{Var Name}{not a tag}", &d, &extra).unwrap(),
            [&[0xFA, 0x41][..], b"{not a tag}"].concat()
        );
        assert_eq!(
            encode_line("a{00}{00}", &d, &extra).unwrap_err().code(),
            6
        );
    }
}
