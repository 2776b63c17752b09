//! The `id |:| text` dump format.

use super::ZtrEntry;
use crate::error::{NovaError, Result};

pub const SEPARATOR: &str = " |:| ";

pub fn render(entries: &[ZtrEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        out.push_str(&e.id);
        out.push_str(SEPARATOR);
        out.push_str(&e.text);
        out.push('\n');
    }
    out
}

/// Parses a dump; lines without the separator continue the previous text.
pub fn parse(text: &str) -> Result<Vec<ZtrEntry>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut entries: Vec<ZtrEntry> = Vec::new();
    for (n, line) in text.lines().enumerate() {
        match line.split_once(SEPARATOR) {
            Some((id, body)) => entries.push(ZtrEntry {
                id: id.to_string(),
                text: body.to_string(),
            }),
            None => match entries.last_mut() {
                Some(prev) => {
                    prev.text.push('\n');
                    prev.text.push_str(line);
                }
                None if line.trim().is_empty() => {}
                None => {
                    return Err(NovaError::Format(format!(
                        "line {} has no {SEPARATOR:?} and follows no entry",
                        n + 1
                    )));
                }
            },
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, text: &str) -> ZtrEntry {
        ZtrEntry {
            id: id.into(),
            text: text.into(),
        }
    }

    #[test]
    fn multi_line_text_survives() {
        let entries = vec![
            entry("$a", "one"),
            entry("$b", "two\nlines"),
            entry("$c", ""),
        ];
        let text = render(&entries);
        assert_eq!(text, "$a |:| one\n$b |:| two\nlines\n$c |:| \n");
        assert_eq!(parse(&text).unwrap(), entries);
    }

    #[test]
    fn crlf_and_bom_are_tolerated() {
        let parsed = parse("\u{feff}$a |:| x\r\n$b |:| y\r\n").unwrap();
        assert_eq!(parsed, [entry("$a", "x"), entry("$b", "y")]);
        assert_eq!(parse("stray\n$a |:| x").unwrap_err().code(), 1);
    }
}
