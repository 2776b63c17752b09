//! Byte-pair dictionaries used to shrink ZTR chunks.
//!
//! A dictionary maps "page" bytes that never occur in the chunk to a pair of
//! bytes; a pair may itself contain earlier pages, so expansion recurses.

use super::Action;
use crate::error::{NovaError, Result};
use crate::util::bytes::Reader;
use std::collections::{BTreeMap, HashMap};

/// Longest expansion the compressor lets a page produce, so that an offset
/// inside it fits the one-byte `chara_start`.
pub const MAX_EXPANSION: usize = 255;

/// Longest expansion accepted on read: one page cannot outgrow the chunk it
/// decodes.
pub const MAX_READ_EXPANSION: usize = super::format::CHUNK_SIZE;

/// Which on-disk dictionary scheme a file uses, identified by its magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `len u32` in bytes, then `[page, b1, b2]` triples.
    Paged = 1,
    /// `count u32` in entries, then `[b1, b2, page]` triples.
    Counted = 2,
}

impl Scheme {
    pub fn for_action(action: Action) -> Self {
        match action {
            Action::X | Action::C => Scheme::Paged,
            Action::C2 => Scheme::Counted,
        }
    }

    pub fn from_magic(magic: u64) -> Result<Self> {
        match magic {
            1 => Ok(Scheme::Paged),
            2 => Ok(Scheme::Counted),
            other => Err(NovaError::Format(format!("unknown ZTR magic {other:#x}"))),
        }
    }

    pub fn magic(self) -> u64 {
        self as u64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    /// In definition order; later entries may refer to earlier pages.
    pub entries: Vec<(u8, [u8; 2])>,
}

impl Dictionary {
    pub fn read(r: &mut Reader<'_>, scheme: Scheme) -> Result<Self> {
        let count = match scheme {
            Scheme::Paged => {
                let len = r.read_u32_be("dictionary length")? as usize;
                if len % 3 != 0 {
                    return Err(NovaError::Format(format!(
                        "dictionary length {len} is not a multiple of 3"
                    )));
                }
                len / 3
            }
            Scheme::Counted => r.read_u32_be("dictionary entry count")? as usize,
        };
        if count > 256 || count * 3 > r.remaining_len() {
            return Err(NovaError::Format(format!(
                "dictionary of {count} entries overruns its chunk"
            )));
        }
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let t = r.read_bytes(3, "dictionary entry")?;
            entries.push(match scheme {
                Scheme::Paged => (t[0], [t[1], t[2]]),
                Scheme::Counted => (t[2], [t[0], t[1]]),
            });
        }
        Ok(Dictionary { entries })
    }

    pub fn write(&self, out: &mut Vec<u8>, scheme: Scheme) {
        let prefix = match scheme {
            Scheme::Paged => self.entries.len() * 3,
            Scheme::Counted => self.entries.len(),
        };
        out.extend_from_slice(&(prefix as u32).to_be_bytes());
        for (page, [b1, b2]) in &self.entries {
            match scheme {
                Scheme::Paged => out.extend_from_slice(&[*page, *b1, *b2]),
                Scheme::Counted => out.extend_from_slice(&[*b1, *b2, *page]),
            }
        }
    }

    /// Full expansion of every byte value; bytes without an entry expand to themselves.
    pub fn expansions(&self) -> Result<Vec<Vec<u8>>> {
        let mut table: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
        for (page, pair) in &self.entries {
            let mut exp = table[pair[0] as usize].clone();
            exp.extend_from_slice(&table[pair[1] as usize]);
            if exp.len() > MAX_READ_EXPANSION {
                return Err(NovaError::Format(format!(
                    "page {page:#04x} expands to {} bytes",
                    exp.len()
                )));
            }
            table[*page as usize] = exp;
        }
        Ok(table)
    }
}

/// Rules that distinguish the two substitution schemes.
struct Rules {
    pages: Vec<u8>,
    overlapping: bool,
    min_count: usize,
}

impl Rules {
    fn for_action(action: Action, data: &[u8]) -> Option<Self> {
        let mut used = [false; 256];
        for &b in data {
            used[b as usize] = true;
        }
        let free = (0..=255u8).filter(|&b| !used[b as usize]);
        match action {
            Action::X => None,
            Action::C => Some(Rules {
                pages: free.filter(|&b| b != 0x08).collect(),
                overlapping: false,
                min_count: 4,
            }),
            Action::C2 => Some(Rules {
                pages: free.rev().collect(),
                overlapping: true,
                min_count: 3,
            }),
        }
    }

    /// Most frequent pair whose expansion still fits; ties go to the earliest for
    /// non-overlapping counts and to the smallest pair otherwise.
    fn best_pair(&self, data: &[u8], lens: &[usize; 256]) -> Option<[u8; 2]> {
        let fits = |p: [u8; 2]| lens[p[0] as usize] + lens[p[1] as usize] <= MAX_EXPANSION;
        if self.overlapping {
            let mut counts: BTreeMap<[u8; 2], usize> = BTreeMap::new();
            for w in data.windows(2) {
                *counts.entry([w[0], w[1]]).or_default() += 1;
            }
            let mut best: Option<([u8; 2], usize)> = None;
            for (pair, n) in counts {
                if fits(pair) && best.is_none_or(|(_, m)| n > m) {
                    best = Some((pair, n));
                }
            }
            best.filter(|&(_, n)| n >= self.min_count).map(|(p, _)| p)
        } else {
            // (count, next position a new match may start at)
            let mut counts: HashMap<[u8; 2], (usize, usize)> = HashMap::new();
            let mut order = Vec::new();
            for (i, w) in data.windows(2).enumerate() {
                let pair = [w[0], w[1]];
                let slot = counts.entry(pair).or_insert_with(|| {
                    order.push(pair);
                    (0, 0)
                });
                if i >= slot.1 {
                    slot.0 += 1;
                    slot.1 = i + 2;
                }
            }
            let mut best: Option<([u8; 2], usize)> = None;
            for pair in order {
                let n = counts[&pair].0;
                if fits(pair) && best.is_none_or(|(_, m)| n > m) {
                    best = Some((pair, n));
                }
            }
            best.filter(|&(_, n)| n >= self.min_count).map(|(p, _)| p)
        }
    }
}

fn substitute(data: &[u8], pair: [u8; 2], page: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if i + 1 < data.len() && data[i] == pair[0] && data[i + 1] == pair[1] {
            out.push(page);
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

/// Compresses one chunk with `action`, returning its dictionary and body.
pub fn compress(data: &[u8], action: Action) -> (Dictionary, Vec<u8>) {
    let Some(rules) = Rules::for_action(action, data) else {
        return (Dictionary::default(), data.to_vec());
    };
    let mut dict = Dictionary::default();
    let mut body = data.to_vec();
    let mut lens = [1usize; 256];
    for &page in &rules.pages {
        let Some(pair) = rules.best_pair(&body, &lens) else {
            break;
        };
        lens[page as usize] = lens[pair[0] as usize] + lens[pair[1] as usize];
        body = substitute(&body, pair, page);
        dict.entries.push((page, pair));
    }
    tracing::trace!(
        "{action:?}: {} -> {} bytes with {} pages",
        data.len(),
        body.len(),
        dict.entries.len()
    );
    (dict, body)
}
