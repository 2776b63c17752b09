//! How named fields map onto the big-endian 32-bit words of a record.
//!
//! Every record word has a type code from the word-type list. Code 0 packs
//! several narrow fields LSB-first; a field whose width does not fit the rest
//! of the word starts the next one. The field name says how packed bits read:
//! `i8Level` is signed, `u4Role` unsigned, `s8Name` an index into the field's
//! string array, and a name without digits is 32 bits wide.

use super::value::WdbValue;

pub const WORD_PACKED: u32 = 0;
pub const WORD_FLOAT: u32 = 1;
pub const WORD_STRING: u32 = 2;
pub const WORD_UINT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitKind {
    /// `i` and `f` names.
    Signed,
    /// `u` names.
    Unsigned,
    /// `s` names: index into the field's `!!strArray` list.
    StringIndex,
    /// Any other leading letter: the bits as a non-negative int.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: BitKind,
    /// Width spelled in the name, 0 when it has none.
    pub declared: u32,
}

impl Field {
    /// `None` when the name spells a width past 32 bits.
    pub fn parse(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let kind = match chars.next() {
            Some('i' | 'f') => BitKind::Signed,
            Some('u') => BitKind::Unsigned,
            Some('s') => BitKind::StringIndex,
            _ => BitKind::Raw,
        };
        let digits: String = chars.take_while(char::is_ascii_digit).take(2).collect();
        let declared = digits.parse().unwrap_or(0);
        (declared <= 32).then(|| Field {
            name: name.to_string(),
            kind,
            declared,
        })
    }

    pub fn width(&self) -> u32 {
        if self.declared == 0 { 32 } else { self.declared }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Bits { kind: BitKind, shift: u32, width: u32 },
    Float,
    String,
    Uint,
    Unknown(u32),
}

impl Cell {
    /// Whether `value` is what a reader produces for this cell.
    pub fn accepts(&self, value: &WdbValue) -> bool {
        match (self, value) {
            (
                Cell::Bits {
                    kind: BitKind::Signed | BitKind::Raw,
                    ..
                },
                WdbValue::Int(_),
            ) => true,
            (
                Cell::Bits {
                    kind: BitKind::Unsigned,
                    ..
                }
                | Cell::Uint,
                WdbValue::Uint(_),
            ) => true,
            (
                Cell::Bits {
                    kind: BitKind::StringIndex,
                    ..
                }
                | Cell::String,
                WdbValue::String(_),
            ) => true,
            (Cell::Float, WdbValue::Float(_)) => true,
            (Cell::Unknown(code), WdbValue::Unknown { tag, raw }) => {
                u32::from(*tag) == *code && raw.len() == 4
            }
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Cell::Bits { kind, width, .. } => {
                let what = match kind {
                    BitKind::Signed | BitKind::Raw => "int",
                    BitKind::Unsigned => "uint",
                    BitKind::StringIndex => "string-array index",
                };
                format!("{width}-bit packed {what}")
            }
            Cell::Float => "float word".into(),
            Cell::String => "string word".into(),
            Cell::Uint => "uint word".into(),
            Cell::Unknown(code) => format!("4-byte word of type {code}"),
        }
    }
}

/// Where one field lives in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub word: usize,
    pub cell: Cell,
}

/// Assigns fields to words the way a reader walks them. Every word must hold
/// at least one field and every field must land in a word.
pub fn plan(word_types: &[u32], fields: &[Field]) -> Result<Vec<Slot>, String> {
    let mut slots = Vec::with_capacity(fields.len());
    let mut next = 0;
    for (word, &code) in word_types.iter().enumerate() {
        if next == fields.len() {
            return Err(format!(
                "{} word types but the {} fields run out at word {word}",
                word_types.len(),
                fields.len()
            ));
        }
        let cell = match code {
            WORD_PACKED => {
                let mut used = 0;
                while let Some(field) = fields.get(next) {
                    let width = field.width();
                    if used + width > 32 {
                        break;
                    }
                    slots.push(Slot {
                        word,
                        cell: Cell::Bits {
                            kind: field.kind,
                            shift: used,
                            width,
                        },
                    });
                    used += width;
                    next += 1;
                }
                continue;
            }
            WORD_FLOAT => Cell::Float,
            WORD_STRING => Cell::String,
            WORD_UINT => Cell::Uint,
            other => Cell::Unknown(other),
        };
        slots.push(Slot { word, cell });
        next += 1;
    }
    if next < fields.len() {
        return Err(format!(
            "{} fields but the {} word types end at field {}",
            fields.len(),
            word_types.len(),
            fields[next].name
        ));
    }
    Ok(slots)
}

/// Field indexes whose packed bits index a string array, in field order.
pub fn array_fields(slots: &[Slot]) -> Vec<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            matches!(
                s.cell,
                Cell::Bits {
                    kind: BitKind::StringIndex,
                    ..
                }
            )
        })
        .map(|(i, _)| i)
        .collect()
}

/// Word types implied by one record's values, packing narrow ints greedily.
pub fn derive_word_types(fields: &[Field], values: &[&WdbValue]) -> Result<Vec<u32>, String> {
    let mut types = Vec::new();
    let mut open: Option<u32> = None;
    for (field, value) in fields.iter().zip(values) {
        let packed = match value {
            WdbValue::Int(_) => true,
            WdbValue::Uint(_) => field.kind == BitKind::Unsigned && field.declared > 0,
            WdbValue::String(_) => field.kind == BitKind::StringIndex && field.declared > 0,
            WdbValue::Float(_) | WdbValue::Unknown { .. } => false,
            other => {
                return Err(format!(
                    "field {} holds a {}, which no record word can store",
                    field.name,
                    other.type_name()
                ));
            }
        };
        if packed {
            let width = field.width();
            match open {
                Some(used) if used + width <= 32 => open = Some(used + width),
                _ => {
                    types.push(WORD_PACKED);
                    open = Some(width);
                }
            }
            continue;
        }
        open = None;
        types.push(match value {
            WdbValue::Float(_) => WORD_FLOAT,
            WdbValue::String(_) => WORD_STRING,
            WdbValue::Unknown { tag, .. } => u32::from(*tag),
            _ => WORD_UINT,
        });
    }
    Ok(types)
}

/// Names for files that carry no `!structitem`, one per word.
pub fn placeholder_names(word_types: &[u32]) -> Vec<String> {
    word_types
        .iter()
        .enumerate()
        .map(|(n, &code)| {
            let prefix = match code {
                WORD_PACKED => 'i',
                WORD_FLOAT => 'f',
                WORD_STRING => 's',
                WORD_UINT => 'u',
                _ => 'x',
            };
            format!("{prefix}Field{n}")
        })
        .collect()
}

pub fn mask(width: u32) -> u32 {
    if width >= 32 { u32::MAX } else { (1 << width) - 1 }
}

pub fn sign_extend(raw: u32, width: u32) -> i32 {
    let s = 32 - width;
    ((raw << s) as i32) >> s
}

/// Bits for an int cell, or `None` if `v` does not fit.
pub fn pack_int(kind: BitKind, width: u32, v: i32) -> Option<u32> {
    if width == 32 {
        return Some(v as u32);
    }
    let fits = match kind {
        BitKind::Signed => {
            let half = 1i64 << (width - 1);
            (-half..half).contains(&i64::from(v))
        }
        _ => v >= 0 && (v as u32) <= mask(width),
    };
    fits.then_some(v as u32 & mask(width))
}
