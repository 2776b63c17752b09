use super::layout::*;
use super::value::*;
use super::words::{self, BitKind, Cell, Field, Slot};
use crate::error::{NovaError, Result};
use crate::game::DbGame;
use crate::util::bytes::Reader;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
struct Section<'a> {
    name: String,
    data: &'a [u8],
}

/// NUL-terminated strings addressed by byte offset.
struct Pool<'a>(&'a [u8]);

impl Pool<'_> {
    fn get(&self, at: u32) -> Result<String> {
        let tail = self
            .0
            .get(at as usize..)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NovaError::Format(format!("string offset {at} is outside the pool")))?;
        c_string(tail).map_err(|_| NovaError::Format(format!("string at offset {at} is not UTF-8")))
    }
}

fn c_string(bytes: &[u8]) -> std::result::Result<String, std::string::FromUtf8Error> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec())
}

fn u32_list(data: &[u8], what: &'static str) -> Result<Vec<u32>> {
    if data.len() % 4 != 0 {
        return Err(NovaError::Format(format!(
            "{what} is {} bytes, not a whole number of words",
            data.len()
        )));
    }
    let mut r = Reader::new(data);
    (0..data.len() / 4).map(|_| r.read_u32_be(what)).collect()
}

fn single_u32(data: &[u8], what: &'static str) -> Result<u32> {
    Reader::new(data).read_u32_be(what)
}

/// Decoded `!!strArray` lists, one per bit-packed string field.
struct StringArrays {
    lists: Vec<Vec<String>>,
    offsets_per_value: u32,
    bits_per_offset: u32,
}

fn read_string_arrays(
    sections: &[Section<'_>],
    pool: &Pool<'_>,
    array_fields: usize,
) -> Result<Option<StringArrays>> {
    let (Some(data), Some(info), Some(list)) = (
        find(sections, STRING_ARRAY_SECTION),
        find(sections, STRING_ARRAY_INFO_SECTION),
        find(sections, STRING_ARRAY_LIST_SECTION),
    ) else {
        return Ok(None);
    };
    let info = u32_list(info, "string array info")?;
    let [_, _, offsets_per_value, bits_per_offset] = info[..] else {
        return Err(NovaError::Format(format!(
            "{STRING_ARRAY_INFO_SECTION} holds {} words, expected 4",
            info.len()
        )));
    };
    if offsets_per_value == 0
        || bits_per_offset == 0
        || u64::from(offsets_per_value) * u64::from(bits_per_offset) > 32
    {
        return Err(NovaError::Format(format!(
            "{offsets_per_value} offsets of {bits_per_offset} bits do not fit a word"
        )));
    }
    let starts = u32_list(list, "string array list")?;
    if starts.len() != array_fields {
        return Err(NovaError::Format(format!(
            "{STRING_ARRAY_LIST_SECTION} has {} lists for {array_fields} string-array fields",
            starts.len()
        )));
    }

    let mut lists = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(data.len(), |&e| e as usize);
        let body = data
            .get(start as usize..end)
            .ok_or_else(|| NovaError::Format(format!("string array {i} runs outside its section")))?;
        let mut strings = Vec::new();
        for word in u32_list(body, "string array")? {
            for k in 0..offsets_per_value {
                let at = (word >> (k * bits_per_offset)) & words::mask(bits_per_offset);
                strings.push(pool.get(at)?);
            }
        }
        lists.push(strings);
    }
    Ok(Some(StringArrays {
        lists,
        offsets_per_value,
        bits_per_offset,
    }))
}

fn read_sections(data: &[u8]) -> Result<Vec<Section<'_>>> {
    let mut r = Reader::new(data);
    let magic = r.read_bytes(4, "file magic")?;
    if magic != MAGIC {
        return Err(NovaError::Format(format!(
            "not a WDB file (magic {})",
            hex::encode(magic)
        )));
    }
    let count = r.read_u32_be("section count")? as usize;
    r.read_bytes(8, "file header padding")?;
    if count > r.remaining_len() / SECTION_HEADER_LEN {
        return Err(NovaError::Format(format!("{count} sections do not fit the file")));
    }

    let mut sections = Vec::with_capacity(count);
    for _ in 0..count {
        let raw_name = r.read_bytes(SECTION_NAME_LEN, "section name")?;
        let end = raw_name.iter().position(|&b| b == 0).unwrap_or(SECTION_NAME_LEN);
        let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();
        let offset = r.read_u32_be("section offset")? as usize;
        let length = r.read_u32_be("section length")? as usize;
        r.read_bytes(8, "section padding")?;
        let mut body = Reader::at(data, offset, "section body")?;
        sections.push(Section {
            data: body
                .read_bytes(length, "section body")
                .map_err(|_| NovaError::Format(format!("section {name} runs past the file end")))?,
            name,
        });
    }
    Ok(sections)
}

fn find<'a>(sections: &[Section<'a>], name: &str) -> Option<&'a [u8]> {
    sections.iter().find(|s| s.name == name).map(|s| s.data)
}

pub fn parse(path: &Path, game: DbGame) -> Result<WdbFile> {
    let data = fs::read(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = parse_bytes(&name, &data, game)?;
    tracing::info!(
        "parsed {} ({} header entries, {} records)",
        path.display(),
        file.header.len(),
        file.records.len()
    );
    Ok(file)
}

pub fn parse_bytes(name: &str, data: &[u8], game: DbGame) -> Result<WdbFile> {
    let layout = Layout::for_game(game);
    let sections = read_sections(data)?;
    let (reserved, rows): (Vec<_>, Vec<_>) =
        sections.into_iter().partition(|s| is_reserved(&s.name));
    for s in &reserved {
        if !KNOWN_SECTIONS.contains(&s.name.as_str()) {
            tracing::warn!("{name}: skipping unrecognised section {}", s.name);
        }
    }
    let pool = Pool(find(&reserved, STRING_SECTION).unwrap_or(&[]));

    let (word_types, compact) = match (
        find(&reserved, WORD_TYPES_SECTION),
        find(&reserved, WORD_TYPES_COMPACT_SECTION),
    ) {
        (Some(b), _) => (u32_list(b, "word type list")?, false),
        (None, Some(b)) => (b.iter().map(|&t| u32::from(t)).collect(), true),
        (None, None) => (Vec::new(), layout.compact_word_types),
    };
    if let Some(&code) = word_types.iter().find(|&&c| c > u32::from(u16::MAX)) {
        return Err(NovaError::Format(format!("word type {code} is out of range")));
    }
    for code in word_types.iter().filter(|&&c| c > words::WORD_UINT) {
        tracing::warn!("{name}: unknown word type {code}, keeping its words raw");
    }

    let names = match find(&reserved, FIELD_NAMES_SECTION) {
        Some(b) if layout.pooled_field_names => u32_list(b, "field name offsets")?
            .into_iter()
            .map(|at| pool.get(at))
            .collect::<Result<Vec<_>>>()?,
        Some(b) => b
            .split(|&c| c == 0)
            .take_while(|n| !n.is_empty())
            .map(|n| {
                String::from_utf8(n.to_vec())
                    .map_err(|_| NovaError::Format("field name is not UTF-8".into()))
            })
            .collect::<Result<Vec<_>>>()?,
        None => words::placeholder_names(&word_types),
    };
    if let Some(b) = find(&reserved, FIELD_COUNT_SECTION) {
        let count = single_u32(b, "field count")?;
        if count as usize != names.len() {
            return Err(NovaError::Format(format!(
                "{FIELD_COUNT_SECTION} says {count} fields, {} are named",
                names.len()
            )));
        }
    }
    let fields = names
        .iter()
        .map(|n| {
            Field::parse(n)
                .ok_or_else(|| NovaError::Format(format!("field {n} is wider than a word")))
        })
        .collect::<Result<Vec<_>>>()?;
    let slots = words::plan(&word_types, &fields).map_err(NovaError::Format)?;

    let array_fields = words::array_fields(&slots);
    let arrays = read_string_arrays(&reserved, &pool, array_fields.len())?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let record = decode_record(row, &fields, &slots, &array_fields, arrays.as_ref(), &pool)
            .map_err(|e| match e {
                NovaError::Format(m) => NovaError::Format(format!("record {}: {m}", row.name)),
                other => other,
            })?;
        records.push(record);
    }

    let mut header = Vec::new();
    if let Some(b) = find(&reserved, SHEET_NAME_SECTION) {
        let sheet = c_string(b).map_err(|_| NovaError::Format("sheet name is not UTF-8".into()))?;
        header.push(WdbEntry::new(KEY_SHEET_NAME, WdbValue::String(sheet)));
    }
    let version = find(&reserved, VERSION_SECTION)
        .map(|b| single_u32(b, "version"))
        .transpose()?
        .unwrap_or(0);
    header.push(WdbEntry::new(KEY_VERSION, WdbValue::Uint(version)));
    if let Some(b) = find(&reserved, TYPE_LIST_SECTION) {
        let list: Vec<i32> = u32_list(b, "type list")?.into_iter().map(|v| v as i32).collect();
        if !list.is_empty() {
            header.push(WdbEntry::new(KEY_TYPE_LIST, WdbValue::IntArray(list)));
        }
    }
    if compact != layout.compact_word_types {
        header.push(WdbEntry::new(KEY_COMPACT_WORD_TYPES, WdbValue::Bool(compact)));
    }
    let implied = records.first().and_then(|r: &WdbRecord| {
        let values: Vec<&WdbValue> = r[1..].iter().map(|e| &e.value).collect();
        words::derive_word_types(&fields, &values).ok()
    });
    if !word_types.is_empty() && implied.as_ref() != Some(&word_types) {
        header.push(WdbEntry::new(KEY_WORD_TYPES, WdbValue::UintArray(word_types.clone())));
    }
    if let Some(a) = &arrays
        && (a.offsets_per_value, a.bits_per_offset)
            != (DEFAULT_OFFSETS_PER_VALUE, DEFAULT_BITS_PER_OFFSET)
    {
        header.push(WdbEntry::new(KEY_OFFSETS_PER_VALUE, WdbValue::Uint(a.offsets_per_value)));
        header.push(WdbEntry::new(KEY_BITS_PER_OFFSET, WdbValue::Uint(a.bits_per_offset)));
    }
    if records.is_empty() && !names.is_empty() {
        header.push(WdbEntry::new(KEY_FIELD_NAMES, WdbValue::StringArray(names)));
    }
    tracing::trace!(
        "{name}: {} reserved sections, {} fields in {} words",
        reserved.len(),
        fields.len(),
        word_types.len()
    );

    Ok(WdbFile {
        name: name.to_string(),
        header,
        records,
    })
}

const KNOWN_SECTIONS: [&str; 11] = [
    SHEET_NAME_SECTION,
    STRING_SECTION,
    WORD_TYPES_SECTION,
    WORD_TYPES_COMPACT_SECTION,
    TYPE_LIST_SECTION,
    VERSION_SECTION,
    FIELD_NAMES_SECTION,
    FIELD_COUNT_SECTION,
    STRING_ARRAY_SECTION,
    STRING_ARRAY_INFO_SECTION,
    STRING_ARRAY_LIST_SECTION,
];

fn decode_record(
    row: &Section<'_>,
    fields: &[Field],
    slots: &[Slot],
    array_fields: &[usize],
    arrays: Option<&StringArrays>,
    pool: &Pool<'_>,
) -> Result<WdbRecord> {
    let word_count = slots.last().map_or(0, |s| s.word + 1);
    if row.data.len() < word_count * 4 {
        return Err(NovaError::Format(format!(
            "{} bytes, expected {} words",
            row.data.len(),
            word_count
        )));
    }
    let record_words = u32_list(&row.data[..word_count * 4], "record word")?;

    let mut record = Vec::with_capacity(fields.len() + 1);
    record.push(WdbEntry::new(RECORD_KEY, WdbValue::String(row.name.clone())));
    for (i, (field, slot)) in fields.iter().zip(slots).enumerate() {
        let word = record_words[slot.word];
        let value = match slot.cell {
            Cell::Bits { kind, shift, width } => {
                let raw = (word >> shift) & words::mask(width);
                match kind {
                    BitKind::Signed => WdbValue::Int(words::sign_extend(raw, width)),
                    BitKind::Raw => WdbValue::Int(raw as i32),
                    BitKind::Unsigned => WdbValue::Uint(raw),
                    BitKind::StringIndex => {
                        let list = array_fields
                            .iter()
                            .position(|&f| f == i)
                            .and_then(|n| arrays.map(|a| &a.lists[n]))
                            .ok_or_else(|| {
                                NovaError::Format(format!("no string array for field {}", field.name))
                            })?;
                        let s = list.get(raw as usize).ok_or_else(|| {
                            NovaError::Format(format!(
                                "field {} indexes entry {raw} of {}",
                                field.name,
                                list.len()
                            ))
                        })?;
                        WdbValue::String(s.clone())
                    }
                }
            }
            Cell::Float => WdbValue::Float(f32::from_bits(word)),
            Cell::String => WdbValue::String(pool.get(word)?),
            Cell::Uint => WdbValue::Uint(word),
            Cell::Unknown(code) => WdbValue::Unknown {
                tag: code as u16,
                raw: word.to_be_bytes().to_vec(),
            },
        };
        record.push(WdbEntry::new(field.name.clone(), value));
    }
    Ok(record)
}
