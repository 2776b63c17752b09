use super::layout::*;
use super::value::*;
use super::words::{self, BitKind, Cell, Field, Slot};
use crate::error::{NovaError, Result};
use crate::game::DbGame;
use crate::util::bytes::align_up;
use crate::util::files::{StagedFile, commit_all};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// De-duplicating NUL-terminated pool; offset 0 is always the empty string.
struct StringPool {
    bytes: Vec<u8>,
    seen: HashMap<String, u32>,
}

impl StringPool {
    fn new() -> Self {
        Self {
            bytes: vec![0],
            seen: HashMap::new(),
        }
    }

    fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(&at) = self.seen.get(s) {
            return at;
        }
        let at = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.seen.insert(s.to_string(), at);
        at
    }
}

/// Header entries by key, checked for kind.
#[derive(Default)]
struct Header<'a> {
    sheet_name: Option<&'a str>,
    version: Option<u32>,
    type_list: Option<&'a [i32]>,
    compact_word_types: Option<bool>,
    word_types: Option<&'a [u32]>,
    offsets_per_value: Option<u32>,
    bits_per_offset: Option<u32>,
    field_names: Option<&'a [String]>,
}

impl<'a> Header<'a> {
    fn read(entries: &'a [WdbEntry]) -> Result<Self> {
        fn set<T>(slot: &mut Option<T>, key: &str, v: T) -> Result<()> {
            if slot.replace(v).is_some() {
                return Err(NovaError::Schema(format!("duplicate header key {key}")));
            }
            Ok(())
        }
        let mut h = Header::default();
        for e in entries {
            let key = e.key.as_str();
            match (key, &e.value) {
                (KEY_SHEET_NAME, WdbValue::String(s)) => set(&mut h.sheet_name, key, s.as_str())?,
                (KEY_VERSION, WdbValue::Uint(v)) => set(&mut h.version, key, *v)?,
                (KEY_TYPE_LIST, WdbValue::IntArray(v)) => set(&mut h.type_list, key, v.as_slice())?,
                (KEY_COMPACT_WORD_TYPES, WdbValue::Bool(b)) => {
                    set(&mut h.compact_word_types, key, *b)?
                }
                (KEY_WORD_TYPES, WdbValue::UintArray(v)) => {
                    set(&mut h.word_types, key, v.as_slice())?
                }
                (KEY_OFFSETS_PER_VALUE, WdbValue::Uint(v)) => {
                    set(&mut h.offsets_per_value, key, *v)?
                }
                (KEY_BITS_PER_OFFSET, WdbValue::Uint(v)) => set(&mut h.bits_per_offset, key, *v)?,
                (KEY_FIELD_NAMES, WdbValue::StringArray(v)) => {
                    set(&mut h.field_names, key, v.as_slice())?
                }
                (
                    KEY_SHEET_NAME | KEY_VERSION | KEY_TYPE_LIST | KEY_COMPACT_WORD_TYPES
                    | KEY_WORD_TYPES | KEY_OFFSETS_PER_VALUE | KEY_BITS_PER_OFFSET
                    | KEY_FIELD_NAMES,
                    other,
                ) => {
                    return Err(NovaError::Schema(format!(
                        "header {key} cannot be a {}",
                        other.type_name()
                    )));
                }
                _ => return Err(NovaError::Schema(format!("unknown header key {key}"))),
            }
        }
        Ok(h)
    }
}

/// Everything `to_bytes` needs once the file has been checked.
struct Schema<'a> {
    header: Header<'a>,
    compact: bool,
    fields: Vec<Field>,
    word_types: Vec<u32>,
    slots: Vec<Slot>,
    /// Section name and field cells of every record.
    rows: Vec<(String, &'a [WdbEntry])>,
    offsets_per_value: u32,
    bits_per_offset: u32,
}

fn no_nul(what: &str, s: &str) -> Result<()> {
    if s.contains('\0') {
        return Err(NovaError::InvalidArgument(format!("{what} contains a NUL byte")));
    }
    Ok(())
}

fn split_record(i: usize, record: &[WdbEntry]) -> Result<(String, &[WdbEntry])> {
    let (name, cells) = match record.split_first() {
        Some((first, rest)) if first.key == RECORD_KEY => match &first.value {
            WdbValue::String(s) => (s.clone(), rest),
            other => {
                return Err(NovaError::Schema(format!(
                    "record {i}: name must be a string, found {}",
                    other.type_name()
                )));
            }
        },
        _ => (format!("{i:04}"), record),
    };
    if name.is_empty() || name.len() > SECTION_NAME_LEN || is_reserved(&name) {
        return Err(NovaError::Schema(format!(
            "record {i}: {name:?} is not a usable section name"
        )));
    }
    no_nul("record name", &name)?;
    Ok((name, cells))
}

fn check(game: DbGame, file: &WdbFile) -> Result<Schema<'_>> {
    let layout = Layout::for_game(game);
    let header = Header::read(&file.header)?;
    if header.version.is_none() {
        return Err(NovaError::Schema(format!("header has no {KEY_VERSION} entry")));
    }
    if let Some(sheet) = header.sheet_name {
        no_nul("sheet name", sheet)?;
    }

    let mut rows = Vec::with_capacity(file.records.len());
    let mut seen = HashSet::new();
    for (i, record) in file.records.iter().enumerate() {
        let (name, cells) = split_record(i, record)?;
        if !seen.insert(name.clone()) {
            return Err(NovaError::Schema(format!("duplicate record name {name}")));
        }
        rows.push((name, cells));
    }

    let names: Vec<&str> = match (rows.first(), header.field_names) {
        (Some((_, first)), given) => {
            let keys: Vec<&str> = first.iter().map(|e| e.key.as_str()).collect();
            if given.is_some_and(|g| !g.iter().eq(keys.iter().copied())) {
                return Err(NovaError::Schema(format!(
                    "header {KEY_FIELD_NAMES} disagrees with the record fields"
                )));
            }
            keys
        }
        (None, Some(given)) => given.iter().map(String::as_str).collect(),
        (None, None) => Vec::new(),
    };
    let mut unique = HashSet::new();
    let mut fields = Vec::with_capacity(names.len());
    for name in &names {
        if name.is_empty() || !unique.insert(*name) {
            return Err(NovaError::Schema(format!("field name {name:?} is empty or repeated")));
        }
        no_nul("field name", name)?;
        fields.push(
            Field::parse(name)
                .ok_or_else(|| NovaError::Schema(format!("field {name} is wider than a word")))?,
        );
    }

    let word_types = match (header.word_types, rows.first()) {
        (Some(given), _) => given.to_vec(),
        (None, Some((_, first))) => {
            let values: Vec<&WdbValue> = first.iter().map(|e| &e.value).collect();
            words::derive_word_types(&fields, &values).map_err(NovaError::Schema)?
        }
        (None, None) => Vec::new(),
    };
    let compact = header
        .compact_word_types
        .unwrap_or(layout.compact_word_types);
    let limit = if compact { u32::from(u8::MAX) } else { u32::from(u16::MAX) };
    if let Some(code) = word_types.iter().find(|&&c| c > limit) {
        return Err(NovaError::Schema(format!("word type {code} does not fit the type list")));
    }
    let slots = words::plan(&word_types, &fields).map_err(NovaError::Schema)?;

    let array_fields = words::array_fields(&slots);
    if !array_fields.is_empty() && !layout.string_arrays {
        return Err(NovaError::Schema(format!(
            "{game} databases have no string-array fields ({})",
            fields[array_fields[0]].name
        )));
    }
    if array_fields.is_empty()
        && (header.offsets_per_value.is_some() || header.bits_per_offset.is_some())
    {
        return Err(NovaError::Schema(format!(
            "{KEY_OFFSETS_PER_VALUE}/{KEY_BITS_PER_OFFSET} given without string-array fields"
        )));
    }
    let offsets_per_value = header
        .offsets_per_value
        .unwrap_or(DEFAULT_OFFSETS_PER_VALUE);
    let bits_per_offset = header.bits_per_offset.unwrap_or(DEFAULT_BITS_PER_OFFSET);
    if offsets_per_value == 0
        || bits_per_offset == 0
        || u64::from(offsets_per_value) * u64::from(bits_per_offset) > 32
    {
        return Err(NovaError::Schema(format!(
            "{offsets_per_value} offsets of {bits_per_offset} bits do not fit a word"
        )));
    }

    for (name, cells) in &rows {
        if cells.len() != fields.len() {
            return Err(NovaError::Schema(format!(
                "record {name} has {} fields, expected {}",
                cells.len(),
                fields.len()
            )));
        }
        for ((e, field), slot) in cells.iter().zip(&fields).zip(&slots) {
            if e.key != field.name {
                return Err(NovaError::Schema(format!(
                    "record {name}: found field {} where {} belongs",
                    e.key, field.name
                )));
            }
            if !slot.cell.accepts(&e.value) {
                return Err(NovaError::Schema(format!(
                    "record {name} field {}: a {} does not fit a {}",
                    e.key,
                    e.value.type_name(),
                    slot.cell.describe()
                )));
            }
            if let WdbValue::String(s) = &e.value {
                no_nul("record string", s)?;
            }
        }
    }

    Ok(Schema {
        header,
        compact,
        fields,
        word_types,
        slots,
        rows,
        offsets_per_value,
        bits_per_offset,
    })
}

/// Checks `file` against the word layout its header and first record imply.
pub fn validate(game: DbGame, file: &WdbFile) -> Result<()> {
    check(game, file).map(|_| ())
}

fn words_to_bytes(words: impl IntoIterator<Item = u32>) -> Vec<u8> {
    words.into_iter().flat_map(u32::to_be_bytes).collect()
}

/// Per-field string lists in first-seen order, packed into `!!strArray`.
struct ArrayTables {
    lists: Vec<Vec<String>>,
    data: Vec<u8>,
    starts: Vec<u32>,
}

fn build_string_arrays(schema: &Schema<'_>, pool: &mut StringPool) -> Result<ArrayTables> {
    let array_fields = words::array_fields(&schema.slots);
    let mut lists: Vec<Vec<String>> = vec![Vec::new(); array_fields.len()];
    for (_, cells) in &schema.rows {
        for (list, &f) in lists.iter_mut().zip(&array_fields) {
            if let WdbValue::String(s) = &cells[f].value
                && !list.contains(s)
            {
                list.push(s.clone());
            }
        }
    }

    let per_word = schema.offsets_per_value as usize;
    let bits = schema.bits_per_offset;
    let mut data = Vec::new();
    let mut starts = Vec::with_capacity(lists.len());
    for list in &lists {
        starts.push(data.len() as u32);
        for group in list.chunks(per_word) {
            let mut word = 0u32;
            for (k, s) in group.iter().enumerate() {
                let at = pool.intern(s);
                if at > words::mask(bits) {
                    return Err(NovaError::Schema(format!(
                        "string pool offset {at} does not fit {bits} bits"
                    )));
                }
                word |= at << (k as u32 * bits);
            }
            data.extend_from_slice(&word.to_be_bytes());
        }
    }
    Ok(ArrayTables {
        lists,
        data,
        starts,
    })
}

fn encode_record(
    schema: &Schema<'_>,
    cells: &[WdbEntry],
    arrays: &ArrayTables,
    array_fields: &[usize],
    pool: &mut StringPool,
) -> Result<Vec<u8>> {
    let mut out = vec![0u32; schema.word_types.len()];
    for (i, (e, slot)) in cells.iter().zip(&schema.slots).enumerate() {
        let word = &mut out[slot.word];
        match (slot.cell, &e.value) {
            (Cell::Bits { kind, shift, width }, value) => {
                let bits = match (kind, value) {
                    (BitKind::Unsigned, WdbValue::Uint(v)) => {
                        (*v <= words::mask(width)).then_some(*v)
                    }
                    (BitKind::StringIndex, WdbValue::String(s)) => array_fields
                        .iter()
                        .position(|&f| f == i)
                        .and_then(|n| arrays.lists[n].iter().position(|x| x == s))
                        .map(|at| at as u32)
                        .filter(|&at| at <= words::mask(width)),
                    (_, WdbValue::Int(v)) => words::pack_int(kind, width, *v),
                    _ => None,
                };
                let bits = bits.ok_or_else(|| {
                    NovaError::Schema(format!(
                        "field {} value {} does not fit a {}",
                        e.key,
                        e.value,
                        slot.cell.describe()
                    ))
                })?;
                *word |= bits << shift;
            }
            (Cell::Float, WdbValue::Float(v)) => *word = v.to_bits(),
            (Cell::String, WdbValue::String(s)) => *word = pool.intern(s),
            (Cell::Uint, WdbValue::Uint(v)) => *word = *v,
            (Cell::Unknown(_), WdbValue::Unknown { raw, .. }) if raw.len() == 4 => {
                *word = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
            }
            _ => {
                return Err(NovaError::Schema(format!(
                    "field {} does not fit a {}",
                    e.key,
                    slot.cell.describe()
                )));
            }
        }
    }
    Ok(words_to_bytes(out))
}

pub fn to_bytes(game: DbGame, file: &WdbFile) -> Result<Vec<u8>> {
    let schema = check(game, file)?;
    let layout = Layout::for_game(game);
    let mut pool = StringPool::new();

    let field_names = if layout.pooled_field_names {
        words_to_bytes(schema.fields.iter().map(|f| pool.intern(&f.name)))
    } else {
        let mut inline = Vec::new();
        for f in &schema.fields {
            inline.extend_from_slice(f.name.as_bytes());
            inline.push(0);
        }
        inline
    };

    let array_fields = words::array_fields(&schema.slots);
    let arrays = build_string_arrays(&schema, &mut pool)?;
    let mut records = Vec::with_capacity(schema.rows.len());
    for (name, cells) in &schema.rows {
        let body = encode_record(&schema, cells, &arrays, &array_fields, &mut pool)
            .map_err(|e| match e {
                NovaError::Schema(m) => NovaError::Schema(format!("record {name}: {m}")),
                other => other,
            })?;
        records.push((name.clone(), body));
    }

    let mut sections: Vec<(String, Vec<u8>)> = Vec::new();
    if let Some(sheet) = schema.header.sheet_name {
        sections.push((SHEET_NAME_SECTION.into(), sheet.as_bytes().to_vec()));
    }
    if !array_fields.is_empty() {
        sections.push((STRING_ARRAY_SECTION.into(), arrays.data));
        sections.push((
            STRING_ARRAY_INFO_SECTION.into(),
            words_to_bytes([0, 0, schema.offsets_per_value, schema.bits_per_offset]),
        ));
        sections.push((STRING_ARRAY_LIST_SECTION.into(), words_to_bytes(arrays.starts)));
    }
    if layout.always_pool_and_type_list || pool.bytes.len() > 1 {
        sections.push((STRING_SECTION.into(), pool.bytes));
    }
    if schema.compact {
        let list = schema.word_types.iter().map(|&t| t as u8).collect();
        sections.push((WORD_TYPES_COMPACT_SECTION.into(), list));
    } else {
        sections.push((WORD_TYPES_SECTION.into(), words_to_bytes(schema.word_types.iter().copied())));
    }
    if layout.always_pool_and_type_list || schema.header.type_list.is_some() {
        let list = schema.header.type_list.unwrap_or_default();
        sections.push((
            TYPE_LIST_SECTION.into(),
            words_to_bytes(list.iter().map(|&v| v as u32)),
        ));
    }
    sections.push((
        VERSION_SECTION.into(),
        words_to_bytes(schema.header.version),
    ));
    sections.push((FIELD_NAMES_SECTION.into(), field_names));
    sections.push((
        FIELD_COUNT_SECTION.into(),
        words_to_bytes([schema.fields.len() as u32]),
    ));
    sections.extend(records);

    let table_end = FILE_HEADER_LEN + SECTION_HEADER_LEN * sections.len();
    let mut out = Vec::with_capacity(table_end);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(sections.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0u8; 8]);

    let mut cursor = table_end as u64;
    let mut placed = Vec::with_capacity(sections.len());
    for (name, body) in &sections {
        let mut raw_name = [0u8; SECTION_NAME_LEN];
        raw_name[..name.len()].copy_from_slice(name.as_bytes());
        let at = align_up(cursor, SECTION_ALIGN);
        out.extend_from_slice(&raw_name);
        out.extend_from_slice(&(at as u32).to_be_bytes());
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&[0u8; 8]);
        placed.push(at);
        cursor = at + body.len() as u64;
    }
    for ((_, body), at) in sections.iter().zip(placed) {
        out.resize(at as usize, 0);
        out.extend_from_slice(body);
    }
    out.resize(align_up(out.len() as u64, SECTION_ALIGN) as usize, 0);
    Ok(out)
}

pub fn write(path: &Path, game: DbGame, file: &WdbFile) -> Result<()> {
    let bytes = to_bytes(game, file)?;
    commit_all(vec![StagedFile::new(path)?.write_all(&bytes)?], false)?;
    tracing::info!(
        "wrote {} ({} records, {} bytes)",
        path.display(),
        file.records.len(),
        bytes.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wdb::reader::parse_bytes;

    fn version(v: u32) -> WdbEntry {
        WdbEntry::new(KEY_VERSION, WdbValue::Uint(v))
    }

    fn item(name: &str, role: u32, value: i32, label: &str) -> WdbRecord {
        vec![
            WdbEntry::new(RECORD_KEY, WdbValue::String(name.into())),
            WdbEntry::new("u4Role", WdbValue::Uint(role)),
            WdbEntry::new("i12Value", WdbValue::Int(value)),
            WdbEntry::new("s8Label", WdbValue::String(label.into())),
            WdbEntry::new("fRate", WdbValue::Float(0.5)),
            WdbEntry::new("sHelp", WdbValue::String(format!("$help_{name}"))),
        ]
    }

    #[test]
    fn strings_are_pooled_once() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern(""), 0);
        let a = pool.intern("potion");
        assert_eq!(pool.intern("potion"), a);
        assert_eq!(a, 1);
        assert_eq!(pool.bytes, b"\0potion\0");
    }

    #[test]
    fn sections_are_aligned_and_named() {
        let file = WdbFile {
            name: "item".into(),
            header: vec![version(2)],
            records: vec![item("it_potion", 1, -7, "heal"), item("it_phoenix", 2, 9, "heal")],
        };
        let bytes = to_bytes(DbGame::Ff132, &file).unwrap();
        assert_eq!(&bytes[..4], b"WPD\0");
        let count = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
        // strArray x3, string, strtypelistb, version, structitem, structitemnum, 2 records
        assert_eq!(count, 10);
        let names: Vec<String> = (0..count)
            .map(|s| {
                let h = FILE_HEADER_LEN + s * SECTION_HEADER_LEN;
                let off = u32::from_be_bytes(bytes[h + 16..h + 20].try_into().unwrap());
                assert_eq!(off % 4, 0);
                let raw = &bytes[h..h + SECTION_NAME_LEN];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                String::from_utf8(raw[..end].to_vec()).unwrap()
            })
            .collect();
        assert_eq!(names[0], STRING_ARRAY_SECTION);
        assert_eq!(names[4], WORD_TYPES_COMPACT_SECTION);
        assert_eq!(names[8..], ["it_potion", "it_phoenix"]);

        let back = parse_bytes("item", &bytes, DbGame::Ff132).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn packed_fields_share_one_word() {
        let file = WdbFile {
            header: vec![version(1)],
            records: vec![item("it_potion", 0xA, -1, "x")],
            ..Default::default()
        };
        let bytes = to_bytes(DbGame::Ff132, &file).unwrap();
        // u4Role | i12Value << 4 | s8Label << 16, then the float and string words
        let record = &bytes[bytes.len() - 12..];
        assert_eq!(record[..4], 0x0000_FFFAu32.to_be_bytes());
        assert_eq!(record[4..8], 0.5f32.to_bits().to_be_bytes());
    }

    #[test]
    fn schema_mismatches_are_rejected() {
        let mut file = WdbFile {
            header: vec![version(1)],
            records: vec![item("a", 1, 1, "x"), item("b", 2, 2, "y")],
            ..Default::default()
        };
        file.records[1][2].value = WdbValue::Uint(2);
        assert_eq!(validate(DbGame::Ff132, &file).unwrap_err().code(), 3);

        file.records[1] = item("b", 2, 2, "y");
        file.records[1].swap(1, 2);
        assert!(validate(DbGame::Ff132, &file).is_err());

        file.records[1] = item("a", 2, 2, "y");
        assert!(validate(DbGame::Ff132, &file).is_err(), "duplicate record name");

        file.records[1] = item("b", 16, 2, "y");
        assert_eq!(to_bytes(DbGame::Ff132, &file).unwrap_err().code(), 3, "u4 overflow");

        file.records[1] = item("b", 2, 2, "y");
        file.header.push(version(2));
        assert!(validate(DbGame::Ff132, &file).is_err());
        file.header = vec![WdbEntry::new("author", WdbValue::String("me".into()))];
        assert!(validate(DbGame::Ff132, &file).is_err());
        file.header = Vec::new();
        assert!(validate(DbGame::Ff132, &file).is_err(), "version is required");
    }

    #[test]
    fn string_arrays_need_ff132() {
        let file = WdbFile {
            header: vec![version(1)],
            records: vec![item("a", 1, 1, "x")],
            ..Default::default()
        };
        assert_eq!(validate(DbGame::Ff13, &file).unwrap_err().code(), 3);
        assert!(validate(DbGame::Ff132, &file).is_ok());
    }

    #[test]
    fn unknown_words_round_trip_verbatim() {
        let file = WdbFile {
            header: vec![version(1)],
            records: vec![vec![
                WdbEntry::new(RECORD_KEY, WdbValue::String("row".into())),
                WdbEntry::new("id", WdbValue::Int(7)),
                WdbEntry::new(
                    "blob",
                    WdbValue::Unknown {
                        tag: 40,
                        raw: vec![1, 2, 3, 4],
                    },
                ),
            ]],
            ..Default::default()
        };
        let bytes = to_bytes(DbGame::Ff13, &file).unwrap();
        assert_eq!(parse_bytes("", &bytes, DbGame::Ff13).unwrap(), file);

        let mut wide = file.clone();
        wide.records[0][2].value = WdbValue::Unknown {
            tag: 40,
            raw: vec![0; 6],
        };
        assert_eq!(validate(DbGame::Ff13, &wide).unwrap_err().code(), 3);
    }
}
