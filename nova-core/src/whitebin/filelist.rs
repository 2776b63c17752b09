//! Filelist index: binary layout and the text records inside its chunks.
//!
//! ```text
//! header       chunk_info_offset u32, chunk_data_offset u32, total_files u32
//! entries      total_files x 8 bytes (see `Layout`)
//! chunk info   uncompressed u32, compressed u32, start (from chunk data) u32
//! chunk data   zlib("{sector:x}:{uncomp:x}:{comp:x}:{path}\0" ... ["end\0"])
//! ```
//!
//! ff132 lists may be wrapped by [`crypto`](super::crypto); offsets are then
//! relative to the decrypted body.

use super::FileEntry;
use super::crypto::{self, Seal};
use super::layout::{ENTRY_SIZE, Layout, RawEntry};
use crate::codec::{deflate, inflate};
use crate::error::{NovaError, Result};
use crate::game::ArchiveGame;
use crate::util::bytes::Reader;
use crate::util::files::{StagedFile, commit_all, normalize_internal};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub const HEADER_LEN: usize = 12;
pub const CHUNK_INFO_SIZE: usize = 12;
pub const SECTOR: u64 = 2048;
const END_MARKER: &[u8] = b"end\0";

/// Where a payload sits in the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    pub sector: u32,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
}

impl Placement {
    pub fn offset(&self) -> u64 {
        self.sector as u64 * SECTOR
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed_size != self.uncompressed_size
    }

    /// Bytes the payload occupies in the container.
    pub fn stored_len(&self) -> u64 {
        if self.is_compressed() {
            self.compressed_size as u64
        } else {
            self.uncompressed_size as u64
        }
    }
}

/// A filelist entry together with its payload record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub entry: FileEntry,
    pub placement: Placement,
    /// Record text as read, reused verbatim while it still describes the item.
    raw_record: Option<String>,
}

impl Item {
    pub fn new(entry: FileEntry, placement: Placement) -> Self {
        Self {
            entry,
            placement,
            raw_record: None,
        }
    }

    pub(crate) fn with_record(entry: FileEntry, placement: Placement, raw: String) -> Self {
        Self {
            entry,
            placement,
            raw_record: Some(raw),
        }
    }

    pub fn record_text(&self) -> String {
        if let Some(raw) = &self.raw_record {
            if let Ok((p, path)) = parse_record(raw) {
                if p == self.placement && path == self.entry.file_path {
                    return raw.clone();
                }
            }
        }
        format_record(&self.placement, &self.entry.file_path)
    }
}

pub fn format_record(p: &Placement, path: &str) -> String {
    format!(
        "{:x}:{:x}:{:x}:{}",
        p.sector, p.uncompressed_size, p.compressed_size, path
    )
}

/// Splits `"sector:uncomp:comp:path"`; the path may itself contain `:`.
pub fn parse_record(text: &str) -> Result<(Placement, String)> {
    let bad = || NovaError::Format(format!("malformed path record: {text:?}"));
    let mut parts = text.splitn(4, ':');
    let mut hex = || -> Result<u32> {
        let field = parts.next().ok_or_else(bad)?;
        u32::from_str_radix(field, 16).map_err(|_| bad())
    };
    let placement = Placement {
        sector: hex()?,
        uncompressed_size: hex()?,
        compressed_size: hex()?,
    };
    let path = parts.next().filter(|p| !p.is_empty()).ok_or_else(bad)?;
    Ok((placement, normalize_internal(path)))
}

#[derive(Debug, Clone)]
struct TextChunk {
    text: Vec<u8>,
    packed: Vec<u8>,
    size_field: u32,
}

#[derive(Debug, Clone)]
pub struct Filelist {
    pub game: ArchiveGame,
    items: Vec<Item>,
    chunks: Vec<TextChunk>,
    seal: Option<Seal>,
}

impl Filelist {
    pub fn load(game: ArchiveGame, path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let list = Self::parse(game, &data)?;
        tracing::debug!(
            "loaded filelist {} ({} entries, {} chunks)",
            path.display(),
            list.items.len(),
            list.chunks.len()
        );
        Ok(list)
    }

    pub fn parse(game: ArchiveGame, data: &[u8]) -> Result<Self> {
        if game != ArchiveGame::Ff131 && crypto::is_sealed(data) {
            let (seal, body) = crypto::open(data)?;
            tracing::debug!("decrypted filelist body ({} bytes)", body.len());
            let mut list = Self::parse_plain(game, &body)?;
            list.seal = Some(seal);
            return Ok(list);
        }
        Self::parse_plain(game, data)
    }

    fn parse_plain(game: ArchiveGame, data: &[u8]) -> Result<Self> {
        let layout = Layout::for_game(game);
        let mut r = Reader::new(data);
        let info_off = r.read_u32_le("filelist header")? as usize;
        let data_off = r.read_u32_le("filelist header")? as usize;
        let total = r.read_u32_le("filelist header")? as usize;

        let entries_end = total
            .checked_mul(ENTRY_SIZE)
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| NovaError::Format("filelist entry count overflows".into()))?;
        if info_off < entries_end
            || data_off < info_off
            || (data_off - info_off) % CHUNK_INFO_SIZE != 0
        {
            return Err(NovaError::Format(format!(
                "inconsistent filelist header (info {info_off}, data {data_off}, files {total})"
            )));
        }

        let mut raw = Vec::with_capacity(total.min(data.len() / ENTRY_SIZE));
        for _ in 0..total {
            raw.push(layout.read_entry(&mut r)?);
        }

        let chunk_count = (data_off - info_off) / CHUNK_INFO_SIZE;
        let mut info = Reader::at(data, info_off, "chunk info table")?;
        let mut chunks = Vec::with_capacity(chunk_count);
        for c in 0..chunk_count {
            let size_field = info.read_u32_le("chunk info")?;
            let packed_len = info.read_u32_le("chunk info")? as usize;
            let start = info.read_u32_le("chunk info")? as usize;
            let mut body = Reader::at(data, data_off.saturating_add(start), "chunk data")?;
            let packed = body.read_bytes(packed_len, "chunk data")?.to_vec();
            let text = inflate(&packed, size_field as usize)
                .map_err(|e| NovaError::Format(format!("text chunk {c}: {e}")))?;
            chunks.push(TextChunk {
                text,
                packed,
                size_field,
            });
        }

        let chunk_of = layout.resolve_chunks(&raw);
        let mut items = Vec::with_capacity(raw.len());
        let mut codes = HashSet::new();
        for (i, (e, &chunk_index)) in raw.iter().zip(&chunk_of).enumerate() {
            check_chunk_step(i, chunk_index, items.last().map(|it: &Item| it.entry.chunk_index))?;
            let chunk = chunks.get(chunk_index as usize).ok_or_else(|| {
                NovaError::Format(format!("entry {i} points at missing chunk {chunk_index}"))
            })?;
            let record = record_at(&chunk.text, e.path_pos as usize)
                .ok_or_else(|| NovaError::Format(format!("entry {i} has no path record")))?;
            let (placement, file_path) = parse_record(&record)?;
            if !codes.insert(e.file_code) {
                tracing::warn!("duplicate file code {:#010x} at entry {i}", e.file_code);
            }
            items.push(Item::with_record(
                FileEntry {
                    chunk_index,
                    file_code: e.file_code,
                    file_type_id: if layout.has_type_ids() { e.file_type_id } else { 0 },
                    file_path,
                    continuation: e.continuation,
                },
                placement,
                record,
            ));
        }

        Ok(Self {
            game,
            items,
            chunks,
            seal: None,
        })
    }

    /// Builds a fresh filelist. Placements start zeroed until a repack fills them.
    pub fn from_entries(game: ArchiveGame, entries: Vec<FileEntry>) -> Result<Self> {
        let items = entries
            .into_iter()
            .map(|e| Item::new(e, Placement::default()))
            .collect();
        Self::from_items(game, items)
    }

    pub fn from_items(game: ArchiveGame, mut items: Vec<Item>) -> Result<Self> {
        let mut codes = HashSet::new();
        let mut prev = None;
        for (i, it) in items.iter_mut().enumerate() {
            it.entry.file_path = normalize_internal(&it.entry.file_path);
            if it.entry.file_path.is_empty() || it.entry.file_path.contains('\0') {
                return Err(NovaError::Format(format!("entry {i} has an invalid path")));
            }
            check_chunk_step(i, it.entry.chunk_index, prev)?;
            prev = Some(it.entry.chunk_index);
            if !codes.insert(it.entry.file_code) {
                return Err(NovaError::Format(format!(
                    "duplicate file code {} at entry {i}",
                    it.entry.file_code
                )));
            }
            if game == ArchiveGame::Ff131 {
                it.entry.file_type_id = 0;
                it.entry.continuation = false;
            }
        }
        Ok(Self {
            game,
            items,
            chunks: Vec::new(),
            seal: None,
        })
    }

    /// Seed header of an encrypted list; `None` for plain lists.
    pub fn seal(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Encrypts the list on the next write. Ignored for ff131, which has no
    /// encrypted form.
    pub fn set_seal(&mut self, seal: Option<Seal>) {
        if self.game == ArchiveGame::Ff131 && seal.is_some() {
            tracing::warn!("ff131 filelists are never encrypted; dropping the seal");
            self.seal = None;
        } else {
            self.seal = seal;
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn entries(&self) -> Vec<FileEntry> {
        self.items.iter().map(|it| it.entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.items.last().map_or(0, |it| it.entry.chunk_index as usize + 1)
    }

    /// Exact internal-path lookup.
    pub fn position(&self, internal: &str) -> Option<usize> {
        let wanted = normalize_internal(internal);
        self.items.iter().position(|it| it.entry.file_path == wanted)
    }

    pub fn set_placement(&mut self, index: usize, placement: Placement) {
        if let Some(it) = self.items.get_mut(index) {
            it.placement = placement;
        }
    }

    /// Decompressed text of each chunk plus every item's offset inside it.
    pub fn build_text_chunks(&self) -> Result<(Vec<Vec<u8>>, Vec<u16>)> {
        let mut texts: Vec<Vec<u8>> = vec![Vec::new(); self.chunk_count()];
        let mut positions = Vec::with_capacity(self.items.len());
        for it in &self.items {
            let c = it.entry.chunk_index as usize;
            let text = &mut texts[c];
            let pos = u16::try_from(text.len()).map_err(|_| {
                NovaError::Format(format!("text chunk {c} outgrew the 16-bit path offsets"))
            })?;
            positions.push(pos);
            text.extend_from_slice(it.record_text().as_bytes());
            text.push(0);
        }
        if let Some(last) = texts.last_mut() {
            last.extend_from_slice(END_MARKER);
        }
        Ok((texts, positions))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let layout = Layout::for_game(self.game);
        let (texts, positions) = self.build_text_chunks()?;

        let mut packed = Vec::with_capacity(texts.len());
        for (c, text) in texts.into_iter().enumerate() {
            match self.chunks.get(c) {
                Some(old) if old.text == text => {
                    packed.push((old.size_field, old.packed.clone()));
                }
                _ => packed.push((text.len() as u32, deflate(&text)?)),
            }
        }

        let info_off = HEADER_LEN + ENTRY_SIZE * self.items.len();
        let data_off = info_off + CHUNK_INFO_SIZE * packed.len();
        let mut out = Vec::with_capacity(data_off + packed.iter().map(|p| p.1.len()).sum::<usize>());
        out.extend_from_slice(&(info_off as u32).to_le_bytes());
        out.extend_from_slice(&(data_off as u32).to_le_bytes());
        out.extend_from_slice(&(self.items.len() as u32).to_le_bytes());

        for (it, &pos) in self.items.iter().zip(&positions) {
            let raw = RawEntry {
                file_code: it.entry.file_code,
                chunk: 0,
                path_pos: pos,
                file_type_id: it.entry.file_type_id,
                continuation: it.entry.continuation,
            };
            layout.write_entry(&mut out, it.entry.chunk_index, &raw)?;
        }

        let mut start = 0u32;
        for (size_field, bytes) in &packed {
            out.extend_from_slice(&size_field.to_le_bytes());
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&start.to_le_bytes());
            start += bytes.len() as u32;
        }
        for (_, bytes) in &packed {
            out.extend_from_slice(bytes);
        }
        match &self.seal {
            Some(seal) => crypto::seal(seal, &out),
            None => Ok(out),
        }
    }

    pub fn stage(&self, path: &Path) -> Result<StagedFile> {
        StagedFile::new(path)?.write_all(&self.to_bytes()?)
    }

    pub fn save(&self, path: &Path, make_backup: bool) -> Result<()> {
        commit_all(vec![self.stage(path)?], make_backup)?;
        tracing::info!("wrote filelist {} ({} entries)", path.display(), self.items.len());
        Ok(())
    }
}

fn check_chunk_step(i: usize, chunk_index: u32, prev: Option<u32>) -> Result<()> {
    let ok = match prev {
        None => chunk_index == 0,
        Some(p) => chunk_index == p || chunk_index == p + 1,
    };
    if ok {
        Ok(())
    } else {
        Err(NovaError::Format(format!(
            "entry {i}: chunk index {chunk_index} breaks the contiguous chunk order"
        )))
    }
}

fn record_at(text: &[u8], pos: usize) -> Option<String> {
    let tail = text.get(pos..)?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8(tail[..end].to_vec()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(chunk_index: u32, file_code: u32, path: &str) -> FileEntry {
        FileEntry {
            chunk_index,
            file_code,
            file_type_id: 0,
            file_path: path.into(),
            continuation: false,
        }
    }

    #[test]
    fn records_keep_colons_in_paths() {
        let (p, path) = parse_record("1a:100:80:db/odd:name.wdb").unwrap();
        assert_eq!(p.sector, 0x1a);
        assert_eq!(p.uncompressed_size, 0x100);
        assert!(p.is_compressed());
        assert_eq!(path, "db/odd:name.wdb");
        assert!(parse_record("zz:1:1:a").is_err());
        assert!(parse_record("1:1:1").is_err());
    }

    #[test]
    fn two_chunk_list_survives_both_layouts() {
        for game in [ArchiveGame::Ff131, ArchiveGame::Ff132] {
            let mut list = Filelist::from_entries(
                game,
                vec![entry(0, 100, "a.bin"), entry(0, 150, "x.bin"), entry(1, 200, "b/c.bin")],
            )
            .unwrap();
            list.set_placement(
                2,
                Placement {
                    sector: 3,
                    uncompressed_size: 10,
                    compressed_size: 8,
                },
            );
            let bytes = list.to_bytes().unwrap();
            let back = Filelist::parse(game, &bytes).unwrap();
            assert_eq!(back.entries(), list.entries());
            assert_eq!(back.items()[2].placement.compressed_size, 8);
            assert_eq!(back.chunk_count(), 2);
            // untouched parse re-serialises identically
            assert_eq!(back.to_bytes().unwrap(), bytes);
        }
    }

    #[test]
    fn last_chunk_carries_end_marker() {
        let list = Filelist::from_entries(ArchiveGame::Ff131, vec![entry(0, 1, "a")]).unwrap();
        let (texts, positions) = list.build_text_chunks().unwrap();
        assert_eq!(texts[0], b"0:0:0:a\0end\0");
        assert_eq!(positions, vec![0]);
    }

    #[test]
    fn chunk_gaps_and_duplicate_codes_are_rejected() {
        let gap = Filelist::from_entries(
            ArchiveGame::Ff131,
            vec![entry(0, 1, "a"), entry(2, 2, "b")],
        );
        assert!(gap.is_err());
        let late_start = Filelist::from_entries(ArchiveGame::Ff131, vec![entry(1, 1, "a")]);
        assert!(late_start.is_err());
        let dup = Filelist::from_entries(
            ArchiveGame::Ff132,
            vec![entry(0, 7, "a"), entry(0, 7, "b")],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn truncated_filelist_is_malformed() {
        let list = Filelist::from_entries(ArchiveGame::Ff131, vec![entry(0, 1, "a")]).unwrap();
        let bytes = list.to_bytes().unwrap();
        let err = Filelist::parse(ArchiveGame::Ff131, &bytes[..bytes.len() - 3]).unwrap_err();
        assert_eq!(err.code(), 1);
    }

    #[test]
    fn encrypted_list_reads_and_rewrites_identically() {
        let mut list = Filelist::from_entries(
            ArchiveGame::Ff132,
            vec![entry(0, 100, "zone/z001.bin"), entry(1, 200, "zone/z002.bin")],
        )
        .unwrap();
        let plain = list.to_bytes().unwrap();
        list.set_seal(Some(Seal(*b"\x10\x20\x30\x40\x50\x60\x70\x80\x90\xa0\xb0\xc0\xd0\xe0\xf0\x01")));
        let sealed = list.to_bytes().unwrap();
        assert!(crypto::is_sealed(&sealed));
        assert_ne!(&sealed[crypto::PREFIX_LEN..crypto::PREFIX_LEN + 12], &plain[..12]);

        let back = Filelist::parse(ArchiveGame::Ff132, &sealed).unwrap();
        assert_eq!(back.entries(), list.entries());
        assert_eq!(back.seal(), list.seal());
        assert_eq!(back.to_bytes().unwrap(), sealed);

        // ff131 never treats the marker as encryption
        assert!(Filelist::parse(ArchiveGame::Ff131, &sealed).is_err());
        let mut unsealed = back;
        unsealed.set_seal(None);
        assert_eq!(unsealed.to_bytes().unwrap(), plain);
    }

    #[test]
    fn type_ids_only_survive_on_ff132() {
        let mut e = entry(0, 1, "a");
        e.file_type_id = 9;
        let ff131 = Filelist::from_entries(ArchiveGame::Ff131, vec![e.clone()]).unwrap();
        assert_eq!(ff131.entries()[0].file_type_id, 0);
        let ff132 = Filelist::from_entries(ArchiveGame::Ff132, vec![e]).unwrap();
        let back = Filelist::parse(ArchiveGame::Ff132, &ff132.to_bytes().unwrap()).unwrap();
        assert_eq!(back.entries()[0].file_type_id, 9);
    }
}
