use crate::error::{NovaError, Result};
use crate::game::ArchiveGame;
use crate::util::bytes::Reader;

pub const ENTRY_SIZE: usize = 8;
/// High bit of an ff132 path offset; the offset proper is the low 15 bits.
pub const CONTINUATION_FLAG: u16 = 0x8000;

/// One raw 8-byte filelist entry, before chunk numbers are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEntry {
    pub file_code: u32,
    /// Stored chunk field: the full number (FF131) or its low byte (FF132).
    pub chunk: u16,
    pub path_pos: u16,
    pub file_type_id: u8,
    /// ff132 only: the stored offset had `CONTINUATION_FLAG` set.
    pub continuation: bool,
}

/// Per-game entry layout, chosen once per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `file_code u32, chunk u16, path_pos u16`
    ChunkFirst,
    /// `file_code u32, path_pos u16, chunk u8, file_type_id u8`
    PathFirst,
}

impl Layout {
    pub fn for_game(game: ArchiveGame) -> Self {
        match game {
            ArchiveGame::Ff131 => Layout::ChunkFirst,
            ArchiveGame::Ff132 => Layout::PathFirst,
        }
    }

    pub fn has_type_ids(self) -> bool {
        self == Layout::PathFirst
    }

    pub fn read_entry(self, r: &mut Reader<'_>) -> Result<RawEntry> {
        let file_code = r.read_u32_le("entry file code")?;
        Ok(match self {
            Layout::ChunkFirst => {
                let chunk = r.read_u16_le("entry chunk")?;
                let path_pos = r.read_u16_le("entry path position")?;
                RawEntry {
                    file_code,
                    chunk,
                    path_pos,
                    file_type_id: 0,
                    continuation: false,
                }
            }
            Layout::PathFirst => {
                let stored = r.read_u16_le("entry path position")?;
                let chunk = r.read_u8("entry chunk")? as u16;
                let file_type_id = r.read_u8("entry type id")?;
                RawEntry {
                    file_code,
                    chunk,
                    path_pos: stored & !CONTINUATION_FLAG,
                    file_type_id,
                    continuation: stored & CONTINUATION_FLAG != 0,
                }
            }
        })
    }

    pub fn write_entry(self, out: &mut Vec<u8>, chunk_index: u32, e: &RawEntry) -> Result<()> {
        out.extend_from_slice(&e.file_code.to_le_bytes());
        match self {
            Layout::ChunkFirst => {
                let chunk = u16::try_from(chunk_index).map_err(|_| {
                    NovaError::Format(format!("chunk {chunk_index} exceeds the ff131 entry range"))
                })?;
                out.extend_from_slice(&chunk.to_le_bytes());
                out.extend_from_slice(&e.path_pos.to_le_bytes());
            }
            Layout::PathFirst => {
                if e.path_pos & CONTINUATION_FLAG != 0 {
                    return Err(NovaError::Format(format!(
                        "path offset {} in chunk {chunk_index} exceeds the ff132 15-bit range",
                        e.path_pos
                    )));
                }
                let flag = if e.continuation { CONTINUATION_FLAG } else { 0 };
                out.extend_from_slice(&(e.path_pos | flag).to_le_bytes());
                out.push(chunk_index as u8);
                out.push(e.file_type_id);
            }
        }
        Ok(())
    }

    /// Maps stored entries to chunk indices.
    ///
    /// FF131 stores them directly. FF132 only keeps a low byte, so the index
    /// advances each time an entry starts a new text chunk (`path_pos == 0`,
    /// with or without the continuation flag).
    pub fn resolve_chunks(self, raw: &[RawEntry]) -> Vec<u32> {
        match self {
            Layout::ChunkFirst => raw.iter().map(|e| e.chunk as u32).collect(),
            Layout::PathFirst => {
                let mut current = 0u32;
                raw.iter()
                    .enumerate()
                    .map(|(i, e)| {
                        if i > 0 && e.path_pos == 0 {
                            current += 1;
                        }
                        current
                    })
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pos: u16) -> RawEntry {
        RawEntry {
            file_code: 1,
            chunk: 0,
            path_pos: pos,
            file_type_id: 0,
            continuation: false,
        }
    }

    fn stored(pos: u16) -> RawEntry {
        let mut bytes = 1u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&pos.to_le_bytes());
        bytes.extend_from_slice(&[0, 0]);
        Layout::PathFirst.read_entry(&mut Reader::new(&bytes)).unwrap()
    }

    #[test]
    fn path_first_counts_chunk_starts() {
        let entries = [raw(0), raw(20), raw(0), raw(0), raw(44)];
        assert_eq!(
            Layout::PathFirst.resolve_chunks(&entries),
            vec![0, 0, 1, 2, 2]
        );
    }

    #[test]
    fn continuation_flag_is_split_from_the_offset() {
        let entries = [stored(0), stored(20), stored(0x8000), stored(0x8000 + 44), stored(0)];
        assert_eq!(
            entries.iter().map(|e| (e.path_pos, e.continuation)).collect::<Vec<_>>(),
            [(0, false), (20, false), (0, true), (44, true), (0, false)]
        );
        assert_eq!(
            Layout::PathFirst.resolve_chunks(&entries),
            vec![0, 0, 1, 1, 2]
        );

        let mut out = Vec::new();
        Layout::PathFirst.write_entry(&mut out, 1, &entries[3]).unwrap();
        assert_eq!(out[4..6], (0x8000u16 + 44).to_le_bytes());
        assert!(
            Layout::PathFirst
                .write_entry(&mut out, 1, &raw(0x8000))
                .is_err()
        );
        // ff131 offsets use all 16 bits
        assert!(Layout::ChunkFirst.write_entry(&mut out, 1, &raw(0x8000)).is_ok());
    }

    #[test]
    fn entry_layouts_differ_in_field_order() {
        let e = RawEntry {
            file_code: 0x0A0B0C0D,
            chunk: 0,
            path_pos: 0x0102,
            file_type_id: 7,
            continuation: false,
        };
        let mut a = Vec::new();
        Layout::ChunkFirst.write_entry(&mut a, 3, &e).unwrap();
        assert_eq!(a, [0x0D, 0x0C, 0x0B, 0x0A, 3, 0, 0x02, 0x01]);

        let mut b = Vec::new();
        Layout::PathFirst.write_entry(&mut b, 259, &e).unwrap();
        assert_eq!(b, [0x0D, 0x0C, 0x0B, 0x0A, 0x02, 0x01, 3, 7]);

        let back = Layout::PathFirst.read_entry(&mut Reader::new(&b)).unwrap();
        assert_eq!(back.file_type_id, 7);
        assert_eq!(back.path_pos, 0x0102);
    }

    #[test]
    fn chunk_first_rejects_wide_chunk_numbers() {
        let mut out = Vec::new();
        assert!(
            Layout::ChunkFirst
                .write_entry(&mut out, 70_000, &raw(0))
                .is_err()
        );
    }
}
