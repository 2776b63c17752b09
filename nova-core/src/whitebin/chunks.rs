//! Filelist text chunks as editable files.
//!
//! Each chunk becomes `chunk_<n>.txt` with one path record per line. Entry
//! codes and type ids live only in the binary entry table, so they travel in
//! a `~entries.txt` sidecar as `file_code:file_type_id` lines in entry order.
//! An ff132 entry whose path offset carries the continuation flag gets a
//! trailing `:c`. An encrypted list also leaves its seed header in
//! `~seal.txt` as hex so the rebuilt list is encrypted the same way.

use super::FileEntry;
use super::crypto::Seal;
use super::filelist::{Filelist, Item, parse_record};
use crate::error::{NovaError, Result};
use crate::game::ArchiveGame;
use std::fs;
use std::path::{Path, PathBuf};

pub const SIDECAR: &str = "~entries.txt";
pub const SEAL_FILE: &str = "~seal.txt";

fn chunk_file(dir: &Path, n: usize) -> PathBuf {
    dir.join(format!("chunk_{n}.txt"))
}

pub fn write_chunk_dir(list: &Filelist, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir)?;
    let mut texts = vec![String::new(); list.chunk_count()];
    let mut sidecar = String::new();
    for it in list.items() {
        let text = &mut texts[it.entry.chunk_index as usize];
        text.push_str(&it.record_text());
        text.push('\n');
        let flag = if it.entry.continuation { ":c" } else { "" };
        sidecar.push_str(&format!(
            "{}:{}{flag}\n",
            it.entry.file_code, it.entry.file_type_id
        ));
    }
    for (n, text) in texts.iter().enumerate() {
        fs::write(chunk_file(dir, n), text)?;
    }
    fs::write(dir.join(SIDECAR), sidecar)?;
    if let Some(seal) = list.seal() {
        fs::write(dir.join(SEAL_FILE), format!("{}\n", seal.to_hex()))?;
    }
    Ok(texts.len())
}

pub fn read_chunk_dir(game: ArchiveGame, dir: &Path) -> Result<Filelist> {
    let sidecar = fs::read_to_string(dir.join(SIDECAR))?;
    let mut codes = Vec::new();
    for (i, line) in sidecar.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
        let bad = || NovaError::Format(format!("{SIDECAR} line {}: {line:?}", i + 1));
        let mut fields = line.trim().split(':');
        let (Some(code), Some(type_id), flag, None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(bad());
        };
        let continuation = match flag {
            None => false,
            Some("c") => true,
            Some(_) => return Err(bad()),
        };
        codes.push((
            code.parse::<u32>().map_err(|_| bad())?,
            type_id.parse::<u8>().map_err(|_| bad())?,
            continuation,
        ));
    }

    let mut items = Vec::with_capacity(codes.len());
    let mut n = 0usize;
    while chunk_file(dir, n).is_file() {
        let text = fs::read_to_string(chunk_file(dir, n))?;
        for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty() && *l != "end") {
            let (placement, file_path) = parse_record(line)?;
            let &(file_code, file_type_id, continuation) = codes.get(items.len()).ok_or_else(|| {
                NovaError::Format(format!("chunk files list more paths than {SIDECAR}"))
            })?;
            let entry = FileEntry {
                chunk_index: n as u32,
                file_code,
                file_type_id,
                file_path,
                continuation,
            };
            items.push(Item::with_record(entry, placement, line.to_string()));
        }
        n += 1;
    }

    if items.len() != codes.len() {
        return Err(NovaError::Format(format!(
            "{SIDECAR} lists {} entries but the chunk files hold {}",
            codes.len(),
            items.len()
        )));
    }
    tracing::debug!("read {n} chunk files from {}", dir.display());
    let mut list = Filelist::from_items(game, items)?;
    let seal_path = dir.join(SEAL_FILE);
    if seal_path.is_file() {
        list.set_seal(Some(Seal::from_hex(&fs::read_to_string(seal_path)?)?));
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_dir_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            FileEntry {
                chunk_index: 0,
                file_code: 10,
                file_type_id: 4,
                file_path: "sys/a.ztr".into(),
                continuation: false,
            },
            FileEntry {
                chunk_index: 1,
                file_code: 11,
                file_type_id: 5,
                file_path: "sys/b.wdb".into(),
                continuation: true,
            },
        ];
        let mut list = Filelist::from_entries(ArchiveGame::Ff132, entries.clone()).unwrap();
        list.set_seal(Some(Seal([7; 16])));
        assert_eq!(write_chunk_dir(&list, dir.path()).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("chunk_1.txt")).unwrap(),
            "0:0:0:sys/b.wdb\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join(SIDECAR)).unwrap(),
            "10:4\n11:5:c\n"
        );

        let back = read_chunk_dir(ArchiveGame::Ff132, dir.path()).unwrap();
        assert_eq!(back.entries(), entries);
        assert_eq!(back.seal(), Some(&Seal([7; 16])));
    }

    #[test]
    fn sidecar_must_match_chunk_records() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("chunk_0.txt"), "0:1:1:a\n0:1:1:b\n").unwrap();
        fs::write(dir.path().join(SIDECAR), "1:0\n").unwrap();
        assert!(read_chunk_dir(ArchiveGame::Ff131, dir.path()).is_err());
    }
}
