//! Raw-code entry points: game codes arrive as integers and switches as
//! strings, and every call returns an [`Envelope`].

use crate::envelope::Envelope;
use crate::error::Result;
use crate::game::{ArchiveGame, DbGame, TextGame};
use crate::wdb::{self, WdbFile};
use crate::whitebin::{self, FileEntry, RepackOptions};
use crate::ztr::{self, TextEncoding, ZtrOptions, ZtrResultData};
use std::fs;
use std::path::{Path, PathBuf};

pub use crate::envelope::release_all;
pub use crate::logging::{
    LogLevel, clear_callback, free_log_memory, free_log_memory_batch, register_async_callback,
    register_async_callback_with_level, register_sync_callback,
    register_sync_callback_with_level,
};

fn value<T>(f: impl FnOnce() -> Result<T>) -> Envelope<T> {
    Envelope::from_result(f())
}

fn unit(f: impl FnOnce() -> Result<()>) -> Envelope<()> {
    Envelope::completed(f())
}

fn archive(code: i32) -> Result<ArchiveGame> {
    ArchiveGame::try_from(code)
}

fn backup(make_backup: bool) -> RepackOptions {
    RepackOptions { make_backup }
}

fn ztr_options(encoding: &str, action: &str) -> Result<ZtrOptions> {
    Ok(ZtrOptions {
        encoding: encoding.parse()?,
        action: action.parse()?,
    })
}

/// Drops one envelope and everything it owns.
pub fn release<T>(envelope: Envelope<T>) {
    drop(envelope);
}

// WhiteBin

pub fn whitebin_get_file_metadata(game: i32, filelist: &Path) -> Envelope<Vec<FileEntry>> {
    value(|| whitebin::get_file_metadata(archive(game)?, filelist))
}

pub fn whitebin_unpack_all(game: i32, filelist: &Path, bin: &Path) -> Envelope<usize> {
    value(|| whitebin::unpack_all(archive(game)?, filelist, bin))
}

pub fn whitebin_unpack_all_to_path(
    game: i32,
    filelist: &Path,
    bin: &Path,
    out_dir: &Path,
) -> Envelope<usize> {
    value(|| whitebin::unpack_all_to_path(archive(game)?, filelist, bin, out_dir))
}

pub fn whitebin_unpack_single(game: i32, filelist: &Path, bin: &Path, target: &str) -> Envelope<()> {
    unit(|| whitebin::unpack_single(archive(game)?, filelist, bin, target))
}

pub fn whitebin_unpack_single_to_path(
    game: i32,
    filelist: &Path,
    bin: &Path,
    target: &str,
    out_dir: &Path,
) -> Envelope<()> {
    unit(|| whitebin::unpack_single_to_path(archive(game)?, filelist, bin, target, out_dir))
}

pub fn whitebin_unpack_multiple(
    game: i32,
    filelist: &Path,
    bin: &Path,
    dir_filter: &str,
) -> Envelope<usize> {
    value(|| whitebin::unpack_multiple(archive(game)?, filelist, bin, dir_filter))
}

pub fn whitebin_unpack_multiple_to_path(
    game: i32,
    filelist: &Path,
    bin: &Path,
    dir_filter: &str,
    out_dir: &Path,
) -> Envelope<usize> {
    value(|| whitebin::unpack_multiple_to_path(archive(game)?, filelist, bin, dir_filter, out_dir))
}

pub fn whitebin_unpack_filelist_to_chunks(
    game: i32,
    filelist: &Path,
    out_dir: &Path,
) -> Envelope<usize> {
    value(|| whitebin::unpack_filelist_to_chunks(archive(game)?, filelist, out_dir))
}

pub fn whitebin_unpack_filelist_to_json(game: i32, filelist: &Path) -> Envelope<PathBuf> {
    value(|| whitebin::unpack_filelist_to_json(archive(game)?, filelist))
}

pub fn whitebin_repack_all(
    game: i32,
    filelist: &Path,
    src_dir: &Path,
    make_backup: bool,
) -> Envelope<()> {
    unit(|| whitebin::repack_all(archive(game)?, filelist, src_dir, &backup(make_backup)))
}

pub fn whitebin_repack_single(
    game: i32,
    filelist: &Path,
    bin: &Path,
    target: &str,
    make_backup: bool,
) -> Envelope<()> {
    unit(|| {
        whitebin::repack_single(archive(game)?, filelist, bin, target, &backup(make_backup))
    })
}

pub fn whitebin_repack_multiple(
    game: i32,
    filelist: &Path,
    bin: &Path,
    extract_dir: &Path,
    make_backup: bool,
) -> Envelope<()> {
    unit(|| {
        whitebin::repack_multiple(archive(game)?, filelist, bin, extract_dir, &backup(make_backup))
    })
}

pub fn whitebin_repack_filelist_from_chunks(
    game: i32,
    chunk_dir: &Path,
    make_backup: bool,
) -> Envelope<()> {
    unit(|| whitebin::repack_filelist_from_chunks(archive(game)?, chunk_dir, &backup(make_backup)))
}

pub fn whitebin_repack_filelist_from_json(
    game: i32,
    json: &Path,
    make_backup: bool,
) -> Envelope<()> {
    unit(|| whitebin::repack_filelist_from_json(archive(game)?, json, &backup(make_backup)))
}

// WDB

pub fn wdb_parse(path: &Path, game: i32) -> Envelope<WdbFile> {
    value(|| wdb::parse(path, DbGame::try_from(game)?))
}

pub fn wdb_write(path: &Path, game: i32, file: &WdbFile) -> Envelope<()> {
    unit(|| wdb::write(path, DbGame::try_from(game)?, file))
}

/// Parses `path` and renders it as pretty JSON.
pub fn wdb_export_json(path: &Path, game: i32) -> Envelope<String> {
    value(|| wdb::to_json_string(&wdb::parse(path, DbGame::try_from(game)?)?))
}

/// Reads a JSON description and writes it as a database at `out`.
pub fn wdb_import_json(json: &Path, out: &Path, game: i32) -> Envelope<()> {
    unit(|| {
        let game = DbGame::try_from(game)?;
        let file = wdb::from_json_string(&fs::read_to_string(json)?)?;
        wdb::write(out, game, &file)
    })
}

// ZTR

pub fn ztr_init() -> Envelope<()> {
    unit(|| {
        ztr::init();
        Ok(())
    })
}

pub fn ztr_extract(path: &Path, game: i32, encoding: &str) -> Envelope<PathBuf> {
    value(|| {
        let encoding: TextEncoding = encoding.parse()?;
        ztr::extract(path, TextGame::try_from(game)?, encoding)
    })
}

pub fn ztr_extract_data(path: &Path, game: i32, encoding: &str) -> Envelope<ZtrResultData> {
    value(|| {
        let encoding: TextEncoding = encoding.parse()?;
        ztr::extract_data(path, TextGame::try_from(game)?, encoding)
    })
}

pub fn ztr_convert(txt: &Path, game: i32, encoding: &str, action: &str) -> Envelope<PathBuf> {
    value(|| ztr::convert(txt, TextGame::try_from(game)?, ztr_options(encoding, action)?))
}

pub fn ztr_pack_data(
    data: &ZtrResultData,
    out: &Path,
    game: i32,
    encoding: &str,
    action: &str,
) -> Envelope<()> {
    unit(|| ztr::pack_data(data, out, TextGame::try_from(game)?, ztr_options(encoding, action)?))
}

pub fn ztr_dump_data(data: &ZtrResultData, out: &Path) -> Envelope<()> {
    unit(|| ztr::dump_data(data, out))
}

pub fn ztr_parse_from_memory(bytes: &[u8], game: i32, encoding: &str) -> Envelope<ZtrResultData> {
    value(|| {
        let encoding: TextEncoding = encoding.parse()?;
        ztr::parse_from_memory(bytes, TextGame::try_from(game)?, encoding)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Tag;

    #[test]
    fn bad_codes_are_invalid_arguments() {
        let env = whitebin_get_file_metadata(7, Path::new("x"));
        assert_eq!(env.error().map(|e| e.code), Some(6));
        let env = wdb_parse(Path::new("x"), -1);
        assert_eq!(env.error().map(|e| e.code), Some(6));
        let env = ztr_parse_from_memory(&[], 0, "EBCDIC");
        assert_eq!(env.error().map(|e| e.code), Some(6));
        let env = ztr_convert(Path::new("x.txt"), 1, "AUTO", "C3");
        assert_eq!(env.error().map(|e| e.code), Some(6));
    }

    #[test]
    fn completion_markers_are_inline() {
        assert_eq!(ztr_init().tag(), Tag::OkInline);
        let dir = tempfile::tempdir().unwrap();
        let env = ztr_dump_data(&ZtrResultData::default(), &dir.path().join("e.txt"));
        assert_eq!(env.tag(), Tag::OkInline);
        release(env);
    }

    #[test]
    fn missing_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let env = ztr_extract_data(&dir.path().join("none.ztr"), 2, "LJ");
        assert_eq!(env.error().map(|e| e.code), Some(2));
        let env = whitebin_unpack_all(0, &dir.path().join("fl.bin"), &dir.path().join("a.bin"));
        assert_eq!(env.error().map(|e| e.code), Some(2));
    }
}
