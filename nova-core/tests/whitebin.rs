use nova_core::whitebin::{self, Filelist, Seal, default_container_for};
use nova_core::{ArchiveGame, FileEntry, RepackOptions};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn entry(chunk_index: u32, file_code: u32, file_type_id: u8, file_path: &str) -> FileEntry {
    FileEntry {
        chunk_index,
        file_code,
        file_type_id,
        file_path: file_path.into(),
        continuation: false,
    }
}

/// Writes a filelist plus a `_white_img` source tree, returning (filelist, src dir).
fn fixture(root: &Path, game: ArchiveGame, entries: &[(FileEntry, Vec<u8>)]) -> (PathBuf, PathBuf) {
    let src = root.join("_white_img");
    for (e, data) in entries {
        let p = src.join(&e.file_path);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, data).unwrap();
    }
    let filelist = root.join("filelist.win32.bin");
    Filelist::from_entries(game, entries.iter().map(|(e, _)| e.clone()).collect())
        .unwrap()
        .save(&filelist, false)
        .unwrap();
    (filelist, src)
}

fn two_files() -> Vec<(FileEntry, Vec<u8>)> {
    vec![
        (entry(0, 100, 0, "a.bin"), b"alpha ".repeat(500)),
        (entry(1, 200, 0, "b/c.bin"), vec![7, 1, 9, 3]),
    ]
}

#[test]
fn repack_all_then_metadata_lists_the_same_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let files = two_files();
    let (filelist, src) = fixture(tmp.path(), ArchiveGame::Ff131, &files);

    whitebin::repack_all(ArchiveGame::Ff131, &filelist, &src, &RepackOptions::default()).unwrap();

    let bin = default_container_for(&src);
    assert_eq!(bin, tmp.path().join("white_img.bin"));
    let meta = whitebin::get_file_metadata(ArchiveGame::Ff131, &filelist).unwrap();
    let expected: Vec<FileEntry> = files.iter().map(|(e, _)| e.clone()).collect();
    assert_eq!(meta, expected);

    // payloads land in filelist order on sector boundaries
    let list = Filelist::load(ArchiveGame::Ff131, &filelist).unwrap();
    let offsets: Vec<u64> = list.items().iter().map(|it| it.placement.offset()).collect();
    assert_eq!(offsets[0], 0);
    assert!(offsets[1] > 0 && offsets[1] % 2048 == 0);
    assert!(list.items()[0].placement.is_compressed());
    assert!(!list.items()[1].placement.is_compressed());
}

#[test]
fn unpack_then_repack_is_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let (filelist, src) = fixture(tmp.path(), ArchiveGame::Ff131, &two_files());
    whitebin::repack_all(ArchiveGame::Ff131, &filelist, &src, &RepackOptions::default()).unwrap();
    let bin = default_container_for(&src);
    let bin_before = fs::read(&bin).unwrap();
    let list_before = fs::read(&filelist).unwrap();

    fs::remove_dir_all(&src).unwrap();
    let n = whitebin::unpack_all(ArchiveGame::Ff131, &filelist, &bin).unwrap();
    assert_eq!(n, 2);
    assert_eq!(fs::read(src.join("b/c.bin")).unwrap(), [7, 1, 9, 3]);

    whitebin::repack_all(ArchiveGame::Ff131, &filelist, &src, &RepackOptions::default()).unwrap();
    assert_eq!(fs::read(&bin).unwrap(), bin_before);
    assert_eq!(fs::read(&filelist).unwrap(), list_before);
}

#[test]
fn repack_single_unknown_target_leaves_container_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let (filelist, src) = fixture(tmp.path(), ArchiveGame::Ff131, &two_files());
    whitebin::repack_all(ArchiveGame::Ff131, &filelist, &src, &RepackOptions::default()).unwrap();
    let bin = default_container_for(&src);
    let before = fs::read(&bin).unwrap();

    let err = whitebin::repack_single(
        ArchiveGame::Ff131,
        &filelist,
        &bin,
        "zone/missing.bin",
        &RepackOptions { make_backup: true },
    )
    .unwrap_err();
    assert_eq!(err.code(), 2);
    assert_eq!(fs::read(&bin).unwrap(), before);
    assert!(!tmp.path().join("white_img.bin.bak").exists());
}

#[test]
fn repack_single_replaces_one_payload_with_backup() {
    let tmp = tempfile::tempdir().unwrap();
    let (filelist, src) = fixture(tmp.path(), ArchiveGame::Ff131, &two_files());
    whitebin::repack_all(ArchiveGame::Ff131, &filelist, &src, &RepackOptions::default()).unwrap();
    let bin = default_container_for(&src);
    let before = fs::read(&bin).unwrap();

    fs::write(src.join("a.bin"), b"short").unwrap();
    whitebin::repack_single(
        ArchiveGame::Ff131,
        &filelist,
        &bin,
        "a.bin",
        &RepackOptions { make_backup: true },
    )
    .unwrap();
    assert_eq!(fs::read(tmp.path().join("white_img.bin.bak")).unwrap(), before);

    let out = tmp.path().join("check");
    whitebin::unpack_all_to_path(ArchiveGame::Ff131, &filelist, &bin, &out).unwrap();
    assert_eq!(fs::read(out.join("a.bin")).unwrap(), b"short");
    assert_eq!(fs::read(out.join("b/c.bin")).unwrap(), [7, 1, 9, 3]);
}

#[test]
fn unpack_multiple_filters_by_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let files = vec![
        (entry(0, 1, 0, "chr/pc/c000.trb"), b"c0".to_vec()),
        (entry(0, 2, 0, "chr/pc/c001.trb"), b"c1".to_vec()),
        (entry(1, 3, 0, "zone/z001.bin"), b"z1".to_vec()),
    ];
    let (filelist, src) = fixture(tmp.path(), ArchiveGame::Ff131, &files);
    whitebin::repack_all(ArchiveGame::Ff131, &filelist, &src, &RepackOptions::default()).unwrap();
    let bin = default_container_for(&src);

    let out = tmp.path().join("out");
    let n = whitebin::unpack_multiple_to_path(ArchiveGame::Ff131, &filelist, &bin, "CHR", &out)
        .unwrap();
    assert_eq!(n, 2);
    let written: Vec<_> = WalkDir::new(&out)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    assert_eq!(written.len(), 2);

    let none = tmp.path().join("none");
    let n = whitebin::unpack_multiple_to_path(ArchiveGame::Ff131, &filelist, &bin, "sound", &none)
        .unwrap();
    assert_eq!(n, 0);
    assert!(!none.exists());
}

#[test]
fn repack_multiple_picks_up_edited_files() {
    let tmp = tempfile::tempdir().unwrap();
    let (filelist, src) = fixture(tmp.path(), ArchiveGame::Ff132, &[
        (entry(0, 10, 3, "db/item.wdb"), b"items".to_vec()),
        (entry(0, 11, 4, "db/ability.wdb"), b"abilities".to_vec()),
    ]);
    whitebin::repack_all(ArchiveGame::Ff132, &filelist, &src, &RepackOptions::default()).unwrap();
    let bin = default_container_for(&src);

    let edits = tmp.path().join("edits");
    fs::create_dir_all(edits.join("db")).unwrap();
    fs::write(edits.join("db/ability.wdb"), b"new abilities").unwrap();
    fs::write(edits.join("stray.txt"), b"ignored").unwrap();
    whitebin::repack_multiple(ArchiveGame::Ff132, &filelist, &bin, &edits, &RepackOptions::default())
        .unwrap();

    let out = tmp.path().join("out");
    whitebin::unpack_single_to_path(ArchiveGame::Ff132, &filelist, &bin, "db/ability.wdb", &out)
        .unwrap();
    assert_eq!(fs::read(out.join("db/ability.wdb")).unwrap(), b"new abilities");
    let meta = whitebin::get_file_metadata(ArchiveGame::Ff132, &filelist).unwrap();
    assert_eq!(meta[1].file_type_id, 4);

    let err = whitebin::unpack_single_to_path(ArchiveGame::Ff132, &filelist, &bin, "db/x", &out)
        .unwrap_err();
    assert_eq!(err.code(), 2);
}

#[test]
fn filelist_survives_json_and_chunk_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let (filelist, src) = fixture(tmp.path(), ArchiveGame::Ff132, &[
        (entry(0, 10, 3, "db/item.wdb"), b"items".to_vec()),
        (entry(1, 11, 4, "txt/us.ztr"), b"text".to_vec()),
    ]);
    whitebin::repack_all(ArchiveGame::Ff132, &filelist, &src, &RepackOptions::default()).unwrap();
    let original = whitebin::get_file_metadata(ArchiveGame::Ff132, &filelist).unwrap();

    let json = whitebin::unpack_filelist_to_json(ArchiveGame::Ff132, &filelist).unwrap();
    assert_eq!(json, tmp.path().join("filelist.win32.json"));
    let copy = tmp.path().join("copy.json");
    fs::copy(&json, &copy).unwrap();
    whitebin::repack_filelist_from_json(ArchiveGame::Ff132, &copy, &RepackOptions::default())
        .unwrap();
    let from_json = tmp.path().join("copy.bin");
    assert_eq!(fs::read(&from_json).unwrap(), fs::read(&filelist).unwrap());

    let chunk_dir = tmp.path().join("_chunks");
    let n = whitebin::unpack_filelist_to_chunks(ArchiveGame::Ff132, &filelist, &chunk_dir).unwrap();
    assert_eq!(n, 2);
    whitebin::repack_filelist_from_chunks(ArchiveGame::Ff132, &chunk_dir, &RepackOptions::default())
        .unwrap();
    let rebuilt = whitebin::get_file_metadata(ArchiveGame::Ff132, &tmp.path().join("chunks.bin"))
        .unwrap();
    assert_eq!(rebuilt, original);
}

/// `per_chunk` entries in each of `chunks` chunks; entries past the first
/// chunk carry the continuation flag as shipped ff132 lists do.
fn wide_list(chunks: u32, per_chunk: u32) -> Vec<FileEntry> {
    let mut out = Vec::new();
    for c in 0..chunks {
        for n in 0..per_chunk {
            let mut e = entry(c, c * 10_000 + n, 2, &format!("zone/z{c:03}/event/ev_{n:05}_sound_effect.scd"));
            e.continuation = c > 0;
            out.push(e);
        }
    }
    out
}

#[test]
fn ff132_list_with_flagged_chunks_past_32k_round_trips() {
    let entries = wide_list(3, 300);
    let list = Filelist::from_entries(ArchiveGame::Ff132, entries.clone()).unwrap();
    let (texts, _) = list.build_text_chunks().unwrap();
    assert!(texts.iter().map(Vec::len).sum::<usize>() > 32 * 1024);

    let bytes = list.to_bytes().unwrap();
    // the first entry of chunk 1 stores offset 0 with the flag set
    let at = 12 + 8 * 300 + 4;
    assert_eq!(u16::from_le_bytes([bytes[at], bytes[at + 1]]), 0x8000);

    let back = Filelist::parse(ArchiveGame::Ff132, &bytes).unwrap();
    assert_eq!(back.entries(), entries);
    assert_eq!(back.chunk_count(), 3);
    assert_eq!(back.to_bytes().unwrap(), bytes);
}

#[test]
fn ff132_chunk_past_32k_cannot_be_written() {
    let entries = wide_list(1, 800);
    let ff132 = Filelist::from_entries(ArchiveGame::Ff132, entries.clone()).unwrap();
    assert_eq!(ff132.to_bytes().unwrap_err().code(), 1);

    // ff131 offsets use the full 16 bits
    let ff131 = Filelist::from_entries(ArchiveGame::Ff131, entries).unwrap();
    let bytes = ff131.to_bytes().unwrap();
    assert_eq!(Filelist::parse(ArchiveGame::Ff131, &bytes).unwrap().len(), 800);
}

#[test]
fn encrypted_filelist_stays_encrypted_through_every_operation() {
    let tmp = tempfile::tempdir().unwrap();
    let files = vec![
        (entry(0, 10, 3, "db/item.wdb"), b"items".repeat(40)),
        (entry(1, 11, 4, "txt/us.ztr"), b"text".to_vec()),
    ];
    let (filelist, src) = fixture(tmp.path(), ArchiveGame::Ff132, &files);
    let seal = Seal(*b"\x5a\x00\x17\x00\x00\x00\x00\x00\x00\x9c\x00\x00\xe4\x00\x00\x00");
    let mut list = Filelist::load(ArchiveGame::Ff132, &filelist).unwrap();
    list.set_seal(Some(seal));
    list.save(&filelist, false).unwrap();

    whitebin::repack_all(ArchiveGame::Ff132, &filelist, &src, &RepackOptions::default()).unwrap();
    let stored = fs::read(&filelist).unwrap();
    assert!(whitebin::crypto::is_sealed(&stored));
    assert_eq!(&stored[..16], &seal.0);
    let meta = whitebin::get_file_metadata(ArchiveGame::Ff132, &filelist).unwrap();
    let expected: Vec<FileEntry> = files.iter().map(|(e, _)| e.clone()).collect();
    assert_eq!(meta, expected);

    let bin = default_container_for(&src);
    let out = tmp.path().join("out");
    assert_eq!(whitebin::unpack_all_to_path(ArchiveGame::Ff132, &filelist, &bin, &out).unwrap(), 2);
    assert_eq!(fs::read(out.join("db/item.wdb")).unwrap(), files[0].1);

    let json = whitebin::unpack_filelist_to_json(ArchiveGame::Ff132, &filelist).unwrap();
    let copy = tmp.path().join("copy.json");
    fs::copy(&json, &copy).unwrap();
    whitebin::repack_filelist_from_json(ArchiveGame::Ff132, &copy, &RepackOptions::default())
        .unwrap();
    assert_eq!(fs::read(tmp.path().join("copy.bin")).unwrap(), stored);

    let chunk_dir = tmp.path().join("_sealed");
    whitebin::unpack_filelist_to_chunks(ArchiveGame::Ff132, &filelist, &chunk_dir).unwrap();
    whitebin::repack_filelist_from_chunks(ArchiveGame::Ff132, &chunk_dir, &RepackOptions::default())
        .unwrap();
    assert_eq!(fs::read(tmp.path().join("sealed.bin")).unwrap(), stored);
}
