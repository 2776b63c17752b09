use super::container::{ContainerReader, ContainerWriter, decode_payload, encode_payload};
use super::filelist::{Filelist, Placement};
use super::{RepackOptions, chunks, default_container_for, default_unpack_dir, manifest};
use crate::error::{NovaError, Result};
use crate::game::ArchiveGame;
use crate::util::files::{StagedFile, commit_all, normalize_internal, safe_join};
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What goes into one payload slot of the rebuilt container.
enum Source {
    Keep,
    Replace(PathBuf),
}

/// Rebuilds every payload in filelist order into `staged`, updating the
/// filelist placements as it goes. Returns how many payloads changed.
fn rebuild(
    list: &mut Filelist,
    mut old: Option<&mut ContainerReader>,
    sources: &[Source],
    staged: &mut StagedFile,
) -> Result<usize> {
    let mut changed = 0usize;
    let mut out = BufWriter::new(staged.file());
    let mut w = ContainerWriter::new(&mut out);

    for (i, source) in sources.iter().enumerate() {
        let prev = list.items()[i].placement;
        let (placement, stored) = match source {
            Source::Keep => {
                let reader = old.as_deref_mut().ok_or_else(|| {
                    NovaError::NotFound("container required to keep existing payloads".into())
                })?;
                (prev, reader.read_stored(&prev)?)
            }
            Source::Replace(path) => {
                let data = fs::read(path)?;
                match old.as_deref_mut().map(|r| unchanged_payload(r, &prev, &data)) {
                    Some(Some(stored)) => (prev, stored),
                    _ => {
                        changed += 1;
                        encode_payload(&data)?
                    }
                }
            }
        };
        let sector = w.append(&stored)?;
        list.set_placement(i, Placement { sector, ..placement });
    }

    let total = w.written();
    out.flush()?;
    tracing::debug!("rebuilt container: {} payloads, {total} bytes", sources.len());
    Ok(changed)
}

/// The old stored bytes when they still decode to `data`.
fn unchanged_payload(old: &mut ContainerReader, prev: &Placement, data: &[u8]) -> Option<Vec<u8>> {
    if prev.uncompressed_size as usize != data.len() {
        return None;
    }
    let stored = old.read_stored(prev).ok()?;
    let decoded = decode_payload(prev, stored.clone()).ok()?;
    (decoded == data).then_some(stored)
}

/// Writes the rebuilt container and the updated filelist, then swaps both in.
fn finish(
    list: &mut Filelist,
    filelist_path: &Path,
    bin_path: &Path,
    sources: &[Source],
    opts: &RepackOptions,
) -> Result<usize> {
    let mut staged_bin = StagedFile::new(bin_path)?;
    let changed = {
        let mut old = if bin_path.is_file() {
            Some(ContainerReader::open(bin_path)?)
        } else {
            None
        };
        rebuild(list, old.as_mut(), sources, &mut staged_bin)?
    };
    let staged_list = list.stage(filelist_path)?;
    commit_all(vec![staged_bin, staged_list], opts.make_backup)?;
    Ok(changed)
}

/// Rebuilds the whole container for `src_dir` (`_<name>` -> `<name>.bin`).
pub fn repack_all(
    game: ArchiveGame,
    filelist_path: &Path,
    src_dir: &Path,
    opts: &RepackOptions,
) -> Result<()> {
    let mut list = Filelist::load(game, filelist_path)?;
    let mut sources = Vec::with_capacity(list.len());
    for it in list.items() {
        let path = safe_join(src_dir, &it.entry.file_path)?;
        if !path.is_file() {
            return Err(NovaError::NotFound(format!(
                "{} is listed but missing from {}",
                it.entry.file_path,
                src_dir.display()
            )));
        }
        sources.push(Source::Replace(path));
    }

    let bin_path = default_container_for(src_dir);
    let changed = finish(&mut list, filelist_path, &bin_path, &sources, opts)?;
    tracing::info!(
        "repacked {} files into {} ({changed} changed)",
        list.len(),
        bin_path.display()
    );
    Ok(())
}

/// Replaces the payload of one internal path.
///
/// `target_file` is either the internal path, whose new contents are read
/// from the default unpack directory beside the container, or a path inside
/// that directory.
pub fn repack_single(
    game: ArchiveGame,
    filelist_path: &Path,
    bin_path: &Path,
    target_file: &str,
    opts: &RepackOptions,
) -> Result<()> {
    let mut list = Filelist::load(game, filelist_path)?;
    let unpack_dir = default_unpack_dir(bin_path);
    let internal = match Path::new(target_file).strip_prefix(&unpack_dir) {
        Ok(rel) => normalize_internal(&rel.to_string_lossy()),
        Err(_) => normalize_internal(target_file),
    };

    let index = list
        .position(&internal)
        .ok_or_else(|| NovaError::NotFound(format!("{internal} is not in the filelist")))?;
    let disk = safe_join(&unpack_dir, &internal)?;
    if !disk.is_file() {
        return Err(NovaError::NotFound(format!(
            "replacement file {} does not exist",
            disk.display()
        )));
    }
    if !bin_path.is_file() {
        return Err(NovaError::NotFound(format!(
            "container {} does not exist",
            bin_path.display()
        )));
    }

    let mut sources: Vec<Source> = (0..list.len()).map(|_| Source::Keep).collect();
    sources[index] = Source::Replace(disk);
    let changed = finish(&mut list, filelist_path, bin_path, &sources, opts)?;
    tracing::info!("repacked {internal} into {} ({changed} changed)", bin_path.display());
    Ok(())
}

/// Replaces every payload whose internal path exists under `extract_dir`.
pub fn repack_multiple(
    game: ArchiveGame,
    filelist_path: &Path,
    bin_path: &Path,
    extract_dir: &Path,
    opts: &RepackOptions,
) -> Result<()> {
    let mut list = Filelist::load(game, filelist_path)?;
    if !bin_path.is_file() {
        return Err(NovaError::NotFound(format!(
            "container {} does not exist",
            bin_path.display()
        )));
    }

    let mut found: HashMap<String, PathBuf> = HashMap::new();
    for e in WalkDir::new(extract_dir).follow_links(false) {
        let e = e.map_err(std::io::Error::other)?;
        if !e.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = e.path().strip_prefix(extract_dir) {
            found.insert(normalize_internal(&rel.to_string_lossy()), e.path().to_path_buf());
        }
    }

    let sources: Vec<Source> = list
        .items()
        .iter()
        .map(|it| match found.remove(&it.entry.file_path) {
            Some(p) => Source::Replace(p),
            None => Source::Keep,
        })
        .collect();
    for stray in found.keys() {
        tracing::warn!("{stray} is not in the filelist, skipped");
    }

    let replaced = sources
        .iter()
        .filter(|s| matches!(s, Source::Replace(_)))
        .count();
    if replaced == 0 {
        tracing::info!("no listed files under {}, nothing to repack", extract_dir.display());
        return Ok(());
    }

    let changed = finish(&mut list, filelist_path, bin_path, &sources, opts)?;
    tracing::info!(
        "repacked {replaced} files into {} ({changed} changed)",
        bin_path.display()
    );
    Ok(())
}

/// Rebuilds `<dir without leading '_'>.bin` from a chunk directory.
pub fn repack_filelist_from_chunks(
    game: ArchiveGame,
    chunk_dir: &Path,
    opts: &RepackOptions,
) -> Result<()> {
    let list = chunks::read_chunk_dir(game, chunk_dir)?;
    let out = default_container_for(chunk_dir);
    list.save(&out, opts.make_backup)
}

/// Rebuilds `<json stem>.bin` from a JSON description.
pub fn repack_filelist_from_json(
    game: ArchiveGame,
    json_path: &Path,
    opts: &RepackOptions,
) -> Result<()> {
    let text = fs::read_to_string(json_path)?;
    let list = manifest::FilelistDoc::from_json(&text)?.into_filelist(game)?;
    list.save(&json_path.with_extension("bin"), opts.make_backup)
}
