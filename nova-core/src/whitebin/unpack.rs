use super::container::ContainerReader;
use super::filelist::Filelist;
use super::manifest::FilelistDoc;
use super::{FileEntry, chunks, default_unpack_dir};
use crate::error::{NovaError, Result};
use crate::game::ArchiveGame;
use crate::util::files::{normalize_internal, safe_join};
use std::fs;
use std::path::{Path, PathBuf};

pub fn get_file_metadata(game: ArchiveGame, filelist_path: &Path) -> Result<Vec<FileEntry>> {
    Ok(Filelist::load(game, filelist_path)?.entries())
}

fn extract(list: &Filelist, bin_path: &Path, out_dir: &Path, indices: &[usize]) -> Result<usize> {
    let mut reader = ContainerReader::open(bin_path)?;
    fs::create_dir_all(out_dir)?;
    for &i in indices {
        let it = &list.items()[i];
        let out = safe_join(out_dir, &it.entry.file_path)?;
        let data = reader.read_payload(&it.placement).map_err(|e| match e {
            NovaError::Format(m) => NovaError::Format(format!("{}: {m}", it.entry.file_path)),
            other => other,
        })?;
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out, &data)?;
        tracing::trace!("extracted {} ({} bytes)", it.entry.file_path, data.len());
    }
    Ok(indices.len())
}

/// Extracts every entry to `_<name>` beside the container.
pub fn unpack_all(game: ArchiveGame, filelist_path: &Path, bin_path: &Path) -> Result<usize> {
    unpack_all_to_path(game, filelist_path, bin_path, &default_unpack_dir(bin_path))
}

pub fn unpack_all_to_path(
    game: ArchiveGame,
    filelist_path: &Path,
    bin_path: &Path,
    out_dir: &Path,
) -> Result<usize> {
    let list = Filelist::load(game, filelist_path)?;
    let all: Vec<usize> = (0..list.len()).collect();
    let n = extract(&list, bin_path, out_dir, &all)?;
    tracing::info!("unpacked {n} files to {}", out_dir.display());
    Ok(n)
}

pub fn unpack_single(
    game: ArchiveGame,
    filelist_path: &Path,
    bin_path: &Path,
    target: &str,
) -> Result<()> {
    unpack_single_to_path(game, filelist_path, bin_path, target, &default_unpack_dir(bin_path))
}

pub fn unpack_single_to_path(
    game: ArchiveGame,
    filelist_path: &Path,
    bin_path: &Path,
    target: &str,
    out_dir: &Path,
) -> Result<()> {
    let list = Filelist::load(game, filelist_path)?;
    let index = list
        .position(target)
        .ok_or_else(|| NovaError::NotFound(format!("{target} is not in the filelist")))?;
    extract(&list, bin_path, out_dir, &[index])?;
    tracing::info!("unpacked {target} to {}", out_dir.display());
    Ok(())
}

/// True when `path` is `dir` or lies beneath it, compared per component
/// and ignoring ASCII case. An empty filter matches everything.
pub fn in_directory(path: &str, dir: &str) -> bool {
    let dir = normalize_internal(dir);
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        return true;
    }
    let path = path.to_ascii_lowercase();
    let dir = dir.to_ascii_lowercase();
    path == dir
        || path
            .strip_prefix(&dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn unpack_multiple(
    game: ArchiveGame,
    filelist_path: &Path,
    bin_path: &Path,
    dir_filter: &str,
) -> Result<usize> {
    unpack_multiple_to_path(
        game,
        filelist_path,
        bin_path,
        dir_filter,
        &default_unpack_dir(bin_path),
    )
}

/// Extracts entries under `dir_filter`. Matching nothing extracts nothing.
pub fn unpack_multiple_to_path(
    game: ArchiveGame,
    filelist_path: &Path,
    bin_path: &Path,
    dir_filter: &str,
    out_dir: &Path,
) -> Result<usize> {
    let list = Filelist::load(game, filelist_path)?;
    let hits: Vec<usize> = list
        .items()
        .iter()
        .enumerate()
        .filter(|(_, it)| in_directory(&it.entry.file_path, dir_filter))
        .map(|(i, _)| i)
        .collect();
    if hits.is_empty() {
        tracing::info!("no entries under {dir_filter:?}");
        return Ok(0);
    }
    let n = extract(&list, bin_path, out_dir, &hits)?;
    tracing::info!("unpacked {n} files under {dir_filter:?} to {}", out_dir.display());
    Ok(n)
}

/// Writes the filelist's text chunks to `out_dir`; returns the chunk count.
pub fn unpack_filelist_to_chunks(
    game: ArchiveGame,
    filelist_path: &Path,
    out_dir: &Path,
) -> Result<usize> {
    let list = Filelist::load(game, filelist_path)?;
    let n = chunks::write_chunk_dir(&list, out_dir)?;
    tracing::info!("wrote {n} chunk files to {}", out_dir.display());
    Ok(n)
}

/// Writes `<filelist stem>.json` beside the filelist and returns its path.
pub fn unpack_filelist_to_json(game: ArchiveGame, filelist_path: &Path) -> Result<PathBuf> {
    let list = Filelist::load(game, filelist_path)?;
    let out = filelist_path.with_extension("json");
    fs::write(&out, FilelistDoc::from_filelist(&list).to_json()?)?;
    tracing::info!("wrote {}", out.display());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_filter_matches_whole_components() {
        assert!(in_directory("chr/pc/c000.trb", "chr"));
        assert!(in_directory("chr/pc/c000.trb", "CHR\\pc\\"));
        assert!(in_directory("chr/pc/c000.trb", "/chr/pc/c000.trb"));
        assert!(!in_directory("chr2/a.trb", "chr"));
        assert!(!in_directory("zone/a.trb", "chr"));
        assert!(in_directory("anything", ""));
    }
}
