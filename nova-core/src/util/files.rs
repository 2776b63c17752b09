//! Path hygiene and crash-safe file replacement.

use crate::error::{NovaError, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

/// Normalises an internal archive path to `/` separators without a leading slash.
pub fn normalize_internal(path: &str) -> String {
    let mut out = path.replace('\\', "/");
    while out.starts_with('/') {
        out.remove(0);
    }
    out
}

/// Joins an internal path under `root`, refusing anything that could escape it.
pub fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel = normalize_internal(rel);
    let p = Path::new(&rel);
    let escapes = p.is_absolute()
        || rel.contains(':')
        || p.components().any(|c| !matches!(c, Component::Normal(_)));
    if rel.is_empty() || escapes {
        return Err(NovaError::InvalidArgument(format!("unsafe path: {rel}")));
    }
    Ok(root.join(p))
}

/// `white_img.bin` -> `white_img.bin.bak`
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Copies `path` to its `.bak` sibling. Missing originals are not an error.
pub fn backup(path: &Path) -> Result<Option<PathBuf>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bak = with_suffix(path, ".bak");
    fs::copy(path, &bak)?;
    tracing::debug!("backup written to {}", bak.display());
    Ok(Some(bak))
}

/// A replacement file being written next to its target.
///
/// Nothing touches the target until [`commit_all`]; dropping a staged file
/// discards it.
pub struct StagedFile {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl StagedFile {
    pub fn new(target: &Path) -> Result<Self> {
        let dir = parent_dir(target);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            target: target.to_path_buf(),
            tmp: NamedTempFile::new_in(dir)?,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn file(&mut self) -> &mut File {
        self.tmp.as_file_mut()
    }

    pub fn write_all(mut self, bytes: &[u8]) -> Result<Self> {
        {
            let mut w = BufWriter::new(self.tmp.as_file_mut());
            w.write_all(bytes)?;
            w.flush()?;
        }
        Ok(self)
    }
}

fn parent_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// A target already swapped in, with the file it displaced.
struct Replaced {
    target: PathBuf,
    previous: Option<TempPath>,
}

impl Replaced {
    fn undo(self) {
        let restored = match &self.previous {
            Some(prev) => fs::rename(prev, &self.target),
            None => fs::remove_file(&self.target),
        };
        if let Err(e) = restored {
            tracing::error!("could not restore {}: {e}", self.target.display());
        }
    }
}

fn replace(s: StagedFile) -> Result<Replaced> {
    s.tmp.as_file().sync_all()?;
    let previous = if s.target.is_file() {
        let slot = tempfile::Builder::new()
            .prefix(".prev")
            .tempfile_in(parent_dir(&s.target))?
            .into_temp_path();
        fs::rename(&s.target, &slot)?;
        Some(slot)
    } else {
        None
    };
    match s.tmp.persist(&s.target) {
        Ok(_) => {
            tracing::trace!("replaced {}", s.target.display());
            Ok(Replaced {
                target: s.target,
                previous,
            })
        }
        Err(e) => {
            if let Some(prev) = previous {
                if let Err(back) = fs::rename(&prev, &s.target) {
                    tracing::error!("could not restore {}: {back}", s.target.display());
                }
            }
            Err(NovaError::Io(e.error))
        }
    }
}

/// Backs up every target first (when asked), then renames each staged file
/// over its target. A failed backup aborts before any target is replaced;
/// a failed rename puts back every target already replaced.
pub fn commit_all(staged: Vec<StagedFile>, make_backup: bool) -> Result<()> {
    if make_backup {
        for s in &staged {
            backup(&s.target)?;
        }
    }
    let mut done = Vec::with_capacity(staged.len());
    for s in staged {
        match replace(s) {
            Ok(r) => done.push(r),
            Err(e) => {
                for r in done.into_iter().rev() {
                    r.undo();
                }
                return Err(e);
            }
        }
    }
    Ok(())
}
