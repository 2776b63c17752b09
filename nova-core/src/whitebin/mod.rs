//! WhiteBin archives: a container of sector-aligned payloads plus the
//! filelist index that names them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod chunks;
pub mod container;
pub mod crypto;
pub mod filelist;
pub mod layout;
pub mod manifest;
pub mod repack;
pub mod unpack;

pub use crypto::Seal;
pub use filelist::{Filelist, Item, Placement};
pub use layout::Layout;
pub use repack::{
    repack_all, repack_filelist_from_chunks, repack_filelist_from_json, repack_multiple,
    repack_single,
};
pub use unpack::{
    get_file_metadata, unpack_all, unpack_all_to_path, unpack_filelist_to_chunks,
    unpack_filelist_to_json, unpack_multiple, unpack_multiple_to_path, unpack_single,
    unpack_single_to_path,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub chunk_index: u32,
    pub file_code: u32,
    /// Only stored by ff132 filelists; zero elsewhere.
    #[serde(default)]
    pub file_type_id: u8,
    pub file_path: String,
    /// ff132 only: the entry's stored path offset carries the high-bit flag.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub continuation: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RepackOptions {
    /// Copy each file about to be replaced to `<name>.bak` first.
    pub make_backup: bool,
}

/// `<parent>/_<name>` -> `<parent>/<name>.bin`
pub fn default_container_for(src_dir: &Path) -> PathBuf {
    let name = src_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_prefix('_').unwrap_or(&name);
    src_dir.with_file_name(format!("{stem}.bin"))
}

/// `<parent>/<name>.bin` -> `<parent>/_<name>`
pub fn default_unpack_dir(bin_path: &Path) -> PathBuf {
    let stem = bin_path
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    bin_path.with_file_name(format!("_{stem}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_locations_mirror_each_other() {
        let bin = Path::new("/data/white_img.bin");
        let dir = default_unpack_dir(bin);
        assert_eq!(dir, Path::new("/data/_white_img"));
        assert_eq!(default_container_for(&dir), bin);
    }
}
