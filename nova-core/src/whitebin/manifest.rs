//! JSON description of a filelist, for editing outside the binary format.

use super::FileEntry;
use super::crypto::Seal;
use super::filelist::{Filelist, Item, Placement};
use crate::error::{NovaError, Result};
use crate::game::ArchiveGame;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JsonEntry {
    #[serde(flatten)]
    pub entry: FileEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncompressed_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FilelistDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<ArchiveGame>,
    /// Hex seed header; present when the list is stored encrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seal: Option<Seal>,
    pub entries: Vec<JsonEntry>,
}

impl FilelistDoc {
    pub fn from_filelist(list: &Filelist) -> Self {
        let entries = list
            .items()
            .iter()
            .map(|it| JsonEntry {
                entry: it.entry.clone(),
                sector: Some(it.placement.sector),
                uncompressed_size: Some(it.placement.uncompressed_size),
                compressed_size: Some(it.placement.compressed_size),
            })
            .collect();
        Self {
            game: Some(list.game),
            seal: list.seal().copied(),
            entries,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates the description and turns it into a filelist for `game`.
    pub fn into_filelist(self, game: ArchiveGame) -> Result<Filelist> {
        if let Some(declared) = self.game {
            if declared != game {
                return Err(NovaError::InvalidArgument(format!(
                    "description is for {declared}, not {game}"
                )));
            }
        }
        let mut partial = 0usize;
        let items = self
            .entries
            .into_iter()
            .map(|j| {
                let placement = match (j.sector, j.uncompressed_size, j.compressed_size) {
                    (Some(sector), Some(u), Some(c)) => Placement {
                        sector,
                        uncompressed_size: u,
                        compressed_size: c,
                    },
                    _ => {
                        partial += 1;
                        Placement::default()
                    }
                };
                Item::new(j.entry, placement)
            })
            .collect();
        if partial > 0 {
            tracing::warn!("{partial} entries have no placement; repack the container to fill them");
        }
        let mut list = Filelist::from_items(game, items)?;
        list.set_seal(self.seal);
        Ok(list)
    }
}
