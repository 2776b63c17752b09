#![forbid(unsafe_code)]

pub mod envelope;
pub mod error;
pub mod game;
pub mod logging;

pub mod util {
    pub mod bytes;
    pub mod files;
}

pub mod codec;

pub mod wdb;
pub mod whitebin;
pub mod ztr;

pub mod api;

// Re-exports: stable API surface
pub use envelope::{Envelope, ErrorDetail};
pub use error::{NovaError, Result};
pub use game::{ArchiveGame, DbGame, TextGame};
pub use wdb::{WdbEntry, WdbFile, WdbValue};
pub use whitebin::{FileEntry, RepackOptions};
pub use ztr::{Action, TextEncoding, ZtrEntry, ZtrKeyMapping, ZtrOptions, ZtrResultData};
