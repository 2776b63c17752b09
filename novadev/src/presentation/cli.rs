use clap::{Parser, Subcommand};
use nova_core::{ArchiveGame, DbGame, TextGame};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "novadev: WhiteBin, WDB and ZTR tools", long_about = None)]
pub struct Cli {
    /// Log level for engine messages (finest, fine, info, warn, fatal)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// WhiteBin archives and filelists
    #[command(subcommand)]
    Whitebin(WhitebinCommands),
    /// WDB databases
    #[command(subcommand)]
    Wdb(WdbCommands),
    /// ZTR text resources
    #[command(subcommand)]
    Ztr(ZtrCommands),
}

#[derive(Subcommand, Debug)]
pub enum WhitebinCommands {
    /// Print every filelist entry
    Meta {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
    },
    /// Extract every file (default destination: `_<container name>` beside it)
    UnpackAll {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
        bin: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Extract one file by its internal path
    UnpackSingle {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
        bin: PathBuf,
        target: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Extract every file under an internal directory
    UnpackMultiple {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
        bin: PathBuf,
        dir: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rebuild the container from a `_<name>` directory
    RepackAll {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
        src_dir: PathBuf,
        /// copy replaced files to `<name>.bak` first
        #[arg(long)]
        backup: bool,
    },
    /// Replace one file inside the container
    RepackSingle {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
        bin: PathBuf,
        target: String,
        #[arg(long)]
        backup: bool,
    },
    /// Replace every file found in an extract directory
    RepackMultiple {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
        bin: PathBuf,
        extract_dir: PathBuf,
        #[arg(long)]
        backup: bool,
    },
    /// Write the filelist's text chunks as `chunk_<n>.txt`
    FilelistToChunks {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
        out_dir: PathBuf,
    },
    /// Write the filelist as JSON beside it
    FilelistToJson {
        #[arg(long)]
        game: ArchiveGame,
        filelist: PathBuf,
    },
    /// Rebuild a filelist from a chunk directory
    FilelistFromChunks {
        #[arg(long)]
        game: ArchiveGame,
        chunk_dir: PathBuf,
        #[arg(long)]
        backup: bool,
    },
    /// Rebuild a filelist from its JSON description
    FilelistFromJson {
        #[arg(long)]
        game: ArchiveGame,
        json: PathBuf,
        #[arg(long)]
        backup: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum WdbCommands {
    /// Summarize a database
    Info {
        #[arg(long)]
        game: DbGame,
        wdb: PathBuf,
    },
    /// Convert a database to JSON (stdout unless --out)
    Export {
        #[arg(long)]
        game: DbGame,
        wdb: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a database from its JSON description
    Import {
        #[arg(long)]
        game: DbGame,
        json: PathBuf,
        out: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ZtrCommands {
    /// Decode a `.ztr` into `<name>.txt` beside it
    Extract {
        #[arg(long)]
        game: TextGame,
        ztr: PathBuf,
        /// AUTO, CH, KR or LJ
        #[arg(long, default_value = "AUTO")]
        encoding: String,
    },
    /// Pack a `id |:| text` dump into `<name>.ztr` beside it
    Convert {
        #[arg(long)]
        game: TextGame,
        txt: PathBuf,
        #[arg(long, default_value = "AUTO")]
        encoding: String,
        /// X (no compression), C or C2
        #[arg(long, default_value = "X")]
        action: String,
    },
    /// Print the control tags a resource uses
    Tags {
        #[arg(long)]
        game: TextGame,
        ztr: PathBuf,
        #[arg(long, default_value = "AUTO")]
        encoding: String,
    },
}
