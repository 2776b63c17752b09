pub mod handlers;

use crate::presentation::cli::{Cli, Commands, WdbCommands, WhitebinCommands, ZtrCommands};
use clap::Parser;
use handlers::CliResult;

pub fn run() -> CliResult {
    let cli = Cli::parse();
    handlers::init_logging(&cli.log)?;
    match cli.command {
        Commands::Whitebin(cmd) => match cmd {
            WhitebinCommands::Meta { game, filelist } => handlers::handle_meta(game, filelist),
            WhitebinCommands::UnpackAll {
                game,
                filelist,
                bin,
                out,
            } => handlers::handle_unpack_all(game, filelist, bin, out),
            WhitebinCommands::UnpackSingle {
                game,
                filelist,
                bin,
                target,
                out,
            } => handlers::handle_unpack_single(game, filelist, bin, target, out),
            WhitebinCommands::UnpackMultiple {
                game,
                filelist,
                bin,
                dir,
                out,
            } => handlers::handle_unpack_multiple(game, filelist, bin, dir, out),
            WhitebinCommands::RepackAll {
                game,
                filelist,
                src_dir,
                backup,
            } => handlers::handle_repack_all(game, filelist, src_dir, backup),
            WhitebinCommands::RepackSingle {
                game,
                filelist,
                bin,
                target,
                backup,
            } => handlers::handle_repack_single(game, filelist, bin, target, backup),
            WhitebinCommands::RepackMultiple {
                game,
                filelist,
                bin,
                extract_dir,
                backup,
            } => handlers::handle_repack_multiple(game, filelist, bin, extract_dir, backup),
            WhitebinCommands::FilelistToChunks {
                game,
                filelist,
                out_dir,
            } => handlers::handle_filelist_to_chunks(game, filelist, out_dir),
            WhitebinCommands::FilelistToJson { game, filelist } => {
                handlers::handle_filelist_to_json(game, filelist)
            }
            WhitebinCommands::FilelistFromChunks {
                game,
                chunk_dir,
                backup,
            } => handlers::handle_filelist_from_chunks(game, chunk_dir, backup),
            WhitebinCommands::FilelistFromJson { game, json, backup } => {
                handlers::handle_filelist_from_json(game, json, backup)
            }
        },
        Commands::Wdb(cmd) => match cmd {
            WdbCommands::Info { game, wdb } => handlers::handle_wdb_info(game, wdb),
            WdbCommands::Export { game, wdb, out } => handlers::handle_wdb_export(game, wdb, out),
            WdbCommands::Import { game, json, out } => handlers::handle_wdb_import(game, json, out),
        },
        Commands::Ztr(cmd) => match cmd {
            ZtrCommands::Extract {
                game,
                ztr,
                encoding,
            } => handlers::handle_ztr_extract(game, ztr, encoding),
            ZtrCommands::Convert {
                game,
                txt,
                encoding,
                action,
            } => handlers::handle_ztr_convert(game, txt, encoding, action),
            ZtrCommands::Tags {
                game,
                ztr,
                encoding,
            } => handlers::handle_ztr_tags(game, ztr, encoding),
        },
    }
}
