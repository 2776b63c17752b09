use std::fs;
use std::path::PathBuf;

use nova_core::api;
use nova_core::logging::LogLevel;
use nova_core::{ArchiveGame, DbGame, Envelope, ErrorDetail, NovaError, TextGame};

pub type CliResult<T = ()> = std::result::Result<T, ErrorDetail>;

fn open<T>(envelope: Envelope<T>) -> CliResult<T> {
    envelope.into_result()
}

fn local(e: NovaError) -> ErrorDetail {
    ErrorDetail::from(&e)
}

pub fn init_logging(level: &str) -> CliResult {
    let level: LogLevel = level.parse().map_err(local)?;
    api::register_sync_callback_with_level(|line| eprintln!("{line}"), level);
    Ok(())
}

pub fn handle_meta(game: ArchiveGame, filelist: PathBuf) -> CliResult {
    let entries = open(api::whitebin_get_file_metadata(game as i32, &filelist))?;
    for e in &entries {
        println!(
            "{:>5} {:08x} {:>3} {}",
            e.chunk_index, e.file_code, e.file_type_id, e.file_path
        );
    }
    println!("{} entries", entries.len());
    Ok(())
}

pub fn handle_unpack_all(
    game: ArchiveGame,
    filelist: PathBuf,
    bin: PathBuf,
    out: Option<PathBuf>,
) -> CliResult {
    let n = match out {
        Some(dir) => open(api::whitebin_unpack_all_to_path(game as i32, &filelist, &bin, &dir))?,
        None => open(api::whitebin_unpack_all(game as i32, &filelist, &bin))?,
    };
    println!("extracted {n} files");
    Ok(())
}

pub fn handle_unpack_single(
    game: ArchiveGame,
    filelist: PathBuf,
    bin: PathBuf,
    target: String,
    out: Option<PathBuf>,
) -> CliResult {
    match out {
        Some(dir) => open(api::whitebin_unpack_single_to_path(
            game as i32,
            &filelist,
            &bin,
            &target,
            &dir,
        ))?,
        None => open(api::whitebin_unpack_single(game as i32, &filelist, &bin, &target))?,
    }
    println!("extracted {target}");
    Ok(())
}

pub fn handle_unpack_multiple(
    game: ArchiveGame,
    filelist: PathBuf,
    bin: PathBuf,
    dir: String,
    out: Option<PathBuf>,
) -> CliResult {
    let n = match out {
        Some(to) => open(api::whitebin_unpack_multiple_to_path(
            game as i32,
            &filelist,
            &bin,
            &dir,
            &to,
        ))?,
        None => open(api::whitebin_unpack_multiple(game as i32, &filelist, &bin, &dir))?,
    };
    println!("extracted {n} files under {dir}");
    Ok(())
}

pub fn handle_repack_all(
    game: ArchiveGame,
    filelist: PathBuf,
    src_dir: PathBuf,
    backup: bool,
) -> CliResult {
    open(api::whitebin_repack_all(game as i32, &filelist, &src_dir, backup))?;
    println!(
        "repacked {} into {}",
        src_dir.display(),
        nova_core::whitebin::default_container_for(&src_dir).display()
    );
    Ok(())
}

pub fn handle_repack_single(
    game: ArchiveGame,
    filelist: PathBuf,
    bin: PathBuf,
    target: String,
    backup: bool,
) -> CliResult {
    open(api::whitebin_repack_single(game as i32, &filelist, &bin, &target, backup))?;
    println!("replaced {target}");
    Ok(())
}

pub fn handle_repack_multiple(
    game: ArchiveGame,
    filelist: PathBuf,
    bin: PathBuf,
    extract_dir: PathBuf,
    backup: bool,
) -> CliResult {
    open(api::whitebin_repack_multiple(
        game as i32,
        &filelist,
        &bin,
        &extract_dir,
        backup,
    ))?;
    println!("repacked files from {}", extract_dir.display());
    Ok(())
}

pub fn handle_filelist_to_chunks(
    game: ArchiveGame,
    filelist: PathBuf,
    out_dir: PathBuf,
) -> CliResult {
    let n = open(api::whitebin_unpack_filelist_to_chunks(game as i32, &filelist, &out_dir))?;
    println!("wrote {n} chunk files to {}", out_dir.display());
    Ok(())
}

pub fn handle_filelist_to_json(game: ArchiveGame, filelist: PathBuf) -> CliResult {
    let out = open(api::whitebin_unpack_filelist_to_json(game as i32, &filelist))?;
    println!("wrote {}", out.display());
    Ok(())
}

pub fn handle_filelist_from_chunks(game: ArchiveGame, chunk_dir: PathBuf, backup: bool) -> CliResult {
    open(api::whitebin_repack_filelist_from_chunks(game as i32, &chunk_dir, backup))?;
    println!(
        "wrote {}",
        nova_core::whitebin::default_container_for(&chunk_dir).display()
    );
    Ok(())
}

pub fn handle_filelist_from_json(game: ArchiveGame, json: PathBuf, backup: bool) -> CliResult {
    open(api::whitebin_repack_filelist_from_json(game as i32, &json, backup))?;
    println!("wrote {}", json.with_extension("bin").display());
    Ok(())
}

pub fn handle_wdb_info(game: DbGame, wdb: PathBuf) -> CliResult {
    let file = open(api::wdb_parse(&wdb, game as i32))?;
    println!("{} ({game})", file.name);
    for e in &file.header {
        println!("  header {} = {}", e.key, e.value);
    }
    if let Some(first) = file.records.first() {
        let fields: Vec<String> = first
            .iter()
            .map(|e| format!("{}:{}", e.key, e.value.type_name()))
            .collect();
        println!("  fields {}", fields.join(", "));
    }
    println!("  {} records", file.records.len());
    Ok(())
}

pub fn handle_wdb_export(game: DbGame, wdb: PathBuf, out: Option<PathBuf>) -> CliResult {
    let json = open(api::wdb_export_json(&wdb, game as i32))?;
    match out {
        Some(path) => {
            fs::write(&path, json).map_err(|e| local(e.into()))?;
            println!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn handle_wdb_import(game: DbGame, json: PathBuf, out: PathBuf) -> CliResult {
    open(api::wdb_import_json(&json, &out, game as i32))?;
    println!("wrote {}", out.display());
    Ok(())
}

pub fn handle_ztr_extract(game: TextGame, ztr: PathBuf, encoding: String) -> CliResult {
    open(api::ztr_init())?;
    let out = open(api::ztr_extract(&ztr, game as i32, &encoding))?;
    println!("wrote {}", out.display());
    Ok(())
}

pub fn handle_ztr_convert(
    game: TextGame,
    txt: PathBuf,
    encoding: String,
    action: String,
) -> CliResult {
    open(api::ztr_init())?;
    let out = open(api::ztr_convert(&txt, game as i32, &encoding, &action))?;
    println!("wrote {}", out.display());
    Ok(())
}

pub fn handle_ztr_tags(game: TextGame, ztr: PathBuf, encoding: String) -> CliResult {
    open(api::ztr_init())?;
    let data = open(api::ztr_extract_data(&ztr, game as i32, &encoding))?;
    for m in &data.mappings {
        let n = data.entries.iter().filter(|e| e.text.contains(&m.key)).count();
        println!("{:<28} {:<8} {n} entries", m.key, m.value);
    }
    println!("{} entries, {} tags", data.entries.len(), data.mappings.len());
    Ok(())
}
