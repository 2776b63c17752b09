//! ZTR binary layout: header, line-chunk offsets, line infos, then dictionary
//! compressed ID and line chunks.

use super::Action;
use super::dict::{Dictionary, Scheme, compress};
use crate::error::{NovaError, Result};
use crate::util::bytes::Reader;

pub const HEADER_LEN: usize = 20;
pub const CHUNK_SIZE: usize = 4096;
const LINE_INFO_SIZE: usize = 4;

/// Decoded but still byte-level lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResource {
    pub scheme: Scheme,
    pub lines: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Clone, Copy)]
struct LineInfo {
    chunk: u8,
    chara_start: u8,
    start_pos: u16,
}

/// One expanded chunk plus where each compressed byte lands in it.
struct Expanded {
    bytes: Vec<u8>,
    token_starts: Vec<usize>,
}

fn expand_chunk(r: &mut Reader<'_>, scheme: Scheme, limit: Option<usize>) -> Result<Expanded> {
    let table = Dictionary::read(r, scheme)?.expansions()?;
    let mut out = Expanded {
        bytes: Vec::new(),
        token_starts: Vec::new(),
    };
    loop {
        match limit {
            Some(want) if out.bytes.len() >= want => break,
            None if r.is_empty() => break,
            _ => {}
        }
        let token = &table[r.read_u8("chunk token")? as usize];
        if let Some(want) = limit {
            if out.bytes.len() + token.len() > want {
                return Err(NovaError::Format(format!(
                    "chunk token overruns its {want} byte chunk"
                )));
            }
        }
        out.token_starts.push(out.bytes.len());
        out.bytes.extend_from_slice(token);
    }
    Ok(out)
}

pub fn read(data: &[u8]) -> Result<RawResource> {
    let mut r = Reader::new(data);
    let scheme = Scheme::from_magic(r.read_u64_be("ZTR magic")?)?;
    let line_count = r.read_u32_be("line count")? as usize;
    let ids_size = r.read_u32_be("id stream size")? as usize;
    let offsets_count = r.read_u32_be("chunk offset count")? as usize;
    if offsets_count == 0 || (offsets_count + line_count) * 4 > r.remaining_len() {
        return Err(NovaError::Format(format!(
            "{line_count} lines and {offsets_count} chunk offsets do not fit the file"
        )));
    }

    let mut offsets = Vec::with_capacity(offsets_count);
    for _ in 0..offsets_count {
        offsets.push(r.read_u32_be("chunk offset")? as usize);
    }
    let mut infos = Vec::with_capacity(line_count);
    for _ in 0..line_count {
        infos.push(LineInfo {
            chunk: r.read_u8("line chunk id")?,
            chara_start: r.read_u8("line chara start")?,
            start_pos: r.read_u16_be("line start position")?,
        });
    }

    let mut ids = Vec::new();
    while ids.len() < ids_size {
        let want = (ids_size - ids.len()).min(CHUNK_SIZE);
        ids.extend(expand_chunk(&mut r, scheme, Some(want))?.bytes);
    }

    let region = &data[r.position()..];
    if offsets.windows(2).any(|w| w[0] > w[1]) || offsets[offsets_count - 1] > region.len() {
        return Err(NovaError::Format("line chunk offsets are out of order".into()));
    }
    let mut stream = Vec::new();
    let mut chunks = Vec::with_capacity(offsets_count - 1);
    for w in offsets.windows(2) {
        let mut cr = Reader::new(&region[w[0]..w[1]]);
        let chunk = expand_chunk(&mut cr, scheme, None)?;
        chunks.push((stream.len(), chunk.token_starts));
        stream.extend(chunk.bytes);
    }

    let mut id_iter = ids.split(|&b| b == 0);
    let mut lines = Vec::with_capacity(line_count);
    let (mut full, mut low) = (0usize, 0u8);
    for (n, info) in infos.iter().enumerate() {
        let id = id_iter
            .next()
            .ok_or_else(|| NovaError::Format(format!("id stream ends before line {n}")))?;
        full += info.chunk.wrapping_sub(low) as usize;
        low = info.chunk;
        let (base, starts) = chunks.get(full).ok_or_else(|| {
            NovaError::Format(format!("line {n} points at missing chunk {full}"))
        })?;
        let token = *starts.get(info.start_pos as usize).ok_or_else(|| {
            NovaError::Format(format!("line {n} starts past the end of chunk {full}"))
        })?;
        let start = base + token + info.chara_start as usize;
        let len = stream
            .get(start..)
            .and_then(|rest| rest.windows(2).position(|w| w == [0, 0]))
            .ok_or_else(|| NovaError::Format(format!("line {n} has no terminator")))?;
        lines.push((
            String::from_utf8_lossy(id).into_owned(),
            stream[start..start + len].to_vec(),
        ));
    }
    if !ids.is_empty() && ids.last() != Some(&0) {
        return Err(NovaError::Format("id stream is not NUL-terminated".into()));
    }
    tracing::trace!(
        "ZTR {scheme:?}: {line_count} lines, {} id bytes, {} line bytes in {} chunks",
        ids.len(),
        stream.len(),
        chunks.len()
    );
    Ok(RawResource { scheme, lines })
}

/// Serializes `lines` (id, encoded text without terminator) with `action`.
pub fn write(lines: &[(String, Vec<u8>)], action: Action) -> Result<Vec<u8>> {
    let scheme = Scheme::for_action(action);
    let mut ids = Vec::new();
    let mut stream = Vec::new();
    let mut starts = Vec::with_capacity(lines.len());
    for (id, line) in lines {
        if id.as_bytes().contains(&0) {
            return Err(NovaError::InvalidArgument(format!("id {id:?} contains NUL")));
        }
        ids.extend_from_slice(id.as_bytes());
        ids.push(0);
        starts.push(stream.len());
        stream.extend_from_slice(line);
        stream.extend_from_slice(&[0, 0]);
    }

    let mut id_chunks = Vec::new();
    for piece in ids.chunks(CHUNK_SIZE) {
        let (dict, body) = compress(piece, action);
        dict.write(&mut id_chunks, scheme);
        id_chunks.extend_from_slice(&body);
    }

    let mut line_chunks = Vec::new();
    let mut offsets = vec![0u32];
    let mut token_starts = Vec::new();
    for piece in stream.chunks(CHUNK_SIZE) {
        let (dict, body) = compress(piece, action);
        let table = dict.expansions()?;
        let mut at = 0;
        let mut chunk_starts = Vec::with_capacity(body.len());
        for &b in &body {
            chunk_starts.push(at);
            at += table[b as usize].len();
        }
        token_starts.push(chunk_starts);
        dict.write(&mut line_chunks, scheme);
        line_chunks.extend_from_slice(&body);
        offsets.push(line_chunks.len() as u32);
    }

    let mut out = Vec::with_capacity(
        HEADER_LEN + offsets.len() * 4 + lines.len() * LINE_INFO_SIZE + ids.len() + stream.len(),
    );
    out.extend_from_slice(&scheme.magic().to_be_bytes());
    out.extend_from_slice(&(lines.len() as u32).to_be_bytes());
    out.extend_from_slice(&(ids.len() as u32).to_be_bytes());
    out.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
    for off in &offsets {
        out.extend_from_slice(&off.to_be_bytes());
    }
    for &s in &starts {
        let (k, within) = (s / CHUNK_SIZE, s % CHUNK_SIZE);
        let chunk = &token_starts[k];
        let t = chunk.partition_point(|&st| st <= within) - 1;
        out.push(k as u8);
        out.push((within - chunk[t]) as u8);
        out.extend_from_slice(&(t as u16).to_be_bytes());
    }
    out.extend_from_slice(&id_chunks);
    out.extend_from_slice(&line_chunks);
    Ok(out)
}
