//! Static (two-pass) Huffman coder.
//!
//! One frequency pass over the extension bytes followed by the file
//! contents builds a single canonical tree; that tree is serialized into
//! the header so a decoder can rebuild an identical copy before it reads a
//! single payload bit. Shares the arena-of-indices node model and
//! `BitSink`/`BitSource` bit packing with [`crate::adaptive`], but the tree
//! here is built once and never mutated again.
//!
//! Grounded in `examples/original_source/src/basicHuffman.py`: frequency
//! counting over suffix-then-contents, the same pop-two/sorted-insert tree
//! construction, and the same header shape (padding-bit count, table
//! length, extension bit length, then the table itself).

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use log::{debug, trace};

use crate::tools::bit_io::{BitSink, BitSource};
use crate::tools::byte_stream::ByteStream;
use crate::tools::node::{set_child, Node, NodeKind, Side};
use crate::{Error, Options, Result};

/// A (symbol, occurrence count) record, in the order first encountered.
pub type FreqTable = Vec<(Vec<u8>, u64)>;

fn eof_to_corrupt(e: std::io::Error, msg: &str) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::CorruptInput(msg.to_string())
    } else {
        Error::Io(e)
    }
}

/// Narrowest of `{1,2,4,8}` bytes that holds `max`.
fn width_for_max(max: u64) -> u8 {
    if max <= u8::MAX as u64 {
        1
    } else if max <= u16::MAX as u64 {
        2
    } else if max <= u32::MAX as u64 {
        4
    } else {
        8
    }
}

/// Two-byte preamble (`symbol_size`, width) then one `(symbol, count)`
/// record per entry, count stored big-endian at the chosen width.
pub fn serialize_freq_table(table: &FreqTable, symbol_size: usize) -> Vec<u8> {
    let max = table.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let width = width_for_max(max);
    let mut out = Vec::with_capacity(2 + table.len() * (symbol_size + width as usize));
    out.push(symbol_size as u8);
    out.push(width);
    for (symbol, count) in table {
        out.extend_from_slice(symbol);
        match width {
            1 => out.push(*count as u8),
            2 => out.extend_from_slice(&(*count as u16).to_be_bytes()),
            4 => out.extend_from_slice(&(*count as u32).to_be_bytes()),
            8 => out.extend_from_slice(&count.to_be_bytes()),
            _ => unreachable!("width_for_max only returns 1, 2, 4 or 8"),
        }
    }
    out
}

pub fn deserialize_freq_table(data: &[u8]) -> Result<(FreqTable, usize)> {
    if data.len() < 2 {
        return Err(Error::CorruptInput("frequency table preamble truncated".to_string()));
    }
    let symbol_size = data[0] as usize;
    let width = data[1] as usize;
    let record_len = symbol_size + width;
    if record_len == 0 {
        return Err(Error::CorruptInput("frequency table declares a zero-length record".to_string()));
    }
    let body = &data[2..];
    if body.len() % record_len != 0 {
        return Err(Error::CorruptInput("frequency table length is not a multiple of its record size".to_string()));
    }
    let mut table = Vec::with_capacity(body.len() / record_len);
    for chunk in body.chunks(record_len) {
        let symbol = chunk[..symbol_size].to_vec();
        let count_bytes = &chunk[symbol_size..];
        let count = match width {
            1 => count_bytes[0] as u64,
            2 => u16::from_be_bytes([count_bytes[0], count_bytes[1]]) as u64,
            4 => u32::from_be_bytes(count_bytes.try_into().unwrap()) as u64,
            8 => u64::from_be_bytes(count_bytes.try_into().unwrap()),
            _ => return Err(Error::CorruptInput("frequency table declares an unsupported count width".to_string())),
        };
        table.push((symbol, count));
    }
    Ok((table, symbol_size))
}

/// Pop the two least-weighted nodes, graft a new parent over them, and
/// insert that parent back at the first position whose weight it betters
/// (stable: ties keep existing earlier entries ahead of the new parent).
fn build_tree(arena: &mut Vec<Node>, mut worklist: Vec<usize>) -> usize {
    worklist.sort_by_key(|&i| arena[i].weight);
    while worklist.len() > 1 {
        let left = worklist.remove(0);
        let right = worklist.remove(0);
        let weight = arena[left].weight + arena[right].weight;
        let parent = arena.len();
        arena.push(Node::new(NodeKind::Internal, weight, None, parent));
        set_child(arena, parent, left, Side::Left);
        set_child(arena, parent, right, Side::Right);
        let mut inserted = false;
        for (i, &node) in worklist.iter().enumerate() {
            if weight < arena[node].weight {
                worklist.insert(i, parent);
                inserted = true;
                break;
            }
        }
        if !inserted {
            worklist.push(parent);
        }
    }
    worklist[0]
}

/// Iterative (explicit-stack) depth-first codebook extraction: 0 on a left
/// descent, 1 on a right descent. A single-leaf alphabet gets the code `0`.
fn extract_codes(arena: &[Node], root: usize) -> HashMap<Vec<u8>, Vec<bool>> {
    let mut codes = HashMap::new();
    if arena[root].is_leaf() {
        if let Some(symbol) = arena[root].symbol.clone() {
            codes.insert(symbol, vec![false]);
        }
        return codes;
    }
    let mut stack = vec![(root, Vec::new())];
    while let Some((node, path)) = stack.pop() {
        if let Some(symbol) = &arena[node].symbol {
            codes.insert(symbol.clone(), path);
            continue;
        }
        if let Some(right) = arena[node].children[Side::Right.index()] {
            let mut p = path.clone();
            p.push(true);
            stack.push((right, p));
        }
        if let Some(left) = arena[node].children[Side::Left.index()] {
            let mut p = path.clone();
            p.push(false);
            stack.push((left, p));
        }
    }
    codes
}

/// A frozen canonical Huffman tree built once from a frequency table.
pub struct StaticTree {
    arena: Vec<Node>,
    root: usize,
    codes: HashMap<Vec<u8>, Vec<bool>>,
}

impl StaticTree {
    pub fn build(table: &FreqTable, _symbol_size: usize) -> Self {
        let mut arena = Vec::with_capacity(table.len().max(1));
        let mut leaves = Vec::with_capacity(table.len());
        for (symbol, count) in table {
            let idx = arena.len();
            arena.push(Node::new(NodeKind::Symbol, *count, Some(symbol.clone()), idx));
            leaves.push(idx);
        }
        if leaves.is_empty() {
            arena.push(Node::new(NodeKind::Internal, 0, None, 0));
            return Self { arena, root: 0, codes: HashMap::new() };
        }
        let root = build_tree(&mut arena, leaves);
        let codes = extract_codes(&arena, root);
        Self { arena, root, codes }
    }

    pub fn code(&self, symbol: &[u8]) -> Option<&Vec<bool>> {
        self.codes.get(symbol)
    }

    /// Walk `source` to exhaustion, descending from the root on each bit
    /// and resetting there on every emitted symbol.
    pub fn decode_all(&self, source: &mut BitSource) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while source.remaining() > 0 {
            if self.arena[self.root].is_leaf() {
                source.advance(1);
                out.extend(self.arena[self.root].symbol.clone().unwrap_or_default());
                continue;
            }
            let mut node = self.root;
            loop {
                let bit = source.pop_bit().ok_or_else(|| {
                    Error::CorruptInput("static payload truncated mid-symbol".to_string())
                })?;
                let side = Side::from_bit(bit).index();
                node = self.arena[node].children[side].ok_or_else(|| {
                    Error::CorruptInput("decoded bit selects a non-existent branch".to_string())
                })?;
                if self.arena[node].is_leaf() {
                    break;
                }
            }
            out.extend(self.arena[node].symbol.clone().unwrap_or_default());
        }
        Ok(out)
    }
}

fn blocks_of<R: Read>(reader: R, symbol_size: usize, chunk_size: usize) -> Result<Vec<Vec<u8>>> {
    ByteStream::new(reader, symbol_size, chunk_size).collect()
}

/// Encode `extension` (as its own zero-padded block stream) then the full
/// contents of `reader`, against one tree built from both.
pub fn compress<R: Read, W: Write>(
    reader: &mut R,
    extension: &str,
    writer: &mut W,
    opts: &Options,
) -> Result<()> {
    opts.validate()?;
    if opts.symbol_size > u8::MAX as usize {
        return Err(Error::InvalidConfig("symbol_size must fit in a byte".to_string()));
    }

    let mut contents = Vec::new();
    reader.read_to_end(&mut contents)?;

    let ext_blocks = blocks_of(Cursor::new(extension.as_bytes().to_vec()), opts.symbol_size, opts.chunk_size)?;
    let content_blocks = blocks_of(Cursor::new(contents), opts.symbol_size, opts.chunk_size)?;

    let mut counts: HashMap<Vec<u8>, u64> = HashMap::new();
    let mut order: Vec<Vec<u8>> = Vec::new();
    for block in ext_blocks.iter().chain(content_blocks.iter()) {
        if !counts.contains_key(block) {
            order.push(block.clone());
        }
        *counts.entry(block.clone()).or_insert(0) += 1;
    }
    let table: FreqTable = order.into_iter().map(|s| { let c = counts[&s]; (s, c) }).collect();
    debug!("static: {} distinct symbols over {} blocks", table.len(), ext_blocks.len() + content_blocks.len());

    let tree = StaticTree::build(&table, opts.symbol_size);

    let mut ext_sink = BitSink::new();
    for block in &ext_blocks {
        let code = tree.code(block).expect("every extension block was counted into the table");
        ext_sink.push_bits(code);
    }
    let ext_bit_len = ext_sink.len();
    if ext_bit_len > u8::MAX as usize {
        return Err(Error::InvalidConfig("encoded extension exceeds 255 bits".to_string()));
    }
    let (ext_bytes, _) = ext_sink.finish();

    let mut content_sink = BitSink::new();
    for block in &content_blocks {
        let code = tree.code(block).expect("every content block was counted into the table");
        content_sink.push_bits(code);
    }
    let (content_bytes, pad) = content_sink.finish();

    let freq_bytes = serialize_freq_table(&table, opts.symbol_size);
    let n = freq_bytes.len() as u32;

    let byte0 = (pad & 0b0000_0111) << 4;
    writer.write_all(&[byte0])?;
    writer.write_all(&n.to_be_bytes())?;
    writer.write_all(&[ext_bit_len as u8])?;
    writer.write_all(&freq_bytes)?;
    writer.write_all(&ext_bytes)?;
    writer.write_all(&content_bytes)?;
    trace!("static: header n={} m={} pad={}", n, ext_bit_len, pad);
    Ok(())
}

/// Read the 6-byte header, rebuild the identical tree, and decode the
/// extension then the contents. Returns the recovered extension (with
/// leading dot, trailing `0x00` padding stripped).
pub fn expand<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> Result<String> {
    let mut header = [0u8; 6];
    reader.read_exact(&mut header).map_err(|e| eof_to_corrupt(e, "static header truncated"))?;
    let tag = header[0] >> 7;
    if tag != 0 {
        return Err(Error::CorruptInput("unexpected algorithm tag in static header".to_string()));
    }
    let pad = (header[0] >> 4) & 0b0000_0111;
    let n = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    let m = header[5] as usize;

    let mut freq_bytes = vec![0u8; n];
    reader.read_exact(&mut freq_bytes).map_err(|e| eof_to_corrupt(e, "frequency table truncated"))?;
    let (table, symbol_size) = deserialize_freq_table(&freq_bytes)?;
    let tree = StaticTree::build(&table, symbol_size);
    debug!("static: rebuilt tree with {} symbols", table.len());

    let ext_byte_len = (m + 7) / 8;
    let mut ext_bytes = vec![0u8; ext_byte_len];
    reader.read_exact(&mut ext_bytes)
        .map_err(|e| eof_to_corrupt(e, "declared extension bit-count exceeds bytes present"))?;
    let mut ext_source = BitSource::new(&ext_bytes, m);
    let mut ext_raw = tree.decode_all(&mut ext_source)?;
    while ext_raw.last() == Some(&0) {
        ext_raw.pop();
    }
    let extension = String::from_utf8_lossy(&ext_raw).into_owned();

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    let total_bits = rest.len().checked_mul(8)
        .and_then(|bits| bits.checked_sub(pad as usize))
        .ok_or_else(|| Error::CorruptInput("static payload shorter than its declared padding".to_string()))?;
    let mut content_source = BitSource::new(&rest, total_bits);
    let content = tree.decode_all(&mut content_source)?;
    writer.write_all(&content)?;
    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn opts(symbol_size: usize) -> Options {
        Options { symbol_size, chunk_size: 1024 }
    }

    fn round_trip(contents: &[u8], extension: &str, symbol_size: usize) -> (Vec<u8>, String) {
        let mut encoded = Vec::new();
        compress(&mut Cursor::new(contents.to_vec()), extension, &mut encoded, &opts(symbol_size)).unwrap();
        let mut decoded = Vec::new();
        let recovered_ext = expand(&mut Cursor::new(encoded), &mut decoded).unwrap();
        (decoded, recovered_ext)
    }

    #[test]
    fn round_trips_repeated_byte() {
        let data = vec![0x41u8; 100];
        let (decoded, ext) = round_trip(&data, ".bin", 1);
        assert_eq!(decoded, data);
        assert_eq!(ext, ".bin");
    }

    #[test]
    fn balanced_tree_over_full_byte_alphabet_gives_8_bit_codes() {
        let data: Vec<u8> = (0..=255u8).collect();
        let table: FreqTable = data.iter().map(|&b| (vec![b], 1u64)).collect();
        let tree = StaticTree::build(&table, 1);
        for byte in &data {
            assert_eq!(tree.code(&[*byte]).unwrap().len(), 8);
        }
        let (decoded, ext) = round_trip(&data, "", 1);
        assert_eq!(decoded, data);
        assert_eq!(ext, "");
    }

    #[test]
    fn single_symbol_alphabet_uses_one_bit_codes() {
        // no extension, one repeated byte: the whole alphabet is one leaf.
        let data = vec![b'z'; 10];
        let table: FreqTable = vec![(vec![b'z'], 10)];
        let tree = StaticTree::build(&table, 1);
        assert_eq!(tree.code(&[b'z']).unwrap(), &vec![false]);
        let (decoded, ext) = round_trip(&data, "", 1);
        assert_eq!(decoded, data);
        assert_eq!(ext, "");
    }

    #[test]
    fn empty_contents_round_trips() {
        let (decoded, ext) = round_trip(&[], ".txt", 1);
        assert_eq!(decoded, Vec::<u8>::new());
        assert_eq!(ext, ".txt");
    }

    #[test]
    fn freq_table_serialization_round_trips() {
        let table: FreqTable = vec![(vec![b'a'], 3), (vec![b'b'], 70000)];
        let bytes = serialize_freq_table(&table, 1);
        let (restored, symbol_size) = deserialize_freq_table(&bytes).unwrap();
        assert_eq!(symbol_size, 1);
        assert_eq!(restored, table);
    }

    #[test]
    fn mixed_frequency_text_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog".to_vec();
        let (decoded, ext) = round_trip(&data, ".log", 1);
        assert_eq!(decoded, data);
        assert_eq!(ext, ".log");
    }

    #[test]
    fn payload_shorter_than_declared_padding_is_corrupt_not_a_panic() {
        // byte0: tag=0, pad=3; n=4 (freq table byte len); m=0 (no extension).
        let mut bytes = vec![0b0011_0000u8, 0, 0, 0, 4, 0];
        // freq table preamble (symbol_size=1, width=1) + one (symbol, count) record.
        bytes.extend_from_slice(&[1, 1, b'a', 1]);
        // no extension bytes (m=0) and no content bytes at all: `rest` is empty
        // while the header claims 3 padding bits, which must not underflow.
        let mut decoded = Vec::new();
        let result = expand(&mut Cursor::new(bytes), &mut decoded);
        assert!(matches!(result, Err(Error::CorruptInput(_))));
    }
}
