//! Adaptive (FGK/Vitter-style) Huffman coder.
//!
//! A single `AdaptiveTree` starts from a bare NYT node and grows a leaf for
//! every symbol the first time it is seen, escaping through the NYT node
//! with the symbol's raw bits. Every symbol occurrence, seen or new, then
//! walks the tree from the leaf to the root incrementing weights and
//! restoring the sibling property one level at a time. In standard mode an
//! EOF leaf of fixed weight 1 is inserted before anything else, giving the
//! stream a terminator with a stable code.

use std::collections::HashMap;
use std::io::{Read, Write};

use log::{debug, trace};

use crate::tools::bit_io::{BitSink, BitSource};
use crate::tools::node::{set_child, swap, Node, NodeKind, Side};
use crate::{Error, Result};

/// One step of the decode state machine.
#[derive(Debug, PartialEq, Eq)]
enum DecodeOutcome {
    /// `active_node` is still mid-walk; no symbol resolved yet.
    Continue,
    Symbol(Vec<u8>),
    Eof,
    /// The source ran dry before a symbol (or the literal after NYT) could
    /// be completed. Not an error: the caller should retry once more bits
    /// arrive, having consumed none of the bits this attempt needed.
    NeedMoreBits,
}

/// A growing Huffman tree with an NYT escape node, used both to encode and
/// to decode one adaptive stream. Construct one per stream; do not reuse
/// across independent files.
pub struct AdaptiveTree {
    arena: Vec<Node>,
    order: Vec<usize>,
    root: usize,
    nyt: usize,
    eof: Option<usize>,
    leafs: HashMap<Vec<u8>, usize>,
    active_node: usize,
    symbol_size: usize,
}

impl AdaptiveTree {
    /// `with_eof` inserts a dedicated EOF leaf at construction (standard
    /// mode, used by the container format for termination). Tests of the
    /// bare NYT-escape mechanics use `with_eof = false` so the root starts
    /// out as the NYT node itself.
    pub fn new(symbol_size: usize, with_eof: bool) -> Self {
        let nyt = Node::new(NodeKind::Nyt, 0, None, 0);
        let mut tree = Self {
            arena: vec![nyt],
            order: vec![0],
            root: 0,
            nyt: 0,
            eof: None,
            leafs: HashMap::new(),
            active_node: 0,
            symbol_size,
        };
        if with_eof {
            let eof_idx = tree.alloc(NodeKind::Eof, 0, None);
            tree.new_leaf(eof_idx);
            tree.increment(eof_idx);
            tree.eof = Some(eof_idx);
        }
        tree.active_node = tree.root;
        tree
    }

    fn alloc(&mut self, kind: NodeKind, weight: u64, symbol: Option<Vec<u8>>) -> usize {
        let idx = self.arena.len();
        self.arena.push(Node::new(kind, weight, symbol, idx));
        idx
    }

    /// Graft `leaf_idx` in as the NYT node's new sibling: the old NYT node
    /// is demoted under a fresh internal parent that takes its old slot,
    /// NYT becomes that parent's left child, `leaf_idx` its right child.
    /// Weight of the new parent and of `leaf_idx` are both left at 0; the
    /// caller must follow with `increment(leaf_idx)`.
    fn new_leaf(&mut self, leaf_idx: usize) {
        let nyt_idx = self.nyt;
        let nyt_pos = self.arena[nyt_idx].pos;
        let parent_idx = self.alloc(NodeKind::Internal, 0, None);
        match self.arena[nyt_idx].parent {
            Some(p) => {
                let side = self.arena[nyt_idx].side.expect("parented node has a side");
                set_child(&mut self.arena, p, parent_idx, side);
            }
            None => {
                self.root = parent_idx;
            }
        }
        set_child(&mut self.arena, parent_idx, nyt_idx, Side::Left);
        set_child(&mut self.arena, parent_idx, leaf_idx, Side::Right);
        self.arena[parent_idx].pos = nyt_pos;
        self.arena[leaf_idx].pos = nyt_pos + 1;
        self.arena[nyt_idx].pos = nyt_pos + 2;
        self.order[nyt_pos] = parent_idx;
        self.order.push(leaf_idx);
        self.order.push(nyt_idx);
        if let Some(symbol) = self.arena[leaf_idx].symbol.clone() {
            self.leafs.insert(symbol, leaf_idx);
        }
    }

    /// Find the highest-position node with the same weight as `node_idx`
    /// among those before it (its own parent excluded), and swap the two.
    /// A no-op (leader is the node itself) when no such node exists.
    fn slide(&mut self, node_idx: usize) {
        let pos = self.arena[node_idx].pos;
        let weight = self.arena[node_idx].weight;
        let parent = self.arena[node_idx].parent;
        let mut leader = node_idx;
        let mut i = pos;
        while i > 0 {
            i -= 1;
            let candidate = self.order[i];
            if Some(candidate) == parent {
                continue;
            }
            if self.arena[candidate].weight == weight {
                leader = candidate;
            }
            if self.arena[candidate].weight > weight {
                break;
            }
        }
        swap(&mut self.arena, &mut self.order, node_idx, leader);
    }

    /// Walk from `node_idx` to the root, restoring the sibling property at
    /// each level before bumping that level's weight by one.
    fn increment(&mut self, mut node_idx: usize) {
        loop {
            self.slide(node_idx);
            self.arena[node_idx].weight += 1;
            if node_idx == self.root {
                break;
            }
            node_idx = self.arena[node_idx].parent.expect("non-root node has a parent");
        }
    }

    fn path_to(&self, mut idx: usize) -> Vec<bool> {
        let mut bits = Vec::new();
        while let Some(parent) = self.arena[idx].parent {
            bits.push(self.arena[idx].side.expect("parented node has a side").as_bit());
            idx = parent;
        }
        bits.reverse();
        bits
    }

    /// Encode one already-seen-or-new symbol, mutating the tree exactly as
    /// decoding the same bits back would.
    pub fn encode(&mut self, symbol: &[u8]) -> Vec<bool> {
        if let Some(&leaf_idx) = self.leafs.get(symbol) {
            let bits = self.path_to(leaf_idx);
            self.increment(leaf_idx);
            bits
        } else {
            let mut bits = self.path_to(self.nyt);
            for &byte in symbol {
                for shift in (0..8).rev() {
                    bits.push((byte >> shift) & 1 != 0);
                }
            }
            let leaf_idx = self.alloc(NodeKind::Symbol, 0, Some(symbol.to_vec()));
            self.new_leaf(leaf_idx);
            self.increment(leaf_idx);
            bits
        }
    }

    /// Encode the EOF terminator. Panics if this tree was built without one.
    pub fn encode_eof(&self) -> Vec<bool> {
        self.path_to(self.eof.expect("tree was constructed with_eof = false"))
    }

    fn decode_one_bit(&mut self, bit: bool, source: &BitSource) -> Result<DecodeOutcome> {
        let side = Side::from_bit(bit).index();
        let next = self.arena[self.active_node].children[side].ok_or_else(|| {
            Error::CorruptInput("decoded bit selects a non-existent tree branch".to_string())
        })?;
        self.active_node = next;
        if Some(next) == self.eof {
            return Ok(DecodeOutcome::Eof);
        }
        if next == self.nyt {
            if source.remaining() < 8 * self.symbol_size {
                // leave active_node at NYT; next call resumes here once
                // more bits are available, without re-consuming anything
                return Ok(DecodeOutcome::NeedMoreBits);
            }
            return Ok(DecodeOutcome::Continue);
        }
        if self.arena[next].symbol.is_some() {
            let symbol = self.arena[next].symbol.clone().unwrap();
            self.increment(next);
            self.active_node = self.root;
            return Ok(DecodeOutcome::Symbol(symbol));
        }
        Ok(DecodeOutcome::Continue)
    }

    /// Decode exactly one symbol (or EOF) from `source`, or signal that not
    /// enough bits remain yet.
    fn decode_one(&mut self, source: &mut BitSource) -> Result<DecodeOutcome> {
        loop {
            if self.active_node == self.nyt {
                if source.remaining() < 8 * self.symbol_size {
                    return Ok(DecodeOutcome::NeedMoreBits);
                }
                let mut symbol = Vec::with_capacity(self.symbol_size);
                for _ in 0..self.symbol_size {
                    let mut byte = 0u8;
                    for _ in 0..8 {
                        byte = (byte << 1) | source.pop_bit().unwrap() as u8;
                    }
                    symbol.push(byte);
                }
                trace!("adaptive: NYT escape, literal symbol {:?}", symbol);
                let leaf_idx = self.alloc(NodeKind::Symbol, 0, Some(symbol.clone()));
                self.new_leaf(leaf_idx);
                self.increment(leaf_idx);
                self.active_node = self.root;
                return Ok(DecodeOutcome::Symbol(symbol));
            }
            let bit = match source.pop_bit() {
                Some(b) => b,
                None => return Ok(DecodeOutcome::NeedMoreBits),
            };
            match self.decode_one_bit(bit, source)? {
                DecodeOutcome::Continue => continue,
                other => return Ok(other),
            }
        }
    }

    /// Decode whole symbols out of `source` until either the bit buffer has
    /// no complete symbol left (`eof == false`) or EOF fires (`eof ==
    /// true`). Never consumes bits beyond the last complete symbol or the
    /// EOF code; leftover bits stay in `source` for the caller to glue to
    /// the next chunk via `BitSource::remaining_bits`.
    pub fn decode_chunk(&mut self, source: &mut BitSource) -> Result<(Vec<u8>, bool)> {
        let mut out = Vec::new();
        loop {
            match self.decode_one(source)? {
                DecodeOutcome::Symbol(symbol) => out.extend(symbol),
                DecodeOutcome::Eof => return Ok((out, true)),
                DecodeOutcome::NeedMoreBits => return Ok((out, false)),
                DecodeOutcome::Continue => unreachable!("decode_one never returns Continue"),
            }
        }
    }

    #[cfg(test)]
    fn check_sibling_property(&self) -> bool {
        for pos in 1..self.order.len() {
            if self.arena[self.order[pos - 1]].weight < self.arena[self.order[pos]].weight {
                return false;
            }
        }
        true
    }

    /// Streaming encode loop: append `encode(symbol)` for each symbol,
    /// draining whole bytes to `out` once the sink holds at least 1 KiB of
    /// them. Does not emit EOF; call `finish_stream` after the last symbol.
    pub fn encode_stream<I, W>(&mut self, symbols: I, sink: &mut BitSink, out: &mut W) -> Result<()>
    where
        I: Iterator<Item = Result<Vec<u8>>>,
        W: Write,
    {
        for symbol in symbols {
            let symbol = symbol?;
            let bits = self.encode(&symbol);
            sink.push_bits(&bits);
            if sink.len() / 8 >= 1024 {
                out.write_all(&sink.take_full_bytes())?;
            }
        }
        Ok(())
    }

    /// Append the EOF code and flush every remaining bit, zero-padding the
    /// final byte. Consumes `sink`.
    pub fn finish_stream<W: Write>(&self, mut sink: BitSink, out: &mut W) -> Result<()> {
        let eof_bits = self.encode_eof();
        sink.push_bits(&eof_bits);
        if sink.len() / 8 >= 1024 {
            out.write_all(&sink.take_full_bytes())?;
        }
        let (bytes, _pad) = sink.finish();
        out.write_all(&bytes)?;
        Ok(())
    }

    /// Streaming decode loop: pull chunks of `chunk_size` bytes from
    /// `reader`, decoding whole symbols into `writer` and gluing any
    /// leftover undecoded bits onto the next chunk, until EOF fires.
    /// `CorruptInput` if the reader is exhausted before EOF is ever seen.
    pub fn decode_stream<R: Read, W: Write>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
        chunk_size: usize,
    ) -> Result<()> {
        let mut residual: Vec<bool> = Vec::new();
        loop {
            let mut buf = vec![0u8; chunk_size];
            let n = reader.read(&mut buf)?;
            if n == 0 && residual.is_empty() {
                return Err(Error::CorruptInput(
                    "adaptive stream ended before the EOF symbol".to_string(),
                ));
            }
            let mut bits = std::mem::take(&mut residual);
            bits.extend(crate::tools::bit_io::bytes_to_bits(&buf[..n]));
            let mut source = BitSource::from_bits(bits);
            let (symbols, eof) = self.decode_chunk(&mut source)?;
            debug!("adaptive: decoded {} bytes this chunk, eof={}", symbols.len(), eof);
            writer.write_all(&symbols)?;
            if eof {
                return Ok(());
            }
            residual = source.remaining_bits();
            if n == 0 {
                return Err(Error::CorruptInput(
                    "adaptive stream ended before the EOF symbol".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn bits_to_string(bits: &[bool]) -> String {
        bits.iter().map(|b| if *b { '1' } else { '0' }).collect()
    }

    #[test]
    fn first_symbol_escapes_via_nyt_with_raw_bits() {
        // no EOF: NYT is the root, so the first symbol's NYT path is empty.
        let mut tree = AdaptiveTree::new(1, false);
        let bits = tree.encode(b"a");
        assert_eq!(bits_to_string(&bits), "01100001");
    }

    #[test]
    fn repeated_symbol_uses_its_tree_path() {
        let mut tree = AdaptiveTree::new(1, false);
        tree.encode(b"a");
        let bits = tree.encode(b"a");
        assert_eq!(bits_to_string(&bits), "1");
    }

    #[test]
    fn sibling_property_holds_after_every_increment() {
        let mut tree = AdaptiveTree::new(1, true);
        for byte in b"aardvark aardvark" {
            tree.encode(&[*byte]);
            assert!(tree.check_sibling_property());
        }
    }

    #[test]
    fn round_trips_aardvv_through_encode_decode() {
        let mut enc = AdaptiveTree::new(1, true);
        let mut sink = BitSink::new();
        for byte in b"aardvv" {
            let bits = enc.encode(&[*byte]);
            sink.push_bits(&bits);
        }
        sink.push_bits(&enc.encode_eof());
        let (bytes, pad) = sink.finish();

        let mut dec = AdaptiveTree::new(1, true);
        let mut source = BitSource::new(&bytes, bytes.len() * 8 - pad as usize);
        let (out, eof) = dec.decode_chunk(&mut source).unwrap();
        assert!(eof);
        assert_eq!(out, b"aardvv");
    }

    #[test]
    fn empty_stream_is_just_the_eof_code() {
        let mut enc = AdaptiveTree::new(1, true);
        let mut sink = BitSink::new();
        sink.push_bits(&enc.encode_eof());
        let (bytes, pad) = sink.finish();

        let mut dec = AdaptiveTree::new(1, true);
        let mut source = BitSource::new(&bytes, bytes.len() * 8 - pad as usize);
        let (out, eof) = dec.decode_chunk(&mut source).unwrap();
        assert!(eof);
        assert!(out.is_empty());
    }

    #[test]
    fn decode_stream_reassembles_across_small_chunks() {
        let mut enc = AdaptiveTree::new(1, true);
        let mut sink = BitSink::new();
        let payload = b"aardvark aardvark the quick brown fox";
        let mut encoded = Vec::new();
        for byte in payload {
            sink.push_bits(&enc.encode(&[*byte]));
        }
        enc.finish_stream(sink, &mut encoded).unwrap();

        // chunk_size 3 forces symbol and literal-after-NYT reads to
        // straddle read boundaries throughout the stream.
        let mut dec = AdaptiveTree::new(1, true);
        let mut out = Vec::new();
        let mut reader = Cursor::new(encoded);
        dec.decode_stream(&mut reader, &mut out, 3).unwrap();
        assert_eq!(out, payload.to_vec());
    }

    #[test]
    fn truncated_stream_without_eof_is_corrupt() {
        let mut enc = AdaptiveTree::new(1, true);
        let mut sink = BitSink::new();
        sink.push_bits(&enc.encode(b"a"));
        // deliberately never push encode_eof
        let (bytes, _pad) = sink.finish();

        let mut dec = AdaptiveTree::new(1, true);
        let mut out = Vec::new();
        let mut reader = Cursor::new(bytes);
        let result = dec.decode_stream(&mut reader, &mut out, 64);
        assert!(matches!(result, Err(Error::CorruptInput(_))));
    }
}
