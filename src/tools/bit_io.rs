//! Bit-granular sink and source over `bit_vec::BitVec`.
//!
//! Bit order is MSB-first within each byte everywhere, without exception;
//! this is what `BitVec::from_bytes`/`to_bytes` already give us, so the
//! wrappers below only have to deal with the non-byte-aligned edges.

use bit_vec::BitVec;

/// Expand `bytes` into their individual bits, MSB first.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    let bv = BitVec::from_bytes(bytes);
    (0..bv.len()).map(|i| bv.get(i).unwrap()).collect()
}

/// Accumulates bits in order and hands out whole bytes as they fill up.
#[derive(Default)]
pub struct BitSink {
    bits: BitVec,
}

impl BitSink {
    pub fn new() -> Self {
        Self { bits: BitVec::new() }
    }

    pub fn push_bit(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn push_bits(&mut self, bits: &[bool]) {
        for b in bits {
            self.bits.push(*b);
        }
    }

    /// Append the MSB-first bit expansion of `bytes`.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.bits.append(&mut BitVec::from_bytes(bytes));
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Return and drop all complete bytes filled so far; any bits beyond
    /// the last full byte remain buffered for the next call.
    pub fn take_full_bytes(&mut self) -> Vec<u8> {
        let full_len = (self.bits.len() / 8) * 8;
        if full_len == 0 {
            return Vec::new();
        }
        let mut head = BitVec::with_capacity(full_len);
        for i in 0..full_len {
            head.push(self.bits.get(i).unwrap());
        }
        let mut remainder = BitVec::new();
        for i in full_len..self.bits.len() {
            remainder.push(self.bits.get(i).unwrap());
        }
        self.bits = remainder;
        head.to_bytes()
    }

    /// Pad the trailing partial byte with zero bits and return the final
    /// bytes along with the number of padding bits added (0..=7).
    pub fn finish(mut self) -> (Vec<u8>, u8) {
        let pad = (8 - self.bits.len() % 8) % 8;
        for _ in 0..pad {
            self.bits.push(false);
        }
        (self.bits.to_bytes(), pad as u8)
    }
}

/// The dual of `BitSink`: pulls bits out of a fixed byte-string in order.
pub struct BitSource {
    bits: BitVec,
    pos: usize,
}

impl BitSource {
    /// `nbits` truncates the usable length; trailing padding bits in the
    /// final byte of `bytes` beyond `nbits` are simply never reached.
    pub fn new(bytes: &[u8], nbits: usize) -> Self {
        let mut bits = BitVec::from_bytes(bytes);
        bits.truncate(nbits.min(bits.len()));
        Self { bits, pos: 0 }
    }

    pub fn pop_bit(&mut self) -> Option<bool> {
        let bit = self.bits.get(self.pos);
        if bit.is_some() {
            self.pos += 1;
        }
        bit
    }

    /// Look at the next `n` bits without consuming them; `None` if fewer
    /// than `n` bits remain.
    pub fn peek(&self, n: usize) -> Option<Vec<bool>> {
        if self.pos + n > self.bits.len() {
            return None;
        }
        Some((self.pos..self.pos + n).map(|i| self.bits.get(i).unwrap()).collect())
    }

    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.bits.len());
    }

    pub fn remaining(&self) -> usize {
        self.bits.len() - self.pos
    }

    /// Build a source directly from already-expanded bits, for gluing
    /// undecoded trailing bits from one chunk onto the front of the next.
    pub fn from_bits(bits: Vec<bool>) -> Self {
        let mut bv = BitVec::with_capacity(bits.len());
        for b in bits {
            bv.push(b);
        }
        Self { bits: bv, pos: 0 }
    }

    /// The bits from the current position to the end, left unconsumed.
    pub fn remaining_bits(&self) -> Vec<bool> {
        (self.pos..self.bits.len()).map(|i| self.bits.get(i).unwrap()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_bytes_is_msb_first() {
        let mut sink = BitSink::new();
        sink.push_bytes(&[0x61]); // 'a' = 0110_0001
        assert_eq!(
            (0..8).map(|i| sink.bits.get(i).unwrap()).collect::<Vec<_>>(),
            vec![false, true, true, false, false, false, false, true]
        );
    }

    #[test]
    fn take_full_bytes_leaves_remainder() {
        let mut sink = BitSink::new();
        sink.push_bits(&[true, false, true]);
        sink.push_bytes(&[0xff]);
        // 3 + 8 = 11 bits -> 1 full byte, 3 remaining
        let full = sink.take_full_bytes();
        assert_eq!(full.len(), 1);
        assert_eq!(sink.len(), 3);
        let (tail, pad) = sink.finish();
        assert_eq!(pad, 5);
        assert_eq!(tail.len(), 1);
    }

    #[test]
    fn finish_pads_with_zero_bits() {
        let mut sink = BitSink::new();
        sink.push_bits(&[true, true, true]);
        let (bytes, pad) = sink.finish();
        assert_eq!(pad, 5);
        assert_eq!(bytes, vec![0b1110_0000]);
    }

    #[test]
    fn source_round_trips_sink_output() {
        let mut sink = BitSink::new();
        sink.push_bits(&[true, false, true, true, false]);
        let (bytes, _pad) = sink.finish();
        let mut src = BitSource::new(&bytes, 5);
        let mut out = Vec::new();
        while let Some(b) = src.pop_bit() {
            out.push(b);
        }
        assert_eq!(out, vec![true, false, true, true, false]);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut src = BitSource::new(&[0xf0], 8);
        assert_eq!(src.peek(4), Some(vec![true, true, true, true]));
        assert_eq!(src.remaining(), 8);
        src.advance(4);
        assert_eq!(src.peek(4), Some(vec![false, false, false, false]));
    }

    #[test]
    fn from_bits_round_trips_bytes_to_bits() {
        let bits = bytes_to_bits(&[0b1010_0110]);
        let mut src = BitSource::from_bits(bits);
        let mut out = Vec::new();
        while let Some(b) = src.pop_bit() {
            out.push(b);
        }
        assert_eq!(
            out,
            vec![true, false, true, false, false, true, true, false]
        );
    }

    #[test]
    fn remaining_bits_excludes_consumed_prefix() {
        let mut src = BitSource::new(&[0b1111_0000], 8);
        src.advance(3);
        assert_eq!(
            src.remaining_bits(),
            vec![true, false, false, false, false]
        );
    }
}
