//! Lazy chunked sequence of fixed-size symbol blocks from a `Read`.

use std::io::Read;

use crate::Error;

/// Yields successive non-overlapping `symbol_size`-byte windows read from
/// `reader` in `chunk_size`-byte chunks. The final short window (if any)
/// is right-padded with `0x00` to `symbol_size`.
pub struct ByteStream<R> {
    reader: R,
    symbol_size: usize,
    chunk_size: usize,
    pending: Vec<u8>,
    reader_done: bool,
}

impl<R: Read> ByteStream<R> {
    pub fn new(reader: R, symbol_size: usize, chunk_size: usize) -> Self {
        Self {
            reader,
            symbol_size,
            chunk_size,
            pending: Vec::new(),
            reader_done: false,
        }
    }
}

impl<R: Read> Iterator for ByteStream<R> {
    type Item = Result<Vec<u8>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pending.len() >= self.symbol_size {
                let symbol = self.pending.drain(0..self.symbol_size).collect();
                return Some(Ok(symbol));
            }
            if self.reader_done {
                if self.pending.is_empty() {
                    return None;
                }
                let mut symbol = std::mem::take(&mut self.pending);
                symbol.resize(self.symbol_size, 0);
                return Some(Ok(symbol));
            }
            let mut buf = vec![0u8; self.chunk_size];
            match self.reader.read(&mut buf) {
                Ok(0) => self.reader_done = true,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) => return Some(Err(Error::Io(e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn emits_whole_blocks() {
        let data = b"abcdefgh".to_vec();
        let stream = ByteStream::new(Cursor::new(data), 2, 3);
        let blocks: Vec<_> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(blocks, vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec(), b"gh".to_vec()]);
    }

    #[test]
    fn pads_final_short_block() {
        let data = b"abcde".to_vec();
        let stream = ByteStream::new(Cursor::new(data), 3, 1024);
        let blocks: Vec<_> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(blocks, vec![b"abc".to_vec(), vec![b'd', b'e', 0x00]]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let stream = ByteStream::new(Cursor::new(Vec::<u8>::new()), 1, 16);
        assert_eq!(stream.count(), 0);
    }

    #[test]
    fn symbol_boundary_spans_chunk_boundary() {
        // symbol_size 4, chunk_size 3: symbols straddle chunk reads.
        let data = b"0123456789AB".to_vec();
        let stream = ByteStream::new(Cursor::new(data), 4, 3);
        let blocks: Vec<_> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(
            blocks,
            vec![b"0123".to_vec(), b"4567".to_vec(), b"89AB".to_vec()]
        );
    }
}
