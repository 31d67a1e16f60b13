//! Framing: algorithm tag, encoded extension, payload.
//!
//! Dispatches on the top bit of byte 0 (`0` = static, `1` = adaptive) per
//! `spec.md` §6. Grounded in `examples/original_source/src/adaptiveHuffman.py`
//! and `basicHuffman.py`'s module-level header comments, which this module's
//! two branches mirror directly.

use std::io::{Read, Write};

use crate::adaptive::AdaptiveTree;
use crate::static_huff;
use crate::tools::bit_io::{BitSink, BitSource};
use crate::tools::byte_stream::ByteStream;
use crate::{Error, Options, Result};

/// Which codec a container payload was (or should be) written with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Static,
    Adaptive,
}

fn eof_to_corrupt(e: std::io::Error, msg: &str) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::CorruptInput(msg.to_string())
    } else {
        Error::Io(e)
    }
}

/// Compress `reader`'s contents to `writer`, framed with `extension`
/// (carrying its leading dot, or empty) and an algorithm tag.
pub fn compress<R: Read, W: Write>(
    reader: &mut R,
    extension: &str,
    writer: &mut W,
    algorithm: Algorithm,
    opts: &Options,
) -> Result<()> {
    opts.validate()?;
    match algorithm {
        Algorithm::Static => static_huff::compress(reader, extension, writer, opts),
        Algorithm::Adaptive => compress_adaptive(reader, extension, writer, opts),
    }
}

/// Peek the tag from the container's first byte and dispatch to the
/// matching codec. Returns the recovered file extension (leading dot, or
/// empty).
pub fn expand<R: Read, W: Write>(reader: &mut R, writer: &mut W, opts: &Options) -> Result<String> {
    let mut tag_byte = [0u8; 1];
    reader.read_exact(&mut tag_byte).map_err(|e| eof_to_corrupt(e, "empty file has no container header"))?;
    match tag_byte[0] >> 7 {
        1 => expand_adaptive(tag_byte[0], reader, writer, opts),
        0 => {
            let mut chained = (&tag_byte[..]).chain(reader);
            static_huff::expand(&mut chained, writer)
        }
        _ => Err(Error::CorruptInput("unknown algorithm tag in container header".to_string())),
    }
}

/// One continuous adaptive tree encodes the extension's bytes, then the
/// file's contents, then EOF — matching `adaptiveHuffman.py`'s `encode`,
/// which never resets its tree between the two.
fn compress_adaptive<R: Read, W: Write>(
    reader: &mut R,
    extension: &str,
    writer: &mut W,
    opts: &Options,
) -> Result<()> {
    let mut tree = AdaptiveTree::new(1, true);

    let mut ext_sink = BitSink::new();
    for byte in extension.as_bytes() {
        ext_sink.push_bits(&tree.encode(&[*byte]));
    }
    let ext_bit_len = ext_sink.len();
    if ext_bit_len > 0b0111_1111 {
        return Err(Error::InvalidConfig("encoded extension exceeds 127 bits".to_string()));
    }
    let (ext_bytes, _pad) = ext_sink.finish();

    writer.write_all(&[0b1000_0000 | ext_bit_len as u8])?;
    writer.write_all(&ext_bytes)?;

    let mut content_sink = BitSink::new();
    let symbols = ByteStream::new(reader, 1, opts.chunk_size);
    tree.encode_stream(symbols, &mut content_sink, writer)?;
    tree.finish_stream(content_sink, writer)
}

/// Dual of `compress_adaptive`: the same tree decodes the extension's `m`
/// bits first, then keeps decoding the rest of the stream as contents.
fn expand_adaptive<R: Read, W: Write>(
    header_byte: u8,
    reader: &mut R,
    writer: &mut W,
    opts: &Options,
) -> Result<String> {
    let m = (header_byte & 0b0111_1111) as usize;
    let ext_byte_len = (m + 7) / 8;
    let mut ext_bytes = vec![0u8; ext_byte_len];
    reader.read_exact(&mut ext_bytes)
        .map_err(|e| eof_to_corrupt(e, "declared extension bit-count exceeds bytes present"))?;

    let mut tree = AdaptiveTree::new(1, true);
    let mut ext_source = BitSource::new(&ext_bytes, m);
    let (ext_raw, eof) = tree.decode_chunk(&mut ext_source)?;
    if eof {
        return Err(Error::CorruptInput("EOF symbol appeared inside the encoded extension".to_string()));
    }
    let extension = String::from_utf8_lossy(&ext_raw).into_owned();

    tree.decode_stream(reader, writer, opts.chunk_size)?;
    Ok(extension)
}
