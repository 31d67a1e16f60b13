//! # huffc
//!
//! Static (two-pass) and adaptive (FGK/Vitter-style) Huffman file
//! compression, producing a self-describing compressed container that
//! carries the original file extension and restores the original payload
//! bit-exact on decode.
//!
//! * `adaptive` is the core: a dynamic, sibling-property-preserving
//!   Huffman tree with an NYT escape for unseen symbols and an EOF
//!   terminator, operating over a streaming byte source.
//! * `static_huff` shares the leaf/node data model and bit-packing
//!   machinery with `adaptive`, but builds one canonical tree up front
//!   from a frequency table serialized into the header.
//! * `container` frames either payload with an algorithm tag and the
//!   encoded extension, and dispatches encode/decode to the right codec.
//!
//! ## File Example
//!
//! ```no_run
//! use huffc::{container, STD_OPTIONS};
//! let mut in_file = std::fs::File::open("some_input_path").expect("open failed");
//! let mut out_file = std::fs::File::create("some_output_path").expect("create failed");
//! container::compress(&mut in_file,"txt",&mut out_file,container::Algorithm::Adaptive,&STD_OPTIONS)
//!     .expect("compression failed");
//! ```

pub mod adaptive;
pub mod container;
pub mod static_huff;
mod tools;

pub use tools::bit_io;
pub use tools::byte_stream;
pub use tools::node;

/// Crate-wide error type.
#[derive(thiserror::Error,Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt input: {0}")]
    CorruptInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String)
}

pub type Result<T> = std::result::Result<T,Error>;

/// Options controlling the byte-granularity and buffering of a codec run.
#[derive(Clone,Debug)]
pub struct Options {
    /// size in bytes of one symbol; the adaptive coder always uses 1
    pub symbol_size: usize,
    /// size in bytes of one read from the underlying file
    pub chunk_size: usize
}

pub const STD_OPTIONS: Options = Options {
    symbol_size: 1,
    chunk_size: 1024
};

impl Options {
    pub fn validate(&self) -> Result<()> {
        if self.symbol_size == 0 {
            return Err(Error::InvalidConfig("symbol_size must be positive".to_string()));
        }
        Ok(())
    }
}
