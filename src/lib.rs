pub mod error;
pub mod strategy;
pub mod copier;
pub mod signature;

pub use error::{Error, ErrorKind};
pub use strategy::{CopyMode, CopyStrategy, DEFAULT_BLOCK_SIZE, DEFAULT_BUFFERED_SIZE};
pub use copier::{copy, copy_file, copy_with_trace, CopyReport};
pub use signature::{identify, matches, Format, Signature, SignatureMatcher};
