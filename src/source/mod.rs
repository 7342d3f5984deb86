//! Help source input.

mod reader;

pub use reader::{SourceChar, SourceReader, Until, UntilEnd};
