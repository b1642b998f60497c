//! pullxml - streaming pull tokenizer for an XML subset.
//!
//! The tokenizer reads a byte source through a pair of fixed-capacity
//! buffer regions and yields one event per call: an element-open tag or a
//! text run. Closing tags are verified against the open-element stack and
//! consumed silently; nesting depth is reported per event via
//! [`Tokenizer::level`]. Entity references stay encoded in the output and
//! are decoded on demand with [`decode`].
//!
//! Any event position can be captured as a [`Checkpoint`] and resumed
//! later, on the same instance or a fresh one, which is what
//! [`fold_ranges`] builds on to process ranges of one file in parallel.
//!
//! ```
//! use std::io::Cursor;
//! use pullxml::Tokenizer;
//!
//! let doc = Cursor::new(b"<greeting lang=\"en\">hello &amp; welcome</greeting>".to_vec());
//! let mut tokenizer = Tokenizer::new(doc, "inline").unwrap();
//!
//! assert!(tokenizer.next().unwrap());
//! assert_eq!(tokenizer.tag().name(), b"greeting");
//! assert_eq!(tokenizer.tag().attr(b"lang"), Some(b"en" as &[u8]));
//!
//! assert!(tokenizer.next().unwrap());
//! let text = pullxml::decode(tokenizer.tag().text());
//! assert_eq!(text.as_ref(), b"hello & welcome");
//!
//! assert!(!tokenizer.next().unwrap());
//! ```

mod core;
mod error;
mod parallel;
mod source;

pub use crate::core::entities::{decode, decode_to_string};
pub use crate::core::tokenizer::{
    Checkpoint, ParseState, Tag, Tokenizer, DEFAULT_BUFFER_CAPACITY, ROOT_NAME,
};
pub use crate::error::{ErrorKind, ParseError, Result};
pub use crate::parallel::{collect_checkpoints, fold_ranges};
pub use crate::source::{open_source, ByteSource, Bz2Source, FileSource, GzSource};
