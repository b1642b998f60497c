//! Core tokenization primitives.
//!
//! - `buffer`: ping-pong double buffer with token-prefix carry
//! - `tokenizer`: the pull-style state machine
//! - `entities`: opt-in entity reference decoding

pub mod buffer;
pub mod entities;
mod entity_table;
pub mod tokenizer;
