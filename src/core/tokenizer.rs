//! Pull tokenizer for an XML subset.
//!
//! The tokenizer scans the active buffer region byte by byte, switching to
//! bulk `memchr` scans wherever a token terminator can be located without
//! inspecting intermediate bytes (text runs, quoted attribute values,
//! comment bodies). One call to [`Tokenizer::next`] produces at most one
//! event: an element-open tag (plain or self-closing) or a text run. Close
//! tags are matched against the open-element stack and consumed silently;
//! their effect is observable through [`Tokenizer::level`].
//!
//! After every event a [`Checkpoint`] can be taken and later fed to
//! [`Tokenizer::restore`] on any instance reading the same input, which
//! re-produces the event that followed the checkpoint and continues from
//! there.

use std::path::Path;

use log::debug;
use memchr::memchr;

use crate::core::buffer::{DoubleBuffer, Refill};
use crate::error::{ErrorKind, ParseError, Result};
use crate::source::{open_source, ByteSource};

/// Default capacity of each buffer region.
pub const DEFAULT_BUFFER_CAPACITY: usize = 16 * 1024;

/// Name reported by [`Tag::name`] once the end of the stream is reached.
pub const ROOT_NAME: &[u8] = b"[root]";

/// Tokenizer mode. Part of a [`Checkpoint`]; a resumed instance re-enters
/// the state machine exactly where the snapshot left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Between constructs, skipping whitespace.
    Idle,
    /// Inside a text run, bulk-scanning for `<`.
    Text,
    /// Just consumed `<`; the next byte decides the construct.
    TagTentative,
    /// Accumulating an element name.
    TagName,
    /// Inside a tag, between attributes.
    InTag,
    /// Accumulating an attribute key.
    AttrKey,
    /// Attribute key complete, `=` not yet seen.
    AfterKey,
    /// `=` seen, waiting for the opening quote.
    AwaitingValue,
    /// Accumulating a single-quoted attribute value.
    AttrValueSq,
    /// Accumulating a double-quoted attribute value.
    AttrValueDq,
    /// Accumulating a closing-tag name.
    CloseTagName,
    /// Closing-tag name complete, waiting for `>`.
    CloseTagWs,
    /// Consumed `<!`, expecting the first `-`.
    CommentIntro1,
    /// Consumed `<!-`, expecting the second `-`.
    CommentIntro2,
    /// Inside a comment body, bulk-scanning for `-`.
    Comment,
    /// Saw one `-` inside a comment.
    CommentDash1,
    /// Saw `--` inside a comment, expecting `>`.
    CommentDash2,
    /// Inside a processing instruction, skipping to `>`.
    PiSkip,
    /// Consumed `/` in a tag, expecting `>`.
    AwaitingClose,
    /// Tag complete; skipping trailing whitespace before reporting it.
    PostTagWs,
}

/// Entry of the open-element stack. The root sentinel sits at the bottom
/// and is only popped at clean end-of-stream.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StackEntry {
    Root,
    Element(Box<[u8]>),
}

/// Snapshot of tokenizer state plus the byte offset it corresponds to.
///
/// Value-typed and independent of buffer contents: it can be stored, sent
/// to another thread, and fed to [`Tokenizer::restore`] on a fresh instance
/// reading the same input. Only offsets obtained from checkpoints are valid
/// resume points; arbitrary byte offsets are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    state: ParseState,
    stack: Vec<StackEntry>,
    pending: usize,
    root_done: bool,
    offset: u64,
}

impl Checkpoint {
    /// Absolute byte position in the source corresponding to the state just
    /// before the most recently returned event.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

/// One tokenizer event: an element-open tag or a text run.
///
/// The tokenizer owns a single `Tag` and overwrites it on every call to
/// [`Tokenizer::next`]; copy out anything needed beyond that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    name: Vec<u8>,
    text: Vec<u8>,
    attrs: Vec<(Vec<u8>, Vec<u8>)>,
    self_closing: bool,
}

impl Tag {
    /// Element name; empty for text events, [`ROOT_NAME`] at end-of-stream.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Text content; empty unless this is a text event.
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Attributes in source order. Duplicate keys are preserved as separate
    /// entries.
    pub fn attributes(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.attrs
    }

    /// First attribute value for `key`, if present.
    pub fn attr(&self, key: &[u8]) -> Option<&[u8]> {
        self.attrs
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v.as_slice())
    }

    /// True for text events.
    pub fn is_text(&self) -> bool {
        self.name.is_empty()
    }

    /// True when the element was written `<name/>`. Self-closing elements
    /// are never pushed on the open stack.
    pub fn self_closing(&self) -> bool {
        self.self_closing
    }

    /// Name as UTF-8, if valid.
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.name).ok()
    }

    /// Text as UTF-8, if valid.
    pub fn text_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.text).ok()
    }

    fn clear(&mut self) {
        self.name.clear();
        self.text.clear();
        self.attrs.clear();
        self.self_closing = false;
    }
}

enum Scan {
    Event,
    NeedRefill,
}

/// Streaming pull tokenizer over a [`ByteSource`].
pub struct Tokenizer<S: ByteSource> {
    source: S,
    source_id: String,
    buf: DoubleBuffer,
    state: ParseState,
    stack: Vec<StackEntry>,
    /// Compensates for the one-call lag between pushing a newly opened
    /// element and reporting it: 0 or 1.
    pending: usize,
    /// Snapshot taken at the start of the most recent `next()` call.
    prev: Checkpoint,
    tag: Tag,
    /// Start of the in-progress token in the active region. Only meaningful
    /// in accumulating states.
    tok_start: usize,
    /// Completed attribute key awaiting its value.
    key: Vec<u8>,
    /// Closing-tag name being matched against the stack.
    close_name: Vec<u8>,
    /// Set once the single top-level element has closed; a second one is
    /// fatal, while comments and processing instructions remain fine.
    root_done: bool,
    finished: bool,
}

impl Tokenizer<Box<dyn ByteSource + Send>> {
    /// Opens `path`, routing through gzip/bzip2 decompression when the
    /// extension indicates a compressed file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(path, DEFAULT_BUFFER_CAPACITY)
    }

    /// Like [`Tokenizer::open`] with an explicit buffer region capacity.
    /// No single token (tag name, attribute key or value, text run) may
    /// exceed the capacity.
    pub fn open_with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref();
        let source_id = path.display().to_string();
        let source = open_source(path).map_err(|e| {
            ParseError::new(
                ErrorKind::Io,
                &source_id,
                0,
                format!("could not open source: {e}"),
            )
        })?;
        Tokenizer::with_capacity(source, source_id, capacity)
    }
}

impl<S: ByteSource> Tokenizer<S> {
    /// Wraps an already-open byte source.
    pub fn new(source: S, source_id: impl Into<String>) -> Result<Self> {
        Self::with_capacity(source, source_id, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(
        mut source: S,
        source_id: impl Into<String>,
        capacity: usize,
    ) -> Result<Self> {
        let source_id = source_id.into();
        if capacity == 0 {
            return Err(ParseError::new(
                ErrorKind::Config,
                &source_id,
                0,
                "buffer capacity must be non-zero",
            ));
        }
        debug!("opening {} with region capacity {}", source_id, capacity);
        let mut buf = DoubleBuffer::new(capacity);
        buf.prime(&mut source, 0)
            .map_err(|e| ParseError::new(ErrorKind::Io, &source_id, 0, e.to_string()))?;
        let stack = vec![StackEntry::Root];
        Ok(Tokenizer {
            prev: Checkpoint {
                state: ParseState::Idle,
                stack: stack.clone(),
                pending: 0,
                root_done: false,
                offset: 0,
            },
            source,
            source_id,
            buf,
            state: ParseState::Idle,
            stack,
            pending: 0,
            tag: Tag::default(),
            tok_start: 0,
            key: Vec::new(),
            close_name: Vec::new(),
            root_done: false,
            finished: false,
        })
    }

    /// Label identifying the byte source in errors.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// The most recently produced event. Overwritten by every call to
    /// [`Tokenizer::next`].
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Nesting depth of the most recently returned event, root excluded.
    pub fn level(&self) -> usize {
        self.stack.len().saturating_sub(self.pending)
    }

    /// Snapshot of the state immediately before the most recently returned
    /// event. Feeding it to [`Tokenizer::restore`] re-produces that event.
    pub fn checkpoint(&self) -> Checkpoint {
        self.prev.clone()
    }

    /// Advances to the next event. Returns `Ok(true)` when an event was
    /// produced (inspect it via [`Tokenizer::tag`]) and `Ok(false)` at
    /// clean end-of-stream.
    pub fn next(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        self.prev = Checkpoint {
            state: self.state,
            stack: self.stack.clone(),
            pending: self.pending,
            root_done: self.root_done,
            offset: self.buf.absolute_pos(),
        };
        if self.pending > 0 {
            self.pending -= 1;
        }
        self.tag.clear();

        loop {
            if let Scan::Event = self.scan()? {
                return Ok(true);
            }
            let keep = match self.state {
                ParseState::TagName
                | ParseState::CloseTagName
                | ParseState::AttrKey
                | ParseState::AttrValueSq
                | ParseState::AttrValueDq
                | ParseState::Text => Some(self.tok_start),
                _ => None,
            };
            match self.buf.refill(&mut self.source, keep) {
                Ok(Refill::Filled) => self.tok_start = 0,
                Ok(Refill::Overflow) => {
                    return Err(self.err(
                        ErrorKind::TokenOverflow,
                        format!(
                            "token exceeds buffer region capacity of {} bytes",
                            self.buf.capacity()
                        ),
                    ));
                }
                Ok(Refill::Eof) => break,
                Err(e) => return Err(self.err(ErrorKind::Io, e.to_string())),
            }
        }

        // End of input. An event whose post-tag whitespace skip is still
        // pending is flushed before the end of the stream is signalled.
        if self.state == ParseState::PostTagWs {
            self.state = ParseState::Idle;
            return Ok(true);
        }
        if self.state == ParseState::Idle && self.stack.len() == 1 {
            self.stack.pop();
            self.finished = true;
            self.tag.clear();
            self.tag.name.extend_from_slice(ROOT_NAME);
            return Ok(false);
        }
        let msg = match self.stack.last() {
            Some(StackEntry::Element(open)) => format!(
                "document ended with '<{}>' still open",
                String::from_utf8_lossy(open)
            ),
            _ => "document ended inside markup".to_string(),
        };
        Err(self.err(ErrorKind::Incomplete, msg))
    }

    /// Discards the current buffers, seeks the source to the checkpoint's
    /// offset, re-enters the state machine with the snapshot's mode and
    /// stack, and immediately produces one event (the event that followed
    /// the checkpoint), so the caller lands on a real token boundary.
    pub fn restore(&mut self, checkpoint: &Checkpoint) -> Result<bool> {
        debug!("resuming {} at offset {}", self.source_id, checkpoint.offset);
        self.source.seek(checkpoint.offset).map_err(|e| {
            ParseError::new(
                ErrorKind::Io,
                &self.source_id,
                checkpoint.offset,
                e.to_string(),
            )
        })?;
        self.buf
            .prime(&mut self.source, checkpoint.offset)
            .map_err(|e| {
                ParseError::new(
                    ErrorKind::Io,
                    &self.source_id,
                    checkpoint.offset,
                    e.to_string(),
                )
            })?;
        self.state = checkpoint.state;
        self.stack = checkpoint.stack.clone();
        self.pending = checkpoint.pending;
        self.root_done = checkpoint.root_done;
        self.prev = checkpoint.clone();
        self.tok_start = 0;
        self.finished = false;
        self.next()
    }

    /// Rewinds to the start of the input.
    pub fn rewind(&mut self) -> Result<()> {
        self.source
            .seek(0)
            .map_err(|e| ParseError::new(ErrorKind::Io, &self.source_id, 0, e.to_string()))?;
        self.buf
            .prime(&mut self.source, 0)
            .map_err(|e| ParseError::new(ErrorKind::Io, &self.source_id, 0, e.to_string()))?;
        self.state = ParseState::Idle;
        self.stack = vec![StackEntry::Root];
        self.pending = 0;
        self.tag.clear();
        self.tok_start = 0;
        self.root_done = false;
        self.finished = false;
        self.prev = Checkpoint {
            state: ParseState::Idle,
            stack: self.stack.clone(),
            pending: 0,
            root_done: false,
            offset: 0,
        };
        Ok(())
    }

    /// Scans the active region until an event completes or the region is
    /// exhausted mid-construct.
    fn scan(&mut self) -> Result<Scan> {
        use ParseState::*;

        while self.buf.pos() < self.buf.len() {
            let pos = self.buf.pos();
            let c = self.buf.data()[pos];
            match self.state {
                Idle => {
                    if c.is_ascii_whitespace() {
                        self.buf.advance(1);
                    } else if c == b'<' {
                        self.state = TagTentative;
                        self.buf.advance(1);
                    } else if self.stack.len() == 1 {
                        return Err(self.err(ErrorKind::Syntax, "text content at document root"));
                    } else {
                        self.state = Text;
                        self.tok_start = pos;
                    }
                }

                Text => match self.find_ahead(b'<') {
                    Some(lt) => {
                        let start = self.tok_start;
                        self.tag.text.extend_from_slice(&self.buf.data()[start..lt]);
                        self.buf.set_pos(lt + 1);
                        self.state = TagTentative;
                        return Ok(Scan::Event);
                    }
                    None => {
                        let len = self.buf.len();
                        self.buf.set_pos(len);
                    }
                },

                TagTentative => {
                    if c == b'/' {
                        self.state = CloseTagName;
                        self.tok_start = pos + 1;
                        self.buf.advance(1);
                    } else if c == b'?' {
                        self.state = PiSkip;
                        self.buf.advance(1);
                    } else if c == b'!' {
                        self.state = CommentIntro1;
                        self.buf.advance(1);
                    } else if is_name_byte(c) {
                        if self.stack.len() == 1 && self.root_done {
                            return Err(
                                self.err(ErrorKind::Syntax, "multiple top-level elements")
                            );
                        }
                        self.state = TagName;
                        self.tok_start = pos;
                        self.buf.advance(1);
                    } else {
                        return Err(self.err(ErrorKind::Syntax, "expected tag name after '<'"));
                    }
                }

                TagName => {
                    if c.is_ascii_whitespace() {
                        self.take_name(pos);
                        self.state = InTag;
                        self.buf.advance(1);
                    } else if c == b'>' {
                        self.take_name(pos);
                        self.open_element();
                        self.state = PostTagWs;
                        self.buf.advance(1);
                    } else if c == b'/' {
                        self.take_name(pos);
                        self.tag.self_closing = true;
                        self.state = AwaitingClose;
                        self.buf.advance(1);
                    } else if is_name_byte(c) {
                        self.buf.advance(1);
                    } else {
                        return Err(self.err(ErrorKind::Syntax, "invalid character in tag name"));
                    }
                }

                InTag => {
                    if c.is_ascii_whitespace() {
                        self.buf.advance(1);
                    } else if is_name_byte(c) {
                        self.state = AttrKey;
                        self.tok_start = pos;
                        self.buf.advance(1);
                    } else if c == b'/' {
                        self.tag.self_closing = true;
                        self.state = AwaitingClose;
                        self.buf.advance(1);
                    } else if c == b'>' {
                        self.open_element();
                        self.state = PostTagWs;
                        self.buf.advance(1);
                    } else {
                        return Err(self.err(ErrorKind::Syntax, "expected valid tag"));
                    }
                }

                AttrKey => {
                    if c.is_ascii_whitespace() {
                        self.take_key(pos);
                        self.state = AfterKey;
                        self.buf.advance(1);
                    } else if c == b'=' {
                        self.take_key(pos);
                        self.state = AwaitingValue;
                        self.buf.advance(1);
                    } else if is_name_byte(c) {
                        self.buf.advance(1);
                    } else {
                        return Err(
                            self.err(ErrorKind::Syntax, "expected attribute key character or '='")
                        );
                    }
                }

                AfterKey => {
                    if c.is_ascii_whitespace() {
                        self.buf.advance(1);
                    } else if c == b'=' {
                        self.state = AwaitingValue;
                        self.buf.advance(1);
                    } else {
                        let msg = format!(
                            "expected '=' after attribute key '{}'",
                            String::from_utf8_lossy(&self.key)
                        );
                        return Err(self.err(ErrorKind::Syntax, msg));
                    }
                }

                AwaitingValue => {
                    if c.is_ascii_whitespace() {
                        self.buf.advance(1);
                    } else if c == b'\'' {
                        self.state = AttrValueSq;
                        self.tok_start = pos + 1;
                        self.buf.advance(1);
                    } else if c == b'"' {
                        self.state = AttrValueDq;
                        self.tok_start = pos + 1;
                        self.buf.advance(1);
                    } else {
                        return Err(self.err(ErrorKind::Syntax, "expected attribute value"));
                    }
                }

                AttrValueSq | AttrValueDq => {
                    let quote = if self.state == AttrValueSq { b'\'' } else { b'"' };
                    match self.find_ahead(quote) {
                        Some(end) => {
                            self.take_attr(end);
                            self.state = InTag;
                            self.buf.set_pos(end + 1);
                        }
                        None => {
                            let len = self.buf.len();
                            self.buf.set_pos(len);
                        }
                    }
                }

                CloseTagName => {
                    if c.is_ascii_whitespace() {
                        self.take_close_name(pos);
                        self.state = CloseTagWs;
                        self.buf.advance(1);
                    } else if c == b'>' {
                        self.take_close_name(pos);
                        self.pop_element()?;
                        self.state = Idle;
                        self.buf.advance(1);
                    } else if is_name_byte(c) {
                        self.buf.advance(1);
                    } else {
                        return Err(
                            self.err(ErrorKind::Syntax, "invalid character in closing tag")
                        );
                    }
                }

                CloseTagWs => {
                    if c.is_ascii_whitespace() {
                        self.buf.advance(1);
                    } else if c == b'>' {
                        self.pop_element()?;
                        self.state = Idle;
                        self.buf.advance(1);
                    } else {
                        return Err(self.err(ErrorKind::Syntax, "expected '>'"));
                    }
                }

                CommentIntro1 => {
                    if c == b'-' {
                        self.state = CommentIntro2;
                        self.buf.advance(1);
                    } else {
                        return Err(self.err(ErrorKind::Syntax, "expected comment"));
                    }
                }

                CommentIntro2 => {
                    if c == b'-' {
                        self.state = Comment;
                        self.buf.advance(1);
                    } else {
                        return Err(self.err(ErrorKind::Syntax, "expected comment"));
                    }
                }

                Comment => match self.find_ahead(b'-') {
                    Some(dash) => {
                        self.state = CommentDash1;
                        self.buf.set_pos(dash + 1);
                    }
                    None => {
                        let len = self.buf.len();
                        self.buf.set_pos(len);
                    }
                },

                CommentDash1 => {
                    self.state = if c == b'-' { CommentDash2 } else { Comment };
                    self.buf.advance(1);
                }

                CommentDash2 => {
                    if c == b'>' {
                        self.state = Idle;
                    } else if c != b'-' {
                        // A dash keeps the `-->` lookahead alive, so `--->`
                        // still closes the comment.
                        self.state = Comment;
                    }
                    self.buf.advance(1);
                }

                PiSkip => match self.find_ahead(b'>') {
                    Some(gt) => {
                        self.state = Idle;
                        self.buf.set_pos(gt + 1);
                    }
                    None => {
                        let len = self.buf.len();
                        self.buf.set_pos(len);
                    }
                },

                AwaitingClose => {
                    if c == b'>' {
                        if self.stack.len() == 1 {
                            self.root_done = true;
                        }
                        self.state = PostTagWs;
                        self.buf.advance(1);
                    } else {
                        return Err(
                            self.err(ErrorKind::Syntax, "expected '>' to close empty element")
                        );
                    }
                }

                PostTagWs => {
                    if c.is_ascii_whitespace() {
                        self.buf.advance(1);
                    } else {
                        // The cursor stays on this byte; the next call
                        // re-examines it in Idle.
                        self.state = Idle;
                        return Ok(Scan::Event);
                    }
                }
            }
        }
        Ok(Scan::NeedRefill)
    }

    fn find_ahead(&self, byte: u8) -> Option<usize> {
        let pos = self.buf.pos();
        memchr(byte, &self.buf.data()[pos..]).map(|i| pos + i)
    }

    fn take_name(&mut self, end: usize) {
        let start = self.tok_start;
        self.tag.name.clear();
        self.tag.name.extend_from_slice(&self.buf.data()[start..end]);
    }

    fn take_key(&mut self, end: usize) {
        let start = self.tok_start;
        self.key.clear();
        self.key.extend_from_slice(&self.buf.data()[start..end]);
    }

    fn take_attr(&mut self, end: usize) {
        let start = self.tok_start;
        let key = std::mem::take(&mut self.key);
        let value = self.buf.data()[start..end].to_vec();
        self.tag.attrs.push((key, value));
    }

    fn take_close_name(&mut self, end: usize) {
        let start = self.tok_start;
        self.close_name.clear();
        self.close_name
            .extend_from_slice(&self.buf.data()[start..end]);
    }

    fn open_element(&mut self) {
        self.stack
            .push(StackEntry::Element(self.tag.name.clone().into_boxed_slice()));
        self.pending += 1;
    }

    fn pop_element(&mut self) -> Result<()> {
        let outcome = match self.stack.last() {
            Some(StackEntry::Element(open)) => {
                if open.as_ref() == self.close_name.as_slice() {
                    Ok(())
                } else {
                    Err(format!(
                        "closing wrong tag '</{}>', expected close of '<{}>'",
                        String::from_utf8_lossy(&self.close_name),
                        String::from_utf8_lossy(open)
                    ))
                }
            }
            _ => Err(format!(
                "unexpected closing tag '</{}>' at document root",
                String::from_utf8_lossy(&self.close_name)
            )),
        };
        match outcome {
            Ok(()) => {
                self.stack.pop();
                if self.stack.len() == 1 {
                    self.root_done = true;
                }
                Ok(())
            }
            Err(msg) => Err(self.err(ErrorKind::MismatchedClose, msg)),
        }
    }

    fn err(&self, kind: ErrorKind, message: impl Into<String>) -> ParseError {
        ParseError::new(kind, &self.source_id, self.buf.absolute_pos(), message)
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':') || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tokenizer(doc: &str) -> Tokenizer<Cursor<Vec<u8>>> {
        tokenizer_with_capacity(doc, DEFAULT_BUFFER_CAPACITY)
    }

    fn tokenizer_with_capacity(doc: &str, capacity: usize) -> Tokenizer<Cursor<Vec<u8>>> {
        Tokenizer::with_capacity(Cursor::new(doc.as_bytes().to_vec()), "test", capacity).unwrap()
    }

    /// Owned copy of one event plus the level it was reported at.
    #[derive(Debug, Clone, PartialEq)]
    struct Event {
        name: Vec<u8>,
        text: Vec<u8>,
        attrs: Vec<(Vec<u8>, Vec<u8>)>,
        self_closing: bool,
        level: usize,
    }

    fn snapshot<S: ByteSource>(t: &Tokenizer<S>) -> Event {
        Event {
            name: t.tag().name().to_vec(),
            text: t.tag().text().to_vec(),
            attrs: t.tag().attributes().to_vec(),
            self_closing: t.tag().self_closing(),
            level: t.level(),
        }
    }

    fn collect<S: ByteSource>(t: &mut Tokenizer<S>) -> Vec<Event> {
        let mut events = Vec::new();
        while t.next().unwrap() {
            events.push(snapshot(t));
        }
        events
    }

    #[test]
    fn test_simple_document() {
        let mut t = tokenizer("<a><b>hi</b></a>");
        assert!(t.next().unwrap());
        assert_eq!(t.tag().name(), b"a");
        assert_eq!(t.level(), 1);
        assert!(t.next().unwrap());
        assert_eq!(t.tag().name(), b"b");
        assert_eq!(t.level(), 2);
        assert!(t.next().unwrap());
        assert!(t.tag().is_text());
        assert_eq!(t.tag().text(), b"hi");
        assert_eq!(t.level(), 3);
        assert!(!t.next().unwrap());
        assert_eq!(t.tag().name(), ROOT_NAME);
        assert!(!t.next().unwrap());
    }

    #[test]
    fn test_self_closing_with_attributes() {
        let mut t = tokenizer("<r x=\"1\" y='2'/>");
        assert!(t.next().unwrap());
        let tag = t.tag();
        assert_eq!(tag.name(), b"r");
        assert!(tag.self_closing());
        assert_eq!(
            tag.attributes(),
            &[
                (b"x".to_vec(), b"1".to_vec()),
                (b"y".to_vec(), b"2".to_vec())
            ]
        );
        assert_eq!(t.level(), 1);
        assert!(!t.next().unwrap());
    }

    #[test]
    fn test_self_closing_does_not_nest_siblings() {
        let mut t = tokenizer("<a><r x=\"1\"/><s/></a>");
        let events = collect(&mut t);
        let levels: Vec<usize> = events.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![1, 2, 2]);
        assert!(events[1].self_closing);
        assert!(events[2].self_closing);
        assert!(!events[0].self_closing);
    }

    #[test]
    fn test_duplicate_attributes_first_match_wins() {
        let mut t = tokenizer("<a x=\"1\" x=\"2\"/>");
        assert!(t.next().unwrap());
        assert_eq!(t.tag().attributes().len(), 2);
        assert_eq!(t.tag().attr(b"x"), Some(b"1" as &[u8]));
        assert_eq!(t.tag().attr(b"missing"), None);
    }

    #[test]
    fn test_attribute_value_whitespace_preserved() {
        let mut t = tokenizer("<a msg=\"two  words\" />");
        assert!(t.next().unwrap());
        assert_eq!(t.tag().attr(b"msg"), Some(b"two  words" as &[u8]));
        assert!(t.tag().self_closing());
    }

    #[test]
    fn test_mismatched_close_is_fatal() {
        let mut t = tokenizer("<a><b></a>");
        assert!(t.next().unwrap());
        assert!(t.next().unwrap());
        let err = t.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MismatchedClose);
        assert!(err.message.contains("'<b>'"), "message: {}", err.message);
    }

    #[test]
    fn test_text_at_document_root_is_fatal() {
        let mut t = tokenizer("junk<a/>");
        let err = t.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);

        let mut t = tokenizer("<a/>junk");
        assert!(t.next().unwrap());
        let err = t.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn test_second_top_level_element_is_fatal() {
        for doc in ["<a/><b/>", "<a></a><b>x</b>"] {
            let mut t = tokenizer(doc);
            assert!(t.next().unwrap(), "doc: {doc}");
            let err = t.next().unwrap_err();
            assert_eq!(err.kind, ErrorKind::Syntax, "doc: {doc}");
            assert!(err.message.contains("top-level"), "doc: {doc}");
        }
    }

    #[test]
    fn test_trailing_comment_and_pi_after_root() {
        let mut t = tokenizer("<a/><!-- tail --><?done?>\n");
        assert!(t.next().unwrap());
        assert_eq!(t.tag().name(), b"a");
        assert!(!t.next().unwrap());
    }

    #[test]
    fn test_incomplete_document_is_fatal() {
        let mut t = tokenizer("<a><b></b>");
        assert!(t.next().unwrap());
        assert!(t.next().unwrap());
        let err = t.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Incomplete);
        assert!(err.message.contains("'<a>'"), "message: {}", err.message);
    }

    #[test]
    fn test_attribute_without_value_is_fatal() {
        let mut t = tokenizer("<a key other=\"1\">x</a>");
        let err = t.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(err.message.contains("'key'"), "message: {}", err.message);
    }

    #[test]
    fn test_comments_are_skipped() {
        let mut t = tokenizer("<a><!-- a <fake> tag - or -- two -->\n<b/></a>");
        let events = collect(&mut t);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].name, b"b");
    }

    #[test]
    fn test_comment_closed_by_extra_dash() {
        // "--->" contains "-->" and closes the comment.
        let mut t = tokenizer("<a><!-- dashes ---><b/></a>");
        let events = collect(&mut t);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].name, b"b");
    }

    #[test]
    fn test_malformed_comment_is_fatal() {
        let mut t = tokenizer("<a><!oops></a>");
        assert!(t.next().unwrap());
        let err = t.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Syntax);
        assert!(err.message.contains("comment"));
    }

    #[test]
    fn test_processing_instruction_is_skipped() {
        let mut t = tokenizer("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a/>");
        let events = collect(&mut t);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, b"a");
    }

    #[test]
    fn test_closing_tag_with_whitespace() {
        let mut t = tokenizer("<a><b>x</b ></a >");
        let events = collect(&mut t);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_entities_left_encoded() {
        let mut t = tokenizer("<a k=\"&lt;v&gt;\">x &amp; y</a>");
        assert!(t.next().unwrap());
        assert_eq!(t.tag().attr(b"k"), Some(b"&lt;v&gt;" as &[u8]));
        assert!(t.next().unwrap());
        assert_eq!(t.tag().text(), b"x &amp; y");
    }

    const SWEEP_DOC: &str = "<root a=\"12345\" b='xy'>\n  \
         <item k=\"v\">text one</item>\n  \
         <empty/>\n  \
         <item>more</item>\n  \
         <!-- interlude -->\n\
         </root>\n";

    #[test]
    fn test_events_independent_of_buffer_capacity() {
        let mut reference = tokenizer(SWEEP_DOC);
        let expected = collect(&mut reference);
        assert_eq!(expected.len(), 6);
        // Every capacity down to barely-above-largest-token produces the
        // identical sequence, despite many mid-token refills.
        for capacity in [9, 12, 16, 33, 64, 4096] {
            let mut t = tokenizer_with_capacity(SWEEP_DOC, capacity);
            assert_eq!(collect(&mut t), expected, "capacity {capacity}");
        }
    }

    #[test]
    fn test_token_larger_than_region_is_fatal() {
        let mut t = tokenizer_with_capacity("<averylongtagname/>", 8);
        let err = t.next().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenOverflow);
    }

    #[test]
    fn test_levels_match_tree_depth() {
        let mut t = tokenizer(SWEEP_DOC);
        let events = collect(&mut t);
        // Text sits one below its enclosing element; self-closing elements
        // never deepen their siblings.
        let levels: Vec<usize> = events.iter().map(|e| e.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 2, 2, 3]);
    }

    #[test]
    fn test_trailing_event_flushed_at_eof() {
        // The input ends while the post-tag whitespace skip is still
        // pending; the event must not be lost.
        for doc in ["<a/>", "<a/>\n", "<a></a>"] {
            let mut t = tokenizer(doc);
            assert!(t.next().unwrap(), "doc: {doc}");
            assert_eq!(t.tag().name(), b"a");
            assert!(!t.next().unwrap(), "doc: {doc}");
        }
    }

    #[test]
    fn test_empty_input() {
        let mut t = tokenizer("");
        assert!(!t.next().unwrap());
        let mut t = tokenizer("   \n ");
        assert!(!t.next().unwrap());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Tokenizer::with_capacity(Cursor::new(b"<a/>".to_vec()), "test", 0)
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn test_checkpoint_resume_replays_remaining_events() {
        let doc = SWEEP_DOC;
        let mut t = tokenizer(doc);
        let mut events = Vec::new();
        let mut checkpoints = Vec::new();
        while t.next().unwrap() {
            checkpoints.push(t.checkpoint());
            events.push(snapshot(&t));
        }

        for (i, checkpoint) in checkpoints.iter().enumerate() {
            let mut fresh = tokenizer(doc);
            // restore() re-produces the event the checkpoint was taken
            // after, then the identical remaining sequence.
            assert!(fresh.restore(checkpoint).unwrap());
            let mut replayed = vec![snapshot(&fresh)];
            replayed.extend(collect(&mut fresh));
            assert_eq!(replayed, events[i..].to_vec(), "checkpoint {i}");
        }
    }

    #[test]
    fn test_checkpoint_resume_across_small_buffers() {
        let doc = SWEEP_DOC;
        let mut t = tokenizer_with_capacity(doc, 9);
        assert!(t.next().unwrap());
        assert!(t.next().unwrap());
        let checkpoint = t.checkpoint();
        let second = snapshot(&t);
        let tail = collect(&mut t);

        let mut fresh = tokenizer_with_capacity(doc, 9);
        assert!(fresh.restore(&checkpoint).unwrap());
        assert_eq!(snapshot(&fresh), second);
        assert_eq!(collect(&mut fresh), tail);
    }

    #[test]
    fn test_restore_on_same_instance() {
        let mut t = tokenizer("<a><b>hi</b><c/></a>");
        assert!(t.next().unwrap());
        assert!(t.next().unwrap());
        let checkpoint = t.checkpoint();
        let here = snapshot(&t);
        let tail = collect(&mut t);
        assert!(t.restore(&checkpoint).unwrap());
        assert_eq!(snapshot(&t), here);
        assert_eq!(collect(&mut t), tail);
    }

    #[test]
    fn test_rewind() {
        let mut t = tokenizer("<a><b/></a>");
        let first = collect(&mut t);
        t.rewind().unwrap();
        assert_eq!(collect(&mut t), first);
    }

    #[test]
    fn test_checkpoint_offset_is_monotonic() {
        let mut t = tokenizer(SWEEP_DOC);
        let mut last = 0u64;
        let mut first = true;
        while t.next().unwrap() {
            let offset = t.checkpoint().offset();
            if !first {
                assert!(offset > last);
            }
            first = false;
            last = offset;
        }
    }

    #[test]
    fn test_multibyte_names_and_text() {
        let mut t = tokenizer("<données västra=\"åä\">héllo</données>");
        assert!(t.next().unwrap());
        assert_eq!(t.tag().name_str(), Some("données"));
        assert_eq!(t.tag().attr("västra".as_bytes()), Some("åä".as_bytes()));
        assert!(t.next().unwrap());
        assert_eq!(t.tag().text_str(), Some("héllo"));
        assert!(!t.next().unwrap());
    }
}
