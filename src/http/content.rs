//! Body materialization for HTTP messages.
//!
//! # State Machine
//! ```text
//!            ┌── output_out() ──▶ OutputStream ──┐
//!   None ────┤                                   ├── output_close() ──▶ OutputClosed
//!   Output ──┴── output_writer() ▶ OutputWriter ─┘                           │
//!                                                                            │
//!            ┌── input_in() ─────▶ InputStream   ◀──── input_in() ───────────┤
//!   None ────┤                                                               │
//!   Input ───┴── input_reader() ─▶ InputReader   ◀──── input_reader() ───────┘
//! ```
//!
//! # Design Decisions
//! - Body access is deferred until first use; most bodies are never touched
//! - Byte and character access are exclusive per direction
//! - Illegal transitions return `ContentError::BadState`, they are never retried
//! - An in-memory buffer written through the output side can be read back as input

use std::fmt;
use std::io::{self, BufRead, Cursor, Read, Write};

use bytes::Bytes;
use thiserror::Error;

/// Lifecycle state of a [`ContentHolder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentState {
    /// Nothing materialized; either direction may be chosen.
    None,
    /// Backed by an external sink that has not been accessed yet.
    Output,
    OutputStream,
    OutputWriter,
    OutputClosed,
    /// Backed by an external source that has not been accessed yet.
    Input,
    InputStream,
    InputReader,
}

impl ContentState {
    pub fn is_output(self) -> bool {
        matches!(
            self,
            ContentState::Output | ContentState::OutputStream | ContentState::OutputWriter
        )
    }

    pub fn is_input(self) -> bool {
        matches!(
            self,
            ContentState::Input | ContentState::InputStream | ContentState::InputReader
        )
    }
}

/// Errors raised by illegal content access.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{message} (state: {state:?})")]
    BadState {
        message: &'static str,
        state: ContentState,
    },

    #[error("content I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Character sets supported for text access to a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Charset {
    #[default]
    Utf8,
    UsAscii,
    Latin1,
}

impl Charset {
    /// Resolve a charset label (as found in a `charset=` media type parameter).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "us-ascii" | "ascii" => Some(Charset::UsAscii),
            "iso-8859-1" | "iso_8859-1" | "latin1" | "l1" => Some(Charset::Latin1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::UsAscii => "us-ascii",
            Charset::Latin1 => "iso-8859-1",
        }
    }

    /// Append the encoded form of `text`; unrepresentable characters become `?`.
    pub fn encode_into(self, text: &str, out: &mut Vec<u8>) {
        match self {
            Charset::Utf8 => out.extend_from_slice(text.as_bytes()),
            Charset::UsAscii => out.extend(text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' })),
            Charset::Latin1 => out.extend(text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))),
        }
    }

    /// Decode bytes; invalid sequences become U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::UsAscii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            Charset::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Readable body source.
pub type Source = Box<dyn BufRead + Send>;

enum Sink {
    Buffer(Vec<u8>),
    External(Box<dyn Write + Send>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Buffer(bytes) => {
                bytes.extend_from_slice(buf);
                Ok(buf.len())
            }
            Sink::External(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Buffer(_) => Ok(()),
            Sink::External(out) => out.flush(),
        }
    }
}

/// Owns zero or one body materialization for a message or builder.
pub struct ContentHolder {
    state: ContentState,
    sink: Option<Sink>,
    source: Option<Source>,
    default_charset: Charset,
    declared_charset: Option<Charset>,
    length: Option<u64>,
    flush_on_close: bool,
}

impl ContentHolder {
    /// An empty holder in `None`; output goes to an in-memory buffer.
    pub fn new() -> Self {
        Self {
            state: ContentState::None,
            sink: None,
            source: None,
            default_charset: Charset::default(),
            declared_charset: None,
            length: None,
            flush_on_close: true,
        }
    }

    /// A holder in `Output` writing to a transport-provided sink.
    pub fn output_to(sink: impl Write + Send + 'static) -> Self {
        Self {
            state: ContentState::Output,
            sink: Some(Sink::External(Box::new(sink))),
            ..Self::new()
        }
    }

    /// A holder in `Input` reading from a transport-provided source.
    pub fn input_from(source: impl BufRead + Send + 'static, length: Option<u64>) -> Self {
        Self {
            state: ContentState::Input,
            source: Some(Box::new(source)),
            length,
            ..Self::new()
        }
    }

    /// A holder in `Input` over a fully buffered body.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let length = Some(bytes.len() as u64);
        Self::input_from(Cursor::new(bytes), length)
    }

    pub fn state(&self) -> ContentState {
        self.state
    }

    /// Body length if known.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn set_length(&mut self, length: Option<u64>) {
        self.length = length;
    }

    pub fn default_charset(&self) -> Charset {
        self.default_charset
    }

    pub fn set_default_charset(&mut self, charset: Charset) {
        self.default_charset = charset;
    }

    /// Charset declared by the owning message, usually from `Content-Type`.
    pub fn set_declared_charset(&mut self, charset: Option<Charset>) {
        self.declared_charset = charset;
    }

    /// Effective charset for text access.
    pub fn charset(&self) -> Charset {
        self.declared_charset.unwrap_or(self.default_charset)
    }

    /// Whether `output_close` flushes the sink (on by default).
    pub fn set_flush_on_close(&mut self, flush: bool) {
        self.flush_on_close = flush;
    }

    fn bad_state(&self, message: &'static str) -> ContentError {
        ContentError::BadState {
            message,
            state: self.state,
        }
    }

    /// Byte-oriented output access.
    pub fn output_out(&mut self) -> Result<&mut dyn Write, ContentError> {
        match self.state {
            ContentState::None | ContentState::Output | ContentState::OutputStream => {}
            ContentState::OutputWriter => {
                return Err(self.bad_state("Cannot use the byte stream after using the writer"))
            }
            _ => return Err(self.bad_state("Not in output state")),
        }
        self.state = ContentState::OutputStream;
        Ok(self.sink.get_or_insert_with(|| Sink::Buffer(Vec::new())))
    }

    /// Character-oriented output access, encoding with [`charset`](Self::charset).
    pub fn output_writer(&mut self) -> Result<TextWriter<'_>, ContentError> {
        match self.state {
            ContentState::None | ContentState::Output | ContentState::OutputWriter => {}
            ContentState::OutputStream => {
                return Err(self.bad_state("Cannot use the writer after using the byte stream"))
            }
            _ => return Err(self.bad_state("Not in output state")),
        }
        self.state = ContentState::OutputWriter;
        let charset = self.charset();
        let sink = self.sink.get_or_insert_with(|| Sink::Buffer(Vec::new()));
        Ok(TextWriter { sink, charset })
    }

    /// Finish output. Valid from `None` and every output state.
    pub fn output_close(&mut self) -> Result<(), ContentError> {
        match self.state {
            ContentState::None => {}
            ContentState::Output | ContentState::OutputStream | ContentState::OutputWriter => {
                if self.flush_on_close {
                    if let Some(sink) = self.sink.as_mut() {
                        sink.flush()?;
                    }
                }
            }
            _ => return Err(self.bad_state("Not in output state")),
        }
        self.state = ContentState::OutputClosed;
        Ok(())
    }

    /// Turn closed output into a readable source. Only buffered output can be
    /// read back; anything written to an external sink reads as empty.
    fn source_from_output(&mut self) -> Source {
        match self.sink.take() {
            Some(Sink::Buffer(bytes)) => {
                self.length = Some(bytes.len() as u64);
                Box::new(Cursor::new(bytes))
            }
            _ => {
                self.length = Some(0);
                Box::new(io::empty())
            }
        }
    }

    fn prepare_input(&mut self) {
        match self.state {
            ContentState::None => self.source = Some(Box::new(io::empty())),
            ContentState::OutputClosed => self.source = Some(self.source_from_output()),
            _ => {}
        }
    }

    /// Byte-oriented input access.
    pub fn input_in(&mut self) -> Result<&mut Source, ContentError> {
        match self.state {
            ContentState::None
            | ContentState::OutputClosed
            | ContentState::Input
            | ContentState::InputStream => {}
            ContentState::InputReader => {
                return Err(self.bad_state("Cannot use the byte stream after using the reader"))
            }
            _ => return Err(self.bad_state("Not in input state")),
        }
        self.prepare_input();
        self.state = ContentState::InputStream;
        Ok(self.source.get_or_insert_with(|| Box::new(io::empty())))
    }

    /// Character-oriented input access, decoding with [`charset`](Self::charset).
    pub fn input_reader(&mut self) -> Result<TextReader<'_>, ContentError> {
        match self.state {
            ContentState::None
            | ContentState::OutputClosed
            | ContentState::Input
            | ContentState::InputReader => {}
            ContentState::InputStream => {
                return Err(self.bad_state("Cannot use the reader after using the byte stream"))
            }
            _ => return Err(self.bad_state("Not in input state")),
        }
        self.prepare_input();
        self.state = ContentState::InputReader;
        let charset = self.charset();
        let source = self.source.get_or_insert_with(|| Box::new(io::empty()));
        Ok(TextReader { source, charset })
    }

    /// Read the whole remaining body as bytes through the byte stream.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ContentError> {
        let mut bytes = Vec::new();
        self.input_in()?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Close output if still open. Used by builders before handing the body over.
    pub(crate) fn close_if_output(&mut self) -> Result<(), ContentError> {
        if self.state == ContentState::None || self.state.is_output() {
            self.output_close()?;
        }
        Ok(())
    }
}

impl Default for ContentHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContentHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match &self.sink {
            Some(Sink::Buffer(bytes)) => Some(format!("<buffer {} bytes>", bytes.len())),
            Some(Sink::External(_)) => Some("<external>".to_string()),
            None => None,
        };
        f.debug_struct("ContentHolder")
            .field("state", &self.state)
            .field("charset", &self.charset())
            .field("length", &self.length)
            .field("sink", &sink)
            .field("source", &self.source.as_ref().map(|_| "<source>"))
            .finish()
    }
}

/// Text writer over a holder's output.
pub struct TextWriter<'a> {
    sink: &'a mut Sink,
    charset: Charset,
}

impl TextWriter<'_> {
    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn print(&mut self, text: &str) -> Result<(), ContentError> {
        if text.is_empty() {
            return Ok(());
        }
        match self.charset {
            Charset::Utf8 => self.sink.write_all(text.as_bytes())?,
            charset => {
                let mut encoded = Vec::with_capacity(text.len());
                charset.encode_into(text, &mut encoded);
                self.sink.write_all(&encoded)?;
            }
        }
        Ok(())
    }

    pub fn println(&mut self, text: &str) -> Result<(), ContentError> {
        self.print(text)?;
        self.print("\n")
    }

    /// Supports `write!` on a `TextWriter`.
    pub fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), ContentError> {
        match args.as_str() {
            Some(text) => self.print(text),
            None => self.print(&fmt::format(args)),
        }
    }

    pub fn flush(&mut self) -> Result<(), ContentError> {
        self.sink.flush()?;
        Ok(())
    }
}

/// Text reader over a holder's input.
pub struct TextReader<'a> {
    source: &'a mut Source,
    charset: Charset,
}

impl TextReader<'_> {
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Next line without its terminator, or `None` at end of input.
    pub fn read_line(&mut self) -> Result<Option<String>, ContentError> {
        let mut raw = Vec::new();
        if self.source.read_until(b'\n', &mut raw)? == 0 {
            return Ok(None);
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }
        Ok(Some(self.charset.decode(&raw)))
    }

    pub fn read_to_string(&mut self) -> Result<String, ContentError> {
        let mut raw = Vec::new();
        self.source.read_to_end(&mut raw)?;
        Ok(self.charset.decode(&raw))
    }
}
