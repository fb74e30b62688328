//! # Tetherpack
//!
//! A small, bounded TLV encoding for the values a bridge sends to a foreign
//! runtime and the frames that carry them.
//!
//! ## Philosophy
//!
//! - **Explicit state**: the encoder tracks open scopes on a stack and refuses
//!   writes that would produce a malformed container.
//! - **TLV**: every item is `[Tag][Length?][Value]`, so a reader can skip what it
//!   does not understand.
//! - **Zero-copy reads**: decoders are bounds-checked views into the input.
//!
//! ## Format
//!
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Blobs** (strings, handles): `[Tag: 1b][Len: 4b][Data: Len]`
//! - **Containers**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are little-endian.


/// Encoding and decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Byte does not correspond to a valid `Tag`.
    InvalidTag(u8),
    /// String or handle data is not valid UTF-8, or a char is not a scalar value.
    InvalidUtf8,
    /// Closing a scope that does not match the active scope.
    ScopeMismatch { expected: Scope, actual: Scope },
    /// Attempted to close a scope when only the root remains.
    ScopeUnderflow,
    /// Attempted to finalize the buffer with open scopes.
    ScopeStillOpen,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Blob or container length exceeds `u32::MAX`.
    BlobTooLarge(usize),
    /// Attempted to write more than one item into a `Result` or `Variant`.
    TooManyItems(Scope),
    /// Closed a `Result` or `Variant` without writing its payload.
    EmptyAdt(Scope),
    /// Wrote something other than a named field into a `Record`.
    InvalidRecordField,
    /// Closed a `Map` holding a key without its value.
    DanglingMapKey,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "invalid tag byte: {:#04x}", b),
            Error::ScopeMismatch { expected, actual } => {
                write!(f, "scope mismatch: expected {:?}, found {:?}", expected, actual)
            }
            Error::TooManyItems(s) => write!(f, "too many items in scope {:?}; expected exactly 1", s),
            Error::EmptyAdt(s) => write!(f, "empty scope {:?}; expected exactly 1 item", s),
            Error::DanglingMapKey => write!(f, "map closed with a key but no value"),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for tetherpack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the kind of an encoded item.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    S8 = 0x03,
    S16 = 0x04,
    S32 = 0x05,
    S64 = 0x06,
    F32 = 0x07,
    F64 = 0x08,
    Char = 0x09,
    Unit = 0x0A,

    // Blobs (Tag + u32 Len + Bytes)
    String = 0x10,
    Handle = 0x11,

    // Containers (Tag + u32 Len + Body)
    List = 0x20,
    Map = 0x21,
    Record = 0x22,

    // ADTs (Tag + u32 Len + Body)
    ResultOk = 0x30,
    ResultErr = 0x31,
    Variant = 0x32,
}

impl Tag {
    /// Returns the tag for a byte, or `None` if the byte is not a tag.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::S8),
            0x04 => Some(Tag::S16),
            0x05 => Some(Tag::S32),
            0x06 => Some(Tag::S64),
            0x07 => Some(Tag::F32),
            0x08 => Some(Tag::F64),
            0x09 => Some(Tag::Char),
            0x0A => Some(Tag::Unit),
            0x10 => Some(Tag::String),
            0x11 => Some(Tag::Handle),
            0x20 => Some(Tag::List),
            0x21 => Some(Tag::Map),
            0x22 => Some(Tag::Record),
            0x30 => Some(Tag::ResultOk),
            0x31 => Some(Tag::ResultErr),
            0x32 => Some(Tag::Variant),
            _ => None,
        }
    }

    /// Width in bytes of the payload of a fixed-width scalar, `None` for
    /// length-prefixed items.
    fn fixed_width(self) -> Option<usize> {
        match self {
            Tag::BoolTrue | Tag::BoolFalse | Tag::Unit => Some(0),
            Tag::S8 => Some(1),
            Tag::S16 => Some(2),
            Tag::S32 | Tag::F32 | Tag::Char => Some(4),
            Tag::S64 | Tag::F64 => Some(8),
            _ => None,
        }
    }
}

/// Open container kinds on the `Encoder` stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The virtual root; allows any number of items.
    Root,
    /// Ordered sequence; allows any number of items.
    List,
    /// Key/value container; items alternate key, value.
    Map,
    /// Named fields; only `Variant` items are allowed.
    Record,
    /// Exactly one item.
    Result,
    /// Exactly one item (the payload) after the name.
    Variant,
}

struct Frame {
    start: usize,
    scope: Scope,
    count: usize,
}

/// A bounded, state-machine driven encoder.
///
/// Length headers of containers are back-patched when the scope closes.
///
/// # Structural Invariants
///
/// 1. **Record scopes** accept only `variant_begin()` children.
/// 2. **Map scopes** must hold an even number of items when closed.
/// 3. **Result and Variant scopes** hold exactly one item.
/// 4. The encoder must be back at the root to finalize bytes.
pub struct Encoder {
    buf: Vec<u8>,
    /// Bottom is always `Scope::Root`.
    stack: Vec<Frame>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
            stack: vec![Frame { start: 0, scope: Scope::Root, count: 0 }],
        }
    }

    /// Consumes the encoder and returns the encoded bytes.
    ///
    /// # Errors
    /// Returns `Error::ScopeStillOpen` if any container is still open.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        if self.stack.len() > 1 {
            return Err(Error::ScopeStillOpen);
        }
        Ok(self.buf)
    }

    /// Current nesting depth; the root is depth 0.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    fn current_frame(&mut self) -> Result<&mut Frame> {
        self.stack.last_mut().ok_or(Error::ScopeUnderflow)
    }

    fn check_write(&mut self, tag: Tag) -> Result<()> {
        let frame = self.current_frame()?;
        match frame.scope {
            Scope::Root | Scope::List | Scope::Map => Ok(()),
            Scope::Record if tag != Tag::Variant => Err(Error::InvalidRecordField),
            Scope::Record => Ok(()),
            Scope::Result | Scope::Variant if frame.count >= 1 => Err(Error::TooManyItems(frame.scope)),
            Scope::Result | Scope::Variant => Ok(()),
        }
    }

    fn on_item_written(&mut self) -> Result<()> {
        self.current_frame()?.count += 1;
        Ok(())
    }

    fn scalar(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(data);
        self.on_item_written()
    }

    fn blob(&mut self, tag: Tag, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| Error::BlobTooLarge(data.len()))?;
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(data);
        self.on_item_written()
    }

    fn begin_scope(&mut self, tag: Tag, scope: Scope) -> Result<()> {
        self.check_write(tag)?;
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&[0, 0, 0, 0]); // length placeholder
        self.stack.push(Frame { start: self.buf.len(), scope, count: 0 });
        Ok(())
    }

    fn end_scope(&mut self, expected: Scope) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::ScopeUnderflow);
        }

        let frame = self.current_frame()?;
        if frame.scope != expected {
            return Err(Error::ScopeMismatch { expected, actual: frame.scope });
        }
        match frame.scope {
            Scope::Result | Scope::Variant if frame.count == 0 => return Err(Error::EmptyAdt(frame.scope)),
            Scope::Map if frame.count % 2 != 0 => return Err(Error::DanglingMapKey),
            _ => {}
        }

        let start = frame.start;
        self.stack.pop();

        let body_len = self.buf.len() - start;
        let len = u32::try_from(body_len).map_err(|_| Error::BlobTooLarge(body_len))?;
        self.buf[start - 4..start].copy_from_slice(&len.to_le_bytes());

        self.on_item_written()
    }

    pub fn bool(&mut self, v: bool) -> Result<()> {
        self.scalar(if v { Tag::BoolTrue } else { Tag::BoolFalse }, &[])
    }

    pub fn s8(&mut self, v: i8) -> Result<()> { self.scalar(Tag::S8, &v.to_le_bytes()) }
    pub fn s16(&mut self, v: i16) -> Result<()> { self.scalar(Tag::S16, &v.to_le_bytes()) }
    pub fn s32(&mut self, v: i32) -> Result<()> { self.scalar(Tag::S32, &v.to_le_bytes()) }
    pub fn s64(&mut self, v: i64) -> Result<()> { self.scalar(Tag::S64, &v.to_le_bytes()) }
    pub fn f32(&mut self, v: f32) -> Result<()> { self.scalar(Tag::F32, &v.to_le_bytes()) }
    pub fn f64(&mut self, v: f64) -> Result<()> { self.scalar(Tag::F64, &v.to_le_bytes()) }

    /// Encodes a char as its scalar value (u32 LE).
    pub fn char(&mut self, v: char) -> Result<()> { self.scalar(Tag::Char, &(v as u32).to_le_bytes()) }

    /// Encodes Unit `()`.
    pub fn unit(&mut self) -> Result<()> { self.scalar(Tag::Unit, &[]) }

    /// Encodes a UTF-8 string blob.
    pub fn str(&mut self, v: &str) -> Result<()> { self.blob(Tag::String, v.as_bytes()) }

    /// Encodes the identifier of a foreign object.
    ///
    /// Distinct from `str` so a reader never mistakes data for a reference.
    pub fn handle(&mut self, id: &str) -> Result<()> { self.blob(Tag::Handle, id.as_bytes()) }

    pub fn list_begin(&mut self) -> Result<()> { self.begin_scope(Tag::List, Scope::List) }
    pub fn list_end(&mut self) -> Result<()> { self.end_scope(Scope::List) }

    /// Begins a Map. Items alternate key, value; order is preserved.
    pub fn map_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Map, Scope::Map) }
    pub fn map_end(&mut self) -> Result<()> { self.end_scope(Scope::Map) }

    /// Begins a Record. Only `variant_begin()` fields are allowed as children.
    pub fn record_begin(&mut self) -> Result<()> { self.begin_scope(Tag::Record, Scope::Record) }
    pub fn record_end(&mut self) -> Result<()> { self.end_scope(Scope::Record) }

    pub fn result_ok_begin(&mut self) -> Result<()> { self.begin_scope(Tag::ResultOk, Scope::Result) }
    pub fn result_ok_end(&mut self) -> Result<()> { self.end_scope(Scope::Result) }
    pub fn result_err_begin(&mut self) -> Result<()> { self.begin_scope(Tag::ResultErr, Scope::Result) }
    pub fn result_err_end(&mut self) -> Result<()> { self.end_scope(Scope::Result) }

    /// Begins a named payload. Exactly one item must follow before `variant_end()`.
    pub fn variant_begin(&mut self, name: &str) -> Result<()> {
        self.begin_scope(Tag::Variant, Scope::Variant)?;
        self.str(name)?;
        // the name is metadata, not the payload
        self.current_frame()?.count = 0;
        Ok(())
    }
    pub fn variant_end(&mut self) -> Result<()> { self.end_scope(Scope::Variant) }
}

/// A zero-copy, bounds-checked cursor over a byte slice.
///
/// Reading advances the cursor. Container reads return decoders restricted to
/// the container body.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Remaining bytes in the view.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Peeks the next tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let b = *self.buf.first().ok_or(Error::UnexpectedEnd)?;
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    fn consume(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn check_tag(&mut self, expected: Tag) -> Result<()> {
        let tag = self.peek_tag()?;
        if tag != expected {
            return Err(Error::InvalidTag(tag as u8));
        }
        self.consume(1)
    }

    /// Skips the next item including nested children.
    pub fn skip(&mut self) -> Result<()> {
        let tag = self.peek_tag()?;
        self.consume(1)?;
        match tag.fixed_width() {
            Some(width) => self.consume(width),
            None => {
                let len = self.read_len()?;
                self.consume(len)
            }
        }
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::BoolTrue => { self.consume(1)?; Ok(true) }
            Tag::BoolFalse => { self.consume(1)?; Ok(false) }
            tag => Err(Error::InvalidTag(tag as u8)),
        }
    }

    pub fn s8(&mut self) -> Result<i8> { self.check_tag(Tag::S8)?; Ok(i8::from_le_bytes(self.read_array()?)) }
    pub fn s16(&mut self) -> Result<i16> { self.check_tag(Tag::S16)?; Ok(i16::from_le_bytes(self.read_array()?)) }
    pub fn s32(&mut self) -> Result<i32> { self.check_tag(Tag::S32)?; Ok(i32::from_le_bytes(self.read_array()?)) }
    pub fn s64(&mut self) -> Result<i64> { self.check_tag(Tag::S64)?; Ok(i64::from_le_bytes(self.read_array()?)) }
    pub fn f32(&mut self) -> Result<f32> { self.check_tag(Tag::F32)?; Ok(f32::from_le_bytes(self.read_array()?)) }
    pub fn f64(&mut self) -> Result<f64> { self.check_tag(Tag::F64)?; Ok(f64::from_le_bytes(self.read_array()?)) }

    pub fn char(&mut self) -> Result<char> {
        self.check_tag(Tag::Char)?;
        let scalar = u32::from_le_bytes(self.read_array()?);
        char::from_u32(scalar).ok_or(Error::InvalidUtf8)
    }

    pub fn unit(&mut self) -> Result<()> { self.check_tag(Tag::Unit) }

    fn read_blob_str(&mut self, tag: Tag) -> Result<&'a str> {
        self.check_tag(tag)?;
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    pub fn str(&mut self) -> Result<&'a str> { self.read_blob_str(Tag::String) }

    /// Decodes a foreign object identifier.
    pub fn handle(&mut self) -> Result<&'a str> { self.read_blob_str(Tag::Handle) }

    fn enter_container(&mut self, expected: Tag) -> Result<Decoder<'a>> {
        self.check_tag(expected)?;
        let len = self.read_len()?;
        Ok(Decoder::new(self.read_bytes(len)?))
    }

    pub fn list(&mut self) -> Result<ListIter<'a>> {
        Ok(ListIter { dec: self.enter_container(Tag::List)? })
    }

    pub fn map(&mut self) -> Result<MapIter<'a>> {
        Ok(MapIter { dec: self.enter_container(Tag::Map)? })
    }

    pub fn record(&mut self) -> Result<RecordIter<'a>> {
        Ok(RecordIter { dec: self.enter_container(Tag::Record)? })
    }

    /// Decodes a Result, returning the decoder of the `Ok` or `Err` payload.
    pub fn result(&mut self) -> Result<std::result::Result<Decoder<'a>, Decoder<'a>>> {
        match self.peek_tag()? {
            Tag::ResultOk => Ok(Ok(self.enter_container(Tag::ResultOk)?)),
            Tag::ResultErr => Ok(Err(self.enter_container(Tag::ResultErr)?)),
            tag => Err(Error::InvalidTag(tag as u8)),
        }
    }

    /// Decodes a Variant as `(name, payload)`.
    pub fn variant(&mut self) -> Result<(&'a str, Decoder<'a>)> {
        let mut inner = self.enter_container(Tag::Variant)?;
        let name = inner.str()?;
        Ok((name, inner))
    }

    /// Splits off the next item as its own decoder.
    fn next_item(&mut self) -> Result<Decoder<'a>> {
        let mut probe = self.clone();
        probe.skip()?;
        let len = self.remaining() - probe.remaining();
        Ok(Decoder::new(self.read_bytes(len)?))
    }
}

/// Items within a List.
#[derive(Debug)]
pub struct ListIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> ListIter<'a> {
    /// Returns a decoder for the next item, or `None` at the end.
    pub fn next(&mut self) -> Result<Option<Decoder<'a>>> {
        if self.dec.is_empty() {
            return Ok(None);
        }
        self.dec.next_item().map(Some)
    }
}

/// Key/value pairs within a Map, in encoded order.
#[derive(Debug)]
pub struct MapIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> MapIter<'a> {
    /// Returns `(key, value)` decoders for the next entry, or `None` at the end.
    pub fn next(&mut self) -> Result<Option<(Decoder<'a>, Decoder<'a>)>> {
        if self.dec.is_empty() {
            return Ok(None);
        }
        let key = self.dec.next_item()?;
        if self.dec.is_empty() {
            return Err(Error::DanglingMapKey);
        }
        let val = self.dec.next_item()?;
        Ok(Some((key, val)))
    }
}

/// Named fields within a Record.
#[derive(Debug)]
pub struct RecordIter<'a> {
    dec: Decoder<'a>,
}

impl<'a> RecordIter<'a> {
    /// Returns `(name, payload)` for the next field, or `None` at the end.
    pub fn next(&mut self) -> Result<Option<(&'a str, Decoder<'a>)>> {
        if self.dec.is_empty() {
            return Ok(None);
        }
        let tag = self.dec.peek_tag()?;
        if tag != Tag::Variant {
            return Err(Error::InvalidTag(tag as u8));
        }
        self.dec.variant().map(Some)
    }
}
