//! The bidirectional save-stream abstraction.
//!
//! A [`Persister`] is a single pass over a save stream in one direction,
//! selected by a read/write mode flag. Every field-transfer method takes the
//! target by `&mut`: in write mode the current value is appended to the
//! stream, in read mode the target is overwritten from the stream. Save and
//! load therefore share one code path per aggregate, and the sequence of
//! persist calls *is* the wire format -- there is no self-describing tagging
//! of fields.
//!
//! Three framing primitives sit on top of the primitive transfers:
//!
//! - **Versioned scopes**: [`Persister::persist_version`] transfers one u8
//!   version tag and hands it back so the caller can branch its field layout.
//!   A stored version above the caller's maximum is fatal.
//! - **Named scopes**: [`Persister::begin_object`] / [`Persister::end_object`]
//!   are pure bookkeeping (no bytes) that give error messages a path like
//!   `Object[3]/WorkerAi/Base`.
//! - **Reserved regions**: [`Persister::persist_reserved`] transfers a
//!   fixed-width span of bytes this implementation does not interpret. The
//!   bytes live in the owning aggregate and survive a load/save round trip
//!   unchanged; the width is pinned per aggregate version by test fixtures.
//!
//! Object handles read from the stream are recorded in a pending list (see
//! [`crate::handle::HandleRegistry`]) and resolved only after the whole
//! entity set has been loaded.

use crate::frame::{LogicFrame, LogicFrameSpan};
use crate::handle::HandleRegistry;
use crate::id::ObjectId;
use crate::math::Vec3;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Format-corruption errors raised during a persistence pass.
///
/// Every variant is fatal and unrecoverable at the point it occurs: a load
/// either completes entirely or is discarded, never partially applied.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("unsupported version {found} in {scope} (this build supports up to {max})")]
    UnsupportedVersion { scope: String, found: u8, max: u8 },

    #[error("identity mismatch in {scope}: expected {expected:?}, found {found:?}")]
    IdentityMismatch {
        scope: String,
        expected: String,
        found: String,
    },

    #[error("unknown state id {id} in {scope}")]
    UnknownStateId { scope: String, id: u32 },

    #[error("unresolved object handle {} held by {holder}", id.0)]
    UnresolvedHandle { holder: String, id: ObjectId },

    #[error("out-of-range value {value} for {what} in {scope}")]
    OutOfRange {
        scope: String,
        what: &'static str,
        value: u32,
    },

    #[error("non-ascii byte 0x{byte:02X} in string in {scope}")]
    NonAsciiString { scope: String, byte: u8 },

    #[error("unexpected end of stream in {scope}: needed {needed} bytes at offset {offset}")]
    UnexpectedEof {
        scope: String,
        needed: usize,
        offset: usize,
    },

    #[error("invalid save magic: expected 0x{expected:08X}, got 0x{found:08X}")]
    InvalidMagic { expected: u32, found: u32 },

    #[error("save format version {found} is not supported (max {max})")]
    UnsupportedFormat { found: u32, max: u32 },

    #[error("duplicate object id {} in save stream", .0.0)]
    DuplicateObjectId(ObjectId),

    #[error("unknown object template {0:?}")]
    UnknownTemplate(String),

    #[error("{trailing} trailing bytes after final aggregate")]
    TrailingBytes { trailing: usize },

    #[error("unbalanced persistence scope: {0}")]
    UnbalancedScope(String),

    #[error(transparent)]
    Template(#[from] crate::template::TemplateError),
}

// ---------------------------------------------------------------------------
// Persist trait
// ---------------------------------------------------------------------------

/// A self-persisting aggregate. Implementations transfer their fields in a
/// fixed order through the given persister; that order is the wire format.
pub trait Persist {
    fn persist(&mut self, p: &mut Persister<'_>) -> Result<(), PersistError>;
}

// ---------------------------------------------------------------------------
// Persister
// ---------------------------------------------------------------------------

/// Direction of a persistence pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    Read,
    Write,
}

enum Stream<'a> {
    Read { data: &'a [u8], pos: usize },
    Write { out: Vec<u8> },
}

/// Everything a finished pass produced: the written bytes (write mode), the
/// pending object-handle references recorded while reading (read mode), and
/// the count of unconsumed trailing bytes (read mode).
#[derive(Debug)]
pub struct PersistOutput {
    pub bytes: Vec<u8>,
    pub pending: HandleRegistry,
    pub trailing: usize,
}

/// A single pass over a save stream in one direction. Created per save or
/// per load and discarded after.
pub struct Persister<'a> {
    stream: Stream<'a>,
    scopes: Vec<String>,
    pending: HandleRegistry,
}

impl<'a> Persister<'a> {
    /// Create a reading pass over `data`.
    pub fn reader(data: &'a [u8]) -> Self {
        Self {
            stream: Stream::Read { data, pos: 0 },
            scopes: Vec::new(),
            pending: HandleRegistry::new(),
        }
    }

    /// Create a writing pass over a fresh in-memory buffer.
    pub fn writer() -> Self {
        Self {
            stream: Stream::Write { out: Vec::new() },
            scopes: Vec::new(),
            pending: HandleRegistry::new(),
        }
    }

    pub fn mode(&self) -> PersistMode {
        match self.stream {
            Stream::Read { .. } => PersistMode::Read,
            Stream::Write { .. } => PersistMode::Write,
        }
    }

    pub fn is_reading(&self) -> bool {
        self.mode() == PersistMode::Read
    }

    /// Bytes transferred so far.
    pub fn position(&self) -> usize {
        match &self.stream {
            Stream::Read { pos, .. } => *pos,
            Stream::Write { out } => out.len(),
        }
    }

    /// The slash-joined path of open named scopes, for error context.
    pub fn scope_path(&self) -> String {
        join_scopes(&self.scopes)
    }

    // -----------------------------------------------------------------------
    // Raw byte transfer
    // -----------------------------------------------------------------------

    fn take<const N: usize>(&mut self) -> Result<[u8; N], PersistError> {
        match &mut self.stream {
            Stream::Read { data, pos } => {
                if *pos + N > data.len() {
                    return Err(PersistError::UnexpectedEof {
                        scope: join_scopes(&self.scopes),
                        needed: N,
                        offset: *pos,
                    });
                }
                let mut buf = [0u8; N];
                buf.copy_from_slice(&data[*pos..*pos + N]);
                *pos += N;
                Ok(buf)
            }
            Stream::Write { .. } => {
                unreachable!("take() is only called in read mode")
            }
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        match &mut self.stream {
            Stream::Write { out } => out.extend_from_slice(bytes),
            Stream::Read { .. } => unreachable!("put() is only called in write mode"),
        }
    }

    // -----------------------------------------------------------------------
    // Primitive scalars
    // -----------------------------------------------------------------------

    pub fn persist_u8(&mut self, value: &mut u8) -> Result<(), PersistError> {
        if self.is_reading() {
            *value = self.take::<1>()?[0];
        } else {
            self.put(&[*value]);
        }
        Ok(())
    }

    /// One byte, strictly 0 or 1. Anything else signals a desynced stream.
    pub fn persist_bool(&mut self, value: &mut bool) -> Result<(), PersistError> {
        if self.is_reading() {
            let byte = self.take::<1>()?[0];
            *value = match byte {
                0 => false,
                1 => true,
                other => {
                    return Err(PersistError::OutOfRange {
                        scope: self.scope_path(),
                        what: "boolean",
                        value: other as u32,
                    });
                }
            };
        } else {
            self.put(&[*value as u8]);
        }
        Ok(())
    }

    pub fn persist_u16(&mut self, value: &mut u16) -> Result<(), PersistError> {
        if self.is_reading() {
            *value = u16::from_le_bytes(self.take::<2>()?);
        } else {
            self.put(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn persist_i16(&mut self, value: &mut i16) -> Result<(), PersistError> {
        if self.is_reading() {
            *value = i16::from_le_bytes(self.take::<2>()?);
        } else {
            self.put(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn persist_u32(&mut self, value: &mut u32) -> Result<(), PersistError> {
        if self.is_reading() {
            *value = u32::from_le_bytes(self.take::<4>()?);
        } else {
            self.put(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn persist_i32(&mut self, value: &mut i32) -> Result<(), PersistError> {
        if self.is_reading() {
            *value = i32::from_le_bytes(self.take::<4>()?);
        } else {
            self.put(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn persist_f32(&mut self, value: &mut f32) -> Result<(), PersistError> {
        if self.is_reading() {
            *value = f32::from_le_bytes(self.take::<4>()?);
        } else {
            self.put(&value.to_le_bytes());
        }
        Ok(())
    }

    /// u16 length prefix followed by raw bytes. Non-ascii content is a
    /// corruption error on read; strings longer than u16::MAX cannot be
    /// represented in the format.
    pub fn persist_ascii_string(&mut self, value: &mut String) -> Result<(), PersistError> {
        if self.is_reading() {
            let mut len = 0u16;
            self.persist_u16(&mut len)?;
            let scope = self.scope_path();
            let mut bytes = vec![0u8; len as usize];
            self.persist_reserved(&mut bytes)?;
            if let Some(&byte) = bytes.iter().find(|b| !b.is_ascii()) {
                return Err(PersistError::NonAsciiString { scope, byte });
            }
            // All bytes are ascii, so this cannot fail.
            *value = String::from_utf8_lossy(&bytes).into_owned();
        } else {
            if value.len() > u16::MAX as usize || !value.is_ascii() {
                return Err(PersistError::OutOfRange {
                    scope: self.scope_path(),
                    what: "ascii string",
                    value: value.len().min(u32::MAX as usize) as u32,
                });
            }
            let mut len = value.len() as u16;
            self.persist_u16(&mut len)?;
            self.put(value.as_bytes());
        }
        Ok(())
    }

    /// A fixed-width ascii field, NUL-padded on the wire. Trailing NULs
    /// are stripped on read; a value longer than the width cannot be
    /// represented in the format.
    pub fn persist_fixed_ascii(
        &mut self,
        value: &mut String,
        width: usize,
    ) -> Result<(), PersistError> {
        if self.is_reading() {
            let scope = self.scope_path();
            let mut bytes = vec![0u8; width];
            self.persist_reserved(&mut bytes)?;
            if let Some(&byte) = bytes.iter().find(|b| !b.is_ascii()) {
                return Err(PersistError::NonAsciiString { scope, byte });
            }
            let end = bytes
                .iter()
                .rposition(|&b| b != 0)
                .map_or(0, |last| last + 1);
            *value = String::from_utf8_lossy(&bytes[..end]).into_owned();
        } else {
            if value.len() > width || !value.is_ascii() {
                return Err(PersistError::OutOfRange {
                    scope: self.scope_path(),
                    what: "fixed ascii string",
                    value: value.len().min(u32::MAX as usize) as u32,
                });
            }
            self.put(value.as_bytes());
            for _ in value.len()..width {
                self.put(&[0]);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Logic-time quantities
    // -----------------------------------------------------------------------

    pub fn persist_frame(&mut self, value: &mut LogicFrame) -> Result<(), PersistError> {
        self.persist_u32(&mut value.0)
    }

    pub fn persist_frame_span(&mut self, value: &mut LogicFrameSpan) -> Result<(), PersistError> {
        self.persist_u32(&mut value.0)
    }

    pub fn persist_vec3(&mut self, value: &mut Vec3) -> Result<(), PersistError> {
        self.persist_f32(&mut value.x)?;
        self.persist_f32(&mut value.y)?;
        self.persist_f32(&mut value.z)
    }

    // -----------------------------------------------------------------------
    // Object handles
    // -----------------------------------------------------------------------

    /// Transfer an object handle as a raw u32. A non-null handle read from
    /// the stream is recorded as pending; the load is only complete once
    /// every pending handle has resolved against the loaded entity set.
    pub fn persist_object_id(&mut self, value: &mut ObjectId) -> Result<(), PersistError> {
        self.persist_u32(&mut value.0)?;
        if self.is_reading() && !value.is_null() {
            let holder = self.scope_path();
            self.pending.record(holder, *value);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Versioned scopes
    // -----------------------------------------------------------------------

    /// Begin a versioned aggregate. Writes the caller's maximum supported
    /// version, or reads the stored version and hands it back so the caller
    /// can branch its field layout. A stored version of zero or above `max`
    /// is fatal -- no forward-compatible skip is attempted for unknown
    /// versions, only for unknown bytes within a known version.
    pub fn persist_version(&mut self, max: u8) -> Result<u8, PersistError> {
        let mut version = max;
        self.persist_u8(&mut version)?;
        if version == 0 || version > max {
            return Err(PersistError::UnsupportedVersion {
                scope: self.scope_path(),
                found: version,
                max,
            });
        }
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Named scopes
    // -----------------------------------------------------------------------

    /// Open a named scope. Pure bookkeeping: no bytes are transferred, the
    /// name only shows up in error paths.
    pub fn begin_object(&mut self, name: impl Into<String>) {
        self.scopes.push(name.into());
    }

    /// Close the innermost named scope.
    pub fn end_object(&mut self) -> Result<(), PersistError> {
        match self.scopes.pop() {
            Some(_) => Ok(()),
            None => Err(PersistError::UnbalancedScope(
                "end_object with no open scope".to_string(),
            )),
        }
    }

    /// Persist a nested aggregate inside a named scope.
    pub fn persist_object<T: Persist>(
        &mut self,
        name: impl Into<String>,
        value: &mut T,
    ) -> Result<(), PersistError> {
        self.begin_object(name);
        value.persist(self)?;
        self.end_object()
    }

    // -----------------------------------------------------------------------
    // Reserved regions
    // -----------------------------------------------------------------------

    /// Transfer a fixed-width span of bytes whose meaning is not interpreted
    /// by this implementation. The width is part of the format contract: a
    /// wrong width desyncs the stream silently, so every reserved span is
    /// pinned by a fixture test. The bytes themselves are preserved in the
    /// owning aggregate and round-trip unchanged.
    pub fn persist_reserved(&mut self, bytes: &mut [u8]) -> Result<(), PersistError> {
        match &mut self.stream {
            Stream::Read { data, pos } => {
                let n = bytes.len();
                if *pos + n > data.len() {
                    return Err(PersistError::UnexpectedEof {
                        scope: join_scopes(&self.scopes),
                        needed: n,
                        offset: *pos,
                    });
                }
                bytes.copy_from_slice(&data[*pos..*pos + n]);
                *pos += n;
            }
            Stream::Write { out } => out.extend_from_slice(bytes),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Finish
    // -----------------------------------------------------------------------

    /// End the pass. Fails if any named scope is still open; otherwise hands
    /// back the written bytes, the pending handle references, and the count
    /// of unconsumed trailing bytes.
    pub fn finish(self) -> Result<PersistOutput, PersistError> {
        if let Some(open) = self.scopes.last() {
            return Err(PersistError::UnbalancedScope(format!(
                "scope {open:?} still open at end of pass"
            )));
        }
        let (bytes, trailing) = match self.stream {
            Stream::Read { data, pos } => (Vec::new(), data.len() - pos),
            Stream::Write { out } => (out, 0),
        };
        Ok(PersistOutput {
            bytes,
            pending: self.pending,
            trailing,
        })
    }
}

fn join_scopes(scopes: &[String]) -> String {
    if scopes.is_empty() {
        "<root>".to_string()
    } else {
        scopes.join("/")
    }
}

// ===========================================================================
// Tests
// ===========================================================================
