use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytecode::op::OpCode;
use crate::lang::value::Value;

/// Number of constant-pool slots addressable by a one-byte operand.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

/// Leading bytes of a serialized chunk image.
const IMAGE_MAGIC: &[u8; 4] = b"LOXC";
const IMAGE_VERSION: u8 = 1;

/// A compiled unit of bytecode.
///
/// - `code`: the instruction stream
/// - `constants`: append-only pool; indices are stable once handed out
/// - `lines`: source line of every byte in `code` (always the same length)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    code: Vec<u8>,
    constants: Vec<Value>,
    lines: Vec<usize>,
}

#[derive(Debug, Error)]
pub enum ChunkImageError {
    #[error("not a chunk image (bad magic bytes)")]
    BadMagic,

    #[error("unsupported chunk image version {0}")]
    UnsupportedVersion(u8),

    #[error("chunk image codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("chunk image has {code} code bytes but {lines} line entries")]
    LineTableMismatch { code: usize, lines: usize },

    #[error("chunk image has {0} constants, at most 256 are addressable")]
    TooManyConstants(usize),
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one byte (opcode or operand) tagged with its source line.
    pub fn write(&mut self, byte: impl Into<u8>, line: usize) {
        self.code.push(byte.into());
        self.lines.push(line);
    }

    /// Appends a constant and returns its index.
    ///
    /// The pool itself is unbounded; callers encoding the index into a
    /// one-byte operand must check it against [`MAX_CONSTANTS`] first.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Byte at `offset`. Panics when out of range.
    pub fn instruction(&self, offset: usize) -> u8 {
        self.code[offset]
    }

    /// Constant at `index`. Panics when out of range.
    pub fn constant(&self, index: usize) -> &Value {
        &self.constants[index]
    }

    /// Source line of the byte at `offset`. Panics when out of range.
    pub fn line(&self, offset: usize) -> usize {
        self.lines[offset]
    }

    /// Decodes the opcode at `offset`, if the byte is a known opcode.
    pub fn opcode(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|b| OpCode::try_from(*b).ok())
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn lines(&self) -> &[usize] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    // =========================================================================
    // Binary images
    // =========================================================================

    /// Serializes the chunk as `LOXC`, a version byte, then a postcard body.
    pub fn to_image(&self) -> Result<Vec<u8>, ChunkImageError> {
        let mut out = Vec::with_capacity(IMAGE_MAGIC.len() + 1 + self.code.len() * 2);
        out.extend_from_slice(IMAGE_MAGIC);
        out.push(IMAGE_VERSION);
        out.extend_from_slice(&postcard::to_allocvec(self)?);
        Ok(out)
    }

    pub fn from_image(bytes: &[u8]) -> Result<Self, ChunkImageError> {
        let body = bytes
            .strip_prefix(IMAGE_MAGIC.as_slice())
            .ok_or(ChunkImageError::BadMagic)?;
        let (&version, body) = body.split_first().ok_or(ChunkImageError::BadMagic)?;
        if version != IMAGE_VERSION {
            return Err(ChunkImageError::UnsupportedVersion(version));
        }

        let chunk: Chunk = postcard::from_bytes(body)?;
        if chunk.code.len() != chunk.lines.len() {
            return Err(ChunkImageError::LineTableMismatch {
                code: chunk.code.len(),
                lines: chunk.lines.len(),
            });
        }
        if chunk.constants.len() > MAX_CONSTANTS {
            return Err(ChunkImageError::TooManyConstants(chunk.constants.len()));
        }
        Ok(chunk)
    }
}
