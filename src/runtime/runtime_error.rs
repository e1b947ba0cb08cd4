use thiserror::Error;

use crate::bytecode::StackCheckError;

/// A language-level error raised while executing a chunk.
///
/// `line` is the source line of the instruction that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}\n[line {line}] in script.")]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        RuntimeError {
            message: message.into(),
            line,
        }
    }
}

/// A broken VM invariant. These indicate malformed bytecode, never a mistake
/// in the user's program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("internal error: stack underflow at offset {offset}")]
    StackUnderflow { offset: usize },

    #[error("internal error: unknown opcode {byte} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("internal error: truncated instruction at offset {offset}")]
    TruncatedInstruction { offset: usize },

    #[error("internal error: constant {index} out of range at offset {offset}")]
    ConstantOutOfRange { index: usize, offset: usize },

    #[error("internal error: no chunk to execute")]
    NoChunk,

    #[error("internal error: bytecode failed verification: {0}")]
    StackCheck(#[from] StackCheckError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl VmError {
    pub fn is_internal(&self) -> bool {
        matches!(self, VmError::Internal(_))
    }
}
