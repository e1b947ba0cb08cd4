//! # Bytecode
//!
//! The compact binary instruction format and everything that produces or
//! inspects it: the single-pass compiler, the chunk container, the
//! disassembler and the static stack checker.

pub mod chunk;
pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod op;
pub mod stack_check;

pub use chunk::{Chunk, ChunkImageError, MAX_CONSTANTS};
pub use compile::{Compiler, CompilerConfig, compile};
pub use compile_error::{CompileError, Diagnostic, ErrorLocation};
pub use op::OpCode;
pub use stack_check::{StackCheckError, check_chunk};
