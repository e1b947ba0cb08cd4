//! A bytecode compiler and stack VM for Lox expressions.
//!
//! Source text goes through three stages:
//!
//! 1. [`frontend::Scanner`] produces tokens on demand.
//! 2. [`bytecode::Compiler`] parses them with a Pratt parser and emits a
//!    [`bytecode::Chunk`] in the same pass.
//! 3. [`runtime::Vm`] verifies the chunk and executes it.
//!
//! [`interpret`] runs the whole pipeline and prints; [`run`] returns the value.

pub mod bytecode;
pub mod frontend;
pub mod lang;
pub mod runtime;

use thiserror::Error;

pub use bytecode::{Chunk, CompileError, CompilerConfig, OpCode};
pub use lang::Value;
pub use runtime::{InterpretResult, Vm, VmConfig, VmError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Compiles and runs `source`, printing the result to stdout and any
/// diagnostics to stderr.
pub fn interpret(source: &str) -> InterpretResult {
    interpret_with_config(source, CompilerConfig::default(), VmConfig::default())
}

pub fn interpret_with_config(
    source: &str,
    compiler_config: CompilerConfig,
    vm_config: VmConfig,
) -> InterpretResult {
    match bytecode::Compiler::with_config(source, compiler_config).compile() {
        Ok(chunks) => Vm::with_config(chunks, vm_config).interpret(),
        Err(e) => {
            eprintln!("{}", e);
            InterpretResult::CompileError
        }
    }
}

/// Compiles and runs `source` without printing anything.
pub fn run(
    source: &str,
    compiler_config: CompilerConfig,
    vm_config: VmConfig,
) -> Result<Value, PipelineError> {
    let chunks = bytecode::Compiler::with_config(source, compiler_config).compile()?;
    Ok(Vm::with_config(chunks, vm_config).run()?)
}
