use thiserror::Error;

use crate::bytecode::{Chunk, OpCode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackCheckError {
    #[error("stack underflow at offset {offset}: {op} needs {needed} value(s), stack holds {height}")]
    Underflow {
        offset: usize,
        op: OpCode,
        needed: usize,
        height: usize,
    },

    #[error("unknown opcode {byte} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("{op} at offset {offset} is missing its operand")]
    Truncated { op: OpCode, offset: usize },

    #[error("constant index {index} at offset {offset} is outside a pool of {pool}")]
    ConstantOutOfRange {
        index: usize,
        offset: usize,
        pool: usize,
    },

    #[error("OP_RETURN at offset {offset} leaves {height} value(s) on the stack")]
    UnbalancedReturn { offset: usize, height: usize },

    #[error("unreachable code after OP_RETURN at offset {offset}")]
    UnreachableCode { offset: usize },

    #[error("chunk does not end with OP_RETURN")]
    MissingReturn,
}

/// Verifies the stack discipline of a chunk without running it.
///
/// The instruction stream is straight-line (there are no jumps), so a single
/// linear scan over the `(pops, pushes)` effect of each opcode gives the exact
/// stack height at every instruction. Returns the maximum height reached.
pub fn check_chunk(chunk: &Chunk) -> Result<usize, StackCheckError> {
    let mut height: usize = 0;
    let mut max_height: usize = 0;
    let mut offset = 0;

    while offset < chunk.len() {
        let byte = chunk.instruction(offset);
        let op = OpCode::try_from(byte).map_err(|byte| StackCheckError::UnknownOpcode { byte, offset })?;

        if op == OpCode::Constant {
            let index = *chunk
                .code()
                .get(offset + 1)
                .ok_or(StackCheckError::Truncated { op, offset })? as usize;
            if index >= chunk.constants().len() {
                return Err(StackCheckError::ConstantOutOfRange {
                    index,
                    offset,
                    pool: chunk.constants().len(),
                });
            }
        }

        let (pops, pushes) = op.stack_effect();
        if height < pops {
            return Err(StackCheckError::Underflow {
                offset,
                op,
                needed: pops,
                height,
            });
        }
        height = height - pops + pushes;
        max_height = max_height.max(height);

        let next = offset + 1 + op.operand_len();
        if op == OpCode::Return {
            if height != 0 {
                return Err(StackCheckError::UnbalancedReturn { offset, height });
            }
            if next < chunk.len() {
                return Err(StackCheckError::UnreachableCode { offset: next });
            }
            return Ok(max_height);
        }
        offset = next;
    }

    Err(StackCheckError::MissingReturn)
}
