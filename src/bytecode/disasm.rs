use crate::bytecode::{Chunk, OpCode};

/// Print disassembly of a chunk
pub fn print_chunk(chunk: &Chunk, name: &str) {
    print!("{}", disassemble_chunk(chunk, name));
}

/// Return disassembly of a whole chunk as a String.
///
/// ```text
/// == code ==
/// 0000    1 OP_CONSTANT         0 '1'
/// 0002    | OP_CONSTANT         1 '2'
/// 0004    | OP_ADD
/// 0005    | OP_RETURN
/// ```
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut output = format!("== {} ==\n", name);
    let mut offset = 0;

    while offset < chunk.len() {
        let (line, next) = disassemble_instruction(chunk, offset);
        output.push_str(&line);
        output.push('\n');
        offset = next;
    }

    output
}

/// Disassembles the instruction at `offset`.
///
/// Returns the rendered line (without trailing newline) and the offset of
/// the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut output = format!("{:04} ", offset);

    if offset > 0 && chunk.line(offset) == chunk.line(offset - 1) {
        output.push_str("   | ");
    } else {
        output.push_str(&format!("{:4} ", chunk.line(offset)));
    }

    let byte = chunk.instruction(offset);
    let Ok(op) = OpCode::try_from(byte) else {
        output.push_str(&format!("Unknown opcode {}", byte));
        return (output, offset + 1);
    };

    match op {
        OpCode::Constant => constant_instruction(op, chunk, offset, output),
        _ => simple_instruction(op, offset, output),
    }
}

fn simple_instruction(op: OpCode, offset: usize, mut output: String) -> (String, usize) {
    output.push_str(op.name());
    (output, offset + 1)
}

fn constant_instruction(
    op: OpCode,
    chunk: &Chunk,
    offset: usize,
    mut output: String,
) -> (String, usize) {
    let Some(&index) = chunk.code().get(offset + 1) else {
        output.push_str(&format!("{:<16} <missing operand>", op.name()));
        return (output, offset + 1);
    };

    match chunk.constants().get(index as usize) {
        Some(value) => {
            output.push_str(&format!("{:<16} {:4} '{}'", op.name(), index, value));
        }
        None => {
            output.push_str(&format!("{:<16} {:4} <out of range>", op.name(), index));
        }
    }
    (output, offset + 2)
}
