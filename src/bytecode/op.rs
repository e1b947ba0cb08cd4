// =============================================================================
// OpCode - one-byte instruction tags
// =============================================================================

/// Bytecode instruction tag.
///
/// Every instruction is one opcode byte, optionally followed by operand bytes.
/// Only `Constant` carries an operand: a one-byte index into the chunk's
/// constant pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // literals
    Constant,
    Nil,
    True,
    False,

    // comparison
    Equal,
    Greater,
    Less,

    // arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // unary
    Not,
    Negate,

    Return,
}

impl OpCode {
    pub const ALL: [OpCode; 14] = [
        OpCode::Constant,
        OpCode::Nil,
        OpCode::True,
        OpCode::False,
        OpCode::Equal,
        OpCode::Greater,
        OpCode::Less,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Not,
        OpCode::Negate,
        OpCode::Return,
    ];

    /// Mnemonic used in disassembly.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Equal => "OP_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::Less => "OP_LESS",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Not => "OP_NOT",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Return => "OP_RETURN",
        }
    }

    /// Number of operand bytes following the opcode.
    pub fn operand_len(self) -> usize {
        match self {
            OpCode::Constant => 1,
            _ => 0,
        }
    }

    /// Returns (pops, pushes) for the instruction.
    pub fn stack_effect(self) -> (usize, usize) {
        match self {
            OpCode::Constant | OpCode::Nil | OpCode::True | OpCode::False => (0, 1),
            OpCode::Equal | OpCode::Greater | OpCode::Less => (2, 1),
            OpCode::Add | OpCode::Subtract | OpCode::Multiply | OpCode::Divide => (2, 1),
            OpCode::Not | OpCode::Negate => (1, 1),
            OpCode::Return => (1, 0),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl TryFrom<u8> for OpCode {
    /// The byte that did not decode.
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::ALL.get(byte as usize).copied().ok_or(byte)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
