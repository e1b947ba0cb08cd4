use std::rc::Rc;

use crate::bytecode::disasm::disassemble_instruction;
use crate::bytecode::{Chunk, OpCode, check_chunk};
use crate::lang::{object::Object, value::Value};
use crate::runtime::runtime_error::{InternalError, RuntimeError, VmError};

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Cap on operand stack height. `None` lets the stack grow to whatever
    /// the chunk needs.
    pub max_stack_size: Option<usize>,
    pub max_steps: Option<usize>,
    /// Print the stack and the next instruction before executing it.
    pub trace_execution: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_stack_size: None,
            max_steps: None,
            trace_execution: false,
        }
    }
}

/// Outcome tag of [`Vm::interpret`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
    /// The bytecode itself was malformed (a compiler or loader defect).
    InternalError,
}

pub struct Vm {
    chunks: Vec<Chunk>,
    stack: Vec<Value>,
    ip: usize,
    config: VmConfig,
    steps: usize,
}

impl Vm {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self::with_config(chunks, VmConfig::default())
    }

    pub fn with_config(chunks: Vec<Chunk>, config: VmConfig) -> Self {
        Self {
            chunks,
            stack: Vec::new(),
            ip: 0,
            config,
            steps: 0,
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Runs the first chunk, prints its result and reports the outcome.
    ///
    /// Errors are written to stderr; the process is never terminated.
    pub fn interpret(&mut self) -> InterpretResult {
        match self.run() {
            Ok(value) => {
                println!("{}", value);
                InterpretResult::Ok
            }
            Err(VmError::Runtime(e)) => {
                eprintln!("{}", e);
                InterpretResult::RuntimeError
            }
            Err(VmError::Internal(e)) => {
                eprintln!("{}", e);
                InterpretResult::InternalError
            }
        }
    }

    /// Runs the first chunk and returns the value produced by `OP_RETURN`.
    pub fn run(&mut self) -> Result<Value, VmError> {
        self.reset_execution_state();

        let chunks = std::mem::take(&mut self.chunks);
        let result = match chunks.first() {
            Some(chunk) => self.run_chunk(chunk),
            None => Err(InternalError::NoChunk.into()),
        };
        self.chunks = chunks;
        result
    }

    fn reset_execution_state(&mut self) {
        self.stack.clear();
        self.ip = 0;
        self.steps = 0;
    }

    fn run_chunk(&mut self, chunk: &Chunk) -> Result<Value, VmError> {
        let depth = check_chunk(chunk).map_err(InternalError::from)?;
        self.stack.reserve(depth);
        self.exec(chunk)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    fn check_limits(&mut self, chunk: &Chunk) -> Result<(), VmError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(self.runtime_error(
                    chunk,
                    format!("Execution step limit exceeded ({}).", max),
                ));
            }
        }
        Ok(())
    }

    fn exec(&mut self, chunk: &Chunk) -> Result<Value, VmError> {
        loop {
            if self.config.trace_execution {
                self.trace(chunk);
            }

            let offset = self.ip;
            let byte = self.read_byte(chunk)?;
            self.check_limits(chunk)?;

            let op = OpCode::try_from(byte)
                .map_err(|byte| InternalError::UnknownOpcode { byte, offset })?;

            match op {
                OpCode::Constant => {
                    let index = self.read_byte(chunk)? as usize;
                    let value = chunk
                        .constants()
                        .get(index)
                        .cloned()
                        .ok_or(InternalError::ConstantOutOfRange { index, offset })?;
                    self.push(chunk, value)?;
                }
                OpCode::Nil => self.push(chunk, Value::Nil)?,
                OpCode::True => self.push(chunk, Value::Bool(true))?,
                OpCode::False => self.push(chunk, Value::Bool(false))?,

                OpCode::Equal => {
                    let b = self.pop()?;
                    let a = self.pop()?;
                    self.push(chunk, Value::Bool(a == b))?;
                }
                OpCode::Greater => self.binary_number_op(chunk, |a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(chunk, |a, b| Value::Bool(a < b))?,

                OpCode::Add => {
                    let sum = match (self.peek(1)?, self.peek(0)?) {
                        (Value::Number(a), Value::Number(b)) => Some(Value::Number(a + b)),
                        (a, b) => match (a.as_str(), b.as_str()) {
                            (Some(a), Some(b)) => Some(Value::Obj(Rc::new(Object::concat(a, b)))),
                            _ => None,
                        },
                    };
                    let Some(sum) = sum else {
                        return Err(self
                            .runtime_error(chunk, "Operands must be two numbers or two strings."));
                    };
                    self.pop()?;
                    self.pop()?;
                    self.push(chunk, sum)?;
                }
                OpCode::Subtract => self.binary_number_op(chunk, |a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(chunk, |a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_number_op(chunk, |a, b| Value::Number(a / b))?,

                OpCode::Not => {
                    let a = self.pop()?;
                    self.push(chunk, Value::Bool(a.is_falsey()))?;
                }
                OpCode::Negate => {
                    let Some(n) = self.peek(0)?.as_number() else {
                        return Err(self.runtime_error(chunk, "Operand must be a number."));
                    };
                    self.pop()?;
                    self.push(chunk, Value::Number(-n))?;
                }

                OpCode::Return => return Ok(self.pop()?),
            }
        }
    }

    fn binary_number_op(
        &mut self,
        chunk: &Chunk,
        op: impl FnOnce(f64, f64) -> Value,
    ) -> Result<(), VmError> {
        let (Some(b), Some(a)) = (self.peek(0)?.as_number(), self.peek(1)?.as_number()) else {
            return Err(self.runtime_error(chunk, "Operands must be numbers."));
        };
        self.pop()?;
        self.pop()?;
        self.push(chunk, op(a, b))
    }

    fn trace(&self, chunk: &Chunk) {
        print!("{}", self.trace_lines(chunk));
    }

    /// The stack slots, then the instruction about to execute.
    fn trace_lines(&self, chunk: &Chunk) -> String {
        let mut out = String::from("          ");
        for value in &self.stack {
            out.push_str(&format!("[ {} ]", value));
        }
        out.push('\n');
        if self.ip < chunk.len() {
            out.push_str(&disassemble_instruction(chunk, self.ip).0);
            out.push('\n');
        }
        out
    }

    // =========================================================================
    // Stack and decoding helpers
    // =========================================================================

    fn read_byte(&mut self, chunk: &Chunk) -> Result<u8, InternalError> {
        let byte = chunk
            .code()
            .get(self.ip)
            .copied()
            .ok_or(InternalError::TruncatedInstruction { offset: self.ip })?;
        self.ip += 1;
        Ok(byte)
    }

    fn push(&mut self, chunk: &Chunk, value: Value) -> Result<(), VmError> {
        if let Some(max) = self.config.max_stack_size {
            if self.stack.len() >= max {
                return Err(self.runtime_error(chunk, "Stack overflow."));
            }
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, InternalError> {
        self.stack.pop().ok_or(InternalError::StackUnderflow {
            offset: self.ip.saturating_sub(1),
        })
    }

    fn peek(&self, distance: usize) -> Result<&Value, InternalError> {
        self.stack
            .len()
            .checked_sub(distance + 1)
            .and_then(|i| self.stack.get(i))
            .ok_or(InternalError::StackUnderflow {
                offset: self.ip.saturating_sub(1),
            })
    }

    /// Builds a runtime error located at the instruction just consumed and
    /// resets the stack.
    fn runtime_error(&mut self, chunk: &Chunk, message: impl Into<String>) -> VmError {
        let line = chunk
            .lines()
            .get(self.ip.saturating_sub(1))
            .copied()
            .unwrap_or(0);
        self.stack.clear();
        RuntimeError::new(message, line).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::compile;
    use crate::bytecode::StackCheckError;
    use std::collections::HashSet;

    // ============================================================
    // Test Helpers
    // ============================================================

    fn run_source(source: &str) -> Result<Value, VmError> {
        run_source_with_config(source, VmConfig::default())
    }

    fn run_source_with_config(source: &str, config: VmConfig) -> Result<Value, VmError> {
        let chunks = compile(source).expect("source should compile");
        Vm::with_config(chunks, config).run()
    }

    fn assert_value(source: &str, expected: Value) {
        let value = run_source(source).expect("execution should succeed");
        assert_eq!(value, expected, "result mismatch for {:?}", source);
    }

    /// Asserts a runtime error with the given message on the given line.
    fn assert_error(source: &str, message: &str, line: usize) {
        match run_source(source) {
            Ok(value) => panic!("expected error '{}', got value {:?}", message, value),
            Err(VmError::Runtime(e)) => {
                assert_eq!(e.message, message);
                assert_eq!(e.line, line, "wrong line for {:?}", source);
            }
            Err(VmError::Internal(e)) => panic!("expected runtime error, got {}", e),
        }
    }

    fn chunk_of(constants: &[Value], bytes: &[u8]) -> Chunk {
        let mut chunk = Chunk::new();
        for value in constants {
            chunk.add_constant(value.clone());
        }
        for byte in bytes {
            chunk.write(*byte, 1);
        }
        chunk
    }

    // ============================================================
    // Arithmetic
    // ============================================================

    #[test]
    fn test_arithmetic_expression() {
        assert_value("10/2-3", Value::Number(2.0));
    }

    #[test]
    fn test_precedence_at_runtime() {
        assert_value("1+2*3", Value::Number(7.0));
        assert_value("(1+2)*3", Value::Number(9.0));
        assert_value("1-2-3", Value::Number(-4.0));
    }

    #[test]
    fn test_negate() {
        assert_value("-4", Value::Number(-4.0));
        assert_value("--4", Value::Number(4.0));
    }

    #[test]
    fn test_divide_by_zero_is_ieee() {
        assert_value("1/0", Value::Number(f64::INFINITY));
    }

    #[test]
    fn test_string_concatenation() {
        let value = run_source("\"a\" + \"b\"").unwrap();
        assert_eq!(value, Value::string("ab"));
        assert_eq!(value.as_str(), Some("ab"));
    }

    // ============================================================
    // Comparison and logic
    // ============================================================

    #[test]
    fn test_comparisons() {
        assert_value("1 < 2", Value::Bool(true));
        assert_value("1 > 2", Value::Bool(false));
        assert_value("2 >= 2", Value::Bool(true));
        assert_value("3 <= 2", Value::Bool(false));
        assert_value("1 != 2", Value::Bool(true));
    }

    #[test]
    fn test_equality_is_by_content() {
        assert_value("\"abc\" == \"abc\"", Value::Bool(true));
        assert_value("\"abc\" == \"abd\"", Value::Bool(false));
        assert_value("nil == nil", Value::Bool(true));
        assert_value("0 == false", Value::Bool(false));
        assert_value("nil == false", Value::Bool(false));
    }

    #[test]
    fn test_not_truthiness() {
        assert_value("!nil", Value::Bool(true));
        assert_value("!false", Value::Bool(true));
        assert_value("!0", Value::Bool(false));
        assert_value("!\"\"", Value::Bool(false));
    }

    #[test]
    fn test_logical_composition() {
        assert_value("!(5 - 4 > 3 * 2 == !nil)", Value::Bool(true));
    }

    // ============================================================
    // Runtime errors
    // ============================================================

    #[test]
    fn test_add_type_error() {
        assert_error("\"a\" + 1", "Operands must be two numbers or two strings.", 1);
        assert_error("nil + nil", "Operands must be two numbers or two strings.", 1);
    }

    #[test]
    fn test_number_type_errors() {
        assert_error("1 < \"a\"", "Operands must be numbers.", 1);
        assert_error("true * 2", "Operands must be numbers.", 1);
        assert_error("-\"a\"", "Operand must be a number.", 1);
    }

    #[test]
    fn test_error_line_is_operator_line() {
        assert_error("1 +\n\"a\"", "Operands must be two numbers or two strings.", 1);
        assert_error("\n\n-nil", "Operand must be a number.", 3);
    }

    #[test]
    fn test_runtime_error_clears_stack() {
        let chunks = compile("1 + (2 * nil)").unwrap();
        let mut vm = Vm::new(chunks);
        assert!(vm.run().is_err());
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_stack_empty_after_return() {
        let chunks = compile("1 + 2").unwrap();
        let mut vm = Vm::new(chunks);
        assert_eq!(vm.run().unwrap(), Value::Number(3.0));
        assert!(vm.stack().is_empty());
    }

    #[test]
    fn test_interpret_result_tags() {
        let mut ok = Vm::new(compile("1").unwrap());
        assert_eq!(ok.interpret(), InterpretResult::Ok);

        let mut failing = Vm::new(compile("-true").unwrap());
        assert_eq!(failing.interpret(), InterpretResult::RuntimeError);

        let mut broken = Vm::new(vec![chunk_of(&[], &[OpCode::Return as u8])]);
        assert_eq!(broken.interpret(), InterpretResult::InternalError);
    }

    // ============================================================
    // Limits
    // ============================================================

    #[test]
    fn test_stack_overflow() {
        let config = VmConfig {
            max_stack_size: Some(1),
            ..VmConfig::default()
        };
        match run_source_with_config("1 + 2", config) {
            Err(VmError::Runtime(e)) => assert_eq!(e.message, "Stack overflow."),
            other => panic!("expected stack overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_stack_grows_without_default_cap() {
        let n = 300;
        let source = format!("{}nil{}", "nil==(".repeat(n), ")".repeat(n));
        // innermost nil==nil is true, then each level flips it
        assert_eq!(run_source(&source).unwrap(), Value::Bool(n % 2 == 1));
        assert_eq!(VmConfig::default().max_stack_size, None);
    }

    #[test]
    fn test_step_limit() {
        let config = VmConfig {
            max_steps: Some(2),
            ..VmConfig::default()
        };
        match run_source_with_config("1 + 2", config) {
            Err(VmError::Runtime(e)) => {
                assert_eq!(e.message, "Execution step limit exceeded (2).")
            }
            other => panic!("expected step limit error, got {:?}", other),
        }
    }

    #[test]
    fn test_step_limit_not_hit() {
        let config = VmConfig {
            max_steps: Some(4),
            ..VmConfig::default()
        };
        assert_eq!(run_source_with_config("1 + 2", config).unwrap(), Value::Number(3.0));
    }

    // ============================================================
    // Internal errors
    // ============================================================

    #[test]
    fn test_no_chunk() {
        let err = Vm::new(Vec::new()).run().unwrap_err();
        assert_eq!(err, VmError::Internal(InternalError::NoChunk));
    }

    #[test]
    fn test_underflow_is_internal() {
        let chunk = chunk_of(&[], &[OpCode::Add as u8, OpCode::Return as u8]);
        let err = Vm::new(vec![chunk]).run().unwrap_err();
        assert!(err.is_internal());
        assert!(matches!(
            err,
            VmError::Internal(InternalError::StackCheck(StackCheckError::Underflow { .. }))
        ));
    }

    #[test]
    fn test_unknown_opcode_is_internal() {
        let chunk = chunk_of(&[], &[0xff]);
        let err = Vm::new(vec![chunk]).run().unwrap_err();
        assert!(matches!(
            err,
            VmError::Internal(InternalError::StackCheck(StackCheckError::UnknownOpcode {
                byte: 0xff,
                offset: 0
            }))
        ));
    }

    #[test]
    fn test_hand_built_chunk_runs() {
        let chunk = chunk_of(
            &[Value::Number(1.5), Value::Number(2.0)],
            &[
                OpCode::Constant as u8,
                0,
                OpCode::Constant as u8,
                1,
                OpCode::Multiply as u8,
                OpCode::Return as u8,
            ],
        );
        assert_eq!(Vm::new(vec![chunk]).run().unwrap(), Value::Number(3.0));
    }

    // ============================================================
    // Compiler / VM agreement
    // ============================================================

    #[test]
    fn test_every_emitted_opcode_is_executable() {
        let sources = [
            "1 + 2",
            "3 - 1",
            "2 * 4",
            "8 / 2",
            "-1",
            "!true",
            "false == nil",
            "1 > 2",
            "1 < 2",
            "1 >= 2",
            "1 <= 2",
            "\"s\" != \"t\"",
        ];

        let mut seen = HashSet::new();
        for source in sources {
            let chunks = compile(source).unwrap();
            let chunk = &chunks[0];
            let mut offset = 0;
            while offset < chunk.len() {
                let op = chunk.opcode(offset).expect("compiler emitted unknown opcode");
                seen.insert(op);
                offset += 1 + op.operand_len();
            }

            let result = Vm::new(chunks).run();
            assert!(result.is_ok(), "{:?} failed: {:?}", source, result);
        }

        for op in OpCode::ALL {
            assert!(seen.contains(&op), "{} never emitted", op.name());
        }
    }

    // ============================================================
    // Trace output
    // ============================================================

    #[test]
    fn test_trace_lines_before_first_instruction() {
        let vm = Vm::new(Vec::new());
        let chunk = compile("1 + 2").unwrap().remove(0);
        assert_eq!(
            vm.trace_lines(&chunk),
            "          \n0000    1 OP_CONSTANT         0 '1'\n"
        );
    }

    #[test]
    fn test_trace_lines_show_stack_slots() {
        let chunk = compile("\"a\" + 2.5").unwrap().remove(0);
        let mut vm = Vm::new(Vec::new());
        vm.stack.push(Value::string("a"));
        vm.stack.push(Value::Number(2.5));
        vm.ip = 4;
        assert_eq!(
            vm.trace_lines(&chunk),
            "          [ a ][ 2.5 ]\n0004    | OP_ADD\n"
        );
    }

    #[test]
    fn test_run_is_repeatable() {
        let mut vm = Vm::new(compile("\"x\" + \"y\"").unwrap());
        assert_eq!(vm.run().unwrap(), Value::string("xy"));
        assert_eq!(vm.run().unwrap(), Value::string("xy"));
    }
}
