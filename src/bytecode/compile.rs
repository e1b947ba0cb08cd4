use crate::{
    bytecode::{
        chunk::{Chunk, MAX_CONSTANTS},
        compile_error::{CompileError, Diagnostic, ErrorLocation},
        disasm,
        op::OpCode,
    },
    frontend::{Scanner, Token, TokenKind},
    lang::value::Value,
};

// =============================================================================
// Precedence and the parse-rule table
// =============================================================================

/// Binding power of an operator, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    /// The next-higher level. Binary operands parse at this level so that
    /// operators of equal precedence associate to the left.
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call | Primary => Primary,
        }
    }
}

/// Parse handlers a rule can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseFn {
    Grouping,
    Unary,
    Binary,
    Number,
    String,
    Literal,
}

#[derive(Debug, Clone, Copy)]
struct ParseRule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

impl ParseRule {
    const fn new(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> Self {
        ParseRule {
            prefix,
            infix,
            precedence,
        }
    }
}

/// Static token-kind to parse-rule mapping.
const fn rule(kind: TokenKind) -> ParseRule {
    use ParseFn as F;
    use TokenKind as K;
    match kind {
        K::LeftParen => ParseRule::new(Some(F::Grouping), None, Precedence::None),
        K::Minus => ParseRule::new(Some(F::Unary), Some(F::Binary), Precedence::Term),
        K::Plus => ParseRule::new(None, Some(F::Binary), Precedence::Term),
        K::Slash | K::Star => ParseRule::new(None, Some(F::Binary), Precedence::Factor),
        K::Bang => ParseRule::new(Some(F::Unary), None, Precedence::None),
        K::BangEqual | K::EqualEqual => {
            ParseRule::new(None, Some(F::Binary), Precedence::Equality)
        }
        K::Greater | K::GreaterEqual | K::Less | K::LessEqual => {
            ParseRule::new(None, Some(F::Binary), Precedence::Comparison)
        }
        K::String => ParseRule::new(Some(F::String), None, Precedence::None),
        K::Number => ParseRule::new(Some(F::Number), None, Precedence::None),
        K::False | K::True | K::Nil => ParseRule::new(Some(F::Literal), None, Precedence::None),
        _ => ParseRule::new(None, None, Precedence::None),
    }
}

// =============================================================================
// Compiler
// =============================================================================

/// Deepest allowed `parse_precedence` recursion. Each parenthesis level
/// costs two, each prefix operator one.
pub const MAX_NESTING: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Disassemble every successfully compiled chunk to stdout.
    pub print_code: bool,
}

/// Token window and error flags for one compile pass.
struct Parser<'src> {
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
}

/// Single-pass compiler: drives the scanner and emits bytecode directly,
/// without building a syntax tree.
pub struct Compiler<'src> {
    scanner: Scanner<'src>,
    parser: Parser<'src>,
    /// Chunk under construction.
    chunk: Chunk,
    /// Chunks already finished by this pass.
    finished: Vec<Chunk>,
    diagnostics: Vec<Diagnostic>,
    /// Current `parse_precedence` recursion depth.
    depth: usize,
    config: CompilerConfig,
}

/// Compiles `source` with the default configuration.
pub fn compile(source: &str) -> Result<Vec<Chunk>, CompileError> {
    Compiler::new(source).compile()
}

impl<'src> Compiler<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_config(source, CompilerConfig::default())
    }

    pub fn with_config(source: &'src str, config: CompilerConfig) -> Self {
        Self {
            scanner: Scanner::new(source),
            parser: Parser {
                current: Token::synthetic(),
                previous: Token::synthetic(),
                had_error: false,
                panic_mode: false,
            },
            chunk: Chunk::new(),
            finished: Vec::new(),
            diagnostics: Vec::new(),
            depth: 0,
            config,
        }
    }

    /// Compiles one expression into a chunk sequence (currently always one
    /// chunk). Any reported error discards all emitted bytecode.
    pub fn compile(mut self) -> Result<Vec<Chunk>, CompileError> {
        self.advance();
        self.expression();
        self.consume(TokenKind::Eof, "Expect end of expression.");
        self.end_compiler();

        if self.parser.had_error {
            return Err(CompileError::new(self.diagnostics));
        }
        self.finished.push(self.chunk);
        Ok(self.finished)
    }

    // =========================================================================
    // Token stream
    // =========================================================================

    fn advance(&mut self) {
        self.parser.previous = self.parser.current;

        loop {
            self.parser.current = self.scanner.scan_token();
            if self.parser.current.kind != TokenKind::Error {
                break;
            }
            let message = self.parser.current.lexeme;
            self.error_at_current(message);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.parser.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    /// Parses a prefix expression, then folds in infix operators for as long
    /// as the upcoming token binds at least as tightly as `precedence`.
    fn parse_precedence(&mut self, precedence: Precedence) {
        if self.depth >= MAX_NESTING {
            self.error_at_current("Expression nests too deeply.");
            return;
        }
        self.depth += 1;

        self.advance();
        match rule(self.parser.previous.kind).prefix {
            Some(prefix) => {
                self.apply(prefix);
                while precedence <= rule(self.parser.current.kind).precedence {
                    self.advance();
                    if let Some(infix) = rule(self.parser.previous.kind).infix {
                        self.apply(infix);
                    }
                }
            }
            None => self.error("Expect expression."),
        }

        self.depth -= 1;
    }

    fn apply(&mut self, parse_fn: ParseFn) {
        match parse_fn {
            ParseFn::Grouping => self.grouping(),
            ParseFn::Unary => self.unary(),
            ParseFn::Binary => self.binary(),
            ParseFn::Number => self.number(),
            ParseFn::String => self.string(),
            ParseFn::Literal => self.literal(),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let operator = self.parser.previous;

        // Compile the operand.
        self.parse_precedence(Precedence::Unary);

        match operator.kind {
            TokenKind::Minus => self.emit_op_at(OpCode::Negate, operator.line),
            TokenKind::Bang => self.emit_op_at(OpCode::Not, operator.line),
            _ => unreachable!("no unary rule for {}", operator.kind),
        }
    }

    fn binary(&mut self) {
        let operator = self.parser.previous;
        self.parse_precedence(rule(operator.kind).precedence.next());

        let line = operator.line;
        match operator.kind {
            TokenKind::Plus => self.emit_op_at(OpCode::Add, line),
            TokenKind::Minus => self.emit_op_at(OpCode::Subtract, line),
            TokenKind::Star => self.emit_op_at(OpCode::Multiply, line),
            TokenKind::Slash => self.emit_op_at(OpCode::Divide, line),
            TokenKind::EqualEqual => self.emit_op_at(OpCode::Equal, line),
            TokenKind::Greater => self.emit_op_at(OpCode::Greater, line),
            TokenKind::Less => self.emit_op_at(OpCode::Less, line),
            // `!=`, `>=` and `<=` are encoded as the negated complement.
            TokenKind::BangEqual => self.emit_ops_at(OpCode::Equal, OpCode::Not, line),
            TokenKind::GreaterEqual => self.emit_ops_at(OpCode::Less, OpCode::Not, line),
            TokenKind::LessEqual => self.emit_ops_at(OpCode::Greater, OpCode::Not, line),
            _ => unreachable!("no binary rule for {}", operator.kind),
        }
    }

    fn number(&mut self) {
        match self.parser.previous.lexeme.parse::<f64>() {
            Ok(value) => self.emit_constant(Value::Number(value)),
            Err(_) => self.error("Invalid number literal."),
        }
    }

    fn string(&mut self) {
        let lexeme = self.parser.previous.lexeme;
        // Strip the surrounding quotes.
        let contents = &lexeme[1..lexeme.len() - 1];
        self.emit_constant(Value::string(contents));
    }

    fn literal(&mut self) {
        match self.parser.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            other => unreachable!("no literal rule for {}", other),
        }
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.chunk
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.parser.previous.line;
        self.current_chunk().write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op.into());
    }

    fn emit_op_at(&mut self, op: OpCode, line: usize) {
        self.current_chunk().write(op, line);
    }

    fn emit_ops_at(&mut self, first: OpCode, second: OpCode, line: usize) {
        self.emit_op_at(first, line);
        self.emit_op_at(second, line);
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        let line = self.parser.previous.line;
        let chunk = self.current_chunk();
        chunk.write(OpCode::Constant, line);
        chunk.write(index, line);
    }

    /// Adds `value` to the pool, reporting an error instead once all 256
    /// one-byte slots are taken.
    fn make_constant(&mut self, value: Value) -> u8 {
        if self.current_chunk().constants().len() >= MAX_CONSTANTS {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        let index = self.current_chunk().add_constant(value);
        u8::try_from(index).unwrap_or(0)
    }

    fn end_compiler(&mut self) {
        self.emit_op(OpCode::Return);

        if let Some(listing) = self.code_listing() {
            print!("{}", listing);
        }
    }

    /// Disassembly of the finished chunk when `print_code` is set and the
    /// pass succeeded.
    fn code_listing(&self) -> Option<String> {
        if !self.config.print_code || self.parser.had_error {
            return None;
        }
        Some(disasm::disassemble_chunk(&self.chunk, "code"))
    }

    // =========================================================================
    // Error reporting
    // =========================================================================

    fn error(&mut self, message: &str) {
        let token = self.parser.previous;
        self.error_at(token, message);
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.parser.current;
        self.error_at(token, message);
    }

    /// Records a diagnostic unless one is already pending. Panic mode lasts
    /// until the end of the pass, since an expression has no statement
    /// boundary to resynchronize on.
    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.parser.panic_mode {
            return;
        }
        self.parser.panic_mode = true;

        let location = match token.kind {
            TokenKind::Eof => ErrorLocation::AtEnd,
            TokenKind::Error => ErrorLocation::Unlocated,
            _ => ErrorLocation::AtLexeme(token.lexeme.to_string()),
        };
        self.diagnostics
            .push(Diagnostic::new(token.line, location, message));
        self.parser.had_error = true;
    }
}
