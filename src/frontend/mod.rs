//! # Front end
//!
//! Lexical analysis for the expression language. The scanner hands out one
//! token per call so the compiler can drive it without materializing a token
//! list; `tokenize` exists for tools such as the token dumper.

pub mod scanner;
pub mod token;
pub mod token_dumper;

pub use scanner::Scanner;
pub use token::{Token, TokenKind};
