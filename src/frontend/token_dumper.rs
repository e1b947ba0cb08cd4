use colored::{ColoredString, Colorize};

use crate::frontend::token::{Token, TokenKind};

pub struct TokenDumper {
    pub color: bool,
    pub show_lexeme: bool, // if false, only kinds and lines are printed
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_lexeme: true,
        }
    }
}

impl TokenDumper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn kinds_only(mut self) -> Self {
        self.show_lexeme = false;
        self
    }

    pub fn dump(&self, tokens: &[Token<'_>]) {
        print!("{}", self.render(tokens));
    }

    /// Renders one line per token; a repeated line number prints as `   |`.
    pub fn render(&self, tokens: &[Token<'_>]) -> String {
        let mut out = String::new();
        let mut last_line = None;

        for token in tokens {
            let line = if last_line == Some(token.line) {
                "   |".to_string()
            } else {
                format!("{:4}", token.line)
            };
            last_line = Some(token.line);

            let kind = format!("{:<14}", token.kind.name());
            let kind = self.paint(kind, token.kind);

            if self.show_lexeme {
                out.push_str(&format!("{} {} '{}'\n", line, kind, token.lexeme));
            } else {
                out.push_str(&format!("{} {}\n", line, kind));
            }
        }

        out
    }

    fn paint(&self, text: String, kind: TokenKind) -> ColoredString {
        if !self.color {
            return text.normal();
        }

        use TokenKind::*;
        match kind {
            Eof => text.dimmed(),
            Error => text.red().bold(),
            String => text.green(),
            Number | True | False | Nil => text.cyan(),
            Identifier => text.yellow(),
            Plus | Minus | Star | Slash | Bang => text.magenta(),
            BangEqual | EqualEqual | Greater | GreaterEqual | Less | LessEqual => text.magenta(),
            k if k.is_keyword() => text.blue(),
            _ => text.normal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::scanner::Scanner;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_plain() {
        let tokens = Scanner::new("1 +\n\"a\"").tokenize();
        let out = TokenDumper::new().no_color().render(&tokens);
        assert_eq!(
            out,
            "   1 NUMBER         '1'\n   | PLUS           '+'\n   2 STRING         '\"a\"'\n   | EOF            ''\n"
        );
    }

    #[test]
    fn test_render_kinds_only() {
        let tokens = Scanner::new("nil").tokenize();
        let out = TokenDumper::new().no_color().kinds_only().render(&tokens);
        assert_eq!(out, "   1 NIL           \n   | EOF           \n");
    }
}
