//! Token definitions for the lexer.

use std::fmt;

/// A span in the source code, representing a range of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length of this span in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 1-based line and column of the span start within `source`.
    pub fn line_column(&self, source: &str) -> (usize, usize) {
        let before = &source[..self.start.min(source.len())];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(newline) => before[newline + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        (line, column)
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The span in the source code
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The different kinds of tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    Int(i32),
    /// Floating point literal
    Float(f64),
    /// String literal with escapes resolved
    String(String),
    /// Template literal: text chunks around the raw source of each
    /// `${...}` interpolation. There is one more chunk than expressions.
    Template {
        chunks: Vec<String>,
        expressions: Vec<String>,
    },
    True,
    False,
    Null,

    /// Identifier
    Identifier(String),

    // Keywords
    Let,
    Var,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    For,
    Break,

    // Punctuation
    /// {
    LeftBrace,
    /// }
    RightBrace,
    /// #{
    HashBrace,
    /// (
    LeftParen,
    /// )
    RightParen,
    /// [
    LeftBracket,
    /// ]
    RightBracket,
    Dot,
    Semicolon,
    Comma,
    Colon,
    Question,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    PlusPlus,
    MinusMinus,
    Bang,
    EqualEqual,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    AmpersandAmpersand,
    PipePipe,
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    StarStarEqual,

    // Special
    Eof,
    /// Malformed input, with the reason
    Invalid(String),
}

impl TokenKind {
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Let
                | TokenKind::Var
                | TokenKind::Const
                | TokenKind::Function
                | TokenKind::Return
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Break
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::String(_)
                | TokenKind::Template { .. }
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Int(n) => return write!(f, "{}", n),
            TokenKind::Float(n) => return write!(f, "{}", n),
            TokenKind::String(s) => return write!(f, "{:?}", s),
            TokenKind::Template { .. } => "template string",
            TokenKind::Identifier(name) => return write!(f, "'{}'", name),
            TokenKind::Invalid(reason) => return write!(f, "{}", reason),
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::Let => "'let'",
            TokenKind::Var => "'var'",
            TokenKind::Const => "'const'",
            TokenKind::Function => "'function'",
            TokenKind::Return => "'return'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::Break => "'break'",
            TokenKind::LeftBrace => "'{'",
            TokenKind::RightBrace => "'}'",
            TokenKind::HashBrace => "'#{'",
            TokenKind::LeftParen => "'('",
            TokenKind::RightParen => "')'",
            TokenKind::LeftBracket => "'['",
            TokenKind::RightBracket => "']'",
            TokenKind::Dot => "'.'",
            TokenKind::Semicolon => "';'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Question => "'?'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::StarStar => "'**'",
            TokenKind::PlusPlus => "'++'",
            TokenKind::MinusMinus => "'--'",
            TokenKind::Bang => "'!'",
            TokenKind::EqualEqual => "'=='",
            TokenKind::NotEqual => "'!='",
            TokenKind::LessThan => "'<'",
            TokenKind::LessThanEqual => "'<='",
            TokenKind::GreaterThan => "'>'",
            TokenKind::GreaterThanEqual => "'>='",
            TokenKind::AmpersandAmpersand => "'&&'",
            TokenKind::PipePipe => "'||'",
            TokenKind::Equal => "'='",
            TokenKind::PlusEqual => "'+='",
            TokenKind::MinusEqual => "'-='",
            TokenKind::StarEqual => "'*='",
            TokenKind::SlashEqual => "'/='",
            TokenKind::PercentEqual => "'%='",
            TokenKind::StarStarEqual => "'**='",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_len() {
        let span = Span::new(5, 15);
        assert_eq!(span.len(), 10);
        assert!(Span::new(5, 5).is_empty());
    }

    #[test]
    fn test_line_column() {
        let source = "let a = 1;\nlet b = @;";
        assert_eq!(Span::new(0, 1).line_column(source), (1, 1));
        assert_eq!(Span::new(19, 20).line_column(source), (2, 9));
    }

    #[test]
    fn test_is_keyword() {
        assert!(TokenKind::If.is_keyword());
        assert!(TokenKind::Break.is_keyword());
        assert!(!TokenKind::Identifier("print".into()).is_keyword());
        assert!(!TokenKind::Plus.is_keyword());
    }

    #[test]
    fn test_is_literal() {
        assert!(TokenKind::Int(1).is_literal());
        assert!(TokenKind::Null.is_literal());
        assert!(!TokenKind::Let.is_literal());
    }

    #[test]
    fn test_display() {
        assert_eq!(TokenKind::HashBrace.to_string(), "'#{'");
        assert_eq!(TokenKind::Identifier("x".into()).to_string(), "'x'");
        assert_eq!(TokenKind::Eof.to_string(), "end of input");
    }
}
