//! Lexical analysis for tern source code.
//!
//! The lexer transforms source text into a stream of tokens that the
//! parser consumes one at a time.
//!
//! ## Structure
//!
//! - `scanner.rs` - Main `Scanner` struct that produces tokens
//! - `token.rs` - `Token`, `TokenKind` and `Span` definitions
//!
//! Malformed input never stops the scanner: it yields a
//! [`TokenKind::Invalid`] token carrying the reason, and the parser
//! reports it with a line and column.
//!
//! ## Usage
//!
//! ```rust
//! use tern_engine::lexer::{Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("let x = 42;");
//!
//! loop {
//!     let token = scanner.next_token();
//!     if matches!(token.kind, TokenKind::Eof) {
//!         break;
//!     }
//!     println!("{:?}", token.kind);
//! }
//! ```

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Span, Token, TokenKind};
