//! Parser for tern source code.
//!
//! Transforms a stream of tokens into an Abstract Syntax Tree (AST).
//!
//! ## Structure
//!
//! - `parser` - Recursive descent parser, one method per precedence level
//!
//! ## Usage
//!
//! ```rust
//! use tern_engine::parser::Parser;
//!
//! let mut parser = Parser::new("let x: int = 1 + 2;");
//! let program = parser.parse_program().expect("Should parse");
//! assert_eq!(program.body.len(), 1);
//! ```

mod parser;

pub use parser::Parser;
