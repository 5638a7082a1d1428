//! The bytecode virtual machine.
//!
//! ## Structure
//!
//! - `interpreter` - Fetch/decode/dispatch loop and the opcode handlers
//! - `error` - Run-time errors

mod error;
mod interpreter;

pub use error::RuntimeError;
pub use interpreter::VM;
