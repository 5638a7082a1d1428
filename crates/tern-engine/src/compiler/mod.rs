//! Bytecode compiler.
//!
//! Transforms the AST into a [`Program`] the VM can execute.
//!
//! # Module Structure
//!
//! - `bytecode`: Program, instruction and opcode definitions
//! - `types`: Operator/type registry driving instruction selection
//! - `codegen`: Code generation from the AST
//!   - `codegen::scope`: Scope chain and frame layout
//!   - `codegen::references`: Symbolic labels for forward branches
//! - `error`: Compile-time errors

pub mod bytecode;
pub mod codegen;
pub mod error;
pub mod types;

pub use bytecode::{ENGINE_VERSION, Instruction, OpCode, Operand, Program};
pub use codegen::Compiler;
pub use error::CompileError;
