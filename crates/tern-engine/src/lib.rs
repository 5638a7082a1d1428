// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # tern-engine
//!
//! A small statically-typed scripting language compiled to bytecode and
//! executed on a stack virtual machine.
//!
//! ## Overview
//!
//! - Lexer and recursive descent parser producing an untyped AST
//! - Type-directed bytecode compiler with a process-wide type registry
//! - Stack VM with call frames, fuel and stack limits
//! - Host environment for native functions and module objects
//! - Async and parallel front-ends behind cargo features
//!
//! ## Quick Start
//!
//! ```rust
//! use tern_engine::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! let result = engine.eval("let x: int = 20; x + 22;").unwrap();
//! assert_eq!(result, Value::Int(42));
//! ```

#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod config;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod vm;

#[cfg(any(feature = "async", feature = "parallel"))]
pub mod async_engine;

use std::path::Path;

use tracing::{debug, instrument};

use crate::compiler::Compiler;
use crate::parser::Parser;

// Re-exports for convenience
pub use compiler::{CompileError, Program};
pub use config::EngineConfig;
pub use runtime::{Environment, HostEnvironment, Value};
pub use vm::{RuntimeError, VM};

#[cfg(feature = "async")]
pub use async_engine::AsyncEngine;
#[cfg(feature = "parallel")]
pub use async_engine::ParallelCompiler;

/// The main engine instance.
///
/// Owns the host environment (with the builtins installed), the
/// configuration and a VM that is reused across runs. Each call to
/// [`Engine::eval`] compiles and runs an independent program; only host
/// bindings persist between calls.
#[derive(Debug)]
pub struct Engine {
    environment: HostEnvironment,
    config: EngineConfig,
    vm: VM,
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given limits.
    pub fn with_config(config: EngineConfig) -> Self {
        let mut environment = HostEnvironment::new();
        builtins::install(&mut environment);
        Self {
            environment,
            vm: VM::with_config(config.clone()),
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The host environment, for defining extra functions and constants.
    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    /// Mutable access to the host environment.
    pub fn environment_mut(&mut self) -> &mut HostEnvironment {
        &mut self.environment
    }

    /// Parses and compiles `source` without running it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let engine = tern_engine::Engine::new();
    /// let program = engine.compile("1 + 2;").unwrap();
    /// assert!(program.to_string().contains("ADD_INT"));
    /// ```
    #[instrument(level = "debug", skip_all, fields(bytes = source.len()))]
    pub fn compile(&self, source: &str) -> Result<Program, Error> {
        compile_with(&self.environment, source, self.config.trace)
    }

    /// Runs a compiled program.
    #[instrument(level = "debug", skip_all, fields(instructions = program.len()))]
    pub fn run(&mut self, program: &Program) -> Result<Value, Error> {
        Ok(self.vm.execute(program, &self.environment)?)
    }

    /// Evaluates source code and returns the program result.
    ///
    /// # Arguments
    ///
    /// * `source` - The source code to evaluate
    ///
    /// # Returns
    ///
    /// The value of the final expression statement or `return`, or an
    /// error if parsing, compilation or execution fails.
    pub fn eval(&mut self, source: &str) -> Result<Value, Error> {
        let program = self.compile(source)?;
        self.run(&program)
    }

    /// Evaluates source code from a file.
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<Value, Error> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        self.eval(&source)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses and compiles `source` against `environment`.
pub(crate) fn compile_with(
    environment: &dyn Environment,
    source: &str,
    trace: bool,
) -> Result<Program, Error> {
    let ast = Parser::new(source).parse_program()?;
    let program = Compiler::new(environment).compile(&ast)?;
    if trace {
        debug!("compiled program:\n{}", program);
    }
    Ok(program)
}

/// Errors produced while turning source into a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Malformed source text
    #[error("SyntaxError: {message} (line {line}, column {column})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },
    /// Well-formed source the compiler rejected
    #[error("CompileError: {0}")]
    Compile(#[from] CompileError),
    /// Failure while executing bytecode
    #[error("RuntimeError: {0}")]
    Runtime(#[from] RuntimeError),
    /// I/O error
    #[error("IOError: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_expression() {
        let mut engine = Engine::new();
        assert_eq!(engine.eval("1 + 1;").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_syntax_error_is_positioned() {
        let mut engine = Engine::new();
        let err = engine.eval("let x = ;").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, column: 9, .. }));
    }

    #[test]
    fn test_errors_are_lifted() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.eval("missing;").unwrap_err(),
            Error::Compile(CompileError::UnknownIdentifier(_))
        ));
        assert_eq!(
            engine.eval("let z = 0; 1 / z;").unwrap_err(),
            Error::Runtime(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn test_host_function() {
        let mut engine = Engine::new();
        engine
            .environment_mut()
            .define_function("triple", Some(1), |args| match &args[0] {
                Value::Int(n) => Ok(Value::Int(n * 3)),
                other => Err(format!("cannot triple {}", other.type_name())),
            });
        assert_eq!(engine.eval("triple(14);").unwrap(), Value::Int(42));
    }

    #[test]
    fn test_fuel_limit() {
        let mut engine = Engine::with_config(EngineConfig::default().with_fuel(1_000));
        assert_eq!(
            engine.eval("while (true) { }").unwrap_err(),
            Error::Runtime(RuntimeError::OutOfFuel(1_000))
        );
    }

    #[test]
    fn test_missing_file() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.eval_file("/definitely/not/here.tern"),
            Err(Error::Io(_))
        ));
    }
}
