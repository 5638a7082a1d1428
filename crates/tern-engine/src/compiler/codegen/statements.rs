//! Statement compilation.
//!
//! | Statement | Key Operations | Notes |
//! |-----------|----------------|-------|
//! | `let/const` | `ALLOC_STACK` prologue, `STORE_LOCAL*` | Slot reserved at frame start |
//! | `if/else` | `BRANCH_FALSE`, `JUMP` | Labels open on the next emitted instruction |
//! | `while/for` | `BRANCH_FALSE`, `JUMP` (back) | Breaks patched to the end label |
//! | `break n` | `JUMP` | Collected `n` loops out |
//! | `return` | `RETURN*` / `TERM` | `TERM` at top level |
//! | `function` | separate buffer | Appended after the main stream |

use super::{Compiler, Location, Signature, accepts, return_for, widen};
use crate::ast::*;
use crate::compiler::bytecode::{OpCode, Operand};
use crate::compiler::error::CompileError;
use crate::compiler::types::{self, TypeName};
use tracing::debug;

impl Compiler<'_> {
    /// Compiles one statement. With `keep_value`, an expression statement
    /// leaves its value on the stack; returns whether a value was left.
    pub(super) fn compile_statement(
        &mut self,
        statement: &Statement,
        keep_value: bool,
    ) -> Result<bool, CompileError> {
        match statement {
            Statement::Expression(expression) => {
                self.compile_expression(expression)?;
                if self.state.current_datatype == types::VOID {
                    return Ok(false);
                }
                if keep_value {
                    return Ok(true);
                }
                self.emit(OpCode::PopStack, Operand::Int(1));
            }
            Statement::Declaration(declaration) => self.compile_declaration(declaration)?,
            Statement::FunctionDeclaration(function) => self.compile_function(function)?,
            Statement::Block(block) => {
                self.state.scopes.begin_scope();
                self.compile_statements(&block.body)?;
                self.state.scopes.end_scope();
            }
            Statement::Condition(condition) => self.compile_condition(condition)?,
            Statement::Loop(body) => self.compile_loop(body)?,
            Statement::Break(Break { level }) => self.compile_break(*level)?,
            Statement::Return(Return { value }) => self.compile_return(value.as_ref())?,
            Statement::Empty => {}
        }
        Ok(false)
    }

    fn compile_statements(&mut self, statements: &[Statement]) -> Result<(), CompileError> {
        self.hoist_functions(statements)?;
        for statement in statements {
            self.compile_statement(statement, false)?;
        }
        Ok(())
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Declares every function of a statement list up front so that they
    /// can call each other regardless of order.
    pub(super) fn hoist_functions(&mut self, statements: &[Statement]) -> Result<(), CompileError> {
        for statement in statements {
            if let Statement::FunctionDeclaration(function) = statement {
                self.declare_function(function)?;
            }
        }
        Ok(())
    }

    fn declare_function(&mut self, function: &FunctionDeclaration) -> Result<(), CompileError> {
        let params = function
            .params
            .iter()
            .map(|param| self.resolve_type(&param.declared_type))
            .collect::<Result<Vec<_>, _>>()?;
        let signature = Signature {
            params,
            returns: self.resolve_type(&function.return_type)?,
        };
        let entry = self.references.reserve();
        self.state
            .scopes
            .declare_function(&function.name, entry, signature)?;
        Ok(())
    }

    fn compile_declaration(&mut self, declaration: &Declaration) -> Result<(), CompileError> {
        let declared = self.resolve_type(&declaration.declared_type)?;

        let datatype = match &declaration.initializer {
            Some(initializer) => {
                let context = format!("initializer of '{}'", declaration.name);
                self.compile_value(initializer, &context)?;
                self.check_initializer(declared, &context)?
            }
            None => declared,
        };

        let object = self.state.scopes.declare_local(
            &declaration.name,
            declaration.is_constant,
            datatype,
        )?;
        self.reserve_slot();

        if declaration.initializer.is_some() {
            let Location::Slot(slot) = object.location else {
                return Err(CompileError::InvalidAssignmentTarget);
            };
            let load = self.rule(datatype, "load_local")?;
            self.apply_rule(load, Operand::Int(slot))?;
            self.rewrite_store()?;
        }
        self.set_type(types::VOID, false);
        Ok(())
    }

    /// Checks the initializer just compiled against the declared type,
    /// inserting an implicit conversion where one exists. Returns the type
    /// the new binding gets.
    fn check_initializer(
        &mut self,
        declared: TypeName,
        context: &str,
    ) -> Result<TypeName, CompileError> {
        let found = self.state.current_datatype;
        if declared == types::ANY {
            return Ok(if found == types::NULL { types::ANY } else { found });
        }
        if accepts(declared, found) {
            return Ok(declared);
        }
        let conversion = self
            .registry
            .get(found)
            .and_then(|dtype| dtype.implicit_conversion(declared));
        match conversion {
            Some(conversion) => {
                self.emit(conversion.opcode, Operand::None);
                Ok(conversion.result)
            }
            None => Err(CompileError::mismatch(declared, found, context)),
        }
    }

    fn compile_function(&mut self, function: &FunctionDeclaration) -> Result<(), CompileError> {
        let hoisted = match self.state.scopes.lookup_current(&function.name) {
            Some(object) => Some(object.clone()),
            None => {
                self.declare_function(function)?;
                self.state.scopes.lookup_current(&function.name).cloned()
            }
        };
        let (entry, signature) = match hoisted {
            Some(object) => match (object.location, object.signature) {
                (Location::Entry(entry), Some(signature)) => (entry, signature),
                _ => return Err(CompileError::DuplicateDeclaration(function.name.clone())),
            },
            None => return Err(CompileError::UnknownIdentifier(function.name.clone())),
        };

        let buffer = self.buffers.len();
        self.buffers.push(Default::default());

        let saved_buffer = std::mem::replace(&mut self.state.active_buffer, buffer);
        let saved_breaks = std::mem::take(&mut self.state.break_lists);
        let saved_return = std::mem::replace(&mut self.state.return_type, signature.returns);

        self.references.open_reserved(entry, buffer);
        self.state.scopes.begin_function();
        self.emit(OpCode::AllocStack, Operand::Int(0));

        let count = function.params.len();
        for (index, (param, datatype)) in function.params.iter().zip(&signature.params).enumerate() {
            self.state
                .scopes
                .declare_parameter(&param.name, index, count, *datatype)?;
        }

        self.compile_statements(&function.body)?;
        self.emit(OpCode::Return, Operand::None);

        let frame = self.state.scopes.end_function();
        debug!(
            function = %function.name,
            buffer,
            locals = frame.len(),
            "compiled function body"
        );

        self.state.active_buffer = saved_buffer;
        self.state.break_lists = saved_breaks;
        self.state.return_type = saved_return;
        self.set_type(types::VOID, false);
        Ok(())
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn compile_condition(&mut self, condition: &Condition) -> Result<(), CompileError> {
        self.compile_value(&condition.test, "if condition")?;
        let branch = self.emit_branch_if_false();

        self.compile_statement(&condition.body, false)?;

        match &condition.else_body {
            Some(else_body) => {
                let skip = self.emit(OpCode::Jump, Operand::None);
                let else_label = self.open_label();
                self.patch(branch, else_label);
                self.compile_statement(else_body, false)?;
                let join = self.open_label();
                self.patch(skip, join);
            }
            None => {
                let join = self.open_label();
                self.patch(branch, join);
            }
        }
        self.set_type(types::VOID, false);
        Ok(())
    }

    fn compile_loop(&mut self, body: &Loop) -> Result<(), CompileError> {
        let test = body
            .test
            .as_ref()
            .ok_or(CompileError::MissingLoopClause("condition"))?;
        let statement = body
            .body
            .as_ref()
            .ok_or(CompileError::MissingLoopClause("body"))?;

        let scoped = body.initializer.is_some();
        if scoped {
            self.state.scopes.begin_scope();
        }
        if let Some(initializer) = &body.initializer {
            self.compile_statement(initializer, false)?;
        }

        let start = self.open_label();
        self.compile_value(test, "loop condition")?;
        let exit = self.emit_branch_if_false();

        self.state.break_lists.push(Vec::new());
        self.compile_statement(statement, false)?;
        if let Some(increment) = &body.increment {
            self.compile_expression(increment)?;
            if self.state.current_datatype != types::VOID {
                self.emit(OpCode::PopStack, Operand::Int(1));
            }
        }
        self.emit(OpCode::Jump, Operand::Label(start));

        let end = self.open_label();
        self.patch(exit, end);
        for jump in self.state.break_lists.pop().unwrap_or_default() {
            self.patch(jump, end);
        }

        if scoped {
            self.state.scopes.end_scope();
        }
        self.set_type(types::VOID, false);
        Ok(())
    }

    fn compile_break(&mut self, level: u32) -> Result<(), CompileError> {
        let depth = self.state.break_lists.len();
        let target = (level as usize)
            .checked_sub(1)
            .filter(|offset| *offset < depth)
            .map(|offset| depth - 1 - offset)
            .ok_or(CompileError::InvalidBreakLevel { level, depth })?;
        let jump = self.emit(OpCode::Jump, Operand::None);
        self.state.break_lists[target].push(jump);
        Ok(())
    }

    fn compile_return(&mut self, value: Option<&Expression>) -> Result<(), CompileError> {
        if self.state.function_depth() == 0 {
            match value {
                Some(value) => self.compile_value(value, "return value")?,
                None => {
                    self.emit(OpCode::LoadNull, Operand::None);
                }
            }
            self.emit(OpCode::Term, Operand::None);
            self.set_type(types::VOID, false);
            return Ok(());
        }

        match value {
            Some(value) => {
                self.compile_value(value, "return value")?;
                let found = self.state.current_datatype;
                let expected = self.state.return_type;
                widen(expected, found, "return value")?;
                self.emit(return_for(found), Operand::None);
            }
            None => {
                self.emit(OpCode::Return, Operand::None);
            }
        }
        self.set_type(types::VOID, false);
        Ok(())
    }
}
