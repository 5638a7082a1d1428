//! Expression compilation.
//!
//! Every expression leaves exactly one value on the stack, except
//! assignments and increments, whose static type is `void`.
//!
//! | Expression | Key Operations | Stack Effect |
//! |------------|----------------|--------------|
//! | Literal | `LOAD_CONST8/32/64`, `LOAD_NULL` | Push value |
//! | Identifier | `LOAD_LOCAL*`, `LOAD_GLOBAL*`, `LOAD_EXTERNAL` | Push value |
//! | Binary | `ADD_INT`, `LT_FLOAT`, `EQ_ANY`, ... | Pop 2, push 1 |
//! | `&&` / `||` | `BRANCH_FALSE` / `BRANCH_TRUE` | Right side skipped when decided |
//! | Member | `LOAD_MEMBER*` | Pop 1, push 1 |
//! | Index | `LOAD_ELEMENT*` | Pop N+1, push 1 |
//! | Assignment | load rewritten to `STORE_*` | Pop value |
//! | `++` / `--` | load rewritten to `INCREMENT_*` | None |
//! | Call | `CALL_INTERNAL` / `CALL_EXTERNAL`, `PUSH_RETURN*` | Pop N, push 1 |
//!
//! ```text
//! let x = [1, 2, 3]; x[0]++;
//!
//!   LOAD_LOCAL64 0        ; object
//!   LOAD_CONST32 0        ; index
//!   INCREMENT_ELEMENT 1   ; was LOAD_ELEMENT64 1
//! ```

use super::{Compiler, Location, accepts, push_return_for, widen};
use crate::ast::*;
use crate::compiler::bytecode::{OpCode, Operand};
use crate::compiler::error::CompileError;
use crate::compiler::types::{self, Action, TypeName, binary_key, unary_key};

impl Compiler<'_> {
    /// Compiles an expression, leaving its static type in the state.
    pub(super) fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Literal(literal) => self.compile_literal(literal),
            Expression::Template(template) => self.compile_template(template),
            Expression::Identifier(identifier) => self.compile_identifier(&identifier.name),
            Expression::Unary(unary) => self.compile_unary(unary),
            Expression::Binary(binary) => {
                self.compile_binary(binary.operator, &binary.left, &binary.right)
            }
            Expression::Member(member) => self.compile_member(member),
            Expression::Index(index) => self.compile_index(index),
            Expression::Call(call) => self.compile_call(call),
            Expression::Assignment(assignment) => self.compile_assignment(assignment),
            Expression::Array(elements) => {
                self.compile_collection(elements, OpCode::NewArray, types::ARRAY)
            }
            Expression::Set(elements) => {
                self.compile_collection(elements, OpCode::NewSet, types::SET)
            }
            Expression::Object(properties) => self.compile_object(properties),
            Expression::Ternary(ternary) => self.compile_ternary(ternary),
        }
    }

    /// Compiles an expression that must produce a value.
    pub(super) fn compile_value(
        &mut self,
        expression: &Expression,
        context: &str,
    ) -> Result<(), CompileError> {
        self.compile_expression(expression)?;
        if self.state.current_datatype == types::VOID {
            return Err(CompileError::NoValue(context.to_string()));
        }
        Ok(())
    }

    fn compile_literal(&mut self, literal: &Literal) -> Result<(), CompileError> {
        let (opcode, operand, datatype) = match literal {
            Literal::Int(n) => (OpCode::LoadConst32, Operand::Int(i64::from(*n)), types::INT),
            Literal::Float(n) => (OpCode::LoadConst64, Operand::Float(*n), types::FLOAT),
            Literal::String(s) => (OpCode::LoadConst64, Operand::Str(s.clone()), types::STRING),
            Literal::Boolean(b) => (OpCode::LoadConst8, Operand::Bool(*b), types::BOOL),
            Literal::Null => (OpCode::LoadNull, Operand::None, types::NULL),
        };
        self.emit(opcode, operand);
        self.set_type(datatype, false);
        Ok(())
    }

    fn compile_template(&mut self, template: &Template) -> Result<(), CompileError> {
        let mut parts = 0;
        for (index, chunk) in template.chunks.iter().enumerate() {
            if !chunk.is_empty() {
                self.emit(OpCode::LoadConst64, Operand::Str(chunk.clone()));
                parts += 1;
            }
            if let Some(expression) = template.expressions.get(index) {
                self.compile_value(expression, "template interpolation")?;
                parts += 1;
            }
        }
        if parts == 0 {
            self.emit(OpCode::LoadConst64, Operand::Str(String::new()));
        } else {
            self.emit(OpCode::BuildString, Operand::Int(parts));
        }
        self.set_type(types::STRING, false);
        Ok(())
    }

    fn compile_identifier(&mut self, name: &str) -> Result<(), CompileError> {
        let object = self.state.scopes.resolve(name, self.environment)?;
        self.state.callee = None;

        match object.location {
            Location::External => {
                self.emit(OpCode::LoadExternal, Operand::Str(name.to_string()));
                self.set_type(object.datatype, false);
            }
            Location::Entry(entry) => {
                self.emit(OpCode::LoadInstructionReference, Operand::Label(entry));
                self.set_type(types::FUNCTION, true);
                self.state.callee = object.signature.map(|signature| (object.name, signature));
            }
            Location::Slot(slot) => {
                let depth = self.state.function_depth();
                let key = if object.frame == depth {
                    "load_local"
                } else if object.frame == 0 {
                    "load_global"
                } else {
                    return Err(CompileError::UnsupportedCapture(name.to_string()));
                };
                let rule = self.rule(object.datatype, key)?;
                self.apply_rule(rule, Operand::Int(slot))?;
            }
        }
        Ok(())
    }

    /// Fails if `target` names a constant, or stores into a member or
    /// element of a host binding.
    fn check_assignable(&self, target: &Expression) -> Result<(), CompileError> {
        if let Expression::Identifier(identifier) = target {
            let object = self
                .state
                .scopes
                .resolve(&identifier.name, self.environment)?;
            if object.constant {
                return Err(CompileError::AssignToConstant(identifier.name.clone()));
            }
            return Ok(());
        }

        let mut base = target;
        while let Expression::Member(MemberExpression { object, .. })
        | Expression::Index(IndexExpression { object, .. }) = base
        {
            base = &**object;
        }
        if let Expression::Identifier(identifier) = base {
            let object = self
                .state
                .scopes
                .resolve(&identifier.name, self.environment)?;
            if object.location == Location::External {
                return Err(CompileError::AssignToConstant(identifier.name.clone()));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_unary(&mut self, unary: &UnaryExpression) -> Result<(), CompileError> {
        let operator = unary.operator.as_str();
        match unary.operator {
            UnaryOperator::Increment | UnaryOperator::Decrement => {
                self.check_assignable(&unary.operand)?;
                self.compile_expression(&unary.operand)?;
                if !self.state.is_lvalue {
                    return Err(CompileError::InvalidAssignmentTarget);
                }
                let datatype = self.state.current_datatype;
                let rule = self.rule(datatype, &unary_key(operator, datatype, unary.postfix))?;
                if !matches!(rule.action, Action::Update(_)) {
                    return Err(CompileError::UnknownOperator(unary_key(
                        operator,
                        datatype,
                        unary.postfix,
                    )));
                }
                self.apply_rule(rule, Operand::None)
            }
            UnaryOperator::Minus | UnaryOperator::Not => {
                self.compile_value(&unary.operand, "unary operand")?;
                let datatype = self.state.current_datatype;
                let rule = self.rule(datatype, &unary_key(operator, datatype, false))?;
                self.apply_rule(rule, Operand::None)
            }
        }
    }

    fn compile_binary(
        &mut self,
        operator: BinaryOperator,
        left: &Expression,
        right: &Expression,
    ) -> Result<(), CompileError> {
        if operator.is_logical() {
            return self.compile_logical(operator, left, right);
        }
        let context = format!("binary '{}'", operator.as_str());

        self.compile_value(left, &context)?;
        let left_type = self.state.current_datatype;
        self.compile_value(right, &context)?;
        let right_type = self.state.current_datatype;

        self.apply_binary(operator, left_type, right_type, &context)
    }

    fn apply_binary(
        &mut self,
        operator: BinaryOperator,
        left: TypeName,
        right: TypeName,
        context: &str,
    ) -> Result<(), CompileError> {
        let operand_type = widen(left, right, context)?;
        let key = binary_key(operand_type, operator.as_str(), operand_type);
        let rule = self.rule(operand_type, &key)?;
        self.apply_rule(rule, Operand::None)
    }

    /// `a && b` evaluates `b` only when `a` is truthy; `a || b` only when
    /// `a` is falsy. The deciding case pushes the constant result.
    fn compile_logical(
        &mut self,
        operator: BinaryOperator,
        left: &Expression,
        right: &Expression,
    ) -> Result<(), CompileError> {
        let context = format!("binary '{}'", operator.as_str());
        let is_or = operator == BinaryOperator::Or;

        self.compile_value(left, &context)?;
        let left_type = self.state.current_datatype;
        let branch = self.emit(
            if is_or {
                OpCode::BranchTrue
            } else {
                OpCode::BranchFalse
            },
            Operand::None,
        );

        self.compile_value(right, &context)?;
        let right_type = self.state.current_datatype;

        let operand_type = widen(left_type, right_type, &context)?;
        let key = binary_key(operand_type, operator.as_str(), operand_type);
        let rule = self.rule(operand_type, &key)?;
        if rule.action != Action::ShortCircuit {
            return Err(CompileError::UnknownOperator(key));
        }

        let skip = self.emit(OpCode::Jump, Operand::None);
        let decided = self.open_label();
        self.patch(branch, decided);
        self.emit(OpCode::LoadConst8, Operand::Bool(is_or));
        let join = self.open_label();
        self.patch(skip, join);

        self.set_type(rule.result, false);
        Ok(())
    }

    fn compile_ternary(&mut self, ternary: &TernaryExpression) -> Result<(), CompileError> {
        self.compile_value(&ternary.test, "ternary condition")?;
        let branch = self.emit_branch_if_false();

        self.compile_value(&ternary.consequent, "ternary branch")?;
        let consequent = self.state.current_datatype;
        let skip = self.emit(OpCode::Jump, Operand::None);

        let else_label = self.open_label();
        self.patch(branch, else_label);
        self.compile_value(&ternary.alternate, "ternary branch")?;
        let alternate = self.state.current_datatype;

        let join = self.open_label();
        self.patch(skip, join);

        let datatype = widen(consequent, alternate, "ternary branches")?;
        self.set_type(datatype, false);
        Ok(())
    }

    // ========================================================================
    // Access
    // ========================================================================

    fn compile_member(&mut self, member: &MemberExpression) -> Result<(), CompileError> {
        self.compile_value(&member.object, "member access")?;
        let datatype = self.state.current_datatype;
        let rule = self
            .registry
            .get(datatype)
            .and_then(|dtype| {
                dtype
                    .member_op(&member.member)
                    .or_else(|| dtype.lookup("load_member"))
            })
            .copied()
            .ok_or_else(|| {
                CompileError::UnknownOperator(format!("{}.{}", datatype, member.member))
            })?;
        self.apply_rule(rule, Operand::Str(member.member.clone()))
    }

    fn compile_index(&mut self, index: &IndexExpression) -> Result<(), CompileError> {
        self.compile_value(&index.object, "indexed access")?;
        let datatype = self.state.current_datatype;
        for expression in &index.indices {
            self.compile_value(expression, "index")?;
        }
        let rule = self
            .registry
            .lookup(datatype, "load_element")
            .copied()
            .ok_or_else(|| CompileError::UnknownOperator(format!("{}[]", datatype)))?;
        self.apply_rule(rule, Operand::Int(index.indices.len() as i64))
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// The right-hand side is compiled first, then the target's load, which
    /// is rewritten into the matching store. `a op= b` compiles `a op b` as
    /// the right-hand side.
    ///
    /// The target of a compound assignment is therefore compiled twice: side
    /// effects in it run twice, so `a[next()] += 1` calls `next()` two times.
    fn compile_assignment(&mut self, assignment: &AssignmentExpression) -> Result<(), CompileError> {
        match assignment.operator.binary() {
            Some(operator) => self.compile_binary(operator, &assignment.target, &assignment.value)?,
            None => self.compile_value(&assignment.value, "assignment")?,
        }
        let value_type = self.state.current_datatype;

        self.check_assignable(&assignment.target)?;
        self.compile_expression(&assignment.target)?;
        if !self.state.is_lvalue {
            return Err(CompileError::InvalidAssignmentTarget);
        }
        let target_type = self.state.current_datatype;
        if !accepts(target_type, value_type) {
            return Err(CompileError::mismatch(target_type, value_type, "assignment"));
        }

        self.rewrite_store()?;
        self.set_type(types::VOID, false);
        Ok(())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn compile_call(&mut self, call: &CallExpression) -> Result<(), CompileError> {
        let count = call.arguments.len();
        let mut argument_types = Vec::with_capacity(count);
        for argument in &call.arguments {
            self.compile_value(argument, "argument")?;
            argument_types.push(self.state.current_datatype);
        }

        self.compile_expression(&call.callee)?;
        let callee_type = self.state.current_datatype;
        let signature = self.state.callee.take();
        let loaded = self.last_instruction_mut().map(|last| last.opcode);

        match loaded {
            Some(OpCode::LoadInstructionReference) => {
                let (name, signature) = signature.ok_or_else(|| {
                    CompileError::NotCallable("function reference".to_string())
                })?;
                if signature.params.len() != count {
                    return Err(CompileError::ArityMismatch {
                        name,
                        expected: signature.params.len(),
                        found: count,
                    });
                }
                for (index, (&expected, &found)) in
                    signature.params.iter().zip(&argument_types).enumerate()
                {
                    if !accepts(expected, found) {
                        return Err(CompileError::mismatch(
                            expected,
                            found,
                            format!("argument {} of '{}'", index + 1, name),
                        ));
                    }
                }

                if let Some(last) = self.last_instruction_mut() {
                    last.opcode = OpCode::CallInternal;
                }
                if count > 0 {
                    self.emit(OpCode::PopStack, Operand::Int(count as i64));
                }
                self.emit(push_return_for(signature.returns), Operand::None);
                self.set_type(signature.returns, false);
            }
            Some(OpCode::LoadExternal) => {
                self.emit_external_call(count);
            }
            Some(
                OpCode::LoadLocal64
                | OpCode::LoadGlobal64
                | OpCode::LoadMember64
                | OpCode::LoadElement64,
            ) if callee_type == types::ANY || callee_type == types::FUNCTION => {
                self.emit_external_call(count);
            }
            _ => return Err(CompileError::NotCallable(format!("a value of type {}", callee_type))),
        }
        Ok(())
    }

    fn emit_external_call(&mut self, count: usize) {
        self.emit(OpCode::CallExternal, Operand::Int(count as i64));
        self.emit(OpCode::PushReturn64, Operand::None);
        self.set_type(types::ANY, false);
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn compile_collection(
        &mut self,
        elements: &[Expression],
        opcode: OpCode,
        datatype: TypeName,
    ) -> Result<(), CompileError> {
        for element in elements {
            self.compile_value(element, "collection element")?;
        }
        self.emit(opcode, Operand::Int(elements.len() as i64));
        self.set_type(datatype, false);
        Ok(())
    }

    fn compile_object(&mut self, properties: &[Property]) -> Result<(), CompileError> {
        for property in properties {
            self.emit(OpCode::LoadConst64, Operand::Str(property.key.clone()));
            self.compile_value(&property.value, "object property")?;
        }
        self.emit(OpCode::NewObject, Operand::Int(properties.len() as i64));
        self.set_type(types::OBJECT, false);
        Ok(())
    }
}
