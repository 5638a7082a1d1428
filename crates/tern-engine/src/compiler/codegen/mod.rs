//! Code generation from AST to bytecode.
//!
//! This module contains the `Compiler`, which walks a parsed program and
//! produces a finalized [`Program`]. Expressions and statements are compiled
//! in `expressions.rs` and `statements.rs`; this file holds the state,
//! emission helpers, peephole rewrites and the finalize pass.
//!
//! Instructions are emitted into buffers: buffer 0 is the main stream and
//! every function body gets its own buffer, in declaration order. Branch
//! operands stay symbolic [`Label`]s until [`Compiler::compile`] lays the
//! buffers out one after another and resolves each label to an absolute
//! index.

mod expressions;
mod references;
mod scope;
mod statements;

#[cfg(test)]
mod tests;

pub use references::{InstructionId, InstructionReferenceTable, Label};
pub use scope::{FrameVariableList, Location, ScopeChain, ScopeObject, Signature};

use crate::ast;
use crate::compiler::bytecode::{Instruction, OpCode, Operand, Program};
use crate::compiler::error::CompileError;
use crate::compiler::types::{self, Action, CodegenRule, TypeName, TypeRegistry, Update};
use crate::runtime::Environment;
use tracing::debug;

/// An instruction whose operand may still be a label.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInstruction {
    pub opcode: OpCode,
    pub operand: Operand,
}

/// Instructions of the main stream or of one function body.
#[derive(Debug, Default)]
struct Buffer {
    instructions: Vec<PendingInstruction>,
}

/// Mutable state threaded through one compilation.
#[derive(Debug)]
pub struct CompilerState {
    /// Static type of the expression compiled last
    pub current_datatype: TypeName,
    /// Whether the last emitted instruction can be rewritten into a store
    pub is_lvalue: bool,
    pub scopes: ScopeChain,
    /// One list of pending `break` jumps per enclosing loop
    pub break_lists: Vec<Vec<InstructionId>>,
    /// Buffer receiving emitted instructions
    pub active_buffer: usize,
    /// Declared return type of the function being compiled
    pub return_type: TypeName,
    /// Name and signature of the function the last identifier named
    callee: Option<(String, Signature)>,
}

impl CompilerState {
    fn new() -> Self {
        Self {
            current_datatype: types::VOID,
            is_lvalue: false,
            scopes: ScopeChain::new(),
            break_lists: Vec::new(),
            active_buffer: 0,
            return_type: types::ANY,
            callee: None,
        }
    }

    /// Current function depth (0 = top level).
    pub fn function_depth(&self) -> usize {
        self.scopes.function_depth()
    }
}

/// Compiles AST to bytecode.
pub struct Compiler<'env> {
    environment: &'env dyn Environment,
    registry: &'static TypeRegistry,
    state: CompilerState,
    references: InstructionReferenceTable,
    buffers: Vec<Buffer>,
}

impl<'env> Compiler<'env> {
    /// Creates a compiler resolving unknown names against `environment`.
    pub fn new(environment: &'env dyn Environment) -> Self {
        Self {
            environment,
            registry: types::registry(),
            state: CompilerState::new(),
            references: InstructionReferenceTable::new(),
            buffers: vec![Buffer::default()],
        }
    }

    /// Compiles a program.
    ///
    /// The value of the final top-level expression statement (or of a
    /// top-level `return`) becomes the program's result; otherwise the
    /// program yields null.
    pub fn compile(&mut self, program: &ast::Program) -> Result<Program, CompileError> {
        self.reset();
        self.emit(OpCode::AllocStack, Operand::Int(0));
        self.hoist_functions(&program.body)?;

        let mut left_value = false;
        let last = program.body.len().saturating_sub(1);
        for (index, statement) in program.body.iter().enumerate() {
            left_value = self.compile_statement(statement, index == last)?;
        }
        if !left_value {
            self.emit(OpCode::LoadNull, Operand::None);
        }
        self.emit(OpCode::Term, Operand::None);

        self.finalize()
    }

    fn reset(&mut self) {
        self.state = CompilerState::new();
        self.references = InstructionReferenceTable::new();
        self.buffers = vec![Buffer::default()];
    }

    // ========================================================================
    // Finalize
    // ========================================================================

    /// Lays the buffers out (main stream first, then function bodies in
    /// declaration order), numbers every instruction, resolves labels to
    /// absolute indices and strips compile-time metadata.
    fn finalize(&mut self) -> Result<Program, CompileError> {
        let buffers = std::mem::take(&mut self.buffers);

        let mut bases = Vec::with_capacity(buffers.len());
        let mut total = 0;
        for buffer in &buffers {
            bases.push(total);
            total += buffer.instructions.len();
        }

        let mut instructions = Vec::with_capacity(total);
        for buffer in buffers {
            for pending in buffer.instructions {
                let operand = match pending.operand {
                    Operand::Label(label) => {
                        let target = self
                            .references
                            .get(label)
                            .ok_or_else(|| CompileError::UnresolvedLabel(label.to_string()))?;
                        Operand::Int((bases[target.buffer] + target.position) as i64)
                    }
                    operand => operand,
                };
                instructions.push(Instruction::with_operand(pending.opcode, operand));
            }
        }

        debug!(
            instructions = instructions.len(),
            functions = bases.len() - 1,
            labels = self.references.len(),
            "finalized program"
        );
        Ok(Program::new(instructions))
    }

    // ========================================================================
    // Emission
    // ========================================================================

    /// Appends an instruction to the active buffer, binding any open labels
    /// to it.
    fn emit(&mut self, opcode: OpCode, operand: Operand) -> InstructionId {
        let buffer = self.state.active_buffer;
        let instructions = &mut self.buffers[buffer].instructions;
        let id = InstructionId {
            buffer,
            position: instructions.len(),
        };
        instructions.push(PendingInstruction { opcode, operand });
        self.references.close(id);
        id
    }

    /// The last instruction of the active buffer.
    fn last_instruction_mut(&mut self) -> Option<&mut PendingInstruction> {
        self.buffers[self.state.active_buffer].instructions.last_mut()
    }

    fn last_instruction_id(&self) -> Option<InstructionId> {
        let buffer = self.state.active_buffer;
        let len = self.buffers[buffer].instructions.len();
        len.checked_sub(1).map(|position| InstructionId { buffer, position })
    }

    /// Opens a label bound to the next instruction of the active buffer.
    fn open_label(&mut self) -> Label {
        self.references.open(self.state.active_buffer)
    }

    /// Points the branch at `id` to `label`.
    fn patch(&mut self, id: InstructionId, label: Label) {
        if let Some(instruction) = self.buffers[id.buffer].instructions.get_mut(id.position) {
            instruction.operand = Operand::Label(label);
        }
    }

    /// Grows the frame prologue of the active buffer by one slot.
    fn reserve_slot(&mut self) {
        let prologue = self.buffers[self.state.active_buffer].instructions.first_mut();
        if let Some(PendingInstruction {
            opcode: OpCode::AllocStack,
            operand: Operand::Int(count),
        }) = prologue
        {
            *count += 1;
        }
    }

    /// Emits a branch taken when the condition just compiled is false.
    ///
    /// An integer comparison that ends the condition is turned into the
    /// inverse compare-and-branch in place. This is skipped while a label
    /// is open, since the label must bind to an instruction after the
    /// condition.
    fn emit_branch_if_false(&mut self) -> InstructionId {
        if !self.references.has_pending(self.state.active_buffer) {
            let id = self.last_instruction_id();
            if let (Some(id), Some(last)) = (id, self.last_instruction_mut()) {
                if let Some(inverse) = inverse_branch(last.opcode) {
                    last.opcode = inverse;
                    last.operand = Operand::None;
                    return id;
                }
            }
        }
        self.emit(OpCode::BranchFalse, Operand::None)
    }

    // ========================================================================
    // Rules and rewrites
    // ========================================================================

    /// Applies a registry rule and adopts its result type.
    fn apply_rule(&mut self, rule: CodegenRule, operand: Operand) -> Result<(), CompileError> {
        match rule.action {
            Action::Emit(opcode) => {
                self.emit(opcode, operand);
            }
            Action::Update(update) => self.rewrite_update(update)?,
            Action::ShortCircuit => {
                return Err(CompileError::UnknownOperator(
                    "short-circuit rule applied directly".to_string(),
                ));
            }
        }
        self.set_type(rule.result, rule.lvalue);
        Ok(())
    }

    fn set_type(&mut self, datatype: TypeName, lvalue: bool) {
        self.state.current_datatype = datatype;
        self.state.is_lvalue = lvalue;
    }

    /// Looks up `key` on `datatype`, failing with `UnknownOperator`.
    fn rule(&self, datatype: TypeName, key: &str) -> Result<CodegenRule, CompileError> {
        self.registry
            .lookup(datatype, key)
            .copied()
            .ok_or_else(|| CompileError::UnknownOperator(key.to_string()))
    }

    /// Rewrites the last emitted load into the matching store.
    fn rewrite_store(&mut self) -> Result<(), CompileError> {
        let last = self
            .last_instruction_mut()
            .ok_or_else(|| CompileError::InvalidLValue("an empty buffer".to_string()))?;
        let store = store_for(last.opcode)
            .ok_or_else(|| CompileError::InvalidLValue(last.opcode.mnemonic().to_string()))?;
        last.opcode = store;
        Ok(())
    }

    /// Rewrites the last emitted load into an in-place increment or decrement.
    fn rewrite_update(&mut self, update: Update) -> Result<(), CompileError> {
        let last = self
            .last_instruction_mut()
            .ok_or_else(|| CompileError::InvalidLValue("an empty buffer".to_string()))?;
        let updated = update_for(last.opcode, update)
            .ok_or_else(|| CompileError::InvalidLValue(last.opcode.mnemonic().to_string()))?;
        last.opcode = updated;
        Ok(())
    }

    /// Canonical name of a type annotation.
    fn resolve_type(&self, name: &str) -> Result<TypeName, CompileError> {
        self.registry
            .canonical(name)
            .ok_or_else(|| CompileError::UnknownType(name.to_string()))
    }
}

/// Store opcode for each addressable load.
fn store_for(load: OpCode) -> Option<OpCode> {
    use OpCode::*;
    Some(match load {
        LoadLocal8 => StoreLocal8,
        LoadLocal32 => StoreLocal32,
        LoadLocal64 => StoreLocal64,
        LoadGlobal8 => StoreGlobal8,
        LoadGlobal32 => StoreGlobal32,
        LoadGlobal64 => StoreGlobal64,
        LoadMember8 => StoreMember8,
        LoadMember32 => StoreMember32,
        LoadMember64 => StoreMember64,
        LoadElement8 => StoreElement8,
        LoadElement32 => StoreElement32,
        LoadElement64 => StoreElement64,
        _ => return None,
    })
}

/// In-place update opcode for each addressable load.
fn update_for(load: OpCode, update: Update) -> Option<OpCode> {
    use OpCode::*;
    let increment = update == Update::Increment;
    Some(match load {
        LoadLocal8 | LoadLocal32 | LoadLocal64 if increment => IncrementLocal,
        LoadLocal8 | LoadLocal32 | LoadLocal64 => DecrementLocal,
        LoadGlobal8 | LoadGlobal32 | LoadGlobal64 if increment => IncrementGlobal,
        LoadGlobal8 | LoadGlobal32 | LoadGlobal64 => DecrementGlobal,
        LoadMember8 | LoadMember32 | LoadMember64 if increment => IncrementMember,
        LoadMember8 | LoadMember32 | LoadMember64 => DecrementMember,
        LoadElement8 | LoadElement32 | LoadElement64 if increment => IncrementElement,
        LoadElement8 | LoadElement32 | LoadElement64 => DecrementElement,
        _ => return None,
    })
}

/// Compare-and-branch taken when an integer comparison is false.
fn inverse_branch(comparison: OpCode) -> Option<OpCode> {
    use OpCode::*;
    Some(match comparison {
        EqInt => BranchNotEqualInt,
        NeInt => BranchEqualInt,
        LtInt => BranchGreaterOrEqualInt,
        LeInt => BranchGreaterInt,
        GtInt => BranchLessOrEqualInt,
        GeInt => BranchLessInt,
        _ => return None,
    })
}

/// Return opcode for a value of `datatype`.
fn return_for(datatype: TypeName) -> OpCode {
    match datatype {
        types::BOOL => OpCode::Return8,
        types::INT => OpCode::Return32,
        _ => OpCode::Return64,
    }
}

/// Opcode re-pushing a returned value of `datatype`.
fn push_return_for(datatype: TypeName) -> OpCode {
    match datatype {
        types::BOOL => OpCode::PushReturn8,
        types::INT => OpCode::PushReturn32,
        _ => OpCode::PushReturn64,
    }
}

/// Result type of combining two static types, `any` absorbing the other.
fn widen(left: TypeName, right: TypeName, context: &str) -> Result<TypeName, CompileError> {
    if left == types::ANY || right == types::ANY {
        Ok(types::ANY)
    } else if left == right {
        Ok(left)
    } else {
        Err(CompileError::mismatch(left, right, context))
    }
}

/// Whether a value of type `found` may be stored where `expected` is declared.
fn accepts(expected: TypeName, found: TypeName) -> bool {
    expected == found || expected == types::ANY || found == types::ANY
}
