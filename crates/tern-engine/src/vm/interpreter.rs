//! The bytecode interpreter.
//!
//! A fetch/decode/dispatch loop over a finalized [`Program`]. The operand
//! stack doubles as the call stack: a call pushes the saved frame pointer
//! and the return address as `Value::Int`s, and locals are addressed
//! relative to `fp`.

use std::cmp::Ordering;

use num_traits::ToPrimitive;
use tracing::{trace, warn};

use super::error::RuntimeError;
use crate::compiler::{ENGINE_VERSION, Instruction, OpCode, Operand, Program};
use crate::config::EngineConfig;
use crate::runtime::{Environment, Value};

type Result<T> = std::result::Result<T, RuntimeError>;

/// What the dispatch loop does after an instruction.
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

#[derive(Debug, Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl Arith {
    fn symbol(self) -> &'static str {
        match self {
            Arith::Add => "+",
            Arith::Sub => "-",
            Arith::Mul => "*",
            Arith::Div => "/",
            Arith::Mod => "%",
            Arith::Pow => "**",
        }
    }

    /// Integer semantics: wrapping, with division by zero an error.
    fn int(self, a: i32, b: i32) -> Result<i32> {
        Ok(match self {
            Arith::Add => a.wrapping_add(b),
            Arith::Sub => a.wrapping_sub(b),
            Arith::Mul => a.wrapping_mul(b),
            Arith::Div if b == 0 => return Err(RuntimeError::DivisionByZero),
            Arith::Div => a.wrapping_div(b),
            Arith::Mod if b == 0 => return Err(RuntimeError::DivisionByZero),
            Arith::Mod => a.wrapping_rem(b),
            Arith::Pow => int_pow(a, b),
        })
    }

    fn float(self, a: f64, b: f64) -> f64 {
        match self {
            Arith::Add => a + b,
            Arith::Sub => a - b,
            Arith::Mul => a * b,
            Arith::Div => a / b,
            Arith::Mod => a % b,
            Arith::Pow => a.powf(b),
        }
    }
}

/// Truncated integer power. A negative exponent yields 0 unless the base
/// is 1 or -1.
fn int_pow(base: i32, exponent: i32) -> i32 {
    match u32::try_from(exponent) {
        Ok(exponent) => base.wrapping_pow(exponent),
        Err(_) => match base {
            1 => 1,
            -1 if exponent % 2 == 0 => 1,
            -1 => -1,
            _ => 0,
        },
    }
}

#[derive(Debug, Clone, Copy)]
enum Compare {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Compare {
    /// Unordered operands (NaN) satisfy only `!=`.
    fn test(self, ordering: Option<Ordering>) -> bool {
        match self {
            Compare::Eq => ordering == Some(Ordering::Equal),
            Compare::Ne => ordering != Some(Ordering::Equal),
            Compare::Lt => ordering == Some(Ordering::Less),
            Compare::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Compare::Gt => ordering == Some(Ordering::Greater),
            Compare::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// The virtual machine.
#[derive(Debug)]
pub struct VM {
    /// Operand stack, holding locals and saved frames as well
    stack: Vec<Value>,
    /// Instruction pointer
    ip: usize,
    /// Frame pointer of the running function
    fp: usize,
    /// Value captured by the last return or host call
    return_value: Value,
    config: EngineConfig,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    /// Creates a new VM with the default limits.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a new VM with the given limits.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            stack: Vec::with_capacity(256),
            ip: 0,
            fp: 0,
            return_value: Value::Null,
            config,
        }
    }

    /// The limits this VM enforces.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The operand stack as the last run left it.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Executes a program and returns its result: the value on top of the
    /// stack at `TERM`, or null if the stack is empty.
    pub fn execute(&mut self, program: &Program, environment: &dyn Environment) -> Result<Value> {
        check_version(&program.engine_version)?;

        self.stack.clear();
        self.ip = 0;
        self.fp = 0;
        self.return_value = Value::Null;

        let mut executed: u64 = 0;
        loop {
            let instruction = program
                .instructions
                .get(self.ip)
                .ok_or(RuntimeError::InstructionOutOfBounds(self.ip))?;
            let opcode = instruction
                .decode()
                .ok_or(RuntimeError::InvalidOpcode(instruction.opcode))?;

            if let Some(limit) = self.config.fuel {
                if executed >= limit {
                    return Err(RuntimeError::OutOfFuel(limit));
                }
            }
            executed += 1;

            trace!(
                ip = self.ip,
                opcode = opcode.mnemonic(),
                depth = self.stack.len(),
                "dispatch"
            );

            match self.step(opcode, instruction, environment)? {
                Flow::Next => self.ip += 1,
                Flow::Jump(target) => self.ip = target,
                Flow::Halt => break,
            }

            if self.stack.len() > self.config.max_stack {
                return Err(RuntimeError::StackOverflow(self.config.max_stack));
            }
        }

        Ok(self.stack.pop().unwrap_or_default())
    }

    fn step(
        &mut self,
        opcode: OpCode,
        instruction: &Instruction,
        environment: &dyn Environment,
    ) -> Result<Flow> {
        use OpCode::*;

        match opcode {
            Term => return Ok(Flow::Halt),

            AllocStack => {
                let count = self.count_operand(instruction, opcode)?;
                if self.stack.len().saturating_add(count) > self.config.max_stack {
                    return Err(RuntimeError::StackOverflow(self.config.max_stack));
                }
                self.stack.resize(self.stack.len() + count, Value::Null);
            }

            PopStack => {
                let count = self.count_operand(instruction, opcode)?;
                self.pop_n(count)?;
            }

            // Constants
            LoadNull => self.stack.push(Value::Null),
            LoadConst8 => match &instruction.operand {
                Operand::Bool(b) => self.stack.push(Value::Boolean(*b)),
                _ => return Err(self.invalid_operand(opcode)),
            },
            LoadConst32 => {
                let n = self.int_operand(instruction, opcode)?;
                let n = i32::try_from(n).map_err(|_| self.invalid_operand(opcode))?;
                self.stack.push(Value::Int(n));
            }
            LoadConst64 => match &instruction.operand {
                Operand::Float(n) => self.stack.push(Value::Float(*n)),
                Operand::Str(s) => self.stack.push(Value::String(s.clone())),
                _ => return Err(self.invalid_operand(opcode)),
            },

            // Integer arithmetic
            AddInt => self.int_arith(Arith::Add)?,
            SubInt => self.int_arith(Arith::Sub)?,
            MulInt => self.int_arith(Arith::Mul)?,
            DivInt => self.int_arith(Arith::Div)?,
            ModInt => self.int_arith(Arith::Mod)?,
            PowInt => self.int_arith(Arith::Pow)?,
            NegInt => {
                let a = self.pop_int("unary '-'")?;
                self.stack.push(Value::Int(a.wrapping_neg()));
            }

            // Float arithmetic
            AddFloat => self.float_arith(Arith::Add)?,
            SubFloat => self.float_arith(Arith::Sub)?,
            MulFloat => self.float_arith(Arith::Mul)?,
            DivFloat => self.float_arith(Arith::Div)?,
            ModFloat => self.float_arith(Arith::Mod)?,
            PowFloat => self.float_arith(Arith::Pow)?,
            NegFloat => {
                let a = self.pop_float("unary '-'")?;
                self.stack.push(Value::Float(-a));
            }

            // Dynamic arithmetic
            AddAny => self.any_arith(Arith::Add)?,
            SubAny => self.any_arith(Arith::Sub)?,
            MulAny => self.any_arith(Arith::Mul)?,
            DivAny => self.any_arith(Arith::Div)?,
            ModAny => self.any_arith(Arith::Mod)?,
            PowAny => self.any_arith(Arith::Pow)?,
            NegAny => {
                let value = match self.pop()? {
                    Value::Int(n) => Value::Int(n.wrapping_neg()),
                    Value::Float(n) => Value::Float(-n),
                    other => return Err(RuntimeError::type_error("unary '-'", other.type_name())),
                };
                self.stack.push(value);
            }
            NotAny | NotBool => {
                let value = self.pop()?;
                self.stack.push(Value::Boolean(!value.is_truthy()));
            }

            ConcatString => {
                let b = self.pop()?;
                let a = self.pop()?;
                match (a, b) {
                    (Value::String(mut a), Value::String(b)) => {
                        a.push_str(&b);
                        self.stack.push(Value::String(a));
                    }
                    (a, b) => return Err(mismatched("'+'", &a, &b)),
                }
            }

            // Comparison
            EqInt => self.int_compare(Compare::Eq)?,
            NeInt => self.int_compare(Compare::Ne)?,
            LtInt => self.int_compare(Compare::Lt)?,
            LeInt => self.int_compare(Compare::Le)?,
            GtInt => self.int_compare(Compare::Gt)?,
            GeInt => self.int_compare(Compare::Ge)?,
            EqFloat => self.float_compare(Compare::Eq)?,
            NeFloat => self.float_compare(Compare::Ne)?,
            LtFloat => self.float_compare(Compare::Lt)?,
            LeFloat => self.float_compare(Compare::Le)?,
            GtFloat => self.float_compare(Compare::Gt)?,
            GeFloat => self.float_compare(Compare::Ge)?,
            LtAny => self.any_compare(Compare::Lt)?,
            LeAny => self.any_compare(Compare::Le)?,
            GtAny => self.any_compare(Compare::Gt)?,
            GeAny => self.any_compare(Compare::Ge)?,
            EqAny | EqString | EqBool | EqObject => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Boolean(a == b));
            }
            NeAny | NeString | NeBool | NeObject => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(Value::Boolean(a != b));
            }

            // Conversions
            IntToFloat => {
                let a = self.pop_int("int to float")?;
                self.stack.push(Value::Float(f64::from(a)));
            }
            FloatToInt => {
                let a = self.pop_float("float to int")?;
                let n = a
                    .floor()
                    .to_i32()
                    .ok_or_else(|| RuntimeError::InvalidConversion(a.to_string()))?;
                self.stack.push(Value::Int(n));
            }
            IntToString | FloatToString => {
                let value = self.pop()?;
                self.stack.push(Value::String(value.to_string()));
            }

            // Control flow
            Jump => return Ok(Flow::Jump(self.target_operand(instruction, opcode)?)),
            BranchFalse | BranchTrue => {
                let target = self.target_operand(instruction, opcode)?;
                let condition = self.pop()?.is_truthy();
                if condition == (opcode == BranchTrue) {
                    return Ok(Flow::Jump(target));
                }
            }
            BranchEqualInt => return self.int_branch(instruction, opcode, Compare::Eq),
            BranchNotEqualInt => return self.int_branch(instruction, opcode, Compare::Ne),
            BranchGreaterInt => return self.int_branch(instruction, opcode, Compare::Gt),
            BranchGreaterOrEqualInt => return self.int_branch(instruction, opcode, Compare::Ge),
            BranchLessInt => return self.int_branch(instruction, opcode, Compare::Lt),
            BranchLessOrEqualInt => return self.int_branch(instruction, opcode, Compare::Le),

            // Locals and globals
            LoadLocal8 | LoadLocal32 | LoadLocal64 => {
                let index = self.slot(self.fp, instruction, opcode)?;
                let value = self.stack[index].clone();
                self.stack.push(value);
            }
            LoadGlobal8 | LoadGlobal32 | LoadGlobal64 => {
                let index = self.slot(0, instruction, opcode)?;
                let value = self.stack[index].clone();
                self.stack.push(value);
            }
            StoreLocal8 | StoreLocal32 | StoreLocal64 => {
                let value = self.pop()?;
                let index = self.slot(self.fp, instruction, opcode)?;
                self.stack[index] = value;
            }
            StoreGlobal8 | StoreGlobal32 | StoreGlobal64 => {
                let value = self.pop()?;
                let index = self.slot(0, instruction, opcode)?;
                self.stack[index] = value;
            }
            IncrementLocal | DecrementLocal => {
                let index = self.slot(self.fp, instruction, opcode)?;
                bump(&mut self.stack[index], delta(opcode))?;
            }
            IncrementGlobal | DecrementGlobal => {
                let index = self.slot(0, instruction, opcode)?;
                bump(&mut self.stack[index], delta(opcode))?;
            }

            // Members
            LoadMember8 | LoadMember32 | LoadMember64 => {
                let name = self.str_operand(instruction, opcode)?;
                let object = self.pop()?;
                self.stack.push(load_member(&object, name)?);
            }
            StoreMember8 | StoreMember32 | StoreMember64 => {
                let name = self.str_operand(instruction, opcode)?;
                let object = self.pop()?;
                let value = self.pop()?;
                store_member(&object, name, value)?;
            }
            IncrementMember | DecrementMember => {
                let name = self.str_operand(instruction, opcode)?;
                let object = self.pop()?;
                let mut value = load_member(&object, name)?;
                bump(&mut value, delta(opcode))?;
                store_member(&object, name, value)?;
            }

            // Elements
            LoadElement8 | LoadElement32 | LoadElement64 => {
                let count = self.count_operand(instruction, opcode)?;
                let indices = self.pop_n(count)?;
                let container = self.pop()?;
                let value = indices
                    .iter()
                    .try_fold(container, |current, index| load_element(&current, index))?;
                self.stack.push(value);
            }
            StoreElement8 | StoreElement32 | StoreElement64 => {
                let (container, index) = self.element_target(instruction, opcode)?;
                let value = self.pop()?;
                store_element(&container, &index, value, self.config.max_list_len)?;
            }
            IncrementElement | DecrementElement => {
                let (container, index) = self.element_target(instruction, opcode)?;
                let mut value = load_element(&container, &index)?;
                bump(&mut value, delta(opcode))?;
                store_element(&container, &index, value, self.config.max_list_len)?;
            }

            // Collections
            NewArray => {
                let count = self.count_operand(instruction, opcode)?;
                let items = self.pop_n(count)?;
                self.stack.push(Value::list(items));
            }
            NewSet => {
                let count = self.count_operand(instruction, opcode)?;
                let members = self.pop_n(count)?;
                self.stack.push(Value::set(members));
            }
            NewObject => {
                let count = self.count_operand(instruction, opcode)?;
                let flat = self.pop_n(count.saturating_mul(2))?;
                let mut fields = Vec::with_capacity(count);
                let mut flat = flat.into_iter();
                while let (Some(key), Some(value)) = (flat.next(), flat.next()) {
                    match key {
                        Value::String(key) => fields.push((key, value)),
                        other => {
                            return Err(RuntimeError::type_error("object key", other.type_name()));
                        }
                    }
                }
                self.stack.push(Value::object(fields));
            }
            BuildString => {
                let count = self.count_operand(instruction, opcode)?;
                let parts = self.pop_n(count)?;
                let text: String = parts.iter().map(Value::to_string).collect();
                self.stack.push(Value::String(text));
            }

            // Calls
            LoadInstructionReference => {
                let target = self.target_operand(instruction, opcode)?;
                self.stack.push(Value::Function(target));
            }
            CallInternal => {
                let target = self.target_operand(instruction, opcode)?;
                let saved_fp = self.encode_address(self.fp)?;
                let return_address = self.encode_address(self.ip + 1)?;
                self.stack.push(saved_fp);
                self.stack.push(return_address);
                self.fp = self.stack.len();
                return Ok(Flow::Jump(target));
            }
            Return | Return8 | Return32 | Return64 => {
                self.return_value = if opcode == Return {
                    Value::Null
                } else {
                    self.pop()?
                };
                if self.fp == 0 {
                    self.stack.push(self.return_value.clone());
                    return Ok(Flow::Halt);
                }
                self.stack.truncate(self.fp);
                let return_address = self.pop_address()?;
                self.fp = self.pop_address()?;
                return Ok(Flow::Jump(return_address));
            }
            PushReturn8 | PushReturn32 | PushReturn64 => {
                self.stack.push(self.return_value.clone());
            }
            CallExternal => {
                let count = self.count_operand(instruction, opcode)?;
                let callee = self.pop()?;
                let args = self.pop_n(count)?;
                self.return_value = match callee {
                    Value::Native(native) => native.call(&args).map_err(|message| {
                        RuntimeError::ExternalCallFailure {
                            name: native.name().to_string(),
                            message,
                        }
                    })?,
                    other => return Err(RuntimeError::NotCallable(other.type_name().to_string())),
                };
            }
            LoadExternal => {
                let name = self.str_operand(instruction, opcode)?;
                let symbol =
                    environment
                        .resolve(name)
                        .ok_or_else(|| RuntimeError::ExternalCallFailure {
                            name: name.to_string(),
                            message: "binding is not defined".to_string(),
                        })?;
                // Host collections are shared across runs; scripts get their own copy
                self.stack.push(symbol.value.deep_copy());
            }
        }

        Ok(Flow::Next)
    }

    // ========================================================================
    // Stack helpers
    // ========================================================================

    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or(RuntimeError::StackUnderflow { ip: self.ip })
    }

    /// Pops `count` values, returned in push order.
    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>> {
        let start = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow { ip: self.ip })?;
        Ok(self.stack.split_off(start))
    }

    fn pop_int(&mut self, operation: &str) -> Result<i32> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            other => Err(RuntimeError::type_error(operation, other.type_name())),
        }
    }

    fn pop_float(&mut self, operation: &str) -> Result<f64> {
        let value = self.pop()?;
        value
            .as_f64()
            .ok_or_else(|| RuntimeError::type_error(operation, value.type_name()))
    }

    fn pop_address(&mut self) -> Result<usize> {
        match self.pop()? {
            Value::Int(n) => usize::try_from(n).map_err(|_| self.corrupt_frame()),
            _ => Err(self.corrupt_frame()),
        }
    }

    fn encode_address(&self, address: usize) -> Result<Value> {
        i32::try_from(address)
            .map(Value::Int)
            .map_err(|_| RuntimeError::StackOverflow(self.config.max_stack))
    }

    fn corrupt_frame(&self) -> RuntimeError {
        RuntimeError::InvalidSlot {
            ip: self.ip,
            slot: -1,
        }
    }

    /// Absolute stack index of a slot operand relative to `base`.
    fn slot(&self, base: usize, instruction: &Instruction, opcode: OpCode) -> Result<usize> {
        let offset = self.int_operand(instruction, opcode)?;
        let invalid = RuntimeError::InvalidSlot {
            ip: self.ip,
            slot: offset,
        };
        let base = i64::try_from(base).map_err(|_| invalid.clone())?;
        usize::try_from(base + offset)
            .ok()
            .filter(|index| *index < self.stack.len())
            .ok_or(invalid)
    }

    /// Pops the indices and the container of an element store, resolving all
    /// but the last index. Returns the innermost container and last index.
    fn element_target(&mut self, instruction: &Instruction, opcode: OpCode) -> Result<(Value, Value)> {
        let count = self.count_operand(instruction, opcode)?;
        let mut indices = self.pop_n(count)?;
        let container = self.pop()?;
        let last = indices.pop().ok_or_else(|| self.invalid_operand(opcode))?;
        let container = indices
            .iter()
            .try_fold(container, |current, index| load_element(&current, index))?;
        Ok((container, last))
    }

    // ========================================================================
    // Operand helpers
    // ========================================================================

    fn invalid_operand(&self, opcode: OpCode) -> RuntimeError {
        RuntimeError::InvalidOperand {
            ip: self.ip,
            opcode: opcode.mnemonic(),
        }
    }

    fn int_operand(&self, instruction: &Instruction, opcode: OpCode) -> Result<i64> {
        instruction
            .operand
            .as_int()
            .ok_or_else(|| self.invalid_operand(opcode))
    }

    fn count_operand(&self, instruction: &Instruction, opcode: OpCode) -> Result<usize> {
        let n = self.int_operand(instruction, opcode)?;
        usize::try_from(n).map_err(|_| self.invalid_operand(opcode))
    }

    fn target_operand(&self, instruction: &Instruction, opcode: OpCode) -> Result<usize> {
        self.count_operand(instruction, opcode)
    }

    fn str_operand<'p>(&self, instruction: &'p Instruction, opcode: OpCode) -> Result<&'p str> {
        instruction
            .operand
            .as_str()
            .ok_or_else(|| self.invalid_operand(opcode))
    }

    // ========================================================================
    // Arithmetic and comparison
    // ========================================================================

    fn int_arith(&mut self, op: Arith) -> Result<()> {
        let operation = format!("'{}'", op.symbol());
        let b = self.pop_int(&operation)?;
        let a = self.pop_int(&operation)?;
        self.stack.push(Value::Int(op.int(a, b)?));
        Ok(())
    }

    fn float_arith(&mut self, op: Arith) -> Result<()> {
        let operation = format!("'{}'", op.symbol());
        let b = self.pop_float(&operation)?;
        let a = self.pop_float(&operation)?;
        self.stack.push(Value::Float(op.float(a, b)));
        Ok(())
    }

    fn any_arith(&mut self, op: Arith) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let value = match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(op.int(*x, *y)?),
            (Value::String(_), _) | (_, Value::String(_)) if matches!(op, Arith::Add) => {
                Value::String(format!("{}{}", a, b))
            }
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Value::Float(op.float(x, y)),
                _ => return Err(mismatched(&format!("'{}'", op.symbol()), &a, &b)),
            },
        };
        self.stack.push(value);
        Ok(())
    }

    fn int_compare(&mut self, op: Compare) -> Result<()> {
        let b = self.pop_int("comparison")?;
        let a = self.pop_int("comparison")?;
        self.stack.push(Value::Boolean(op.test(Some(a.cmp(&b)))));
        Ok(())
    }

    fn float_compare(&mut self, op: Compare) -> Result<()> {
        let b = self.pop_float("comparison")?;
        let a = self.pop_float("comparison")?;
        self.stack.push(Value::Boolean(op.test(a.partial_cmp(&b))));
        Ok(())
    }

    fn any_compare(&mut self, op: Compare) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let ordering = match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => return Err(mismatched("comparison", &a, &b)),
            },
        };
        self.stack.push(Value::Boolean(op.test(ordering)));
        Ok(())
    }

    fn int_branch(&mut self, instruction: &Instruction, opcode: OpCode, op: Compare) -> Result<Flow> {
        let target = self.target_operand(instruction, opcode)?;
        let b = self.pop_int("comparison")?;
        let a = self.pop_int("comparison")?;
        if op.test(Some(a.cmp(&b))) {
            Ok(Flow::Jump(target))
        } else {
            Ok(Flow::Next)
        }
    }
}

fn mismatched(operation: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::type_error(operation, format!("{} and {}", a.type_name(), b.type_name()))
}

fn delta(opcode: OpCode) -> i32 {
    match opcode {
        OpCode::DecrementLocal
        | OpCode::DecrementGlobal
        | OpCode::DecrementMember
        | OpCode::DecrementElement => -1,
        _ => 1,
    }
}

/// Adds `delta` to a numeric value in place.
fn bump(value: &mut Value, delta: i32) -> Result<()> {
    match value {
        Value::Int(n) => *n = n.wrapping_add(delta),
        Value::Float(n) => *n += f64::from(delta),
        other => {
            let operation = if delta > 0 { "'++'" } else { "'--'" };
            return Err(RuntimeError::type_error(operation, other.type_name()));
        }
    }
    Ok(())
}

fn length(n: usize) -> Value {
    Value::Int(i32::try_from(n).unwrap_or(i32::MAX))
}

// ============================================================================
// Members and elements
// ============================================================================

fn load_member(object: &Value, name: &str) -> Result<Value> {
    match (object, name) {
        (Value::Object(fields), _) => Ok(fields.read().get(name).cloned().unwrap_or_default()),
        (Value::List(items), "length") => Ok(length(items.read().len())),
        (Value::String(s), "length") => Ok(length(s.chars().count())),
        (Value::Set(members), "size") => Ok(length(members.read().len())),
        (other, _) => Err(RuntimeError::type_error(
            format!("member '{}'", name),
            other.type_name(),
        )),
    }
}

fn store_member(object: &Value, name: &str, value: Value) -> Result<()> {
    match object {
        Value::Object(fields) => {
            fields.write().insert(name.to_string(), value);
            Ok(())
        }
        other => Err(RuntimeError::type_error(
            format!("member store '{}'", name),
            other.type_name(),
        )),
    }
}

/// List position of an index; `None` for negative indices.
fn position(index: &Value) -> Result<Option<usize>> {
    match index {
        Value::Int(n) => Ok(usize::try_from(*n).ok()),
        other => Err(RuntimeError::type_error("list index", other.type_name())),
    }
}

fn load_element(container: &Value, index: &Value) -> Result<Value> {
    match container {
        Value::List(items) => {
            let items = items.read();
            Ok(position(index)?
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default())
        }
        Value::String(s) => Ok(position(index)?
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default()),
        Value::Set(members) => Ok(Value::Boolean(members.read().contains(index))),
        Value::Object(fields) => match index {
            Value::String(key) => Ok(fields.read().get(key).cloned().unwrap_or_default()),
            other => Err(RuntimeError::type_error("object index", other.type_name())),
        },
        other => Err(RuntimeError::type_error("indexing", other.type_name())),
    }
}

/// Stores into a list or object. Storing past the end of a list pads it
/// with nulls, up to `max_len` elements.
fn store_element(container: &Value, index: &Value, value: Value, max_len: usize) -> Result<()> {
    match container {
        Value::List(items) => {
            let at = position(index)?.ok_or_else(|| {
                RuntimeError::type_error("element store", format!("negative index {}", index))
            })?;
            let mut items = items.write();
            if at >= items.len() {
                if at >= max_len {
                    return Err(RuntimeError::ListTooLong {
                        index: at,
                        limit: max_len,
                    });
                }
                items.resize(at + 1, Value::Null);
            }
            items[at] = value;
            Ok(())
        }
        Value::Object(fields) => match index {
            Value::String(key) => {
                fields.write().insert(key.clone(), value);
                Ok(())
            }
            other => Err(RuntimeError::type_error("object index", other.type_name())),
        },
        other => Err(RuntimeError::type_error("element store", other.type_name())),
    }
}

/// Accepts programs whose major.minor version matches this engine.
fn check_version(found: &str) -> Result<()> {
    if found == ENGINE_VERSION {
        return Ok(());
    }
    fn major_minor(version: &str) -> (Option<&str>, Option<&str>) {
        let mut parts = version.split('.');
        (parts.next(), parts.next())
    }
    if major_minor(found) == major_minor(ENGINE_VERSION) {
        warn!(program = found, engine = ENGINE_VERSION, "engine patch version differs");
        return Ok(());
    }
    Err(RuntimeError::IncompatibleProgram {
        expected: ENGINE_VERSION.to_string(),
        found: found.to_string(),
    })
}
