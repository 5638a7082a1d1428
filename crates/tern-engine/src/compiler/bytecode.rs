//! Bytecode definitions.
//!
//! A [`Program`] is the contract between the compiler and the VM: a flat list
//! of `(opcode, operand)` pairs whose branch operands are absolute
//! instruction indices.

use super::codegen::Label;
use std::fmt;

/// Version stamped into every compiled program.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A compiled program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Version of the compiler that produced the program
    pub engine_version: String,
    /// The instructions, main stream first, then function bodies
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Creates a program stamped with the current engine version.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            engine_version: ENGINE_VERSION.to_string(),
            instructions,
        }
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the program has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterates over the decoded opcodes, skipping undecodable ones.
    pub fn opcodes(&self) -> impl Iterator<Item = OpCode> + '_ {
        self.instructions.iter().filter_map(Instruction::decode)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; tern {}", self.engine_version)?;
        for (index, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{:04}  {}", index, instruction)?;
        }
        Ok(())
    }
}

/// A single finalized instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Raw opcode number, see [`OpCode`]
    pub opcode: u16,
    pub operand: Operand,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode: opcode as u16,
            operand: Operand::None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode: opcode as u16,
            operand,
        }
    }

    /// Decodes the raw opcode, `None` if the number is not assigned.
    pub fn decode(&self) -> Option<OpCode> {
        OpCode::from_u16(self.opcode)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Some(opcode) => write!(f, "{:<26}", opcode.mnemonic())?,
            None => write!(f, "{:<26}", format!("<invalid {:#06x}>", self.opcode))?,
        }
        write!(f, "{}", self.operand)
    }
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    /// Integer literal, stack slot, count, or (after finalize) an instruction index
    Int(i64),
    Float(f64),
    Bool(bool),
    /// String literal, member name, or external binding name
    Str(String),
    /// Symbolic branch target; never present in a finalized program
    Label(Label),
}

impl Operand {
    /// Returns the integer payload.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Operand::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Operand::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the label payload.
    pub fn as_label(&self) -> Option<Label> {
        match self {
            Operand::Label(label) => Some(*label),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int(n) => write!(f, "{}", n),
            Operand::Float(n) => write!(f, "{:?}", n),
            Operand::Bool(b) => write!(f, "{}", b),
            Operand::Str(s) => write!(f, "{:?}", s),
            Operand::Label(label) => write!(f, "{}", label),
        }
    }
}

macro_rules! opcodes {
    ($($(#[$doc:meta])* $name:ident = $value:literal => $mnemonic:literal,)*) => {
        /// Operation codes for the VM.
        ///
        /// Numbers are grouped by family in the high nibble of the low byte
        /// and are part of the program format.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum OpCode {
            $($(#[$doc])* $name = $value,)*
        }

        impl OpCode {
            /// Decodes a raw opcode number.
            pub fn from_u16(value: u16) -> Option<OpCode> {
                match value {
                    $($value => Some(OpCode::$name),)*
                    _ => None,
                }
            }

            /// Assembly-style name used in disassembly.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(OpCode::$name => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    // Special
    /// Stop execution
    Term = 0x00 => "TERM",
    /// Reserve `operand` null slots on the stack
    AllocStack = 0x01 => "ALLOC_STACK",
    /// Drop `operand` values from the stack
    PopStack = 0x02 => "POP_STACK",

    // Constants
    /// Push null
    LoadNull = 0x10 => "LOAD_NULL",
    /// Push a boolean literal
    LoadConst8 = 0x11 => "LOAD_CONST8",
    /// Push an integer literal
    LoadConst32 = 0x12 => "LOAD_CONST32",
    /// Push a float or string literal
    LoadConst64 = 0x13 => "LOAD_CONST64",

    // Integer arithmetic
    AddInt = 0x20 => "ADD_INT",
    SubInt = 0x21 => "SUB_INT",
    MulInt = 0x22 => "MUL_INT",
    DivInt = 0x23 => "DIV_INT",
    ModInt = 0x24 => "MOD_INT",
    PowInt = 0x25 => "POW_INT",
    NegInt = 0x26 => "NEG_INT",

    // Float arithmetic
    AddFloat = 0x28 => "ADD_FLOAT",
    SubFloat = 0x29 => "SUB_FLOAT",
    MulFloat = 0x2A => "MUL_FLOAT",
    DivFloat = 0x2B => "DIV_FLOAT",
    ModFloat = 0x2C => "MOD_FLOAT",
    PowFloat = 0x2D => "POW_FLOAT",
    NegFloat = 0x2E => "NEG_FLOAT",

    // Dynamically typed arithmetic
    AddAny = 0x30 => "ADD_ANY",
    SubAny = 0x31 => "SUB_ANY",
    MulAny = 0x32 => "MUL_ANY",
    DivAny = 0x33 => "DIV_ANY",
    ModAny = 0x34 => "MOD_ANY",
    PowAny = 0x35 => "POW_ANY",
    NegAny = 0x36 => "NEG_ANY",
    NotAny = 0x37 => "NOT_ANY",

    /// Concatenate two strings
    ConcatString = 0x38 => "CONCAT_STRING",
    /// Boolean negation
    NotBool = 0x39 => "NOT_BOOL",

    // Comparison
    EqInt = 0x40 => "EQ_INT",
    NeInt = 0x41 => "NE_INT",
    LtInt = 0x42 => "LT_INT",
    LeInt = 0x43 => "LE_INT",
    GtInt = 0x44 => "GT_INT",
    GeInt = 0x45 => "GE_INT",
    EqFloat = 0x48 => "EQ_FLOAT",
    NeFloat = 0x49 => "NE_FLOAT",
    LtFloat = 0x4A => "LT_FLOAT",
    LeFloat = 0x4B => "LE_FLOAT",
    GtFloat = 0x4C => "GT_FLOAT",
    GeFloat = 0x4D => "GE_FLOAT",
    EqAny = 0x50 => "EQ_ANY",
    NeAny = 0x51 => "NE_ANY",
    LtAny = 0x52 => "LT_ANY",
    LeAny = 0x53 => "LE_ANY",
    GtAny = 0x54 => "GT_ANY",
    GeAny = 0x55 => "GE_ANY",
    EqString = 0x58 => "EQ_STRING",
    NeString = 0x59 => "NE_STRING",
    EqBool = 0x5A => "EQ_BOOL",
    NeBool = 0x5B => "NE_BOOL",
    /// Structural equality of collections, functions and null
    EqObject = 0x5C => "EQ_OBJECT",
    NeObject = 0x5D => "NE_OBJECT",

    // Conversions
    IntToFloat = 0x60 => "INT_TO_FLOAT",
    /// Floor a float into an integer
    FloatToInt = 0x61 => "FLOAT_TO_INT",
    IntToString = 0x62 => "INT_TO_STRING",
    FloatToString = 0x63 => "FLOAT_TO_STRING",

    // Control flow
    /// Unconditional jump to `operand`
    Jump = 0x70 => "JUMP",
    /// Pop, jump to `operand` if falsy
    BranchFalse = 0x71 => "BRANCH_FALSE",
    /// Pop, jump to `operand` if truthy
    BranchTrue = 0x72 => "BRANCH_TRUE",
    /// Pop two integers, jump if equal
    BranchEqualInt = 0x73 => "BRANCH_EQUAL_INT",
    BranchNotEqualInt = 0x74 => "BRANCH_NOT_EQUAL_INT",
    BranchGreaterInt = 0x75 => "BRANCH_GREATER_INT",
    BranchGreaterOrEqualInt = 0x76 => "BRANCH_GREATER_OR_EQUAL_INT",
    BranchLessInt = 0x77 => "BRANCH_LESS_INT",
    BranchLessOrEqualInt = 0x78 => "BRANCH_LESS_OR_EQUAL_INT",

    // Frame-relative locals
    /// Push `stack[fp + operand]`
    LoadLocal8 = 0x80 => "LOAD_LOCAL8",
    LoadLocal32 = 0x81 => "LOAD_LOCAL32",
    LoadLocal64 = 0x82 => "LOAD_LOCAL64",
    /// Pop into `stack[fp + operand]`
    StoreLocal8 = 0x83 => "STORE_LOCAL8",
    StoreLocal32 = 0x84 => "STORE_LOCAL32",
    StoreLocal64 = 0x85 => "STORE_LOCAL64",
    /// Add one to `stack[fp + operand]` in place
    IncrementLocal = 0x86 => "INCREMENT_LOCAL",
    DecrementLocal = 0x87 => "DECREMENT_LOCAL",

    // Top-level locals addressed from inside functions
    /// Push `stack[operand]`
    LoadGlobal8 = 0x88 => "LOAD_GLOBAL8",
    LoadGlobal32 = 0x89 => "LOAD_GLOBAL32",
    LoadGlobal64 = 0x8A => "LOAD_GLOBAL64",
    StoreGlobal8 = 0x8B => "STORE_GLOBAL8",
    StoreGlobal32 = 0x8C => "STORE_GLOBAL32",
    StoreGlobal64 = 0x8D => "STORE_GLOBAL64",
    IncrementGlobal = 0x8E => "INCREMENT_GLOBAL",
    DecrementGlobal = 0x8F => "DECREMENT_GLOBAL",

    // Members
    /// Pop an object, push its field named `operand`
    LoadMember8 = 0x90 => "LOAD_MEMBER8",
    LoadMember32 = 0x91 => "LOAD_MEMBER32",
    LoadMember64 = 0x92 => "LOAD_MEMBER64",
    /// Pop an object, pop a value, assign the field named `operand`
    StoreMember8 = 0x93 => "STORE_MEMBER8",
    StoreMember32 = 0x94 => "STORE_MEMBER32",
    StoreMember64 = 0x95 => "STORE_MEMBER64",
    IncrementMember = 0x96 => "INCREMENT_MEMBER",
    DecrementMember = 0x97 => "DECREMENT_MEMBER",

    // Elements; `operand` is the number of indices
    /// Pop the indices, pop the container, push the element
    LoadElement8 = 0x98 => "LOAD_ELEMENT8",
    LoadElement32 = 0x99 => "LOAD_ELEMENT32",
    LoadElement64 = 0x9A => "LOAD_ELEMENT64",
    /// Pop the indices, pop the container, pop a value, assign the element
    StoreElement8 = 0x9B => "STORE_ELEMENT8",
    StoreElement32 = 0x9C => "STORE_ELEMENT32",
    StoreElement64 = 0x9D => "STORE_ELEMENT64",
    IncrementElement = 0x9E => "INCREMENT_ELEMENT",
    DecrementElement = 0x9F => "DECREMENT_ELEMENT",

    // Collections
    /// Pop `operand` values into a new list
    NewArray = 0xA0 => "NEW_ARRAY",
    /// Pop `operand` key/value pairs into a new object
    NewObject = 0xA1 => "NEW_OBJECT",
    /// Pop `operand` values into a new set
    NewSet = 0xA2 => "NEW_SET",
    /// Pop `operand` values and push their concatenated string forms
    BuildString = 0xA3 => "BUILD_STRING",

    // Calls
    /// Push a reference to the function entry at `operand`
    LoadInstructionReference = 0xB0 => "LOAD_INSTRUCTION_REFERENCE",
    /// Push fp and the return address, set fp, jump to `operand`
    CallInternal = 0xB1 => "CALL_INTERNAL",
    /// Pop a host callable and `operand` arguments, invoke it
    CallExternal = 0xB2 => "CALL_EXTERNAL",
    /// Push the host binding named `operand`
    LoadExternal = 0xB3 => "LOAD_EXTERNAL",
    /// Unwind the frame without a value
    Return = 0xB4 => "RETURN",
    Return8 = 0xB5 => "RETURN8",
    Return32 = 0xB6 => "RETURN32",
    Return64 = 0xB7 => "RETURN64",
    /// Push the value captured by the last return or host call
    PushReturn8 = 0xB8 => "PUSH_RETURN8",
    PushReturn32 = 0xB9 => "PUSH_RETURN32",
    PushReturn64 = 0xBA => "PUSH_RETURN64",
}

impl OpCode {
    /// Returns true for opcodes whose operand is a branch target.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            OpCode::Jump
                | OpCode::BranchFalse
                | OpCode::BranchTrue
                | OpCode::BranchEqualInt
                | OpCode::BranchNotEqualInt
                | OpCode::BranchGreaterInt
                | OpCode::BranchGreaterOrEqualInt
                | OpCode::BranchLessInt
                | OpCode::BranchLessOrEqualInt
                | OpCode::CallInternal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_round_trips_numbers() {
        for opcode in [OpCode::Term, OpCode::AddInt, OpCode::CallExternal, OpCode::PushReturn64] {
            assert_eq!(OpCode::from_u16(opcode as u16), Some(opcode));
        }
        assert_eq!(OpCode::from_u16(0xFFFF), None);
    }

    #[test]
    fn test_disassembly() {
        let program = Program::new(vec![
            Instruction::with_operand(OpCode::LoadConst32, Operand::Int(7)),
            Instruction::with_operand(OpCode::LoadExternal, Operand::Str("print".into())),
            Instruction::simple(OpCode::Term),
        ]);
        let text = program.to_string();
        assert!(text.contains("0000  LOAD_CONST32"));
        assert!(text.contains("\"print\""));
        assert!(text.contains("0002  TERM"));
    }

    #[test]
    fn test_invalid_opcode_display() {
        let instruction = Instruction {
            opcode: 0x7FFF,
            operand: Operand::None,
        };
        assert_eq!(instruction.decode(), None);
        assert!(instruction.to_string().contains("invalid"));
    }
}
