//! Run-time errors.

use thiserror::Error;

/// Errors raised while executing a program. Execution stops at the first
/// one; the stack is left as it was and no partial result is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Opcode number with no handler
    #[error("Invalid opcode 0x{0:02X}")]
    InvalidOpcode(u16),

    /// Pop from an empty stack
    #[error("Stack underflow at instruction {ip}")]
    StackUnderflow {
        /// Instruction being executed
        ip: usize,
    },

    /// A host function reported a failure
    #[error("External call to '{name}' failed: {message}")]
    ExternalCallFailure {
        /// Name the host function was registered under
        name: String,
        /// Message returned by the host
        message: String,
    },

    /// An operation met a value it cannot handle
    #[error("Cannot apply {operation} to {found}")]
    TypeError {
        /// Operation being performed
        operation: String,
        /// Description of the offending value
        found: String,
    },

    /// Integer division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Operand missing or of the wrong kind
    #[error("Invalid operand for {opcode} at instruction {ip}")]
    InvalidOperand {
        /// Instruction being executed
        ip: usize,
        /// Mnemonic of the instruction
        opcode: &'static str,
    },

    /// Frame-relative or absolute slot outside the stack
    #[error("Invalid stack slot {slot} at instruction {ip}")]
    InvalidSlot {
        /// Instruction being executed
        ip: usize,
        /// Slot operand
        slot: i64,
    },

    /// Instruction pointer left the program
    #[error("Instruction pointer {0} is out of bounds")]
    InstructionOutOfBounds(usize),

    /// Stack grew past the configured limit
    #[error("Stack overflow (limit {0} slots)")]
    StackOverflow(usize),

    /// Element store would grow a list past the configured limit
    #[error("Index {index} is past the list length limit of {limit}")]
    ListTooLong {
        /// Index being stored to
        index: usize,
        /// Configured maximum length
        limit: usize,
    },

    /// Instruction budget exhausted
    #[error("Out of fuel after {0} instructions")]
    OutOfFuel(u64),

    /// `CALL_EXTERNAL` on a value that is not a host callable
    #[error("Value of type {0} is not callable")]
    NotCallable(String),

    /// Conversion whose result is not representable
    #[error("Cannot convert {0} to int")]
    InvalidConversion(String),

    /// Program compiled by an incompatible engine
    #[error("Program built for engine {found}, this is {expected}")]
    IncompatibleProgram {
        /// Version of this engine
        expected: String,
        /// Version recorded in the program
        found: String,
    },
}

impl RuntimeError {
    pub(crate) fn type_error(operation: impl Into<String>, found: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            operation: operation.into(),
            found: found.into(),
        }
    }
}
