//! Compile-time errors.

use thiserror::Error;

/// Errors raised while compiling a program. Any of them aborts the whole
/// compilation; no partial program is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Name not found in any scope nor in the host environment
    #[error("Unknown identifier '{0}'")]
    UnknownIdentifier(String),

    /// Name already declared in this scope or an enclosing block
    #[error("'{0}' is already declared")]
    DuplicateDeclaration(String),

    /// Operands or assignment sides with incompatible static types
    #[error("Type mismatch in {context}: {left} vs {right}")]
    TypeMismatch {
        /// Expected or left-hand type
        left: String,
        /// Found or right-hand type
        right: String,
        /// Construct being compiled
        context: String,
    },

    /// No registry rule for an operation key
    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    /// Type annotation naming no registered type
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// Left side of an assignment is not assignable
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,

    /// The instruction to rewrite is not a supported load
    #[error("Cannot rewrite {0} into a store or update")]
    InvalidLValue(String),

    /// Assignment to a `const` binding
    #[error("Cannot assign to constant '{0}'")]
    AssignToConstant(String),

    /// `break` level outside the enclosing loops
    #[error("Invalid break level {level} (loop depth {depth})")]
    InvalidBreakLevel {
        /// Requested level
        level: u32,
        /// Number of enclosing loops
        depth: usize,
    },

    /// Loop without a condition or body
    #[error("Loop is missing its {0}")]
    MissingLoopClause(&'static str),

    /// Call with the wrong number of arguments
    #[error("'{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        /// Function name
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        found: usize,
    },

    /// An expression that yields nothing used as a value
    #[error("{0} does not produce a value")]
    NoValue(String),

    /// Function body reading a local of an enclosing function
    #[error("'{0}' belongs to an enclosing function and cannot be captured")]
    UnsupportedCapture(String),

    /// Call of something that is not a function
    #[error("{0} is not callable")]
    NotCallable(String),

    /// A label was never bound to an instruction
    #[error("Unresolved label {0}")]
    UnresolvedLabel(String),
}

impl CompileError {
    pub(crate) fn mismatch(left: &str, right: &str, context: impl Into<String>) -> Self {
        CompileError::TypeMismatch {
            left: left.to_string(),
            right: right.to_string(),
            context: context.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_construct() {
        let err = CompileError::UnknownIdentifier("foo".into());
        assert_eq!(err.to_string(), "Unknown identifier 'foo'");

        let err = CompileError::mismatch("int", "string", "binary '+'");
        assert_eq!(err.to_string(), "Type mismatch in binary '+': int vs string");

        let err = CompileError::InvalidBreakLevel { level: 3, depth: 1 };
        assert!(err.to_string().contains('3'));
    }
}
