//! Host-provided callables.

use super::value::Value;
use std::fmt;
use std::sync::Arc;

/// Signature of a host function body.
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// A native (Rust) function exposed to scripts.
#[derive(Clone)]
pub struct NativeFunction {
    name: String,
    /// Expected argument count, `None` for variadic functions
    arity: Option<usize>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    /// Wraps a closure as a native function.
    pub fn new<F>(name: impl Into<String>, arity: Option<usize>, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            func: Arc::new(func),
        }
    }

    /// The name the function was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expected argument count, `None` for variadic functions.
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    /// Invokes the function, checking the argument count first.
    pub fn call(&self, args: &[Value]) -> Result<Value, String> {
        match self.arity {
            Some(arity) if arity != args.len() => {
                return Err(format!(
                    "expected {} argument(s), got {}",
                    arity,
                    args.len()
                ));
            }
            _ => {}
        }
        (self.func)(args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_is_enforced() {
        let double = NativeFunction::new("double", Some(1), |args| match &args[0] {
            Value::Int(n) => Ok(Value::Int(n * 2)),
            other => Err(format!("cannot double {}", other.type_name())),
        });
        assert_eq!(double.call(&[Value::Int(4)]), Ok(Value::Int(8)));
        assert!(double.call(&[]).is_err());
    }

    #[test]
    fn test_variadic_accepts_anything() {
        let count = NativeFunction::new("count", None, |args| Ok(Value::Int(args.len() as i32)));
        assert_eq!(count.call(&[Value::Null, Value::Null]), Ok(Value::Int(2)));
    }
}
