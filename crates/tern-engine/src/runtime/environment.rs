//! Host environment: names the compiler cannot find in any lexical scope.

use super::function::NativeFunction;
use super::value::Value;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// What a named binding denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Object,
    Class,
    Constant,
    Variable,
}

/// A binding provided by the host.
#[derive(Debug, Clone)]
pub struct ExternalSymbol {
    pub kind: SymbolKind,
    /// Registry type name of the value
    pub datatype: String,
    pub value: Value,
}

/// Name lookup consulted after every lexical scope has missed.
///
/// The compiler reads `kind` and `datatype`; the VM reads `value` when a
/// `LOAD_EXTERNAL` instruction executes.
pub trait Environment {
    /// Looks up a host binding.
    fn resolve(&self, name: &str) -> Option<ExternalSymbol>;

    /// Returns true if the host provides `name`.
    fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

/// A hash-map backed environment.
#[derive(Debug, Clone, Default)]
pub struct HostEnvironment {
    bindings: FxHashMap<String, ExternalSymbol>,
}

impl HostEnvironment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a binding.
    pub fn define(&mut self, name: impl Into<String>, symbol: ExternalSymbol) {
        self.bindings.insert(name.into(), symbol);
    }

    /// Exposes a native function. `arity` of `None` accepts any argument count.
    pub fn define_function<F>(&mut self, name: &str, arity: Option<usize>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let native = NativeFunction::new(name, arity, func);
        self.define(
            name,
            ExternalSymbol {
                kind: SymbolKind::Function,
                datatype: "function".to_string(),
                value: Value::Native(Arc::new(native)),
            },
        );
    }

    /// Exposes a constant value; its static type is taken from the value.
    pub fn define_constant(&mut self, name: &str, value: Value) {
        let kind = match value {
            Value::Object(_) => SymbolKind::Object,
            Value::Native(_) => SymbolKind::Function,
            _ => SymbolKind::Constant,
        };
        self.define(
            name,
            ExternalSymbol {
                kind,
                datatype: value.type_name().to_string(),
                value,
            },
        );
    }

    /// Removes a binding, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<ExternalSymbol> {
        self.bindings.remove(name)
    }

    /// Iterates over the bound names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

impl Environment for HostEnvironment {
    fn resolve(&self, name: &str) -> Option<ExternalSymbol> {
        self.bindings.get(name).cloned()
    }

    fn has(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}
