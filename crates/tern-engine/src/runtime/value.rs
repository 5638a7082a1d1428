//! Runtime value representation.

use super::function::NativeFunction;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Shared, mutable list storage.
pub type ListRef = Arc<RwLock<Vec<Value>>>;
/// Shared, mutable object storage. Fields keep insertion order.
pub type ObjectRef = Arc<RwLock<IndexMap<String, Value>>>;
/// Shared, mutable set storage. Members keep insertion order.
pub type SetRef = Arc<RwLock<Vec<Value>>>;

/// Collections deeper than this are elided when printed (guards cycles).
const MAX_DISPLAY_DEPTH: usize = 16;

/// A tern value.
///
/// Collections are reference types: cloning a `Value::List` clones the
/// handle, so stores through one handle are visible through every other.
/// Values are `Send + Sync` and can be moved between async tasks.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// null
    #[default]
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit integer
    Int(i32),
    /// IEEE 754 double
    Float(f64),
    /// String
    String(String),
    /// Ordered list
    List(ListRef),
    /// Insertion-ordered map of named fields
    Object(ObjectRef),
    /// Insertion-ordered collection of distinct values
    Set(SetRef),
    /// Entry point of a compiled function
    Function(usize),
    /// Host-provided callable
    Native(Arc<NativeFunction>),
}

impl Value {
    /// Creates a list value.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    /// Creates an object value from field pairs. Later duplicates win.
    pub fn object<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Value::Object(Arc::new(RwLock::new(fields.into_iter().collect())))
    }

    /// Creates a set value, dropping duplicate members.
    pub fn set<I>(members: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let mut distinct: Vec<Value> = Vec::new();
        for member in members {
            if !distinct.contains(&member) {
                distinct.push(member);
            }
        }
        Value::Set(Arc::new(RwLock::new(distinct)))
    }

    /// Copies collections member by member, keeping shared and cyclic
    /// structure within the copy. Scalars and callables are cloned as is.
    pub fn deep_copy(&self) -> Value {
        copy_value(self, &mut Vec::new())
    }

    /// Creates a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value can be invoked by `CALL_EXTERNAL`.
    pub fn is_native(&self) -> bool {
        matches!(self, Value::Native(_))
    }

    /// Truthiness used by conditional branches.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(_)
            | Value::Object(_)
            | Value::Set(_)
            | Value::Function(_)
            | Value::Native(_) => true,
        }
    }

    /// Returns the registry name of this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "array",
            Value::Object(_) => "object",
            Value::Set(_) => "set",
            Value::Function(_) | Value::Native(_) => "function",
        }
    }

    /// Numeric view of ints and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(f64::from(*n)),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the contained string slice, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

fn copy_value(value: &Value, copies: &mut Vec<(usize, Value)>) -> Value {
    let key = match value {
        Value::List(items) | Value::Set(items) => Arc::as_ptr(items) as usize,
        Value::Object(fields) => Arc::as_ptr(fields) as usize,
        other => return other.clone(),
    };
    if let Some((_, copy)) = copies.iter().find(|(seen, _)| *seen == key) {
        return copy.clone();
    }

    match value {
        Value::Object(fields) => {
            let copy: ObjectRef = Arc::default();
            copies.push((key, Value::Object(copy.clone())));
            let copied: IndexMap<String, Value> = fields
                .read()
                .iter()
                .map(|(name, field)| (name.clone(), copy_value(field, copies)))
                .collect();
            *copy.write() = copied;
            Value::Object(copy)
        }
        Value::List(items) | Value::Set(items) => {
            let copy: ListRef = Arc::default();
            let wrapped = if matches!(value, Value::List(_)) {
                Value::List(copy.clone())
            } else {
                Value::Set(copy.clone())
            };
            copies.push((key, wrapped.clone()));
            let copied: Vec<Value> = items.read().iter().map(|v| copy_value(v, copies)).collect();
            *copy.write() = copied;
            wrapped
        }
        other => other.clone(),
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other, &mut Vec::new())
    }
}

/// Structural equality. `path` holds the collection pairs currently being
/// compared; meeting one again compares equal so cyclic values terminate.
fn values_equal(a: &Value, b: &Value, path: &mut Vec<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
            f64::from(*a) == *b
        }
        (Value::String(a), Value::String(b)) => a == b,
        (Value::List(a), Value::List(b)) | (Value::Set(a), Value::Set(b)) => {
            if Arc::ptr_eq(a, b) {
                return true;
            }
            let pair = (Arc::as_ptr(a) as usize, Arc::as_ptr(b) as usize);
            if path.contains(&pair) {
                return true;
            }
            path.push(pair);
            let equal = {
                let (a, b) = (a.read(), b.read());
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y, path))
            };
            path.pop();
            equal
        }
        (Value::Object(a), Value::Object(b)) => {
            if Arc::ptr_eq(a, b) {
                return true;
            }
            let pair = (Arc::as_ptr(a) as usize, Arc::as_ptr(b) as usize);
            if path.contains(&pair) {
                return true;
            }
            path.push(pair);
            let equal = {
                let (a, b) = (a.read(), b.read());
                a.len() == b.len()
                    && a.iter().all(|(key, x)| {
                        b.get(key).is_some_and(|y| values_equal(x, y, path))
                    })
            };
            path.pop();
            equal
        }
        (Value::Function(a), Value::Function(b)) => a == b,
        (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, 0)
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize) -> fmt::Result {
    match value {
        Value::Null => write!(f, "null"),
        Value::Boolean(b) => write!(f, "{}", b),
        Value::Int(n) => write!(f, "{}", n),
        Value::Float(n) => write!(f, "{}", n),
        Value::String(s) if depth == 0 => write!(f, "{}", s),
        Value::String(s) => write!(f, "{:?}", s),
        Value::List(_) | Value::Object(_) | Value::Set(_) if depth >= MAX_DISPLAY_DEPTH => {
            write!(f, "...")
        }
        Value::List(items) => {
            write!(f, "[")?;
            write_members(f, &items.read(), depth)?;
            write!(f, "]")
        }
        Value::Set(members) => {
            write!(f, "#{{")?;
            write_members(f, &members.read(), depth)?;
            write!(f, "}}")
        }
        Value::Object(fields) => {
            write!(f, "{{")?;
            for (i, (key, field)) in fields.read().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: ", key)?;
                write_value(f, field, depth + 1)?;
            }
            write!(f, "}}")
        }
        Value::Function(entry) => write!(f, "<function @{}>", entry),
        Value::Native(native) => write!(f, "<native {}>", native.name()),
    }
}

fn write_members(f: &mut fmt::Formatter<'_>, members: &[Value], depth: usize) -> fmt::Result {
    for (i, member) in members.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_value(f, member, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(f64::NAN).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::list(vec![]).is_truthy());
    }

    #[test]
    fn test_numeric_equality_crosses_variants() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::string("3"));
    }

    #[test]
    fn test_lists_compare_structurally() {
        let a = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_set_drops_duplicates() {
        let set = Value::set(vec![Value::Int(1), Value::Int(1), Value::Int(2)]);
        assert_eq!(set.to_string(), "#{1, 2}");
    }

    #[test]
    fn test_display() {
        let object = Value::object(vec![
            ("name".to_string(), Value::string("tern")),
            ("tags".to_string(), Value::list(vec![Value::Int(1), Value::Float(2.5)])),
        ]);
        assert_eq!(object.to_string(), "{name: \"tern\", tags: [1, 2.5]}");
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::string("plain").to_string(), "plain");
    }

    #[test]
    fn test_cyclic_lists_compare_without_overflow() {
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        for list in [&a, &b] {
            if let Value::List(items) = list {
                items.write().push(list.clone());
            }
        }
        assert_eq!(a, b);

        let c = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &c {
            items.write().push(c.clone());
        }
        assert_ne!(a, c);
    }

    #[test]
    fn test_objects_ignore_field_order() {
        let a = Value::object(vec![
            ("x".to_string(), Value::Int(1)),
            ("y".to_string(), Value::Int(2)),
        ]);
        let b = Value::object(vec![
            ("y".to_string(), Value::Int(2)),
            ("x".to_string(), Value::Int(1)),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_deep_copy_detaches_nested_collections() {
        let inner = Value::list(vec![Value::Int(1)]);
        let outer = Value::object(vec![("inner".to_string(), inner.clone())]);
        let copy = outer.deep_copy();
        if let Value::List(items) = &inner {
            items.write().push(Value::Int(2));
        }
        assert_eq!(copy.to_string(), "{inner: [1]}");
        assert_eq!(outer.to_string(), "{inner: [1, 2]}");
    }

    #[test]
    fn test_deep_copy_keeps_cycles() {
        let list = Value::list(vec![]);
        if let Value::List(items) = &list {
            items.write().push(list.clone());
        }
        let copy = list.deep_copy();
        let (Value::List(original), Value::List(copied)) = (&list, &copy) else {
            panic!("expected lists");
        };
        assert!(!Arc::ptr_eq(original, copied));
        match &copied.read()[0] {
            Value::List(member) => assert!(Arc::ptr_eq(member, copied)),
            other => panic!("expected list, got {}", other),
        }
    }

    #[test]
    fn test_cyclic_list_display_terminates() {
        let list = Value::list(vec![]);
        if let Value::List(items) = &list {
            items.write().push(list.clone());
        }
        assert!(list.to_string().contains("..."));
    }
}
