//! Numeric builtins and the `math` module object.

use super::global::floor_to_int;
use crate::runtime::function::NativeFunction;
use crate::runtime::value::Value;
use std::sync::Arc;

/// The `math` object: `pi`, `sqrt`, `max`, `min`.
pub fn module() -> Value {
    let native = |name: &str, arity, func: fn(&[Value]) -> Result<Value, String>| {
        Value::Native(Arc::new(NativeFunction::new(name, arity, func)))
    };
    Value::object(vec![
        ("pi".to_string(), Value::Float(std::f64::consts::PI)),
        ("sqrt".to_string(), native("math.sqrt", Some(1), sqrt)),
        ("max".to_string(), native("math.max", None, max)),
        ("min".to_string(), native("math.min", None, min)),
    ])
}

/// `abs(x)` - keeps ints as ints.
pub fn abs(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
        Value::Float(n) => Ok(Value::Float(n.abs())),
        other => Err(not_a_number(other)),
    }
}

/// `sqrt(x)`
pub fn sqrt(args: &[Value]) -> Result<Value, String> {
    let x = number(&args[0])?;
    Ok(Value::Float(x.sqrt()))
}

/// `floor(x)` - rounds toward negative infinity, yielding an int.
pub fn floor(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => floor_to_int(*n),
        other => Err(not_a_number(other)),
    }
}

/// `math.max(...)`
pub fn max(args: &[Value]) -> Result<Value, String> {
    extremum(args, "max", |candidate, best| candidate > best)
}

/// `math.min(...)`
pub fn min(args: &[Value]) -> Result<Value, String> {
    extremum(args, "min", |candidate, best| candidate < best)
}

/// Picks the winning argument; ints stay ints.
fn extremum(args: &[Value], name: &str, wins: fn(f64, f64) -> bool) -> Result<Value, String> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| format!("{} needs at least one argument", name))?;
    let mut best = first;
    let mut best_value = number(first)?;
    for arg in rest {
        let value = number(arg)?;
        if wins(value, best_value) || value.is_nan() {
            best = arg;
            best_value = value;
        }
    }
    Ok(best.clone())
}

fn number(value: &Value) -> Result<f64, String> {
    value.as_f64().ok_or_else(|| not_a_number(value))
}

fn not_a_number(value: &Value) -> String {
    format!("expected a number, found {}", value.type_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_keeps_type() {
        assert_eq!(abs(&[Value::Int(-4)]), Ok(Value::Int(4)));
        assert_eq!(abs(&[Value::Float(-0.5)]), Ok(Value::Float(0.5)));
        assert!(abs(&[Value::string("x")]).is_err());
    }

    #[test]
    fn test_floor() {
        assert_eq!(floor(&[Value::Float(2.7)]), Ok(Value::Int(2)));
        assert_eq!(floor(&[Value::Float(-0.5)]), Ok(Value::Int(-1)));
        assert!(floor(&[Value::Float(1e12)]).is_err());
    }

    #[test]
    fn test_max_min() {
        let args = [Value::Int(3), Value::Float(7.5), Value::Int(-1)];
        assert_eq!(max(&args), Ok(Value::Float(7.5)));
        assert_eq!(min(&args), Ok(Value::Int(-1)));
        assert!(max(&[]).is_err());
    }

    #[test]
    fn test_module_fields() {
        let Value::Object(fields) = module() else {
            panic!("math should be an object");
        };
        let fields = fields.read();
        assert_eq!(fields.get("pi"), Some(&Value::Float(std::f64::consts::PI)));
        assert!(fields.get("sqrt").is_some_and(Value::is_native));
    }
}
