//! Global conversion and collection functions.

use crate::runtime::value::Value;
use num_traits::ToPrimitive;

/// `len(x)` - characters of a string, members of a collection.
pub fn len(args: &[Value]) -> Result<Value, String> {
    let n = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.read().len(),
        Value::Set(members) => members.read().len(),
        Value::Object(fields) => fields.read().len(),
        other => return Err(format!("{} has no length", other.type_name())),
    };
    to_int(n)
}

/// `str(x)` - the printed form of any value.
pub fn str(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(args[0].to_string()))
}

/// `int(x)` - floors floats, parses strings.
pub fn int(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Boolean(b) => Ok(Value::Int(i32::from(*b))),
        Value::Float(n) => floor_to_int(*n),
        Value::String(s) => {
            let text = s.trim();
            match text.parse::<i32>() {
                Ok(n) => Ok(Value::Int(n)),
                Err(_) => text
                    .parse::<f64>()
                    .map_err(|_| format!("cannot convert \"{}\" to int", s))
                    .and_then(floor_to_int),
            }
        }
        other => Err(format!("cannot convert {} to int", other.type_name())),
    }
}

/// `float(x)`
pub fn float(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Int(n) => Ok(Value::Float(f64::from(*n))),
        Value::Float(n) => Ok(Value::Float(*n)),
        Value::Boolean(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("cannot convert \"{}\" to float", s)),
        other => Err(format!("cannot convert {} to float", other.type_name())),
    }
}

/// `type_of(x)` - the registry name of the value's type.
pub fn type_of(args: &[Value]) -> Result<Value, String> {
    Ok(Value::string(args[0].type_name()))
}

/// `push(list, v)` - appends to a list, returning its new length.
pub fn push(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::List(items) => {
            let mut items = items.write();
            items.push(args[1].clone());
            to_int(items.len())
        }
        Value::Set(members) => {
            // Membership is decided under a read guard; equality may read this set again
            let present = members.read().contains(&args[1]);
            let mut members = members.write();
            if !present {
                members.push(args[1].clone());
            }
            to_int(members.len())
        }
        other => Err(format!("cannot push onto {}", other.type_name())),
    }
}

/// `keys(object)` - field names in insertion order.
pub fn keys(args: &[Value]) -> Result<Value, String> {
    match &args[0] {
        Value::Object(fields) => Ok(Value::list(
            fields.read().keys().map(|key| Value::string(key.as_str())).collect(),
        )),
        other => Err(format!("{} has no keys", other.type_name())),
    }
}

/// `contains(collection, v)` - membership in a set or list, or a field name
/// of an object.
pub fn contains(args: &[Value]) -> Result<Value, String> {
    let needle = &args[1];
    let found = match &args[0] {
        Value::List(items) => items.read().contains(needle),
        Value::Set(members) => members.read().contains(needle),
        Value::Object(fields) => match needle {
            Value::String(key) => fields.read().contains_key(key),
            _ => false,
        },
        Value::String(s) => match needle {
            Value::String(part) => s.contains(part.as_str()),
            _ => false,
        },
        other => return Err(format!("cannot search {}", other.type_name())),
    };
    Ok(Value::Boolean(found))
}

pub(super) fn floor_to_int(n: f64) -> Result<Value, String> {
    n.floor()
        .to_i32()
        .map(Value::Int)
        .ok_or_else(|| format!("{} does not fit in an int", n))
}

fn to_int(n: usize) -> Result<Value, String> {
    n.to_i32()
        .map(Value::Int)
        .ok_or_else(|| format!("length {} does not fit in an int", n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len() {
        assert_eq!(len(&[Value::string("héllo")]), Ok(Value::Int(5)));
        assert_eq!(
            len(&[Value::list(vec![Value::Null, Value::Null])]),
            Ok(Value::Int(2))
        );
        assert!(len(&[Value::Int(3)]).is_err());
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(int(&[Value::Float(-2.5)]), Ok(Value::Int(-3)));
        assert_eq!(int(&[Value::string(" 42 ")]), Ok(Value::Int(42)));
        assert_eq!(int(&[Value::string("7.9")]), Ok(Value::Int(7)));
        assert_eq!(int(&[Value::Boolean(true)]), Ok(Value::Int(1)));
        assert!(int(&[Value::string("forty")]).is_err());
        assert!(int(&[Value::Float(f64::NAN)]).is_err());
    }

    #[test]
    fn test_float_and_str() {
        assert_eq!(float(&[Value::Int(2)]), Ok(Value::Float(2.0)));
        assert_eq!(str(&[Value::Float(3.0)]), Ok(Value::string("3")));
        assert_eq!(type_of(&[Value::Null]), Ok(Value::string("null")));
    }

    #[test]
    fn test_push_mutates_shared_list() {
        let list = Value::list(vec![Value::Int(1)]);
        assert_eq!(push(&[list.clone(), Value::Int(2)]), Ok(Value::Int(2)));
        assert_eq!(list.to_string(), "[1, 2]");
    }

    #[test]
    fn test_push_set_into_itself() {
        let set = Value::set(vec![Value::set(vec![])]);
        assert_eq!(push(&[set.clone(), set.clone()]), Ok(Value::Int(2)));
        assert_eq!(push(&[set.clone(), set.clone()]), Ok(Value::Int(2)));
    }

    #[test]
    fn test_push_to_set_skips_duplicates() {
        let set = Value::set(vec![Value::Int(1)]);
        assert_eq!(push(&[set.clone(), Value::Float(1.0)]), Ok(Value::Int(1)));
    }

    #[test]
    fn test_keys_and_contains() {
        let object = Value::object(vec![
            ("b".to_string(), Value::Int(1)),
            ("a".to_string(), Value::Int(2)),
        ]);
        assert_eq!(keys(&[object.clone()]).unwrap().to_string(), "[\"b\", \"a\"]");
        assert_eq!(contains(&[object, Value::string("a")]), Ok(Value::Boolean(true)));

        let set = Value::set(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(contains(&[set, Value::Int(3)]), Ok(Value::Boolean(false)));
    }
}
