//! Console output.

use crate::runtime::value::Value;

/// `print(...)` - writes the arguments joined by spaces to stdout.
pub fn print(args: &[Value]) -> Result<Value, String> {
    println!("{}", join(args));
    Ok(Value::Null)
}

fn join(args: &[Value]) -> String {
    let output: Vec<String> = args.iter().map(|v| format!("{}", v)).collect();
    output.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        let args = [Value::Int(1), Value::string("two"), Value::Float(3.5)];
        assert_eq!(join(&args), "1 two 3.5");
        assert_eq!(join(&[]), "");
    }

    #[test]
    fn test_print_returns_null() {
        assert_eq!(print(&[Value::string("hello")]), Ok(Value::Null));
    }
}
