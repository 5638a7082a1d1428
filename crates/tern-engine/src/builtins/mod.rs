//! Built-in functions and host modules.
//!
//! - `console` - `print`
//! - `global` - `len`, `str`, `int`, `float`, `type_of`, `push`, `keys`, `contains`
//! - `math` - `abs`, `sqrt`, `floor` and the `math` module object
//!
//! Every builtin is a plain `fn(&[Value]) -> Result<Value, String>`; the VM
//! wraps the error string in `ExternalCallFailure`.

pub mod console;
pub mod global;
pub mod math;

use crate::runtime::HostEnvironment;

/// Registers every builtin in `env`.
pub fn install(env: &mut HostEnvironment) {
    env.define_function("print", None, console::print);

    env.define_function("len", Some(1), global::len);
    env.define_function("str", Some(1), global::str);
    env.define_function("int", Some(1), global::int);
    env.define_function("float", Some(1), global::float);
    env.define_function("type_of", Some(1), global::type_of);
    env.define_function("push", Some(2), global::push);
    env.define_function("keys", Some(1), global::keys);
    env.define_function("contains", Some(2), global::contains);

    env.define_function("abs", Some(1), math::abs);
    env.define_function("sqrt", Some(1), math::sqrt);
    env.define_function("floor", Some(1), math::floor);
    env.define_constant("math", math::module());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Environment, SymbolKind};

    #[test]
    fn test_install_defines_builtins() {
        let mut env = HostEnvironment::new();
        install(&mut env);
        for name in ["print", "len", "str", "push", "contains", "floor"] {
            assert_eq!(env.resolve(name).unwrap().kind, SymbolKind::Function, "{}", name);
        }
        let math = env.resolve("math").unwrap();
        assert_eq!(math.kind, SymbolKind::Object);
        assert_eq!(math.datatype, "object");
    }
}
