//! End-to-end tests driving `Engine::eval`.

use tern_engine::{CompileError, Engine, EngineConfig, Error, RuntimeError, Value};

fn eval(source: &str) -> Value {
    let mut engine = Engine::new();
    engine
        .eval(source)
        .unwrap_or_else(|err| panic!("{} failed: {}", source, err))
}

fn eval_err(source: &str) -> Error {
    let mut engine = Engine::new();
    engine.eval(source).expect_err("evaluation should fail")
}

fn eval_display(source: &str) -> String {
    eval(source).to_string()
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 1;"), Value::Int(2));
    assert_eq!(eval("2 + 3 * 4;"), Value::Int(14));
    assert_eq!(eval("7 / 2;"), Value::Int(3));
    assert_eq!(eval("7 % 3;"), Value::Int(1));
    assert_eq!(eval("7.0 / 2.0;"), Value::Float(3.5));
    assert_eq!(eval("2 ** 10;"), Value::Int(1024));
    assert_eq!(eval("-2 ** 2;"), Value::Int(-4));
    assert_eq!(eval("(1 + 2) * 3;"), Value::Int(9));
}

#[test]
fn test_integer_overflow_wraps() {
    assert_eq!(eval("2147483647 + 1;"), Value::Int(i32::MIN));
}

#[test]
fn test_empty_program_is_null() {
    assert_eq!(eval(""), Value::Null);
    assert_eq!(eval("let a = 1;"), Value::Null);
}

#[test]
fn test_assignment_and_return() {
    assert_eq!(eval("let x = 10; x = 20; return x;"), Value::Int(20));
    assert_eq!(eval("let x = 1; x += 4; x *= 3; x;"), Value::Int(15));
    assert_eq!(eval("let x = null; x = 5; x;"), Value::Int(5));
}

#[test]
fn test_declare_assign_read_back_each_type() {
    let cases = [
        ("int", "1", "2", Value::Int(2)),
        ("float", "1.5", "2.5", Value::Float(2.5)),
        ("string", "\"a\"", "\"b\"", Value::string("b")),
        ("bool", "false", "true", Value::Boolean(true)),
    ];
    for (datatype, first, second, expected) in cases {
        let typed = format!("let v: {} = {}; v = {}; v;", datatype, first, second);
        assert_eq!(eval(&typed), expected, "{}", typed);
        let inferred = format!("let v = {}; v = {}; v;", first, second);
        assert_eq!(eval(&inferred), expected, "{}", inferred);
    }
}

#[test]
fn test_top_level_return_stops_execution() {
    assert_eq!(eval("return 1; 2;"), Value::Int(1));
}

#[test]
fn test_implicit_conversions() {
    assert_eq!(eval("let f: float = 3; f;"), Value::Float(3.0));
    assert_eq!(eval("let i: int = -2.5; i;"), Value::Int(-3));
    assert_eq!(eval("let s: string = 42; s;"), Value::string("42"));
}

#[test]
fn test_recursive_factorial() {
    let source = "
        function fact(n: int): int {
            if (n <= 1) { return 1; }
            return n * fact(n - 1);
        }
        fact(5);
    ";
    assert_eq!(eval(source), Value::Int(120));
}

#[test]
fn test_mutually_recursive_functions() {
    let source = "
        function is_even(n: int): bool { if (n == 0) { return true; } return is_odd(n - 1); }
        function is_odd(n: int): bool { if (n == 0) { return false; } return is_even(n - 1); }
        is_even(10) && !is_odd(10);
    ";
    assert_eq!(eval(source), Value::Boolean(true));
}

#[test]
fn test_functions_see_and_update_globals() {
    let source = "
        let counter = 0;
        function bump() { counter++; }
        bump();
        bump();
        counter;
    ";
    assert_eq!(eval(source), Value::Int(2));
}

#[test]
fn test_untyped_parameters_dispatch_at_runtime() {
    let source = "function add(a, b) { return a + b; }";
    assert_eq!(eval(&format!("{} add(1, 2.5);", source)), Value::Float(3.5));
    assert_eq!(eval(&format!("{} add(1, 2);", source)), Value::Int(3));
    assert_eq!(eval(&format!("{} add(\"x\", 1);", source)), Value::string("x1"));
}

#[test]
fn test_function_without_return_yields_null() {
    assert_eq!(eval("function f() { } f();"), Value::Null);
}

#[test]
fn test_if_else_chain() {
    let source = "
        function grade(score: int): string {
            if (score >= 90) { return \"A\"; }
            else if (score >= 80) { return \"B\"; }
            else { return \"C\"; }
        }
        grade(95) + grade(85) + grade(10);
    ";
    assert_eq!(eval(source), Value::string("ABC"));
}

#[test]
fn test_if_chain_evaluates_each_condition_once() {
    let source = |first: bool| {
        format!(
            "
            let checks = 0;
            let branch = 0;
            function check(result: bool): bool {{ checks++; return result; }}
            if (check({})) {{ branch = 1; }}
            else if (check(true)) {{ branch = 2; }}
            else if (check(true)) {{ branch = 3; }}
            else {{ branch = 4; }}
            checks * 10 + branch;
        ",
            first
        )
    };
    assert_eq!(eval(&source(true)), Value::Int(11));
    assert_eq!(eval(&source(false)), Value::Int(22));
}

#[test]
fn test_loops() {
    assert_eq!(
        eval("let sum = 0; for (let i = 0; i < 5; i++) { sum += i; } sum;"),
        Value::Int(10)
    );
    assert_eq!(
        eval("let n = 1; while (n < 100) { n = n * 2; } n;"),
        Value::Int(128)
    );
}

#[test]
fn test_break_levels() {
    let source = "
        let n = 0;
        while (true) {
            while (true) {
                n = n + 1;
                break 2;
            }
            n = 100;
        }
        n;
    ";
    assert_eq!(eval(source), Value::Int(1));

    let inner_only = "
        let outer = 0;
        while (outer < 3) {
            while (true) { break; }
            outer++;
        }
        outer;
    ";
    assert_eq!(eval(inner_only), Value::Int(3));
}

#[test]
fn test_short_circuit_skips_right_side() {
    let source = "
        let hits = 0;
        function touch(): bool { hits++; return true; }
        false && touch();
        true || touch();
        hits;
    ";
    assert_eq!(eval(source), Value::Int(0));
    assert_eq!(eval("true && false;"), Value::Boolean(false));
    assert_eq!(eval("false || true;"), Value::Boolean(true));
}

#[test]
fn test_ternary() {
    assert_eq!(
        eval("let a = 5; a > 3 ? \"big\" : \"small\";"),
        Value::string("big")
    );
}

#[test]
fn test_element_increment_is_visible_through_the_list() {
    assert_eq!(eval_display("let x = [1, 2, 3]; x[0]++; return x;"), "[2, 2, 3]");
}

#[test]
fn test_collections() {
    assert_eq!(eval("let g = [[1, 2], [3, 4]]; g[1, 0];"), Value::Int(3));
    assert_eq!(eval("let xs = [1, 2]; xs[5];"), Value::Null);
    assert_eq!(eval_display("let xs = [1]; xs[3] = 4; xs;"), "[1, null, null, 4]");
    assert_eq!(eval("let xs = [1, 2, 3]; xs.length;"), Value::Int(3));
    assert_eq!(eval("let s = #{1, 2, 2}; s.size;"), Value::Int(2));
    assert_eq!(eval("let s = #{1, 2}; s[2];"), Value::Boolean(true));
}

#[test]
fn test_cyclic_lists_compare() {
    assert_eq!(
        eval("let a = []; let b = []; push(a, a); push(b, b); a == b;"),
        Value::Boolean(true)
    );
    assert_eq!(
        eval("let a = []; let b = [1]; push(a, a); push(b, b); a == b;"),
        Value::Boolean(false)
    );
}

#[test]
fn test_push_set_into_itself() {
    assert_eq!(eval("let s = #{ #{} }; push(s, s); len(s);"), Value::Int(2));
}

#[test]
fn test_objects() {
    assert_eq!(eval("let p = {x: 1, y: 2}; p.x = 5; p.x + p.y;"), Value::Int(7));
    assert_eq!(eval_display("let p = {b: 1, \"a\": 2}; p;"), "{b: 1, a: 2}");
    assert_eq!(eval("let p = {k: 1}; p[\"k\"];"), Value::Int(1));
}

#[test]
fn test_strings() {
    assert_eq!(eval("\"ab\" + \"cd\";"), Value::string("abcd"));
    assert_eq!(eval("let s = \"hello\"; s.length;"), Value::Int(5));
    assert_eq!(eval("let s = \"hello\"; s[1];"), Value::string("e"));
    assert_eq!(
        eval("let name = \"tern\"; `hello ${name}, ${1 + 1}`;"),
        Value::string("hello tern, 2")
    );
}

#[test]
fn test_builtins() {
    assert_eq!(eval("len([1, 2, 3]);"), Value::Int(3));
    assert_eq!(eval("str(42) + \"!\";"), Value::string("42!"));
    assert_eq!(eval_display("let xs = [1]; push(xs, 2); xs;"), "[1, 2]");
    assert_eq!(eval("math.max(1, 9, 3);"), Value::Int(9));
    assert_eq!(eval("math.sqrt(16);"), Value::Float(4.0));
    assert_eq!(eval("floor(2.7);"), Value::Int(2));
    assert_eq!(eval("type_of(1.5);"), Value::string("float"));
    assert_eq!(eval("contains(#{1, 2}, 2);"), Value::Boolean(true));
    assert_eq!(eval("print(\"from test\");"), Value::Null);
}

#[test]
fn test_host_constants() {
    let mut engine = Engine::new();
    engine
        .environment_mut()
        .define_constant("limit", Value::Int(3));
    assert_eq!(engine.eval("limit * 2;").unwrap(), Value::Int(6));
    assert!(matches!(
        engine.eval("limit = 4;"),
        Err(Error::Compile(CompileError::AssignToConstant(_)))
    ));
}

#[test]
fn test_host_objects_cannot_be_modified() {
    let mut engine = Engine::new();
    let stores = [
        "math.pi = 3;",
        "math.sqrt = 1;",
        "math.pi += 1;",
        "math.pi++;",
        "math[\"pi\"] = 3;",
    ];
    for source in stores {
        assert_eq!(
            engine.eval(source),
            Err(Error::Compile(CompileError::AssignToConstant("math".into()))),
            "{}",
            source
        );
    }

    // An alias only changes the script's own copy
    assert_eq!(engine.eval("let m = math; m.pi = 3; m.pi;").unwrap(), Value::Int(3));
    assert_eq!(
        engine.eval("math.pi;").unwrap(),
        Value::Float(std::f64::consts::PI)
    );
    assert_eq!(engine.eval("math.sqrt(4);").unwrap(), Value::Float(2.0));
}

#[test]
fn test_closed_block_names_stay_reserved() {
    assert_eq!(
        eval_err("function f() { { let a = 1; } { let a = 2; return a; } } f();"),
        Error::Compile(CompileError::DuplicateDeclaration("a".into()))
    );
    assert_eq!(
        eval("let a = 1; function f(): int { let a = 2; return a; } f() + a;"),
        Value::Int(3)
    );
}

#[test]
fn test_compile_errors() {
    assert!(matches!(
        eval_err("let x: int = \"no\";"),
        Error::Compile(CompileError::TypeMismatch { .. })
    ));
    assert_eq!(
        eval_err("y + 1;"),
        Error::Compile(CompileError::UnknownIdentifier("y".into()))
    );
    assert_eq!(
        eval_err("for (;;) { }"),
        Error::Compile(CompileError::MissingLoopClause("condition"))
    );
}

#[test]
fn test_syntax_errors() {
    assert!(matches!(
        eval_err("let = 5;"),
        Error::Syntax { line: 1, column: 5, .. }
    ));
    assert!(matches!(
        eval_err("let a = 1;\n\"unterminated"),
        Error::Syntax { line: 2, column: 1, .. }
    ));
}

#[test]
fn test_runtime_errors() {
    assert_eq!(
        eval_err("let z = 0; 10 % z;"),
        Error::Runtime(RuntimeError::DivisionByZero)
    );
    assert!(matches!(
        eval_err("int(\"x\");"),
        Error::Runtime(RuntimeError::ExternalCallFailure { .. })
    ));
    assert!(matches!(
        eval_err("function f() { return 1; } let g = f; g();"),
        Error::Runtime(RuntimeError::NotCallable(_))
    ));
}

#[test]
fn test_stack_limit_stops_runaway_recursion() {
    let mut engine = Engine::with_config(EngineConfig::default().with_max_stack(256));
    let err = engine
        .eval("function f(n: int): int { return f(n + 1); } f(0);")
        .unwrap_err();
    assert_eq!(err, Error::Runtime(RuntimeError::StackOverflow(256)));
}

#[test]
fn test_list_growth_limit() {
    let mut engine = Engine::with_config(EngineConfig::default().with_max_list_len(100));
    assert_eq!(
        engine.eval("let x = [1]; x[99] = 0; len(x);").unwrap(),
        Value::Int(100)
    );
    assert_eq!(
        engine.eval("let x = [1]; x[100] = 0;").unwrap_err(),
        Error::Runtime(RuntimeError::ListTooLong {
            index: 100,
            limit: 100
        })
    );

    let err = Engine::new()
        .eval("let x = [1]; x[2147483647] = 0;")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Runtime(RuntimeError::ListTooLong {
            index: 2147483647,
            ..
        })
    ));
}

#[test]
fn test_fuel_limit() {
    let mut engine = Engine::with_config(EngineConfig::default().with_fuel(500));
    let err = engine.eval("let i = 0; while (true) { i++; }").unwrap_err();
    assert_eq!(err, Error::Runtime(RuntimeError::OutOfFuel(500)));
}

#[test]
fn test_engine_is_reusable_across_programs() {
    let mut engine = Engine::new();
    assert_eq!(engine.eval("let a = 1; a;").unwrap(), Value::Int(1));
    // Locals do not outlive their program
    assert!(engine.eval("a;").is_err());
    assert_eq!(engine.eval("let a = 2; a;").unwrap(), Value::Int(2));
}

#[test]
fn test_compile_then_run() {
    let mut engine = Engine::new();
    let program = engine.compile("let x = 3; x * x;").unwrap();
    assert_eq!(engine.run(&program).unwrap(), Value::Int(9));
    assert_eq!(engine.run(&program).unwrap(), Value::Int(9));
}

#[test]
fn test_eval_file() {
    let path = std::env::temp_dir().join(format!("tern-engine-test-{}.tern", std::process::id()));
    std::fs::write(&path, "function sq(n: int): int { return n * n; }\nsq(12);").unwrap();
    let result = Engine::new().eval_file(&path);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(result.unwrap(), Value::Int(144));
}
