//! Tests for the bytecode compiler.

use super::*;
use crate::builtins;
use crate::parser::Parser;
use crate::runtime::HostEnvironment;

fn compile_source(src: &str) -> Result<Program, CompileError> {
    let ast = Parser::new(src).parse_program().expect("source should parse");
    let mut environment = HostEnvironment::new();
    builtins::install(&mut environment);
    Compiler::new(&environment).compile(&ast)
}

fn compile_ok(src: &str) -> Program {
    compile_source(src).expect("Compilation should succeed")
}

fn compile_err(src: &str) -> CompileError {
    compile_source(src).expect_err("Compilation should fail")
}

fn opcodes(program: &Program) -> Vec<OpCode> {
    program.opcodes().collect()
}

#[test]
fn test_compile_empty_program() {
    let program = compile_ok("");
    assert_eq!(
        opcodes(&program),
        vec![OpCode::AllocStack, OpCode::LoadNull, OpCode::Term]
    );
}

#[test]
fn test_final_expression_is_the_result() {
    let program = compile_ok("1 + 1;");
    assert_eq!(
        opcodes(&program),
        vec![
            OpCode::AllocStack,
            OpCode::LoadConst32,
            OpCode::LoadConst32,
            OpCode::AddInt,
            OpCode::Term,
        ]
    );
}

#[test]
fn test_earlier_expression_statements_are_popped() {
    let program = compile_ok("1; 2;");
    assert_eq!(
        opcodes(&program),
        vec![
            OpCode::AllocStack,
            OpCode::LoadConst32,
            OpCode::PopStack,
            OpCode::LoadConst32,
            OpCode::Term,
        ]
    );
}

#[test]
fn test_declaration_reserves_slot_and_stores() {
    let program = compile_ok("let x: int = 5; let y = 2.5;");
    assert_eq!(program.instructions[0].operand, Operand::Int(2));
    assert_eq!(
        opcodes(&program)[1..5],
        [
            OpCode::LoadConst32,
            OpCode::StoreLocal32,
            OpCode::LoadConst64,
            OpCode::StoreLocal64,
        ]
    );
    assert_eq!(program.instructions[2].operand, Operand::Int(0));
    assert_eq!(program.instructions[4].operand, Operand::Int(1));
}

#[test]
fn test_implicit_conversion_in_initializer() {
    let program = compile_ok("let f: float = 1; let s: string = 2.5; let i: int = 2.5;");
    let ops = opcodes(&program);
    assert!(ops.contains(&OpCode::IntToFloat));
    assert!(ops.contains(&OpCode::FloatToString));
    assert!(ops.contains(&OpCode::FloatToInt));
}

#[test]
fn test_int_comparison_fuses_into_branch() {
    let program = compile_ok("let x: int = 1; if (x < 2) { x = 3; }");
    let ops = opcodes(&program);
    assert_eq!(ops[5], OpCode::BranchGreaterOrEqualInt);
    assert!(!ops.contains(&OpCode::LtInt));
    assert!(!ops.contains(&OpCode::BranchFalse));
    // Jumps past the body to the trailing null
    assert_eq!(program.instructions[5].operand, Operand::Int(8));
    assert_eq!(ops[8], OpCode::LoadNull);
}

#[test]
fn test_float_comparison_keeps_branch_false() {
    let program = compile_ok("let x = 1.5; if (x < 2.0) { x = 0.5; }");
    let ops = opcodes(&program);
    assert!(ops.contains(&OpCode::LtFloat));
    assert!(ops.contains(&OpCode::BranchFalse));
}

#[test]
fn test_short_circuit() {
    let program = compile_ok("true && false;");
    let ops = opcodes(&program);
    assert_eq!(
        ops,
        vec![
            OpCode::AllocStack,
            OpCode::LoadConst8,
            OpCode::BranchFalse,
            OpCode::LoadConst8,
            OpCode::Jump,
            OpCode::LoadConst8,
            OpCode::Term,
        ]
    );
    // The decided case pushes false
    assert_eq!(program.instructions[2].operand, Operand::Int(5));
    assert_eq!(program.instructions[5].operand, Operand::Bool(false));
    assert_eq!(program.instructions[4].operand, Operand::Int(6));
}

#[test]
fn test_loop_jumps_back_to_condition() {
    let program = compile_ok("let i: int = 0; while (i < 3) { i++; }");
    let ops = opcodes(&program);
    let jump = ops.iter().position(|op| *op == OpCode::Jump).unwrap();
    // Back to LOAD_LOCAL32 of the condition
    assert_eq!(program.instructions[jump].operand, Operand::Int(3));
    assert_eq!(ops[3], OpCode::LoadLocal32);
    assert!(ops.contains(&OpCode::IncrementLocal));
}

#[test]
fn test_break_targets_loop_end() {
    let program = compile_ok("while (true) { while (true) { break 2; } }");
    let ops = opcodes(&program);
    let last_null = ops.iter().rposition(|op| *op == OpCode::LoadNull).unwrap();
    let jumps: Vec<_> = program
        .instructions
        .iter()
        .filter(|instruction| instruction.decode() == Some(OpCode::Jump))
        .map(|instruction| instruction.operand.as_int().unwrap())
        .collect();
    assert!(jumps.contains(&(last_null as i64)));
}

#[test]
fn test_function_bodies_follow_main_stream() {
    let program = compile_ok("function f(a: int): int { return a + 1; } f(1);");
    let ops = opcodes(&program);
    let term = ops.iter().position(|op| *op == OpCode::Term).unwrap();
    let call = ops.iter().position(|op| *op == OpCode::CallInternal).unwrap();
    assert!(call < term);

    let entry = program.instructions[call].operand.as_int().unwrap() as usize;
    assert_eq!(entry, term + 1);
    assert_eq!(ops[entry], OpCode::AllocStack);
    // Parameter 0 of 1 sits below the saved frame pointer and return address
    assert_eq!(ops[entry + 1], OpCode::LoadLocal32);
    assert_eq!(program.instructions[entry + 1].operand, Operand::Int(-3));

    assert_eq!(ops[call + 1], OpCode::PopStack);
    assert_eq!(ops[call + 2], OpCode::PushReturn32);
}

#[test]
fn test_mutually_recursive_siblings_resolve() {
    let program = compile_ok(
        "function is_even(n: int): bool { if (n == 0) { return true; } return is_odd(n - 1); }
         function is_odd(n: int): bool { if (n == 0) { return false; } return is_even(n - 1); }
         is_even(10);",
    );
    let mut targets: Vec<usize> = program
        .instructions
        .iter()
        .filter(|instruction| instruction.decode() == Some(OpCode::CallInternal))
        .map(|instruction| instruction.operand.as_int().unwrap() as usize)
        .collect();
    assert_eq!(targets.len(), 3);
    for target in &targets {
        assert_eq!(program.instructions[*target].decode(), Some(OpCode::AllocStack));
    }
    targets.sort_unstable();
    targets.dedup();
    assert_eq!(targets.len(), 2);
}

#[test]
fn test_top_level_locals_are_globals_inside_functions() {
    let program = compile_ok("let g: int = 1; function f(): int { g++; return g; } f();");
    let ops = opcodes(&program);
    assert!(ops.contains(&OpCode::IncrementGlobal));
    assert!(ops.contains(&OpCode::LoadGlobal32));
}

#[test]
fn test_external_call() {
    let program = compile_ok("print(\"hi\", 1);");
    let ops = opcodes(&program);
    let load = ops.iter().position(|op| *op == OpCode::LoadExternal).unwrap();
    assert_eq!(program.instructions[load].operand, Operand::Str("print".into()));
    assert_eq!(ops[load + 1], OpCode::CallExternal);
    assert_eq!(program.instructions[load + 1].operand, Operand::Int(2));
    assert_eq!(ops[load + 2], OpCode::PushReturn64);
}

#[test]
fn test_member_call_on_host_module() {
    let program = compile_ok("math.sqrt(16);");
    let ops = opcodes(&program);
    assert!(ops.contains(&OpCode::LoadMember64));
    assert!(ops.contains(&OpCode::CallExternal));
}

#[test]
fn test_element_increment_rewrites_load() {
    let program = compile_ok("let x = [1, 2, 3]; x[0]++;");
    let ops = opcodes(&program);
    assert!(ops.contains(&OpCode::NewArray));
    assert!(ops.contains(&OpCode::IncrementElement));
    assert!(!ops.contains(&OpCode::LoadElement64));
}

#[test]
fn test_template_builds_string() {
    let program = compile_ok("let n = 2; `n = ${n}!`;");
    let build = program
        .instructions
        .iter()
        .find(|instruction| instruction.decode() == Some(OpCode::BuildString))
        .unwrap();
    assert_eq!(build.operand, Operand::Int(3));
}

#[test]
fn test_disassembly() {
    let program = compile_ok("1 + 2;");
    let listing = program.to_string();
    let lines: Vec<_> = listing.lines().collect();
    // Version header, then one line per instruction
    assert_eq!(lines.len(), program.len() + 1);
    assert!(lines[0].starts_with("; tern"));
    assert!(lines[1].starts_with("0000  ALLOC_STACK"));
    assert!(lines[4].contains("ADD_INT"));
}

#[test]
fn test_compiler_is_reusable() {
    let mut environment = HostEnvironment::new();
    builtins::install(&mut environment);
    let mut compiler = Compiler::new(&environment);
    let first = Parser::new("let a = 1; a;").parse_program().unwrap();
    let second = Parser::new("let b = 2; b;").parse_program().unwrap();
    let one = compiler.compile(&first).unwrap();
    let two = compiler.compile(&second).unwrap();
    assert_eq!(one.len(), two.len());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_error_type_mismatch() {
    assert!(matches!(
        compile_err("let x: int = \"a\";"),
        CompileError::TypeMismatch { .. }
    ));
    assert!(matches!(
        compile_err("1 + \"a\";"),
        CompileError::TypeMismatch { .. }
    ));
}

#[test]
fn test_error_unknown_identifier() {
    assert_eq!(
        compile_err("nope + 1;"),
        CompileError::UnknownIdentifier("nope".into())
    );
}

#[test]
fn test_error_duplicate_declaration() {
    assert_eq!(
        compile_err("let a = 1; { let a = 2; }"),
        CompileError::DuplicateDeclaration("a".into())
    );
    // The frame keeps the name after its block closes
    assert_eq!(
        compile_err("{ let a = 1; } { let a = 2; }"),
        CompileError::DuplicateDeclaration("a".into())
    );
    assert_eq!(
        compile_err("function f() { { let a = 1; } { let a = 2; return a; } }"),
        CompileError::DuplicateDeclaration("a".into())
    );
    // A function body starts a fresh frame
    compile_ok("let a = 1; function f() { let a = 2; return a; }");
}

#[test]
fn test_error_assign_to_constant() {
    assert_eq!(
        compile_err("const c = 1; c = 2;"),
        CompileError::AssignToConstant("c".into())
    );
    assert_eq!(
        compile_err("const c = 1; c++;"),
        CompileError::AssignToConstant("c".into())
    );
    assert_eq!(
        compile_err("math.pi = 3;"),
        CompileError::AssignToConstant("math".into())
    );
    assert_eq!(
        compile_err("math.pi--;"),
        CompileError::AssignToConstant("math".into())
    );
    // Members of a const local object stay writable
    compile_ok("const p = {x: 1}; p.x = 2;");
}

#[test]
fn test_error_arity_mismatch() {
    assert_eq!(
        compile_err("function f(a) { return a; } f();"),
        CompileError::ArityMismatch {
            name: "f".into(),
            expected: 1,
            found: 0,
        }
    );
}

#[test]
fn test_error_break_outside_loop() {
    assert_eq!(
        compile_err("break;"),
        CompileError::InvalidBreakLevel { level: 1, depth: 0 }
    );
    assert_eq!(
        compile_err("while (true) { break 2; }"),
        CompileError::InvalidBreakLevel { level: 2, depth: 1 }
    );
}

#[test]
fn test_error_loop_without_condition() {
    assert_eq!(
        compile_err("for (;;) { }"),
        CompileError::MissingLoopClause("condition")
    );
}

#[test]
fn test_error_void_used_as_value() {
    assert_eq!(
        compile_err("let y = 0; let z = (y = 1);"),
        CompileError::NoValue("initializer of 'z'".into())
    );
}

#[test]
fn test_error_unknown_type() {
    assert_eq!(
        compile_err("let w: widget = 1;"),
        CompileError::UnknownType("widget".into())
    );
}

#[test]
fn test_error_capture_of_enclosing_local() {
    assert_eq!(
        compile_err("function outer() { let a = 1; function inner() { return a; } return 0; }"),
        CompileError::UnsupportedCapture("a".into())
    );
}

#[test]
fn test_error_invalid_assignment_target() {
    assert_eq!(
        compile_err("1 = 2;"),
        CompileError::InvalidAssignmentTarget
    );
}

#[test]
fn test_error_unknown_operator() {
    assert!(matches!(
        compile_err("!1;"),
        CompileError::UnknownOperator(_)
    ));
}
