mod common;

use common::{run, run_main, Value};
use marsh::ast::Program;
use marsh::ir::{InstrKind, Terminator};
use marsh::{compile, lexer, parser, CompileError, LowerError, TokenKind};

fn wrap_in_main(body: &str) -> String {
    format!("fn main() -> int {{ {} }}", body)
}

fn allocas(module: &marsh::Module, function: usize) -> usize {
    module.functions[function]
        .blocks
        .iter()
        .flat_map(|b| &b.instructions)
        .filter(|i| matches!(i.kind, InstrKind::Alloca(_)))
        .count()
}

#[test]
fn range_literal_splits_into_three_tokens() {
    let kinds: Vec<TokenKind> = lexer::lex("12..34").iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Int,
            TokenKind::RangeSeparator,
            TokenKind::Int,
            TokenKind::Eof
        ]
    );
}

#[test]
fn lexer_stays_at_eof() {
    let mut lexer = marsh::Lexer::new("x");
    assert_eq!(lexer.next_token().kind, TokenKind::Ident);
    for _ in 0..5 {
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }
}

#[test]
fn precedence_and_grouping() {
    assert_eq!(run_main(&wrap_in_main("return 2 + 3 * 4;")), Value::Int(14));
    assert_eq!(run_main(&wrap_in_main("return (2 + 3) * 4;")), Value::Int(20));
    assert_eq!(run_main(&wrap_in_main("return 20 - 6 - 4;")), Value::Int(10));
    assert_eq!(run_main(&wrap_in_main("return 17 % 5 * 2;")), Value::Int(4));
}

#[test]
fn bitwise_operators() {
    assert_eq!(run_main(&wrap_in_main("return ~0;")), Value::Int(-1));
    assert_eq!(run_main(&wrap_in_main("return 6 ^ 3;")), Value::Int(5));
    assert_eq!(run_main(&wrap_in_main("return 6 & 3 | 8;")), Value::Int(10));
}

#[test]
fn for_loop_runs_exactly_range_length() {
    let source = wrap_in_main("let n: int = 0; for i in 0..3 { n = n + 1; } return n;");
    let module = compile(&source).unwrap();
    let result = run(&module, "main").unwrap();

    assert_eq!(result.value, Value::Int(3));
    assert_eq!(result.visits_of(&module.functions[0], "for.body"), 3);
}

#[test]
fn for_counter_ends_at_range_end() {
    let module = compile(&wrap_in_main("for i in 0..3 { } return 0;")).unwrap();
    assert_eq!(allocas(&module, 0), 1);

    let result = run(&module, "main").unwrap();
    assert_eq!(result.slots, vec![Some(Value::Int(3))]);
}

#[test]
fn for_loop_sums_its_counter() {
    let source = wrap_in_main("let sum: int = 0; for i in 2..5 { sum = sum + i; } return sum;");
    assert_eq!(run_main(&source), Value::Int(9));
}

#[test]
fn empty_range_skips_body() {
    let source = wrap_in_main("let n: int = 0; for i in 4..4 { n = n + 1; } return n;");
    let module = compile(&source).unwrap();
    let result = run(&module, "main").unwrap();
    assert_eq!(result.value, Value::Int(0));
    assert_eq!(result.visits_of(&module.functions[0], "for.body"), 0);
}

#[test]
fn while_loop_retests_condition() {
    let source = wrap_in_main("let i: int = 0; while i < 4 { i = i + 1; } return i;");
    let module = compile(&source).unwrap();
    let result = run(&module, "main").unwrap();
    assert_eq!(result.value, Value::Int(4));
    assert_eq!(result.visits_of(&module.functions[0], "while.body"), 4);

    let body = module.functions[0]
        .blocks
        .iter()
        .find(|b| b.label == "while.body")
        .unwrap();
    let Some(Terminator::CondBr {
        then_block,
        else_block,
        ..
    }) = body.terminator
    else {
        panic!("loop body must end in a conditional branch");
    };
    assert_eq!(then_block, body.id);
    assert_ne!(else_block, body.id);
}

#[test]
fn while_loop_with_zero_iterations() {
    let source = wrap_in_main("let i: int = 5; while i < 3 { i = i + 1; } return i;");
    let module = compile(&source).unwrap();
    let result = run(&module, "main").unwrap();
    assert_eq!(result.value, Value::Int(5));
    assert_eq!(result.visits_of(&module.functions[0], "while.body"), 0);
}

#[test]
fn if_without_else_branches_two_ways() {
    let source = "fn pick() -> int { let x: int = 1; if false { x = 2; } return x; }
                  fn main() -> int { let x: int = 1; if true { x = 2; } return x; }";
    let module = compile(source).unwrap();

    let pick = &module.functions[0];
    assert_eq!(pick.blocks.len(), 3);
    assert!(matches!(
        pick.blocks[0].terminator,
        Some(Terminator::CondBr { then_block, else_block, .. })
            if then_block == pick.blocks[1].id && else_block == pick.blocks[2].id
    ));

    assert_eq!(run(&module, "pick").unwrap().value, Value::Int(1));
    assert_eq!(run(&module, "main").unwrap().value, Value::Int(2));
}

#[test]
fn if_else_picks_one_branch() {
    let source = wrap_in_main(
        "let x: int = 7; let r: int = 0; if x % 2 == 0 { r = 1; } else { r = 2; } return r;",
    );
    assert_eq!(run_main(&source), Value::Int(2));
}

#[test]
fn early_return_from_loop() {
    let source = wrap_in_main(
        "let i: int = 0; while true { if i == 5 { return i * 10; } i = i + 1; } return 0;",
    );
    assert_eq!(run_main(&source), Value::Int(50));
}

#[test]
fn reassignment_reuses_storage() {
    let source = wrap_in_main("let x: int = 1; x = 2; x = x * 10; return x;");
    let module = compile(&source).unwrap();
    assert_eq!(allocas(&module, 0), 1);

    let result = run(&module, "main").unwrap();
    assert_eq!(result.value, Value::Int(20));
    assert_eq!(result.slots, vec![Some(Value::Int(20))]);
}

#[test]
fn undefined_identifier_is_reported() {
    let err = compile(&wrap_in_main("return missing + 1;")).unwrap_err();
    assert_eq!(
        err,
        CompileError::Lower(LowerError::UndefinedVariable {
            name: "missing".into()
        })
    );
}

#[test]
fn calls_between_functions() {
    let source = "fn seven() -> int { return 7; }
                  fn main() -> int { let a: int = seven(); return a * seven(); }";
    assert_eq!(run_main(source), Value::Int(49));
}

#[test]
fn float_and_bool_values() {
    let source = "fn half() -> float { return 3.0 / 2.0; }
                  fn main() -> int { let ok: bool = half() > 1.25; if ok { return 1; } return 0; }";
    let module = compile(source).unwrap();
    assert_eq!(run(&module, "half").unwrap().value, Value::Float(1.5));
    assert_eq!(run(&module, "main").unwrap().value, Value::Int(1));
}

#[test]
fn diagnostics_block_code_generation() {
    let err = compile("fn main() -> int { let x: int = ; return 0; }").unwrap_err();
    let CompileError::Parse(errors) = err else {
        panic!("expected parse diagnostics");
    };
    assert!(!errors.is_empty());
}

#[test]
fn ast_export_round_trip() {
    let source = "fn main() -> int {
        let total: int = 0;
        for i in 0..10 { if i % 2 == 0 { total = total + i; } else { total = total - 1; } }
        while total > 100 { total = total / 2; }
        return ~total & 255;
    }";
    let (program, errors) = parser::parse(source);
    assert!(errors.is_empty());

    let json = program.to_json().unwrap();
    let back = Program::from_json(&json).unwrap();
    assert_eq!(back, program);
    assert_eq!(back.to_json().unwrap(), json);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["statements"][0]["type"], "FunctionDecl");
    assert_eq!(value["statements"][0]["body"]["statements"][1]["type"], "For");
}

#[test]
fn ir_listing_names_functions() {
    let module = compile(&wrap_in_main("return 1;")).unwrap();
    let text = module.to_string();
    assert!(text.starts_with("; module main_module"));
    assert!(text.contains("fn @main() -> i32 {"));
    assert!(text.contains("ret %"));
}

#[test]
fn nested_function_cannot_reach_enclosing_locals() {
    let source = "fn outer() -> int { let a: int = 1; fn inner() -> int { return a; } return inner(); }";
    let err = compile(source).unwrap_err();
    assert_eq!(
        err,
        CompileError::Lower(LowerError::CapturedVariable {
            name: "a".into(),
            function: "inner".into(),
        })
    );
}

#[test]
fn function_names_are_unique() {
    let source = "fn f() -> int { return 1; } fn f() -> int { return 2; } fn main() -> int { return f(); }";
    let err = compile(source).unwrap_err();
    assert_eq!(
        err,
        CompileError::Lower(LowerError::DuplicateFunction { name: "f".into() })
    );
}

#[test]
fn unreachable_statements_are_still_checked() {
    let source = "fn main() -> int { return 1; let x: bool = nope + 2.5; return undefined_thing(); }";
    let err = compile(source).unwrap_err();
    assert_eq!(
        err,
        CompileError::Lower(LowerError::UndefinedVariable {
            name: "nope".into()
        })
    );

    let module = compile(&wrap_in_main("return 7; return 8;")).unwrap();
    assert_eq!(run(&module, "main").unwrap().value, Value::Int(7));
}
