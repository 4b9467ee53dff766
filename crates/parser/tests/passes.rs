//! Pipeline tests: name resolution, desugaring, flattening and the
//! invariants the passes guarantee.

use std::collections::HashSet;

use ozboot_parser::assemble::merge_base_functors;
use ozboot_parser::ast::*;
use ozboot_parser::symtab::SymbolKind;
use ozboot_parser::{
    parse_expression, parse_statement, run_pipeline, BuiltinRegistry, Program,
};

fn test_registry() -> BuiltinRegistry {
    let mut registry = BuiltinRegistry::new();
    registry
        .load_str(include_str!("fixtures/Value-builtin.json"))
        .unwrap();
    registry
        .load_str(include_str!("fixtures/Number-builtin.json"))
        .unwrap();
    registry
        .load_str(include_str!("fixtures/Float-builtin.json"))
        .unwrap();
    registry
        .load_str(include_str!("fixtures/Thread-builtin.json"))
        .unwrap();
    registry
}

fn compile(source: &str) -> Program {
    let mut program = Program::new(test_registry());
    let code = parse_statement(source, "T.oz", &HashSet::new()).unwrap();
    program.raw_code = Some(code);
    run_pipeline(&mut program).unwrap();
    program
}

fn compile_err(source: &str) -> Program {
    let mut program = Program::new(test_registry());
    let code = parse_statement(source, "T.oz", &HashSet::new()).unwrap();
    program.raw_code = Some(code);
    assert!(run_pipeline(&mut program).is_err());
    program
}

/// Walk a flat statement, asserting post-pipeline shape.
fn check_flat_stmt(program: &Program, stmt: &Statement) {
    match stmt {
        Statement::Compound(s) => {
            for child in &s.statements {
                check_flat_stmt(program, child);
            }
        }
        Statement::Local(s) => check_flat_stmt(program, &s.body),
        Statement::Bind(s) => {
            assert!(s.left.is_simple(), "bind target must be flat");
            check_flat_expr(program, &s.right);
        }
        Statement::Call(s) => {
            assert!(
                s.callee.is_simple(),
                "call target must be a variable or constant"
            );
            for arg in &s.args {
                assert!(arg.is_simple(), "call arguments must be flat");
            }
        }
        Statement::If(s) => {
            assert!(s.condition.is_simple());
            check_flat_stmt(program, &s.then_body);
            check_flat_stmt(program, &s.else_body);
        }
        Statement::Try(s) => {
            check_flat_stmt(program, &s.body);
            check_flat_stmt(program, &s.catch_body);
        }
        Statement::Raise(s) => assert!(s.value.is_simple()),
        Statement::Skip(_) => {}
        other => panic!("unexpected statement after the pipeline: {:?}", other),
    }
}

fn check_flat_expr(program: &Program, expr: &Expression) {
    match expr {
        Expression::Variable(_) | Expression::Constant(_) => {}
        Expression::Record(e) => {
            for field in &e.fields {
                assert!(
                    field.feature.as_ref().is_some_and(|f| f.as_constant().is_some()),
                    "record features must be constant"
                );
                assert!(field.value.is_simple(), "record fields must be flat");
            }
        }
        Expression::CreateAbstraction(e) => {
            for captured in &e.captured {
                assert!(captured.as_variable().is_some());
            }
            // No nested procedure expressions survive: the referenced
            // abstraction has its own flat body.
            let abs = program.abstraction(e.abs);
            check_flat_stmt(program, abs.body.as_ref().expect("hoisted body"));
        }
        other => panic!("unexpected expression after the pipeline: {:?}", other),
    }
}

#[test]
fn test_every_variable_symbol_has_an_owner() {
    let program = compile(
        "local P in proc {P X} local Q T in proc {Q R} R = X end {Q T} end end {P 42} end",
    );
    for (_, symbol) in program.symbols.iter() {
        match symbol.kind {
            SymbolKind::Variable(_) => {
                assert!(symbol.owner.is_some(), "{} has no owner", symbol.name)
            }
            SymbolKind::Builtin(_) => assert!(symbol.owner.is_none()),
        }
    }
}

#[test]
fn test_symbol_ids_are_pairwise_distinct() {
    let program = compile("local X Y in X = 1 Y = 2 end");
    let ids: HashSet<_> = program.symbols.iter().map(|(id, _)| id).collect();
    assert_eq!(ids.len(), program.symbols.len());
}

#[test]
fn test_flattened_bodies_contain_no_nested_abstractions() {
    let program = compile(
        "local P in proc {P X} local Q T in proc {Q R} R = X end {Q T} end end {P 42} end",
    );
    for abs in program.code_abstractions() {
        check_flat_stmt(&program, abs.body.as_ref().expect("flat body"));
    }
    assert!(program.raw_code.is_none());
}

#[test]
fn test_unnester_produces_flat_operands() {
    let program = compile(
        "local P R in proc {P A B C} skip end {P 1 + 2 f(3 * 4) 7} R = g(x:5 y:6 + 1) end",
    );
    for abs in program.code_abstractions() {
        check_flat_stmt(&program, abs.body.as_ref().expect("flat body"));
    }
}

#[test]
fn test_synthetic_temporaries_are_distinct() {
    let program = compile("local P in proc {P A B} skip end {P 1 + 2 3 + 4} end");
    let synthetics: Vec<_> = program
        .symbols
        .iter()
        .filter(|(_, s)| s.flags().synthetic && s.name.starts_with("x$"))
        .collect();
    assert!(synthetics.len() >= 2);
    let names: HashSet<_> = synthetics.iter().map(|(_, s)| s.name.as_str()).collect();
    assert_eq!(names.len(), synthetics.len(), "synthetic names are unique");
}

#[test]
fn test_closure_capture_is_recorded_in_first_reference_order() {
    let program = compile(
        "local P in proc {P X Y} local Q T in proc {Q R} R = Y + X end {Q T} end end {P 1 2} end",
    );
    let q = program
        .abstractions
        .iter()
        .find(|abs| abs.name == "Q")
        .expect("Q was hoisted");
    let globals: Vec<_> = q
        .globals
        .iter()
        .map(|&id| program.symbol(id).name.clone())
        .collect();
    assert_eq!(globals, ["Y", "X"], "first-reference order");
    for &id in &q.globals {
        assert!(program.symbol(id).is_captured());
    }
}

#[test]
fn test_transitive_capture_reaches_the_middle_abstraction() {
    let program = compile(
        "local P in \
           proc {P X} \
              local Q in \
                 proc {Q} \
                    local R T in proc {R S} S = X end {R T} end \
                 end \
                 {Q} \
              end \
           end \
           {P 1} \
        end",
    );
    let q = program
        .abstractions
        .iter()
        .find(|abs| abs.name == "Q")
        .expect("Q was hoisted");
    let x: Vec<_> = q
        .globals
        .iter()
        .map(|&id| program.symbol(id).name.clone())
        .collect();
    assert_eq!(x, ["X"], "Q provides X to R even without using it itself");
}

#[test]
fn test_unresolved_variable_is_reported_with_position() {
    let program = compile_err("local X in X = Nope end");
    let messages: Vec<_> = program
        .errors
        .iter()
        .map(|d| d.message.clone())
        .collect();
    assert!(messages.iter().any(|m| m.contains("unresolved variable Nope")));
    let diagnostic = program.errors.iter().next().unwrap();
    assert_eq!(diagnostic.pos.file.as_ref(), "T.oz");
    assert!(diagnostic.pos.line >= 1);
}

#[test]
fn test_duplicate_declaration_is_reported() {
    let program = compile_err("local X X in X = 1 end");
    assert!(program
        .errors
        .iter()
        .any(|d| d.message.contains("duplicate declaration of X")));
}

#[test]
fn test_builtin_arity_mismatch_is_reported() {
    // Value.'.' takes two inputs and one output; a direct one-argument
    // call of it must be rejected.
    let mut program = Program::new(test_registry());
    let pos = Pos::none();
    let dot = program.well_known("Value", ".", &pos).unwrap();
    let x = program.new_local(program.top_level, "X", pos.clone());
    program.raw_code = Some(build::call_stmt(
        build::var(dot, pos.clone()),
        vec![build::var(x, pos.clone())],
        pos,
    ));

    assert!(run_pipeline(&mut program).is_err());
    assert!(program
        .errors
        .iter()
        .any(|d| d.message.contains("expects 3 arguments")));
}

#[test]
fn test_base_declarations_resolve_through_the_base_environment() {
    let mut program = Program::new(test_registry());
    program.base_declarations.insert("Show".to_string());
    let code = parse_statement("{Show 42}", "T.oz", &HashSet::new()).unwrap();
    program.raw_code = Some(code);
    run_pipeline(&mut program).unwrap();

    // The top level captures the base environment to reach Show.
    let top = program.abstraction(program.top_level);
    assert!(top.globals.contains(&program.base_env_symbol));
}

#[test]
fn test_case_compiles_to_tests_and_binds() {
    let program = compile(
        "local X Y in \
           X = point(x:1 y:2) \
           case X of point(x:A y:B) then Y = A + B \
           [] nil then Y = 0 \
           else Y = 1 end \
        end",
    );
    // All matches are gone; the flat-shape checker would have panicked on
    // any survivor.
    for abs in program.code_abstractions() {
        check_flat_stmt(&program, abs.body.as_ref().expect("flat body"));
    }
}

#[test]
fn test_match_without_else_raises() {
    let program = compile("local X in X = 1 case X of 2 then skip end end");
    let top = program.abstraction(program.top_level);

    fn contains_raise(stmt: &Statement) -> bool {
        match stmt {
            Statement::Raise(s) => {
                s.value.as_constant() == Some(&OzValue::atom("matchFailure"))
            }
            Statement::Compound(s) => s.statements.iter().any(contains_raise),
            Statement::Local(s) => contains_raise(&s.body),
            Statement::If(s) => contains_raise(&s.then_body) || contains_raise(&s.else_body),
            Statement::Try(s) => contains_raise(&s.body) || contains_raise(&s.catch_body),
            _ => false,
        }
    }
    assert!(contains_raise(top.body.as_ref().expect("flat body")));
}

#[test]
fn test_constant_folding_reduces_operator_chains() {
    let program = compile("local X in X = 2 + 3 * 4 end");
    let top = program.abstraction(program.top_level);

    fn find_bind_constant(stmt: &Statement) -> Option<OzValue> {
        match stmt {
            Statement::Bind(s) => s.right.as_constant().cloned(),
            Statement::Compound(s) => s.statements.iter().find_map(find_bind_constant),
            Statement::Local(s) => find_bind_constant(&s.body),
            _ => None,
        }
    }
    assert_eq!(
        find_bind_constant(top.body.as_ref().expect("flat body")),
        Some(OzValue::Int(14))
    );
}

#[test]
fn test_merge_base_functors_concatenates_disjoint_exports() {
    let defines = HashSet::new();
    let a = parse_expression(
        "functor export 'A':A define A = 1 end",
        "A.oz",
        &defines,
    )
    .unwrap();
    let b = parse_expression(
        "functor export 'B':B define B = 2 end",
        "B.oz",
        &defines,
    )
    .unwrap();
    let (a, b) = match (a, b) {
        (Expression::Functor(a), Expression::Functor(b)) => (a, b),
        other => panic!("unexpected parse {:?}", other),
    };

    let merged = merge_base_functors(vec![a, b]);
    let features: Vec<_> = merged
        .exports
        .iter()
        .map(|export| export.feature.clone())
        .collect();
    assert_eq!(features, [OzValue::atom("A"), OzValue::atom("B")]);
    assert!(merged.define.is_some());
}

#[test]
fn test_base_env_assembly_fills_base_declarations() {
    let defines = HashSet::new();
    let sources = [
        "functor import BootValue at 'x-oz://boot/Value' export 'A':A define A = 1 end",
        "functor export 'B':B define B = 2 end",
    ];
    let mut functors = Vec::new();
    for (index, source) in sources.iter().enumerate() {
        let parsed =
            parse_expression(source, &format!("Base{}.oz", index), &defines).unwrap();
        match parsed {
            Expression::Functor(functor) => functors.push(functor),
            other => panic!("unexpected parse {:?}", other),
        }
    }

    let mut program = Program::new(test_registry());
    ozboot_parser::assemble::assemble_base_env(&mut program, functors);
    assert!(!program.has_errors());
    assert!(program.is_base_environment);
    assert!(program.base_declarations.contains("A"));
    assert!(program.base_declarations.contains("B"));

    run_pipeline(&mut program).unwrap();
    for abs in program.code_abstractions() {
        check_flat_stmt(&program, abs.body.as_ref().expect("flat body"));
    }
}

#[test]
fn test_for_loop_lowers_to_a_recursive_procedure() {
    let program = compile("local N in N = 3 for I in 1..N do skip end end");
    let has_for_abs = program.abstractions.iter().any(|abs| abs.name == "for");
    assert!(has_for_abs, "the loop body was hoisted into an abstraction");
    for abs in program.code_abstractions() {
        check_flat_stmt(&program, abs.body.as_ref().expect("flat body"));
    }
}

#[test]
fn test_thread_lowers_to_thread_create() {
    let program = compile("local X in thread X = 1 end end");
    let has_thread_abs = program.abstractions.iter().any(|abs| abs.name == "thread");
    assert!(has_thread_abs);
    for abs in program.code_abstractions() {
        check_flat_stmt(&program, abs.body.as_ref().expect("flat body"));
    }
}
