//! Code generation tests: register allocation, constant pooling, closure
//! allocation and the shape of the emitted opcode streams.

use std::collections::HashSet;

use ozboot_codegen::{compile, ConstantKey, OpCode, Register};
use ozboot_parser::ast::OzValue;
use ozboot_parser::{parse_statement, run_pipeline, BuiltinRegistry, Program};

fn test_registry() -> BuiltinRegistry {
    let mut registry = BuiltinRegistry::new();
    registry
        .load_str(include_str!("../../parser/tests/fixtures/Value-builtin.json"))
        .unwrap();
    registry
        .load_str(include_str!("../../parser/tests/fixtures/Number-builtin.json"))
        .unwrap();
    registry
        .load_str(include_str!("../../parser/tests/fixtures/Float-builtin.json"))
        .unwrap();
    registry
        .load_str(include_str!("../../parser/tests/fixtures/Thread-builtin.json"))
        .unwrap();
    registry
}

fn compile_source(source: &str) -> (Program, ozboot_codegen::CodeStore) {
    let mut program = Program::new(test_registry());
    let code = parse_statement(source, "T.oz", &HashSet::new()).unwrap();
    program.raw_code = Some(code);
    run_pipeline(&mut program).unwrap();
    let store = compile(&program).unwrap();
    (program, store)
}

#[test]
fn test_constant_pool_shares_repeated_atoms() {
    let (program, store) = compile_source("local X Y in X = foo Y = foo end");
    let area = store.get(program.top_level).unwrap();
    let atoms = area
        .constants()
        .filter(|key| matches!(key, ConstantKey::Value(OzValue::Atom(name)) if name == "foo"))
        .count();
    assert_eq!(atoms, 1);
}

#[test]
fn test_constant_pool_keeps_first_use_order() {
    let (program, store) = compile_source("local X Y in X = foo Y = 1 end");
    let area = store.get(program.top_level).unwrap();
    let keys: Vec<_> = area.constants().collect();
    assert_eq!(keys[0], &ConstantKey::Value(OzValue::atom("foo")));
    assert_eq!(keys[1], &ConstantKey::Value(OzValue::Int(1)));
}

#[test]
fn test_x_count_covers_every_x_use() {
    let (_, store) = compile_source(
        "local P in proc {P A B C} local R in R = f(A B C) end end {P 1 2 3} end",
    );
    for area in store.iter() {
        let mut max = 0;
        for op in area.ops() {
            for register in op.registers() {
                if let Register::X(index) = register {
                    max = max.max(index + 1);
                }
            }
        }
        assert!(area.compute_x_count() >= max.max(1));
    }
}

#[test]
fn test_distinct_temporaries_get_distinct_y_registers() {
    // The two unnester temporaries for the argument expressions live in
    // different Y registers of the top level.
    let (program, store) = compile_source(
        "local P in proc {P A B} skip end {P f(1 2) f(3 4) } end",
    );
    let area = store.get(program.top_level).unwrap();
    let synthetics: Vec<_> = program
        .symbols
        .iter()
        .filter(|(_, s)| s.flags().synthetic && s.owner == Some(program.top_level))
        .map(|(id, _)| id)
        .collect();
    assert!(synthetics.len() >= 2);

    let mut seen = HashSet::new();
    for op in area.ops() {
        if let OpCode::CreateVarY { dst } = op {
            assert!(seen.insert(*dst), "Y{} created twice", dst);
        }
    }
    assert!(seen.len() >= 2);
}

#[test]
fn test_closure_allocation_passes_the_captured_register() {
    // Q captures the formal X of P; the allocation opcode must carry X's
    // Y register (the first formal settles into Y0).
    let (program, store) = compile_source(
        "local P in proc {P X} local Q T in proc {Q R} R = X end {Q T} end end {P 42} end",
    );

    let p = program
        .abstractions
        .iter()
        .find(|abs| abs.name == "P")
        .expect("P was hoisted");
    let q = program
        .abstractions
        .iter()
        .find(|abs| abs.name == "Q")
        .expect("Q was hoisted");
    assert_eq!(q.globals.len(), 1);

    let p_area = store.get(p.id).unwrap();
    let create = p_area
        .ops()
        .find_map(|op| match op {
            OpCode::CreateAbstractionX { body, globals, .. } => Some((body, globals)),
            _ => None,
        })
        .expect("P allocates the closure for Q");

    assert_eq!(create.1, &vec![Register::Y(0)]);

    // The referenced constant is Q's code area.
    let key = p_area
        .constants()
        .nth(*create.0 as usize)
        .expect("closure body constant");
    assert_eq!(key, &ConstantKey::CodeArea(q.id));
}

#[test]
fn test_captured_local_bindings_unify() {
    // X is captured by Q, so the binding X = 5 in P must unify, not move.
    let (program, store) = compile_source(
        "local P in \
           proc {P} \
              local X Q T in \
                 proc {Q R} R = X end \
                 X = 5 \
                 {Q T} \
              end \
           end \
           {P} \
        end",
    );
    let p = program
        .abstractions
        .iter()
        .find(|abs| abs.name == "P")
        .expect("P was hoisted");
    let p_area = store.get(p.id).unwrap();
    assert!(
        p_area
            .ops()
            .any(|op| matches!(op, OpCode::UnifyXY { .. })),
        "captured binding compiles to a unify"
    );
}

#[test]
fn test_plain_local_bindings_move() {
    let (program, store) = compile_source("local X in X = 5 end");
    let area = store.get(program.top_level).unwrap();
    assert!(area.ops().any(|op| matches!(op, OpCode::MoveXY { .. })));
    assert!(!area.ops().any(|op| matches!(op, OpCode::UnifyXY { .. })));
}

#[test]
fn test_tuple_and_record_creation() {
    let (program, store) = compile_source(
        "local T R in T = pair(1 2) R = point(x:1 y:2) end",
    );
    let area = store.get(program.top_level).unwrap();

    let tuple = area
        .ops()
        .find_map(|op| match op {
            OpCode::CreateTupleX { label, width, .. } => Some((*label, *width)),
            _ => None,
        })
        .expect("pair(1 2) is a tuple");
    assert_eq!(tuple.1, 2);
    let label = area.constants().nth(tuple.0 as usize).unwrap();
    assert_eq!(label, &ConstantKey::Value(OzValue::atom("pair")));

    let record = area
        .ops()
        .find_map(|op| match op {
            OpCode::CreateRecordX { arity, width, .. } => Some((*arity, *width)),
            _ => None,
        })
        .expect("point(x:_ y:_) is a record");
    assert_eq!(record.1, 2);
    match area.constants().nth(record.0 as usize).unwrap() {
        ConstantKey::Arity(arity) => {
            assert_eq!(arity.label, OzValue::atom("point"));
            assert_eq!(
                arity.features,
                vec![OzValue::atom("x"), OzValue::atom("y")]
            );
        }
        other => panic!("unexpected constant {:?}", other),
    };
}

#[test]
fn test_formals_settle_into_y_registers() {
    let (program, store) = compile_source(
        "local P in proc {P A B} local X in X = A end end {P 1 2} end",
    );
    let p = program
        .abstractions
        .iter()
        .find(|abs| abs.name == "P")
        .expect("P was hoisted");
    let area = store.get(p.id).unwrap();

    let prologue: Vec<_> = area
        .ops()
        .take_while(|op| !matches!(op, OpCode::CreateVarY { .. }))
        .filter_map(|op| match op {
            OpCode::MoveXY { src, dst } => Some((*src, *dst)),
            _ => None,
        })
        .collect();
    assert_eq!(prologue, vec![(0, 0), (1, 1)]);
}

#[test]
fn test_frame_protocol() {
    let (program, store) = compile_source("local X in X = 1 end");
    let area = store.get(program.top_level).unwrap();
    let ops: Vec<_> = area.ops().collect();

    assert!(matches!(ops[0], OpCode::AllocateY { count } if *count >= 1));
    assert!(matches!(ops[ops.len() - 2], OpCode::DeallocateY));
    assert!(matches!(ops[ops.len() - 1], OpCode::Return));
}

#[test]
fn test_conditional_branches_are_backpatched() {
    let (program, store) = compile_source(
        "local X Y in X = true if X then Y = 1 else Y = 2 end end",
    );
    let area = store.get(program.top_level).unwrap();

    let mut offset_after_branch = None;
    let mut position = 0usize;
    let mut targets = Vec::new();
    for op in area.ops() {
        position += op.size();
        match op {
            OpCode::BranchIfFalseX { offset, .. } | OpCode::Branch { offset } => {
                offset_after_branch = Some(*offset);
                targets.push(position + *offset as usize);
            }
            _ => {}
        }
    }
    assert!(offset_after_branch.is_some(), "conditionals emit branches");
    let total = area.code_size();
    for target in targets {
        assert!(target <= total, "jump target stays inside the code area");
    }
}

#[test]
fn test_try_emits_handler_region() {
    let (program, store) = compile_source(
        "local X in try X = 1 catch E then X = E end end",
    );
    let area = store.get(program.top_level).unwrap();
    let ops: Vec<_> = area.ops().collect();

    let setup = ops
        .iter()
        .position(|op| matches!(op, OpCode::SetupExceptionHandler { .. }))
        .expect("setup opcode");
    let pop = ops
        .iter()
        .position(|op| matches!(op, OpCode::PopExceptionHandler))
        .expect("pop opcode");
    assert!(setup < pop);
}

#[test]
fn test_raise_goes_through_x0() {
    let (program, store) = compile_source("raise oops end");
    let area = store.get(program.top_level).unwrap();
    assert!(area
        .ops()
        .any(|op| matches!(op, OpCode::RaiseX { value: 0 })));
}

#[test]
fn test_builtin_calls_use_the_constant_pool() {
    let (program, store) = compile_source("local X in X = 1 + 2 end");
    // Folded away: the pool only holds the result.
    let area = store.get(program.top_level).unwrap();
    assert!(area
        .constants()
        .any(|key| key == &ConstantKey::Value(OzValue::Int(3))));

    let (program, store) = compile_source("local X Y in X = f(1) Y = X.1 end");
    let area = store.get(program.top_level).unwrap();
    let has_builtin = area
        .constants()
        .any(|key| matches!(key, ConstantKey::Value(OzValue::Builtin(_))));
    assert!(has_builtin, "the dot builtin lands in the pool");
    assert!(area.ops().any(|op| matches!(op, OpCode::CallK { .. })));
}
