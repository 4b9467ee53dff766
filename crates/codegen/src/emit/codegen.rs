//! Code generation.
//!
//! Walks the flat body of every abstraction and emits opcodes into its code
//! area. By this point the tree is in A-normal form: operands are variables
//! or constants, records and closure allocations appear only on the right
//! of a bind, and control flow is conditionals, calls, try/raise and
//! sequencing.
//!
//! Register discipline: formals and locals live in Y registers, captured
//! variables in G registers indexed by the global list, constants in K
//! registers. X registers are statement-scoped scratch. A bind stores
//! through X; stores to captured variables unify instead of moving, so
//! closures sharing the variable observe the binding.

use indexmap::IndexMap;

use ozboot_parser::ast::*;
use ozboot_parser::symtab::{Abstraction, SymbolKind};
use ozboot_parser::{AbsId, Program, SymbolId};

use crate::bytecode::{feature_rank, CodeArea, ConstantKey, OpCode, RecordArity, Register};
use crate::error::{CodegenError, CodegenResult};

/// The code areas of a compiled program, in abstraction order.
#[derive(Debug, Default)]
pub struct CodeStore {
    areas: IndexMap<AbsId, CodeArea>,
}

impl CodeStore {
    pub fn new() -> Self {
        CodeStore::default()
    }

    pub fn insert(&mut self, area: CodeArea) {
        self.areas.insert(area.abs, area);
    }

    pub fn get(&self, abs: AbsId) -> Option<&CodeArea> {
        self.areas.get(&abs)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeArea> {
        self.areas.values()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

/// Generate a code area for every abstraction with a body.
pub fn compile(program: &Program) -> CodegenResult<CodeStore> {
    let mut store = CodeStore::new();
    let codegen = CodeGen { program };
    for abs in program.code_abstractions() {
        store.insert(codegen.generate(abs)?);
    }
    Ok(store)
}

struct CodeGen<'p> {
    program: &'p Program,
}

impl CodeGen<'_> {
    fn generate(&self, abs: &Abstraction) -> CodegenResult<CodeArea> {
        let mut area = CodeArea::new(abs.id, abs.name.clone(), abs.arity());

        // The Y frame size is only known after the walk.
        let allocate = area.emit_hole(OpCode::AllocateY { count: 0 }.size());

        // Arguments arrive in X0..Xn-1 and settle into their Y homes.
        for (index, &formal) in abs.formals.iter().enumerate() {
            let y = area.register_for_local(formal);
            area.emit(OpCode::MoveXY {
                src: index as u16,
                dst: y,
            });
        }

        let body = abs
            .body
            .as_ref()
            .ok_or_else(|| CodegenError::internal("abstraction has no body"))?;
        self.gen_stmt(&mut area, body)?;

        area.emit(OpCode::DeallocateY);
        area.emit(OpCode::Return);
        let count = area.y_count();
        area.fill(allocate, OpCode::AllocateY { count })?;
        area.finish()?;
        Ok(area)
    }

    fn gen_stmt(&self, area: &mut CodeArea, stmt: &Statement) -> CodegenResult<()> {
        area.reset_x();
        match stmt {
            Statement::Compound(s) => {
                for child in &s.statements {
                    self.gen_stmt(area, child)?;
                }
                Ok(())
            }
            Statement::Local(s) => {
                for &symbol in &s.declarations {
                    let y = area.register_for_local(symbol);
                    area.emit(OpCode::CreateVarY { dst: y });
                }
                self.gen_stmt(area, &s.body)
            }
            Statement::Skip(_) => Ok(()),
            Statement::Bind(s) => {
                let target = s.left.as_variable().ok_or_else(|| {
                    CodegenError::internal("bind target is not a variable")
                })?;
                let x = self.load(area, &s.right)?;
                self.store(area, target, x)
            }
            Statement::Call(s) => self.gen_call(area, s),
            Statement::If(s) => self.gen_if(area, s),
            Statement::Try(s) => self.gen_try(area, s),
            Statement::Raise(s) => {
                self.load_into(area, &s.value, 0)?;
                area.reserve_x(1);
                area.emit(OpCode::RaiseX { value: 0 });
                Ok(())
            }
            other => Err(CodegenError::internal(format!(
                "unexpected statement at {} after flattening",
                other.pos()
            ))),
        }
    }

    fn gen_call(&self, area: &mut CodeArea, s: &CallStatement) -> CodegenResult<()> {
        for (index, arg) in s.args.iter().enumerate() {
            self.load_into(area, arg, index as u16)?;
        }
        area.reserve_x(s.args.len() as u16);
        let arity = s.args.len() as u16;

        let op = match &s.callee {
            Expression::Variable(e) => match self.register_of(area, e.symbol)? {
                Register::Y(target) => OpCode::CallY { target, arity },
                Register::G(target) => OpCode::CallG { target, arity },
                Register::K(target) => OpCode::CallK { target, arity },
                Register::X(target) => OpCode::CallX { target, arity },
            },
            Expression::Constant(e) => {
                let k = area.register_for_constant(ConstantKey::Value(e.value.clone()));
                OpCode::CallK {
                    target: k.index(),
                    arity,
                }
            }
            other => {
                return Err(CodegenError::internal(format!(
                    "call target at {} is not flat",
                    other.pos()
                )));
            }
        };
        area.emit(op);
        Ok(())
    }

    fn gen_if(&self, area: &mut CodeArea, s: &IfStatement) -> CodegenResult<()> {
        let cond = self.load(area, &s.condition)?;
        let branch_false = area.emit_hole(OpCode::BranchIfFalseX { cond: 0, offset: 0 }.size());

        let (then_size, result) = area.counting(|area| self.gen_stmt(area, &s.then_body));
        result?;
        let branch_end = area.emit_hole(OpCode::Branch { offset: 0 }.size());
        let branch_size = OpCode::Branch { offset: 0 }.size();
        area.fill(
            branch_false,
            OpCode::BranchIfFalseX {
                cond,
                offset: (then_size + branch_size) as i32,
            },
        )?;

        let (else_size, result) = area.counting(|area| self.gen_stmt(area, &s.else_body));
        result?;
        area.fill(
            branch_end,
            OpCode::Branch {
                offset: else_size as i32,
            },
        )
    }

    fn gen_try(&self, area: &mut CodeArea, s: &TryStatement) -> CodegenResult<()> {
        let setup = area.emit_hole(OpCode::SetupExceptionHandler { offset: 0 }.size());

        let (body_size, result) = area.counting(|area| -> CodegenResult<()> {
            self.gen_stmt(area, &s.body)?;
            area.emit(OpCode::PopExceptionHandler);
            Ok(())
        });
        result?;
        let branch_end = area.emit_hole(OpCode::Branch { offset: 0 }.size());
        let branch_size = OpCode::Branch { offset: 0 }.size();
        area.fill(
            setup,
            OpCode::SetupExceptionHandler {
                offset: (body_size + branch_size) as i32,
            },
        )?;

        // Handler: the exception value arrives in X0.
        let catch_symbol = s.catch_var.as_variable().ok_or_else(|| {
            CodegenError::internal("catch variable is not resolved")
        })?;
        let (handler_size, result) = area.counting(|area| -> CodegenResult<()> {
            area.reset_x();
            area.reserve_x(1);
            let y = area.register_for_local(catch_symbol);
            area.emit(OpCode::CreateVarY { dst: y });
            self.store(area, catch_symbol, 0)?;
            self.gen_stmt(area, &s.catch_body)
        });
        result?;
        area.fill(
            branch_end,
            OpCode::Branch {
                offset: handler_size as i32,
            },
        )
    }

    /// Load an expression into a fresh X register.
    fn load(&self, area: &mut CodeArea, expr: &Expression) -> CodegenResult<u16> {
        match expr {
            Expression::Variable(_) | Expression::Constant(_) => {
                let x = area.alloc_x();
                self.load_into(area, expr, x)?;
                Ok(x)
            }
            Expression::Record(e) => self.gen_record(area, e),
            Expression::CreateAbstraction(e) => self.gen_create_abstraction(area, e),
            other => Err(CodegenError::internal(format!(
                "expression at {} is not flat",
                other.pos()
            ))),
        }
    }

    /// Load a variable or constant into a specific X register.
    fn load_into(&self, area: &mut CodeArea, expr: &Expression, dst: u16) -> CodegenResult<()> {
        let op = match expr {
            Expression::Variable(e) => match self.register_of(area, e.symbol)? {
                Register::Y(src) => OpCode::MoveYX { src, dst },
                Register::G(src) => OpCode::MoveGX { src, dst },
                Register::K(src) => OpCode::MoveKX { src, dst },
                Register::X(src) => {
                    return Err(CodegenError::internal(format!(
                        "unexpected X source X{}",
                        src
                    )));
                }
            },
            Expression::Constant(e) => {
                let k = area.register_for_constant(ConstantKey::Value(e.value.clone()));
                OpCode::MoveKX {
                    src: k.index(),
                    dst,
                }
            }
            other => {
                return Err(CodegenError::internal(format!(
                    "operand at {} is not flat",
                    other.pos()
                )));
            }
        };
        area.emit(op);
        Ok(())
    }

    /// The home register of a symbol within this code area: Y for its own
    /// variables, G for captured ones, K for builtins.
    fn register_of(&self, area: &mut CodeArea, symbol: SymbolId) -> CodegenResult<Register> {
        let info = self.program.symbol(symbol);
        match &info.kind {
            SymbolKind::Builtin(id) => {
                Ok(area.register_for_constant(ConstantKey::Value(OzValue::Builtin(*id))))
            }
            SymbolKind::Variable(_) => {
                if info.owner == Some(area.abs) {
                    Ok(Register::Y(area.register_for_local(symbol)))
                } else {
                    let index = self
                        .program
                        .abstraction(area.abs)
                        .global_index(symbol)
                        .ok_or_else(|| {
                            CodegenError::internal(format!(
                                "variable {} is not a global of {}",
                                info.name, area.name
                            ))
                        })?;
                    Ok(Register::G(index as u16))
                }
            }
        }
    }

    /// Store X into a variable's home. Stores to formals and captured
    /// variables unify: their logic variable is shared with the caller or
    /// with a closure, and a register overwrite would sever that link.
    fn store(&self, area: &mut CodeArea, target: SymbolId, x: u16) -> CodegenResult<()> {
        let info = self.program.symbol(target);
        if !info.is_variable() {
            return Err(CodegenError::internal(format!(
                "cannot bind builtin {}",
                info.name
            )));
        }
        let op = match self.register_of(area, target)? {
            Register::Y(y) => {
                if info.is_captured() || info.flags().formal {
                    OpCode::UnifyXY { x, y }
                } else {
                    OpCode::MoveXY { src: x, dst: y }
                }
            }
            Register::G(g) => OpCode::UnifyXG { x, g },
            other => {
                return Err(CodegenError::internal(format!(
                    "unexpected store target {}",
                    other
                )));
            }
        };
        area.emit(op);
        Ok(())
    }

    /// Build a record or tuple: fields staged in X0..Xw-1 in canonical
    /// feature order, then one creation opcode.
    fn gen_record(&self, area: &mut CodeArea, e: &RecordExpr) -> CodegenResult<u16> {
        let label = e
            .label
            .as_constant()
            .ok_or_else(|| CodegenError::internal("record label is not a constant"))?
            .clone();

        let mut fields: Vec<(OzValue, &Expression)> = Vec::with_capacity(e.fields.len());
        for field in &e.fields {
            let feature = field
                .feature
                .as_ref()
                .and_then(|feature| feature.as_constant())
                .ok_or_else(|| CodegenError::internal("record feature is not a constant"))?;
            fields.push((feature.clone(), &field.value));
        }
        fields.sort_by_key(|(feature, _)| feature_rank(feature));

        for (index, (_, value)) in fields.iter().enumerate() {
            self.load_into(area, value, index as u16)?;
        }
        let width = fields.len() as u16;
        area.reserve_x(width);
        let dst = area.alloc_x();

        let arity = RecordArity::new(
            label.clone(),
            fields.into_iter().map(|(feature, _)| feature).collect(),
        );
        if arity.is_tuple() {
            let k = area.register_for_constant(ConstantKey::Value(label));
            area.emit(OpCode::CreateTupleX {
                label: k.index(),
                width,
                dst,
            });
        } else {
            let k = area.register_for_constant(ConstantKey::Arity(arity));
            area.emit(OpCode::CreateRecordX {
                arity: k.index(),
                width,
                dst,
            });
        }
        Ok(dst)
    }

    /// Allocate a closure: the child code area from the pool plus the
    /// captured variables' registers, in the child's global order.
    fn gen_create_abstraction(
        &self,
        area: &mut CodeArea,
        e: &CreateAbstractionExpr,
    ) -> CodegenResult<u16> {
        let body = area.register_for_constant(ConstantKey::CodeArea(e.abs));
        let arity = self.program.abstraction(e.abs).arity() as u16;

        let mut globals = Vec::with_capacity(e.captured.len());
        for captured in &e.captured {
            let symbol = captured.as_variable().ok_or_else(|| {
                CodegenError::internal("captured value is not a variable")
            })?;
            globals.push(self.register_of(area, symbol)?);
        }

        let dst = area.alloc_x();
        area.emit(OpCode::CreateAbstractionX {
            body: body.index(),
            arity,
            globals,
            dst,
        });
        Ok(dst)
    }
}
