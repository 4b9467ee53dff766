//! Constant folding.
//!
//! Applications of arithmetic and comparison builtins whose operands are all
//! constants are reduced at compile time. Record features fold through the
//! same path, which is what makes the later record-versus-tuple
//! representation decision unambiguous. Division and modulo by zero and
//! overflowing integer operations are left for the runtime to raise.

use crate::ast::walk::walk_expr;
use crate::ast::*;
use crate::symtab::Program;

use super::Pass;

pub struct ConstantFolding;

impl Pass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&mut self, program: &mut Program) {
        if let Some(code) = program.raw_code.take() {
            let mut rewriter = Rewriter { program: &mut *program };
            let code = rewriter.transform_stmt(code);
            program.raw_code = Some(code);
        }
    }
}

struct Rewriter<'p> {
    program: &'p mut Program,
}

impl Rewriter<'_> {
    fn try_fold(&self, call: &CallExpr) -> Option<OzValue> {
        let symbol = call.callee.as_variable()?;
        let builtin = self.program.symbol(symbol).as_builtin()?;
        let builtin = self.program.builtins.get(builtin);

        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(arg.as_constant()?);
        }

        fold(&builtin.module, &builtin.name, &args)
    }
}

fn fold(module: &str, name: &str, args: &[&OzValue]) -> Option<OzValue> {
    use OzValue::*;

    match (module, name, args) {
        ("Number", "+", [Int(a), Int(b)]) => a.checked_add(*b).map(Int),
        ("Number", "-", [Int(a), Int(b)]) => a.checked_sub(*b).map(Int),
        ("Number", "*", [Int(a), Int(b)]) => a.checked_mul(*b).map(Int),
        ("Number", "div", [Int(a), Int(b)]) => a.checked_div(*b).map(Int),
        ("Number", "mod", [Int(a), Int(b)]) => a.checked_rem(*b).map(Int),
        ("Number", "~", [Int(a)]) => a.checked_neg().map(Int),

        ("Number", "+", [Float(a), Float(b)]) => Some(Float(a + b)),
        ("Number", "-", [Float(a), Float(b)]) => Some(Float(a - b)),
        ("Number", "*", [Float(a), Float(b)]) => Some(Float(a * b)),
        ("Number", "~", [Float(a)]) => Some(Float(-a)),
        ("Float", "/", [Float(a), Float(b)]) => Some(Float(a / b)),

        ("Number", "<", [Int(a), Int(b)]) => Some(Bool(a < b)),
        ("Number", "=<", [Int(a), Int(b)]) => Some(Bool(a <= b)),
        ("Number", ">", [Int(a), Int(b)]) => Some(Bool(a > b)),
        ("Number", ">=", [Int(a), Int(b)]) => Some(Bool(a >= b)),

        ("Value", "==", [a, b]) => Some(Bool(a == b)),
        ("Value", "\\=", [a, b]) => Some(Bool(a != b)),

        _ => None,
    }
}

impl Transformer for Rewriter<'_> {
    fn transform_expr(&mut self, expr: Expression) -> Expression {
        let expr = walk_expr(self, expr);
        match expr {
            Expression::Call(call) => match self.try_fold(&call) {
                Some(value) => build::constant(value, call.pos),
                None => Expression::Call(call),
            },
            Expression::If(e) => {
                // A statically known condition picks its branch here; this
                // is still constant folding, not flow optimization.
                match e.condition.as_constant().and_then(OzValue::as_bool) {
                    Some(true) => *e.then_value,
                    Some(false) => *e.else_value,
                    None => Expression::If(e),
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_arithmetic() {
        assert_eq!(
            fold("Number", "+", &[&OzValue::Int(2), &OzValue::Int(3)]),
            Some(OzValue::Int(5))
        );
        assert_eq!(
            fold("Number", "div", &[&OzValue::Int(7), &OzValue::Int(2)]),
            Some(OzValue::Int(3))
        );
    }

    #[test]
    fn test_division_by_zero_is_left_alone() {
        assert_eq!(
            fold("Number", "div", &[&OzValue::Int(1), &OzValue::Int(0)]),
            None
        );
        assert_eq!(
            fold("Number", "mod", &[&OzValue::Int(1), &OzValue::Int(0)]),
            None
        );
    }

    #[test]
    fn test_overflow_is_left_alone() {
        assert_eq!(
            fold("Number", "+", &[&OzValue::Int(i64::MAX), &OzValue::Int(1)]),
            None
        );
    }

    #[test]
    fn test_fold_comparisons_and_equality() {
        assert_eq!(
            fold("Number", "=<", &[&OzValue::Int(1), &OzValue::Int(1)]),
            Some(OzValue::Bool(true))
        );
        assert_eq!(
            fold(
                "Value",
                "==",
                &[&OzValue::atom("a"), &OzValue::atom("b")]
            ),
            Some(OzValue::Bool(false))
        );
    }
}
