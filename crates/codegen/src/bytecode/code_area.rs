//! Code areas.
//!
//! One code area per abstraction: the opcode vector, the constant pool and
//! the register allocation state. The pool and the Y map memoize their
//! assignments, so asking for the register of the same key twice yields the
//! same register. Forward jumps reserve a hole of a declared size and are
//! filled exactly once; `counting` measures the words emitted by a block to
//! compute jump offsets.

use std::collections::HashMap;

use indexmap::IndexSet;

use ozboot_parser::{AbsId, OzValue, SymbolId};

use super::arity::RecordArity;
use super::opcode::{OpCode, Register};
use crate::error::{CodegenError, CodegenResult};

/// A constant-pool key. Values compare structurally (floats by bits),
/// builtins and code areas by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantKey {
    Value(OzValue),
    Arity(RecordArity),
    CodeArea(AbsId),
}

#[derive(Debug)]
enum OpEntry {
    Op(OpCode),
    Hole { size: usize },
}

/// A reserved slot in the opcode vector, to be filled exactly once.
#[derive(Debug, Clone, Copy)]
pub struct Hole(usize);

#[derive(Debug)]
pub struct CodeArea {
    pub abs: AbsId,
    pub name: String,
    pub arity: usize,
    ops: Vec<OpEntry>,
    constants: IndexSet<ConstantKey>,
    y_regs: HashMap<SymbolId, u16>,
    y_next: u16,
    x_next: u16,
}

impl CodeArea {
    pub fn new(abs: AbsId, name: impl Into<String>, arity: usize) -> Self {
        CodeArea {
            abs,
            name: name.into(),
            arity,
            ops: Vec::new(),
            constants: IndexSet::new(),
            y_regs: HashMap::new(),
            y_next: 0,
            x_next: 0,
        }
    }

    pub fn emit(&mut self, op: OpCode) {
        self.ops.push(OpEntry::Op(op));
    }

    /// Reserve `size` words for an opcode whose operands are not known yet.
    pub fn emit_hole(&mut self, size: usize) -> Hole {
        let hole = Hole(self.ops.len());
        self.ops.push(OpEntry::Hole { size });
        hole
    }

    /// Fill a reserved slot. The opcode must occupy exactly the reserved
    /// size.
    pub fn fill(&mut self, hole: Hole, op: OpCode) -> CodegenResult<()> {
        match &self.ops[hole.0] {
            OpEntry::Hole { size } => {
                if *size != op.size() {
                    return Err(CodegenError::HoleSizeMismatch {
                        reserved: *size,
                        actual: op.size(),
                    });
                }
            }
            OpEntry::Op(_) => {
                return Err(CodegenError::internal(
                    "placeholder was already filled",
                ));
            }
        }
        self.ops[hole.0] = OpEntry::Op(op);
        Ok(())
    }

    /// Current size of the emitted code, in ByteCode words. Holes count
    /// with their reserved size.
    pub fn code_size(&self) -> usize {
        self.ops
            .iter()
            .map(|entry| match entry {
                OpEntry::Op(op) => op.size(),
                OpEntry::Hole { size } => *size,
            })
            .sum()
    }

    /// Run a block and return the number of words it emitted.
    pub fn counting<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> (usize, R) {
        let before = self.code_size();
        let result = f(self);
        (self.code_size() - before, result)
    }

    /// The K register of a constant; appends on first use.
    pub fn register_for_constant(&mut self, key: ConstantKey) -> Register {
        let (index, _) = self.constants.insert_full(key);
        Register::K(index as u16)
    }

    /// The Y register of a formal or local; allocates on first use.
    pub fn register_for_local(&mut self, symbol: SymbolId) -> u16 {
        if let Some(&reg) = self.y_regs.get(&symbol) {
            return reg;
        }
        let reg = self.y_next;
        self.y_next += 1;
        self.y_regs.insert(symbol, reg);
        reg
    }

    pub fn y_count(&self) -> u16 {
        self.y_next
    }

    /// A fresh X temporary.
    pub fn alloc_x(&mut self) -> u16 {
        let reg = self.x_next;
        self.x_next += 1;
        reg
    }

    /// Make sure the next temporary does not collide with X0..Xn-1.
    pub fn reserve_x(&mut self, count: u16) {
        self.x_next = self.x_next.max(count);
    }

    /// X temporaries are statement-scoped.
    pub fn reset_x(&mut self) {
        self.x_next = 0;
    }

    pub fn constants(&self) -> impl Iterator<Item = &ConstantKey> {
        self.constants.iter()
    }

    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// One more than the highest X index any opcode touches, at least 1.
    pub fn compute_x_count(&self) -> u16 {
        let mut max = 0u16;
        for op in self.ops() {
            for register in op.registers() {
                if let Register::X(index) = register {
                    max = max.max(index + 1);
                }
            }
        }
        max.max(1)
    }

    /// Verify that no reserved slot is left unfilled.
    pub fn finish(&self) -> CodegenResult<()> {
        if self
            .ops
            .iter()
            .any(|entry| matches!(entry, OpEntry::Hole { .. }))
        {
            return Err(CodegenError::UnfilledHole(self.name.clone()));
        }
        Ok(())
    }

    /// The finished opcodes, in order. Call [`CodeArea::finish`] first.
    pub fn ops(&self) -> impl Iterator<Item = &OpCode> {
        self.ops.iter().filter_map(|entry| match entry {
            OpEntry::Op(op) => Some(op),
            OpEntry::Hole { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> CodeArea {
        CodeArea::new(AbsId(1), "test", 0)
    }

    #[test]
    fn test_constant_pool_is_idempotent() {
        let mut area = area();
        let a = area.register_for_constant(ConstantKey::Value(OzValue::atom("foo")));
        let b = area.register_for_constant(ConstantKey::Value(OzValue::Int(1)));
        let c = area.register_for_constant(ConstantKey::Value(OzValue::atom("foo")));

        assert_eq!(a, Register::K(0));
        assert_eq!(b, Register::K(1));
        assert_eq!(a, c);
        assert_eq!(area.constant_count(), 2);
    }

    #[test]
    fn test_constant_pool_keeps_first_use_order() {
        let mut area = area();
        area.register_for_constant(ConstantKey::Value(OzValue::atom("foo")));
        area.register_for_constant(ConstantKey::Value(OzValue::Int(1)));
        area.register_for_constant(ConstantKey::Value(OzValue::atom("foo")));

        let keys: Vec<_> = area.constants().cloned().collect();
        assert_eq!(
            keys,
            vec![
                ConstantKey::Value(OzValue::atom("foo")),
                ConstantKey::Value(OzValue::Int(1)),
            ]
        );
    }

    #[test]
    fn test_y_registers_are_memoized() {
        let mut area = area();
        let a = area.register_for_local(SymbolId(10));
        let b = area.register_for_local(SymbolId(11));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(area.register_for_local(SymbolId(10)), 0);
        assert_eq!(area.y_count(), 2);
    }

    #[test]
    fn test_counting_measures_emitted_words() {
        let mut area = area();
        let (size, ()) = area.counting(|a| {
            a.emit(OpCode::MoveXY { src: 0, dst: 0 });
            a.emit(OpCode::Return);
        });
        assert_eq!(size, 4);
    }

    #[test]
    fn test_holes_are_reserved_and_filled() {
        let mut area = area();
        let hole = area.emit_hole(2);
        area.emit(OpCode::Return);
        assert_eq!(area.code_size(), 3);
        assert!(area.finish().is_err());

        area.fill(hole, OpCode::Branch { offset: 1 }).unwrap();
        assert_eq!(area.code_size(), 3);
        assert!(area.finish().is_ok());
    }

    #[test]
    fn test_hole_size_mismatch() {
        let mut area = area();
        let hole = area.emit_hole(2);
        assert!(matches!(
            area.fill(hole, OpCode::MoveXY { src: 0, dst: 0 }),
            Err(CodegenError::HoleSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_compute_x_count() {
        let mut area = area();
        area.emit(OpCode::MoveKX { src: 0, dst: 3 });
        area.emit(OpCode::MoveXY { src: 1, dst: 0 });
        assert_eq!(area.compute_x_count(), 4);
    }

    #[test]
    fn test_x_count_is_at_least_one() {
        let area = area();
        assert_eq!(area.compute_x_count(), 1);
    }
}
