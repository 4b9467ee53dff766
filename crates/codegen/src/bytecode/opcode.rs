//! The opcode model.
//!
//! Opcodes are the unit the emitter serializes: each knows its mnemonic,
//! its operand words and therefore its size in ByteCode words. Register
//! operands keep their register file so `compute_x_count` can scan X usage;
//! in the serialized form a register in a mixed list is encoded as a file
//! tag word followed by its index.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    X(u16),
    Y(u16),
    G(u16),
    K(u16),
}

impl Register {
    pub fn index(self) -> u16 {
        match self {
            Register::X(i) | Register::Y(i) | Register::G(i) | Register::K(i) => i,
        }
    }

    /// Encoding tag used when a register appears in a variable-length
    /// operand list.
    pub fn file_tag(self) -> i64 {
        match self {
            Register::X(_) => 0,
            Register::Y(_) => 1,
            Register::G(_) => 2,
            Register::K(_) => 3,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::X(i) => write!(f, "X{}", i),
            Register::Y(i) => write!(f, "Y{}", i),
            Register::G(i) => write!(f, "G{}", i),
            Register::K(i) => write!(f, "K{}", i),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpCode {
    MoveXY { src: u16, dst: u16 },
    MoveYX { src: u16, dst: u16 },
    MoveGX { src: u16, dst: u16 },
    MoveKX { src: u16, dst: u16 },
    /// Unify X with a Y local; used for captured variables, where a plain
    /// move would disconnect the closure from the binding.
    UnifyXY { x: u16, y: u16 },
    UnifyXG { x: u16, g: u16 },
    AllocateY { count: u16 },
    DeallocateY,
    CreateVarY { dst: u16 },
    CallX { target: u16, arity: u16 },
    CallY { target: u16, arity: u16 },
    CallG { target: u16, arity: u16 },
    CallK { target: u16, arity: u16 },
    Return,
    /// Unconditional forward jump, in ByteCode words from the end of this
    /// instruction.
    Branch { offset: i32 },
    BranchIfFalseX { cond: u16, offset: i32 },
    CreateTupleX { label: u16, width: u16, dst: u16 },
    CreateRecordX { arity: u16, width: u16, dst: u16 },
    CreateAbstractionX {
        body: u16,
        arity: u16,
        globals: Vec<Register>,
        dst: u16,
    },
    SetupExceptionHandler { offset: i32 },
    PopExceptionHandler,
    RaiseX { value: u16 },
}

impl OpCode {
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::MoveXY { .. } => "OpMoveXY",
            OpCode::MoveYX { .. } => "OpMoveYX",
            OpCode::MoveGX { .. } => "OpMoveGX",
            OpCode::MoveKX { .. } => "OpMoveKX",
            OpCode::UnifyXY { .. } => "OpUnifyXY",
            OpCode::UnifyXG { .. } => "OpUnifyXG",
            OpCode::AllocateY { .. } => "OpAllocateY",
            OpCode::DeallocateY => "OpDeallocateY",
            OpCode::CreateVarY { .. } => "OpCreateVarY",
            OpCode::CallX { .. } => "OpCallX",
            OpCode::CallY { .. } => "OpCallY",
            OpCode::CallG { .. } => "OpCallG",
            OpCode::CallK { .. } => "OpCallK",
            OpCode::Return => "OpReturn",
            OpCode::Branch { .. } => "OpBranch",
            OpCode::BranchIfFalseX { .. } => "OpBranchIfFalseX",
            OpCode::CreateTupleX { .. } => "OpCreateTupleX",
            OpCode::CreateRecordX { .. } => "OpCreateRecordX",
            OpCode::CreateAbstractionX { .. } => "OpCreateAbstractionX",
            OpCode::SetupExceptionHandler { .. } => "OpSetupExceptionHandler",
            OpCode::PopExceptionHandler => "OpPopExceptionHandler",
            OpCode::RaiseX { .. } => "OpRaiseX",
        }
    }

    /// The operand words following the mnemonic.
    pub fn operands(&self) -> Vec<i64> {
        match self {
            OpCode::MoveXY { src, dst }
            | OpCode::MoveYX { src, dst }
            | OpCode::MoveGX { src, dst }
            | OpCode::MoveKX { src, dst } => vec![*src as i64, *dst as i64],
            OpCode::UnifyXY { x, y } => vec![*x as i64, *y as i64],
            OpCode::UnifyXG { x, g } => vec![*x as i64, *g as i64],
            OpCode::AllocateY { count } => vec![*count as i64],
            OpCode::DeallocateY | OpCode::Return | OpCode::PopExceptionHandler => Vec::new(),
            OpCode::CreateVarY { dst } => vec![*dst as i64],
            OpCode::CallX { target, arity }
            | OpCode::CallY { target, arity }
            | OpCode::CallG { target, arity }
            | OpCode::CallK { target, arity } => vec![*target as i64, *arity as i64],
            OpCode::Branch { offset } => vec![*offset as i64],
            OpCode::BranchIfFalseX { cond, offset } => vec![*cond as i64, *offset as i64],
            OpCode::CreateTupleX { label, width, dst } => {
                vec![*label as i64, *width as i64, *dst as i64]
            }
            OpCode::CreateRecordX { arity, width, dst } => {
                vec![*arity as i64, *width as i64, *dst as i64]
            }
            OpCode::CreateAbstractionX {
                body,
                arity,
                globals,
                dst,
            } => {
                let mut words = vec![*body as i64, *arity as i64, globals.len() as i64];
                for global in globals {
                    words.push(global.file_tag());
                    words.push(global.index() as i64);
                }
                words.push(*dst as i64);
                words
            }
            OpCode::SetupExceptionHandler { offset } => vec![*offset as i64],
            OpCode::RaiseX { value } => vec![*value as i64],
        }
    }

    /// Register operands with their files, for X-count computation.
    pub fn registers(&self) -> Vec<Register> {
        match self {
            OpCode::MoveXY { src, dst } => vec![Register::X(*src), Register::Y(*dst)],
            OpCode::MoveYX { src, dst } => vec![Register::Y(*src), Register::X(*dst)],
            OpCode::MoveGX { src, dst } => vec![Register::G(*src), Register::X(*dst)],
            OpCode::MoveKX { src, dst } => vec![Register::K(*src), Register::X(*dst)],
            OpCode::UnifyXY { x, y } => vec![Register::X(*x), Register::Y(*y)],
            OpCode::UnifyXG { x, g } => vec![Register::X(*x), Register::G(*g)],
            OpCode::AllocateY { .. }
            | OpCode::DeallocateY
            | OpCode::Return
            | OpCode::Branch { .. }
            | OpCode::SetupExceptionHandler { .. }
            | OpCode::PopExceptionHandler => Vec::new(),
            OpCode::CreateVarY { dst } => vec![Register::Y(*dst)],
            OpCode::CallX { target, .. } => vec![Register::X(*target)],
            OpCode::CallY { target, .. } => vec![Register::Y(*target)],
            OpCode::CallG { target, .. } => vec![Register::G(*target)],
            OpCode::CallK { target, .. } => vec![Register::K(*target)],
            OpCode::BranchIfFalseX { cond, .. } => vec![Register::X(*cond)],
            OpCode::CreateTupleX { label, dst, .. } => {
                vec![Register::K(*label), Register::X(*dst)]
            }
            OpCode::CreateRecordX { arity, dst, .. } => {
                vec![Register::K(*arity), Register::X(*dst)]
            }
            OpCode::CreateAbstractionX {
                body, globals, dst, ..
            } => {
                let mut registers = vec![Register::K(*body)];
                registers.extend(globals.iter().copied());
                registers.push(Register::X(*dst));
                registers
            }
            OpCode::RaiseX { value } => vec![Register::X(*value)],
        }
    }

    /// Size in ByteCode words: the mnemonic plus its operands.
    pub fn size(&self) -> usize {
        1 + self.operands().len()
    }

    /// The textual form placed in the generated `codeBlock` array.
    pub fn code(&self) -> String {
        let mut out = self.name().to_string();
        for word in self.operands() {
            out.push_str(", ");
            out.push_str(&word.to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_follow_operands() {
        assert_eq!(OpCode::Return.size(), 1);
        assert_eq!(OpCode::AllocateY { count: 3 }.size(), 2);
        assert_eq!(OpCode::MoveXY { src: 0, dst: 1 }.size(), 3);
        assert_eq!(
            OpCode::CreateAbstractionX {
                body: 2,
                arity: 1,
                globals: vec![Register::Y(0), Register::G(1)],
                dst: 0,
            }
            .size(),
            // mnemonic + body + arity + count + two tagged registers + dst
            1 + 3 + 4 + 1
        );
    }

    #[test]
    fn test_code_text() {
        assert_eq!(OpCode::MoveKX { src: 2, dst: 0 }.code(), "OpMoveKX, 2, 0");
        assert_eq!(OpCode::Return.code(), "OpReturn");
    }

    #[test]
    fn test_registers_track_files() {
        let op = OpCode::MoveKX { src: 2, dst: 5 };
        assert_eq!(op.registers(), vec![Register::K(2), Register::X(5)]);
    }
}
