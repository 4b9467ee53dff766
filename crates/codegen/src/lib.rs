//! # ozboot codegen
//!
//! The backend of the bootstrap compiler. It consumes a flattened
//! [`ozboot_parser::Program`], generates one register-based code area per
//! abstraction and serializes the result as C++ source that, compiled
//! against the VM runtime, reconstructs the program in memory.

pub mod bytecode;
pub mod emit;
pub mod error;

pub use bytecode::{CodeArea, ConstantKey, OpCode, RecordArity, Register};
pub use emit::{compile, emit_program, CodeStore, EmitConfig, Entry};
pub use error::{CodegenError, CodegenResult};
