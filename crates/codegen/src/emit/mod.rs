//! Code generation and C++ emission.

pub mod codegen;
pub mod cpp;

pub use codegen::{compile, CodeStore};
pub use cpp::{emit_program, sanitize_identifier, EmitConfig, Entry};
