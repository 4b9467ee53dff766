//! C++ emission.
//!
//! A pure transformation from the finished program and its code areas into
//! one C++ translation unit. Each code area becomes a `createCodeArea<id>`
//! function that lays down the `ByteCode` block, wraps it in a `CodeArea`
//! value and installs every pool constant at its index. The entry function
//! builds the top-level abstraction, fills its G registers from the
//! parameters and schedules it on a fresh thread; linker mode also emits
//! `main()`.

use std::fmt::Write;

use ozboot_parser::symtab::Abstraction;
use ozboot_parser::{OzValue, Program};

use crate::bytecode::{CodeArea, ConstantKey, RecordArity};
use crate::emit::codegen::CodeStore;
use crate::error::{CodegenError, CodegenResult};

/// The driver-selected shape of the generated entry point.
#[derive(Debug, Clone)]
pub enum Entry {
    /// `createFunctor_<name>`.
    Module { name: String },
    /// `createBaseEnv`.
    BaseEnv,
    /// `createRunThread` plus `main()` calling every functor creator.
    Linker { functor_names: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct EmitConfig {
    /// Additional headers, in the order given on the command line.
    pub headers: Vec<String>,
    pub entry: Entry,
}

/// Make a name usable as part of a C++ identifier.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn escape_cpp_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// The C++ expression building one VM value.
fn value_expr(program: &Program, value: &OzValue) -> String {
    match value {
        OzValue::Atom(name) => format!(
            "Atom::build(vm, MOZART_STR(\"{}\"))",
            escape_cpp_string(name)
        ),
        OzValue::Int(i) => format!("trivialBuild(vm, {})", i),
        OzValue::Float(f) => format!("trivialBuild(vm, {:?})", f),
        OzValue::Bool(b) => format!("trivialBuild(vm, {})", b),
        OzValue::Unit => "Unit::build(vm)".to_string(),
        OzValue::Builtin(id) => {
            format!("{}::build(vm)", program.builtins.get(*id).full_cpp_name)
        }
    }
}

fn arity_expr(program: &Program, arity: &RecordArity) -> String {
    let mut out = format!("buildArity(vm, {}", value_expr(program, &arity.label));
    for feature in &arity.features {
        out.push_str(", ");
        out.push_str(&value_expr(program, feature));
    }
    out.push(')');
    out
}

fn constant_expr(program: &Program, key: &ConstantKey) -> String {
    match key {
        ConstantKey::Value(value) => value_expr(program, value),
        ConstantKey::Arity(arity) => arity_expr(program, arity),
        ConstantKey::CodeArea(abs) => format!("createCodeArea{}(vm)", abs.0),
    }
}

fn emit_code_area(out: &mut String, program: &Program, area: &CodeArea) {
    let _ = writeln!(out, "// {}", area.name);
    let _ = writeln!(
        out,
        "static UnstableNode createCodeArea{}(VM vm) {{",
        area.abs.0
    );
    let _ = writeln!(out, "  ByteCode codeBlock[] = {{");
    for op in area.ops() {
        let _ = writeln!(out, "    {},", op.code());
    }
    let _ = writeln!(out, "  }};");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  UnstableNode codeArea = CodeArea::build(vm, {}, codeBlock, sizeof(codeBlock), {});",
        area.constant_count(),
        area.compute_x_count()
    );

    if area.constant_count() > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "  UnstableNode constant;");
        for (index, key) in area.constants().enumerate() {
            let _ = writeln!(out, "  constant = {};", constant_expr(program, key));
            let _ = writeln!(
                out,
                "  CodeArea::setConstantAt(vm, codeArea, {}, constant);",
                index
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  return codeArea;");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
}

/// The G-register sources of the top-level abstraction, as parameter names.
fn top_level_globals(program: &Program, top: &Abstraction) -> CodegenResult<Vec<&'static str>> {
    let mut names = Vec::new();
    for &global in &top.globals {
        if global == program.base_env_symbol {
            names.push("baseEnv");
        } else if global == program.boot_mm_symbol {
            names.push("bootMM");
        } else {
            return Err(CodegenError::internal(format!(
                "top level captures unexpected variable {}",
                program.symbol(global).name
            )));
        }
    }
    Ok(names)
}

fn emit_entry(
    out: &mut String,
    program: &Program,
    store: &CodeStore,
    name: &str,
) -> CodegenResult<()> {
    let top = program.abstraction(program.top_level);
    let area = store
        .get(program.top_level)
        .ok_or_else(|| CodegenError::internal("top level has no code area"))?;
    let globals = top_level_globals(program, top)?;

    let _ = writeln!(
        out,
        "void {}(VM vm, RichNode baseEnv, RichNode bootMM) {{",
        name
    );
    let _ = writeln!(
        out,
        "  UnstableNode codeArea = createCodeArea{}(vm);",
        area.abs.0
    );
    let _ = writeln!(
        out,
        "  UnstableNode abstraction = Abstraction::build(vm, 0, {}, codeArea);",
        globals.len()
    );
    for (index, global) in globals.iter().enumerate() {
        let _ = writeln!(
            out,
            "  Abstraction::setGlobal(vm, abstraction, {}, {});",
            index, global
        );
    }
    let _ = writeln!(out, "  ozcalls::asyncOzCall(vm, abstraction);");
    let _ = writeln!(out, "}}");
    let _ = writeln!(out);
    Ok(())
}

fn emit_linker_main(out: &mut String, functor_names: &[String]) {
    let _ = writeln!(out, "int main() {{");
    let _ = writeln!(out, "  boostenv::BoostBasedVM boostBasedVM;");
    let _ = writeln!(out, "  VM vm = boostBasedVM.vm;");
    let _ = writeln!(out);
    let _ = writeln!(out, "  UnstableNode baseEnv = Variable::build(vm);");
    let _ = writeln!(out, "  UnstableNode bootMM = Variable::build(vm);");
    let _ = writeln!(out);
    let _ = writeln!(out, "  createBaseEnv(vm, baseEnv, bootMM);");
    for name in functor_names {
        let _ = writeln!(
            out,
            "  createFunctor_{}(vm, baseEnv, bootMM);",
            sanitize_identifier(name)
        );
    }
    let _ = writeln!(out, "  boostBasedVM.run();");
    let _ = writeln!(out);
    let _ = writeln!(out, "  createRunThread(vm, baseEnv, bootMM);");
    let _ = writeln!(out, "  boostBasedVM.run();");
    let _ = writeln!(out);
    let _ = writeln!(out, "  return 0;");
    let _ = writeln!(out, "}}");
}

/// Serialize the whole program as one C++ source file.
pub fn emit_program(
    program: &Program,
    store: &CodeStore,
    config: &EmitConfig,
) -> CodegenResult<String> {
    let mut out = String::new();
    let _ = writeln!(out, "#include <mozart.hh>");
    for header in &config.headers {
        let _ = writeln!(out, "#include \"{}\"", header);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "using namespace mozart;");
    let _ = writeln!(out);

    for area in store.iter() {
        let _ = writeln!(out, "static UnstableNode createCodeArea{}(VM vm);", area.abs.0);
    }
    if let Entry::Linker { functor_names } = &config.entry {
        let _ = writeln!(
            out,
            "void createBaseEnv(VM vm, RichNode baseEnv, RichNode bootMM);"
        );
        for name in functor_names {
            let _ = writeln!(
                out,
                "void createFunctor_{}(VM vm, RichNode baseEnv, RichNode bootMM);",
                sanitize_identifier(name)
            );
        }
    }
    let _ = writeln!(out);

    for area in store.iter() {
        emit_code_area(&mut out, program, area);
    }

    match &config.entry {
        Entry::Module { name } => {
            let name = format!("createFunctor_{}", sanitize_identifier(name));
            emit_entry(&mut out, program, store, &name)?;
        }
        Entry::BaseEnv => {
            emit_entry(&mut out, program, store, "createBaseEnv")?;
        }
        Entry::Linker { functor_names } => {
            emit_entry(&mut out, program, store, "createRunThread")?;
            emit_linker_main(&mut out, functor_names);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("Foo"), "Foo");
        assert_eq!(sanitize_identifier("My-Module.1"), "My_Module_1");
        assert_eq!(sanitize_identifier("2fast"), "_2fast");
    }

    #[test]
    fn test_escape_cpp_string() {
        assert_eq!(escape_cpp_string("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(escape_cpp_string("line\nbreak"), "line\\nbreak");
    }
}
