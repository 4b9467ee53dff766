//! Program assembly.
//!
//! The driver picks one of three top-level program shapes before the
//! pipeline runs:
//!
//! - module mode registers a single parsed functor with the boot module
//!   manager under its URL;
//! - base-environment mode merges the base functors into one, applies it to
//!   an import record built from the boot modules, and registers every boot
//!   module;
//! - linker mode runs the main module.
//!
//! The generated wrappers mix already-resolved references to the two
//! environment variables with the raw parsed trees; the Namer leaves
//! resolved nodes alone.

use crate::ast::*;
use crate::symtab::{BootModule, Program};

/// System modules live under `x-oz://system/`; everything else is a plain
/// relative URL.
pub const SYSTEM_MODULES: &[&str] = &[
    "Application",
    "Connection",
    "DP",
    "Fault",
    "Module",
    "OS",
    "Open",
    "Pickle",
    "Property",
    "Remote",
    "Resolve",
    "Search",
    "Site",
    "Space",
    "System",
    "URL",
];

/// The URL a compiled module registers under, derived from its file stem.
pub fn module_url(stem: &str) -> String {
    if SYSTEM_MODULES.contains(&stem) {
        format!("x-oz://system/{}.ozf", stem)
    } else {
        format!("{}.ozf", stem)
    }
}

/// Module mode: `{BootMM.registerFunctor '<url>' <functor>}`.
pub fn assemble_module(program: &mut Program, functor: Expression, url: &str) {
    let pos = Pos::none();
    let register = build::dot(
        build::var(program.boot_mm_symbol, pos.clone()),
        build::atom("registerFunctor", pos.clone()),
        pos.clone(),
    );
    program.raw_code = Some(build::call_stmt(
        register,
        vec![build::atom(url, pos.clone()), functor],
        pos,
    ));
}

/// Linker mode: `{BootMM.run '<mainUrl>'}`.
pub fn assemble_linker(program: &mut Program, main_url: &str) {
    let pos = Pos::none();
    let run = build::dot(
        build::var(program.boot_mm_symbol, pos.clone()),
        build::atom("run", pos.clone()),
        pos.clone(),
    );
    program.raw_code = Some(build::call_stmt(
        run,
        vec![build::atom(main_url, pos.clone())],
        pos,
    ));
}

/// Merge base functors into one: imports, requires and exports concatenate;
/// prepare and define sections merge declarations and sequence their
/// bodies; the first non-empty name wins.
pub fn merge_base_functors(functors: Vec<FunctorExpr>) -> FunctorExpr {
    let mut merged = FunctorExpr {
        name: String::new(),
        requires: Vec::new(),
        prepare: None,
        imports: Vec::new(),
        define: None,
        exports: Vec::new(),
        abs: None,
        pos: Pos::none(),
    };
    for functor in functors {
        if merged.name.is_empty() {
            merged.name = functor.name;
        }
        if merged.pos.is_none() {
            merged.pos = functor.pos;
        }
        merged.requires.extend(functor.requires);
        merged.imports.extend(functor.imports);
        merged.exports.extend(functor.exports);
        merged.prepare = merge_sections(merged.prepare, functor.prepare);
        merged.define = merge_sections(merged.define, functor.define);
    }
    merged
}

fn merge_sections(
    left: Option<Box<Statement>>,
    right: Option<Box<Statement>>,
) -> Option<Box<Statement>> {
    match (left, right) {
        (None, section) | (section, None) => section,
        (Some(left), Some(right)) => match (*left, *right) {
            (Statement::RawLocal(mut a), Statement::RawLocal(b)) => {
                let pos = a.pos.clone();
                a.declarations.extend(b.declarations);
                let body = Statement::seq(vec![*a.body, *b.body], pos.clone());
                Some(Box::new(Statement::RawLocal(RawLocalStatement {
                    declarations: a.declarations,
                    body: Box::new(body),
                    pos,
                })))
            }
            (a, b) => {
                let pos = a.pos().clone();
                Some(Box::new(Statement::seq(vec![a, b], pos)))
            }
        },
    }
}

/// Base-environment mode.
///
/// Builds the import record for the merged base functor from the loaded
/// boot modules, applies the functor, binds the result to the base
/// environment variable, ties the conventional `Base` feature back to the
/// whole record, fetches the boot module manager from the `$BootMM` export,
/// and registers every boot module with it.
pub fn assemble_base_env(program: &mut Program, functors: Vec<FunctorExpr>) {
    let pos = Pos::none();
    program.is_base_environment = true;

    let merged = merge_base_functors(functors);
    for export in &merged.exports {
        if let Some(name) = export.feature.as_atom() {
            program.base_declarations.insert(name.to_string());
        }
    }

    // Import record: one field per imported module, holding a record of
    // that module's builtins.
    let mut import_fields = Vec::new();
    let mut problems = Vec::new();
    for import in merged.requires.iter().chain(&merged.imports) {
        match &import.url {
            None => problems.push((
                format!("base functor import {} has no boot URL", import.name),
                import.pos.clone(),
            )),
            Some(url) => match program.builtins.module_by_url(url) {
                None => problems.push((
                    format!("unknown boot module {}", url),
                    import.pos.clone(),
                )),
                Some(module) => {
                    let record = boot_module_record(module, &pos);
                    import_fields.push((build::atom(import.name.clone(), pos.clone()), record));
                }
            },
        }
    }
    for (message, problem_pos) in problems {
        program.report(message, problem_pos);
    }
    let import_record = build::record(build::atom("import", pos.clone()), import_fields, pos.clone());

    let base_env = build::var(program.base_env_symbol, pos.clone());
    let boot_mm = build::var(program.boot_mm_symbol, pos.clone());

    let mut statements = vec![
        // BaseEnv = {MergedFunctor ImportRecord}
        build::bind(
            base_env.clone(),
            build::call_expr(Expression::Functor(merged), vec![import_record], pos.clone()),
            pos.clone(),
        ),
        // BaseEnv.'Base' = BaseEnv
        build::bind(
            build::dot(base_env.clone(), build::atom("Base", pos.clone()), pos.clone()),
            base_env.clone(),
            pos.clone(),
        ),
        // BootMM = BaseEnv.'$BootMM'
        build::bind(
            boot_mm.clone(),
            build::dot(base_env, build::atom("$BootMM", pos.clone()), pos.clone()),
            pos.clone(),
        ),
    ];

    // {BootMM.registerModule '<url>' <module record>} once per boot module.
    let modules: Vec<(String, Expression)> = program
        .builtins
        .modules()
        .map(|module| (module.url.clone(), boot_module_record(module, &pos)))
        .collect();
    for (url, record) in modules {
        statements.push(build::call_stmt(
            build::dot(
                boot_mm.clone(),
                build::atom("registerModule", pos.clone()),
                pos.clone(),
            ),
            vec![build::atom(url, pos.clone()), record],
            pos.clone(),
        ));
    }

    program.raw_code = Some(Statement::seq(statements, pos));
}

/// The record value a boot module presents: its builtins by name.
fn boot_module_record(module: &BootModule, pos: &Pos) -> Expression {
    let fields = module
        .exports
        .iter()
        .map(|(name, id)| {
            (
                build::atom(name.clone(), pos.clone()),
                build::constant(OzValue::Builtin(*id), pos.clone()),
            )
        })
        .collect();
    build::record(build::atom(module.name.clone(), pos.clone()), fields, pos.clone())
}
