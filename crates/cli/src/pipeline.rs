//! The compilation pipeline, from input files to the output C++ file.
//!
//! Exit codes: 0 on success, 1 for bad arguments, 2 for parse or compile
//! errors and internal failures. Parse errors and semantic diagnostics are
//! rendered with their source line and a caret before the driver exits.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use ozboot_codegen::{emit_program, EmitConfig, Entry};
use ozboot_parser::assemble;
use ozboot_parser::ast::FunctorExpr;
use ozboot_parser::error::render_diagnostic;
use ozboot_parser::{
    parse_expression, run_pipeline, BuiltinRegistry, Diagnostic, Expression, FrontError, Program,
};

use crate::cli::{Cli, Mode};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0}")]
    Usage(String),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid builtin descriptor {path}: {source}")]
    Descriptor {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{0}")]
    Codegen(#[from] ozboot_codegen::CodegenError),

    /// Diagnostics were already rendered to stderr.
    #[error("")]
    Reported,
}

impl DriverError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverError::Usage(_) => 1,
            _ => 2,
        }
    }
}

pub fn run(cli: &Cli) -> i32 {
    match try_run(cli) {
        Ok(()) => 0,
        Err(error) => {
            let message = error.to_string();
            if !message.is_empty() {
                eprintln!("ozbootc: {}", message);
            }
            error.exit_code()
        }
    }
}

fn read_file(path: &Path) -> Result<String, DriverError> {
    fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load one descriptor file, or every `*-builtin.json` in a directory.
fn load_builtin_modules(registry: &mut BuiltinRegistry, path: &Path) -> Result<(), DriverError> {
    if path.is_dir() {
        let entries = fs::read_dir(path).map_err(|source| DriverError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DriverError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let file = entry.path();
            if file
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with("-builtin.json"))
            {
                files.push(file);
            }
        }
        files.sort();
        for file in files {
            load_builtin_modules(registry, &file)?;
        }
        return Ok(());
    }

    let json = read_file(path)?;
    registry
        .load_str(&json)
        .map_err(|source| DriverError::Descriptor {
            path: path.to_path_buf(),
            source,
        })
}

/// One exported name per line, blank lines ignored.
fn load_base_declarations(program: &mut Program, path: &Path) -> Result<(), DriverError> {
    let text = read_file(path)?;
    for line in text.lines() {
        let name = line.trim();
        if !name.is_empty() {
            program.base_declarations.insert(name.to_string());
        }
    }
    Ok(())
}

/// Sources read so far, for diagnostic rendering.
type SourceMap = HashMap<String, String>;

fn report_parse_error(error: &Diagnostic, sources: &SourceMap) -> DriverError {
    eprintln!(
        "{}",
        render_diagnostic(error, sources.get(error.pos.file.as_ref()).map(String::as_str))
    );
    DriverError::Reported
}

fn report_front_error(error: FrontError, sources: &SourceMap) -> DriverError {
    match error {
        FrontError::Parse(diagnostic) => report_parse_error(&diagnostic, sources),
        FrontError::Semantic(diagnostics) => {
            for diagnostic in diagnostics.iter() {
                eprintln!(
                    "{}",
                    render_diagnostic(
                        diagnostic,
                        sources.get(diagnostic.pos.file.as_ref()).map(String::as_str)
                    )
                );
            }
            DriverError::Reported
        }
        FrontError::Internal(message) => {
            eprintln!("ozbootc: internal compiler error: {}", message);
            DriverError::Reported
        }
    }
}

fn try_run(cli: &Cli) -> Result<(), DriverError> {
    let mode = cli.mode().map_err(DriverError::Usage)?;

    let mut registry = BuiltinRegistry::new();
    for path in &cli.modules {
        load_builtin_modules(&mut registry, path)?;
    }

    let mut program = Program::new(registry);
    if let Some(base) = &cli.base {
        load_base_declarations(&mut program, base)?;
    }

    let defines: HashSet<String> = cli.defines.iter().cloned().collect();
    let mut sources = SourceMap::new();

    let entry = match mode {
        Mode::Module => {
            let path = &cli.inputs[0];
            if cli.inputs.len() > 1 {
                return Err(DriverError::Usage(
                    "module mode compiles exactly one input file".to_string(),
                ));
            }
            let name = file_name(path);
            let source = read_file(path)?;
            sources.insert(name.clone(), source);
            let functor = parse_expression(&sources[&name], &name, &defines)
                .map_err(|error| report_parse_error(&error, &sources))?;
            let stem = file_stem(path);
            let url = assemble::module_url(&stem);
            assemble::assemble_module(&mut program, functor, &url);
            Entry::Module { name: stem }
        }
        Mode::BaseEnv => {
            let mut functors: Vec<FunctorExpr> = Vec::new();
            for path in &cli.inputs {
                let name = file_name(path);
                let source = read_file(path)?;
                sources.insert(name.clone(), source);
                let parsed = parse_expression(&sources[&name], &name, &defines)
                    .map_err(|error| report_parse_error(&error, &sources))?;
                match parsed {
                    Expression::Functor(functor) => functors.push(functor),
                    other => {
                        let error =
                            Diagnostic::new("a base environment input must be a functor", other.pos().clone());
                        return Err(report_parse_error(&error, &sources));
                    }
                }
            }
            assemble::assemble_base_env(&mut program, functors);
            Entry::BaseEnv
        }
        Mode::Linker => {
            let main_url = assemble::module_url(&file_stem(&cli.inputs[0]));
            assemble::assemble_linker(&mut program, &main_url);
            let functor_names = cli.inputs.iter().map(|path| file_stem(path)).collect();
            Entry::Linker { functor_names }
        }
    };

    // Assembly may already have recorded problems (unknown boot modules).
    if program.has_errors() {
        return Err(report_front_error(
            FrontError::Semantic(program.errors.clone()),
            &sources,
        ));
    }

    run_pipeline(&mut program).map_err(|error| report_front_error(error, &sources))?;

    let store = ozboot_codegen::compile(&program)?;
    let output = emit_program(
        &program,
        &store,
        &EmitConfig {
            headers: cli.headers.clone(),
            entry,
        },
    )?;
    fs::write(&cli.output, output).map_err(|source| DriverError::Io {
        path: cli.output.clone(),
        source,
    })?;
    Ok(())
}
