//! Command-line interface.
//!
//! The short `-h` belongs to `--header`, so the automatic help flag is
//! replaced by a long-only `--help`.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// ozbootc - bootstrap Oz-to-C++ compiler
#[derive(Debug, Parser)]
#[command(name = "ozbootc")]
#[command(about = "Compiles Oz functors into C++ sources for the VM", long_about = None)]
#[command(disable_help_flag = true)]
pub struct Cli {
    /// Build the base environment from the given base functors
    #[arg(long)]
    pub baseenv: bool,

    /// Emit the linker entry point for the given modules
    #[arg(long)]
    pub linker: bool,

    /// Output C++ file
    #[arg(short = 'o', long = "output", default_value = "out.cc")]
    pub output: PathBuf,

    /// Additional C++ header to include (repeatable, order preserved)
    #[arg(short = 'h', long = "header")]
    pub headers: Vec<String>,

    /// Builtin-module descriptor file or directory (repeatable)
    #[arg(short = 'm', long = "module")]
    pub modules: Vec<PathBuf>,

    /// Base-declarations file, one exported name per line
    #[arg(short = 'b', long = "base")]
    pub base: Option<PathBuf>,

    /// Conditional-compilation symbol (repeatable)
    #[arg(short = 'D', long = "define")]
    pub defines: Vec<String>,

    /// Input files; in linker mode the main module comes first
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Print help
    #[arg(long, action = ArgAction::HelpLong)]
    help: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Module,
    BaseEnv,
    Linker,
}

impl Cli {
    pub fn mode(&self) -> Result<Mode, String> {
        match (self.baseenv, self.linker) {
            (true, true) => Err("--baseenv and --linker are mutually exclusive".to_string()),
            (true, false) => Ok(Mode::BaseEnv),
            (false, true) => Ok(Mode::Linker),
            (false, false) => Ok(Mode::Module),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_module_mode_is_the_default() {
        let cli = parse(&["ozbootc", "Foo.oz"]);
        assert_eq!(cli.mode(), Ok(Mode::Module));
        assert_eq!(cli.inputs.len(), 1);
        assert_eq!(cli.output, PathBuf::from("out.cc"));
    }

    #[test]
    fn test_header_short_flag() {
        let cli = parse(&["ozbootc", "-h", "first.hh", "-h", "second.hh", "Foo.oz"]);
        assert_eq!(cli.headers, vec!["first.hh", "second.hh"]);
    }

    #[test]
    fn test_linker_flags() {
        let cli = parse(&[
            "ozbootc", "--linker", "-o", "linker.cc", "M.oz", "Lib.oz",
        ]);
        assert_eq!(cli.mode(), Ok(Mode::Linker));
        assert_eq!(cli.inputs.len(), 2);
        assert_eq!(cli.output, PathBuf::from("linker.cc"));
    }

    #[test]
    fn test_conflicting_modes() {
        let cli = parse(&["ozbootc", "--linker", "--baseenv", "Base.oz"]);
        assert!(cli.mode().is_err());
    }

    #[test]
    fn test_inputs_are_required() {
        assert!(Cli::try_parse_from(["ozbootc", "--linker"].iter().copied()).is_err());
    }

    #[test]
    fn test_defines_and_base() {
        let cli = parse(&[
            "ozbootc", "-D", "VM_BOOT", "-b", "base.txt", "-m", "modules/", "Foo.oz",
        ]);
        assert_eq!(cli.defines, vec!["VM_BOOT"]);
        assert_eq!(cli.base, Some(PathBuf::from("base.txt")));
        assert_eq!(cli.modules, vec![PathBuf::from("modules/")]);
    }
}
