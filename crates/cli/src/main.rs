use clap::Parser;

use ozboot_cli::{pipeline, Cli};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let code = if error.use_stderr() { 1 } else { 0 };
            let _ = error.print();
            std::process::exit(code);
        }
    };
    std::process::exit(pipeline::run(&cli));
}
