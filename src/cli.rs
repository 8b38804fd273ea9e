//! Command-line driver.
//!
//! The driver takes the C source as a single argument, compiles it, and
//! writes the generated assembly to stdout (or to a file with `-o`). On any
//! compile error the carat diagnostic is printed to stderr and the process
//! exits nonzero.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

use crate::compile::compile;

#[derive(Parser)]
#[command(name = "minic")]
#[command(about = "A small C compiler targeting x86-64", long_about = None)]
#[command(version)]
pub struct Cli {
    /// C source text to compile
    pub source: String,

    /// Write assembly to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Entry point for the CLI.
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    execute(Cli::parse())
}

/// Compiles and writes output per the parsed arguments.
pub fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let asm = match compile(&cli.source) {
        Ok(asm) => asm,
        Err(e) => {
            eprintln!("{}", e.display_with_source(&cli.source));
            return Err(Box::new(e));
        }
    };

    match &cli.output {
        Some(path) => fs::write(path, asm)?,
        None => print!("{}", asm),
    }
    Ok(())
}
