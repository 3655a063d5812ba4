//! Command-line interface: `mccomp <source.c>`.
//!
//! IR goes to `output.ll` in the current working directory; diagnostics
//! go to standard error. The exit code is zero exactly when IR was
//! generated.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

use crate::compile::compile;
use crate::source::SourceFile;

/// Fixed output path next to wherever the compiler was invoked.
pub const OUTPUT_PATH: &str = "output.ll";

#[derive(Parser)]
#[command(name = "mccomp")]
#[command(about = "MiniC compiler producing textual LLVM IR", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the MiniC source file
    pub source: PathBuf,
}

/// Entry point for the CLI.
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.source)
        .map_err(|e| format!("cannot read '{}': {}", cli.source.display(), e))?;

    match compile(&source) {
        Ok(ir) => {
            fs::write(OUTPUT_PATH, ir)?;
            Ok(())
        }
        Err(diags) => {
            let file = SourceFile::new(source);
            for diag in &diags {
                eprintln!("{}\n", diag.render(&file));
            }
            Err(format!(
                "{} error{} generated",
                diags.len(),
                if diags.len() == 1 { "" } else { "s" }
            )
            .into())
        }
    }
}
