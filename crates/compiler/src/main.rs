//! Cell compiler CLI
//!
//! Compiles a behavior script against the base module and reports
//! diagnostics on stdout. Exit code 0 means a clean compile.

use cellc::{CellError, CompilerConfig};
use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{Shell, generate};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "cellc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cell compiler - compile agent behavior scripts to IR", long_about = None)]
struct Cli {
    /// Input .cell source file
    #[arg(required_unless_present = "completions")]
    input: Option<PathBuf>,

    /// Print the generated function as LLVM-style IR
    #[arg(long)]
    emit_ir: bool,

    /// Name of the generated function (must be unique per module)
    #[arg(long, value_name = "NAME")]
    function_name: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Generate shell completion scripts and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "cellc", &mut io::stdout());
        return;
    }

    let Some(input) = cli.input.as_deref() else {
        // unreachable through clap, kept for safety
        process::exit(2);
    };

    match load_config(&cli) {
        Ok(config) => {
            if let Err(error) = run_build(input, &config) {
                println!("{}", error);
                process::exit(1);
            }
        }
        Err(error) => {
            println!("{}", error);
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<CompilerConfig, CellError> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::default(),
    };
    if let Some(name) = &cli.function_name {
        config.function_name = name.clone();
    }
    if cli.emit_ir {
        config.emit_ir = true;
    }
    Ok(config)
}

fn run_build(input: &Path, config: &CompilerConfig) -> Result<(), CellError> {
    let mut module = cell_ir::base_module();
    cellc::compile_file(input, &mut module, &config.function_name)?;

    if config.emit_ir
        && let Some(function) = module.get_function(&config.function_name)
    {
        print!("{}", module.print_function(function));
    }
    Ok(())
}
