//! Cell compiler library
//!
//! Compiles Cell behavior scripts into functions of an IR module. A script
//! reads the simulation through `#`-prefixed system values, computes over
//! scalars and 2D vectors, and writes one output force vector per tick.
//!
//! The pipeline is three stages with explicit hand-offs:
//!
//! 1. lexing and recursive-descent parsing into a rule-tagged parse tree,
//!    collecting syntax diagnostics without aborting,
//! 2. lowering the parse tree into a typed AST (literal values, operator
//!    kinds and canonical identifiers resolved during construction),
//! 3. IR generation: a tree walk that binds declarations to typed stack
//!    slots, lowers expressions to typed instructions and builds the
//!    basic-block CFG, emitting through [`cell_ir`]'s builder.
//!
//! Stage 3 only runs when stage 1 reported no syntax errors. The caller
//! supplies the module (normally [`cell_ir::base_module`]) and must discard
//! it if compilation fails, since a failed run may leave partial IR behind.
//!
//! ```no_run
//! use cellc::compile_source;
//!
//! let mut module = cell_ir::base_module();
//! compile_source("#Force = -#Position[0];", "chase.cell", &mut module, "cell_ai_0")?;
//! # Ok::<(), cellc::CellError>(())
//! ```

pub mod ast;
pub mod config;
pub mod diag;
pub mod irgen;
pub mod lexer;
pub mod parser;
pub mod rules;
pub mod symtab;

pub use ast::{Ast, AstKind, Op, TypeSpec, build_ast};
pub use config::{CompilerConfig, DEFAULT_FUNCTION_NAME};
pub use diag::{CellError, Diagnostics, SourcePos};
pub use irgen::IrGenerator;
pub use parser::{ParseNode, Parser};
pub use rules::RuleId;

use cell_ir::Module;
use std::fs;
use std::path::Path;

/// Compile one translation unit into `module` as a function named
/// `function_name`.
///
/// Diagnostics are printed as they are found. Syntax errors gate the IR
/// stage: parsing recovers and reports them all, then compilation fails
/// without emitting. Errors during IR generation abort the unit immediately
/// and may leave a partial function in the module.
pub fn compile_source(
    source: &str,
    file: &str,
    module: &mut Module,
    function_name: &str,
) -> Result<(), CellError> {
    let mut diags = Diagnostics::new();
    let tree = {
        let mut parser = Parser::new(source, file, &mut diags)?;
        parser.parse()?
    };
    if diags.has_syntax_errors() {
        return Err(CellError::new(format!(
            "{}: {} syntax error(s)",
            file,
            diags.syntax_error_count()
        )));
    }

    let ast = build_ast(&tree, &mut diags)?;

    let mut generator = IrGenerator::new(module, function_name)?;
    generator.run(&ast)
}

/// Compile a source file; see [`compile_source`].
pub fn compile_file(
    path: &Path,
    module: &mut Module,
    function_name: &str,
) -> Result<(), CellError> {
    let source = fs::read_to_string(path)
        .map_err(|e| CellError::new(format!("cannot open {}: {}", path.display(), e)))?;
    compile_source(&source, &path.display().to_string(), module, function_name)
}
