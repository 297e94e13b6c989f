//! In-memory SSA IR for the Cell compiler
//!
//! This crate is the compiler's code-generation target: a small, typed,
//! SSA-form instruction set held in an arena-backed [`Module`] and addressed
//! exclusively through opaque handles. The compiler emits through the
//! [`Builder`] and never owns or frees IR objects; the module keeps
//! everything alive until it is dropped as a whole.
//!
//! The surface mirrors what the generator needs and nothing more:
//!
//! - type construction and interning ([`Ty`], [`TyId`])
//! - constants, parameters and instruction results ([`ValueId`])
//! - the instruction families: memory (`alloca`/`load`/`store`/
//!   `getelementptr`), vectors (`extractelement`/`insertelement`/splat),
//!   integer and float arithmetic and comparisons, `zext`, calls, branches
//!   and `ret void`
//! - function lookup by name and cloning with parameter remapping
//! - a non-fatal structural verifier
//! - an LLVM-style text printer
//!
//! [`base_module`] builds the module every compilation starts from.

mod base;
mod builder;
mod module;
mod printer;
mod types;
mod verify;

pub use base::base_module;
pub use builder::Builder;
pub use module::{BlockId, FuncId, Module, ValueId};
pub use types::{BinOp, FCmpPred, ICmpPred, Ty, TyId};
