//! IR generation
//!
//! The tree-walking core of the compiler: binds declarations to typed stack
//! slots, lowers expressions to typed SSA instructions (dispatching on the
//! IR type of each operand), resolves `#` system identifiers against the
//! cloned main function's parameters, and builds the basic-block CFG for
//! `if`/`while`/`quit`.
//!
//! # Module structure
//!
//! - `mod.rs`: generator construction (template cloning, parameter binding),
//!   shared type/narrowing helpers, program traversal and finalization
//! - `stmt.rs`: statements and control flow
//! - `expr.rs`: expression evaluation and l-value resolution
//!
//! Expression evaluation is eager and left-to-right; every recursion
//! evaluates its children under fresh state, so sibling subexpressions never
//! observe each other's intermediates. The generator holds IR handles only;
//! the module owns all IR.

mod expr;
mod stmt;

use crate::ast::{Ast, AstKind};
use crate::diag::{CellError, SourcePos};
use crate::symtab::SymbolTable;
use cell_ir::{Builder, FuncId, ICmpPred, Module, Ty, TyId, ValueId};

/// Name-mangling prefix shared by all functions in the base module.
pub const FUNCTION_PREFIX: &str = "cell_";

/// Generates IR for one translation unit into a function cloned from
/// `cell_main_template`.
pub struct IrGenerator<'m> {
    module: &'m mut Module,
    symbols: SymbolTable,
    main: FuncId,
    p_cells: ValueId,
    cell_count: ValueId,
    arena_radius: ValueId,
    force: ValueId,
}

impl<'m> IrGenerator<'m> {
    /// Prepare a fresh function to populate: clone the main template under
    /// `function_name` (parameter names preserved), drop the template's
    /// `ret void`, and position the builder at the end of the entry block.
    pub fn new(module: &'m mut Module, function_name: &str) -> Result<Self, CellError> {
        if function_name.is_empty() {
            return Err(CellError::new("main name not specified"));
        }
        if module.get_function(function_name).is_some() {
            return Err(CellError::new(format!("function already defined: {}", function_name)));
        }
        let template = module
            .get_function("cell_main_template")
            .ok_or_else(|| CellError::new("cannot find main"))?;
        if module.func_param_count(template) != 4 {
            return Err(CellError::new("invalid main template"));
        }

        let main = module.clone_function(template, function_name);
        let entry = module
            .entry_block(main)
            .ok_or_else(|| CellError::new("cannot find main"))?;
        module.remove_terminator(entry);
        module.builder().position_at_end(entry);

        let p_cells = module.func_param(main, 0);
        let cell_count = module.func_param(main, 1);
        let arena_radius = module.func_param(main, 2);
        let force = module.func_param(main, 3);

        Ok(IrGenerator {
            module,
            symbols: SymbolTable::new(),
            main,
            p_cells,
            cell_count,
            arena_radius,
            force,
        })
    }

    /// Generate the whole program, terminate the function and verify it.
    pub fn run(&mut self, program: &Ast) -> Result<(), CellError> {
        let AstKind::Program(statements) = &program.kind else {
            return Err(CellError::at(&program.pos, "internal: program node expected"));
        };
        self.gen_statement_list(statements)?;

        // leaving the outermost block: terminate, verify, detach
        if let Some(block) = self.module.insertion_block()
            && !self.module.block_has_terminator(block)
        {
            self.b().build_ret_void();
        }
        if let Err(errors) = self.module.verify_function(self.main) {
            for error in errors {
                println!("function verification: {}", error);
            }
        }
        self.b().clear_insertion_point();
        Ok(())
    }

    /// The function being populated.
    pub fn function(&self) -> FuncId {
        self.main
    }

    // -------------------------------------------------------------- helpers

    fn b(&mut self) -> Builder<'_> {
        self.module.builder()
    }

    fn ty_of(&self, v: ValueId) -> TyId {
        self.module.value_ty(v)
    }

    fn is_int(&self, v: ValueId) -> bool {
        self.module.ty(self.ty_of(v)).is_integer()
    }

    fn is_float(&self, v: ValueId) -> bool {
        self.module.ty(self.ty_of(v)).is_float()
    }

    fn is_vector(&self, v: ValueId) -> bool {
        self.module.ty(self.ty_of(v)).is_vector()
    }

    fn is_pointer(&self, v: ValueId) -> bool {
        self.module.ty(self.ty_of(v)).is_pointer()
    }

    fn is_function(&self, v: ValueId) -> bool {
        self.module.ty(self.ty_of(v)).is_function()
    }

    /// Whether a value is (or points at) array storage. Arrays have no value
    /// semantics: they may only be indexed.
    fn is_array_like(&self, v: ValueId) -> bool {
        let ty = self.ty_of(v);
        match self.module.ty(ty) {
            Ty::Array { .. } => true,
            Ty::Ptr(p) => self.module.ty(*p).is_array(),
            _ => false,
        }
    }

    /// Look up an exported function of the base module as a callable value.
    fn intrinsic(&self, name: &str, pos: &SourcePos) -> Result<ValueId, CellError> {
        self.module
            .get_function(name)
            .map(|f| self.module.func_value(f))
            .ok_or_else(|| CellError::at(pos, format!("function not found: {}", name)))
    }

    /// Lower a condition to `i1`: already-narrow values pass through, other
    /// integers compare against zero, everything else is rejected.
    fn narrow_condition(
        &mut self,
        cond: ValueId,
        name: &str,
        pos: &SourcePos,
        what: &str,
    ) -> Result<ValueId, CellError> {
        let ty = self.ty_of(cond);
        if matches!(self.module.ty(ty), Ty::I1) {
            return Ok(cond);
        }
        if !self.module.ty(ty).is_integer() {
            return Err(CellError::at(pos, what));
        }
        let zero = self.module.const_i32(0);
        Ok(self.b().build_icmp(ICmpPred::Ne, cond, zero, name))
    }
}

#[cfg(test)]
mod tests {
    use crate::compile_source;
    use cell_ir::{Module, base_module};

    /// Compile a snippet against a fresh base module and return the printed
    /// IR of the generated function.
    fn emit(source: &str) -> String {
        let mut module = base_module();
        compile_source(source, "test.cell", &mut module, "cell_ai_under_test").unwrap();
        let f = module.get_function("cell_ai_under_test").unwrap();
        module.print_function(f)
    }

    fn emit_err(source: &str) -> String {
        let mut module = base_module();
        let err = compile_source(source, "test.cell", &mut module, "cell_ai_under_test")
            .expect_err("compilation should fail");
        err.to_string()
    }

    fn verified(module: &Module, name: &str) {
        let f = module.get_function(name).unwrap();
        assert!(module.verify_function(f).is_ok(), "verifier rejected {}", name);
    }

    #[test]
    fn test_template_clone_binds_parameters() {
        let ir = emit("");
        assert!(ir.contains(
            "define void @cell_ai_under_test(%Cell* %pCells, i32 %cellCount, float %arenaRadius, <2 x float>* %force) {"
        ));
        assert!(ir.contains("ret void"));
    }

    #[test]
    fn test_lane_writes_and_force_output() {
        // one insertelement+store per lane write, into the local and into the
        // force parameter
        let ir = emit("vec f; f.x = 1.0; f.y = 2.0; #Force.x = f.x; #Force.y = f.y;");
        assert!(ir.contains("%f = alloca <2 x float>"));
        assert_eq!(ir.matches("insertelement").count(), 4);
        assert_eq!(ir.matches("store <2 x float>").count(), 4);
        assert_eq!(ir.matches("store <2 x float> %v_insert2, <2 x float>* %force").count(), 1);
        assert_eq!(ir.matches("store <2 x float> %v_insert3, <2 x float>* %force").count(), 1);
        assert!(ir.contains("extractelement <2 x float> %f1, i32 0"));
        assert!(ir.trim_end().ends_with("ret void\n}"));
    }

    #[test]
    fn test_if_over_cell_count_with_position_reads() {
        let ir = emit("int n; n = #CellCount; if (n > 1) { #Force = #Position[1] - #Position[0]; }");
        assert!(ir.contains("store i32 %cellCount, i32* %n"));
        assert!(ir.contains("icmp sgt i32"));
        assert!(ir.contains("br i1 %if_condition, label %IF_THEN, label %IF_MERGE"));
        assert!(ir.contains("call <2 x float> @read_position(%Cell* %pCells, i32 1)"));
        assert!(ir.contains("call <2 x float> @read_position(%Cell* %pCells, i32 0)"));
        assert!(ir.contains("fsub <2 x float>"));
        assert!(ir.contains("store <2 x float> %f_sub, <2 x float>* %force"));
        // no else: the false edge goes straight to the merge block
        assert!(ir.contains("IF_MERGE:"));
        assert!(!ir.contains("IF_ELSE"));
    }

    #[test]
    fn test_xor_on_vectors_is_dot_product() {
        let ir = emit("real d; d = #Position[1] ^ #Position[0];");
        assert_eq!(ir.matches("call <2 x float> @read_position").count(), 2);
        assert!(ir.contains("call float @cell_dot(<2 x float> %read_call, <2 x float> %read_call1)"));
        assert!(ir.contains("store float %v_dot, float* %d"));
    }

    #[test]
    fn test_xor_on_ints_is_xor() {
        let ir = emit("int a; int b; a = a ^ b;");
        assert!(ir.contains("xor i32"));
        assert!(!ir.contains("cell_dot"));
    }

    #[test]
    fn test_while_quit_terminates_body() {
        let ir = emit("while (#CellCount > 0) { quit; }");
        assert!(ir.contains("br label %WHILE_CONDITION"));
        assert!(ir.contains("br i1 %while_condition, label %WHILE_BODY, label %WHILE_END"));
        // the body ends in ret; no back edge is emitted
        let body = ir.split("WHILE_BODY:").nth(1).unwrap();
        let body = body.split("WHILE_END:").next().unwrap();
        assert!(body.contains("ret void"));
        assert!(!body.contains("br label %WHILE_CONDITION"));
    }

    #[test]
    fn test_load_emitted_before_add_single_store() {
        let ir = emit("int x; x = x + 1;");
        let load_at = ir.find("load i32, i32* %x").unwrap();
        let add_at = ir.find("add i32").unwrap();
        assert!(load_at < add_at);
        assert_eq!(ir.matches("store i32").count(), 1);
    }

    #[test]
    fn test_unknown_member_is_an_error() {
        let err = emit_err("vec v; v.z = 1.0;");
        assert!(err.contains("unknown member"), "got: {}", err);
    }

    #[test]
    fn test_every_block_has_one_terminator() {
        let sources = [
            "int x; x = 1;",
            "if (1) ; else ;",
            "while (0) { int y; y = 2; }",
            "vec v; #Force = v.normalized;",
            "int i; i = 0; while (i < 8) { i = i + 1; if (i == 3) quit; }",
        ];
        for source in sources {
            let mut module = base_module();
            compile_source(source, "test.cell", &mut module, "cell_ai_under_test").unwrap();
            verified(&module, "cell_ai_under_test");
        }
    }

    #[test]
    fn test_broadcasting_rules() {
        // vec * real broadcasts the scalar
        let ir = emit("vec v; real r; #Force = v * r;");
        assert!(ir.contains("insertelement <2 x float> undef, float %r1, i32 0"));
        assert!(ir.contains("fmul <2 x float>"));

        // int does not broadcast into vec
        let err = emit_err("int x; vec v; #Force = v + x;");
        assert!(err.contains("operation not permitted"), "got: {}", err);
    }

    #[test]
    fn test_system_identifier_table() {
        let ir = emit("real r; r = #ArenaRadius; int n; n = #CellCount; #Force = #Velocity[0];");
        assert!(ir.contains("store float %arenaRadius, float* %r"));
        assert!(ir.contains("store i32 %cellCount, i32* %n"));
        assert!(ir.contains("call <2 x float> @read_velocity(%Cell* %pCells, i32 0)"));

        assert!(emit_err("int n; n = #Force.x;").contains("write-only variable"));
        assert!(emit_err("#CellCount = 3;").contains("read-only variable"));
        assert!(emit_err("int n; n = #Wind;").contains("unknown system variable"));
    }

    #[test]
    fn test_intrinsic_invocation_prefix() {
        let ir = emit("real r; r = sqrt(2.0);");
        assert!(ir.contains("call float @cell_sqrt(float 2.0)"));
        assert!(emit_err("real r; r = cbrt(2.0);").contains("function not found: cbrt"));
    }

    #[test]
    fn test_member_intrinsics() {
        let ir = emit("vec v; real len; len = v.length; #Force = v.normalized;");
        assert!(ir.contains("call float @cell_length(<2 x float>"));
        assert!(ir.contains("call <2 x float> @cell_normalize(<2 x float>"));
    }

    #[test]
    fn test_object_creation_calls_make_vec() {
        let ir = emit("#Force = vec(1.0, 2.0);");
        assert!(ir.contains("call <2 x float> @cell_makeVec(float 1.0, float 2.0)"));
    }

    #[test]
    fn test_array_declaration_and_access() {
        let ir = emit("int[4] xs; xs[1] = 2; int y; y = xs[1];");
        assert!(ir.contains("%xs = alloca [4 x i32]"));
        assert!(ir.contains("getelementptr [4 x i32], [4 x i32]* %xs, i32 0, i32 1"));
        assert_eq!(ir.matches("store i32 2").count(), 1);

        assert!(emit_err("vec[2] vs;").contains("arrays of vec not supported"));
    }

    #[test]
    fn test_vector_element_access_requires_runtime_index() {
        let ir = emit("vec v; real r; int i; i = 1; r = v[i];");
        assert!(ir.contains("extractelement <2 x float>"));
        assert!(emit_err("vec v; real r; r = v[0];").contains("variable index expected"));
    }

    #[test]
    fn test_conditional_expression_diamond() {
        let ir = emit("int a; int b; int m; m = a > b ? a : b;");
        assert!(ir.contains("COND_TRUE:"));
        assert!(ir.contains("COND_FALSE:"));
        assert!(ir.contains("COND_MERGE:"));
        // both arms store into the shared slot; one load after the merge
        assert!(ir.contains("%cond = alloca i32"));
        assert_eq!(ir.matches("store i32 %a2, i32* %cond").count(), 1);
        assert_eq!(ir.matches("store i32 %b2, i32* %cond").count(), 1);
        let merge_at = ir.find("COND_MERGE:").unwrap();
        assert!(ir[merge_at..].contains("load i32, i32* %cond"));
    }

    #[test]
    fn test_increment_is_read_modify_write() {
        let ir = emit("int i; i = 0; i++;");
        assert!(ir.contains("load i32, i32* %i"));
        assert!(ir.contains("add i32 %i1, 1"));
        assert_eq!(ir.matches("store i32").count(), 2);
    }

    #[test]
    fn test_compound_assignment_loads_once_stores_once() {
        let ir = emit("int x; x = 0; x += 5;");
        let tail = ir.split("store i32 0, i32* %x").nth(1).unwrap();
        assert_eq!(tail.matches("load i32, i32* %x").count(), 1);
        assert!(tail.contains("add i32 %x1, 5"));
        assert_eq!(tail.matches("store i32").count(), 1);
    }

    #[test]
    fn test_redefinition_is_fatal() {
        let err = emit_err("int x; real x;");
        assert!(err.contains("variable redefinition: x"));
    }

    #[test]
    fn test_relational_on_vectors_reduces_lanes() {
        let ir = emit("vec a; vec b; int same; same = a == b;");
        assert!(ir.contains("fcmp oeq <2 x float>"));
        assert!(ir.contains("extractelement <2 x i1>"));
        assert!(ir.contains("zext i1"));
    }

    #[test]
    fn test_logical_operators_normalize_operands() {
        let ir = emit("int a; int b; int c; c = a && b;");
        assert_eq!(ir.matches("icmp ne i32").count(), 2);
        assert!(ir.contains("zext i1 %c_and to i32"));
    }

    #[test]
    fn test_mixed_type_comparison_is_rejected() {
        let err = emit_err("int a; real b; int c; c = a < b;");
        assert!(err.contains("cannot compare operands of different types"));
    }

    #[test]
    fn test_shift_requires_ints() {
        let ir = emit("int a; a = a << 2; a = a >> 1;");
        assert!(ir.contains("shl i32"));
        assert!(ir.contains("ashr i32"));
        assert!(emit_err("real r; r = r << 1;").contains("int expected"));
    }
}
