//! Statement lowering and CFG construction
//!
//! Declarations allocate entry-block slots; `if` and `while` build their
//! blocks explicitly and emit every terminator themselves. After a `quit`
//! the insertion point is detached and the remaining statements of the
//! surrounding list are skipped.

use super::IrGenerator;
use crate::ast::{Ast, AstKind, TypeSpec};
use crate::diag::CellError;

impl IrGenerator<'_> {
    /// Generate a statement sequence. Once the insertion point is cleared
    /// (after `quit`), the rest of the list is unreachable and skipped; the
    /// enclosing control-flow statement re-attaches at its merge block.
    pub(super) fn gen_statement_list(&mut self, statements: &[Ast]) -> Result<(), CellError> {
        for statement in statements {
            if self.module.insertion_block().is_none() {
                break;
            }
            self.gen_statement(statement)?;
        }
        Ok(())
    }

    pub(super) fn gen_statement(&mut self, node: &Ast) -> Result<(), CellError> {
        match &node.kind {
            AstKind::Block(statements) => self.gen_statement_list(statements),
            AstKind::Empty => Ok(()),
            AstKind::VarDecl { global, ty, array_len, name } => {
                self.gen_declaration(node, *global, *ty, *array_len, name)
            }
            AstKind::ExprStmt(expression) => {
                self.eval_expr(expression)?;
                Ok(())
            }
            AstKind::If { cond, then_body, else_body } => {
                self.gen_if(cond, then_body, else_body.as_deref())
            }
            AstKind::While { cond, body } => self.gen_while(cond, body),
            AstKind::Quit => {
                self.gen_quit();
                Ok(())
            }
            _ => Err(CellError::at(&node.pos, "internal: statement expected")),
        }
    }

    /// `[global] <type> [[N]] <name>;` — an entry-block alloca, registered
    /// in the symbol table. `global` is recorded by the grammar but carries
    /// no storage semantics here.
    fn gen_declaration(
        &mut self,
        node: &Ast,
        _global: bool,
        ty: TypeSpec,
        array_len: Option<i32>,
        name: &str,
    ) -> Result<(), CellError> {
        let mut ir_ty = match ty {
            TypeSpec::Int => self.module.ty_i32(),
            TypeSpec::Real => self.module.ty_f32(),
            TypeSpec::Vec => self.module.ty_vec2f(),
        };
        if let Some(len) = array_len {
            if ty == TypeSpec::Vec {
                return Err(CellError::at(&node.pos, "arrays of vec not supported"));
            }
            if len < 0 {
                return Err(CellError::at(&node.pos, "constant expected"));
            }
            ir_ty = self.module.ty_array(ir_ty, len as u64);
        }

        let main = self.main;
        let slot = self.b().build_entry_alloca(main, ir_ty, None, name);
        self.symbols.declare(name, slot, &node.pos)
    }

    fn gen_if(
        &mut self,
        cond: &Ast,
        then_body: &Ast,
        else_body: Option<&Ast>,
    ) -> Result<(), CellError> {
        let value = self.eval_expr(cond)?;
        let condition =
            self.narrow_condition(value, "if_condition", &cond.pos, "invalid 'if' condition type")?;

        let main = self.main;
        let merge_block = self.module.create_block(main, "IF_MERGE");
        let then_block = self.module.append_new_block(main, "IF_THEN");
        let else_block = match else_body {
            Some(_) => self.module.create_block(main, "IF_ELSE"),
            None => merge_block,
        };
        self.b().build_cond_br(condition, then_block, else_block);

        self.b().position_at_end(then_block);
        self.gen_statement(then_body)?;
        if let Some(block) = self.module.insertion_block()
            && !self.module.block_has_terminator(block)
        {
            self.b().build_br(merge_block);
        }

        if let Some(else_body) = else_body {
            self.module.append_block(main, else_block);
            self.b().position_at_end(else_block);
            self.gen_statement(else_body)?;
            if let Some(block) = self.module.insertion_block()
                && !self.module.block_has_terminator(block)
            {
                self.b().build_br(merge_block);
            }
        }

        self.module.append_block(main, merge_block);
        self.b().position_at_end(merge_block);
        Ok(())
    }

    fn gen_while(&mut self, cond: &Ast, body: &Ast) -> Result<(), CellError> {
        let main = self.main;
        let cond_block = self.module.append_new_block(main, "WHILE_CONDITION");
        let body_block = self.module.create_block(main, "WHILE_BODY");
        let end_block = self.module.create_block(main, "WHILE_END");

        // jump straight to the condition
        self.b().build_br(cond_block);
        self.b().position_at_end(cond_block);
        let value = self.eval_expr(cond)?;
        let condition = self.narrow_condition(
            value,
            "while_condition",
            &cond.pos,
            "invalid 'while' condition type",
        )?;
        self.b().build_cond_br(condition, body_block, end_block);

        self.module.append_block(main, body_block);
        self.b().position_at_end(body_block);
        self.gen_statement(body)?;
        if let Some(block) = self.module.insertion_block()
            && !self.module.block_has_terminator(block)
        {
            self.b().build_br(cond_block);
        }

        self.module.append_block(main, end_block);
        self.b().position_at_end(end_block);
        Ok(())
    }

    /// `quit;` returns from the generated function and detaches the builder.
    fn gen_quit(&mut self) {
        if let Some(block) = self.module.insertion_block() {
            if !self.module.block_has_terminator(block) {
                self.b().build_ret_void();
            }
            self.b().clear_insertion_point();
        }
    }
}
