//! Expression lowering
//!
//! Every operand is evaluated eagerly, left to right, and carries its IR
//! type; operator dispatch happens on those types. L-value evaluation
//! resolves to a storage slot plus an optional lane index (`write_index`)
//! for single-lane vector updates.

use super::{FUNCTION_PREFIX, IrGenerator};
use crate::ast::{Ast, AstKind, Op, TypeSpec};
use crate::diag::{CellError, SourcePos};
use cell_ir::{FCmpPred, ICmpPred, ValueId};

/// Name hint for loads through a named variable.
fn ident_hint(node: &Ast) -> &str {
    match &node.kind {
        AstKind::Ident(name) => name,
        _ => "",
    }
}

impl IrGenerator<'_> {
    /// Evaluate an expression to an r-value.
    pub(super) fn eval_expr(&mut self, node: &Ast) -> Result<ValueId, CellError> {
        let pos = &node.pos;
        match &node.kind {
            AstKind::IntLit { value, .. } => Ok(self.module.const_i32(*value)),
            AstKind::RealLit { value } => Ok(self.module.const_f32(*value)),
            AstKind::Ident(name) => self.eval_identifier(name, pos),
            AstKind::SystemIdent(name) => self.eval_system_identifier(name, pos),
            AstKind::Unary { op, operand } => self.eval_unary(*op, operand, pos),
            AstKind::Postfix { op, operand } => self.eval_step(*op, operand, pos, true),
            AstKind::Binary { op, lhs, rhs } => {
                let left = self.eval_expr(lhs)?;
                let right = self.eval_expr(rhs)?;
                self.emit_binary(*op, left, right, pos)
            }
            AstKind::Conditional { cond, then_value, else_value } => {
                self.eval_conditional(cond, then_value, else_value, pos)
            }
            AstKind::Assign { op, target, value } => {
                self.eval_assignment(*op, target, value, pos)
            }
            AstKind::Invoke { callee, args } => self.eval_invocation(callee, args, pos),
            AstKind::Member { base, member } => self.eval_member(base, member, pos),
            AstKind::Element { base, index } => self.eval_element(base, index, pos),
            AstKind::MakeObject { ty, args } => self.eval_object_creation(*ty, args, pos),
            AstKind::MakeArray { .. } => Err(CellError::at(pos, "array creation not supported")),
            _ => Err(CellError::at(pos, "internal: expression expected")),
        }
    }

    /// Evaluate an expression to an l-value: the storage slot to write, plus
    /// the lane index when only one vector lane is updated.
    pub(super) fn eval_address(
        &mut self,
        node: &Ast,
    ) -> Result<(ValueId, Option<ValueId>), CellError> {
        let pos = &node.pos;
        match &node.kind {
            AstKind::Ident(name) => {
                let slot = self
                    .symbols
                    .lookup(name)
                    .ok_or_else(|| CellError::at(pos, format!("identifier not found: {}", name)))?;
                Ok((slot, None))
            }
            AstKind::SystemIdent(name) => match name.as_str() {
                "Force" => Ok((self.force, None)),
                "CellCount" | "ArenaRadius" => Err(CellError::at(pos, "read-only variable")),
                "Radius" | "Position" | "Velocity" => {
                    Err(CellError::at(pos, "cannot store in r-value"))
                }
                _ => Err(CellError::at(pos, "unknown system variable")),
            },
            AstKind::Member { base, member } => {
                let (base_addr, _) = self.eval_address(base)?;
                let is_vec_slot = self
                    .module
                    .pointee(self.ty_of(base_addr))
                    .is_some_and(|p| self.module.ty(p).is_vector());
                if !is_vec_slot {
                    return Err(CellError::at(pos, "vec expected"));
                }
                let lane = match member.as_str() {
                    "x" => 0,
                    "y" => 1,
                    _ => return Err(CellError::at(pos, "unknown member")),
                };
                let index = self.module.const_i32(lane);
                Ok((base_addr, Some(index)))
            }
            AstKind::Element { base, index } => {
                let (base_addr, _) = self.eval_address(base)?;
                let Some(pointee) = self.module.pointee(self.ty_of(base_addr)) else {
                    return Err(CellError::at(pos, "cannot store in r-value"));
                };
                let index_v = self.eval_expr(index)?;
                if !self.is_int(index_v) {
                    return Err(CellError::at(pos, "int expected"));
                }
                if self.module.ty(pointee).is_array() {
                    let zero = self.module.const_i32(0);
                    let element = self.b().build_gep(base_addr, &[zero, index_v], "a_element");
                    return Ok((element, None));
                }
                if self.module.ty(pointee).is_vector() {
                    if self.module.is_constant(index_v) {
                        return Err(CellError::at(pos, "variable index expected"));
                    }
                    return Ok((base_addr, Some(index_v)));
                }
                Err(CellError::at(pos, "array expected"))
            }
            _ => Err(CellError::at(pos, "cannot store in r-value")),
        }
    }

    // ---------------------------------------------------------- identifiers

    fn eval_identifier(&mut self, name: &str, pos: &SourcePos) -> Result<ValueId, CellError> {
        let slot = self
            .symbols
            .lookup(name)
            .ok_or_else(|| CellError::at(pos, format!("identifier not found: {}", name)))?;
        // arrays have no value semantics; hand back the slot for indexing
        if self.is_array_like(slot) {
            return Ok(slot);
        }
        Ok(self.b().build_load(slot, name))
    }

    fn eval_system_identifier(&mut self, name: &str, pos: &SourcePos) -> Result<ValueId, CellError> {
        match name {
            "CellCount" => Ok(self.cell_count),
            "ArenaRadius" => Ok(self.arena_radius),
            "Radius" => self.intrinsic("read_radius", pos),
            "Position" => self.intrinsic("read_position", pos),
            "Velocity" => self.intrinsic("read_velocity", pos),
            "Force" => Err(CellError::at(pos, "write-only variable")),
            _ => Err(CellError::at(pos, "unknown system variable")),
        }
    }

    // -------------------------------------------------------------- unaries

    fn eval_unary(&mut self, op: Op, operand: &Ast, pos: &SourcePos) -> Result<ValueId, CellError> {
        match op {
            Op::PlusPlus | Op::MinusMinus => return self.eval_step(op, operand, pos, false),
            _ => {}
        }
        let value = self.eval_expr(operand)?;
        match op {
            Op::Plus => Ok(value),
            Op::Minus => {
                if self.is_int(value) {
                    Ok(self.b().build_neg(value, "i_neg"))
                } else if self.is_float(value) || self.is_vector(value) {
                    Ok(self.b().build_fneg(value, "f_neg"))
                } else {
                    Err(CellError::at(pos, "operation not permitted"))
                }
            }
            Op::Not => {
                if !self.is_int(value) {
                    return Err(CellError::at(pos, "int expected"));
                }
                let zero = self.module.const_i32(0);
                let narrowed = self.b().build_icmp(ICmpPred::Eq, value, zero, "i_not");
                let i32_ty = self.module.ty_i32();
                Ok(self.b().build_zext(narrowed, i32_ty, "i_not_to_bool"))
            }
            Op::BitNot => {
                if !self.is_int(value) {
                    return Err(CellError::at(pos, "int expected"));
                }
                Ok(self.b().build_not(value, "b_not"))
            }
            _ => Err(CellError::at(pos, "operation not supported")),
        }
    }

    /// `++`/`--` as a read-modify-write on an l-value. Postfix yields the
    /// original value, prefix the updated one.
    fn eval_step(
        &mut self,
        op: Op,
        operand: &Ast,
        pos: &SourcePos,
        postfix: bool,
    ) -> Result<ValueId, CellError> {
        let (slot, write_index) = self.eval_address(operand)?;
        if write_index.is_some() {
            return Err(CellError::at(pos, "operation not supported"));
        }
        let Some(pointee) = self.module.pointee(self.ty_of(slot)) else {
            return Err(CellError::at(pos, "cannot store in r-value"));
        };
        let current = self.b().build_load(slot, ident_hint(operand));
        let updated = if self.module.ty(pointee).is_integer() {
            let one = self.module.const_i32(1);
            if op == Op::PlusPlus {
                self.b().build_add(current, one, "i_add")
            } else {
                self.b().build_sub(current, one, "i_sub")
            }
        } else if self.module.ty(pointee).is_float() {
            let one = self.module.const_f32(1.0);
            if op == Op::PlusPlus {
                self.b().build_fadd(current, one, "f_add")
            } else {
                self.b().build_fsub(current, one, "f_sub")
            }
        } else {
            return Err(CellError::at(pos, "int or real expected"));
        };
        self.b().build_store(updated, slot);
        Ok(if postfix { current } else { updated })
    }

    // ------------------------------------------------------------- binaries

    /// Dispatch a binary operator over already-evaluated operands. Also used
    /// to lower compound assignment.
    pub(super) fn emit_binary(
        &mut self,
        op: Op,
        left: ValueId,
        right: ValueId,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        match op {
            Op::Mul | Op::Div | Op::Mod | Op::Plus | Op::Minus => {
                self.emit_arithmetic(op, left, right, pos)
            }
            Op::Shl | Op::Shr | Op::BitAnd | Op::BitOr | Op::BitXor => {
                self.emit_bitwise(op, left, right, pos)
            }
            Op::Eq | Op::NotEq | Op::Lt | Op::Gt | Op::LtEq | Op::GtEq => {
                self.emit_relational(op, left, right, pos)
            }
            Op::And | Op::Or => self.emit_logical(op, left, right, pos),
            _ => Err(CellError::at(pos, "operation not supported")),
        }
    }

    /// `* / % + -` with scalar-to-vector broadcasting.
    fn emit_arithmetic(
        &mut self,
        op: Op,
        mut left: ValueId,
        mut right: ValueId,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        if self.is_array_like(left) || self.is_array_like(right) {
            return Err(CellError::at(pos, "cannot combine arrays"));
        }

        if self.is_vector(left) && self.is_float(right) {
            right = self.b().build_vector_splat(2, right, "splat_r");
        } else if self.is_float(left) && self.is_vector(right) {
            left = self.b().build_vector_splat(2, left, "splat_l");
        } else if self.ty_of(left) != self.ty_of(right) {
            return Err(CellError::at(pos, "operation not permitted"));
        }

        let ints = self.is_int(left);
        let floats = self.is_float(left) || self.is_vector(left);
        let mut b = self.module.builder();
        let value = match op {
            Op::Mul if ints => b.build_mul(left, right, "i_mul"),
            Op::Mul if floats => b.build_fmul(left, right, "f_mul"),
            Op::Div if ints => b.build_sdiv(left, right, "i_div"),
            Op::Div if floats => b.build_fdiv(left, right, "f_div"),
            Op::Mod if ints => b.build_srem(left, right, "i_mod"),
            Op::Mod if floats => b.build_frem(left, right, "f_rem"),
            Op::Plus if ints => b.build_add(left, right, "i_add"),
            Op::Plus if floats => b.build_fadd(left, right, "f_add"),
            Op::Minus if ints => b.build_sub(left, right, "i_sub"),
            Op::Minus if floats => b.build_fsub(left, right, "f_sub"),
            _ => return Err(CellError::at(pos, "operation not permitted")),
        };
        Ok(value)
    }

    /// `<< >> & |` over ints, and the dual-mode `^`: dot product over
    /// vectors, exclusive-or over ints.
    fn emit_bitwise(
        &mut self,
        op: Op,
        left: ValueId,
        right: ValueId,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        if self.is_array_like(left) || self.is_array_like(right) {
            return Err(CellError::at(pos, "cannot combine arrays"));
        }

        if op == Op::BitXor {
            if self.is_vector(left) && self.is_vector(right) {
                let dot = self.intrinsic("cell_dot", pos)?;
                return Ok(self.b().build_call(dot, &[left, right], "v_dot"));
            }
            if self.is_vector(left) || self.is_vector(right) {
                return Err(CellError::at(pos, "vec expected"));
            }
        }

        if !(self.is_int(left) && self.is_int(right)) {
            return Err(CellError::at(pos, "int expected"));
        }
        let mut b = self.module.builder();
        let value = match op {
            Op::BitAnd => b.build_and(left, right, "b_and"),
            Op::BitOr => b.build_or(left, right, "b_or"),
            Op::BitXor => b.build_xor(left, right, "b_xor"),
            Op::Shl => b.build_shl(left, right, "b_shl"),
            Op::Shr => b.build_ashr(left, right, "b_sar"),
            _ => return Err(CellError::at(pos, "operation not supported")),
        };
        Ok(value)
    }

    /// `== != < <= > >=`; both operands must share one IR type. Vector
    /// comparisons reduce their lanes with a bitwise and. The `i1` result is
    /// widened back to i32: the language has no boolean type.
    fn emit_relational(
        &mut self,
        op: Op,
        left: ValueId,
        right: ValueId,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        if self.is_array_like(left) || self.is_array_like(right) {
            return Err(CellError::at(pos, "cannot compare arrays"));
        }
        if self.ty_of(left) != self.ty_of(right) {
            return Err(CellError::at(pos, "cannot compare operands of different types"));
        }

        let (ipred, fpred, stem) = match op {
            Op::Eq => (ICmpPred::Eq, FCmpPred::Oeq, "eq"),
            Op::NotEq => (ICmpPred::Ne, FCmpPred::One, "neq"),
            Op::Lt => (ICmpPred::Slt, FCmpPred::Olt, "lt"),
            Op::Gt => (ICmpPred::Sgt, FCmpPred::Ogt, "gt"),
            Op::LtEq => (ICmpPred::Sle, FCmpPred::Ole, "lteq"),
            Op::GtEq => (ICmpPred::Sge, FCmpPred::Oge, "gteq"),
            _ => return Err(CellError::at(pos, "operation not supported")),
        };

        let i32_ty = self.module.ty_i32();
        if self.is_int(left) {
            let name = format!("i_{}", stem);
            let narrow = self.b().build_icmp(ipred, left, right, &name);
            Ok(self.b().build_zext(narrow, i32_ty, &format!("{}_to_bool", name)))
        } else if self.is_float(left) {
            let name = format!("f_{}", stem);
            let narrow = self.b().build_fcmp(fpred, left, right, &name);
            Ok(self.b().build_zext(narrow, i32_ty, &format!("{}_to_bool", name)))
        } else if self.is_vector(left) {
            let name = format!("v_{}", stem);
            let lanes = self.b().build_fcmp(fpred, left, right, &name);
            let zero = self.module.const_i32(0);
            let one = self.module.const_i32(1);
            let e0 = self.b().build_extract_element(lanes, zero, "e0");
            let e1 = self.b().build_extract_element(lanes, one, "e1");
            let both = self.b().build_and(e0, e1, "");
            Ok(self.b().build_zext(both, i32_ty, &format!("{}_to_bool", name)))
        } else {
            Err(CellError::at(pos, "operation not supported"))
        }
    }

    /// `&& ||`: int operands, each tested against zero, combined, widened.
    fn emit_logical(
        &mut self,
        op: Op,
        left: ValueId,
        right: ValueId,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        if self.is_array_like(left) || self.is_array_like(right) {
            return Err(CellError::at(pos, "cannot combine arrays"));
        }
        if !(self.is_int(left) && self.is_int(right)) {
            return Err(CellError::at(pos, "int expected"));
        }
        let zero = self.module.const_i32(0);
        let l = self.b().build_icmp(ICmpPred::Ne, left, zero, "");
        let r = self.b().build_icmp(ICmpPred::Ne, right, zero, "");
        let (combined, name) = if op == Op::And {
            (self.b().build_and(l, r, "c_and"), "c_and_to_bool")
        } else {
            (self.b().build_or(l, r, "c_or"), "c_or_to_bool")
        };
        let i32_ty = self.module.ty_i32();
        Ok(self.b().build_zext(combined, i32_ty, name))
    }

    // ---------------------------------------------------------- conditional

    /// `c ? a : b` as a diamond writing both arms to one shared slot.
    fn eval_conditional(
        &mut self,
        cond: &Ast,
        then_value: &Ast,
        else_value: &Ast,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        let c = self.eval_expr(cond)?;
        let c = self.narrow_condition(c, "cond_condition", pos, "invalid condition type")?;

        let main = self.main;
        let then_block = self.module.append_new_block(main, "COND_TRUE");
        let else_block = self.module.create_block(main, "COND_FALSE");
        let merge_block = self.module.create_block(main, "COND_MERGE");
        self.b().build_cond_br(c, then_block, else_block);

        self.b().position_at_end(then_block);
        let then_v = self.eval_expr(then_value)?;
        let ty = self.ty_of(then_v);
        let slot = self.b().build_entry_alloca(main, ty, None, "cond");
        let mut b = self.module.builder();
        b.build_store(then_v, slot);
        b.build_br(merge_block);

        self.module.append_block(main, else_block);
        self.b().position_at_end(else_block);
        let else_v = self.eval_expr(else_value)?;
        if self.ty_of(else_v) != ty {
            return Err(CellError::at(pos, "conditional operands of different types"));
        }
        let mut b = self.module.builder();
        b.build_store(else_v, slot);
        b.build_br(merge_block);

        self.module.append_block(main, merge_block);
        let mut b = self.module.builder();
        b.position_at_end(merge_block);
        Ok(b.build_load(slot, "cond"))
    }

    // ----------------------------------------------------------- assignment

    /// Plain and compound assignment. Lane targets update through
    /// load/insertelement/store so the other lane survives.
    fn eval_assignment(
        &mut self,
        op: Op,
        target: &Ast,
        value: &Ast,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        if let Some(base) = op.compound_base() {
            return self.eval_compound_assignment(base, target, value, pos);
        }

        // right first, then the target address
        let right = self.eval_expr(value)?;
        let (slot, write_index) = self.eval_address(target)?;
        let Some(pointee) = self.module.pointee(self.ty_of(slot)) else {
            return Err(CellError::at(pos, "cannot store in r-value"));
        };
        if self.is_array_like(right) || self.module.ty(pointee).is_array() {
            return Err(CellError::at(pos, "cannot assign arrays"));
        }

        match write_index {
            Some(index) => {
                if !self.is_float(right) {
                    return Err(CellError::at(pos, "real expected"));
                }
                let current = self.b().build_load(slot, "v_load");
                let updated = self.b().build_insert_element(current, right, index, "v_insert");
                self.b().build_store(updated, slot);
            }
            None => {
                if self.ty_of(right) != pointee {
                    return Err(CellError::at(pos, "operation not permitted"));
                }
                self.b().build_store(right, slot);
            }
        }
        Ok(right)
    }

    fn eval_compound_assignment(
        &mut self,
        base_op: Op,
        target: &Ast,
        value: &Ast,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        let (slot, write_index) = self.eval_address(target)?;
        let Some(pointee) = self.module.pointee(self.ty_of(slot)) else {
            return Err(CellError::at(pos, "cannot store in r-value"));
        };

        match write_index {
            Some(index) => {
                let vector = self.b().build_load(slot, "v_load");
                let current = self.b().build_extract_element(vector, index, "v_element");
                let right = self.eval_expr(value)?;
                let applied = self.emit_binary(base_op, current, right, pos)?;
                let updated = self.b().build_insert_element(vector, applied, index, "v_insert");
                self.b().build_store(updated, slot);
                Ok(applied)
            }
            None => {
                if self.module.ty(pointee).is_array() {
                    return Err(CellError::at(pos, "cannot assign arrays"));
                }
                let current = self.b().build_load(slot, ident_hint(target));
                let right = self.eval_expr(value)?;
                let applied = self.emit_binary(base_op, current, right, pos)?;
                if self.ty_of(applied) != pointee {
                    return Err(CellError::at(pos, "operation not permitted"));
                }
                self.b().build_store(applied, slot);
                Ok(applied)
            }
        }
    }

    // ------------------------------------------------- calls and accessors

    /// `name(args...)` binds to the module function `cell_name`.
    fn eval_invocation(
        &mut self,
        callee: &str,
        args: &[Ast],
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        let symbol = format!("{}{}", FUNCTION_PREFIX, callee);
        let func = self
            .module
            .get_function(&symbol)
            .ok_or_else(|| CellError::at(pos, format!("function not found: {}", callee)))?;
        if self.module.func_param_count(func) != args.len() {
            return Err(CellError::at(pos, format!("invalid number of arguments: {}", callee)));
        }

        let mut values = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let value = self.eval_expr(arg)?;
            let expected = self.module.value_ty(self.module.func_param(func, index));
            if self.ty_of(value) != expected {
                return Err(CellError::at(pos, format!("argument type mismatch: {}", callee)));
            }
            values.push(value);
        }

        let callee_value = self.module.func_value(func);
        Ok(self.b().build_call(callee_value, &values, callee))
    }

    /// `e.m`: lane reads, `length` and `normalized` over a vec value.
    fn eval_member(
        &mut self,
        base: &Ast,
        member: &str,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        let value = self.eval_expr(base)?;
        if !self.is_vector(value) {
            return Err(CellError::at(pos, "vec expected"));
        }
        match member {
            "x" => {
                let index = self.module.const_i32(0);
                Ok(self.b().build_extract_element(value, index, "extract_x"))
            }
            "y" => {
                let index = self.module.const_i32(1);
                Ok(self.b().build_extract_element(value, index, "extract_y"))
            }
            "length" => {
                let length = self.intrinsic("cell_length", pos)?;
                Ok(self.b().build_call(length, &[value], "v_length"))
            }
            "normalized" => {
                let normalize = self.intrinsic("cell_normalize", pos)?;
                Ok(self.b().build_call(normalize, &[value], "v_normalized"))
            }
            _ => Err(CellError::at(pos, "unknown member")),
        }
    }

    /// `e[i]` dispatched on the type of `e`: vector lane read, array element
    /// load, or a call through one of the field-reader handles.
    fn eval_element(
        &mut self,
        base: &Ast,
        index: &Ast,
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        let base_v = self.eval_expr(base)?;
        let index_v = self.eval_expr(index)?;
        if !self.is_int(index_v) {
            return Err(CellError::at(pos, "int expected"));
        }

        if self.is_vector(base_v) {
            // constant lanes read through .x/.y instead
            if self.module.is_constant(index_v) {
                return Err(CellError::at(pos, "variable index expected"));
            }
            return Ok(self.b().build_extract_element(base_v, index_v, "v_element"));
        }
        if self.is_array_like(base_v) && self.is_pointer(base_v) {
            let zero = self.module.const_i32(0);
            let element = self.b().build_gep(base_v, &[zero, index_v], "a_element");
            return Ok(self.b().build_load(element, "a_element"));
        }
        if self.is_function(base_v) {
            let p_cells = self.p_cells;
            return Ok(self.b().build_call(base_v, &[p_cells, index_v], "read_call"));
        }
        Err(CellError::at(pos, "array expected"))
    }

    /// `vec(x, y)` builds a vector through the `cell_makeVec` intrinsic.
    fn eval_object_creation(
        &mut self,
        ty: TypeSpec,
        args: &[Ast],
        pos: &SourcePos,
    ) -> Result<ValueId, CellError> {
        if ty != TypeSpec::Vec {
            return Err(CellError::at(pos, "operation not supported"));
        }
        if args.len() != 2 {
            return Err(CellError::at(pos, "invalid number of arguments: vec"));
        }
        let x = self.eval_expr(&args[0])?;
        let y = self.eval_expr(&args[1])?;
        if !self.is_float(x) || !self.is_float(y) {
            return Err(CellError::at(pos, "real expected"));
        }
        let make_vec = self.intrinsic("cell_makeVec", pos)?;
        Ok(self.b().build_call(make_vec, &[x, y], "makeVec"))
    }
}
