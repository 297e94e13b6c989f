//! Instruction builder
//!
//! The builder follows the insertion-point model: it is positioned at the end
//! of a basic block and appends instructions there until repositioned or
//! cleared. The insertion point lives in the [`Module`], so a fresh `Builder`
//! borrow resumes exactly where the previous one stopped.
//!
//! Type errors in emitted instructions are programmer errors, not user
//! errors, and panic; the caller is expected to have type-checked the source
//! before emitting.

use crate::module::{BlockId, FuncId, Inst, InstId, Module, Op, ValueData, ValueId, ValueKind};
use crate::types::{BinOp, FCmpPred, ICmpPred, Ty, TyId};

/// A short-lived handle emitting instructions into a [`Module`].
pub struct Builder<'m> {
    m: &'m mut Module,
}

impl Module {
    pub fn builder(&mut self) -> Builder<'_> {
        Builder { m: self }
    }
}

impl<'m> Builder<'m> {
    // ------------------------------------------------------ insertion point

    /// Position the builder at the end of `block`.
    pub fn position_at_end(&mut self, block: BlockId) {
        self.m.ip = Some(block);
    }

    /// Detach the builder; subsequent emission is a bug until repositioned.
    pub fn clear_insertion_point(&mut self) {
        self.m.ip = None;
    }

    /// The block the builder is currently positioned in, if any.
    pub fn insert_block(&self) -> Option<BlockId> {
        self.m.ip
    }

    fn current_block(&self) -> BlockId {
        self.m.ip.expect("builder has no insertion point")
    }

    fn current_func(&self) -> FuncId {
        self.m.block_parent(self.current_block())
    }

    /// Append an instruction at the insertion point; create its result value
    /// when `result` carries a type and name hint.
    fn push(&mut self, op: Op, result: Option<(TyId, &str)>) -> Option<ValueId> {
        let block = self.current_block();
        let func = self.current_func();
        let value = result.map(|(ty, hint)| {
            let name = self.m.unique_name(func, hint);
            self.m.push_value(ValueData { ty, name, kind: ValueKind::Inst(InstId(0)) })
        });
        let inst = InstId(self.m.insts.len() as u32);
        self.m.insts.push(Inst { op, result: value });
        if let Some(v) = value {
            self.m.values[v.0 as usize].kind = ValueKind::Inst(inst);
        }
        self.m.blocks[block.0 as usize].insts.push(inst);
        value
    }

    fn value_ty(&self, v: ValueId) -> TyId {
        self.m.value_ty(v)
    }

    // --------------------------------------------------------------- memory

    /// Stack allocation at the insertion point. `count` allocates that many
    /// elements (used by nothing but arrays in practice).
    pub fn build_alloca(&mut self, ty: TyId, count: Option<ValueId>, name: &str) -> ValueId {
        let ptr_ty = self.m.ty_ptr(ty);
        self.push(Op::Alloca { ty, count }, Some((ptr_ty, name)))
            .unwrap()
    }

    /// Prepend an alloca to the entry block of `func` so the allocation
    /// dominates every use regardless of where the declaration appears.
    pub fn build_entry_alloca(
        &mut self,
        func: FuncId,
        ty: TyId,
        count: Option<ValueId>,
        name: &str,
    ) -> ValueId {
        let entry = self
            .m
            .entry_block(func)
            .expect("build_entry_alloca: function has no entry block");
        let ptr_ty = self.m.ty_ptr(ty);
        let value_name = self.m.unique_name(func, name);
        let value = self.m.push_value(ValueData {
            ty: ptr_ty,
            name: value_name,
            kind: ValueKind::Inst(InstId(0)),
        });
        let inst = InstId(self.m.insts.len() as u32);
        self.m.insts.push(Inst { op: Op::Alloca { ty, count }, result: Some(value) });
        self.m.values[value.0 as usize].kind = ValueKind::Inst(inst);
        self.m.blocks[entry.0 as usize].insts.insert(0, inst);
        value
    }

    pub fn build_load(&mut self, ptr: ValueId, name: &str) -> ValueId {
        let pointee = self
            .m
            .pointee(self.value_ty(ptr))
            .expect("build_load: operand is not a pointer");
        self.push(Op::Load { ptr }, Some((pointee, name))).unwrap()
    }

    pub fn build_store(&mut self, value: ValueId, ptr: ValueId) {
        let pointee = self
            .m
            .pointee(self.value_ty(ptr))
            .expect("build_store: target is not a pointer");
        assert_eq!(pointee, self.value_ty(value), "build_store: type mismatch");
        self.push(Op::Store { value, ptr }, None);
    }

    /// `getelementptr` over a typed pointer. The first index steps the
    /// pointer itself; later indices descend into arrays/vectors/structs.
    pub fn build_gep(&mut self, ptr: ValueId, indices: &[ValueId], name: &str) -> ValueId {
        assert!(!indices.is_empty(), "build_gep: at least one index required");
        let mut ty = self
            .m
            .pointee(self.value_ty(ptr))
            .expect("build_gep: operand is not a pointer");
        for _ in &indices[1..] {
            ty = match self.m.ty(ty) {
                Ty::Array { elem, .. } => *elem,
                Ty::Vector { elem, .. } => *elem,
                other => panic!("build_gep: cannot index into {:?}", other),
            };
        }
        let result_ty = self.m.ty_ptr(ty);
        self.push(Op::Gep { ptr, indices: indices.to_vec() }, Some((result_ty, name)))
            .unwrap()
    }

    // -------------------------------------------------------------- vectors

    pub fn build_extract_element(&mut self, vec: ValueId, index: ValueId, name: &str) -> ValueId {
        let elem = match self.m.ty(self.value_ty(vec)) {
            Ty::Vector { elem, .. } => *elem,
            other => panic!("build_extract_element: not a vector: {:?}", other),
        };
        self.push(Op::ExtractElement { vec, index }, Some((elem, name)))
            .unwrap()
    }

    pub fn build_insert_element(
        &mut self,
        vec: ValueId,
        elem: ValueId,
        index: ValueId,
        name: &str,
    ) -> ValueId {
        let vec_ty = self.value_ty(vec);
        self.push(Op::InsertElement { vec, elem, index }, Some((vec_ty, name)))
            .unwrap()
    }

    /// Broadcast a scalar into an `lanes`-wide vector of its type via
    /// repeated `insertelement` over `undef`.
    pub fn build_vector_splat(&mut self, lanes: u32, scalar: ValueId, name: &str) -> ValueId {
        let elem_ty = self.value_ty(scalar);
        let vec_ty = self.m.ty_vector(elem_ty, lanes);
        let mut vec = self.m.undef(vec_ty);
        for lane in 0..lanes {
            let index = self.m.const_i32(lane as i32);
            vec = self.build_insert_element(vec, scalar, index, name);
        }
        vec
    }

    // ----------------------------------------------------------- arithmetic

    fn build_binary(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId, name: &str) -> ValueId {
        let lty = self.value_ty(lhs);
        assert_eq!(lty, self.value_ty(rhs), "build {}: operand type mismatch", op.mnemonic());
        self.push(Op::Binary { op, lhs, rhs }, Some((lty, name))).unwrap()
    }

    pub fn build_add(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::Add, l, r, name)
    }

    pub fn build_sub(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::Sub, l, r, name)
    }

    pub fn build_mul(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::Mul, l, r, name)
    }

    pub fn build_sdiv(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::SDiv, l, r, name)
    }

    pub fn build_srem(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::SRem, l, r, name)
    }

    pub fn build_fadd(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::FAdd, l, r, name)
    }

    pub fn build_fsub(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::FSub, l, r, name)
    }

    pub fn build_fmul(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::FMul, l, r, name)
    }

    pub fn build_fdiv(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::FDiv, l, r, name)
    }

    pub fn build_frem(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::FRem, l, r, name)
    }

    pub fn build_shl(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::Shl, l, r, name)
    }

    pub fn build_ashr(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::AShr, l, r, name)
    }

    pub fn build_and(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::And, l, r, name)
    }

    pub fn build_or(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::Or, l, r, name)
    }

    pub fn build_xor(&mut self, l: ValueId, r: ValueId, name: &str) -> ValueId {
        self.build_binary(BinOp::Xor, l, r, name)
    }

    pub fn build_neg(&mut self, value: ValueId, name: &str) -> ValueId {
        let ty = self.value_ty(value);
        assert!(self.m.ty(ty).is_integer(), "build_neg: int operand expected");
        self.push(Op::Neg { value }, Some((ty, name))).unwrap()
    }

    pub fn build_fneg(&mut self, value: ValueId, name: &str) -> ValueId {
        let ty = self.value_ty(value);
        self.push(Op::FNeg { value }, Some((ty, name))).unwrap()
    }

    pub fn build_not(&mut self, value: ValueId, name: &str) -> ValueId {
        let ty = self.value_ty(value);
        assert!(self.m.ty(ty).is_integer(), "build_not: int operand expected");
        self.push(Op::Not { value }, Some((ty, name))).unwrap()
    }

    // ------------------------------------------------------- compare / cast

    pub fn build_icmp(&mut self, pred: ICmpPred, lhs: ValueId, rhs: ValueId, name: &str) -> ValueId {
        assert_eq!(self.value_ty(lhs), self.value_ty(rhs), "build_icmp: type mismatch");
        let i1 = self.m.ty_i1();
        self.push(Op::ICmp { pred, lhs, rhs }, Some((i1, name))).unwrap()
    }

    /// Float comparison; over vector operands the result is a vector of `i1`.
    pub fn build_fcmp(&mut self, pred: FCmpPred, lhs: ValueId, rhs: ValueId, name: &str) -> ValueId {
        let lty = self.value_ty(lhs);
        assert_eq!(lty, self.value_ty(rhs), "build_fcmp: type mismatch");
        let i1 = self.m.ty_i1();
        let lanes = match self.m.ty(lty) {
            Ty::Vector { lanes, .. } => Some(*lanes),
            _ => None,
        };
        let result_ty = match lanes {
            Some(n) => self.m.ty_vector(i1, n),
            None => i1,
        };
        self.push(Op::FCmp { pred, lhs, rhs }, Some((result_ty, name)))
            .unwrap()
    }

    pub fn build_zext(&mut self, value: ValueId, ty: TyId, name: &str) -> ValueId {
        self.push(Op::Zext { value }, Some((ty, name))).unwrap()
    }

    // ---------------------------------------------------- calls and control

    pub fn build_call(&mut self, callee: ValueId, args: &[ValueId], name: &str) -> ValueId {
        let ret = self
            .m
            .callee_ret_ty(callee)
            .expect("build_call: callee is not a function");
        let result = if matches!(self.m.ty(ret), Ty::Void) {
            None
        } else {
            Some((ret, name))
        };
        let value = self.push(Op::Call { callee, args: args.to_vec() }, result);
        // void calls still need a value for uniform handling downstream
        value.unwrap_or_else(|| self.m.undef(ret))
    }

    pub fn build_br(&mut self, dest: BlockId) {
        self.push(Op::Br { dest }, None);
    }

    pub fn build_cond_br(&mut self, cond: ValueId, then_dest: BlockId, else_dest: BlockId) {
        let i1 = self.m.ty_i1();
        assert_eq!(self.value_ty(cond), i1, "build_cond_br: condition must be i1");
        self.push(Op::CondBr { cond, then_dest, else_dest }, None);
    }

    pub fn build_ret_void(&mut self) {
        self.push(Op::RetVoid, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_module() -> (Module, FuncId) {
        let mut m = Module::new();
        let void = m.ty_void();
        let ty = m.ty_fn(vec![], void);
        let f = m.add_function("f", ty, &[]);
        let entry = m.append_new_block(f, "entry");
        m.builder().position_at_end(entry);
        (m, f)
    }

    #[test]
    fn test_alloca_load_store_roundtrip_types() {
        let (mut m, _f) = test_module();
        let i32_ty = m.ty_i32();
        let mut b = m.builder();
        let slot = b.build_alloca(i32_ty, None, "x");
        let c = m.const_i32(7);
        let mut b = m.builder();
        b.build_store(c, slot);
        let loaded = b.build_load(slot, "x");
        assert_eq!(m.value_ty(loaded), i32_ty);
        assert_eq!(m.pointee(m.value_ty(slot)), Some(i32_ty));
    }

    #[test]
    fn test_entry_alloca_prepends() {
        let (mut m, f) = test_module();
        let i32_ty = m.ty_i32();
        let f32_ty = m.ty_f32();
        m.builder().build_alloca(i32_ty, None, "first");
        m.builder().build_entry_alloca(f, f32_ty, None, "hoisted");
        let entry = m.entry_block(f).unwrap();
        let first_inst = m.blocks[entry.0 as usize].insts[0];
        let result = m.insts[first_inst.0 as usize].result.unwrap();
        assert_eq!(m.value_name(result), "hoisted");
    }

    #[test]
    fn test_vector_splat_emits_two_inserts() {
        let (mut m, f) = test_module();
        let c = m.const_f32(1.5);
        let splat = m.builder().build_vector_splat(2, c, "splat_r");
        let vec2 = m.ty_vec2f();
        assert_eq!(m.value_ty(splat), vec2);
        let entry = m.entry_block(f).unwrap();
        assert_eq!(m.blocks[entry.0 as usize].insts.len(), 2);
    }

    #[test]
    fn test_fcmp_on_vectors_widens_result() {
        let (mut m, _f) = test_module();
        let c = m.const_f32(0.0);
        let v = m.builder().build_vector_splat(2, c, "v");
        let cmp = m.builder().build_fcmp(FCmpPred::Oeq, v, v, "v_eq");
        let i1 = m.ty_i1();
        let expected = m.ty_vector(i1, 2);
        assert_eq!(m.value_ty(cmp), expected);
    }

    #[test]
    fn test_terminator_detection() {
        let (mut m, f) = test_module();
        let entry = m.entry_block(f).unwrap();
        assert!(!m.block_has_terminator(entry));
        m.builder().build_ret_void();
        assert!(m.block_has_terminator(entry));
    }
}
