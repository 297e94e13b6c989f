//! IR module: functions, basic blocks, instructions and values
//!
//! Everything is arena-allocated inside the [`Module`] and addressed through
//! opaque handles ([`ValueId`], [`BlockId`], [`FuncId`]). Callers never see
//! the instruction representation; they emit through the
//! [`Builder`](crate::Builder) and read results back through the typed
//! accessors here.

use crate::types::{BinOp, FCmpPred, ICmpPred, Ty, TyId};
use std::collections::HashMap;

/// Handle to a value (constant, parameter, function or instruction result).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub(crate) u32);

/// Handle to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

/// Handle to a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct InstId(pub(crate) u32);

#[derive(Debug, Clone)]
pub(crate) enum ValueKind {
    ConstInt { value: i64 },
    ConstFloat { value: f32 },
    Undef,
    Param { func: FuncId, index: usize },
    Func(FuncId),
    Inst(InstId),
}

#[derive(Debug, Clone)]
pub(crate) struct ValueData {
    pub(crate) ty: TyId,
    pub(crate) name: String,
    pub(crate) kind: ValueKind,
}

/// Instruction payload. Terminators are `Br`, `CondBr` and `RetVoid`.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Alloca { ty: TyId, count: Option<ValueId> },
    Load { ptr: ValueId },
    Store { value: ValueId, ptr: ValueId },
    Gep { ptr: ValueId, indices: Vec<ValueId> },
    ExtractElement { vec: ValueId, index: ValueId },
    InsertElement { vec: ValueId, elem: ValueId, index: ValueId },
    Binary { op: BinOp, lhs: ValueId, rhs: ValueId },
    ICmp { pred: ICmpPred, lhs: ValueId, rhs: ValueId },
    FCmp { pred: FCmpPred, lhs: ValueId, rhs: ValueId },
    Zext { value: ValueId },
    Not { value: ValueId },
    Neg { value: ValueId },
    FNeg { value: ValueId },
    Call { callee: ValueId, args: Vec<ValueId> },
    Br { dest: BlockId },
    CondBr { cond: ValueId, then_dest: BlockId, else_dest: BlockId },
    RetVoid,
}

impl Op {
    pub(crate) fn is_terminator(&self) -> bool {
        matches!(self, Op::Br { .. } | Op::CondBr { .. } | Op::RetVoid)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Inst {
    pub(crate) op: Op,
    pub(crate) result: Option<ValueId>,
}

#[derive(Debug, Clone)]
pub(crate) struct BlockData {
    pub(crate) label: String,
    pub(crate) func: FuncId,
    pub(crate) insts: Vec<InstId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Function {
    pub(crate) name: String,
    pub(crate) ty: TyId,
    pub(crate) params: Vec<ValueId>,
    /// Attached blocks, in attachment order. Empty for declarations.
    pub(crate) blocks: Vec<BlockId>,
    pub(crate) value: ValueId,
    /// Suffix counters keeping value names and block labels unique.
    pub(crate) used_names: HashMap<String, u32>,
}

/// An IR module: the unit handed to the compiler and later to the backend.
#[derive(Debug, Default)]
pub struct Module {
    pub(crate) tys: Vec<Ty>,
    ty_map: HashMap<Ty, TyId>,
    pub(crate) values: Vec<ValueData>,
    pub(crate) insts: Vec<Inst>,
    pub(crate) blocks: Vec<BlockData>,
    pub(crate) funcs: Vec<Function>,
    func_map: HashMap<String, FuncId>,
    /// Current insertion point of the builder, if any.
    pub(crate) ip: Option<BlockId>,
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    // ---------------------------------------------------------------- types

    /// Intern a type, returning the canonical handle for it.
    pub fn intern_ty(&mut self, ty: Ty) -> TyId {
        if let Some(&id) = self.ty_map.get(&ty) {
            return id;
        }
        let id = TyId(self.tys.len() as u32);
        self.tys.push(ty.clone());
        self.ty_map.insert(ty, id);
        id
    }

    pub fn ty(&self, id: TyId) -> &Ty {
        &self.tys[id.0 as usize]
    }

    pub fn ty_void(&mut self) -> TyId {
        self.intern_ty(Ty::Void)
    }

    pub fn ty_i1(&mut self) -> TyId {
        self.intern_ty(Ty::I1)
    }

    pub fn ty_i8(&mut self) -> TyId {
        self.intern_ty(Ty::I8)
    }

    pub fn ty_i32(&mut self) -> TyId {
        self.intern_ty(Ty::I32)
    }

    pub fn ty_f32(&mut self) -> TyId {
        self.intern_ty(Ty::F32)
    }

    pub fn ty_vector(&mut self, elem: TyId, lanes: u32) -> TyId {
        self.intern_ty(Ty::Vector { elem, lanes })
    }

    /// The `<2 x float>` vector type of the Cell language.
    pub fn ty_vec2f(&mut self) -> TyId {
        let f32 = self.ty_f32();
        self.ty_vector(f32, 2)
    }

    pub fn ty_ptr(&mut self, pointee: TyId) -> TyId {
        self.intern_ty(Ty::Ptr(pointee))
    }

    pub fn ty_array(&mut self, elem: TyId, len: u64) -> TyId {
        self.intern_ty(Ty::Array { elem, len })
    }

    pub fn ty_fn(&mut self, params: Vec<TyId>, ret: TyId) -> TyId {
        self.intern_ty(Ty::Fn { params, ret })
    }

    pub fn ty_struct(&mut self, name: &str, fields: Vec<TyId>) -> TyId {
        self.intern_ty(Ty::Struct { name: name.to_string(), fields })
    }

    /// The pointee of a pointer type, if `id` is one.
    pub fn pointee(&self, id: TyId) -> Option<TyId> {
        match self.ty(id) {
            Ty::Ptr(p) => Some(*p),
            _ => None,
        }
    }

    // --------------------------------------------------------------- values

    pub fn value_ty(&self, v: ValueId) -> TyId {
        self.values[v.0 as usize].ty
    }

    pub fn value_name(&self, v: ValueId) -> &str {
        &self.values[v.0 as usize].name
    }

    /// Whether a value is a compile-time constant (including `undef`).
    pub fn is_constant(&self, v: ValueId) -> bool {
        matches!(
            self.values[v.0 as usize].kind,
            ValueKind::ConstInt { .. } | ValueKind::ConstFloat { .. } | ValueKind::Undef
        )
    }

    pub(crate) fn push_value(&mut self, data: ValueData) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(data);
        id
    }

    pub fn const_i32(&mut self, value: i32) -> ValueId {
        let ty = self.ty_i32();
        self.push_value(ValueData {
            ty,
            name: String::new(),
            kind: ValueKind::ConstInt { value: value as i64 },
        })
    }

    pub fn const_i1(&mut self, value: bool) -> ValueId {
        let ty = self.ty_i1();
        self.push_value(ValueData {
            ty,
            name: String::new(),
            kind: ValueKind::ConstInt { value: value as i64 },
        })
    }

    pub fn const_f32(&mut self, value: f32) -> ValueId {
        let ty = self.ty_f32();
        self.push_value(ValueData {
            ty,
            name: String::new(),
            kind: ValueKind::ConstFloat { value },
        })
    }

    pub fn undef(&mut self, ty: TyId) -> ValueId {
        self.push_value(ValueData { ty, name: String::new(), kind: ValueKind::Undef })
    }

    // ------------------------------------------------------------ functions

    /// Create a function with the given signature. The function starts out as
    /// a declaration; attaching blocks turns it into a definition.
    pub fn add_function(&mut self, name: &str, ty: TyId, param_names: &[&str]) -> FuncId {
        let param_tys = match self.ty(ty) {
            Ty::Fn { params, .. } => params.clone(),
            other => panic!("add_function: not a function type: {:?}", other),
        };
        assert_eq!(
            param_tys.len(),
            param_names.len(),
            "add_function: parameter name count mismatch for '{}'",
            name
        );

        let id = FuncId(self.funcs.len() as u32);
        let value = self.push_value(ValueData {
            ty,
            name: name.to_string(),
            kind: ValueKind::Func(id),
        });

        let mut params = Vec::with_capacity(param_tys.len());
        let mut used_names = HashMap::new();
        for (index, (&pty, &pname)) in param_tys.iter().zip(param_names).enumerate() {
            params.push(self.push_value(ValueData {
                ty: pty,
                name: pname.to_string(),
                kind: ValueKind::Param { func: id, index },
            }));
            used_names.insert(pname.to_string(), 1);
        }

        self.funcs.push(Function {
            name: name.to_string(),
            ty,
            params,
            blocks: Vec::new(),
            value,
            used_names,
        });
        self.func_map.insert(name.to_string(), id);
        id
    }

    /// Look up a function by its exported name.
    pub fn get_function(&self, name: &str) -> Option<FuncId> {
        self.func_map.get(name).copied()
    }

    pub fn func_name(&self, f: FuncId) -> &str {
        &self.funcs[f.0 as usize].name
    }

    pub fn func_ty(&self, f: FuncId) -> TyId {
        self.funcs[f.0 as usize].ty
    }

    /// The function as a first-class value (callable, passable).
    pub fn func_value(&self, f: FuncId) -> ValueId {
        self.funcs[f.0 as usize].value
    }

    pub fn func_param(&self, f: FuncId, index: usize) -> ValueId {
        self.funcs[f.0 as usize].params[index]
    }

    pub fn func_param_count(&self, f: FuncId) -> usize {
        self.funcs[f.0 as usize].params.len()
    }

    /// Return type of a function value, if the value is one.
    pub fn callee_ret_ty(&self, callee: ValueId) -> Option<TyId> {
        match self.ty(self.value_ty(callee)) {
            Ty::Fn { ret, .. } => Some(*ret),
            _ => None,
        }
    }

    /// Whether the function has a body.
    pub fn is_definition(&self, f: FuncId) -> bool {
        !self.funcs[f.0 as usize].blocks.is_empty()
    }

    /// Make a name unique inside a function by appending a suffix counter.
    pub(crate) fn unique_name(&mut self, f: FuncId, hint: &str) -> String {
        let hint = if hint.is_empty() { "t" } else { hint };
        let counter = self.funcs[f.0 as usize]
            .used_names
            .entry(hint.to_string())
            .or_insert(0);
        let name = if *counter == 0 {
            hint.to_string()
        } else {
            format!("{}{}", hint, *counter)
        };
        *counter += 1;
        name
    }

    // --------------------------------------------------------------- blocks

    /// Create a detached basic block owned by `f`. The block does not appear
    /// in the function's block list until [`Module::append_block`].
    pub fn create_block(&mut self, f: FuncId, label: &str) -> BlockId {
        let label = self.unique_name(f, label);
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockData { label, func: f, insts: Vec::new() });
        id
    }

    /// Attach a block to the end of its function's block list.
    pub fn append_block(&mut self, f: FuncId, b: BlockId) {
        debug_assert_eq!(self.blocks[b.0 as usize].func, f, "block belongs to another function");
        self.funcs[f.0 as usize].blocks.push(b);
    }

    /// Create a block and attach it immediately.
    pub fn append_new_block(&mut self, f: FuncId, label: &str) -> BlockId {
        let b = self.create_block(f, label);
        self.append_block(f, b);
        b
    }

    /// The builder's current insertion block, without borrowing a builder.
    pub fn insertion_block(&self) -> Option<BlockId> {
        self.ip
    }

    /// The function's attached blocks, in order.
    pub fn blocks_of(&self, f: FuncId) -> &[BlockId] {
        &self.funcs[f.0 as usize].blocks
    }

    pub fn entry_block(&self, f: FuncId) -> Option<BlockId> {
        self.funcs[f.0 as usize].blocks.first().copied()
    }

    pub fn block_label(&self, b: BlockId) -> &str {
        &self.blocks[b.0 as usize].label
    }

    pub fn block_parent(&self, b: BlockId) -> FuncId {
        self.blocks[b.0 as usize].func
    }

    pub fn block_has_terminator(&self, b: BlockId) -> bool {
        self.blocks[b.0 as usize]
            .insts
            .last()
            .is_some_and(|&i| self.insts[i.0 as usize].op.is_terminator())
    }

    /// Drop the trailing terminator of a block, if present. Used when a
    /// cloned template body ends in `ret void` that the caller wants to
    /// replace with generated code.
    pub fn remove_terminator(&mut self, b: BlockId) -> bool {
        if self.block_has_terminator(b) {
            self.blocks[b.0 as usize].insts.pop();
            true
        } else {
            false
        }
    }

    // -------------------------------------------------------------- cloning

    /// Clone `template` (signature, parameter names and body) into a new
    /// function named `name`. Parameters and instruction results are remapped
    /// so the clone is fully independent of the template.
    pub fn clone_function(&mut self, template: FuncId, name: &str) -> FuncId {
        let ty = self.func_ty(template);
        let param_names: Vec<String> = self.funcs[template.0 as usize]
            .params
            .iter()
            .map(|&p| self.value_name(p).to_string())
            .collect();
        let param_name_refs: Vec<&str> = param_names.iter().map(String::as_str).collect();
        let new_func = self.add_function(name, ty, &param_name_refs);

        let mut value_map: HashMap<ValueId, ValueId> = HashMap::new();
        for index in 0..self.func_param_count(template) {
            value_map.insert(
                self.func_param(template, index),
                self.func_param(new_func, index),
            );
        }

        let template_blocks: Vec<BlockId> = self.funcs[template.0 as usize].blocks.clone();
        let mut block_map: HashMap<BlockId, BlockId> = HashMap::new();
        for &b in &template_blocks {
            let label = self.blocks[b.0 as usize].label.clone();
            let nb = self.create_block(new_func, &label);
            self.append_block(new_func, nb);
            block_map.insert(b, nb);
        }

        for &b in &template_blocks {
            let insts: Vec<InstId> = self.blocks[b.0 as usize].insts.clone();
            for inst_id in insts {
                let inst = self.insts[inst_id.0 as usize].clone();
                let op = self.remap_op(&inst.op, &value_map, &block_map);
                let result = inst.result.map(|old| {
                    let data = self.values[old.0 as usize].clone();
                    let name = self.unique_name(new_func, &data.name);
                    self.push_value(ValueData { ty: data.ty, name, kind: data.kind })
                });
                let new_inst = InstId(self.insts.len() as u32);
                self.insts.push(Inst { op, result });
                if let Some(r) = result {
                    self.values[r.0 as usize].kind = ValueKind::Inst(new_inst);
                    value_map.insert(inst.result.unwrap(), r);
                }
                let nb = block_map[&b];
                self.blocks[nb.0 as usize].insts.push(new_inst);
            }
        }

        new_func
    }

    fn remap_op(
        &self,
        op: &Op,
        values: &HashMap<ValueId, ValueId>,
        blocks: &HashMap<BlockId, BlockId>,
    ) -> Op {
        let v = |id: &ValueId| *values.get(id).unwrap_or(id);
        let b = |id: &BlockId| *blocks.get(id).unwrap_or(id);
        match op {
            Op::Alloca { ty, count } => Op::Alloca { ty: *ty, count: count.as_ref().map(v) },
            Op::Load { ptr } => Op::Load { ptr: v(ptr) },
            Op::Store { value, ptr } => Op::Store { value: v(value), ptr: v(ptr) },
            Op::Gep { ptr, indices } => {
                Op::Gep { ptr: v(ptr), indices: indices.iter().map(|i| v(i)).collect() }
            }
            Op::ExtractElement { vec, index } => {
                Op::ExtractElement { vec: v(vec), index: v(index) }
            }
            Op::InsertElement { vec, elem, index } => {
                Op::InsertElement { vec: v(vec), elem: v(elem), index: v(index) }
            }
            Op::Binary { op, lhs, rhs } => Op::Binary { op: *op, lhs: v(lhs), rhs: v(rhs) },
            Op::ICmp { pred, lhs, rhs } => Op::ICmp { pred: *pred, lhs: v(lhs), rhs: v(rhs) },
            Op::FCmp { pred, lhs, rhs } => Op::FCmp { pred: *pred, lhs: v(lhs), rhs: v(rhs) },
            Op::Zext { value } => Op::Zext { value: v(value) },
            Op::Not { value } => Op::Not { value: v(value) },
            Op::Neg { value } => Op::Neg { value: v(value) },
            Op::FNeg { value } => Op::FNeg { value: v(value) },
            Op::Call { callee, args } => {
                Op::Call { callee: v(callee), args: args.iter().map(|a| v(a)).collect() }
            }
            Op::Br { dest } => Op::Br { dest: b(dest) },
            Op::CondBr { cond, then_dest, else_dest } => Op::CondBr {
                cond: v(cond),
                then_dest: b(then_dest),
                else_dest: b(else_dest),
            },
            Op::RetVoid => Op::RetVoid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_interning_dedupes() {
        let mut m = Module::new();
        let a = m.ty_vec2f();
        let b = m.ty_vec2f();
        assert_eq!(a, b);
        let p1 = m.ty_ptr(a);
        let p2 = m.ty_ptr(b);
        assert_eq!(p1, p2);
        assert_ne!(a, p1);
    }

    #[test]
    fn test_function_lookup_and_params() {
        let mut m = Module::new();
        let f32 = m.ty_f32();
        let ty = m.ty_fn(vec![f32], f32);
        let f = m.add_function("cell_sqrt", ty, &["x"]);
        assert_eq!(m.get_function("cell_sqrt"), Some(f));
        assert_eq!(m.func_param_count(f), 1);
        assert_eq!(m.value_name(m.func_param(f, 0)), "x");
        assert!(!m.is_definition(f));
    }

    #[test]
    fn test_clone_function_preserves_parameter_names() {
        let mut m = Module::new();
        let void = m.ty_void();
        let i32_ty = m.ty_i32();
        let ty = m.ty_fn(vec![i32_ty], void);
        let template = m.add_function("tmpl", ty, &["count"]);
        let entry = m.append_new_block(template, "entry");
        let mut b = m.builder();
        b.position_at_end(entry);
        b.build_ret_void();
        b.clear_insertion_point();

        let clone = m.clone_function(template, "clone_0");
        assert_eq!(m.func_name(clone), "clone_0");
        assert_eq!(m.value_name(m.func_param(clone, 0)), "count");
        assert_eq!(m.blocks_of(clone).len(), 1);
        let cloned_entry = m.entry_block(clone).unwrap();
        assert!(m.block_has_terminator(cloned_entry));
        assert!(m.remove_terminator(cloned_entry));
        assert!(!m.block_has_terminator(cloned_entry));
    }
}
