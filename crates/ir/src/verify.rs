//! Function verifier
//!
//! Structural well-formedness checks run after a function has been fully
//! populated. Verification is advisory: it returns the list of violations and
//! never mutates the module, so the caller decides whether to keep the
//! emitted function.

use crate::module::{FuncId, Module, Op, ValueId, ValueKind};
use crate::types::Ty;
use std::collections::HashSet;

impl Module {
    /// Verify a populated function. Returns the violations found, empty on a
    /// well-formed function. A declaration verifies trivially.
    pub fn verify_function(&self, f: FuncId) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let name = self.func_name(f);

        let mut defined: HashSet<ValueId> = HashSet::new();
        for &p in &self.funcs[f.0 as usize].params {
            defined.insert(p);
        }

        let attached: HashSet<_> = self.blocks_of(f).iter().copied().collect();

        for &b in self.blocks_of(f) {
            let block = &self.blocks[b.0 as usize];
            let label = &block.label;

            if block.insts.is_empty() {
                errors.push(format!("{}: block '{}' is empty (no terminator)", name, label));
                continue;
            }

            let last = *block.insts.last().unwrap();
            if !self.insts[last.0 as usize].op.is_terminator() {
                errors.push(format!("{}: block '{}' does not end in a terminator", name, label));
            }

            for (pos, &i) in block.insts.iter().enumerate() {
                let inst = &self.insts[i.0 as usize];
                let is_last = pos + 1 == block.insts.len();
                if inst.op.is_terminator() && !is_last {
                    errors.push(format!(
                        "{}: block '{}' has an instruction after its terminator",
                        name, label
                    ));
                }

                for operand in self.op_operands(&inst.op) {
                    let ok = match &self.values[operand.0 as usize].kind {
                        ValueKind::ConstInt { .. }
                        | ValueKind::ConstFloat { .. }
                        | ValueKind::Undef
                        | ValueKind::Func(_) => true,
                        ValueKind::Param { func, .. } => *func == f,
                        ValueKind::Inst(_) => defined.contains(&operand),
                    };
                    if !ok {
                        errors.push(format!(
                            "{}: block '{}' uses value '%{}' before its definition",
                            name,
                            label,
                            self.value_name(operand)
                        ));
                    }
                }

                match &inst.op {
                    Op::Br { dest } => {
                        if !attached.contains(dest) {
                            errors.push(format!(
                                "{}: branch to detached block '{}'",
                                name,
                                self.block_label(*dest)
                            ));
                        }
                    }
                    Op::CondBr { then_dest, else_dest, .. } => {
                        for dest in [then_dest, else_dest] {
                            if !attached.contains(dest) {
                                errors.push(format!(
                                    "{}: branch to detached block '{}'",
                                    name,
                                    self.block_label(*dest)
                                ));
                            }
                        }
                    }
                    Op::Call { callee, .. } => {
                        if !matches!(self.ty(self.value_ty(*callee)), Ty::Fn { .. }) {
                            errors.push(format!("{}: call of a non-function value", name));
                        }
                    }
                    Op::Store { value, ptr } => {
                        if self.pointee(self.value_ty(*ptr)) != Some(self.value_ty(*value)) {
                            errors.push(format!("{}: store type mismatch in '{}'", name, label));
                        }
                    }
                    _ => {}
                }

                if let Some(r) = inst.result {
                    defined.insert(r);
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn op_operands(&self, op: &Op) -> Vec<ValueId> {
        match op {
            Op::Alloca { count, .. } => count.iter().copied().collect(),
            Op::Load { ptr } => vec![*ptr],
            Op::Store { value, ptr } => vec![*value, *ptr],
            Op::Gep { ptr, indices } => {
                let mut v = vec![*ptr];
                v.extend_from_slice(indices);
                v
            }
            Op::ExtractElement { vec, index } => vec![*vec, *index],
            Op::InsertElement { vec, elem, index } => vec![*vec, *elem, *index],
            Op::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Op::ICmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Op::FCmp { lhs, rhs, .. } => vec![*lhs, *rhs],
            Op::Zext { value } | Op::Not { value } | Op::Neg { value } | Op::FNeg { value } => {
                vec![*value]
            }
            Op::Call { callee, args } => {
                let mut v = vec![*callee];
                v.extend_from_slice(args);
                v
            }
            Op::Br { .. } | Op::RetVoid => Vec::new(),
            Op::CondBr { cond, .. } => vec![*cond],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn void_fn(m: &mut Module, name: &str) -> FuncId {
        let void = m.ty_void();
        let ty = m.ty_fn(vec![], void);
        m.add_function(name, ty, &[])
    }

    #[test]
    fn test_wellformed_function_verifies() {
        let mut m = Module::new();
        let f = void_fn(&mut m, "ok");
        let entry = m.append_new_block(f, "entry");
        let mut b = m.builder();
        b.position_at_end(entry);
        b.build_ret_void();
        assert!(m.verify_function(f).is_ok());
    }

    #[test]
    fn test_missing_terminator_is_flagged() {
        let mut m = Module::new();
        let f = void_fn(&mut m, "bad");
        let entry = m.append_new_block(f, "entry");
        let i32_ty = m.ty_i32();
        let mut b = m.builder();
        b.position_at_end(entry);
        b.build_alloca(i32_ty, None, "x");
        let errors = m.verify_function(f).unwrap_err();
        assert!(errors[0].contains("does not end in a terminator"));
    }

    #[test]
    fn test_branch_to_detached_block_is_flagged() {
        let mut m = Module::new();
        let f = void_fn(&mut m, "bad");
        let entry = m.append_new_block(f, "entry");
        let detached = m.create_block(f, "orphan");
        let mut b = m.builder();
        b.position_at_end(entry);
        b.build_br(detached);
        let errors = m.verify_function(f).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("detached block 'orphan'")));
    }
}
