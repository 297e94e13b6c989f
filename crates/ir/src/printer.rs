//! LLVM-style textual rendering
//!
//! The printed form exists for `--emit-ir`, debugging and tests; it is not
//! parsed back. Output follows LLVM assembly syntax with typed pointers.

use crate::module::{FuncId, Module, Op, ValueId, ValueKind};
use crate::types::{Ty, TyId};
use std::fmt::Write as _;

impl Module {
    pub fn ty_string(&self, id: TyId) -> String {
        match self.ty(id) {
            Ty::Void => "void".to_string(),
            Ty::I1 => "i1".to_string(),
            Ty::I8 => "i8".to_string(),
            Ty::I32 => "i32".to_string(),
            Ty::F32 => "float".to_string(),
            Ty::Vector { elem, lanes } => {
                format!("<{} x {}>", lanes, self.ty_string(*elem))
            }
            Ty::Ptr(p) => format!("{}*", self.ty_string(*p)),
            Ty::Array { elem, len } => format!("[{} x {}]", len, self.ty_string(*elem)),
            Ty::Fn { params, ret } => {
                let params: Vec<String> = params.iter().map(|&p| self.ty_string(p)).collect();
                format!("{} ({})", self.ty_string(*ret), params.join(", "))
            }
            Ty::Struct { name, .. } => format!("%{}", name),
        }
    }

    fn value_string(&self, v: ValueId) -> String {
        match &self.values[v.0 as usize].kind {
            ValueKind::ConstInt { value } => value.to_string(),
            ValueKind::ConstFloat { value } => {
                if value.fract() == 0.0 && value.is_finite() {
                    format!("{:.1}", value)
                } else {
                    format!("{}", value)
                }
            }
            ValueKind::Undef => "undef".to_string(),
            ValueKind::Param { .. } | ValueKind::Inst(_) => {
                format!("%{}", self.value_name(v))
            }
            ValueKind::Func(_) => format!("@{}", self.value_name(v)),
        }
    }

    /// `i32 %x`, `float 1.0`, `<2 x float> %v`, ...
    fn typed_value(&self, v: ValueId) -> String {
        format!("{} {}", self.ty_string(self.value_ty(v)), self.value_string(v))
    }

    fn inst_string(&self, op: &Op, result: Option<ValueId>) -> String {
        let lhs = match result {
            Some(r) => format!("%{} = ", self.value_name(r)),
            None => String::new(),
        };
        let body = match op {
            Op::Alloca { ty, count } => match count {
                Some(c) => format!("alloca {}, {}", self.ty_string(*ty), self.typed_value(*c)),
                None => format!("alloca {}", self.ty_string(*ty)),
            },
            Op::Load { ptr } => {
                let pointee = self.pointee(self.value_ty(*ptr)).expect("load from non-pointer");
                format!("load {}, {}", self.ty_string(pointee), self.typed_value(*ptr))
            }
            Op::Store { value, ptr } => {
                format!("store {}, {}", self.typed_value(*value), self.typed_value(*ptr))
            }
            Op::Gep { ptr, indices } => {
                let pointee = self.pointee(self.value_ty(*ptr)).expect("gep on non-pointer");
                let mut s = format!(
                    "getelementptr {}, {}",
                    self.ty_string(pointee),
                    self.typed_value(*ptr)
                );
                for i in indices {
                    let _ = write!(s, ", {}", self.typed_value(*i));
                }
                s
            }
            Op::ExtractElement { vec, index } => {
                format!("extractelement {}, {}", self.typed_value(*vec), self.typed_value(*index))
            }
            Op::InsertElement { vec, elem, index } => format!(
                "insertelement {}, {}, {}",
                self.typed_value(*vec),
                self.typed_value(*elem),
                self.typed_value(*index)
            ),
            Op::Binary { op, lhs: l, rhs: r } => format!(
                "{} {} {}, {}",
                op.mnemonic(),
                self.ty_string(self.value_ty(*l)),
                self.value_string(*l),
                self.value_string(*r)
            ),
            Op::ICmp { pred, lhs: l, rhs: r } => format!(
                "icmp {} {} {}, {}",
                pred.mnemonic(),
                self.ty_string(self.value_ty(*l)),
                self.value_string(*l),
                self.value_string(*r)
            ),
            Op::FCmp { pred, lhs: l, rhs: r } => format!(
                "fcmp {} {} {}, {}",
                pred.mnemonic(),
                self.ty_string(self.value_ty(*l)),
                self.value_string(*l),
                self.value_string(*r)
            ),
            Op::Zext { value } => {
                let to = result.map(|r| self.value_ty(r)).expect("zext without result");
                format!("zext {} to {}", self.typed_value(*value), self.ty_string(to))
            }
            Op::Not { value } => {
                format!(
                    "xor {} {}, -1",
                    self.ty_string(self.value_ty(*value)),
                    self.value_string(*value)
                )
            }
            Op::Neg { value } => {
                format!(
                    "sub {} 0, {}",
                    self.ty_string(self.value_ty(*value)),
                    self.value_string(*value)
                )
            }
            Op::FNeg { value } => format!("fneg {}", self.typed_value(*value)),
            Op::Call { callee, args } => {
                let ret = self.callee_ret_ty(*callee).expect("call of non-function");
                let args: Vec<String> = args.iter().map(|&a| self.typed_value(a)).collect();
                format!(
                    "call {} {}({})",
                    self.ty_string(ret),
                    self.value_string(*callee),
                    args.join(", ")
                )
            }
            Op::Br { dest } => format!("br label %{}", self.block_label(*dest)),
            Op::CondBr { cond, then_dest, else_dest } => format!(
                "br {}, label %{}, label %{}",
                self.typed_value(*cond),
                self.block_label(*then_dest),
                self.block_label(*else_dest)
            ),
            Op::RetVoid => "ret void".to_string(),
        };
        format!("{}{}", lhs, body)
    }

    fn signature_string(&self, f: FuncId, with_param_names: bool) -> String {
        let (params, ret) = match self.ty(self.func_ty(f)) {
            Ty::Fn { params, ret } => (params.clone(), *ret),
            _ => unreachable!("function without function type"),
        };
        let rendered: Vec<String> = params
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                if with_param_names {
                    format!("{} %{}", self.ty_string(p), self.value_name(self.func_param(f, i)))
                } else {
                    self.ty_string(p)
                }
            })
            .collect();
        format!(
            "{} @{}({})",
            self.ty_string(ret),
            self.func_name(f),
            rendered.join(", ")
        )
    }

    /// Render a single function definition (or declaration).
    pub fn print_function(&self, f: FuncId) -> String {
        let mut out = String::new();
        if !self.is_definition(f) {
            let _ = writeln!(out, "declare {}", self.signature_string(f, false));
            return out;
        }
        let _ = writeln!(out, "define {} {{", self.signature_string(f, true));
        for &b in self.blocks_of(f) {
            let _ = writeln!(out, "{}:", self.block_label(b));
            for &i in &self.blocks[b.0 as usize].insts {
                let inst = &self.insts[i.0 as usize];
                let _ = writeln!(out, "  {}", self.inst_string(&inst.op, inst.result));
            }
        }
        let _ = writeln!(out, "}}");
        out
    }

    /// Render the whole module: named struct types, declarations, definitions.
    pub fn print_to_string(&self) -> String {
        let mut out = String::new();
        for ty in &self.tys {
            if let Ty::Struct { name, fields } = ty {
                let fields: Vec<String> = fields.iter().map(|&f| self.ty_string(f)).collect();
                let _ = writeln!(out, "%{} = type {{ {} }}", name, fields.join(", "));
            }
        }
        if !out.is_empty() {
            let _ = writeln!(out);
        }
        for (i, func) in self.funcs.iter().enumerate() {
            let f = FuncId(i as u32);
            if func.blocks.is_empty() {
                out.push_str(&self.print_function(f));
            }
        }
        for (i, func) in self.funcs.iter().enumerate() {
            let f = FuncId(i as u32);
            if !func.blocks.is_empty() {
                let _ = writeln!(out);
                out.push_str(&self.print_function(f));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_simple_function() {
        let mut m = Module::new();
        let void = m.ty_void();
        let i32_ty = m.ty_i32();
        let ty = m.ty_fn(vec![i32_ty], void);
        let f = m.add_function("f", ty, &["n"]);
        let entry = m.append_new_block(f, "entry");
        let mut b = m.builder();
        b.position_at_end(entry);
        let slot = b.build_alloca(i32_ty, None, "x");
        let n = m.func_param(f, 0);
        let mut b = m.builder();
        b.build_store(n, slot);
        let loaded = b.build_load(slot, "x");
        let one = m.const_i32(1);
        let mut b = m.builder();
        let sum = b.build_add(loaded, one, "i_add");
        b.build_store(sum, slot);
        b.build_ret_void();

        let text = m.print_function(f);
        assert!(text.contains("define void @f(i32 %n) {"));
        assert!(text.contains("entry:"));
        assert!(text.contains("%x = alloca i32"));
        assert!(text.contains("store i32 %n, i32* %x"));
        assert!(text.contains("load i32, i32* %x"));
        assert!(text.contains("add i32 %x1, 1"));
        assert!(text.contains("ret void"));
    }

    #[test]
    fn test_print_declaration_and_struct() {
        let mut m = Module::new();
        let f32_ty = m.ty_f32();
        let i8_ty = m.ty_i8();
        let i8p = m.ty_ptr(i8_ty);
        let vec2 = m.ty_vec2f();
        let _cell = m.ty_struct("Cell", vec![f32_ty, vec2, vec2, i8p]);
        let ty = m.ty_fn(vec![vec2], f32_ty);
        m.add_function("cell_length", ty, &["v"]);

        let text = m.print_to_string();
        assert!(text.contains("%Cell = type { float, <2 x float>, <2 x float>, i8* }"));
        assert!(text.contains("declare float @cell_length(<2 x float>)"));
    }
}
