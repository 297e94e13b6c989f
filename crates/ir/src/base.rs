//! The base module
//!
//! Builds the IR module every compilation starts from: the `%Cell` struct,
//! declarations for the field readers and math intrinsics, and the defined
//! `cell_main_template` whose body gets cloned into each compiled script.
//!
//! Exported names and signatures are a contract shared with the simulator
//! runtime; changing them breaks script loading.

use crate::module::Module;

/// Construct a module pre-populated with the Cell intrinsics.
///
/// | name | signature |
/// |---|---|
/// | `cell_main_template` | `void (Cell*, i32, f32, vec*)` |
/// | `read_radius` | `f32 (Cell*, i32)` |
/// | `read_position` | `vec (Cell*, i32)` |
/// | `read_velocity` | `vec (Cell*, i32)` |
/// | `cell_sqrt` | `f32 (f32)` |
/// | `cell_length` | `f32 (vec)` |
/// | `cell_normalize` | `vec (vec)` |
/// | `cell_dot` | `f32 (vec, vec)` |
/// | `cell_makeVec` | `vec (f32, f32)` |
pub fn base_module() -> Module {
    let mut m = Module::new();

    let void = m.ty_void();
    let i32_ty = m.ty_i32();
    let f32_ty = m.ty_f32();
    let vec = m.ty_vec2f();
    let i8_ty = m.ty_i8();
    let padding = m.ty_ptr(i8_ty);

    // 32-byte simulation record: { radius, position, velocity, padding }
    let cell = m.ty_struct("Cell", vec![f32_ty, vec, vec, padding]);
    let cell_ptr = m.ty_ptr(cell);
    let vec_ptr = m.ty_ptr(vec);

    let reader_f32 = m.ty_fn(vec![cell_ptr, i32_ty], f32_ty);
    let reader_vec = m.ty_fn(vec![cell_ptr, i32_ty], vec);
    m.add_function("read_radius", reader_f32, &["cells", "index"]);
    m.add_function("read_position", reader_vec, &["cells", "index"]);
    m.add_function("read_velocity", reader_vec, &["cells", "index"]);

    let sqrt_ty = m.ty_fn(vec![f32_ty], f32_ty);
    m.add_function("cell_sqrt", sqrt_ty, &["x"]);
    let length_ty = m.ty_fn(vec![vec], f32_ty);
    m.add_function("cell_length", length_ty, &["v"]);
    let normalize_ty = m.ty_fn(vec![vec], vec);
    m.add_function("cell_normalize", normalize_ty, &["v"]);
    let dot_ty = m.ty_fn(vec![vec, vec], f32_ty);
    m.add_function("cell_dot", dot_ty, &["a", "b"]);
    let make_vec_ty = m.ty_fn(vec![f32_ty, f32_ty], vec);
    m.add_function("cell_makeVec", make_vec_ty, &["x", "y"]);

    // The clone source: an empty body that generated code replaces.
    let main_ty = m.ty_fn(vec![cell_ptr, i32_ty, f32_ty, vec_ptr], void);
    let template = m.add_function(
        "cell_main_template",
        main_ty,
        &["pCells", "cellCount", "arenaRadius", "force"],
    );
    let entry = m.append_new_block(template, "entry");
    let mut b = m.builder();
    b.position_at_end(entry);
    b.build_ret_void();
    b.clear_insertion_point();

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_module_contract() {
        let m = base_module();
        for name in [
            "cell_main_template",
            "read_radius",
            "read_position",
            "read_velocity",
            "cell_sqrt",
            "cell_length",
            "cell_normalize",
            "cell_dot",
            "cell_makeVec",
        ] {
            assert!(m.get_function(name).is_some(), "missing intrinsic {}", name);
        }

        let template = m.get_function("cell_main_template").unwrap();
        assert!(m.is_definition(template));
        assert_eq!(m.func_param_count(template), 4);
        assert_eq!(m.value_name(m.func_param(template, 0)), "pCells");
        assert_eq!(m.value_name(m.func_param(template, 3)), "force");
        assert!(m.verify_function(template).is_ok());
    }

    #[test]
    fn test_base_module_prints_contract_signatures() {
        let m = base_module();
        let text = m.print_to_string();
        assert!(text.contains("%Cell = type { float, <2 x float>, <2 x float>, i8* }"));
        assert!(text.contains("declare <2 x float> @read_position(%Cell*, i32)"));
        assert!(text.contains("declare float @cell_dot(<2 x float>, <2 x float>)"));
        assert!(
            text.contains(
                "define void @cell_main_template(%Cell* %pCells, i32 %cellCount, float %arenaRadius, <2 x float>* %force) {"
            )
        );
    }
}
