//! Symbol table
//!
//! The language has one flat scope per script: a name maps to exactly one
//! stack slot for the whole translation unit, and blocks do not nest scopes.
//! The table lives as long as the IR generator and stores backend value
//! handles; it never owns IR.

use crate::diag::{CellError, SourcePos};
use cell_ir::ValueId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, ValueId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Bind `name` to its storage slot. A name may only be declared once.
    pub fn declare(&mut self, name: &str, storage: ValueId, pos: &SourcePos) -> Result<(), CellError> {
        if self.symbols.contains_key(name) {
            return Err(CellError::at(pos, format!("variable redefinition: {}", name)));
        }
        self.symbols.insert(name.to_string(), storage);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<ValueId> {
        self.symbols.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_lookup() {
        let mut m = cell_ir::Module::new();
        let slot = m.const_i32(0); // any handle will do
        let mut table = SymbolTable::new();
        let pos = SourcePos::new("t.cell", 1, 1);

        assert!(table.lookup("speed").is_none());
        table.declare("speed", slot, &pos).unwrap();
        assert_eq!(table.lookup("speed"), Some(slot));

        let err = table.declare("speed", slot, &pos).unwrap_err();
        assert!(err.message.contains("variable redefinition"));
    }
}
