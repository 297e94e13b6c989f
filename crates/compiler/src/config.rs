//! Compiler configuration
//!
//! The driver reads an optional TOML file and overlays command-line flags on
//! top. Embedders (the simulator loads scripts directly through the library)
//! construct the config in code instead.

use crate::diag::CellError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default name of the generated function. The simulator compiles one
/// behavior per agent slot and renames via the config or CLI.
pub const DEFAULT_FUNCTION_NAME: &str = "custom_cell_ai_0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Name of the function the script compiles into. Must be unique per
    /// module.
    pub function_name: String,
    /// Print the generated function as LLVM-style IR after compilation.
    pub emit_ir: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig { function_name: DEFAULT_FUNCTION_NAME.to_string(), emit_ir: false }
    }
}

impl CompilerConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CellError> {
        let text = fs::read_to_string(path)
            .map_err(|e| CellError::new(format!("cannot read config {}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| CellError::new(format!("invalid config {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.function_name, "custom_cell_ai_0");
        assert!(!config.emit_ir);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CompilerConfig { function_name: "ai_7".to_string(), emit_ir: true };
        let text = toml::to_string(&config).unwrap();
        let parsed: CompilerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.function_name, "ai_7");
        assert!(parsed.emit_ir);
    }

    #[test]
    fn test_partial_and_unknown_fields() {
        let parsed: CompilerConfig = toml::from_str("emit_ir = true\n").unwrap();
        assert_eq!(parsed.function_name, "custom_cell_ai_0");
        assert!(parsed.emit_ir);

        assert!(toml::from_str::<CompilerConfig>("optimize = 3\n").is_err());
    }
}
