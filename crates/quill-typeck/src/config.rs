//! Checker configuration loaded from `quill.toml`.
//!
//! Holds the `[checker]` switches, the host namespaces scripts may import,
//! and the prelude imported before the first unit.

use serde::Deserialize;
use std::path::Path;

use crate::registry::NamespaceDecl;

/// Parsed checker configuration (usually `quill.toml`).
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub checker: CheckerOptions,
    /// Host namespaces available to `import`.
    #[serde(default, rename = "namespace")]
    pub namespaces: Vec<NamespaceDecl>,
    /// Namespaces imported before the first unit is checked.
    #[serde(default)]
    pub prelude: Vec<String>,
}

/// Switches from the `[checker]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckerOptions {
    /// Assigning to an unknown name at top level declares an `Object` global.
    pub shell_mode: bool,
    /// Largest argument count supported when calling an untyped function value.
    pub max_invoke_arity: usize,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        CheckerOptions { shell_mode: false, max_invoke_arity: 8 }
    }
}

impl Config {
    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Config, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_str(&content)
    }

    /// Parse a configuration from a string.
    pub fn from_str(content: &str) -> Result<Config, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml = r#"
prelude = ["text"]

[checker]
shell_mode = true
max_invoke_arity = 3

[[namespace]]
path = "text"
functions = [{ name = "upper", params = ["String"], returns = "String" }]

[[namespace]]
path = "geo"

[[namespace.types]]
name = "Point"
constructors = [{ params = ["int", "int"] }]
"#;
        let config = Config::from_str(toml).unwrap();
        assert!(config.checker.shell_mode);
        assert_eq!(config.checker.max_invoke_arity, 3);
        assert_eq!(config.prelude, vec!["text"]);
        assert_eq!(config.namespaces.len(), 2);
        assert_eq!(config.namespaces[1].types[0].name, "Point");
        assert_eq!(config.namespaces[0].functions[0].returns, "String");
    }

    #[test]
    fn parse_empty_config() {
        let config = Config::from_str("").unwrap();
        assert!(!config.checker.shell_mode);
        assert_eq!(config.checker.max_invoke_arity, 8);
        assert!(config.namespaces.is_empty());
    }

    #[test]
    fn partial_checker_section_keeps_defaults() {
        let config = Config::from_str("[checker]\nshell_mode = true\n").unwrap();
        assert_eq!(config.checker.max_invoke_arity, 8);
    }

    #[test]
    fn reject_malformed_config() {
        let err = Config::from_str("[checker]\nshell_mode = 3\n").unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }
}
