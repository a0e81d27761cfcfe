use serde::Deserialize;

/// Knobs accepted by [`crate::Transpiler`].
///
/// Deserializes from kebab-case keys; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// Emit top-level `:=` bindings as Lua globals instead of `local`s.
    pub enable_global_scope: bool,
    /// Repeated once per nesting level.
    pub indent: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            enable_global_scope: false,
            indent: "  ".to_string(),
        }
    }
}

impl Options {
    pub fn with_global_scope(mut self, enabled: bool) -> Self {
        self.enable_global_scope = enabled;
        self
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }
}
