//! Lowers Tengo-style scripts into Lua source.
//!
//! The front-end is external: it parses source text and hands over an
//! [`ast::File`]. [`transpile`] walks that tree once and returns Lua code,
//! prefixed with only the runtime support the program actually uses.

pub mod ast;
pub mod builtins;
pub mod diagnostic;
pub mod error;
pub mod options;
pub mod scope;
pub mod transpiler;

pub use error::{ErrorKind, TranspileError, TranspileResult};
pub use options::Options;
pub use transpiler::Transpiler;

/// Converts `file` with a fresh [`Transpiler`].
pub fn transpile(file: &ast::File, options: &Options) -> TranspileResult<String> {
    Transpiler::new(options).convert(file)
}
