//! Lexical scope tracking for the transpiler.
//!
//! Frames form a strict stack: `fork` on entry to an `if`/`for`/block or a
//! function literal, `leave` on exit. Redeclaration is only checked against
//! the innermost frame, while lookups walk outward through every enclosing
//! frame so closures can reach bindings of the functions around them.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScopeError;

/// Names of this shape are kept for generated helper variables.
static RESERVED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__.+__$").expect("reserved-name pattern is valid"));

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAME.is_match(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    /// Index of the defining frame, `0` being the root frame.
    pub depth: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// `if`/`for` constructs, their bodies and standalone blocks.
    Block,
    /// Function literal bodies. Reads crossing one are closure captures.
    Function,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    symbols: HashMap<String, Symbol>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            symbols: HashMap::new(),
        }
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub symbol: &'a Symbol,
    /// Number of frames walked outward; `0` is the current frame.
    pub depth: usize,
    /// The binding lives outside the innermost enclosing function.
    pub captured: bool,
}

#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Frame>,
    global_scope: bool,
}

impl ScopeStack {
    /// Creates the stack with its root frame. With `global_scope`, names
    /// defined directly in the root frame become globals.
    pub fn new(global_scope: bool) -> Self {
        Self {
            frames: vec![Frame::new(FrameKind::Function)],
            global_scope,
        }
    }

    pub fn define(&mut self, name: &str) -> Result<Symbol, ScopeError> {
        let depth = self.frames.len() - 1;
        let scope = if depth == 0 && self.global_scope {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let frame = self.current_mut();
        if frame.symbols.contains_key(name) {
            return Err(ScopeError::Redeclared {
                name: name.to_string(),
            });
        }
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            depth,
        };
        frame.symbols.insert(name.to_string(), symbol.clone());
        Ok(symbol)
    }

    pub fn resolve(&self, name: &str) -> Option<Resolved<'_>> {
        let mut captured = false;
        for (walked, frame) in self.frames.iter().rev().enumerate() {
            if let Some(symbol) = frame.symbols.get(name) {
                return Some(Resolved {
                    symbol,
                    depth: walked,
                    captured,
                });
            }
            if frame.kind == FrameKind::Function {
                captured = true;
            }
        }
        None
    }

    /// True when `name` is already bound in the innermost frame.
    pub fn is_defined_here(&self, name: &str) -> bool {
        self.frames
            .last()
            .is_some_and(|frame| frame.symbols.contains_key(name))
    }

    pub fn fork(&mut self, kind: FrameKind) {
        self.frames.push(Frame::new(kind));
    }

    /// Pops the innermost frame. The root frame stays in place.
    pub fn leave(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn current_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclaration_is_checked_per_frame() {
        let mut scopes = ScopeStack::new(false);
        scopes.define("a").expect("first definition");
        assert_eq!(
            scopes.define("a"),
            Err(ScopeError::Redeclared {
                name: "a".to_string()
            })
        );

        scopes.fork(FrameKind::Block);
        let shadow = scopes.define("a").expect("shadowing in a block");
        assert_eq!(shadow.depth, 1);
        assert_eq!(scopes.resolve("a").map(|found| found.depth), Some(0));
    }

    #[test]
    fn definitions_vanish_when_frame_is_left() {
        let mut scopes = ScopeStack::new(false);
        scopes.fork(FrameKind::Block);
        scopes.define("inner").expect("define");
        assert!(scopes.resolve("inner").is_some());
        scopes.leave();
        assert!(scopes.resolve("inner").is_none());
        assert!(!scopes.is_defined_here("inner"));
    }

    #[test]
    fn reads_cross_function_frames_as_captures() {
        let mut scopes = ScopeStack::new(false);
        scopes.define("sum").expect("define");
        scopes.fork(FrameKind::Block);
        let found = scopes.resolve("sum").expect("visible in block");
        assert_eq!(found.depth, 1);
        assert!(!found.captured);

        scopes.fork(FrameKind::Function);
        scopes.define("v").expect("param");
        let found = scopes.resolve("sum").expect("visible in closure");
        assert_eq!(found.depth, 2);
        assert!(found.captured);
        assert!(!scopes.resolve("v").expect("param").captured);
    }

    #[test]
    fn only_root_definitions_become_global() {
        let mut scopes = ScopeStack::new(true);
        assert_eq!(scopes.define("g").expect("root").scope, SymbolScope::Global);
        scopes.fork(FrameKind::Block);
        assert_eq!(scopes.define("l").expect("block").scope, SymbolScope::Local);

        let mut scopes = ScopeStack::new(false);
        assert_eq!(scopes.define("g").expect("root").scope, SymbolScope::Local);
    }

    #[test]
    fn root_frame_is_never_popped() {
        let mut scopes = ScopeStack::new(false);
        scopes.define("a").expect("define");
        scopes.leave();
        assert!(scopes.is_defined_here("a"));
    }

    #[test]
    fn reserved_names_match_double_underscores() {
        assert!(is_reserved("__cont_1__"));
        assert!(is_reserved("__a__"));
        assert!(!is_reserved("__"));
        assert!(!is_reserved("____"));
        assert!(!is_reserved("__private"));
        assert!(!is_reserved("value"));
    }
}
