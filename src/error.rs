use thiserror::Error;

use crate::ast::Pos;

/// Source forms that have no Lua rendition and are rejected outright.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnsupportedFeature {
    #[error("operator '{op}' not supported")]
    BitwiseOperator { op: &'static str },
    #[error("compound assignment '{op}' not supported")]
    BitwiseAssignment { op: &'static str },
    #[error("binary complement not supported")]
    UnaryComplement,
    #[error("character literal not supported")]
    CharLiteral,
    #[error("import expression not supported")]
    Import,
    #[error("export statement not supported")]
    Export,
    #[error("error expression not supported")]
    ErrorExpression,
    #[error("immutable expression not supported")]
    Immutable,
}

/// Binding problems found by the scope resolver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("unresolved reference '{name}'")]
    Unresolved { name: String },
    #[error("'{name}' redeclared in this block")]
    Redeclared { name: String },
    #[error("cannot use variable name '{name}'")]
    ReservedName { name: String },
    #[error("operator ':=' not allowed with selector")]
    DefineWithSelector,
}

/// Statements whose shape cannot be lowered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("tuple assignment not allowed")]
    TupleAssignment,
    #[error("cannot assign to this expression")]
    InvalidAssignTarget,
    #[error("'{keyword}' outside of a loop")]
    BranchOutsideLoop { keyword: &'static str },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeature),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

/// The first failure of a conversion, tied to the node that caused it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Transpile Error: {kind}\n\tat {pos}")]
pub struct TranspileError {
    pub pos: Pos,
    pub kind: ErrorKind,
}

impl TranspileError {
    pub fn new(pos: Pos, kind: impl Into<ErrorKind>) -> Self {
        Self {
            pos,
            kind: kind.into(),
        }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

pub type TranspileResult<T> = Result<T, TranspileError>;
