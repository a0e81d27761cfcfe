//! Syntax tree handed over by the front-end.
//!
//! The front-end lexes and parses the source once and serializes the result;
//! the transpiler only ever reads these nodes. Each variant carries the
//! position it was parsed from so failures can point back at the source.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 1-based source position. `0:0` marks a node without position information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    pub fn is_known(self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct File {
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub pos: Pos,
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Ident {
    #[serde(default)]
    pub pos: Pos,
    pub name: String,
}

impl Ident {
    /// The discard name in `for _, v in ...`.
    pub fn is_wildcard(&self) -> bool {
        self.name == "_"
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MapElement {
    #[serde(default)]
    pub pos: Pos,
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Stmt {
    Expr {
        #[serde(default)]
        pos: Pos,
        expr: Expr,
    },
    IncDec {
        #[serde(default)]
        pos: Pos,
        op: IncDecOp,
        expr: Expr,
    },
    Assign {
        #[serde(default)]
        pos: Pos,
        op: AssignOp,
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
    },
    Return {
        #[serde(default)]
        pos: Pos,
        #[serde(default)]
        result: Option<Expr>,
    },
    Branch {
        #[serde(default)]
        pos: Pos,
        op: BranchOp,
    },
    Block(Block),
    If {
        #[serde(default)]
        pos: Pos,
        #[serde(default)]
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: Block,
        /// Either another `If` (`else if`) or a `Block`.
        #[serde(default, rename = "else")]
        else_branch: Option<Box<Stmt>>,
    },
    For {
        #[serde(default)]
        pos: Pos,
        #[serde(default)]
        init: Option<Box<Stmt>>,
        #[serde(default)]
        cond: Option<Expr>,
        #[serde(default)]
        post: Option<Box<Stmt>>,
        body: Block,
    },
    ForIn {
        #[serde(default)]
        pos: Pos,
        #[serde(default)]
        key: Option<Ident>,
        value: Ident,
        iterable: Expr,
        body: Block,
    },
    Export {
        #[serde(default)]
        pos: Pos,
        result: Expr,
    },
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Ident(Ident),
    IntLit {
        #[serde(default)]
        pos: Pos,
        literal: String,
    },
    FloatLit {
        #[serde(default)]
        pos: Pos,
        literal: String,
    },
    BoolLit {
        #[serde(default)]
        pos: Pos,
        value: bool,
    },
    StringLit {
        #[serde(default)]
        pos: Pos,
        value: String,
    },
    CharLit {
        #[serde(default)]
        pos: Pos,
        value: char,
    },
    UndefinedLit {
        #[serde(default)]
        pos: Pos,
    },
    Paren {
        #[serde(default)]
        pos: Pos,
        expr: Box<Expr>,
    },
    Binary {
        #[serde(default)]
        pos: Pos,
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        #[serde(default)]
        pos: Pos,
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Selector {
        #[serde(default)]
        pos: Pos,
        expr: Box<Expr>,
        sel: String,
    },
    Index {
        #[serde(default)]
        pos: Pos,
        expr: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        #[serde(default)]
        pos: Pos,
        expr: Box<Expr>,
        #[serde(default)]
        low: Option<Box<Expr>>,
        #[serde(default)]
        high: Option<Box<Expr>>,
    },
    Cond {
        #[serde(default)]
        pos: Pos,
        cond: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    Call {
        #[serde(default)]
        pos: Pos,
        func: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    ArrayLit {
        #[serde(default)]
        pos: Pos,
        #[serde(default)]
        elements: Vec<Expr>,
    },
    MapLit {
        #[serde(default)]
        pos: Pos,
        #[serde(default)]
        elements: Vec<MapElement>,
    },
    FuncLit {
        #[serde(default)]
        pos: Pos,
        #[serde(default)]
        params: Vec<Ident>,
        body: Block,
    },
    Import {
        #[serde(default)]
        pos: Pos,
        module: String,
    },
    ErrorExpr {
        #[serde(default)]
        pos: Pos,
        expr: Box<Expr>,
    },
    Immutable {
        #[serde(default)]
        pos: Pos,
        expr: Box<Expr>,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Self::Ident(ident) => ident.pos,
            Self::IntLit { pos, .. }
            | Self::FloatLit { pos, .. }
            | Self::BoolLit { pos, .. }
            | Self::StringLit { pos, .. }
            | Self::CharLit { pos, .. }
            | Self::UndefinedLit { pos }
            | Self::Paren { pos, .. }
            | Self::Binary { pos, .. }
            | Self::Unary { pos, .. }
            | Self::Selector { pos, .. }
            | Self::Index { pos, .. }
            | Self::Slice { pos, .. }
            | Self::Cond { pos, .. }
            | Self::Call { pos, .. }
            | Self::ArrayLit { pos, .. }
            | Self::MapLit { pos, .. }
            | Self::FuncLit { pos, .. }
            | Self::Import { pos, .. }
            | Self::ErrorExpr { pos, .. }
            | Self::Immutable { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Quo,
    #[serde(rename = "%")]
    Rem,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<=")]
    LessEq,
    #[serde(rename = ">=")]
    GreaterEq,
    #[serde(rename = "&&")]
    LogicalAnd,
    #[serde(rename = "||")]
    LogicalOr,
    #[serde(rename = "&")]
    And,
    #[serde(rename = "|")]
    Or,
    #[serde(rename = "^")]
    Xor,
    #[serde(rename = "&^")]
    AndNot,
    #[serde(rename = "<<")]
    Shl,
    #[serde(rename = ">>")]
    Shr,
}

impl BinaryOp {
    /// Source spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Quo => "/",
            Self::Rem => "%",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEq => "<=",
            Self::GreaterEq => ">=",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::AndNot => "&^",
            Self::Shl => "<<",
            Self::Shr => ">>",
        }
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            Self::And | Self::Or | Self::Xor | Self::AndNot | Self::Shl | Self::Shr
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "-")]
    Neg,
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "^")]
    Complement,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum AssignOp {
    #[serde(rename = ":=")]
    Define,
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    AddAssign,
    #[serde(rename = "-=")]
    SubAssign,
    #[serde(rename = "*=")]
    MulAssign,
    #[serde(rename = "/=")]
    QuoAssign,
    #[serde(rename = "%=")]
    RemAssign,
    #[serde(rename = "&=")]
    AndAssign,
    #[serde(rename = "|=")]
    OrAssign,
    #[serde(rename = "^=")]
    XorAssign,
    #[serde(rename = "&^=")]
    AndNotAssign,
    #[serde(rename = "<<=")]
    ShlAssign,
    #[serde(rename = ">>=")]
    ShrAssign,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Define => ":=",
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::QuoAssign => "/=",
            Self::RemAssign => "%=",
            Self::AndAssign => "&=",
            Self::OrAssign => "|=",
            Self::XorAssign => "^=",
            Self::AndNotAssign => "&^=",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum IncDecOp {
    #[serde(rename = "++")]
    Inc,
    #[serde(rename = "--")]
    Dec,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchOp {
    Break,
    Continue,
}

impl BranchOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::Continue => "continue",
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_front_end_json() {
        let source = r#"{
            "stmts": [
                {"type": "Assign", "op": ":=", "pos": {"line": 1, "column": 1},
                 "lhs": [{"type": "Ident", "name": "a"}],
                 "rhs": [{"type": "Binary", "op": "+",
                          "lhs": {"type": "IntLit", "literal": "1"},
                          "rhs": {"type": "IntLit", "literal": "2"}}]},
                {"type": "Return", "result": {"type": "Ident", "name": "a"}}
            ]
        }"#;
        let file: File = serde_json::from_str(source).expect("valid tree");
        assert_eq!(file.stmts.len(), 2);
        let Stmt::Assign { pos, op, rhs, .. } = &file.stmts[0] else {
            panic!("expected assignment, got {:?}", file.stmts[0]);
        };
        assert_eq!(*pos, Pos::new(1, 1));
        assert_eq!(*op, AssignOp::Define);
        assert_eq!(rhs[0].pos(), Pos::default());
        assert!(matches!(
            rhs[0],
            Expr::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn if_else_chain_uses_else_key() {
        let source = r#"{"type": "If",
            "cond": {"type": "BoolLit", "value": true},
            "body": {"stmts": []},
            "else": {"type": "Block", "stmts": [{"type": "Branch", "op": "break"}]}}"#;
        let stmt: Stmt = serde_json::from_str(source).expect("valid if");
        let Stmt::If { else_branch, .. } = stmt else {
            panic!("expected if");
        };
        assert!(matches!(else_branch.as_deref(), Some(Stmt::Block(_))));
    }

    #[test]
    fn bitwise_operators_are_flagged() {
        assert!(BinaryOp::AndNot.is_bitwise());
        assert!(BinaryOp::Shr.is_bitwise());
        assert!(!BinaryOp::LogicalAnd.is_bitwise());
        assert_eq!(BinaryOp::NotEqual.as_str(), "!=");
    }
}
