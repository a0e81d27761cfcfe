#![allow(dead_code)]
use std::fs;

use lualower::ast::{Block, Expr, File, Pos, Stmt};

pub const WORKLOADS: [(&str, &str); 3] = [
    ("closure", "tests/programs/closure_sum/program.json"),
    ("loops", "tests/programs/nested_loops/program.json"),
    ("recursion", "tests/programs/recursion/program.json"),
];

pub fn load_tree(path: &str) -> File {
    let raw = fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"));
    serde_json::from_str(&raw).unwrap_or_else(|err| panic!("decode {path}: {err}"))
}

pub fn workloads() -> Vec<(&'static str, File)> {
    WORKLOADS
        .iter()
        .map(|(label, path)| (*label, load_tree(path)))
        .collect()
}

/// Every workload repeated `copies` times, each copy inside its own
/// function literal so the bindings do not collide.
pub fn long_program(copies: usize) -> File {
    let bodies: Vec<File> = WORKLOADS.iter().map(|(_, path)| load_tree(path)).collect();
    let stmts = (0..copies)
        .flat_map(|_| bodies.iter())
        .map(|tree| Stmt::Expr {
            pos: Pos::default(),
            expr: Expr::FuncLit {
                pos: Pos::default(),
                params: Vec::new(),
                body: Block {
                    pos: Pos::default(),
                    stmts: tree.stmts.clone(),
                },
            },
        })
        .collect();
    File { stmts }
}
