use std::mem;

use log::{debug, trace};

use self::lua_runtime::{Helper, SupportUsage, continue_flag, quote_lua_string};
use crate::ast::{AssignOp, BinaryOp, Block, BranchOp, Expr, File, Ident, IncDecOp, Pos, Stmt, UnaryOp};
use crate::builtins::BuiltinFunction;
use crate::error::{ScopeError, StructuralError, TranspileError, TranspileResult, UnsupportedFeature};
use crate::options::Options;
use crate::scope::{FrameKind, ScopeStack, Symbol, SymbolScope, is_reserved};

pub mod lua_runtime;

const LOG_TARGET: &str = "transpiler";

/// Lowers one syntax tree into Lua source.
///
/// A `Transpiler` holds the scope stack, indentation, loop depth and the set of
/// support entries used so far; `convert` consumes it so no state outlives a
/// single conversion.
#[derive(Debug)]
pub struct Transpiler {
    options: Options,
    scopes: ScopeStack,
    indent_level: usize,
    loop_depth: usize,
    usage: SupportUsage,
}

impl Transpiler {
    pub fn new(options: &Options) -> Self {
        Self {
            scopes: ScopeStack::new(options.enable_global_scope),
            options: options.clone(),
            indent_level: 0,
            loop_depth: 0,
            usage: SupportUsage::default(),
        }
    }

    /// Translates `file`, returning the support prologue followed by the body.
    /// The first failure aborts the whole conversion.
    pub fn convert(mut self, file: &File) -> TranspileResult<String> {
        debug!(target: LOG_TARGET, "converting {} top-level statements", file.stmts.len());
        let body = self.convert_block(&file.stmts)?;

        if self.usage.is_empty() {
            debug!(target: LOG_TARGET, "no support code needed, {} bytes generated", body.len());
            return Ok(body);
        }

        debug!(
            target: LOG_TARGET,
            "prologue helpers {:?}, builtins {:?}",
            self.usage.helpers().collect::<Vec<_>>(),
            self.usage.builtins().collect::<Vec<_>>()
        );
        let mut output = self.usage.prologue();
        output.push('\n');
        output.push_str(&body);
        debug!(target: LOG_TARGET, "{} bytes generated", output.len());
        Ok(output)
    }

    fn convert_block(&mut self, stmts: &[Stmt]) -> TranspileResult<String> {
        let mut out = String::new();
        let last = stmts.len().saturating_sub(1);
        for (index, stmt) in stmts.iter().enumerate() {
            match stmt {
                // Lua only accepts `return` as the final statement of a block.
                Stmt::Return { result, .. } if index != last => {
                    let ret = self.convert_return(result.as_ref())?;
                    out.push_str(&self.line(&format!("do {ret} end")));
                }
                _ => out.push_str(&self.convert_stmt(stmt)?),
            }
        }
        Ok(out)
    }

    fn convert_stmt(&mut self, stmt: &Stmt) -> TranspileResult<String> {
        match stmt {
            Stmt::Expr { expr, .. } => {
                let expr = self.convert_expr(expr)?;
                Ok(self.line(&expr))
            }
            Stmt::IncDec { pos, op, expr } => {
                self.check_assign_target(*pos, expr)?;
                let target = self.convert_expr(expr)?;
                let op = match op {
                    IncDecOp::Inc => "+",
                    IncDecOp::Dec => "-",
                };
                Ok(self.line(&format!("{target} = ({target} {op} 1)")))
            }
            Stmt::Assign { pos, op, lhs, rhs } => self.convert_assign(*pos, *op, lhs, rhs),
            Stmt::Return { result, .. } => {
                let ret = self.convert_return(result.as_ref())?;
                Ok(self.line(&ret))
            }
            Stmt::Branch { pos, op } => {
                if self.loop_depth == 0 {
                    return Err(TranspileError::new(
                        *pos,
                        StructuralError::BranchOutsideLoop {
                            keyword: op.as_str(),
                        },
                    ));
                }
                match op {
                    BranchOp::Break => Ok(self.line("break")),
                    BranchOp::Continue => {
                        let flag = continue_flag(self.loop_depth);
                        let mut out = self.line(&format!("{flag} = true"));
                        out.push_str(&self.line("break"));
                        Ok(out)
                    }
                }
            }
            Stmt::Block(block) => {
                let mut out = self.line("do");
                let inner = self.indented(|t| t.scoped(FrameKind::Block, |t| t.convert_block(&block.stmts)))?;
                out.push_str(&inner);
                out.push_str(&self.line("end"));
                Ok(out)
            }
            Stmt::If {
                init,
                cond,
                body,
                else_branch,
                ..
            } => self.convert_if(init.as_deref(), cond, body, else_branch.as_deref()),
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => self.convert_for(init.as_deref(), cond.as_ref(), post.as_deref(), body),
            Stmt::ForIn {
                key,
                value,
                iterable,
                body,
                ..
            } => self.convert_for_in(key.as_ref(), value, iterable, body),
            Stmt::Export { pos, .. } => Err(TranspileError::new(*pos, UnsupportedFeature::Export)),
        }
    }

    fn convert_return(&mut self, result: Option<&Expr>) -> TranspileResult<String> {
        match result {
            None => Ok("return".to_string()),
            Some(expr) => {
                let expr = self.convert_expr(expr)?;
                Ok(format!("return ({expr})"))
            }
        }
    }

    fn convert_assign(&mut self, pos: Pos, op: AssignOp, lhs: &[Expr], rhs: &[Expr]) -> TranspileResult<String> {
        let ([target], [value]) = (lhs, rhs) else {
            return Err(TranspileError::new(pos, StructuralError::TupleAssignment));
        };

        let arith = match op {
            AssignOp::Define => return self.convert_define(pos, target, value),
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some("+"),
            AssignOp::SubAssign => Some("-"),
            AssignOp::MulAssign => Some("*"),
            AssignOp::QuoAssign => Some("/"),
            AssignOp::RemAssign => Some("%"),
            AssignOp::AndAssign
            | AssignOp::OrAssign
            | AssignOp::XorAssign
            | AssignOp::AndNotAssign
            | AssignOp::ShlAssign
            | AssignOp::ShrAssign => {
                return Err(TranspileError::new(
                    pos,
                    UnsupportedFeature::BitwiseAssignment { op: op.as_str() },
                ));
            }
        };

        self.check_assign_target(pos, target)?;
        let left = self.convert_expr(target)?;
        let right = self.convert_expr(value)?;
        if op == AssignOp::AddAssign {
            self.usage.use_helper(Helper::StringConcat);
        }

        Ok(match arith {
            None => self.line(&format!("{left} = {right}")),
            Some(op) => self.line(&format!("{left} = ({left} {op} {right})")),
        })
    }

    fn convert_define(&mut self, pos: Pos, target: &Expr, value: &Expr) -> TranspileResult<String> {
        let ident = match target {
            Expr::Ident(ident) => ident,
            Expr::Selector { .. } | Expr::Index { .. } => {
                return Err(TranspileError::new(pos, ScopeError::DefineWithSelector));
            }
            _ => return Err(TranspileError::new(pos, StructuralError::InvalidAssignTarget)),
        };
        let name = &ident.name;

        // Function literals see their own name so they can recurse.
        if matches!(value, Expr::FuncLit { .. }) {
            let symbol = self.define_binding(ident)?;
            let right = self.convert_expr(value)?;
            return Ok(match self.qualifier(&symbol) {
                "" => self.line(&format!("{name} = {right}")),
                qualifier => self.line(&format!("{qualifier}{name}; {name} = {right}")),
            });
        }

        if self.scopes.is_defined_here(name) {
            return Err(TranspileError::new(ident.pos, ScopeError::Redeclared { name: name.clone() }));
        }
        let right = self.convert_expr(value)?;
        let symbol = self.define_binding(ident)?;
        let qualifier = self.qualifier(&symbol);
        Ok(self.line(&format!("{qualifier}{name} = {right}")))
    }

    fn qualifier(&self, symbol: &Symbol) -> &'static str {
        if self.options.enable_global_scope && symbol.scope == SymbolScope::Global {
            ""
        } else {
            "local "
        }
    }

    /// Checks that `target` is an identifier, optionally followed by selectors
    /// and indexes, whose root is already bound.
    fn check_assign_target(&self, pos: Pos, target: &Expr) -> TranspileResult<()> {
        let Some(root) = assign_root(target) else {
            let pos = if target.pos().is_known() { target.pos() } else { pos };
            return Err(TranspileError::new(pos, StructuralError::InvalidAssignTarget));
        };
        if self.scopes.resolve(&root.name).is_none() {
            return Err(TranspileError::new(
                root.pos,
                ScopeError::Unresolved {
                    name: root.name.clone(),
                },
            ));
        }
        Ok(())
    }

    fn define_binding(&mut self, ident: &Ident) -> TranspileResult<Symbol> {
        if is_reserved(&ident.name) {
            return Err(TranspileError::new(
                ident.pos,
                ScopeError::ReservedName {
                    name: ident.name.clone(),
                },
            ));
        }
        self.scopes
            .define(&ident.name)
            .map_err(|err| TranspileError::new(ident.pos, err))
    }

    fn convert_if(
        &mut self,
        init: Option<&Stmt>,
        cond: &Expr,
        body: &Block,
        else_branch: Option<&Stmt>,
    ) -> TranspileResult<String> {
        let mut out = self.line("do");
        let inner = self.indented(|t| {
            t.scoped(FrameKind::Block, |t| {
                let mut out = String::new();
                if let Some(init) = init {
                    out.push_str(&t.convert_stmt(init)?);
                }
                let cond = t.convert_expr(cond)?;
                out.push_str(&t.line(&format!("if {cond} then")));
                out.push_str(&t.convert_branch_body(&body.stmts)?);
                out.push_str(&t.convert_else_chain(else_branch)?);
                out.push_str(&t.line("end"));
                Ok(out)
            })
        })?;
        out.push_str(&inner);
        out.push_str(&self.line("end"));
        Ok(out)
    }

    fn convert_else_chain(&mut self, mut else_branch: Option<&Stmt>) -> TranspileResult<String> {
        let mut out = String::new();
        while let Some(branch) = else_branch {
            match branch {
                Stmt::If {
                    init: None,
                    cond,
                    body,
                    else_branch: next,
                    ..
                } => {
                    let cond = self.convert_expr(cond)?;
                    out.push_str(&self.line(&format!("elseif {cond} then")));
                    out.push_str(&self.convert_branch_body(&body.stmts)?);
                    else_branch = next.as_deref();
                }
                Stmt::Block(block) => {
                    out.push_str(&self.line("else"));
                    out.push_str(&self.convert_branch_body(&block.stmts)?);
                    else_branch = None;
                }
                other => {
                    out.push_str(&self.line("else"));
                    out.push_str(&self.convert_branch_body(std::slice::from_ref(other))?);
                    else_branch = None;
                }
            }
        }
        Ok(out)
    }

    fn convert_branch_body(&mut self, stmts: &[Stmt]) -> TranspileResult<String> {
        self.indented(|t| t.scoped(FrameKind::Block, |t| t.convert_block(stmts)))
    }

    fn convert_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &Block,
    ) -> TranspileResult<String> {
        self.scoped(FrameKind::Block, |t| {
            let Some(init) = init else {
                return t.convert_counted_loop(cond, post, body);
            };
            let mut out = t.line("do");
            let inner = t.indented(|t| {
                let mut out = t.convert_stmt(init)?;
                out.push_str(&t.convert_counted_loop(cond, post, body)?);
                Ok(out)
            })?;
            out.push_str(&inner);
            out.push_str(&t.line("end"));
            Ok(out)
        })
    }

    fn convert_counted_loop(&mut self, cond: Option<&Expr>, post: Option<&Stmt>, body: &Block) -> TranspileResult<String> {
        let header = match cond {
            Some(cond) => format!("while {} do", self.convert_expr(cond)?),
            None => "while true do".to_string(),
        };
        let mut out = self.line(&header);

        let inner = self.in_loop(|t| {
            t.indented(|t| {
                let flag = continue_flag(t.loop_depth);
                let mut out = t.guarded_body(body, &flag)?;
                match post {
                    Some(post) => {
                        out.push_str(&t.line(&format!("if {flag} then")));
                        out.push_str(&t.indented(|t| t.convert_stmt(post))?);
                        out.push_str(&t.line("else"));
                        out.push_str(&t.indented(|t| t.line("break")));
                        out.push_str(&t.line("end"));
                    }
                    None => out.push_str(&t.line(&format!("if not {flag} then break end"))),
                }
                Ok(out)
            })
        })?;
        out.push_str(&inner);
        out.push_str(&self.line("end"));
        Ok(out)
    }

    fn convert_for_in(
        &mut self,
        key: Option<&Ident>,
        value: &Ident,
        iterable: &Expr,
        body: &Block,
    ) -> TranspileResult<String> {
        let iterable = self.convert_expr(iterable)?;
        self.usage.use_helper(Helper::Iterator);

        self.scoped(FrameKind::Block, |t| {
            let key = match key {
                Some(key) if !key.is_wildcard() => {
                    t.define_binding(key)?;
                    key.name.as_str()
                }
                _ => "_",
            };
            let value = if value.is_wildcard() {
                "_"
            } else {
                t.define_binding(value)?;
                value.name.as_str()
            };

            let mut out = t.line(&format!("for {key}, {value} in __iter__({iterable}) do"));
            let inner = t.in_loop(|t| {
                t.indented(|t| {
                    let flag = continue_flag(t.loop_depth);
                    let mut out = t.guarded_body(body, &flag)?;
                    out.push_str(&t.line(&format!("if not {flag} then break end")));
                    Ok(out)
                })
            })?;
            out.push_str(&inner);
            out.push_str(&t.line("end"));
            Ok(out)
        })
    }

    /// Runs `body` once inside `repeat ... until true`. Falling off the end
    /// or `continue` leaves `flag` set; `break` leaves it unset.
    fn guarded_body(&mut self, body: &Block, flag: &str) -> TranspileResult<String> {
        let mut out = self.line(&format!("local {flag} = false"));
        out.push_str(&self.line("repeat"));
        let inner = self.indented(|t| {
            t.scoped(FrameKind::Block, |t| {
                let mut out = t.convert_block(&body.stmts)?;
                if !matches!(body.stmts.last(), Some(Stmt::Return { .. })) {
                    out.push_str(&t.line(&format!("{flag} = true")));
                }
                Ok(out)
            })
        })?;
        out.push_str(&inner);
        out.push_str(&self.line("until true"));
        Ok(out)
    }

    fn convert_expr(&mut self, expr: &Expr) -> TranspileResult<String> {
        match expr {
            Expr::Ident(ident) => self.convert_ident(ident),
            Expr::IntLit { literal, .. } | Expr::FloatLit { literal, .. } => Ok(literal.clone()),
            Expr::BoolLit { value, .. } => Ok(if *value { "true" } else { "false" }.to_string()),
            Expr::StringLit { value, .. } => Ok(quote_lua_string(value)),
            Expr::CharLit { pos, .. } => Err(TranspileError::new(*pos, UnsupportedFeature::CharLiteral)),
            Expr::UndefinedLit { .. } => Ok("nil".to_string()),
            Expr::Paren { expr, .. } => Ok(format!("({})", self.convert_expr(expr)?)),
            Expr::Binary { pos, op, lhs, rhs } => self.convert_binary(*pos, *op, lhs, rhs),
            Expr::Unary { pos, op, expr } => {
                let operand = self.convert_expr(expr)?;
                match op {
                    UnaryOp::Not => Ok(format!("(not ({operand}))")),
                    UnaryOp::Neg => Ok(format!("(-({operand}))")),
                    // Lua has no unary `+`; the form is passed through unchanged.
                    UnaryOp::Plus => Ok(format!("(+({operand}))")),
                    UnaryOp::Complement => Err(TranspileError::new(*pos, UnsupportedFeature::UnaryComplement)),
                }
            }
            Expr::Selector { expr, sel, .. } => {
                let base = self.convert_expr(expr)?;
                Ok(format!("({base})[{}]", quote_lua_string(sel)))
            }
            Expr::Index { expr, index, .. } => {
                let base = self.convert_expr(expr)?;
                let index = self.convert_expr(index)?;
                Ok(format!("({base})[{index}]"))
            }
            Expr::Slice { expr, low, high, .. } => {
                let base = self.convert_expr(expr)?;
                let low = match low {
                    Some(low) => self.convert_expr(low)?,
                    None => "0".to_string(),
                };
                let high = match high {
                    Some(high) => self.convert_expr(high)?,
                    None => "nil".to_string(),
                };
                self.usage.use_helper(Helper::Slicing);
                Ok(format!("__slice__({base}, {low}, {high})"))
            }
            Expr::Cond {
                cond,
                when_true,
                when_false,
                ..
            } => {
                let cond = self.convert_expr(cond)?;
                let when_true = self.convert_expr(when_true)?;
                let when_false = self.convert_expr(when_false)?;
                Ok(format!(
                    "(function() if {cond} then return ({when_true}) else return ({when_false}) end end)()"
                ))
            }
            Expr::Call { func, args, .. } => {
                let callee = self.convert_expr(func)?;
                let args = args
                    .iter()
                    .map(|arg| self.convert_expr(arg))
                    .collect::<TranspileResult<Vec<_>>>()?;
                Ok(format!("{callee}({})", args.join(", ")))
            }
            Expr::ArrayLit { elements, .. } => {
                if elements.is_empty() {
                    return Ok("{[0]=nil, __a=true}".to_string());
                }
                let elements = elements
                    .iter()
                    .map(|element| -> TranspileResult<String> { Ok(format!("({})", self.convert_expr(element)?)) })
                    .collect::<TranspileResult<Vec<_>>>()?;
                Ok(format!("{{[0]={}, __a=true}}", elements.join(", ")))
            }
            Expr::MapLit { elements, .. } => {
                let entries = elements
                    .iter()
                    .map(|element| -> TranspileResult<String> {
                        let value = self.convert_expr(&element.value)?;
                        Ok(format!("[{}]=({value})", quote_lua_string(&element.key)))
                    })
                    .collect::<TranspileResult<Vec<_>>>()?;
                Ok(format!("{{{}}}", entries.join(", ")))
            }
            Expr::FuncLit { params, body, .. } => self.convert_func(params, body),
            Expr::Import { pos, .. } => Err(TranspileError::new(*pos, UnsupportedFeature::Import)),
            Expr::ErrorExpr { pos, .. } => Err(TranspileError::new(*pos, UnsupportedFeature::ErrorExpression)),
            Expr::Immutable { pos, .. } => Err(TranspileError::new(*pos, UnsupportedFeature::Immutable)),
        }
    }

    fn convert_ident(&mut self, ident: &Ident) -> TranspileResult<String> {
        if let Some(found) = self.scopes.resolve(&ident.name) {
            if found.captured {
                trace!(
                    target: LOG_TARGET,
                    "closure captures '{}' bound in frame {}, {} frames out",
                    found.symbol.name,
                    found.symbol.depth,
                    found.depth
                );
            }
            return Ok(ident.name.clone());
        }
        match BuiltinFunction::from_name(&ident.name) {
            Some(builtin) => {
                self.usage.use_builtin(builtin);
                Ok(builtin.name().to_string())
            }
            None => Err(TranspileError::new(
                ident.pos,
                ScopeError::Unresolved {
                    name: ident.name.clone(),
                },
            )),
        }
    }

    fn convert_binary(&mut self, pos: Pos, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> TranspileResult<String> {
        if op.is_bitwise() {
            return Err(TranspileError::new(pos, UnsupportedFeature::BitwiseOperator { op: op.as_str() }));
        }
        let left = self.convert_expr(lhs)?;
        let right = self.convert_expr(rhs)?;
        let lua_op = match op {
            BinaryOp::LogicalAnd => "and",
            BinaryOp::LogicalOr => "or",
            BinaryOp::NotEqual => "~=",
            BinaryOp::Add => {
                self.usage.use_helper(Helper::StringConcat);
                "+"
            }
            other => other.as_str(),
        };
        Ok(format!("({left} {lua_op} {right})"))
    }

    fn convert_func(&mut self, params: &[Ident], body: &Block) -> TranspileResult<String> {
        // Loop flags never cross a function boundary.
        let outer_loop_depth = mem::replace(&mut self.loop_depth, 0);
        let result = self.scoped(FrameKind::Function, |t| {
            let mut names = Vec::with_capacity(params.len());
            for param in params {
                t.define_binding(param)?;
                names.push(param.name.as_str());
            }
            let body = t.indented(|t| t.convert_block(&body.stmts))?;
            Ok(format!("function({})\n{body}{}end", names.join(", "), t.indent()))
        });
        self.loop_depth = outer_loop_depth;
        result
    }

    fn scoped<T>(&mut self, kind: FrameKind, f: impl FnOnce(&mut Self) -> TranspileResult<T>) -> TranspileResult<T> {
        self.scopes.fork(kind);
        let result = f(self);
        self.scopes.leave();
        result
    }

    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.indent_level += 1;
        let result = f(self);
        self.indent_level -= 1;
        result
    }

    fn in_loop<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.loop_depth += 1;
        let result = f(self);
        self.loop_depth -= 1;
        result
    }

    fn indent(&self) -> String {
        self.options.indent.repeat(self.indent_level)
    }

    fn line(&self, text: &str) -> String {
        // A statement opening with `(` would be read as a call on the
        // previous line's expression.
        let separator = if text.starts_with('(') { ";" } else { "" };
        format!("{}{separator}{text}\n", self.indent())
    }
}

/// Root identifier of an assignment target such as `a`, `a.b` or `a[0].c`.
fn assign_root(expr: &Expr) -> Option<&Ident> {
    match expr {
        Expr::Ident(ident) => Some(ident),
        Expr::Selector { expr, .. } | Expr::Index { expr, .. } | Expr::Paren { expr, .. } => assign_root(expr),
        _ => None,
    }
}
