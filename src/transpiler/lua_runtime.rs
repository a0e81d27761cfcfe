//! Lua support code injected ahead of the translated program.
//!
//! Every snippet is self-contained and defines a distinct name, so any subset
//! can be emitted in any order. Array-like tables carry `__a = true` and keep
//! element `i` at key `i`, starting from 0.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::builtins::BuiltinFunction;

/// Makes `+` concatenate whenever one operand is a string.
pub const LUA_STRING_CONCAT: &str = r#"getmetatable("").__add = function(a, b)
  return a .. b
end
"#;

pub const LUA_ITER: &str = r#"function __iter__(v)
  if type(v) == "table" and v.__a then
    local i = -1
    return function()
      i = i + 1
      local e = v[i]
      if e == nil then
        return nil
      end
      return i, e
    end
  end
  return pairs(v)
end
"#;

// Array slicing always yields an empty array.
pub const LUA_SLICE: &str = r#"function __slice__(v, low, high)
  if type(v) == "table" and v.__a then
    return {[0]=nil, __a=true}
  end
  return string.sub(v, low + 1, high)
end
"#;

pub const LUA_LEN: &str = r#"len = function(v)
  if type(v) == "string" then
    return string.len(v)
  end
  if v.__a then
    if v[0] == nil then
      return 0
    end
    return #v + 1
  end
  local n = 0
  for _ in pairs(v) do
    n = n + 1
  end
  return n
end
"#;

/// Generated loop-continuation flags, one per loop nesting depth.
pub fn continue_flag(loop_depth: usize) -> String {
    format!("__cont_{loop_depth}__")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Helper {
    StringConcat,
    Iterator,
    Slicing,
}

impl Helper {
    pub fn source(self) -> &'static str {
        match self {
            Self::StringConcat => LUA_STRING_CONCAT,
            Self::Iterator => LUA_ITER,
            Self::Slicing => LUA_SLICE,
        }
    }
}

pub fn builtin_source(builtin: BuiltinFunction) -> &'static str {
    match builtin {
        BuiltinFunction::Len => LUA_LEN,
    }
}

/// Support entries flagged while walking the tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SupportUsage {
    helpers: BTreeSet<Helper>,
    builtins: BTreeSet<BuiltinFunction>,
}

impl SupportUsage {
    pub fn use_helper(&mut self, helper: Helper) {
        self.helpers.insert(helper);
    }

    pub fn use_builtin(&mut self, builtin: BuiltinFunction) {
        self.builtins.insert(builtin);
    }

    pub fn helpers(&self) -> impl Iterator<Item = Helper> + '_ {
        self.helpers.iter().copied()
    }

    pub fn builtins(&self) -> impl Iterator<Item = BuiltinFunction> + '_ {
        self.builtins.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty() && self.builtins.is_empty()
    }

    /// Helpers first, then built-ins, each in declaration order.
    pub fn prologue(&self) -> String {
        let mut out = String::new();
        for helper in self.helpers() {
            out.push_str(helper.source());
        }
        for builtin in self.builtins() {
            out.push_str(builtin_source(builtin));
        }
        out
    }
}

/// Quotes `value` as a Lua string literal.
pub fn quote_lua_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            ch if ch.is_ascii_control() => {
                let _ = write!(quoted, "\\{:03}", ch as u32);
            }
            ch => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}
