use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    Success,
    TranspileError,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExpectedOutcome {
    /// Exact generated Lua.
    pub lua_file: Option<String>,
    /// Rendered value the program returns when run under Lua.
    pub result_file: Option<String>,
    /// Substring of the conversion error message.
    pub error_contains_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    #[serde(default)]
    pub global_scope: bool,
    #[serde(default)]
    pub indent: Option<String>,
    #[serde(default)]
    pub expected: ExpectedOutcome,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub program_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading {} fixture file {}", self.name, relative_path))
    }

    pub fn read_program(&self) -> Result<String> {
        fs::read_to_string(&self.program_path)
            .with_context(|| format!("Reading program for {}", self.name))
    }
}

pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        let program_path = path.join("program.json");
        ensure!(
            program_path.exists(),
            "Missing program.json for case {}",
            path.display()
        );

        let case_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid case directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;

        cases.push(Case {
            name: case_name,
            dir: path,
            program_path,
            spec,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No test cases found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

/// Prints the value returned by the wrapped chunk. Maps are printed with
/// sorted keys so the text does not depend on table traversal order.
const LUA_DUMP: &str = r#"local function __dump__(v)
  if type(v) == "table" then
    local parts = {}
    if v.__a then
      local i = 0
      while v[i] ~= nil do
        parts[#parts + 1] = __dump__(v[i])
        i = i + 1
      end
      return "[" .. table.concat(parts, ",") .. "]"
    end
    local keys = {}
    for k in pairs(v) do
      keys[#keys + 1] = tostring(k)
    end
    table.sort(keys)
    for _, k in ipairs(keys) do
      parts[#parts + 1] = k .. ":" .. __dump__(v[k])
    end
    return "{" .. table.concat(parts, ",") .. "}"
  end
  if type(v) == "string" then
    return string.format("%q", v)
  end
  if type(v) == "number" and v == math.floor(v) then
    return string.format("%d", v)
  end
  return tostring(v)
end
"#;

/// Wraps generated code in a function so a top-level `return` becomes the
/// printed result.
pub fn wrap_for_lua(generated: &str) -> String {
    format!("{LUA_DUMP}local __result__ = (function()\n{generated}end)()\nprint(__dump__(__result__))\n")
}

fn parity_required() -> bool {
    std::env::var("LUA_PARITY_REQUIRED")
        .map(|value| value == "1")
        .unwrap_or(false)
}

pub fn run_lua_startup(interpreter: &str) -> Result<()> {
    let output = Command::new(interpreter)
        .arg("-e")
        .arg("assert(true)")
        .output()
        .with_context(|| format!("Running '{interpreter} -e'"))?;
    ensure!(output.status.success(), "lua startup command failed");
    Ok(())
}

/// Finds a Lua interpreter through `LUA` or the usual binary names.
/// Returns `None` (or fails when `LUA_PARITY_REQUIRED=1`) if none runs.
pub fn detect_lua_interpreter() -> Result<Option<String>> {
    if let Ok(lua) = std::env::var("LUA")
        && run_lua_startup(&lua).is_ok()
    {
        return Ok(Some(lua));
    }

    let candidates = ["lua5.4", "lua5.3", "lua"];
    for candidate in candidates {
        if run_lua_startup(candidate).is_ok() {
            return Ok(Some(candidate.to_string()));
        }
    }

    if parity_required() {
        anyhow::bail!(
            "Lua parity required but no interpreter found. Set LUA or install one of: {}.",
            candidates.join(", ")
        );
    }

    eprintln!("Skipping Lua execution: no interpreter found (set LUA or install lua5.4).");
    Ok(None)
}

pub fn run_lua_source(interpreter: &str, source: &str) -> Result<String> {
    let mut dir = std::env::temp_dir();
    dir.push("lualower-tests");
    fs::create_dir_all(&dir).with_context(|| format!("Creating {}", dir.display()))?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("clock")?
        .as_nanos();
    let script_path = dir.join(format!("case_{}_{nanos}.lua", std::process::id()));
    fs::write(&script_path, source).with_context(|| format!("Writing {}", script_path.display()))?;

    let output = Command::new(interpreter)
        .arg(&script_path)
        .output()
        .with_context(|| format!("Running lua on {}", script_path.display()));
    let _ = fs::remove_file(&script_path);
    let output = output?;
    ensure!(
        output.status.success(),
        "lua failed: {}\n--- script ---\n{source}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
