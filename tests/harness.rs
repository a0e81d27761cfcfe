use anyhow::{Context, Result, ensure};
use std::path::Path;

use lualower::Options;
use lualower::ast::File;
use test_support::{
    Case, CaseClass, detect_lua_interpreter, load_cases, normalize_output, run_lua_source,
    wrap_for_lua,
};

fn case_options(case: &Case) -> Options {
    let options = Options::default().with_global_scope(case.spec.global_scope);
    match &case.spec.indent {
        Some(indent) => options.with_indent(indent.clone()),
        None => options,
    }
}

fn transpile_case(case: &Case) -> Result<lualower::TranspileResult<String>> {
    let raw = case.read_program()?;
    let file: File =
        serde_json::from_str(&raw).with_context(|| format!("Decoding tree for {}", case.name))?;
    Ok(lualower::transpile(&file, &case_options(case)))
}

#[test]
fn converts_programs_to_expected_lua() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases {
        let result = transpile_case(&case)?;
        match case.spec.class {
            CaseClass::Success => {
                let output = result
                    .map_err(|err| anyhow::anyhow!("{err}"))
                    .with_context(|| format!("Converting {}", case.name))?;
                let Some(lua_file) = case.spec.expected.lua_file.as_deref() else {
                    continue;
                };
                let expected = case.read_text(lua_file)?;
                assert_eq!(output, expected, "Generated Lua mismatch for {}", case.name);
            }
            CaseClass::TranspileError => {
                let expected_file = case
                    .spec
                    .expected
                    .error_contains_file
                    .as_deref()
                    .with_context(|| format!("Missing error expectation file in {}", case.name))?;
                let expected_error = case.read_text(expected_file)?;
                let expected_error = expected_error.trim();
                let actual = match result {
                    Ok(output) => anyhow::bail!(
                        "Expected conversion error in {}, got:\n{output}",
                        case.name
                    ),
                    Err(err) => err.to_string(),
                };
                ensure!(
                    actual.contains(expected_error),
                    "Expected error containing '{expected_error}' in {}, got '{actual}'",
                    case.name
                );
            }
        }
    }

    Ok(())
}

#[test]
fn generated_lua_produces_expected_results() -> Result<()> {
    let Some(interpreter) = detect_lua_interpreter()? else {
        return Ok(());
    };
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases {
        let Some(result_file) = case.spec.expected.result_file.as_deref() else {
            continue;
        };
        ensure!(
            case.spec.class == CaseClass::Success,
            "Case {} has a result file but is not a success case",
            case.name
        );
        let output = transpile_case(&case)?
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("Converting {}", case.name))?;
        let actual = run_lua_source(&interpreter, &wrap_for_lua(&output))
            .with_context(|| format!("Running {} with {interpreter}", case.name))?;
        let expected = case.read_text(result_file)?;
        assert_eq!(
            normalize_output(&actual),
            normalize_output(&expected),
            "Lua result mismatch for {}",
            case.name
        );
    }

    Ok(())
}

#[test]
fn conversion_is_repeatable() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases.iter().filter(|case| case.spec.class == CaseClass::Success) {
        let first = transpile_case(case)?.map_err(|err| anyhow::anyhow!("{err}"))?;
        let second = transpile_case(case)?.map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(first, second, "Output differs between runs for {}", case.name);
    }

    Ok(())
}

#[test]
fn prologue_appears_only_when_used() -> Result<()> {
    let cases = load_cases(Path::new("tests/programs"))?;

    for case in cases.iter().filter(|case| case.spec.class == CaseClass::Success) {
        let output = transpile_case(case)?.map_err(|err| anyhow::anyhow!("{err}"))?;
        let uses_iter = output.contains("in __iter__(");
        let defines_iter = output.contains("function __iter__(v)");
        ensure!(
            uses_iter == defines_iter,
            "Iterator helper presence mismatch in {}",
            case.name
        );
    }

    Ok(())
}
