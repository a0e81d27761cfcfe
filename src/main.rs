use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};

use lualower::Options;
use lualower::ast::File;
use lualower::diagnostic::Diagnostic;

const USAGE: &str = "usage: lualower [--global-scope] [--indent <str>] [--config <options.yaml>] [--source <script>] [tree.json]";

fn main() -> Result<ExitCode> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let mut options = Options::default();
    let mut global_scope = false;
    let mut indent: Option<String> = None;
    let mut source_path: Option<String> = None;
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--global-scope" | "-g" => global_scope = true,
            "--indent" => {
                indent = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("Missing indent string after {arg}"))?,
                );
            }
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing config path after {arg}"))?;
                let raw = fs::read_to_string(&path).with_context(|| format!("Reading {path}"))?;
                options = serde_yaml::from_str(&raw).with_context(|| format!("Parsing {path}"))?;
            }
            "--source" | "-s" => {
                source_path = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("Missing source path after {arg}"))?,
                );
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(ExitCode::SUCCESS);
            }
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported\n{USAGE}");
                }
                break;
            }
        }
    }

    if global_scope {
        options = options.with_global_scope(true);
    }
    if let Some(indent) = indent {
        options = options.with_indent(indent);
    }

    let raw = if let Some(path) = &input_path {
        fs::read_to_string(path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };
    let file: File = serde_json::from_str(&raw).context("Decoding syntax tree")?;

    match lualower::transpile(&file, &options) {
        Ok(output) => {
            print!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let source = match &source_path {
                Some(path) => Some(fs::read_to_string(path).with_context(|| format!("Reading {path}"))?),
                None => None,
            };
            let name = source_path.as_deref().unwrap_or("script");
            eprint!("{}", Diagnostic::from_error(&err, name).render(source.as_deref()));
            Ok(ExitCode::FAILURE)
        }
    }
}
