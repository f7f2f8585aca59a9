//! Sweeps JSON Schema fixtures through import → compile → import → compile
//! and checks the second compile reproduces the first.
//!
//! usage: dev-test-runner [FILTER_REGEX] [GLOB]
use std::path::Path;

use anyhow::{Context, bail};
use colored::Colorize;
use regex::Regex;
use schema_forge::{ImportOptions, compile_schema, import_with, project};
use serde_json::Value;

const DEFAULT_GLOB: &str = "fixtures/*.json";

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let filter = args.next().map(|f| Regex::new(&f)).transpose().context("bad filter regex")?;
    let pattern = args.next().unwrap_or_else(|| DEFAULT_GLOB.to_string());

    let mut failures = 0usize;
    let mut total = 0usize;
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        let name = path.to_string_lossy().to_string();
        if filter.as_ref().is_some_and(|re| !re.is_match(&name)) {
            continue;
        }
        total += 1;
        match check(&path) {
            Ok(notes) => println!("{} {name}{notes}", "✓".green()),
            Err(e) => {
                failures += 1;
                println!("{} {name}: {e:#}", "✗".red());
            }
        }
    }

    println!("{total} fixture(s), {failures} failure(s)");
    if failures > 0 {
        bail!("{failures} fixture(s) failed");
    }
    Ok(())
}

fn check(path: &Path) -> anyhow::Result<String> {
    let source = project::load_value(path)?;
    let options = ImportOptions { resolve_definitions: true };

    let first = import_with(&source, &options);
    let diagnostics = first.diagnostics.len();
    let compiled = compile_schema(&first.into_schema()).document;

    let second = import_with(&compiled, &options);
    if !second.diagnostics.is_empty() {
        bail!("compiled output re-imports with {} diagnostic(s)", second.diagnostics.len());
    }
    let recompiled = compile_schema(&second.into_schema()).document;
    if recompiled != compiled {
        bail!("not a fixed point:\n{}", diff(&compiled, &recompiled));
    }

    Ok(match diagnostics {
        0 => String::new(),
        n => format!(" ({n} import diagnostic(s))").dimmed().to_string(),
    })
}

fn diff(a: &Value, b: &Value) -> String {
    let a = serde_json::to_string_pretty(a).unwrap_or_default();
    let b = serde_json::to_string_pretty(b).unwrap_or_default();
    a.lines()
        .zip(b.lines())
        .filter(|(x, y)| x != y)
        .map(|(x, y)| format!("  - {x}\n  + {y}"))
        .take(10)
        .collect::<Vec<_>>()
        .join("\n")
}
