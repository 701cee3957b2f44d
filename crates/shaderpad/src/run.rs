use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use preprocessor::{extract_macro_names, preprocess};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::report;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let source = read_source(&cli.input)?;

    if cli.macros {
        for name in extract_macro_names(&source) {
            println!("{name}");
        }
        return Ok(());
    }

    let result = preprocess(&source);
    tracing::debug!(
        lines = result.line_mapping.len(),
        diagnostics = result.errors.len(),
        "preprocessing finished"
    );

    if let Some(path) = &cli.translate_errors {
        let log = fs::read_to_string(path)
            .with_context(|| format!("failed to read driver log '{}'", path.display()))?;
        for line in report::translate_driver_log(&log, &result.line_mapping) {
            println!("{line}");
        }
        return Ok(());
    }

    let payload = if cli.json {
        serde_json::to_string_pretty(&result).context("failed to serialize result")?
    } else {
        result.code.clone()
    };
    write_output(cli.output.as_deref(), &payload)?;

    for error in &result.errors {
        eprintln!("line {}: {}", error.line, error.message);
    }
    if !result.errors.is_empty() && !cli.best_effort {
        bail!("preprocessing produced {} diagnostic(s)", result.errors.len());
    }

    Ok(())
}

fn read_source(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read shader source from stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(input).with_context(|| format!("failed to read shader source '{input}'"))
}

fn write_output(path: Option<&Path>, payload: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, payload)
            .with_context(|| format!("failed to write output '{}'", path.display())),
        None => {
            println!("{payload}");
            Ok(())
        }
    }
}
