use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "shaderpad",
    author,
    version,
    about = "Preprocess GLSL shader playground sources",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Shader source file, or `-` to read from stdin.
    #[arg(value_name = "FILE")]
    pub input: String,

    /// Write preprocessed GLSL to this path instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Emit the full result (code, line mapping, diagnostics) as JSON.
    #[arg(long)]
    pub json: bool,

    /// List macro names defined anywhere in the source and exit.
    #[arg(long)]
    pub macros: bool,

    /// Exit successfully even when preprocessing produced diagnostics.
    #[arg(long)]
    pub best_effort: bool,

    /// Translate saved WebGL driver error output (`ERROR: <col>:<line>: ...`)
    /// back to original source lines.
    #[arg(long, value_name = "FILE")]
    pub translate_errors: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}
