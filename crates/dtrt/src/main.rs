//! Command-line front end for the DTRT data-routing DSL compiler.
//!
//! Thin by design: all compilation logic lives in `dtrt-core`; this binary
//! only parses flags, wires up logging, and turns a [`dtrt_core::CompileError`]
//! into a rendered diagnostic and the exit code spec.md §6.5 mandates.

use clap::{Parser, ValueEnum};
use dtrt_core::{CompilationConfig, CompileError, Engine, Lang};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LangArg {
    Ru,
    En,
}

impl From<LangArg> for Lang {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::Ru => Lang::Ru,
            LangArg::En => Lang::En,
        }
    }
}

/// Compile a DTRT data-routing program to its JSON intermediate representation.
#[derive(Debug, Parser)]
#[command(name = "dtrt", version, about)]
struct Cli {
    /// DTRT source: a file path, or inline DSL text.
    source: String,

    /// Language for diagnostic messages (distinct from the DSL's own `lang=` directive).
    #[arg(long, value_enum, default_value = "en")]
    lang: LangArg,

    /// Colorize diagnostics.
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorMode,

    /// Enable the DSL's `Debug`-class localized messages.
    #[arg(long)]
    debug: bool,

    /// Directory of `*.json` files resolving `$$external.path` references.
    #[arg(long, value_name = "PATH")]
    vars_dir: Option<PathBuf>,

    /// User directory of `*.py` function definitions, merged with the standard library.
    #[arg(long, value_name = "PATH")]
    funcs_dir: Option<PathBuf>,

    /// Root directory of the per-language standard function library (required for function-existence checking).
    #[arg(long, value_name = "PATH")]
    std_funcs_root: Option<PathBuf>,

    /// Write the rendered IR to FILE instead of stdout.
    #[arg(long, value_name = "FILE")]
    emit_ir: Option<PathBuf>,
}

fn resolve_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::IsTerminal::is_terminal(&std::io::stdout()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let color = resolve_color(cli.color);
    let config = CompilationConfig { lang: cli.lang.into(), color, debug: cli.debug };

    let mut engine = Engine::new(config);
    if let Some(root) = &cli.std_funcs_root {
        engine = engine.with_std_func_root(root.clone());
    }
    if let Some(dir) = &cli.funcs_dir {
        engine = engine.with_user_func_dir(dir.clone());
    }
    if let Some(dir) = &cli.vars_dir {
        engine = engine.with_vars_dir(dir.clone());
    }

    match engine.compile(&cli.source) {
        Ok(ir) => {
            let rendered = dtrt_core::engine::render_ir(&ir);
            match &cli.emit_ir {
                Some(path) => {
                    if let Err(err) = std::fs::write(path, rendered) {
                        eprintln!("failed to write {}: {err}", path.display());
                        return ExitCode::FAILURE;
                    }
                }
                None => println!("{rendered}"),
            }
            ExitCode::SUCCESS
        }
        Err(CompileError::Fatal(diag)) => {
            eprintln!("{diag}");
            ExitCode::FAILURE
        }
        Err(CompileError::Io(err)) => {
            eprintln!("I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}
