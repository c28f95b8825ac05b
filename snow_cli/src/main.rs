//! The `snow` command-line driver (spec §6 "CLI (compile)").
//!
//! Mirrors `seen_cli::main`'s shape — parse arguments, run the pipeline
//! stage by stage, map the first failure to a process exit code — with one
//! wrinkle: the spec's token grammar treats `run` as a bare positional
//! word ("execute the VM on the produced `.water` immediately") rather than
//! a `--run` flag, so it's peeled off the argument list by hand before
//! handing the rest to `clap`.

mod config;
mod driver;
mod project;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

/// Compiles (and optionally runs) Snow source files.
#[derive(Parser, Debug)]
#[command(name = "snow", version, about = "Snow language compiler and VM")]
struct Cli {
    /// `.snow` source file paths.
    sources: Vec<PathBuf>,

    /// Recurse into this directory for `.snow` files; may be repeated.
    #[arg(short = 'd', long = "dir")]
    dirs: Vec<PathBuf>,

    /// Output base name; `.water` is appended if missing.
    #[arg(short = 'o', long = "out", default_value = "out")]
    out: PathBuf,

    /// Run the produced `.water` program immediately.
    #[arg(long = "run")]
    run: bool,

    /// Verbose build diagnostics (register allocation stats, table dumps).
    #[arg(long)]
    debug: bool,

    /// Per-instruction VM execution trace.
    #[arg(long)]
    trace: bool,
}

/// Lexical exit codes for the stage that failed (spec §6): 0 success;
/// distinct non-zero codes for argument, lex/parse, semantic, and runtime
/// failure so scripts driving this CLI can tell them apart.
const EXIT_ARGS: u8 = 2;
const EXIT_PARSE: u8 = 3;
const EXIT_SEMANTIC: u8 = 4;
const EXIT_BUILD: u8 = 5;
const EXIT_RUNTIME: u8 = 6;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut raw_args: Vec<String> = std::env::args().collect();
    let run = strip_bare_run_token(&mut raw_args);

    let mut cli = match Cli::try_parse_from(raw_args) {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            return ExitCode::from(EXIT_ARGS);
        }
    };
    cli.run = cli.run || run;

    match run_cli(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(EXIT_BUILD)
        }
    }
}

/// Removes the first bare `run` token (not a flag, not a path ending in
/// `.snow`) from the argument list, reporting whether it was present.
fn strip_bare_run_token(args: &mut Vec<String>) -> bool {
    if let Some(pos) = args.iter().skip(1).position(|a| a == "run").map(|i| i + 1) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn run_cli(cli: &Cli) -> Result<u8> {
    let files = match project::discover_sources(&cli.sources, &cli.dirs) {
        Ok(files) => files,
        Err(e) => {
            log::error!("{}", e);
            return Ok(EXIT_ARGS);
        }
    };
    log::info!("compiling {} source file(s)", files.len());

    let program = match project::build_program(&files) {
        Ok(p) => p,
        Err(e) => {
            log::error!("{}", e);
            return Ok(EXIT_PARSE);
        }
    };

    let tables = match driver::analyze(&program) {
        Ok(tables) => tables,
        Err(diagnostics) => {
            for d in diagnostics.errors() {
                log::error!("{}", d);
            }
            return Ok(EXIT_SEMANTIC);
        }
    };

    let (water, ir) = match driver::build_water(&program, tables) {
        Ok(result) => result,
        Err(e) => {
            log::error!("{}", e);
            return Ok(EXIT_BUILD);
        }
    };

    if cli.debug {
        eprint!("{}", driver::debug_dump(&ir));
    }

    let out_path = driver::write_water(&cli.out, &water).context("writing .water output")?;
    log::info!("wrote {}", out_path.display());

    if cli.run {
        match driver::run_water(&water, cli.trace) {
            Ok(result) => {
                if let Some(value) = result {
                    log::info!("program returned {:?}", value);
                }
            }
            Err(e) => {
                log::error!("{}", e);
                return Ok(EXIT_RUNTIME);
            }
        }
    }

    Ok(0)
}
