//! Compile proto files to Rust modules.
//!
//! Usage:
//!   compile_proto [OPTIONS] FILE.proto [FILE.proto ...]
//!
//! Options:
//!   -o, --out DIR       Output directory (default: current directory)
//!   -I, --include PATH  Extra import search directory (repeatable)
//!
//! Each proto file (and everything it imports) becomes one `<module>.rs` in
//! the output directory. All schema errors for a run are printed before the
//! non-zero exit; nothing is written unless the whole compile succeeds.

use anyhow::{bail, Result};
use protomsg::Compiler;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Args {
    out_dir: PathBuf,
    includes: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut out_dir = PathBuf::from(".");
    let mut includes = Vec::new();
    let mut files = Vec::new();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-o" | "--out" => match it.next() {
                Some(dir) => out_dir = PathBuf::from(dir),
                None => bail!("{} requires a directory", arg),
            },
            "-I" | "--include" => match it.next() {
                Some(path) => includes.push(PathBuf::from(path)),
                None => bail!("{} requires a path", arg),
            },
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option: {}", other),
            other => files.push(PathBuf::from(other)),
        }
    }
    if files.is_empty() {
        bail!("no input files; try --help");
    }
    Ok(Args {
        out_dir,
        includes,
        files,
    })
}

fn print_usage() {
    eprintln!("Usage: compile_proto [-o DIR] [-I PATH ...] FILE.proto [FILE.proto ...]");
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("compile_proto: {}", e);
            print_usage();
            return ExitCode::from(2);
        }
    };

    let mut compiler = Compiler::new(&args.out_dir);
    for include in &args.includes {
        compiler.include_path(include);
    }

    let mut failed = false;
    for file in &args.files {
        match compiler.compile(file) {
            Ok(path) => println!("{} -> {}", file.display(), path.display()),
            Err(e) => {
                for error in &e.errors {
                    eprintln!("{}", error);
                }
                failed = true;
            }
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
