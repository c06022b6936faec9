//! Minimal driver binary: run a script file, or inspect it without running
//! it via `--check`/`--disassemble`.

use std::process::ExitCode;
use std::{env, fs};

use kestrel::value::code::disassemble;
use kestrel::Kestrel;

fn usage() -> ! {
    eprintln!("usage: kestrel-cli [--check | --disassemble] <script>");
    std::process::exit(2);
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let mode = if args.first().map(String::as_str) == Some("--check") {
        args.remove(0);
        Mode::Check
    } else if args.first().map(String::as_str) == Some("--disassemble") {
        args.remove(0);
        Mode::Disassemble
    } else {
        Mode::Run
    };

    let Some(path) = args.first() else { usage() };
    let src = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: couldn't read `{path}`: {e}");
            return ExitCode::FAILURE;
        }
    };

    let kestrel = Kestrel::new();
    match mode {
        Mode::Check => match kestrel.check(&src) {
            Ok(()) => {
                println!("ok");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
        Mode::Disassemble => match kestrel.compile(&src) {
            Ok(code) => {
                print!("{}", disassemble(&code));
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
        Mode::Run => match kestrel.eval(&src) {
            Ok(v) => {
                println!("{v}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        },
    }
}

enum Mode {
    Run,
    Check,
    Disassemble,
}

fn fail(e: &kestrel::error::Error) -> ExitCode {
    if e.is_panic() {
        eprintln!("internal error: {e}");
    } else {
        eprintln!("error: {e}");
    }
    ExitCode::FAILURE
}
