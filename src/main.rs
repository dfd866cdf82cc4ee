use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;

use loxide::{CancelToken, Lox, LoxError};

/// A tree-walking interpreter for the Lox language.
///
/// With a script path, runs the script to completion. Without one,
/// starts an interactive prompt.
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a Lox script.
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            // Extra positional arguments and the like: print usage and
            // exit with the conventional misuse code.
            println!("Usage: loxide [script]");
            return Ok(ExitCode::from(64));
        }
        Err(e) => {
            // --help / --version.
            e.print()?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())?;
    }

    let mut lox = Lox::new(Box::new(std::io::stdout()));

    let result = match &args.script {
        Some(path) => lox.run_file(&cancel, &path.to_string_lossy()),
        None => lox.run_prompt(&cancel),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{}", e);

            // Runtime failures get their own exit code; scan, parse and
            // resolve errors (and everything else) share the
            // compile-time one.
            if e.is_runtime() {
                Ok(ExitCode::from(70))
            } else {
                Ok(ExitCode::from(65))
            }
        }
    }
}
