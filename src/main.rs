use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Parser as ClapParser, ValueEnum};
use env_logger::{Builder, Env};
use log::{debug, info};

use lox_interpreter as lox;

use lox::error::LoxError;
use lox::lox::{EX_DATAERR, EX_IOERR, EX_OK, EX_USAGE, USAGE};
use lox::Lox;

/// Stack for the interpreter thread: room for `MAX_CALL_DEPTH` nested Lox
/// calls, each of which spans several Rust frames.
const STACK_SIZE: usize = 512 * 1024 * 1024;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    /// Script to run; without one, start an interactive prompt
    scripts: Vec<PathBuf>,

    /// Enable logging to lox.log (level from RUST_LOG, default debug)
    #[arg(long)]
    log: bool,

    /// Print an intermediate form of the script instead of running it
    #[arg(long, value_enum)]
    dump: Option<Dump>,

    /// With `--dump tokens`, print the tokens as a JSON array
    #[arg(long, requires = "dump")]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Dump {
    /// One token per line: TYPE lexeme literal
    Tokens,
    /// The parenthesised syntax tree, one statement per line
    Ast,
}

fn init_logger() -> Result<()> {
    let log_file = File::create("lox.log").context("Failed to create lox.log")?;

    Builder::from_env(Env::default().default_filter_or("debug"))
        .format(|buf, record| {
            // Strip 'lox_interpreter::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("lox_interpreter::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "{} [{}:{}] {} - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    info!("Logger initialized, writing to lox.log");
    Ok(())
}

fn dump(lox: &mut Lox, filename: &Path, what: Dump, json: bool) -> Result<i32> {
    let source = fs::read_to_string(filename)
        .with_context(|| format!("Failed to read file {:?}", filename))?;

    match what {
        Dump::Tokens if json => {
            let tokens = lox.tokenize(&source);
            println!("{}", serde_json::to_string_pretty(&tokens)?);
        }
        Dump::Tokens => {
            for token in lox.tokenize(&source) {
                println!("{}", token);
            }
        }
        Dump::Ast => {
            let ast = lox.dump_ast(&source);
            if !ast.is_empty() {
                println!("{}", ast);
            }
        }
    }

    Ok(if lox.session().had_error() {
        EX_DATAERR
    } else {
        EX_OK
    })
}

/// Runs the selected mode and returns the exit code.
fn run(args: Cli) -> Result<i32> {
    let mut lox = Lox::new();

    let code: i32 = match args.scripts.as_slice() {
        [] => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut stdout = io::stdout();
            lox.run_prompt(&mut input, &mut stdout)?;
            EX_OK
        }

        [filename] => match args.dump {
            Some(what) => dump(&mut lox, filename, what, args.json)?,
            None => match lox.run_file(filename) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("Failed to run {:?}: {}", filename, e);
                    match e {
                        LoxError::Utf8(_) => EX_DATAERR,
                        _ => EX_IOERR,
                    }
                }
            },
        },

        _ => {
            println!("{}", USAGE);
            EX_USAGE
        }
    };

    Ok(code)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        Builder::new().filter_level(log::LevelFilter::Off).init();
    }

    info!("CLI arguments: {:?}", args);

    // Deep Lox recursion needs far more stack than the main thread has.
    let worker = thread::Builder::new()
        .name("lox".into())
        .stack_size(STACK_SIZE)
        .spawn(move || run(args))
        .context("Failed to spawn interpreter thread")?;

    let code: i32 = worker
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))??;

    debug!("Exiting with code {}", code);

    io::stdout().flush().context("Failed to flush stdout")?;

    process::exit(code);
}
