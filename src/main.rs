use std::{cell::RefCell, io::Write, path::PathBuf, process::ExitCode, rc::Rc};

use clap::{Args, Parser, Subcommand};
use doscript::{
    tokenizer::{Token, TokenType, TokenizeError},
    tree_builder,
    tree_walk_interpreter::{ExecutionError, Interpreter},
};

#[derive(Debug, Parser)]
struct Cli {
    /// Log at debug level and dump the tokens and the tree before running
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a script
    Run(RunArgs),
    Repl,
    /// Print the token stream of a script
    Tokens(TokensArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    file: PathBuf,

    /// Write `put` output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep running the remaining statements after one fails
    #[arg(long)]
    keep_going: bool,
}

#[derive(Debug, Args)]
struct TokensArgs {
    file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum InterpretError {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("{0} statements failed")]
    Failed(usize),
}

fn main() -> ExitCode {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    let result = match args.command() {
        Command::Repl => repl_command(args.verbose),
        Command::Run(run_args) => run_command(run_args, args.verbose),
        Command::Tokens(tokens_args) => tokens_command(tokens_args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn repl_command(verbose: bool) -> Result<(), InterpretError> {
    println!("Welcome to the doscript REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let mut interpreter = Interpreter::default();
    let mut input = String::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        input.clear();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        if let Err(e) = interpret(&mut interpreter, input.trim(), verbose, false) {
            println!("Error: {}", e)
        }
    }

    Ok(())
}

fn run_command(args: &RunArgs, verbose: bool) -> Result<(), InterpretError> {
    let source = std::fs::read_to_string(&args.file)?;

    let mut interpreter = match &args.output {
        Some(path) => Interpreter::new(Rc::new(RefCell::new(std::fs::File::create(path)?))),
        None => Interpreter::default(),
    };

    interpret(&mut interpreter, &source, verbose, args.keep_going)
}

fn tokens_command(args: &TokensArgs) -> Result<(), InterpretError> {
    let source = std::fs::read_to_string(&args.file)?;
    print_tokens(&mut std::io::stdout(), &doscript::tokenizer::tokens(&source)?)?;
    Ok(())
}

/// Build errors are reported and the statements that did build still run.
fn interpret(
    interpreter: &mut Interpreter,
    source: &str,
    verbose: bool,
    keep_going: bool,
) -> Result<(), InterpretError> {
    let tokens = doscript::tokenizer::tokens(source)?;
    if verbose {
        print_tokens(&mut std::io::stderr(), &tokens)?;
    }

    let built = tree_builder::build(&tokens);
    if verbose {
        eprint!("{}", built.file);
    }
    if !built.errors.is_empty() {
        eprint!("{}", built.errors);
    }

    if keep_going {
        let errors = interpreter.interpret_all(&built.file);
        for error in &errors {
            eprintln!("{error}");
        }
        if !errors.is_empty() {
            return Err(InterpretError::Failed(errors.len()));
        }
    } else {
        interpreter.interpret(&built.file)?;
    }

    if built.errors.is_empty() {
        Ok(())
    } else {
        Err(InterpretError::Failed(built.errors.0.len()))
    }
}

fn print_tokens(out: &mut impl Write, tokens: &[Token]) -> std::io::Result<()> {
    let mut line = 0;
    for token in tokens {
        if token.span.start_line != line {
            write!(out, "{:4} ", token.span.start_line)?;
            line = token.span.start_line;
        } else {
            write!(out, "   | ")?;
        }

        writeln!(out, "{:<20} {}", format!("{:?}", token.token_type), token.lexeme)?;

        if token.token_type == TokenType::Eof {
            break;
        }
    }

    Ok(())
}
