//! helpc - help source compiler

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use helpc::{
    CompileContext, Error, HelpConfig, MemoryReport, Stats, SwapMode, append_help, delete_help,
};

#[derive(Parser)]
#[command(name = "helpc")]
#[command(version, about = "Help source compiler", long_about = None)]
#[command(after_help = "EXAMPLES:
    helpc compile help.src            Write the header and help database
    helpc print help.src manual.doc   Write the printable manual
    helpc append fractint.hlp a.exe   Append help to an executable
    helpc delete a.exe                Remove appended help")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Only report warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a help source into its header and help database
    Compile(CompileArgs),
    /// Print the document of a help source as plain text
    Print(PrintArgs),
    /// Append a help database to an executable
    Append {
        #[arg(value_name = "HLP", default_value = "fractint.hlp")]
        hlp: PathBuf,
        #[arg(value_name = "EXE", default_value = "fractint.exe")]
        exe: PathBuf,
    },
    /// Remove appended help from an executable
    Delete {
        #[arg(value_name = "EXE", default_value = "fractint.exe")]
        exe: PathBuf,
    },
}

#[derive(Args)]
struct CompileArgs {
    #[arg(value_name = "SRC", default_value = "help.src")]
    source: PathBuf,

    /// Show statistics
    #[arg(long)]
    stats: bool,

    /// Show memory usage
    #[arg(long)]
    memory: bool,

    /// Report statistics and memory usage as JSON
    #[arg(long)]
    json: bool,

    /// Directory for the topic text swap file
    #[arg(long, value_name = "DIR")]
    swap_dir: Option<PathBuf>,

    /// Header to write instead of the source's HdrFile
    #[arg(long, value_name = "FILE")]
    header: Option<PathBuf>,

    /// Help database to write instead of the source's HlpFile
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PrintArgs {
    #[arg(value_name = "SRC", default_value = "help.src")]
    source: PathBuf,

    #[arg(value_name = "OUT", default_value = "fractint.doc")]
    output: PathBuf,

    /// Directory for the topic text swap file
    #[arg(long, value_name = "DIR")]
    swap_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    errors: usize,
    warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a Stats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<&'a MemoryReport>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Compile(args) => compile(args),
        Command::Print(args) => print(args),
        Command::Append { hlp, exe } => {
            let mut ctx = CompileContext::new(&HelpConfig::default().limits);
            append_help(&hlp, &exe, &mut ctx)
        }
        Command::Delete { exe } => delete_help(&exe),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn compile(args: CompileArgs) -> Result<(), Error> {
    let mut config = HelpConfig::new().with_swap(SwapMode::File {
        dir: args.swap_dir,
    });
    if let Some(header) = args.header {
        config = config.with_header_file(header);
    }
    if let Some(output) = args.output {
        config = config.with_help_file(output);
    }

    let outcome = helpc::compile(&args.source, &config)?;

    if args.json {
        let report = JsonReport {
            errors: outcome.errors,
            warnings: outcome.warnings,
            stats: args.stats.then_some(&outcome.stats),
            memory: args.memory.then_some(&outcome.memory),
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: {e}"),
        }
    } else {
        if args.stats {
            println!("\n{}", outcome.stats);
        }
        if args.memory {
            println!("\n{}", outcome.memory);
        }
    }

    outcome.into_result().map(|_| ())
}

fn print(args: PrintArgs) -> Result<(), Error> {
    let config = HelpConfig::new().with_swap(SwapMode::File {
        dir: args.swap_dir,
    });
    helpc::print(&args.source, &args.output, &config)?
        .into_result()
        .map(|_| ())
}
