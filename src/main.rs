//! Command-line front end for the fission disassembler.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use fission::format::{OutputFormat, SectionFormatter};
use fission::strategy::StrategyKind;
use fission::{engine, loader, DisassemblyError, Options};

#[derive(Parser, Debug)]
#[command(
    name = "fission",
    version,
    about = "Recover basic blocks from stripped ELF and PE binaries"
)]
struct Cli {
    /// Binary to disassemble
    binary: PathBuf,

    /// Exploration strategy
    #[arg(short, long, value_enum, default_value = "recursive")]
    strategy: StrategyKind,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Explore data sections in addition to code sections
    #[arg(long)]
    include_data: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase verbosity (repeat for more)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fission: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), DisassemblyError> {
    let data = fs::read(&cli.binary)?;
    let binary = loader::load(&data)?;

    let opts = Options {
        only_code_sections: !cli.include_data,
        strategy: cli.strategy,
    };
    let sections = engine::disasm(&binary, &opts)?;

    let rendered = cli.format.get_formatter().format(&sections)?;
    match &cli.output {
        Some(path) => fs::write(path, rendered)?,
        None => std::io::stdout().write_all(rendered.as_bytes())?,
    }

    Ok(())
}
