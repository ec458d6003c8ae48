use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use dwarfline_core::prelude::*;
use dwarfline_utils::{LogConfig, LogFormat, LogLevel, debug, init_logging, warn};

/// Map machine addresses to source locations using an object's DWARF line tables.
#[derive(Parser, Debug)]
#[command(name = "dwarfline")]
#[command(version)]
#[command(about = "Map machine addresses to source locations using DWARF line tables", long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli
{
    #[command(subcommand)]
    command: Option<Commands>,

    /// Object file with debug information (ELF, Mach-O or PE)
    #[arg(required = true)]
    binary: Option<PathBuf>,

    /// Addresses to resolve (hex format: 0x1000 or decimal)
    #[arg(required = true, num_args = 1..)]
    addresses: Vec<String>,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log output format (text or json); overrides DWARFLINE_LOG_FORMAT
    #[arg(long, global = true)]
    format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List the compilation units in an object file
    Units
    {
        /// Object file with debug information
        binary: PathBuf,
    },
}

fn main()
{
    let cli = Cli::parse();

    let config = LogConfig::from_env().with_level(cli.log_level).with_format(cli.format);
    let _guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>>
{
    match (cli.command, cli.binary) {
        (Some(Commands::Units { binary }), _) => {
            let lines = load(&binary)?;
            print_units(&lines);
            Ok(())
        }
        (None, Some(binary)) => {
            let addresses = cli
                .addresses
                .iter()
                .map(|text| parse_address(text))
                .collect::<Result<Vec<_>, _>>()?;
            let lines = load(&binary)?;
            for address in addresses {
                println!("{}", format_resolution(address, lines.resolve_line(address).as_ref()));
            }
            Ok(())
        }
        (None, None) => Err("no object file given".into()),
    }
}

fn load(binary: &Path) -> DwarfResult<DwarfLines>
{
    debug!(path = %binary.display(), "loading object");
    let sections = ObjectSections::open(binary)?;
    DwarfLines::load(&sections)
}

fn print_units(lines: &DwarfLines)
{
    println!("{:<12} {:<8} {:<16} {:<6} {:>8}  NAME", "OFFSET", "VERSION", "TYPE", "FORMAT", "ROWS");
    for unit in lines.units() {
        let name = match lines.unit_name(unit) {
            Ok(Some(name)) => name.to_string(),
            Ok(None) => "-".to_string(),
            Err(e) => {
                warn!(unit = unit.offset(), error = %e, "unreadable unit name");
                "?".to_string()
            }
        };
        let rows = match lines.line_program(unit) {
            Ok(Some(program)) => program.rows().len().to_string(),
            Ok(None) => "-".to_string(),
            Err(e) => {
                warn!(unit = unit.offset(), error = %e, "unreadable line program");
                "?".to_string()
            }
        };
        let format = if unit.is64() { "dwarf64" } else { "dwarf32" };

        println!(
            "{:<12} {:<8} {:<16} {:<6} {:>8}  {}",
            format!("0x{:x}", unit.offset()),
            unit.version(),
            unit.unit_type().to_string(),
            format,
            rows,
            name
        );
    }
}

/// Parse `0x`-prefixed hex or plain decimal.
fn parse_address(text: &str) -> Result<u64, String>
{
    let trimmed = text.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => trimmed.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid address '{text}': {e}"))
}

fn format_resolution(address: u64, location: Option<&LineLocation>) -> String
{
    match location {
        Some(location) => format!("0x{address:016x} {location}"),
        None => format!("0x{address:016x} ??:0"),
    }
}
