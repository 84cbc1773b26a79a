// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::assembler::error::{AsmError, AsmErrorKind, RunError, RunReport};
use crate::assembler::Assembler;
use crate::banks::BankSizeFinder;

pub const VERSION: &str = "0.1.0";

const LONG_ABOUT: &str = "6502 cross-assembler producing ROM images, symbol maps and disassembly \
listings.

All input files are assembled as one unit in argument order; labels marked
.globl are visible across files. Addresses are 4 hex digits. Outputs are
opt-in: pass -b/--bin, -l/--list, -y/--symbols or -d/--disasm to produce
them.";

#[derive(Parser, Debug)]
#[command(
    name = "romforge",
    version = VERSION,
    about = "6502 cross-assembler with labels, expressions and macros",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(value_name = "FILE", required = true)]
    pub infiles: Vec<PathBuf>,
    #[arg(
        short = 'g',
        long = "org",
        value_name = "aaaa",
        default_value = "8000",
        long_help = "Start address of the assembled image (4 hex digits)."
    )]
    pub org: String,
    #[arg(
        short = 's',
        long = "size",
        value_name = "ssss",
        default_value = "8000",
        long_help = "Maximum image size in bytes (hex). Writes past this are an error."
    )]
    pub size: String,
    #[arg(
        short = 'b',
        long = "bin",
        value_name = "FILE",
        long_help = "Write the raw assembled bytes to FILE."
    )]
    pub bin: Option<PathBuf>,
    #[arg(
        short = 'l',
        long = "list",
        value_name = "FILE",
        long_help = "Write a listing (address, bytes, source) to FILE."
    )]
    pub list: Option<PathBuf>,
    #[arg(
        short = 'y',
        long = "symbols",
        value_name = "FILE",
        long_help = "Write the symbol table as JSON to FILE."
    )]
    pub symbols: Option<PathBuf>,
    #[arg(
        short = 'd',
        long = "disasm",
        value_name = "ssss:eeee",
        long_help = "Print a disassembly of the given address window (4 hex digits each)."
    )]
    pub disasm: Option<String>,
    #[arg(
        long = "disasm-json",
        value_name = "FILE",
        requires = "disasm",
        long_help = "Also write the disassembly window as JSON to FILE."
    )]
    pub disasm_json: Option<PathBuf>,
    #[arg(
        long = "bank-size",
        value_name = "BYTES",
        long_help = "Report how many power-of-two-aligned banks of BYTES cover the image."
    )]
    pub bank_size: Option<u32>,
}

#[derive(Debug)]
pub struct CliConfig {
    pub org: u16,
    pub max_size: usize,
    pub disasm_window: Option<(u16, u16)>,
}

fn cli_error(message: impl Into<String>) -> AsmError {
    AsmError::new(AsmErrorKind::Cli, message)
}

fn parse_hex_addr(text: &str, what: &str) -> Result<u16, AsmError> {
    u16::from_str_radix(text, 16)
        .map_err(|_| cli_error(format!("Invalid {what}: {text} (expected 4 hex digits)")))
}

/// Validate CLI arguments into a run configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmError> {
    let org = parse_hex_addr(&cli.org, "start address")?;
    let max_size = usize::from_str_radix(&cli.size, 16)
        .map_err(|_| cli_error(format!("Invalid size: {} (expected hex)", cli.size)))?;
    if max_size == 0 {
        return Err(cli_error("Size must be non-zero"));
    }
    let disasm_window = match &cli.disasm {
        Some(window) => {
            let (start, end) = window.split_once(':').ok_or_else(|| {
                cli_error(format!("Invalid window: {window} (expected ssss:eeee)"))
            })?;
            let start = parse_hex_addr(start, "window start")?;
            let end = parse_hex_addr(end, "window end")?;
            if end < start {
                return Err(cli_error(format!("Window end before start: {window}")));
            }
            Some((start, end))
        }
        None => None,
    };
    Ok(CliConfig {
        org,
        max_size,
        disasm_window,
    })
}

#[derive(Debug, Serialize)]
struct SymbolRecord<'a> {
    name: &'a str,
    address: u16,
    file: &'a str,
    line: u32,
    global: bool,
    references: usize,
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn io_run_error(message: String) -> RunError {
    RunError::new(AsmError::new(AsmErrorKind::Io, message), Vec::new())
}

/// Run the assembler with command-line arguments.
pub fn run() -> Result<RunReport, RunError> {
    let cli = Cli::parse();
    let config = validate_cli(&cli).map_err(|error| RunError::new(error, Vec::new()))?;

    let mut sources = Vec::new();
    for path in &cli.infiles {
        let text = fs::read_to_string(path)
            .map_err(|err| io_run_error(format!("Read {}: {err}", path.display())))?;
        sources.push((file_label(path), text));
    }

    let assembly = Assembler::new().assemble(config.org, config.max_size, &sources)?;
    info!(
        start = config.org,
        bytes = assembly.image().extent(),
        symbols = assembly.symbols().entries().len(),
        "assembled"
    );

    if let Some(path) = &cli.bin {
        let file = File::create(path)
            .map_err(|err| io_run_error(format!("Create {}: {err}", path.display())))?;
        assembly
            .image()
            .write_bin(BufWriter::new(file))
            .map_err(|err| io_run_error(format!("Write {}: {err}", path.display())))?;
    }

    if let Some(path) = &cli.list {
        let file = File::create(path)
            .map_err(|err| io_run_error(format!("Create {}: {err}", path.display())))?;
        assembly
            .write_listing(BufWriter::new(file))
            .map_err(|err| io_run_error(format!("Write {}: {err}", path.display())))?;
    }

    if let Some(path) = &cli.symbols {
        let records: Vec<SymbolRecord<'_>> = assembly
            .symbols()
            .entries()
            .iter()
            .map(|entry| SymbolRecord {
                name: &entry.name,
                address: entry.address,
                file: &entry.file,
                line: entry.line,
                global: entry.global,
                references: entry.references.len(),
            })
            .collect();
        let file = File::create(path)
            .map_err(|err| io_run_error(format!("Create {}: {err}", path.display())))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &records)
            .map_err(|err| io_run_error(format!("Write {}: {err}", path.display())))?;
    }

    if let Some((start, end)) = config.disasm_window {
        let lines = assembly.disassembly(start, end);
        for line in &lines {
            let hex: Vec<String> = line.bytes.iter().map(|b| format!("{b:02x}")).collect();
            println!("{:04x}  {:<9} {}", line.addr, hex.join(" "), line.text);
        }
        if let Some(path) = &cli.disasm_json {
            let file = File::create(path)
                .map_err(|err| io_run_error(format!("Create {}: {err}", path.display())))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &lines)
                .map_err(|err| io_run_error(format!("Write {}: {err}", path.display())))?;
        }
    }

    if let Some(bank_size) = cli.bank_size {
        if bank_size == 0 {
            return Err(RunError::new(cli_error("Bank size must be non-zero"), Vec::new()));
        }
        let needed = (assembly.image().extent() as u32).div_ceil(bank_size);
        let finder = BankSizeFinder::new();
        let (candidate, index) = finder.find_best_match(needed);
        let covered = candidate.count >= needed;
        info!(
            needed,
            count = candidate.count,
            multiplier = candidate.multiplier,
            exponent = candidate.exponent,
            index,
            covered,
            "bank fit"
        );
        println!(
            "{} bank(s) of {} bytes: {} = {} * 2^{}{}",
            needed,
            bank_size,
            candidate.count,
            candidate.multiplier,
            candidate.exponent,
            if covered { "" } else { " (request exceeds largest candidate)" }
        );
    }

    Ok(RunReport::new(assembly.warnings().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::{validate_cli, Cli};
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("romforge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_parse() {
        let cli = parse(&["main.asm"]);
        let config = validate_cli(&cli).unwrap();
        assert_eq!(config.org, 0x8000);
        assert_eq!(config.max_size, 0x8000);
        assert!(config.disasm_window.is_none());
    }

    #[test]
    fn hex_fields_are_validated() {
        let cli = parse(&["-g", "c000", "-s", "4000", "main.asm"]);
        let config = validate_cli(&cli).unwrap();
        assert_eq!(config.org, 0xc000);
        assert_eq!(config.max_size, 0x4000);

        let cli = parse(&["-g", "xyz", "main.asm"]);
        assert!(validate_cli(&cli).is_err());
    }

    #[test]
    fn disasm_window_parses() {
        let cli = parse(&["-d", "8000:8010", "main.asm"]);
        let config = validate_cli(&cli).unwrap();
        assert_eq!(config.disasm_window, Some((0x8000, 0x8010)));

        let cli = parse(&["-d", "8010:8000", "main.asm"]);
        assert!(validate_cli(&cli).is_err());
    }
}
