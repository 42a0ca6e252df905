//! YP Bank Converter - CLI tool for converting between financial formats.

use clap::Parser;
use std::fs::File;
use std::io::{self, Read, Write};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ypbank_interchange::{
    camt053_format::Camt053Document,
    conversion::{camt053_document_to_mt940, mt940_to_camt053_document},
    datev::{bank_transactions, DatevWriter},
    mt940_format::{parse_batch, Mt940Statement},
    Error, Format, Result,
};

#[derive(Parser)]
#[command(name = "ypbank_converter")]
#[command(about = "Convert between bank statement formats (MT940, CAMT.053, DATEV)", long_about = None)]
struct Cli {
    /// Input file path (or stdin if not provided)
    #[arg(short, long)]
    input: Option<String>,

    /// Input format (mt940, camt053)
    #[arg(long = "input-format")]
    input_format: String,

    /// Output format (mt940, camt053, datev)
    #[arg(long = "output-format")]
    output_format: String,

    /// Output file path (or stdout if not provided)
    #[arg(short, long)]
    output: Option<String>,

    /// camt.053 schema version to write (2, 4 or 8)
    #[arg(long = "camt-version", default_value_t = 8)]
    camt_version: u8,
}

/// A decoded input file.
enum Input {
    Mt940(Vec<Mt940Statement>),
    Camt053(Camt053Document),
}

impl Input {
    fn into_mt940(self) -> Result<Vec<Mt940Statement>> {
        match self {
            Input::Mt940(statements) => Ok(statements),
            Input::Camt053(document) => camt053_document_to_mt940(&document),
        }
    }

    fn into_camt053(self) -> Camt053Document {
        match self {
            Input::Mt940(statements) => mt940_to_camt053_document(&statements, chrono::Utc::now().naive_utc()),
            Input::Camt053(document) => document,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Parse formats
    let input_format = cli.input_format.parse::<Format>()?;
    let output_format = cli.output_format.parse::<Format>()?;

    // Process based on input file or stdin
    let input = if let Some(ref input_path) = cli.input {
        let mut file = File::open(input_path)?;
        parse_input(&mut file, input_format)?
    } else {
        let mut stdin = io::stdin();
        parse_input(&mut stdin, input_format)?
    };

    // Output based on output file or stdout
    if let Some(ref output_path) = cli.output {
        let mut file = File::create(output_path)?;
        write_output(&mut file, input, output_format, cli.camt_version)?;
    } else {
        let mut stdout = io::stdout();
        write_output(&mut stdout, input, output_format, cli.camt_version)?;
    }

    Ok(())
}

fn parse_input<R: Read>(reader: &mut R, format: Format) -> Result<Input> {
    match format {
        Format::Mt940 => {
            let mut raw = String::new();
            reader.read_to_string(&mut raw)?;

            let mut statements = Vec::new();
            let mut first_error = None;
            for (index, result) in parse_batch(&raw) {
                match result {
                    Ok(statement) => statements.push(statement),
                    Err(err) => {
                        warn!(index, error = %err, "skipping statement");
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }
            match (statements.is_empty(), first_error) {
                (true, Some(err)) => Err(err.into()),
                _ => {
                    info!(statements = statements.len(), "read MT940 input");
                    Ok(Input::Mt940(statements))
                }
            }
        }
        Format::Camt053 => Ok(Input::Camt053(Camt053Document::from_read(reader)?)),
        Format::DatevAscii => Err(Error::InvalidFormat("DATEV is an output format only".to_string())),
    }
}

fn write_output<W: Write>(writer: &mut W, input: Input, format: Format, camt_version: u8) -> Result<()> {
    match format {
        Format::Mt940 => {
            for statement in input.into_mt940()? {
                statement.write_to(writer)?;
            }
        }
        Format::Camt053 => {
            input.into_camt053().write_to(writer, camt_version)?;
        }
        Format::DatevAscii => {
            let mut datev = DatevWriter::new(writer);
            for statement in input.into_mt940()? {
                for row in bank_transactions::rows_from_statement(&statement.statement)? {
                    datev.write_row(&row)?;
                }
            }
            datev.flush()?;
        }
    }
    Ok(())
}
