//! Read CSV data and write it back out with normalized quoting.
//!
//! Records are read from the given file, or stdin when no file is given, and
//! written to stdout. Syntax errors are reported with the position of the
//! offending record and cause a non-zero exit status.
//!
//! Set `RUST_LOG=debug` to see the library's log output on stderr.

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use rfcsv::{ByteRecord, QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for csvcat.
#[derive(Parser, Debug)]
#[command(name = "csvcat")]
#[command(about = "Read CSV and write it back out with normalized quoting")]
struct Args {
    /// CSV file to read (defaults to stdin)
    path: Option<PathBuf>,

    /// End written records with \r\n instead of \n
    #[arg(long)]
    crlf: bool,

    /// Quote every field, not just the ones that need it
    #[arg(long)]
    quote_all: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let term = if args.crlf {
        Terminator::CRLF
    } else {
        Terminator::default()
    };
    let style = if args.quote_all {
        QuoteStyle::Always
    } else {
        QuoteStyle::Necessary
    };

    let rb = ReaderBuilder::new();
    let mut wtr = WriterBuilder::new()
        .terminator(term)
        .quote_style(style)
        .from_writer(io::stdout());

    let count = match args.path {
        Some(ref path) => copy(rb.from_path(path)?, &mut wtr)?,
        None => copy(rb.from_reader(io::stdin()), &mut wtr)?,
    };
    wtr.flush()?;
    info!(records = count, "copied CSV records");
    Ok(())
}

fn copy<R: io::Read, W: io::Write>(
    mut rdr: rfcsv::Reader<R>,
    wtr: &mut rfcsv::Writer<W>,
) -> rfcsv::Result<u64> {
    let mut record = ByteRecord::new();
    let mut count = 0;
    while rdr.read_byte_record(&mut record)? {
        wtr.write_byte_record(&record)?;
        count += 1;
    }
    Ok(count)
}
