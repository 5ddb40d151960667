use std::error::Error;
use std::ffi::CString;

use clap::Parser;
use tacho_card::{CardReader, DumpSession, PcscChannel};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tacho-dump")]
#[command(about = "Tachograph Card Downloader - Dump driver card data to a TGD file")]
#[command(version)]
struct Args {
    /// Write the dump to this path instead of the derived C_..._.TGD name
    #[arg(short, long)]
    output: Option<String>,

    /// Connect to a specific reader instead of the first available one
    #[arg(short, long)]
    reader: Option<String>,

    /// List available card readers and exit
    #[arg(long)]
    list_readers: bool,
}

fn main() {
    // Initialize tracing subscriber with environment-based filtering
    // Set RUST_LOG=debug for detailed logs, RUST_LOG=trace for very verbose
    // Default: info level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let reader = match CardReader::new() {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Failed to establish PC/SC context: {}", err);
            return;
        }
    };

    if args.list_readers {
        match reader.list_readers() {
            Ok(names) if names.is_empty() => println!("No card readers available"),
            Ok(names) => {
                for name in names {
                    println!("{}", name);
                }
            }
            Err(err) => eprintln!("Failed to list readers: {}", err),
        }
        return;
    }

    let card = match &args.reader {
        Some(name) => {
            let reader_name = match CString::new(name.as_str()) {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Invalid reader name: {}", name);
                    return;
                }
            };
            match reader.connect(&reader_name) {
                Ok(card) => {
                    println!("Reader: {}", name);
                    card
                }
                Err(err) => {
                    eprintln!("Failed to connect to reader {}: {}", name, err);
                    return;
                }
            }
        }
        None => match reader.connect_first() {
            Ok((card, name)) => {
                println!("Reader: {}", name);
                card
            }
            Err(err) => {
                eprintln!("Failed to connect to card: {}", err);
                eprintln!("Please ensure a card is present on the reader");
                return;
            }
        },
    };

    println!("Card connected, reading...");

    let mut session = DumpSession::new(PcscChannel::new(card));
    match session.run(args.output.as_deref()) {
        Ok(dump) => {
            println!(
                "Card read successfully, saved {} bytes to {}",
                dump.data.len(),
                dump.filename
            );
        }
        Err(err) => {
            eprintln!("Failed to read card: {}", err);
            let mut source = err.source();
            while let Some(inner) = source {
                eprintln!("  caused by: {}", inner);
                source = inner.source();
            }
        }
    }
}
