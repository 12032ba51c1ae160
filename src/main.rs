//! # dyncall
//!
//! Calls one method of a remote service without a client generated for it.
//! The method's parameters are looked up in JSON schema documents and their
//! values are entered line by line, interactively or from a script:
//!
//! ```bash
//! dyncall <host> <port> <service> <method> [--schema <path>]... [< script]
//! ```
//!
//! Records are typed as JSON objects, enums as symbol names. Lists and sets
//! first ask for the concrete element type, then read elements until a blank
//! line. A blank line elsewhere leaves the argument out.
//!
//! Example script for `Math.sumList(values: list<Int32Record>)`:
//! ```text
//! Int32Record
//! {"value": 1}
//! {"value": 2}
//!
//! ```
//!
//! The process exits with status 1 and a one-line diagnostic on the first
//! failure.
use std::process::ExitCode;

use clap::Parser;
use dyncall::client::{Connection, ServiceStub};
use dyncall::config::Cli;
use dyncall::{driver, logger};
use log::LevelFilter;

async fn run(cli: Cli) -> dyncall::Result<()> {
    let registry = cli.load_registry()?;
    let service = cli.target(&registry)?;

    let conn = Connection::open(&cli.host, cli.port, cli.connect_timeout()).await?;
    let mut stub = ServiceStub::new(conn, service);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    driver::invoke(&mut stub, &registry, &cli.method, stdin.lock(), &mut stdout).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logger::setup_logger(LevelFilter::Warn);
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
