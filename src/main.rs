//! Benchmarks the resolvers listed in a text file and prints a ranking.

use dnsrank::probe::NetProber;
use dnsrank::registry::Registry;
use dnsrank::round::{Benchmark, TermProgress};
use dnsrank::{logging, report};
use std::io::{self, Write};
use std::process::ExitCode;

/// The resolver list read when no path is given on the command line.
const DEFAULT_INPUT: &str = "resolvers.txt";

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_INPUT.into());
    let registry = match Registry::load(&path) {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let benchmark = Benchmark::new(NetProber::new());
    let stats = benchmark.run(&registry, &TermProgress).await;

    let rows = report::rank(&registry, &stats);
    let mut stdout = io::stdout().lock();
    if let Err(err) = report::write_report(&rows, &mut stdout) {
        eprintln!("cannot write report: {}", err);
        return ExitCode::FAILURE;
    }
    let _ = stdout.flush();
    ExitCode::SUCCESS
}
