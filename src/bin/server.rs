use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use redlite::store::DEFAULT_DATABASES;
use redlite::{server, Error};

const PORT: u16 = 6379;

#[derive(Parser, Debug)]
struct Args {
    /// The port to listen on
    #[arg(short, long, default_value_t = PORT)]
    port: u16,

    /// Number of logical databases
    #[arg(long, default_value_t = DEFAULT_DATABASES)]
    databases: usize,

    /// Where to read and write the snapshot file
    #[arg(long, default_value = "redlite.snapshot")]
    snapshot_path: PathBuf,

    /// Seconds between periodic snapshots
    #[arg(long, default_value_t = 60)]
    snapshot_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    server::run(server::Config {
        port: args.port,
        databases: args.databases,
        snapshot_path: args.snapshot_path,
        snapshot_interval: Duration::from_secs(args.snapshot_interval),
    })
    .await
}
