//! Inspect or clear the persisted viewer session.
//!
//! Usage: `strip-viewer-session [--store <path>] [status|clear|config]`

use std::path::PathBuf;

use strip_viewer::{Config, RedbStore, ViewerSession};
use tracing::info;
use tracing_subscriber::EnvFilter;

enum Command {
    Status,
    Clear,
    /// Print the effective configuration.
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command line arguments
    let mut config = Config::load();
    let mut command = Command::Status;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--store" => {
                let path = args.next().ok_or("--store needs a path")?;
                config.store_path = Some(PathBuf::from(path));
            }
            "status" => command = Command::Status,
            "clear" => command = Command::Clear,
            "config" => command = Command::Config,
            other => return Err(format!("unknown argument: {}", other).into()),
        }
    }

    if let Command::Config = command {
        print!("{}", config.to_ini());
        return Ok(());
    }

    let path = config.resolved_store_path()?;
    let store = RedbStore::open(&path)?;
    info!("Using session store {}", store.path().display());
    let mut session = ViewerSession::open(Box::new(store), &config);

    match command {
        Command::Status => {
            match session.source() {
                Some(source) => println!("source:   {} ({})", source.path.display(), source.kind.as_str()),
                None => println!("source:   none"),
            }
            match session.current_position() {
                Some(pos) => println!("position: {}", pos),
                None => println!("position: none"),
            }
            println!("measured: {} rows", session.measured_rows());
            println!("estimate: {} px", session.estimated_height());
        }
        Command::Clear => {
            session.clear();
            println!("cleared {}", path.display());
        }
        Command::Config => {}
    }

    Ok(())
}
