//! appendkv CLI
//!
//! Command-line tool for inspecting and maintaining a store directory.
//! The store must not be open elsewhere while the tool runs.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use appendkv::{Store, StoreConfig, SyncStrategy};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// appendkv CLI
#[derive(Parser, Debug)]
#[command(name = "appendkv-cli")]
#[command(about = "Inspect and maintain an appendkv store")]
#[command(version)]
struct Args {
    /// Root directory of the store
    #[arg(short, long, default_value = "./appendkv_data")]
    root: PathBuf,

    /// Version tag; content with a different tag is cleared on open
    #[arg(short = 'v', long = "store-version", default_value = "1")]
    store_version: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a UTF-8 value
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Store the contents of a file
    PutFile {
        /// The key to set
        key: String,

        /// File whose bytes become the value
        path: PathBuf,
    },

    /// Print a value
    Get {
        /// The key to get
        key: String,

        /// Print the value as hex instead of text
        #[arg(long)]
        hex: bool,
    },

    /// Tell whether a key is present
    Contains {
        /// The key to look up
        key: String,
    },

    /// Print the number of entries
    Size,

    /// List all keys
    Keys,

    /// Remove all entries
    Clear,

    /// Delete the store files
    Destroy,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,appendkv=info"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> appendkv::Result<()> {
    if let Commands::Destroy = args.command {
        Store::destroy(&args.root)?;
        println!("destroyed {}", args.root.display());
        return Ok(());
    }

    let config = StoreConfig::builder()
        .root_dir(&args.root)
        .version(args.store_version)
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();

    let store = Store::open(config)?;

    match args.command {
        Commands::Put { key, value } => {
            put(&store, &key, value.as_bytes())?;
        }
        Commands::PutFile { key, path } => {
            let value = fs::read(&path)?;
            put(&store, &key, &value)?;
        }
        Commands::Get { key, hex } => match store.get(&key)? {
            Some(value) if hex => println!("{}", to_hex(&value)),
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(not found)"),
        },
        Commands::Contains { key } => {
            println!("{}", store.contains(&key).unwrap_or(false));
        }
        Commands::Size => {
            println!("{}", store.size().unwrap_or(0));
        }
        Commands::Keys => {
            for key in store.keys().unwrap_or_default() {
                println!("{}", key);
            }
        }
        Commands::Clear => {
            store.clear()?;
            println!("cleared");
        }
        Commands::Destroy => unreachable!("handled before opening the store"),
    }

    store.close();
    Ok(())
}

/// Put, telling the user when an existing value was kept
fn put(store: &Store, key: &str, value: &[u8]) -> appendkv::Result<()> {
    if store.contains(key) == Some(true) {
        println!("{} already set, value kept", key);
        return Ok(());
    }
    store.put(key, value)?;
    println!("stored {} ({} bytes)", key, value.len());
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
