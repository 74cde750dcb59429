//! Faro CLI - client for the faro distributed filesystem.
//!
//! Talks to a naming server for directory operations and directly to
//! storage servers for file data.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use faro_core::{Path, SERVICE_PORT};
use faro_net::ServiceStub;
use faro_proto::StubAddr;

/// Largest single read issued while streaming a file.
const READ_CHUNK: u32 = 1024 * 1024;

/// Faro distributed filesystem CLI.
#[derive(Parser)]
#[command(name = "faro")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Naming server (host or host:port)
    #[arg(short, long, default_value = "127.0.0.1")]
    naming: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the children of a directory
    Ls {
        /// Directory path
        path: String,
    },

    /// Create a directory
    Mkdir {
        /// Directory path
        path: String,
    },

    /// Create an empty file
    Touch {
        /// File path
        path: String,
    },

    /// Delete a file or directory
    Rm {
        /// Path to delete
        path: String,
    },

    /// Show the size of a file
    Stat {
        /// File path
        path: String,
    },

    /// Print a file to stdout
    Cat {
        /// File path
        path: String,
    },

    /// Write a local file into the filesystem
    Write {
        /// Destination path
        path: String,

        /// Local file to upload
        file: PathBuf,

        /// Byte offset to write at
        #[arg(long, default_value = "0")]
        offset: u64,
    },

    /// Show which storage server hosts a path
    Locate {
        /// Path to locate
        path: String,
    },
}

fn service_stub(naming: &str) -> Result<ServiceStub> {
    let addr = match naming.rsplit_once(':') {
        Some((host, port)) => StubAddr::new(host, port.parse().context("invalid port")?),
        None => StubAddr::new(naming, SERVICE_PORT),
    };
    Ok(ServiceStub::new(addr))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set up logging")?;

    let service = service_stub(&cli.naming)?;

    match cli.command {
        Commands::Ls { path } => {
            let path = Path::parse(&path)?;
            let mut names = service.list(&path).await?;
            names.sort();
            for name in names {
                println!("{name}");
            }
        }

        Commands::Mkdir { path } => {
            let path = Path::parse(&path)?;
            if !service.create_directory(&path).await? {
                bail!("{path} already exists");
            }
        }

        Commands::Touch { path } => {
            let path = Path::parse(&path)?;
            if !service.create_file(&path).await? {
                bail!("{path} already exists");
            }
        }

        Commands::Rm { path } => {
            let path = Path::parse(&path)?;
            if !service.delete(&path).await? {
                bail!("could not delete {path}");
            }
        }

        Commands::Stat { path } => {
            let path = Path::parse(&path)?;
            let storage = service.get_storage(&path).await?;
            let size = storage.size(&path).await?;
            println!("{path}: {size} bytes on {}", storage.addr());
        }

        Commands::Cat { path } => {
            let path = Path::parse(&path)?;
            let storage = service.get_storage(&path).await?;
            let size = storage.size(&path).await?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let mut offset = 0u64;
            while offset < size {
                let length = (size - offset).min(READ_CHUNK as u64) as u32;
                let bytes = storage.read(&path, offset, length).await?;
                out.write_all(&bytes)?;
                offset += length as u64;
            }
        }

        Commands::Write { path, file, offset } => {
            let path = Path::parse(&path)?;
            let data = std::fs::read(&file).with_context(|| format!("reading {file:?}"))?;

            // Create the destination if it does not exist yet.
            let _ = service.create_file(&path).await?;
            let storage = service.get_storage(&path).await?;
            storage.write(&path, offset, data).await?;
        }

        Commands::Locate { path } => {
            let path = Path::parse(&path)?;
            let storage = service.get_storage(&path).await?;
            println!("{}", storage.addr());
        }
    }

    Ok(())
}
